//! JSON body posted to the collector endpoint.

use std::collections::BTreeMap;

use engagement_tracker::{BoostEntry, ContentKind};
use serde::{Deserialize, Serialize};
use signaltap_core_types::Millis;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalBatch {
    pub profile: IdRef,
    pub session: IdRef,
    pub source: IdRef,
    pub url: String,
    pub elements: Vec<WireElement>,
}

/// Selected text of a merged record: the single value for a group of one, otherwise every
/// value in queue order with `null` placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectedText {
    Many(Vec<Option<String>>),
    One(Option<String>),
}

impl SelectedText {
    pub fn from_entries(mut entries: Vec<Option<String>>) -> Self {
        if entries.len() == 1 {
            SelectedText::One(entries.pop().flatten())
        } else {
            SelectedText::Many(entries)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireElement {
    /// Fingerprint of the first record in the merge group.
    pub id: String,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub content: String,
    pub duration: Millis,
    pub mouse_over_duration: Millis,
    pub click_count: u32,
    pub selected_text: SelectedText,
    pub duplicate_count: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub boost: BTreeMap<String, BoostEntry>,
}
