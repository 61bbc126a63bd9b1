use std::collections::BTreeMap;

use content_tree::Classification;
use serde::{Deserialize, Serialize};
use signaltap_core_types::{ElementHandle, Millis, NodeId};

use crate::dwell::DwellTier;

/// Wire `type` of a tracked element.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Link,
    Header,
    Quote,
    Bullet,
    Group,
}

impl ContentKind {
    pub fn for_element(tag: &str, classification: Classification) -> Self {
        if classification == Classification::Container {
            return ContentKind::Group;
        }
        match tag {
            "img" => ContentKind::Image,
            "a" => ContentKind::Link,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ContentKind::Header,
            "pre" | "blockquote" => ContentKind::Quote,
            "li" => ContentKind::Bullet,
            _ => ContentKind::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Link => "link",
            ContentKind::Header => "header",
            ContentKind::Quote => "quote",
            ContentKind::Bullet => "bullet",
            ContentKind::Group => "group",
        }
    }
}

/// Completed visible intervals bucketed by dwell tier.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleBuckets {
    pub count: u32,
    pub scroll_ms: Millis,
    pub scan_ms: Millis,
    pub read_ms: Millis,
}

impl VisibleBuckets {
    /// Adds `elapsed` to the bucket for `tier`. Returns `false` for discarded intervals.
    pub fn record(&mut self, tier: DwellTier, elapsed: Millis) -> bool {
        let bucket = match tier {
            DwellTier::Discarded => return false,
            DwellTier::Scroll => &mut self.scroll_ms,
            DwellTier::Scan => &mut self.scan_ms,
            DwellTier::Read => &mut self.read_ms,
        };
        *bucket = bucket.saturating_add(elapsed);
        true
    }

    pub fn total_ms(&self) -> Millis {
        self.scroll_ms
            .saturating_add(self.scan_ms)
            .saturating_add(self.read_ms)
    }
}

/// Engagement with one nested leaf, kept on its enclosing group.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostEntry {
    pub hover_ms: Millis,
    pub clicks: u32,
}

impl BoostEntry {
    pub fn absorb(&mut self, other: BoostEntry) {
        self.hover_ms = self.hover_ms.saturating_add(other.hover_ms);
        self.clicks = self.clicks.saturating_add(other.clicks);
    }

    fn release(&mut self, sent: BoostEntry) {
        self.hover_ms = self.hover_ms.saturating_sub(sent.hover_ms);
        self.clicks = self.clicks.saturating_sub(sent.clicks);
    }

    pub fn is_empty(&self) -> bool {
        self.hover_ms == 0 && self.clicks == 0
    }
}

/// Mutable accumulator of one tracked element since its last dispatch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub content: String,
    pub click_count: u32,
    pub hover_duration_ms: Millis,
    pub visible: VisibleBuckets,
    pub boost: BTreeMap<String, BoostEntry>,
    pub selected_text: Option<String>,
}

impl SignalRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// True once an accumulation event left something worth sending.
    pub fn is_eligible(&self) -> bool {
        self.click_count > 0
            || self.hover_duration_ms > 0
            || self.visible.total_ms() > 0
            || !self.boost.is_empty()
    }

    pub fn add_boost(&mut self, leaf_content: &str, entry: BoostEntry) {
        self.boost
            .entry(leaf_content.to_string())
            .or_default()
            .absorb(entry);
    }

    /// Subtracts what a dispatched snapshot carried, so only engagement accumulated after the
    /// snapshot was taken remains. Content is kept.
    pub fn release(&mut self, sent: &SignalRecord) {
        self.click_count = self.click_count.saturating_sub(sent.click_count);
        self.hover_duration_ms = self.hover_duration_ms.saturating_sub(sent.hover_duration_ms);
        let visible = &mut self.visible;
        visible.count = visible.count.saturating_sub(sent.visible.count);
        visible.scroll_ms = visible.scroll_ms.saturating_sub(sent.visible.scroll_ms);
        visible.scan_ms = visible.scan_ms.saturating_sub(sent.visible.scan_ms);
        visible.read_ms = visible.read_ms.saturating_sub(sent.visible.read_ms);
        for (content, entry) in &sent.boost {
            if let Some(current) = self.boost.get_mut(content) {
                current.release(*entry);
            }
        }
        self.boost.retain(|_, entry| !entry.is_empty());
        if self.selected_text == sent.selected_text {
            self.selected_text = None;
        }
    }
}

/// Copy of a record at enqueue time, tagged with the element it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub handle: ElementHandle,
    pub node: NodeId,
    /// Fingerprint of `(tag, content)`.
    pub id: String,
    pub tag: String,
    pub kind: ContentKind,
    pub record: SignalRecord,
}

impl SignalSnapshot {
    /// Total visible time across all dwell buckets.
    pub fn duration(&self) -> Millis {
        self.record.visible.total_ms()
    }

    pub fn content(&self) -> &str {
        &self.record.content
    }
}
