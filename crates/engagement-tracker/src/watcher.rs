use std::collections::HashSet;

use content_tree::DomView;
use serde::{Deserialize, Serialize};
use signaltap_core_types::NodeId;

/// One record of a subtree mutation batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    ChildAdded { node: NodeId },
    ChildRemoved { node: NodeId },
    Attributes { node: NodeId },
    CharacterData { node: NodeId },
}

/// Filters mutation batches down to the subtrees the selector has to look at.
#[derive(Clone, Copy, Debug, Default)]
pub struct MutationWatcher;

impl MutationWatcher {
    /// Connected element roots added in `batch`, without roots nested under another added root.
    /// Text insertions and attribute changes are dropped.
    pub fn inserted_roots<D>(&self, dom: &D, batch: &[Mutation]) -> Vec<NodeId>
    where
        D: DomView + ?Sized,
    {
        let added: Vec<NodeId> = batch
            .iter()
            .filter_map(|mutation| match mutation {
                Mutation::ChildAdded { node } => Some(*node),
                _ => None,
            })
            .filter(|node| dom.is_element(*node) && dom.is_connected(*node))
            .collect();
        let set: HashSet<NodeId> = added.iter().copied().collect();
        let mut seen = HashSet::new();
        added
            .into_iter()
            .filter(|node| !dom.ancestors(*node).iter().any(|a| set.contains(a)))
            .filter(|node| seen.insert(*node))
            .collect()
    }

    /// Nodes reported as removed that are really gone from the document.
    pub fn removed_roots<D>(&self, dom: &D, batch: &[Mutation]) -> Vec<NodeId>
    where
        D: DomView + ?Sized,
    {
        batch
            .iter()
            .filter_map(|mutation| match mutation {
                Mutation::ChildRemoved { node } if !dom.is_connected(*node) => Some(*node),
                _ => None,
            })
            .collect()
    }
}
