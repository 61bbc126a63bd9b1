//! Side-table holding engine state for every instrumented node.
//!
//! Nothing is stored on host nodes. Each qualifying node gets a dense [`ElementHandle`]; the
//! reverse `NodeId` map doubles as the processed marker consulted by the selector.

use std::collections::HashMap;

use content_tree::{Classification, ProcessedMarkers};
use signaltap_core_types::{ElementHandle, Millis, NodeId};

use crate::fingerprint::fingerprint;
use crate::record::{ContentKind, SignalRecord, SignalSnapshot};

#[derive(Clone, Debug)]
pub struct TrackedElement {
    pub handle: ElementHandle,
    pub node: NodeId,
    pub tag: String,
    pub classification: Classification,
    pub kind: ContentKind,
    pub fingerprint: String,
    /// Tracked group enclosing a leaf.
    pub group: Option<ElementHandle>,
    /// Start of the open visible interval.
    pub visible_since: Option<Millis>,
    /// Start of the open hover interval.
    pub hover_since: Option<Millis>,
    /// Last reported intersection state, kept across tab switches.
    pub intersecting: bool,
    /// Set once the node left the document; later events are ignored.
    pub detached: bool,
    pub record: SignalRecord,
}

impl TrackedElement {
    pub fn content(&self) -> &str {
        &self.record.content
    }

    pub fn is_group(&self) -> bool {
        self.classification == Classification::Container
    }

    pub fn snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            handle: self.handle,
            node: self.node,
            id: self.fingerprint.clone(),
            tag: self.tag.clone(),
            kind: self.kind,
            record: self.record.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    elements: Vec<TrackedElement>,
    by_node: HashMap<NodeId, ElementHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node`, or returns its existing handle.
    pub fn register(
        &mut self,
        node: NodeId,
        tag: &str,
        classification: Classification,
        content: String,
    ) -> ElementHandle {
        if let Some(handle) = self.by_node.get(&node) {
            return *handle;
        }
        let handle = ElementHandle(self.elements.len() as u32);
        self.elements.push(TrackedElement {
            handle,
            node,
            tag: tag.to_string(),
            classification,
            kind: ContentKind::for_element(tag, classification),
            fingerprint: fingerprint(tag, &content),
            group: None,
            visible_since: None,
            hover_since: None,
            intersecting: false,
            detached: false,
            record: SignalRecord::new(content),
        });
        self.by_node.insert(node, handle);
        handle
    }

    pub fn handle_of(&self, node: NodeId) -> Option<ElementHandle> {
        self.by_node.get(&node).copied()
    }

    pub fn get(&self, handle: ElementHandle) -> Option<&TrackedElement> {
        self.elements.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: ElementHandle) -> Option<&mut TrackedElement> {
        self.elements.get_mut(handle.index())
    }

    /// Live (not detached) element for `node`.
    pub fn live(&self, node: NodeId) -> Option<&TrackedElement> {
        self.handle_of(node)
            .and_then(|handle| self.get(handle))
            .filter(|element| !element.detached)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedElement> {
        self.elements.iter()
    }

    pub fn handles(&self) -> impl Iterator<Item = ElementHandle> + '_ {
        self.elements.iter().map(|element| element.handle)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl ProcessedMarkers for Registry {
    fn processed(&self, node: NodeId) -> Option<Classification> {
        self.handle_of(node)
            .and_then(|handle| self.get(handle))
            .map(|element| element.classification)
    }
}
