use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use signaltap_core_types::NodeId;
use tracing::trace;

use crate::classify::{classify, classify_local, Classification};
use crate::config::ContentConfig;
use crate::dom::DomView;

/// Visible area used for the group fit check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub height: Option<f64>,
}

impl Viewport {
    pub fn with_height(height: f64) -> Self {
        Self {
            height: Some(height),
        }
    }

    /// Unknown heights on either side count as fitting.
    pub fn fits(&self, element_height: Option<f64>) -> bool {
        match (element_height, self.height) {
            (Some(element), Some(viewport)) => element <= viewport,
            _ => true,
        }
    }
}

/// A node newly chosen for instrumentation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub node: NodeId,
    /// `Leaf`, or `Container` for a tracked group.
    pub classification: Classification,
    /// Tracked group enclosing a leaf, if any.
    pub container: Option<NodeId>,
}

/// Lookup of nodes that already carry instrumentation.
pub trait ProcessedMarkers {
    fn processed(&self, node: NodeId) -> Option<Classification>;
}

impl ProcessedMarkers for HashMap<NodeId, Classification> {
    fn processed(&self, node: NodeId) -> Option<Classification> {
        self.get(&node).copied()
    }
}

/// Recursive walk that finds the minimal qualifying nodes of a subtree.
#[derive(Clone, Debug)]
pub struct ContentSelector {
    config: ContentConfig,
    viewport: Viewport,
}

impl ContentSelector {
    pub fn new(config: ContentConfig, viewport: Viewport) -> Self {
        Self {
            config: config.normalized(),
            viewport,
        }
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Selects the not-yet-processed qualifying nodes under `root` (inclusive), in document
    /// order. A tracked group is listed before its leaves.
    pub fn select<D, M>(&self, dom: &D, root: NodeId, processed: &M) -> Vec<Candidate>
    where
        D: DomView + ?Sized,
        M: ProcessedMarkers + ?Sized,
    {
        let mut found = Vec::new();
        if classify(dom, root, &self.config) == Classification::Ignored {
            return found;
        }
        let mut enclosing = None;
        for ancestor in dom.ancestors(root) {
            match processed.processed(ancestor) {
                // Content under an instrumented leaf already belongs to it.
                Some(Classification::Leaf) | Some(Classification::Ignored) => return found,
                Some(Classification::Container) if enclosing.is_none() => {
                    enclosing = Some(ancestor)
                }
                _ => {}
            }
        }
        self.walk(dom, root, enclosing, processed, &mut found);
        trace!(root = %root, selected = found.len(), "content selection finished");
        found
    }

    /// Nearest instrumented container above `node`.
    pub fn enclosing_container<D, M>(&self, dom: &D, node: NodeId, processed: &M) -> Option<NodeId>
    where
        D: DomView + ?Sized,
        M: ProcessedMarkers + ?Sized,
    {
        dom.ancestors(node)
            .into_iter()
            .find(|ancestor| processed.processed(*ancestor) == Some(Classification::Container))
    }

    fn walk<D, M>(
        &self,
        dom: &D,
        node: NodeId,
        enclosing: Option<NodeId>,
        processed: &M,
        found: &mut Vec<Candidate>,
    ) where
        D: DomView + ?Sized,
        M: ProcessedMarkers + ?Sized,
    {
        match processed.processed(node) {
            Some(Classification::Container) => {
                for child in dom.element_children(node) {
                    self.walk(dom, child, Some(node), processed, found);
                }
                return;
            }
            Some(_) => return,
            None => {}
        }
        let Some(tag) = dom.tag(node) else {
            return;
        };
        match classify_local(dom, node, &tag, &self.config) {
            Classification::Ignored => {}
            Classification::Leaf => found.push(Candidate {
                node,
                classification: Classification::Leaf,
                container: enclosing,
            }),
            Classification::Container => {
                let mut enclosing = enclosing;
                if enclosing.is_none() && self.is_group(dom, node, &tag, processed) {
                    found.push(Candidate {
                        node,
                        classification: Classification::Container,
                        container: None,
                    });
                    enclosing = Some(node);
                }
                for child in dom.element_children(node) {
                    self.walk(dom, child, enclosing, processed, found);
                }
            }
        }
    }

    fn is_group<D, M>(&self, dom: &D, node: NodeId, tag: &str, processed: &M) -> bool
    where
        D: DomView + ?Sized,
        M: ProcessedMarkers + ?Sized,
    {
        self.config.is_container_tag(tag)
            && self.viewport.fits(dom.layout_height(node))
            && self
                .count_leaves(dom, node, processed)
                .is_some_and(|leaves| leaves >= self.config.min_group_size)
    }

    /// Counts qualifying leaves below `node`. `None` when the subtree already holds a tracked
    /// group, which keeps grouping to a single level.
    fn count_leaves<D, M>(&self, dom: &D, node: NodeId, processed: &M) -> Option<usize>
    where
        D: DomView + ?Sized,
        M: ProcessedMarkers + ?Sized,
    {
        let mut count = 0;
        let mut stack = dom.element_children(node);
        while let Some(current) = stack.pop() {
            if processed.processed(current) == Some(Classification::Container) {
                return None;
            }
            let Some(tag) = dom.tag(current) else {
                continue;
            };
            match classify_local(dom, current, &tag, &self.config) {
                Classification::Leaf => count += 1,
                Classification::Container => stack.extend(dom.element_children(current)),
                Classification::Ignored => {}
            }
        }
        Some(count)
    }
}
