use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use signaltap_core_types::NodeId;

use crate::errors::DomError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Element,
    Text,
}

/// Read access to the host document.
///
/// Every lookup tolerates unknown or detached nodes by answering `None` / empty, so callers can
/// skip them without failing.
pub trait DomView {
    fn kind(&self, node: NodeId) -> Option<NodeKind>;

    /// Lower-cased tag name of an element node.
    fn tag(&self, node: NodeId) -> Option<String>;

    /// Raw value of a text node.
    fn text(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn child_nodes(&self, node: NodeId) -> Vec<NodeId>;

    fn is_connected(&self, node: NodeId) -> bool;

    /// Rendered height in CSS pixels, when layout information is available.
    fn layout_height(&self, node: NodeId) -> Option<f64>;

    fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Element))
    }

    fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.child_nodes(node)
            .into_iter()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// Strict ancestors, nearest first.
    fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent(node);
        while let Some(id) = current {
            chain.push(id);
            current = self.parent(id);
        }
        chain
    }
}

/// Serialisable description of a document subtree.
///
/// A bare string is a text node; anything else is an element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Text(String),
    Element(ElementSpec),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            height: None,
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    pub fn height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(NodeSpec::Text(text.into()));
        self
    }

    pub fn child(mut self, child: impl Into<NodeSpec>) -> Self {
        self.children.push(child.into());
        self
    }
}

impl From<ElementSpec> for NodeSpec {
    fn from(spec: ElementSpec) -> Self {
        NodeSpec::Element(spec)
    }
}

impl From<&str> for NodeSpec {
    fn from(text: &str) -> Self {
        NodeSpec::Text(text.to_string())
    }
}

#[derive(Clone, Debug)]
enum NodeData {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
        height: Option<f64>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct ArenaNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory document tree. Node ids are arena indices and are never reused, so a detached
/// node keeps answering lookups but reports `is_connected == false`.
#[derive(Clone, Debug)]
pub struct ArenaDocument {
    nodes: Vec<ArenaNode>,
    root: NodeId,
}

impl ArenaDocument {
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, DomError> {
        if !matches!(spec, NodeSpec::Element(_)) {
            return Err(DomError::RootNotElement);
        }
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.root = doc.build(spec, None);
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends `spec` as the last child of `parent` and returns the new subtree root.
    pub fn insert(&mut self, parent: NodeId, spec: &NodeSpec) -> Result<NodeId, DomError> {
        match self.node(parent).map(|n| &n.data) {
            None => return Err(DomError::NodeNotFound(parent)),
            Some(NodeData::Text(_)) => return Err(DomError::NotAnElement(parent)),
            Some(NodeData::Element { .. }) => {}
        }
        let id = self.build(spec, Some(parent));
        self.nodes[parent.0 as usize].children.push(id);
        Ok(id)
    }

    /// Removes `node` (and its subtree) from the tree.
    pub fn detach(&mut self, node: NodeId) -> Result<(), DomError> {
        if node == self.root {
            return Err(DomError::DetachRoot);
        }
        let parent = self
            .node(node)
            .ok_or(DomError::NodeNotFound(node))?
            .parent;
        if let Some(parent) = parent {
            self.nodes[parent.0 as usize]
                .children
                .retain(|child| *child != node);
        }
        self.nodes[node.0 as usize].parent = None;
        Ok(())
    }

    /// First connected element whose `id` attribute equals `id`, in document order.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            let entry = &self.nodes[node.0 as usize];
            if let NodeData::Element { attrs, .. } = &entry.data {
                if attrs.get("id").map(String::as_str) == Some(id) {
                    return Some(node);
                }
            }
            stack.extend(entry.children.iter().rev().copied());
        }
        None
    }

    fn node(&self, id: NodeId) -> Option<&ArenaNode> {
        self.nodes.get(id.0 as usize)
    }

    fn build(&mut self, spec: &NodeSpec, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        match spec {
            NodeSpec::Text(text) => {
                self.nodes.push(ArenaNode {
                    data: NodeData::Text(text.clone()),
                    parent,
                    children: Vec::new(),
                });
            }
            NodeSpec::Element(element) => {
                self.nodes.push(ArenaNode {
                    data: NodeData::Element {
                        tag: element.tag.to_ascii_lowercase(),
                        attrs: element.attrs.clone(),
                        height: element.height,
                    },
                    parent,
                    children: Vec::new(),
                });
                let children: Vec<NodeId> = element
                    .children
                    .iter()
                    .map(|child| self.build(child, Some(id)))
                    .collect();
                self.nodes[id.0 as usize].children = children;
            }
        }
        id
    }
}

impl DomView for ArenaDocument {
    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.node(node).map(|n| match n.data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
        })
    }

    fn tag(&self, node: NodeId) -> Option<String> {
        match &self.node(node)?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<String> {
        match &self.node(node)?.data {
            NodeData::Text(text) => Some(text.clone()),
            NodeData::Element { .. } => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.node(node)?.data {
            NodeData::Element { attrs, .. } => attrs.get(name).cloned(),
            NodeData::Text(_) => None,
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        if self.node(node).is_none() {
            return false;
        }
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn layout_height(&self, node: NodeId) -> Option<f64> {
        match &self.node(node)?.data {
            NodeData::Element { height, .. } => *height,
            NodeData::Text(_) => None,
        }
    }
}
