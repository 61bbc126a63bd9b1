use signaltap_core_types::NodeId;

use crate::classify::label_text;
use crate::config::ContentConfig;
use crate::dom::{DomView, NodeKind};

/// Normalised text of a subtree: text nodes and image labels in document order, disallowed
/// subtrees skipped, whitespace collapsed. Non-element nodes yield an empty string.
pub fn extract_content<D>(dom: &D, node: NodeId, config: &ContentConfig) -> String
where
    D: DomView + ?Sized,
{
    if !dom.is_element(node) {
        return String::new();
    }
    let mut parts = Vec::new();
    collect(dom, node, config, &mut parts);
    collapse_whitespace(&parts.join(" "))
}

fn collect<D>(dom: &D, node: NodeId, config: &ContentConfig, parts: &mut Vec<String>)
where
    D: DomView + ?Sized,
{
    let Some(tag) = dom.tag(node) else {
        return;
    };
    if config.is_disallowed(&tag) {
        return;
    }
    if config.is_image(&tag) {
        if let Some(label) = label_text(dom, node, config) {
            parts.push(label);
        }
    }
    for child in dom.child_nodes(node) {
        match dom.kind(child) {
            Some(NodeKind::Text) => {
                if let Some(text) = dom.text(child) {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        parts.push(trimmed.to_string());
                    }
                }
            }
            Some(NodeKind::Element) => collect(dom, child, config, parts),
            None => {}
        }
    }
}

/// Collapses every whitespace run to a single space and trims both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
