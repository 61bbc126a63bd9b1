use serde::{Deserialize, Serialize};
use signaltap_core_types::NodeId;

use crate::config::ContentConfig;
use crate::dom::{DomView, NodeKind};
use crate::extract::collapse_whitespace;

/// Outcome of classifying one element.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Carries its own content; never descended into.
    Leaf,
    /// No content of its own; traversal passes through it.
    Container,
    /// Excluded together with its whole subtree.
    Ignored,
}

/// Classifies `node`, taking disallowed ancestors into account.
pub fn classify<D>(dom: &D, node: NodeId, config: &ContentConfig) -> Classification
where
    D: DomView + ?Sized,
{
    if !dom.is_connected(node) {
        return Classification::Ignored;
    }
    let disallowed_ancestor = dom.ancestors(node).into_iter().any(|ancestor| {
        dom.tag(ancestor)
            .map(|tag| config.is_disallowed(&tag))
            .unwrap_or(false)
    });
    if disallowed_ancestor {
        return Classification::Ignored;
    }
    match dom.tag(node) {
        Some(tag) => classify_local(dom, node, &tag, config),
        None => Classification::Ignored,
    }
}

/// Classification ignoring ancestors; callers walking downwards from an already checked node
/// use this to avoid re-scanning the ancestor chain at every step.
pub(crate) fn classify_local<D>(
    dom: &D,
    node: NodeId,
    tag: &str,
    config: &ContentConfig,
) -> Classification
where
    D: DomView + ?Sized,
{
    if config.is_disallowed(tag) {
        return Classification::Ignored;
    }
    if !config.is_leaf_tag(tag) {
        return Classification::Container;
    }
    let qualifies = if config.is_image(tag) {
        label_text(dom, node, config).is_some()
    } else {
        direct_text(dom, node).trim().chars().count() >= config.min_content_length
    };
    if qualifies {
        Classification::Leaf
    } else {
        Classification::Container
    }
}

/// Direct text-node children concatenated as-is, without separators or trimming.
pub fn direct_text<D>(dom: &D, node: NodeId) -> String
where
    D: DomView + ?Sized,
{
    let mut raw = String::new();
    for child in dom.child_nodes(node) {
        if dom.kind(child) == Some(NodeKind::Text) {
            if let Some(text) = dom.text(child) {
                raw.push_str(&text);
            }
        }
    }
    raw
}

/// First non-blank label attribute of an element.
pub fn label_text<D>(dom: &D, node: NodeId, config: &ContentConfig) -> Option<String>
where
    D: DomView + ?Sized,
{
    config
        .label_attributes
        .iter()
        .filter_map(|name| dom.attribute(node, name))
        .map(|value| collapse_whitespace(&value))
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ArenaDocument, ElementSpec, NodeSpec};

    fn doc(spec: ElementSpec) -> ArenaDocument {
        ArenaDocument::from_spec(&NodeSpec::from(spec)).expect("document")
    }

    fn by_id(doc: &ArenaDocument, id: &str) -> NodeId {
        doc.element_by_id(id).expect(id)
    }

    #[test]
    fn direct_text_above_threshold_is_leaf() {
        let doc = doc(ElementSpec::new("body")
            .child(ElementSpec::new("p").id("long").text("  Plenty of words  "))
            .child(ElementSpec::new("p").id("short").text("Hi")));
        let config = ContentConfig::default();
        assert_eq!(classify(&doc, by_id(&doc, "long"), &config), Classification::Leaf);
        assert_eq!(
            classify(&doc, by_id(&doc, "short"), &config),
            Classification::Container
        );
    }

    #[test]
    fn inner_whitespace_counts_towards_the_length() {
        let doc = doc(ElementSpec::new("body").child(ElementSpec::new("p").id("spaced").text(" a   b ")));
        assert_eq!(
            classify(&doc, by_id(&doc, "spaced"), &ContentConfig::default()),
            Classification::Leaf
        );
    }

    #[test]
    fn split_text_nodes_are_joined_without_a_separator() {
        let doc = doc(ElementSpec::new("body").child(
            ElementSpec::new("p").id("split").text("Abc").text("d"),
        ));
        let split = by_id(&doc, "split");
        assert_eq!(direct_text(&doc, split), "Abcd");
        assert_eq!(
            classify(&doc, split, &ContentConfig::default()),
            Classification::Container
        );
    }

    #[test]
    fn nested_text_does_not_count_as_direct() {
        let doc = doc(ElementSpec::new("body").child(
            ElementSpec::new("div")
                .id("wrap")
                .child(ElementSpec::new("p").text("Nested paragraph")),
        ));
        let config = ContentConfig::default();
        assert_eq!(
            classify(&doc, by_id(&doc, "wrap"), &config),
            Classification::Container
        );
    }

    #[test]
    fn disallowed_tag_or_ancestor_is_ignored() {
        let doc = doc(ElementSpec::new("body")
            .child(ElementSpec::new("script").id("js").text("var x = 1;"))
            .child(
                ElementSpec::new("noscript")
                    .child(ElementSpec::new("p").id("inner").text("Enable scripts")),
            ));
        let config = ContentConfig::default();
        assert_eq!(classify(&doc, by_id(&doc, "js"), &config), Classification::Ignored);
        assert_eq!(
            classify(&doc, by_id(&doc, "inner"), &config),
            Classification::Ignored
        );
    }

    #[test]
    fn image_needs_a_label() {
        let doc = doc(ElementSpec::new("body")
            .child(ElementSpec::new("img").id("labelled").attr("alt", "A red fox"))
            .child(ElementSpec::new("img").id("blank").attr("alt", "   "))
            .child(ElementSpec::new("img").id("titled").attr("title", "Sunset")));
        let config = ContentConfig::default();
        assert_eq!(
            classify(&doc, by_id(&doc, "labelled"), &config),
            Classification::Leaf
        );
        assert_eq!(
            classify(&doc, by_id(&doc, "blank"), &config),
            Classification::Container
        );
        assert_eq!(
            classify(&doc, by_id(&doc, "titled"), &config),
            Classification::Leaf
        );
    }

    #[test]
    fn text_in_unlisted_tag_is_pass_through() {
        let doc = doc(ElementSpec::new("body").child(ElementSpec::new("em").id("em").text("Emphasised text")));
        let config = ContentConfig::default();
        assert_eq!(classify(&doc, by_id(&doc, "em"), &config), Classification::Container);
    }

    #[test]
    fn detached_node_is_ignored() {
        let mut doc = doc(ElementSpec::new("body").child(ElementSpec::new("p").id("gone").text("Soon removed")));
        let gone = by_id(&doc, "gone");
        doc.detach(gone).unwrap();
        assert_eq!(
            classify(&doc, gone, &ContentConfig::default()),
            Classification::Ignored
        );
    }
}
