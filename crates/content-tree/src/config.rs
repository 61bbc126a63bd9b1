//! Tag lists and thresholds that decide what counts as content.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

const LEAF_TAGS: &[&str] = &[
    "p", "a", "div", "img", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "span", "li", "td", "th",
    "button", "time", "label", "legend", "strong", "blockquote",
];

const CONTAINER_TAGS: &[&str] = &[
    "section", "div", "article", "main", "ul", "ol", "li", "header",
];

const DISALLOWED_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "template"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub allowed_container_tags: BTreeSet<String>,
    pub allowed_leaf_tags: BTreeSet<String>,
    pub disallowed_tags: BTreeSet<String>,
    /// Elements whose content is their label attribute rather than text.
    pub image_tags: BTreeSet<String>,
    /// Label attributes in lookup order.
    pub label_attributes: Vec<String>,
    pub min_content_length: usize,
    /// Qualifying leaves a container needs before it is tracked as a group.
    pub min_group_size: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            allowed_container_tags: tag_set(CONTAINER_TAGS),
            allowed_leaf_tags: tag_set(LEAF_TAGS),
            disallowed_tags: tag_set(DISALLOWED_TAGS),
            image_tags: tag_set(&["img"]),
            label_attributes: vec!["alt".into(), "title".into(), "aria-label".into()],
            min_content_length: 5,
            min_group_size: 2,
        }
    }
}

impl ContentConfig {
    /// Lower-cases every tag list so lookups match [`crate::DomView::tag`].
    pub fn normalized(mut self) -> Self {
        for set in [
            &mut self.allowed_container_tags,
            &mut self.allowed_leaf_tags,
            &mut self.disallowed_tags,
            &mut self.image_tags,
        ] {
            *set = set.iter().map(|tag| tag.trim().to_ascii_lowercase()).collect();
        }
        self
    }

    pub fn is_disallowed(&self, tag: &str) -> bool {
        self.disallowed_tags.contains(tag)
    }

    pub fn is_leaf_tag(&self, tag: &str) -> bool {
        self.allowed_leaf_tags.contains(tag)
    }

    pub fn is_container_tag(&self, tag: &str) -> bool {
        self.allowed_container_tags.contains(tag)
    }

    pub fn is_image(&self, tag: &str) -> bool {
        self.image_tags.contains(tag)
    }

    /// Tags a text selection may resolve to.
    pub fn is_allowed(&self, tag: &str) -> bool {
        self.is_leaf_tag(tag) || self.is_container_tag(tag)
    }
}

fn tag_set(tags: &[&str]) -> BTreeSet<String> {
    tags.iter().map(|tag| tag.to_string()).collect()
}
