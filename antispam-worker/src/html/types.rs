//! Node classification for text extraction.

use scraper::Node;

/// Tags whose subtrees never contribute visible text.
pub const SKIPPED_TAGS: [&str; 3] = ["style", "script", "img"];

/// What a markup node means to the text extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind<'a> {
    /// A text node with its raw, untrimmed content.
    Text(&'a str),
    /// An element with its lowercase tag name.
    Element(&'a str),
    /// Document, doctype, comment and anything else: only children matter.
    Other,
}

impl<'a> NodeKind<'a> {
    /// Whether the node and its whole subtree are dropped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, NodeKind::Element(tag) if SKIPPED_TAGS.iter().any(|skipped| *skipped == *tag))
    }
}

impl<'a> From<&'a Node> for NodeKind<'a> {
    fn from(node: &'a Node) -> Self {
        match node {
            Node::Text(text) => NodeKind::Text(&**text),
            Node::Element(element) => NodeKind::Element(element.name()),
            _ => NodeKind::Other,
        }
    }
}
