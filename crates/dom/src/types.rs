//! Core node types for the in-memory DOM.
//!
//! Design:
//! 1. u32 indices into the arena, never pointers
//! 2. SmallVec for children (most nodes have <4)
//! 3. Class list derives from the `class` attribute - one source of truth

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Node identifier (index into the arena).
/// u32 allows 4 billion nodes, enough for any document.
pub type NodeId = u32;

/// Node kind, reduced to what this library manipulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Element,
    Text,
    Comment,
    Document,
}

/// A single DOM node stored in the arena.
///
/// Elements carry a lowercase tag name and an attribute map; text and
/// comment nodes carry their content in `value`. Inline styles live in a
/// separate map so `css()` mutations never reparse an attribute string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    pub node_id: NodeId,
    pub node_type: NodeType,

    /// Lowercase tag name for elements, "#text"/"#comment"/"#document" otherwise.
    pub name: String,

    /// Text content for Text/Comment nodes, empty for elements.
    pub value: String,

    pub attributes: AHashMap<String, String>,

    /// Inline style declarations (property -> value).
    pub style: AHashMap<String, String>,

    pub parent_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>,

    /// True for nodes parsed from markup or removed from the tree.
    /// Detached nodes never match document queries.
    pub detached: bool,
}

impl DomNode {
    pub fn element(node_id: NodeId, tag: &str) -> Self {
        Self {
            node_id,
            node_type: NodeType::Element,
            name: tag.to_ascii_lowercase(),
            value: String::new(),
            attributes: AHashMap::new(),
            style: AHashMap::new(),
            parent_id: None,
            children_ids: SmallVec::new(),
            detached: true,
        }
    }

    pub fn text(node_id: NodeId, content: &str) -> Self {
        Self {
            node_id,
            node_type: NodeType::Text,
            name: "#text".to_string(),
            value: content.to_string(),
            attributes: AHashMap::new(),
            style: AHashMap::new(),
            parent_id: None,
            children_ids: SmallVec::new(),
            detached: true,
        }
    }

    pub fn comment(node_id: NodeId, content: &str) -> Self {
        Self {
            node_id,
            node_type: NodeType::Comment,
            name: "#comment".to_string(),
            value: content.to_string(),
            attributes: AHashMap::new(),
            style: AHashMap::new(),
            parent_id: None,
            children_ids: SmallVec::new(),
            detached: true,
        }
    }

    pub fn document(node_id: NodeId) -> Self {
        Self {
            node_id,
            node_type: NodeType::Document,
            name: "#document".to_string(),
            value: String::new(),
            attributes: AHashMap::new(),
            style: AHashMap::new(),
            parent_id: None,
            children_ids: SmallVec::new(),
            detached: false,
        }
    }

    /// Tag name for element nodes.
    pub fn tag_name(&self) -> Option<&str> {
        if self.node_type == NodeType::Element {
            Some(&self.name)
        } else {
            None
        }
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Get attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Split the `class` attribute into individual class names.
    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| *c == class)
    }
}

/// Elements that never have a closing tag or children.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| tag.eq_ignore_ascii_case(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_lowercases_tag() {
        let node = DomNode::element(0, "DIV");
        assert_eq!(node.tag_name(), Some("div"));
        assert!(node.is_element());
        assert!(node.detached);
    }

    #[test]
    fn test_classes_split() {
        let mut node = DomNode::element(0, "p");
        node.attributes
            .insert("class".to_string(), "note  highlight".to_string());
        assert_eq!(node.classes(), vec!["note", "highlight"]);
        assert!(node.has_class("note"));
        assert!(!node.has_class("missing"));
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void_element("br"));
        assert!(is_void_element("IMG"));
        assert!(!is_void_element("div"));
    }
}
