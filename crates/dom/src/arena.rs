//! Arena-based DOM tree storage.
//!
//! One Vec holds every node, connected or detached; identity is the u32
//! index. This eliminates:
//! - Rc/Arc overhead per node
//! - Recursive traversal (stack overflow risk)
//! - Cache misses (nodes stored sequentially)
//!
//! Detached nodes (parsed fragments, removed subtrees) stay in the arena
//! but never match document queries.

use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};
use ahash::AHashMap;

/// The document: arena storage plus an id-attribute index.
#[derive(Debug)]
pub struct Document {
    /// All nodes stored sequentially (cache-friendly).
    nodes: Vec<DomNode>,

    /// `id` attribute -> NodeId lookup for the `#id` selector fast path.
    id_index: AHashMap<String, NodeId>,

    /// The #document node, created up front.
    root_id: NodeId,
}

impl Document {
    /// Create a new document containing only the #document root.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity);
        nodes.push(DomNode::document(0));
        Self {
            nodes,
            id_index: AHashMap::with_capacity(capacity / 4),
            root_id: 0,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    /// Get node by ID (immutable).
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable).
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Total number of nodes, detached included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomNode> {
        self.nodes.iter()
    }

    /// Whether a node is reachable from the document root.
    pub fn is_connected(&self, node_id: NodeId) -> bool {
        self.get(node_id).map(|n| !n.detached).unwrap_or(false)
    }

    pub fn parent(&self, node_id: NodeId) -> Result<Option<&DomNode>> {
        let node = self.get(node_id)?;
        match node.parent_id {
            Some(parent_id) => Ok(Some(self.get(parent_id)?)),
            None => Ok(None),
        }
    }

    pub fn children(&self, node_id: NodeId) -> Result<Vec<&DomNode>> {
        let node = self.get(node_id)?;
        node.children_ids
            .iter()
            .map(|&child_id| self.get(child_id))
            .collect()
    }

    /// Traverse a subtree depth-first, left to right (iterative, no recursion).
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// All connected element ids in document order.
    pub fn document_elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let _ = self.traverse_df(self.root_id, |node| {
            if node.is_element() {
                out.push(node.node_id);
            }
            Ok(())
        });
        out
    }

    // ---- node construction ----

    fn push(&mut self, node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        node_id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.push(DomNode::element(id, tag))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.push(DomNode::text(id, content))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, content: &str) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.push(DomNode::comment(id, content))
    }

    // ---- tree mutation ----

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.unlink(child)?;
        self.get_mut(parent)?.children_ids.push(child);
        self.get_mut(child)?.parent_id = Some(parent);
        let attached = self.is_connected(parent);
        self.mark_subtree(child, !attached)?;
        Ok(())
    }

    /// Insert `child` as the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.unlink(child)?;
        self.get_mut(parent)?.children_ids.insert(0, child);
        self.get_mut(child)?.parent_id = Some(parent);
        let attached = self.is_connected(parent);
        self.mark_subtree(child, !attached)?;
        Ok(())
    }

    /// Insert `node` as a sibling immediately before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<()> {
        let parent = self
            .get(reference)?
            .parent_id
            .ok_or(DomError::NodeNotFound(reference))?;
        self.unlink(node)?;
        let pos = self.child_position(parent, reference)?;
        self.get_mut(parent)?.children_ids.insert(pos, node);
        self.get_mut(node)?.parent_id = Some(parent);
        let attached = self.is_connected(parent);
        self.mark_subtree(node, !attached)?;
        Ok(())
    }

    /// Insert `node` as a sibling immediately after `reference`.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> Result<()> {
        let parent = self
            .get(reference)?
            .parent_id
            .ok_or(DomError::NodeNotFound(reference))?;
        self.unlink(node)?;
        let pos = self.child_position(parent, reference)? + 1;
        self.get_mut(parent)?.children_ids.insert(pos, node);
        self.get_mut(node)?.parent_id = Some(parent);
        let attached = self.is_connected(parent);
        self.mark_subtree(node, !attached)?;
        Ok(())
    }

    /// Unlink a node from its parent and mark the subtree detached.
    pub fn detach(&mut self, node_id: NodeId) -> Result<()> {
        self.unlink(node_id)?;
        self.mark_subtree(node_id, true)
    }

    /// Replace `old` with `new` in the tree; `old` becomes detached.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        self.insert_before(old, new)?;
        self.detach(old)
    }

    /// Deep-copy a subtree; the copy is detached and has fresh ids.
    pub fn clone_subtree(&mut self, node_id: NodeId) -> Result<NodeId> {
        let source = self.get(node_id)?.clone();
        let copy_id = self.nodes.len() as NodeId;
        let mut copy = source.clone();
        copy.node_id = copy_id;
        copy.parent_id = None;
        copy.children_ids.clear();
        copy.detached = true;
        self.push(copy);

        for child_id in source.children_ids {
            let child_copy = self.clone_subtree(child_id)?;
            self.get_mut(copy_id)?.children_ids.push(child_copy);
            self.get_mut(child_copy)?.parent_id = Some(copy_id);
        }

        Ok(copy_id)
    }

    fn unlink(&mut self, node_id: NodeId) -> Result<()> {
        let parent_id = self.get(node_id)?.parent_id;
        if let Some(parent_id) = parent_id {
            let parent = self.get_mut(parent_id)?;
            parent.children_ids.retain(|c| *c != node_id);
            self.get_mut(node_id)?.parent_id = None;
        }
        Ok(())
    }

    fn child_position(&self, parent: NodeId, child: NodeId) -> Result<usize> {
        self.get(parent)?
            .children_ids
            .iter()
            .position(|&c| c == child)
            .ok_or(DomError::NodeNotFound(child))
    }

    fn mark_subtree(&mut self, start: NodeId, detached: bool) -> Result<()> {
        let mut stack = vec![start];
        while let Some(node_id) = stack.pop() {
            let node = self.get_mut(node_id)?;
            node.detached = detached;
            stack.extend(node.children_ids.iter().copied());
        }
        Ok(())
    }

    // ---- attributes / classes / style ----

    /// Set an attribute. The `id` attribute feeds the selector fast path;
    /// the `style` attribute is parsed into the style map instead.
    pub fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        if !self.get(node_id)?.is_element() {
            return Err(DomError::NotAnElement(node_id));
        }
        if name.eq_ignore_ascii_case("style") {
            let node = self.get_mut(node_id)?;
            node.style.clear();
            for decl in value.split(';') {
                if let Some((prop, val)) = decl.split_once(':') {
                    let prop = prop.trim();
                    let val = val.trim();
                    if !prop.is_empty() && !val.is_empty() {
                        node.style.insert(prop.to_ascii_lowercase(), val.to_string());
                    }
                }
            }
            return Ok(());
        }
        if name == "id" {
            // Evict the entry for the previous id, or `#old` keeps matching
            // a renamed node through the fast path.
            if let Some(old) = self.get(node_id)?.attr("id") {
                let old = old.to_string();
                self.id_index.remove(&old);
            }
            self.id_index.insert(value.to_string(), node_id);
        }
        self.get_mut(node_id)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        if name == "id" {
            if let Some(old) = self.get(node_id)?.attr("id") {
                let old = old.to_string();
                self.id_index.remove(&old);
            }
        }
        if name.eq_ignore_ascii_case("style") {
            self.get_mut(node_id)?.style.clear();
            return Ok(());
        }
        self.get_mut(node_id)?.attributes.remove(name);
        Ok(())
    }

    /// Resolve `#id` via the index; misses and detached hits fall through.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index
            .get(id)
            .copied()
            .filter(|&node_id| self.is_connected(node_id))
    }

    pub fn add_class(&mut self, node_id: NodeId, class: &str) -> Result<()> {
        let node = self.get(node_id)?;
        if node.has_class(class) {
            return Ok(());
        }
        let mut classes = node.attr("class").unwrap_or("").trim().to_string();
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(class);
        self.set_attr(node_id, "class", &classes)
    }

    pub fn remove_class(&mut self, node_id: NodeId, class: &str) -> Result<()> {
        let node = self.get(node_id)?;
        let kept: Vec<&str> = node
            .classes()
            .into_iter()
            .filter(|c| *c != class)
            .collect();
        let joined = kept.join(" ");
        self.set_attr(node_id, "class", &joined)
    }

    pub fn toggle_class(&mut self, node_id: NodeId, class: &str) -> Result<()> {
        if self.get(node_id)?.has_class(class) {
            self.remove_class(node_id, class)
        } else {
            self.add_class(node_id, class)
        }
    }

    pub fn set_style_prop(&mut self, node_id: NodeId, prop: &str, value: &str) -> Result<()> {
        if !self.get(node_id)?.is_element() {
            return Err(DomError::NotAnElement(node_id));
        }
        self.get_mut(node_id)?
            .style
            .insert(prop.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    pub fn style_prop(&self, node_id: NodeId, prop: &str) -> Result<Option<String>> {
        Ok(self.get(node_id)?.style.get(prop).cloned())
    }

    // ---- text / value ----

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, node_id: NodeId, text: &str) -> Result<()> {
        let children: Vec<NodeId> = self.get(node_id)?.children_ids.iter().copied().collect();
        for child in children {
            self.detach(child)?;
        }
        let text_node = self.create_text(text);
        self.append_child(node_id, text_node)
    }

    /// Concatenated descendant text, trimmed.
    pub fn text_content(&self, node_id: NodeId) -> Result<String> {
        let mut text = String::new();
        self.traverse_df(node_id, |node| {
            if node.node_type == NodeType::Text {
                text.push_str(&node.value);
            }
            Ok(())
        })?;
        Ok(text.trim().to_string())
    }

    /// Form control value, backed by the `value` attribute.
    pub fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        self.set_attr(node_id, "value", value)
    }

    pub fn value(&self, node_id: NodeId) -> Result<Option<String>> {
        Ok(self.get(node_id)?.attr("value").map(String::from))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_div() -> (Document, NodeId) {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let root = doc.root_id();
        doc.append_child(root, div).unwrap();
        (doc, div)
    }

    #[test]
    fn test_append_attaches_subtree() {
        let (mut doc, div) = doc_with_div();
        let span = doc.create_element("span");
        let text = doc.create_text("hi");
        doc.append_child(span, text).unwrap();
        assert!(!doc.is_connected(span));

        doc.append_child(div, span).unwrap();
        assert!(doc.is_connected(span));
        assert!(doc.is_connected(text));
    }

    #[test]
    fn test_detach_marks_subtree() {
        let (mut doc, div) = doc_with_div();
        let span = doc.create_element("span");
        doc.append_child(div, span).unwrap();

        doc.detach(div).unwrap();
        assert!(!doc.is_connected(div));
        assert!(!doc.is_connected(span));
        assert!(doc.get(div).unwrap().parent_id.is_none());
    }

    #[test]
    fn test_insert_before_after_order() {
        let (mut doc, div) = doc_with_div();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let c = doc.create_element("c");
        doc.append_child(div, b).unwrap();
        doc.insert_before(b, a).unwrap();
        doc.insert_after(b, c).unwrap();

        let names: Vec<String> = doc
            .children(div)
            .unwrap()
            .iter()
            .map(|n| n.name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_clone_subtree_fresh_ids() {
        let (mut doc, div) = doc_with_div();
        let text = doc.create_text("hello");
        doc.append_child(div, text).unwrap();

        let copy = doc.clone_subtree(div).unwrap();
        assert_ne!(copy, div);
        assert!(!doc.is_connected(copy));
        assert_eq!(doc.text_content(copy).unwrap(), "hello");
        // original untouched
        assert!(doc.is_connected(div));
    }

    #[test]
    fn test_id_index_tracks_connectivity() {
        let (mut doc, div) = doc_with_div();
        doc.set_attr(div, "id", "main").unwrap();
        assert_eq!(doc.element_by_id("main"), Some(div));

        doc.detach(div).unwrap();
        assert_eq!(doc.element_by_id("main"), None);
    }

    #[test]
    fn test_class_helpers() {
        let (mut doc, div) = doc_with_div();
        doc.add_class(div, "note").unwrap();
        doc.add_class(div, "hot").unwrap();
        doc.add_class(div, "note").unwrap(); // no duplicate
        assert_eq!(doc.get(div).unwrap().attr("class"), Some("note hot"));

        doc.toggle_class(div, "hot").unwrap();
        assert!(!doc.get(div).unwrap().has_class("hot"));
        doc.remove_class(div, "note").unwrap();
        assert_eq!(doc.get(div).unwrap().attr("class"), Some(""));
    }

    #[test]
    fn test_style_attr_parses_into_map() {
        let (mut doc, div) = doc_with_div();
        doc.set_attr(div, "style", "color: red; margin-top:4px").unwrap();
        assert_eq!(doc.style_prop(div, "color").unwrap().as_deref(), Some("red"));
        assert_eq!(
            doc.style_prop(div, "margin-top").unwrap().as_deref(),
            Some("4px")
        );
    }

    #[test]
    fn test_set_text_replaces_children() {
        let (mut doc, div) = doc_with_div();
        let span = doc.create_element("span");
        doc.append_child(div, span).unwrap();

        doc.set_text(div, "plain").unwrap();
        assert_eq!(doc.text_content(div).unwrap(), "plain");
        assert!(!doc.is_connected(span));
        assert_eq!(doc.children(div).unwrap().len(), 1);
    }

    #[test]
    fn test_replace_node() {
        let (mut doc, div) = doc_with_div();
        let p = doc.create_element("p");
        doc.replace_node(div, p).unwrap();

        assert!(doc.is_connected(p));
        assert!(!doc.is_connected(div));
        let root = doc.root_id();
        let names: Vec<String> = doc
            .children(root)
            .unwrap()
            .iter()
            .map(|n| n.name.clone())
            .collect();
        assert_eq!(names, vec!["p"]);
    }
}
