//! DOM Tree (arena-based allocation)
//!
//! Detached nodes stay in the arena so that any `NodeId` handed out remains
//! a valid handle; `is_connected` tells whether it is still in the document.

use crate::{DomError, ElementData, ElementGeometry, Node, NodeId};

/// Arena-based DOM tree
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a tree holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::document()],
        }
    }

    /// Document node
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Number of nodes in the arena (connected or not)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::element(tag))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(Node::text(content))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id).and_then(Node::as_element_mut)
    }

    fn element_or_err(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match self.get_mut(id) {
            None => Err(DomError::NotFound(id)),
            Some(node) => node.as_element_mut().ok_or(DomError::NotAnElement(id)),
        }
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(|p| p.is_valid())
    }

    /// Unlink a node from its parent. The node and its subtree stay in the
    /// arena, disconnected.
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else { return };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        if !parent.is_valid() {
            return;
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = next;
        } else {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = prev;
        } else {
            self.nodes[parent.index()].last_child = prev;
        }

        let node = &mut self.nodes[id.index()];
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
    }

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.get(parent).is_none() {
            return Err(DomError::NotFound(parent));
        }
        if self.get(child).is_none() {
            return Err(DomError::NotFound(child));
        }
        self.detach(child);

        let last = self.nodes[parent.index()].last_child;
        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = last;
        }
        if last.is_valid() {
            self.nodes[last.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        self.nodes[parent.index()].last_child = child;
        Ok(())
    }

    /// Insert `new` immediately before `reference` under the same parent
    pub fn insert_before(&mut self, new: NodeId, reference: NodeId) -> Result<(), DomError> {
        if self.get(new).is_none() {
            return Err(DomError::NotFound(new));
        }
        let parent = self.parent(reference).ok_or(DomError::NoParent(reference))?;
        self.detach(new);

        let prev = self.nodes[reference.index()].prev_sibling;
        {
            let node = &mut self.nodes[new.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        self.nodes[reference.index()].prev_sibling = new;
        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = new;
        } else {
            self.nodes[parent.index()].first_child = new;
        }
        Ok(())
    }

    /// Detach every child of `id`
    pub fn remove_children(&mut self, id: NodeId) {
        while let Some(child) = self.get(id).map(|n| n.first_child).filter(|c| c.is_valid()) {
            self.detach(child);
        }
    }

    /// Copy-construct a detached node with the same attributes, style and
    /// geometry. `deep` also copies the subtree.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> Result<NodeId, DomError> {
        let copy = self.get(id).ok_or(DomError::NotFound(id))?.detached_copy();
        let clone = self.push(copy);
        if deep {
            let children: Vec<NodeId> = self.children(id).map(|(child, _)| child).collect();
            for child in children {
                let child_clone = self.clone_node(child, true)?;
                self.append_child(clone, child_clone)?;
            }
        }
        Ok(clone)
    }

    /// Iterate direct children as `(id, node)`
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).map(|n| n.first_child).unwrap_or(NodeId::NONE),
        }
    }

    /// Parent chain, nearest first
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// All descendants of `id` in document (pre-)order, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).map(|(c, _)| c).collect();
        stack.reverse();
        while let Some(current) = stack.pop() {
            out.push(current);
            let mut kids: Vec<NodeId> = self.children(current).map(|(c, _)| c).collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// Whether the node is reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        id == NodeId::ROOT || self.ancestors(id).any(|a| a == NodeId::ROOT)
    }

    // ------------------------------------------------------------------
    // Element helpers
    // ------------------------------------------------------------------

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attrs.get(name))
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|e| e.attrs.has(name))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.element_or_err(id)?.attrs.set(name, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id).and_then(|e| e.attrs.remove(name))
    }

    /// Inline style value only
    pub fn inline_style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.style.get_property(property))
    }

    /// Computed style value; empty for non-elements
    pub fn computed_style(&self, id: NodeId, property: &str) -> &str {
        self.element(id)
            .map(|e| e.computed_value(property))
            .unwrap_or("")
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> Result<(), DomError> {
        self.element_or_err(id)?.style.set_property(property, value);
        Ok(())
    }

    pub fn remove_style(&mut self, id: NodeId, property: &str) -> Option<String> {
        self.element_mut(id).and_then(|e| e.style.remove_property(property))
    }

    /// Put an inline value back exactly: `Some` sets it, `None` removes it
    pub fn restore_style(&mut self, id: NodeId, property: &str, value: Option<&str>) {
        match value {
            Some(v) => {
                let _ = self.set_style(id, property, v);
            }
            None => {
                self.remove_style(id, property);
            }
        }
    }

    pub fn geometry(&self, id: NodeId) -> Option<ElementGeometry> {
        self.element(id).map(|e| e.geometry)
    }

    pub fn set_geometry(&mut self, id: NodeId, geometry: ElementGeometry) -> Result<(), DomError> {
        self.element_or_err(id)?.geometry = geometry;
        Ok(())
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Child iterator
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next;
        let node = self.tree.get(id)?;
        self.next = node.next_sibling;
        Some((id, node))
    }
}
