//! Arena-backed ownership tree.
//!
//! Every node lives in a generational arena and is addressed by its [`Index`].
//! A parent owns its children through the `children` list; the `parent` field
//! is a non-owning back reference. Stale indices never panic: queries return
//! `None` or an empty slice and mutations fail with
//! [`InvalidOperation::NodeNotFound`].

use generational_arena::{Arena, Index};
use tracing::{debug, instrument, trace};

use crate::domain::error::{DomainResult, InvalidOperation};

/// Structural capability of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The single parentless node of a tree; can never be re-parented.
    Root,
    /// Regular node that may own children.
    Internal,
    /// Content-only node; children operations always fail.
    Leaf,
}

impl NodeKind {
    pub fn allows_children(self) -> bool {
        !matches!(self, NodeKind::Leaf)
    }
}

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug, Clone)]
pub struct TreeNode<M> {
    content: M,
    kind: NodeKind,
    parent: Option<Index>,
    children: Vec<Index>,
}

impl<M> TreeNode<M> {
    fn new(content: M, kind: NodeKind) -> Self {
        Self {
            content,
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn content(&self) -> &M {
        &self.content
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Back reference to the owning node, `None` for roots and detached nodes.
    pub fn parent(&self) -> Option<Index> {
        self.parent
    }

    /// Direct children in insertion order.
    pub fn children(&self) -> &[Index] {
        &self.children
    }

    pub fn allows_children(&self) -> bool {
        self.kind.allows_children()
    }

    /// A node is a leaf if its kind forbids children or it currently has none.
    pub fn is_leaf(&self) -> bool {
        !self.allows_children() || self.children.is_empty()
    }

    fn set_parent(&mut self, parent: Option<Index>) {
        match self.kind {
            NodeKind::Root => {}
            NodeKind::Internal | NodeKind::Leaf => self.parent = parent,
        }
    }
}

/// Arena-based tree with exactly one root.
///
/// Detached nodes (created but not yet attached, or removed from their
/// parent) stay in storage until attached again or [`TreeArena::prune`]d.
#[derive(Debug, Clone)]
pub struct TreeArena<M> {
    arena: Arena<TreeNode<M>>,
    root: Index,
}

impl<M> TreeArena<M> {
    pub fn new(root: M) -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(TreeNode::new(root, NodeKind::Root));
        Self { arena, root }
    }

    pub fn root(&self) -> Index {
        self.root
    }

    pub fn get(&self, idx: Index) -> Option<&TreeNode<M>> {
        self.arena.get(idx)
    }

    pub fn contains(&self, idx: Index) -> bool {
        self.arena.contains(idx)
    }

    pub fn content(&self, idx: Index) -> Option<&M> {
        self.get(idx).map(TreeNode::content)
    }

    pub fn kind(&self, idx: Index) -> Option<NodeKind> {
        self.get(idx).map(TreeNode::kind)
    }

    pub fn parent(&self, idx: Index) -> Option<Index> {
        self.get(idx).and_then(TreeNode::parent)
    }

    /// Children of `idx`; empty for leaves and stale indices.
    pub fn children(&self, idx: Index) -> &[Index] {
        self.get(idx).map(TreeNode::children).unwrap_or(&[])
    }

    pub fn allows_children(&self, idx: Index) -> bool {
        self.get(idx).map(TreeNode::allows_children).unwrap_or(false)
    }

    /// True for leaf-kind nodes, childless nodes and stale indices.
    pub fn is_leaf(&self, idx: Index) -> bool {
        self.get(idx).map(TreeNode::is_leaf).unwrap_or(true)
    }

    /// Whether `ancestor` is a proper ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: Index, node: Index) -> bool {
        let mut current = self.parent(node);
        while let Some(idx) = current {
            if idx == ancestor {
                return true;
            }
            current = self.parent(idx);
        }
        false
    }

    /// Ancestors of `node`, from its parent up to the topmost node.
    pub fn ancestors(&self, node: Index) -> Vec<Index> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(node);
        while let Some(idx) = current {
            ancestors.push(idx);
            current = self.parent(idx);
        }
        ancestors
    }

    /// Position of `child` in the children list of `parent`.
    pub fn position(&self, parent: Index, child: Index) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// First direct child of `parent` whose content satisfies `predicate`.
    pub fn find_child<P>(&self, parent: Index, predicate: P) -> Option<Index>
    where
        P: Fn(&M) -> bool,
    {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.content(child).map(&predicate).unwrap_or(false))
    }

    /// Create a detached node that may own children.
    pub fn create_internal(&mut self, content: M) -> Index {
        self.arena.insert(TreeNode::new(content, NodeKind::Internal))
    }

    /// Create a detached node that can never own children.
    pub fn create_leaf(&mut self, content: M) -> Index {
        self.arena.insert(TreeNode::new(content, NodeKind::Leaf))
    }

    /// Attach `child` as the last child of `parent`.
    ///
    /// The child must be detached: re-parenting is the caller's job.
    #[instrument(level = "trace", skip(self))]
    pub fn add_child(&mut self, parent: Index, child: Index) -> DomainResult<()> {
        let parent_node = self.get(parent).ok_or(InvalidOperation::NodeNotFound)?;
        let child_node = self.get(child).ok_or(InvalidOperation::NodeNotFound)?;

        if !parent_node.allows_children() {
            return Err(InvalidOperation::ChildrenNotAllowed.into());
        }
        if child_node.kind() == NodeKind::Root {
            return Err(InvalidOperation::RootCannotBeChild.into());
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(InvalidOperation::WouldCycle.into());
        }
        if child_node.parent().is_some() {
            return Err(InvalidOperation::AlreadyAttached.into());
        }

        if let Some(node) = self.arena.get_mut(child) {
            node.set_parent(Some(parent));
        }
        if let Some(node) = self.arena.get_mut(parent) {
            node.children.push(child);
        }
        trace!(?parent, ?child, "attached");
        Ok(())
    }

    /// Create an internal node and attach it under `parent`.
    pub fn add_internal(&mut self, parent: Index, content: M) -> DomainResult<Index> {
        let child = self.create_internal(content);
        self.attach_created(parent, child)
    }

    /// Create a leaf node and attach it under `parent`.
    pub fn add_leaf(&mut self, parent: Index, content: M) -> DomainResult<Index> {
        let child = self.create_leaf(content);
        self.attach_created(parent, child)
    }

    fn attach_created(&mut self, parent: Index, child: Index) -> DomainResult<Index> {
        if let Err(e) = self.add_child(parent, child) {
            self.arena.remove(child);
            return Err(e);
        }
        Ok(child)
    }

    /// Detach `child` from `parent`, clearing its back reference.
    ///
    /// Returns `false` (and changes nothing) if `child` is not a child of `parent`.
    #[instrument(level = "trace", skip(self))]
    pub fn remove_child(&mut self, parent: Index, child: Index) -> bool {
        let Some(pos) = self.position(parent, child) else {
            return false;
        };
        if let Some(node) = self.arena.get_mut(parent) {
            node.children.remove(pos);
        }
        if let Some(node) = self.arena.get_mut(child) {
            node.set_parent(None);
        }
        trace!(?parent, ?child, "detached");
        true
    }

    /// Detach `node` from whatever parent currently owns it.
    pub fn detach(&mut self, node: Index) -> bool {
        match self.parent(node) {
            Some(parent) => self.remove_child(parent, node),
            None => false,
        }
    }

    /// Free the storage of a detached subtree; returns the number of nodes freed.
    ///
    /// The root and attached nodes are left alone.
    #[instrument(level = "trace", skip(self))]
    pub fn prune(&mut self, node: Index) -> usize {
        if node == self.root || self.parent(node).is_some() || !self.contains(node) {
            return 0;
        }
        let mut freed = 0;
        let mut stack = vec![node];
        while let Some(idx) = stack.pop() {
            if let Some(removed) = self.arena.remove(idx) {
                stack.extend(removed.children);
                freed += 1;
            }
        }
        trace!(freed, "pruned subtree");
        freed
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Number of levels below and including the root.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.calculate_depth(self.root)
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if !self.contains(node_idx) {
            return 0;
        }
        1 + self
            .children(node_idx)
            .iter()
            .map(|&child| self.calculate_depth(child))
            .max()
            .unwrap_or(0)
    }

    /// Collects all reachable leaf nodes in pre-order.
    pub fn leaf_nodes(&self) -> Vec<Index> {
        self.iter()
            .filter(|(_, node)| node.is_leaf())
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn iter(&self) -> TreeIterator<'_, M> {
        TreeIterator::new(self, self.root)
    }

    pub fn iter_postorder(&self) -> PostOrderIterator<'_, M> {
        PostOrderIterator::new(self, self.root)
    }
}

impl<M: Clone> TreeArena<M> {
    /// Deep-copy the subtree at `source_node` of `source` under `parent`.
    ///
    /// Kinds, contents and child order are preserved; a copied root becomes
    /// an internal node. Returns the index of the copy in this arena.
    #[instrument(level = "debug", skip(self, source))]
    pub fn graft(
        &mut self,
        parent: Index,
        source: &TreeArena<M>,
        source_node: Index,
    ) -> DomainResult<Index> {
        if !self.contains(parent) || !source.contains(source_node) {
            return Err(InvalidOperation::NodeNotFound.into());
        }
        if !self.allows_children(parent) {
            return Err(InvalidOperation::ChildrenNotAllowed.into());
        }
        let copy = self
            .copy_subtree(source, source_node)
            .ok_or(InvalidOperation::NodeNotFound)?;
        if let Err(e) = self.add_child(parent, copy) {
            self.prune(copy);
            return Err(e);
        }
        debug!(?parent, ?copy, "grafted subtree");
        Ok(copy)
    }

    fn copy_subtree(&mut self, source: &TreeArena<M>, source_node: Index) -> Option<Index> {
        let node = source.get(source_node)?;
        let kind = match node.kind {
            NodeKind::Root => NodeKind::Internal,
            other => other,
        };
        let copy = self.arena.insert(TreeNode::new(node.content.clone(), kind));
        for &child in node.children() {
            if let Some(child_copy) = self.copy_subtree(source, child) {
                if let Some(copied) = self.arena.get_mut(child_copy) {
                    copied.set_parent(Some(copy));
                }
                if let Some(parent) = self.arena.get_mut(copy) {
                    parent.children.push(child_copy);
                }
            }
        }
        Some(copy)
    }
}

pub struct TreeIterator<'a, M> {
    arena: &'a TreeArena<M>,
    stack: Vec<Index>,
}

impl<'a, M> TreeIterator<'a, M> {
    fn new(arena: &'a TreeArena<M>, start: Index) -> Self {
        Self {
            arena,
            stack: vec![start],
        }
    }
}

impl<'a, M> Iterator for TreeIterator<'a, M> {
    type Item = (Index, &'a TreeNode<M>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get(current_idx) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children.iter().rev());
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a, M> {
    arena: &'a TreeArena<M>,
    stack: Vec<(Index, bool)>,
}

impl<'a, M> PostOrderIterator<'a, M> {
    fn new(arena: &'a TreeArena<M>, start: Index) -> Self {
        Self {
            arena,
            stack: vec![(start, false)],
        }
    }
}

impl<'a, M> Iterator for PostOrderIterator<'a, M> {
    type Item = (Index, &'a TreeNode<M>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.arena.get(current_idx) {
                if visited {
                    return Some((current_idx, node));
                }
                self.stack.push((current_idx, true));
                for &child in node.children.iter().rev() {
                    self.stack.push((child, false));
                }
            }
        }
        None
    }
}
