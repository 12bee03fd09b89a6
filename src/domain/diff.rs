//! Structural tree diff.
//!
//! Compares two snapshots built from the same content type and produces a
//! sparse [`DiffNode`] tree: per level, which children disappeared and which
//! appeared, restricted to the paths that actually changed. Children are
//! correlated by content equality only; order is ignored.

use std::fmt;

use generational_arena::Index;
use termtree::Tree;
use tracing::{debug, instrument, trace};

use crate::domain::arena::{NodeKind, TreeArena};

/// One structural change at a single level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeMutation {
    /// Attach the new-tree subtree `node` under the old-tree `parent`.
    Insert { node: Index, parent: Index },
    /// Detach the old-tree child `node` from the old-tree `parent`.
    Remove { node: Index, parent: Index },
    /// Never produced by [`diff`]: a moved subtree shows up as a
    /// `Remove` plus an `Insert`.
    Move {
        node: Index,
        old_parent: Index,
        new_parent: Index,
    },
}

impl TreeMutation {
    pub fn node(&self) -> Index {
        match *self {
            TreeMutation::Insert { node, .. }
            | TreeMutation::Remove { node, .. }
            | TreeMutation::Move { node, .. } => node,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, TreeMutation::Insert { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, TreeMutation::Remove { .. })
    }
}

/// Changes below one old-tree node.
///
/// `node` and `source` identify the old-tree node the mutations apply to;
/// `children` hold the nested changes of matched (unchanged) child pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffNode<M> {
    pub node: Index,
    pub source: M,
    pub mutations: Vec<TreeMutation>,
    pub children: Vec<DiffNode<M>>,
}

impl<M> DiffNode<M> {
    /// Direct mutations at this level.
    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    /// Mutations at this level and every nested level.
    pub fn total_mutations(&self) -> usize {
        self.mutations.len()
            + self
                .children
                .iter()
                .map(DiffNode::total_mutations)
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.children.is_empty()
    }

    pub fn inserts(&self) -> impl Iterator<Item = &TreeMutation> {
        self.mutations.iter().filter(|m| m.is_insert())
    }

    pub fn removes(&self) -> impl Iterator<Item = &TreeMutation> {
        self.mutations.iter().filter(|m| m.is_remove())
    }

    /// Pre-order walk over this node and all nested diff nodes.
    pub fn iter(&self) -> DiffIter<'_, M> {
        DiffIter { stack: vec![self] }
    }
}

pub struct DiffIter<'a, M> {
    stack: Vec<&'a DiffNode<M>>,
}

impl<'a, M> Iterator for DiffIter<'a, M> {
    type Item = &'a DiffNode<M>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack.extend(current.children.iter().rev());
        Some(current)
    }
}

/// Outcome of matching two children lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiftResult {
    /// Removals in old order, then insertions in new order.
    pub mutations: Vec<TreeMutation>,
    /// Matched `(old child, new child)` pairs in old order.
    pub unchanged: Vec<(Index, Index)>,
}

/// Match the children of `old_parent` against `new_children` by content.
///
/// Each old child takes the last still-unmatched new child with equal
/// content. Whatever stays unmatched becomes a `Remove` (old side) or an
/// `Insert` (new side); both carry `old_parent` as parent.
pub fn sift<M: PartialEq>(
    old: &TreeArena<M>,
    old_parent: Index,
    old_children: &[Index],
    new: &TreeArena<M>,
    new_children: &[Index],
) -> SiftResult {
    let mut remaining_new: Vec<Index> = new_children.to_vec();
    let mut unmatched_old = Vec::new();
    let mut unchanged = Vec::new();

    for &old_child in old_children {
        let old_content = old.content(old_child);
        let found = remaining_new
            .iter()
            .rposition(|&candidate| old_content.is_some() && new.content(candidate) == old_content);
        match found {
            Some(pos) => {
                let new_child = remaining_new.remove(pos);
                unchanged.push((old_child, new_child));
            }
            None => unmatched_old.push(old_child),
        }
    }

    let mutations = unmatched_old
        .into_iter()
        .map(|node| TreeMutation::Remove {
            node,
            parent: old_parent,
        })
        .chain(remaining_new.into_iter().map(|node| TreeMutation::Insert {
            node,
            parent: old_parent,
        }))
        .collect();

    SiftResult {
        mutations,
        unchanged,
    }
}

/// Diff the subtree at `old_node` against the subtree at `new_node`.
///
/// The caller asserts the two nodes stand for the same position; their own
/// contents are not compared. Returns `None` when nothing below differs,
/// when both sides are leaves, or when a side cannot enumerate children.
pub fn diff<M>(
    old: &TreeArena<M>,
    old_node: Index,
    new: &TreeArena<M>,
    new_node: Index,
) -> Option<DiffNode<M>>
where
    M: PartialEq + Clone,
{
    let old_entry = old.get(old_node)?;
    let new_entry = new.get(new_node)?;

    let old_children = old_entry.children();
    let new_children = new_entry.children();
    if old_children.is_empty() && new_children.is_empty() {
        return None;
    }
    if (old_entry.kind() == NodeKind::Leaf && !new_children.is_empty())
        || (new_entry.kind() == NodeKind::Leaf && !old_children.is_empty())
    {
        trace!(?old_node, ?new_node, "leaf boundary, no diff");
        return None;
    }

    let SiftResult {
        mutations,
        unchanged,
    } = sift(old, old_node, old_children, new, new_children);

    let children: Vec<DiffNode<M>> = unchanged
        .into_iter()
        .filter_map(|(old_child, new_child)| diff(old, old_child, new, new_child))
        .collect();

    if mutations.is_empty() && children.is_empty() {
        return None;
    }

    Some(DiffNode {
        node: old_node,
        source: old_entry.content().clone(),
        mutations,
        children,
    })
}

/// Diff two whole snapshots starting at their roots.
#[instrument(level = "debug", skip_all)]
pub fn diff_trees<M>(old: &TreeArena<M>, new: &TreeArena<M>) -> Option<DiffNode<M>>
where
    M: PartialEq + Clone,
{
    let result = diff(old, old.root(), new, new.root());
    match &result {
        Some(d) => debug!(mutations = d.total_mutations(), "snapshots differ"),
        None => debug!("snapshots identical"),
    }
    result
}

/// Render a diff tree: each level shows its old-tree content, nested
/// levels as branches and mutations as `+`/`-` leaves.
pub fn render_diff<M: fmt::Display>(
    diff: &DiffNode<M>,
    old: &TreeArena<M>,
    new: &TreeArena<M>,
) -> Tree<String> {
    let mut tree = Tree::new(diff.source.to_string());
    for mutation in &diff.mutations {
        let line = match *mutation {
            TreeMutation::Remove { node, .. } => format!("- {}", label_of(old, node)),
            TreeMutation::Insert { node, .. } => format!("+ {}", label_of(new, node)),
            TreeMutation::Move { node, .. } => format!("~ {}", label_of(old, node)),
        };
        tree.push(Tree::new(line));
    }
    for child in &diff.children {
        tree.push(render_diff(child, old, new));
    }
    tree
}

fn label_of<M: fmt::Display>(arena: &TreeArena<M>, node: Index) -> String {
    arena
        .content(node)
        .map(ToString::to_string)
        .unwrap_or_else(|| "<missing>".to_string())
}
