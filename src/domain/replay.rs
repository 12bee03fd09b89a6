//! Replays a diff tree onto the live tree.
//!
//! Unchanged live nodes keep their indices, so per-node display state held
//! by a renderer (selection, expansion) survives the update.

use std::fmt;

use generational_arena::Index;
use tracing::{debug, instrument, warn};

use crate::domain::arena::TreeArena;
use crate::domain::diff::{DiffNode, TreeMutation};
use crate::domain::error::DomainResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Insert,
    Remove,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Insert => write!(f, "+"),
            MutationKind::Remove => write!(f, "-"),
        }
    }
}

/// A mutation as it was applied, described by content rather than index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMutation<M> {
    pub kind: MutationKind,
    pub parent: M,
    pub node: M,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport<M> {
    pub applied: Vec<AppliedMutation<M>>,
    /// Levels or mutations that could not be correlated with the live tree
    pub skipped: usize,
}

impl<M> Default for ReplayReport<M> {
    fn default() -> Self {
        Self {
            applied: Vec::new(),
            skipped: 0,
        }
    }
}

impl<M> ReplayReport<M> {
    pub fn inserted(&self) -> usize {
        self.applied
            .iter()
            .filter(|m| m.kind == MutationKind::Insert)
            .count()
    }

    pub fn removed(&self) -> usize {
        self.applied
            .iter()
            .filter(|m| m.kind == MutationKind::Remove)
            .count()
    }
}

/// Apply `diff` to the subtree of `live` rooted at `live_node`.
///
/// `snapshot` is the arena the diff's `Insert` nodes point into. A level
/// whose live content no longer matches the diff is skipped, not failed, and
/// so is an insert the live node cannot take (a leaf).
#[instrument(level = "debug", skip_all)]
pub fn apply<M>(
    live: &mut TreeArena<M>,
    live_node: Index,
    diff: &DiffNode<M>,
    snapshot: &TreeArena<M>,
) -> DomainResult<ReplayReport<M>>
where
    M: PartialEq + Clone + fmt::Debug,
{
    let mut report = ReplayReport::default();
    apply_level(live, live_node, diff, snapshot, &mut report)?;
    debug!(
        applied = report.applied.len(),
        skipped = report.skipped,
        "replayed diff"
    );
    Ok(report)
}

/// Apply `diff` starting at the live root.
pub fn apply_to_root<M>(
    live: &mut TreeArena<M>,
    diff: &DiffNode<M>,
    snapshot: &TreeArena<M>,
) -> DomainResult<ReplayReport<M>>
where
    M: PartialEq + Clone + fmt::Debug,
{
    let root = live.root();
    apply(live, root, diff, snapshot)
}

fn apply_level<M>(
    live: &mut TreeArena<M>,
    live_node: Index,
    diff: &DiffNode<M>,
    snapshot: &TreeArena<M>,
    report: &mut ReplayReport<M>,
) -> DomainResult<()>
where
    M: PartialEq + Clone + fmt::Debug,
{
    let parent_content = match live.content(live_node) {
        Some(content) if *content == diff.source => content.clone(),
        other => {
            warn!(live = ?other, expected = ?diff.source, "live node out of sync, skipping level");
            report.skipped += 1;
            return Ok(());
        }
    };

    for mutation in &diff.mutations {
        match *mutation {
            TreeMutation::Remove { node, .. } => {
                let content = live.content(node).cloned();
                match content {
                    Some(content) if live.remove_child(live_node, node) => {
                        live.prune(node);
                        report.applied.push(AppliedMutation {
                            kind: MutationKind::Remove,
                            parent: parent_content.clone(),
                            node: content,
                        });
                    }
                    _ => {
                        debug!(?node, "removed node is not a live child");
                        report.skipped += 1;
                    }
                }
            }
            TreeMutation::Insert { node, .. } => {
                let Some(content) = snapshot.content(node).cloned() else {
                    debug!(?node, "inserted node missing from snapshot");
                    report.skipped += 1;
                    continue;
                };
                if let Err(e) = live.graft(live_node, snapshot, node) {
                    debug!(?node, "cannot graft inserted node: {}", e);
                    report.skipped += 1;
                    continue;
                }
                report.applied.push(AppliedMutation {
                    kind: MutationKind::Insert,
                    parent: parent_content.clone(),
                    node: content,
                });
            }
            TreeMutation::Move { node, .. } => {
                debug!(?node, "move mutations are not replayed");
            }
        }
    }

    for child in &diff.children {
        match correlate(live, live_node, child) {
            Some(live_child) => apply_level(live, live_child, child, snapshot, report)?,
            None => {
                debug!(source = ?child.source, "no live child matches diff level");
                report.skipped += 1;
            }
        }
    }
    Ok(())
}

/// Find the live child standing for `diff`: its recorded index when that is
/// still a child with the same content, otherwise the first equal child.
fn correlate<M: PartialEq>(live: &TreeArena<M>, parent: Index, diff: &DiffNode<M>) -> Option<Index> {
    let by_index = live.parent(diff.node) == Some(parent)
        && live.content(diff.node) == Some(&diff.source);
    if by_index {
        return Some(diff.node);
    }
    live.find_child(parent, |content| *content == diff.source)
}
