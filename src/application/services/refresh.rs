//! Refresh service
//!
//! Owns the live shared-elements tree and brings it in line with fresh
//! snapshots: snapshot, diff against the live tree, replay the diff.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{apply_to_root, diff_trees, AppliedMutation, NodeModel, SharedTree};
use crate::infrastructure::traits::SnapshotSource;

const EVENT_CAPACITY: usize = 16;

/// What one applied refresh changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub applied: Vec<AppliedMutation<NodeModel>>,
    /// Diff levels that no longer matched the live tree
    pub skipped: usize,
    /// Nodes reachable in the live tree after the update
    pub node_count: usize,
    pub at: DateTime<Local>,
}

impl RefreshReport {
    /// One `+ parent / node` or `- parent / node` line per applied mutation.
    pub fn lines(&self) -> Vec<String> {
        self.applied
            .iter()
            .map(|m| format!("{} {} / {}", m.kind, m.parent.label(), m.node))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot matched the live tree.
    Unchanged,
    Updated(RefreshReport),
    /// Another cycle was in flight; this trigger was dropped.
    Skipped,
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshOutcome::Unchanged => write!(f, "unchanged"),
            RefreshOutcome::Updated(report) => write!(f, "{} change(s)", report.applied.len()),
            RefreshOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Notification published after the live tree changed.
#[derive(Debug, Clone)]
pub enum TreeEvent {
    Updated(RefreshReport),
}

/// Clears the in-flight flag when a cycle ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Service keeping the live tree in sync with its snapshot source.
///
/// At most one snapshot+diff+replay cycle runs at a time.
pub struct RefreshService {
    source: Arc<dyn SnapshotSource>,
    live: RwLock<SharedTree>,
    in_flight: AtomicBool,
    events: broadcast::Sender<TreeEvent>,
}

impl RefreshService {
    /// Create a service around an already built live tree.
    pub fn new(source: Arc<dyn SnapshotSource>, live: SharedTree) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            source,
            live: RwLock::new(live),
            in_flight: AtomicBool::new(false),
            events,
        }
    }

    /// Create a service whose live tree is a first snapshot of `source`.
    pub fn bootstrap(source: Arc<dyn SnapshotSource>) -> ApplicationResult<Self> {
        let live = source.snapshot()?;
        debug!("bootstrap: initial tree with {} nodes", live.node_count());
        Ok(Self::new(source, live))
    }

    /// Run one cycle on the calling thread.
    #[instrument(level = "debug", skip(self))]
    pub fn refresh(&self) -> ApplicationResult<RefreshOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("refresh: cycle in flight, dropping trigger");
            return Ok(RefreshOutcome::Skipped);
        };
        let snapshot = self.source.snapshot()?;
        self.reconcile(snapshot)
    }

    /// Run one cycle, building the snapshot on a blocking worker.
    #[instrument(level = "debug", skip(self))]
    pub async fn refresh_async(&self) -> ApplicationResult<RefreshOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("refresh_async: cycle in flight, dropping trigger");
            return Ok(RefreshOutcome::Skipped);
        };
        let source = Arc::clone(&self.source);
        let snapshot = tokio::task::spawn_blocking(move || source.snapshot())
            .await
            .map_err(|e| ApplicationError::OperationFailed {
                context: "snapshot worker".into(),
                source: Box::new(e),
            })??;
        self.reconcile(snapshot)
    }

    fn reconcile(&self, snapshot: SharedTree) -> ApplicationResult<RefreshOutcome> {
        let mut live = self.live.write();
        let Some(diff) = diff_trees(&*live, &snapshot) else {
            return Ok(RefreshOutcome::Unchanged);
        };
        let replay = apply_to_root(&mut *live, &diff, &snapshot)?;
        let report = RefreshReport {
            applied: replay.applied,
            skipped: replay.skipped,
            node_count: live.node_count(),
            at: Local::now(),
        };
        drop(live);

        info!(
            changes = report.applied.len(),
            nodes = report.node_count,
            "live tree updated"
        );
        // No subscribers is fine.
        let _ = self.events.send(TreeEvent::Updated(report.clone()));
        Ok(RefreshOutcome::Updated(report))
    }

    /// Receive a [`TreeEvent`] for every update applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    /// Read access to the live tree.
    pub fn with_live_tree<R>(&self, f: impl FnOnce(&SharedTree) -> R) -> R {
        f(&*self.live.read())
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}
