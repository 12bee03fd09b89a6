//! Integration tests for RefreshService

mod common;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use common::shared_tree;
use sharetree::application::services::{RefreshOutcome, RefreshService, TreeEvent};
use sharetree::application::{ApplicationError, ApplicationResult};
use sharetree::domain::{MutationKind, SharedTree};
use sharetree::infrastructure::traits::SnapshotSource;

/// Hands out queued snapshots, then keeps repeating the last one.
struct QueuedSource {
    queue: Mutex<VecDeque<ApplicationResult<SharedTree>>>,
    last: Mutex<Option<SharedTree>>,
}

impl QueuedSource {
    fn new(snapshots: Vec<ApplicationResult<SharedTree>>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(snapshots.into()),
            last: Mutex::new(None),
        })
    }
}

impl SnapshotSource for QueuedSource {
    fn snapshot(&self) -> ApplicationResult<SharedTree> {
        match self.queue.lock().pop_front() {
            Some(Ok(tree)) => {
                *self.last.lock() = Some(tree.clone());
                Ok(tree)
            }
            Some(Err(e)) => Err(e),
            None => self.last.lock().clone().ok_or_else(|| ApplicationError::Snapshot {
                path: PathBuf::from("queue"),
                message: "empty".into(),
            }),
        }
    }
}

/// Blocks inside `snapshot` until the test releases it.
struct GatedSource {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
    tree: SharedTree,
}

impl SnapshotSource for GatedSource {
    fn snapshot(&self) -> ApplicationResult<SharedTree> {
        let _ = self.entered.lock().send(());
        let _ = self.release.lock().recv();
        Ok(self.tree.clone())
    }
}

fn service(snapshots: Vec<ApplicationResult<SharedTree>>) -> RefreshService {
    RefreshService::bootstrap(QueuedSource::new(snapshots)).unwrap()
}

fn live_labels(service: &RefreshService) -> Vec<String> {
    service.with_live_tree(|tree| {
        tree.iter()
            .map(|(_, node)| node.content().label())
            .collect()
    })
}

#[test]
fn given_identical_snapshot_when_refreshing_then_unchanged() {
    // Arrange
    let service = service(vec![Ok(shared_tree(&["jvmMain"])), Ok(shared_tree(&["jvmMain"]))]);
    let mut events = service.subscribe();

    // Act
    let outcome = service.refresh().unwrap();

    // Assert
    assert_eq!(outcome, RefreshOutcome::Unchanged);
    assert!(events.try_recv().is_err());
}

#[test]
fn given_changed_snapshot_when_refreshing_then_live_tree_updated_and_event_published() {
    // Arrange
    let service = service(vec![
        Ok(shared_tree(&["jvmMain"])),
        Ok(shared_tree(&["iosMain"])),
    ]);
    let mut events = service.subscribe();

    // Act
    let outcome = service.refresh().unwrap();

    // Assert
    let report = match outcome {
        RefreshOutcome::Updated(report) => report,
        other => panic!("expected an update, got {other}"),
    };
    assert_eq!(report.applied.len(), 2);
    assert_eq!(report.applied[0].kind, MutationKind::Remove);
    assert_eq!(report.applied[0].node.label(), "jvmMain");
    assert_eq!(report.applied[1].kind, MutationKind::Insert);
    assert_eq!(report.applied[1].node.label(), "iosMain");
    assert_eq!(report.skipped, 0);
    assert_eq!(report.lines().len(), 2);
    assert!(report.lines()[0].starts_with("- Platform / "));

    assert_eq!(
        live_labels(&service),
        vec!["demo", "shared", "Platform.kt", "Platform", "Common", "iosMain"]
    );
    match events.try_recv() {
        Ok(TreeEvent::Updated(published)) => assert_eq!(published, report),
        other => panic!("expected update event, got {other:?}"),
    }
}

#[test]
fn given_update_when_refreshing_then_unchanged_nodes_keep_their_indices() {
    // Arrange
    let service = service(vec![
        Ok(shared_tree(&["jvmMain"])),
        Ok(shared_tree(&["jvmMain", "jsMain"])),
    ]);
    let before = service.with_live_tree(|tree| {
        tree.iter()
            .find(|(_, node)| node.content().label() == "jvmMain")
            .map(|(idx, _)| idx)
    });

    // Act
    service.refresh().unwrap();

    // Assert
    let after = service.with_live_tree(|tree| {
        tree.iter()
            .find(|(_, node)| node.content().label() == "jvmMain")
            .map(|(idx, _)| idx)
    });
    assert!(before.is_some());
    assert_eq!(before, after);
    assert!(!service.is_refreshing());
}

#[test]
fn given_failing_source_when_refreshing_then_error_propagates_and_live_tree_kept() {
    // Arrange
    let service = service(vec![
        Ok(shared_tree(&["jvmMain"])),
        Err(ApplicationError::Snapshot {
            path: PathBuf::from("/gone"),
            message: "not a directory".into(),
        }),
    ]);

    // Act
    let result = service.refresh();

    // Assert
    assert!(matches!(result, Err(ApplicationError::Snapshot { .. })));
    assert!(live_labels(&service).contains(&"jvmMain".to_string()));
    assert!(!service.is_refreshing(), "in-flight flag released after failure");
}

#[tokio::test]
async fn given_changed_snapshot_when_refreshing_async_then_updated() {
    // Arrange
    let service = service(vec![
        Ok(shared_tree(&[])),
        Ok(shared_tree(&["jvmMain"])),
    ]);

    // Act
    let first = service.refresh_async().await.unwrap();
    let second = service.refresh_async().await.unwrap();

    // Assert
    match first {
        RefreshOutcome::Updated(report) => {
            assert_eq!(report.applied.len(), 1);
            assert_eq!(report.applied[0].kind, MutationKind::Insert);
            assert_eq!(report.applied[0].node.label(), "jvmMain");
        }
        other => panic!("expected update, got {other}"),
    }
    assert_eq!(second, RefreshOutcome::Unchanged);
    let node_count = service.with_live_tree(|tree| tree.node_count());
    assert_eq!(node_count, 6);
}

#[tokio::test]
async fn given_cycle_in_flight_when_refreshing_again_then_skipped_and_live_tree_untouched() {
    // Arrange
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let source = Arc::new(GatedSource {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
        tree: shared_tree(&["jvmMain", "iosMain"]),
    });
    let service = Arc::new(RefreshService::new(source, shared_tree(&["jvmMain"])));
    let before = live_labels(&service);
    let worker = {
        let service = Arc::clone(&service);
        thread::spawn(move || service.refresh())
    };
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // Act
    let blocking = service.refresh().unwrap();
    let non_blocking = service.refresh_async().await.unwrap();

    // Assert
    assert_eq!(blocking, RefreshOutcome::Skipped);
    assert_eq!(non_blocking, RefreshOutcome::Skipped);
    assert!(service.is_refreshing());
    assert_eq!(live_labels(&service), before);

    release_tx.send(()).unwrap();
    let first = worker.join().unwrap().unwrap();
    assert!(matches!(first, RefreshOutcome::Updated(_)));
    assert!(!service.is_refreshing());
    assert!(live_labels(&service).contains(&"iosMain".to_string()));
}
