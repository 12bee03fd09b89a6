//! Integration tests for RefreshScheduler

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use common::shared_tree;
use sharetree::application::services::{RefreshScheduler, RefreshService, TreeEvent};
use sharetree::application::ApplicationResult;
use sharetree::domain::SharedTree;
use sharetree::infrastructure::traits::SnapshotSource;

const MODULES: [&str; 4] = ["jvmMain", "iosMain", "jsMain", "wasmJsMain"];

/// Every snapshot has one more actual than the previous one.
#[derive(Default)]
struct GrowingSource {
    calls: AtomicUsize,
}

impl SnapshotSource for GrowingSource {
    fn snapshot(&self) -> ApplicationResult<SharedTree> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) % (MODULES.len() + 1);
        Ok(shared_tree(&MODULES[..n]))
    }
}

fn service() -> Arc<RefreshService> {
    Arc::new(RefreshService::bootstrap(Arc::new(GrowingSource::default())).unwrap())
}

async fn next_update(events: &mut broadcast::Receiver<TreeEvent>) -> Option<TreeEvent> {
    timeout(Duration::from_secs(5), events.recv()).await.ok()?.ok()
}

#[tokio::test]
async fn given_manual_only_scheduler_when_refresh_requested_then_update_published() {
    // Arrange
    let service = service();
    let mut events = service.subscribe();
    let handle = RefreshScheduler::spawn(Arc::clone(&service), Duration::ZERO);

    // Act
    assert!(handle.refresh_now());
    let event = next_update(&mut events).await;

    // Assert
    match event {
        Some(TreeEvent::Updated(report)) => {
            assert_eq!(report.applied.len(), 1);
            assert_eq!(report.applied[0].node.label(), "jvmMain");
        }
        None => panic!("no update within timeout"),
    }
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_manual_only_scheduler_when_idle_then_nothing_happens() {
    let service = service();
    let mut events = service.subscribe();
    let handle = RefreshScheduler::spawn(Arc::clone(&service), Duration::ZERO);

    let event = timeout(Duration::from_millis(200), events.recv()).await;

    assert!(event.is_err(), "no timer may fire with a zero interval");
    assert_eq!(handle.interval(), Duration::ZERO);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_interval_enabled_at_runtime_when_waiting_then_timer_refreshes() {
    // Arrange
    let service = service();
    let mut events = service.subscribe();
    let handle = RefreshScheduler::spawn(Arc::clone(&service), Duration::ZERO);

    // Act
    handle.set_interval(Duration::from_millis(50));
    let first = next_update(&mut events).await;
    let second = next_update(&mut events).await;

    // Assert
    assert!(first.is_some());
    assert!(second.is_some());
    assert_eq!(handle.interval(), Duration::from_millis(50));
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_running_scheduler_when_shut_down_then_stops_cleanly() {
    // Arrange
    let service = service();
    let handle = RefreshScheduler::spawn(Arc::clone(&service), Duration::from_millis(20));

    // Act
    let result = timeout(Duration::from_secs(5), handle.shutdown()).await;

    // Assert
    assert!(matches!(result, Ok(Ok(()))));
    assert!(!service.is_refreshing());
}

#[tokio::test]
async fn given_long_running_timer_when_interval_shortened_then_new_period_applies() {
    // Arrange
    let service = service();
    let mut events = service.subscribe();
    let handle = RefreshScheduler::spawn(Arc::clone(&service), Duration::from_secs(3600));

    // Act
    handle.set_interval(Duration::from_millis(50));
    let first = next_update(&mut events).await;
    let second = next_update(&mut events).await;

    // Assert
    assert!(first.is_some(), "old hour-long timer must be replaced");
    assert!(second.is_some());
    assert_eq!(handle.interval(), Duration::from_millis(50));
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_running_timer_when_interval_set_to_zero_then_timer_stops() {
    // Arrange
    let service = service();
    let mut events = service.subscribe();
    let handle = RefreshScheduler::spawn(Arc::clone(&service), Duration::from_millis(50));
    assert!(next_update(&mut events).await.is_some());

    // Act
    handle.set_interval(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(150)).await;
    while events.try_recv().is_ok() {}
    let late = timeout(Duration::from_millis(300), events.recv()).await;

    // Assert
    assert!(late.is_err(), "no timer may fire after the interval is cleared");
    handle.shutdown().await.unwrap();
}
