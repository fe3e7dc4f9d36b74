//! QueuedAsyncAdapter integration tests.
//!
//! Tests:
//! - Queued mutations land in enqueue order
//! - Late failures surface through events and the failure counter
//! - Bounded queues reject when full under the reject policy
//! - Shutdown drains, and later mutations are refused

mod common;

use std::time::Duration;

use common::{wait_for, TestFixture};
use snorkels::adapter::{BurstConfig, OverflowPolicy, Operation};
use snorkels::{
    AdapterEvent, AdapterKind, AdapterState, PersistenceAdapter, PersistenceError, QueueConfig,
    QueuedAsyncAdapter, SyncAdapter,
};

fn queue_config() -> QueueConfig {
    QueueConfig {
        burst: BurstConfig::from_config(100, 5),
        ..QueueConfig::default()
    }
}

fn open(fixture: &TestFixture, name: &str, config: QueueConfig) -> QueuedAsyncAdapter {
    std::fs::create_dir_all(&fixture.data_dir).unwrap();
    QueuedAsyncAdapter::open(name, &fixture.data_dir, config).unwrap()
}

fn row_count(fixture: &TestFixture, name: &str) -> usize {
    SyncAdapter::open(name, &fixture.data_dir)
        .unwrap()
        .read_all()
        .unwrap()
        .count()
}

#[test]
fn test_create_update_delete_leaves_no_row() {
    let fixture = TestFixture::new();
    let store = fixture
        .config("ordered", AdapterKind::Queued)
        .open()
        .unwrap();

    store.set("k", "1").unwrap();
    store.set("k", "2").unwrap();
    store.delete("k").unwrap();
    store.shutdown().unwrap();

    assert_eq!(row_count(&fixture, "ordered"), 0);
}

#[test]
fn test_writes_visible_after_shutdown() {
    let fixture = TestFixture::new();
    let store = fixture
        .config("visible", AdapterKind::Queued)
        .open()
        .unwrap();

    for i in 0..1_000 {
        store.set(format!("k{i}"), "v").unwrap();
    }
    store.shutdown().unwrap();

    assert_eq!(row_count(&fixture, "visible"), 1_000);
    let reopened = fixture.sync_store("visible");
    assert_eq!(reopened.len(), 1_000);
}

#[test]
fn test_commits_without_shutdown() {
    let fixture = TestFixture::new();
    let adapter = open(&fixture, "idle", queue_config());

    adapter.create(b"k", b"v").unwrap();
    assert!(wait_for(Duration::from_secs(5), || {
        row_count(&fixture, "idle") == 1
    }));
    assert!(wait_for(Duration::from_secs(5), || {
        adapter.state() == AdapterState::Idle
    }));
}

#[test]
fn test_late_failure_is_reported() {
    let fixture = TestFixture::new();
    let adapter = open(&fixture, "late", queue_config());
    let mut events = adapter.subscribe();

    adapter.create(b"dup", b"1").unwrap();
    // Accepted by the queue; fails only when the writer runs it
    adapter.create(b"dup", b"2").unwrap();
    adapter.create(b"other", b"3").unwrap();

    let report = adapter.close().unwrap();
    assert_eq!(report.executed, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(adapter.failure_count(), 1);

    let mut failures = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let AdapterEvent::OperationFailed { operation, key, .. } = event {
            failures.push((operation, key));
        }
    }
    assert_eq!(failures, vec![(Operation::Create, Some(b"dup".to_vec()))]);

    // The rest of the burst still committed
    assert_eq!(row_count(&fixture, "late"), 2);
}

#[test]
fn test_reject_policy_reports_queue_full() {
    let fixture = TestFixture::new();
    let adapter = open(
        &fixture,
        "full",
        QueueConfig {
            capacity: Some(1),
            overflow: OverflowPolicy::Reject,
            ..queue_config()
        },
    );

    // Hold the write lock so the writer blocks on its first item
    let blocker = rusqlite::Connection::open(adapter.path()).unwrap();
    blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let results: Vec<_> = (0..3u8).map(|i| adapter.create(&[i], b"v")).collect();
    blocker.execute_batch("COMMIT").unwrap();

    assert!(results.iter().any(|r| matches!(
        r,
        Err(PersistenceError::QueueFull {
            operation: Operation::Create
        })
    )));
    let accepted = results.iter().filter(|r| r.is_ok()).count() as u64;

    let report = adapter.close().unwrap();
    assert_eq!(report.executed, accepted);
}

#[test]
fn test_mutations_after_shutdown_are_closed() {
    let fixture = TestFixture::new();
    let adapter = open(&fixture, "closed", queue_config());
    adapter.shutdown().unwrap();
    assert_eq!(adapter.state(), AdapterState::Stopped);

    for result in [
        adapter.create(b"k", b"v"),
        adapter.update(b"k", b"v"),
        adapter.delete(b"k"),
        adapter.clear(),
    ] {
        assert!(matches!(result, Err(PersistenceError::Closed { .. })));
    }
    // Reads still work
    assert_eq!(adapter.read_all().unwrap().count(), 0);
}

#[test]
fn test_clear_is_ordered_with_writes() {
    let fixture = TestFixture::new();
    let adapter = open(&fixture, "clearing", queue_config());

    adapter.create(b"a", b"1").unwrap();
    adapter.create(b"b", b"2").unwrap();
    adapter.clear().unwrap();
    adapter.create(b"a", b"3").unwrap();
    adapter.close().unwrap();

    let rows: Vec<_> = adapter
        .read_all()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, b"a");
}

#[test]
fn test_shutdown_times_out_while_writer_is_blocked() {
    let fixture = TestFixture::new();
    let adapter = open(
        &fixture,
        "stuck",
        QueueConfig {
            shutdown_timeout: Duration::from_millis(50),
            ..queue_config()
        },
    );

    let blocker = rusqlite::Connection::open(adapter.path()).unwrap();
    blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

    adapter.create(b"k", b"v").unwrap();
    assert!(wait_for(Duration::from_secs(5), || {
        adapter.state() == AdapterState::Draining
    }));

    let err = adapter.close().unwrap_err();
    assert!(matches!(err, PersistenceError::ShutdownTimeout(t) if t == Duration::from_millis(50)));
    assert_eq!(adapter.state(), AdapterState::Draining);
    // The queue is already closed to new work
    assert!(matches!(
        adapter.create(b"late", b"v"),
        Err(PersistenceError::Closed { .. })
    ));

    blocker.execute_batch("COMMIT").unwrap();
    assert!(wait_for(Duration::from_secs(10), || {
        adapter.state() == AdapterState::Stopped
    }));
    let report = adapter.close().unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(row_count(&fixture, "stuck"), 1);
}

#[test]
fn test_block_policy_waits_for_room() {
    let fixture = TestFixture::new();
    let adapter = open(
        &fixture,
        "blocking",
        QueueConfig {
            capacity: Some(1),
            overflow: OverflowPolicy::Block,
            ..queue_config()
        },
    );

    // Hold the write lock so the writer blocks on its first item
    let blocker = rusqlite::Connection::open(adapter.path()).unwrap();
    blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

    std::thread::scope(|scope| {
        let producer = scope.spawn(|| {
            (0..3u8)
                .map(|i| adapter.create(&[i], b"v"))
                .collect::<Vec<_>>()
        });

        // One item held by the writer, one queued, the third waiting
        assert!(wait_for(Duration::from_secs(5), || {
            adapter.state() == AdapterState::Draining && adapter.pending() == 1
        }));
        std::thread::sleep(Duration::from_millis(100));
        assert!(!producer.is_finished());

        blocker.execute_batch("COMMIT").unwrap();
        let results = producer.join().unwrap();
        assert!(results.iter().all(Result::is_ok));
    });

    let report = adapter.close().unwrap();
    assert_eq!(report.executed, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(row_count(&fixture, "blocking"), 3);
}
