//! The queued adapter's dedicated writer thread.
//!
//! One consumer drains the queue in FIFO order. The first item after an idle
//! period opens a transaction; items execute against it as they arrive; the
//! transaction commits once the idle window passes without a new item, the
//! burst hits its size cap, or the queue is closed and empty.

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use rusqlite::{Connection, Transaction};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use super::burst::{Burst, BurstConfig};
use super::events::{AdapterEvent, EventBus};
use super::queued::AdapterState;
use super::{Operation, PersistenceError};
use crate::key::display_key;
use crate::storage::schema::{clear_entries, delete_entry, insert_entry, update_entry};

/// A queued mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueueItem {
    Create { key: Vec<u8>, value: Vec<u8> },
    Update { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    Clear,
}

impl QueueItem {
    pub(crate) fn operation(&self) -> Operation {
        match self {
            Self::Create { .. } => Operation::Create,
            Self::Update { .. } => Operation::Update,
            Self::Delete { .. } => Operation::Delete,
            Self::Clear => Operation::Clear,
        }
    }

    pub(crate) fn key(&self) -> Option<&[u8]> {
        match self {
            Self::Create { key, .. } | Self::Update { key, .. } | Self::Delete { key } => {
                Some(key.as_slice())
            }
            Self::Clear => None,
        }
    }
}

/// State shared between the adapter handle and its writer.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    state: AtomicU8,
    executed: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    pub(crate) fn state(&self) -> AdapterState {
        AdapterState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: AdapterState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn executed(&self) -> u64 {
        self.executed.load(Ordering::SeqCst)
    }

    pub(crate) fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Marks the writer stopped however the thread exits.
struct StopGuard(Arc<Shared>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.set_state(AdapterState::Stopped);
    }
}

/// Everything the writer needs besides its connection and queue.
struct Context {
    table: String,
    config: BurstConfig,
    shared: Arc<Shared>,
    events: EventBus,
}

pub(crate) struct Worker {
    conn: Connection,
    rx: Receiver<QueueItem>,
    ctx: Context,
    // Dropped when the thread exits; the adapter waits on it at shutdown.
    done: Sender<()>,
}

impl Worker {
    pub(crate) fn new(
        conn: Connection,
        table: String,
        rx: Receiver<QueueItem>,
        config: BurstConfig,
        shared: Arc<Shared>,
        events: EventBus,
        done: Sender<()>,
    ) -> Self {
        Self {
            conn,
            rx,
            ctx: Context {
                table,
                config,
                shared,
                events,
            },
            done,
        }
    }

    /// Run until the queue is closed and drained.
    pub(crate) fn run(self) {
        let Worker {
            mut conn,
            rx,
            ctx,
            done,
        } = self;
        let _stopped = StopGuard(Arc::clone(&ctx.shared));

        tracing::debug!(table = %ctx.table, "Writer started");
        while let Ok(first) = rx.recv() {
            ctx.shared.set_state(AdapterState::Draining);
            let closed = drain_burst(&mut conn, &ctx, &rx, first);
            ctx.shared.set_state(AdapterState::Idle);
            if closed {
                break;
            }
        }

        tracing::debug!(
            table = %ctx.table,
            executed = ctx.shared.executed(),
            failed = ctx.shared.failed(),
            "Writer stopped"
        );
        drop(done);
    }
}

/// Execute one burst starting with `first`. Returns true if the queue was
/// found closed and empty.
fn drain_burst(conn: &mut Connection, ctx: &Context, rx: &Receiver<QueueItem>, first: QueueItem) -> bool {
    let tx = match conn.transaction() {
        Ok(tx) => tx,
        Err(e) => {
            ctx.shared.executed.fetch_add(1, Ordering::SeqCst);
            ctx.report_failure(&first, PersistenceError::from_storage(first.operation(), first.key(), e));
            return false;
        }
    };
    tracing::trace!(table = %ctx.table, "Burst opened");

    let mut burst = Burst::new(ctx.config);
    let mut closed = false;
    let mut next = Some(first);
    while let Some(item) = next.take() {
        let ok = ctx.execute(&tx, &item);
        if burst.record(ok) {
            break;
        }
        match rx.recv_timeout(burst.time_until_idle()) {
            Ok(item) => next = Some(item),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => closed = true,
        }
    }

    ctx.commit(tx, &burst);
    closed
}

impl Context {
    fn execute(&self, conn: &Connection, item: &QueueItem) -> bool {
        let table = self.table.as_str();
        let result = match item {
            QueueItem::Create { key, value } => insert_entry(conn, table, key, value),
            QueueItem::Update { key, value } => update_entry(conn, table, key, value),
            QueueItem::Delete { key } => delete_entry(conn, table, key),
            QueueItem::Clear => clear_entries(conn, table),
        };
        self.shared.executed.fetch_add(1, Ordering::SeqCst);

        match result {
            Ok(()) => true,
            Err(e) => {
                self.report_failure(item, PersistenceError::from_storage(item.operation(), item.key(), e));
                false
            }
        }
    }

    fn report_failure(&self, item: &QueueItem, error: PersistenceError) {
        self.shared.failed.fetch_add(1, Ordering::SeqCst);
        let key = item.key().map(display_key).unwrap_or_else(|| "-".into());
        tracing::warn!(
            table = %self.table,
            operation = %item.operation(),
            key = %key,
            error = %error,
            "Queued operation failed"
        );
        self.events.publish(AdapterEvent::OperationFailed {
            operation: item.operation(),
            key: item.key().map(<[u8]>::to_vec),
            error: error.to_string(),
        });
    }

    fn commit(&self, tx: Transaction<'_>, burst: &Burst) {
        match tx.commit() {
            Ok(()) => {
                tracing::debug!(
                    table = %self.table,
                    items = burst.len(),
                    failed = burst.failed(),
                    "Burst committed"
                );
                self.events.publish(AdapterEvent::BurstCommitted { items: burst.len() });
            }
            Err(e) => {
                // Items that executed fine are lost with the transaction.
                let lost = (burst.len() - burst.failed()) as u64;
                self.shared.failed.fetch_add(lost, Ordering::SeqCst);
                tracing::error!(
                    table = %self.table,
                    items = burst.len(),
                    error = %e,
                    "Burst commit failed"
                );
                self.events.publish(AdapterEvent::CommitFailed {
                    items: burst.len(),
                    error: e.to_string(),
                });
            }
        }
    }
}
