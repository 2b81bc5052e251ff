//! Test harness for binlog sync tests
//!
//! In-process doubles for every collaborator of the sync loop:
//! - [`MockTransport`] - stream fed from a channel, records pull waits
//! - [`MockTables`] - table resolver counting resolves and invalidations
//! - [`RecordingHandler`] - rows handler that records or fails on demand
//! - [`RecordingMirror`] - master info handler that records saves

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rivven_binlog::common::{
    BinlogStream, BinlogTransport, ColumnValue, EventType, MasterInfoHandler, TableMetadata,
    TableResolver,
};
use rivven_binlog::{
    BinlogError, Position, ReplicationEvent, Result, RowsAction, RowsChange, RowsEventHandler,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc;

static INIT: Once = Once::new();

/// Initialize test logging (idempotent)
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("rivven_binlog=debug".parse().unwrap()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// ============================================================================
// Transport
// ============================================================================

/// One scripted pull result.
pub enum Step {
    Event(ReplicationEvent),
    Timeout,
    Fail(BinlogError),
}

/// Sender side of a [`MockTransport`] stream.
#[derive(Clone)]
pub struct Feed {
    tx: mpsc::UnboundedSender<Step>,
}

impl Feed {
    pub fn event(&self, event: ReplicationEvent) {
        let _ = self.tx.send(Step::Event(event));
    }

    pub fn timeout(&self) {
        let _ = self.tx.send(Step::Timeout);
    }

    pub fn fail(&self, err: BinlogError) {
        let _ = self.tx.send(Step::Fail(err));
    }
}

/// Transport whose single stream replays whatever is pushed into its [`Feed`].
///
/// An empty channel behaves like a quiet master: the pull waits out its
/// timeout and returns `Ok(None)`. A closed and drained channel ends the
/// stream with [`BinlogError::ConnectionClosed`].
pub struct MockTransport {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Step>>>,
    waits: Arc<Mutex<Vec<Duration>>>,
    starts: Mutex<Vec<Position>>,
    start_error: Mutex<Option<BinlogError>>,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, Feed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
            waits: Arc::new(Mutex::new(Vec::new())),
            starts: Mutex::new(Vec::new()),
            start_error: Mutex::new(None),
        });
        (transport, Feed { tx })
    }

    /// Transport with a fixed script; the stream closes after the last step.
    pub fn scripted(steps: Vec<Step>) -> Arc<Self> {
        let (transport, feed) = Self::new();
        for step in steps {
            let _ = feed.tx.send(step);
        }
        transport
    }

    /// Fail the next `start_sync` with `err`.
    pub fn fail_start(&self, err: BinlogError) {
        *self.start_error.lock() = Some(err);
    }

    /// Wait passed to every pull, in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }

    /// Positions `start_sync` was called with.
    pub fn starts(&self) -> Vec<Position> {
        self.starts.lock().clone()
    }
}

#[async_trait]
impl BinlogTransport for MockTransport {
    async fn start_sync(&self, position: &Position) -> Result<Box<dyn BinlogStream>> {
        self.starts.lock().push(position.clone());
        if let Some(err) = self.start_error.lock().take() {
            return Err(err);
        }
        let rx = self
            .rx
            .lock()
            .take()
            .ok_or_else(|| BinlogError::transport("stream already opened"))?;
        Ok(Box::new(MockStream {
            rx,
            waits: self.waits.clone(),
        }))
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<Step>,
    waits: Arc<Mutex<Vec<Duration>>>,
}

#[async_trait]
impl BinlogStream for MockStream {
    async fn next_event(&mut self, timeout: Duration) -> Result<Option<ReplicationEvent>> {
        self.waits.lock().push(timeout);
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(BinlogError::ConnectionClosed),
            Ok(Some(Step::Event(event))) => Ok(Some(event)),
            Ok(Some(Step::Timeout)) => Ok(None),
            Ok(Some(Step::Fail(err))) => Err(err),
        }
    }
}

// ============================================================================
// Table metadata
// ============================================================================

/// Resolver returning `(id int, name varchar)` for any table.
#[derive(Default)]
pub struct MockTables {
    resolves: Mutex<HashMap<String, usize>>,
    invalidations: Mutex<Vec<(String, String)>>,
    missing: Mutex<Vec<String>>,
}

impl MockTables {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make resolution of `schema.table` fail.
    pub fn mark_missing(&self, schema: &str, table: &str) {
        self.missing.lock().push(format!("{}.{}", schema, table));
    }

    pub fn resolve_count(&self, schema: &str, table: &str) -> usize {
        self.resolves
            .lock()
            .get(&format!("{}.{}", schema, table))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_resolves(&self) -> usize {
        self.resolves.lock().values().sum()
    }

    pub fn invalidations(&self) -> Vec<(String, String)> {
        self.invalidations.lock().clone()
    }
}

#[async_trait]
impl TableResolver for MockTables {
    async fn resolve_table(&self, schema: &str, table: &str) -> Result<Arc<TableMetadata>> {
        let full_name = format!("{}.{}", schema, table);
        *self.resolves.lock().entry(full_name.clone()).or_default() += 1;
        if self.missing.lock().contains(&full_name) {
            return Err(BinlogError::schema(format!("table {} not found", full_name)));
        }
        Ok(Arc::new(
            TableMetadata::new(schema, table)
                .with_column("id", "int")
                .with_column("name", "varchar(64)")
                .with_pk_column("id"),
        ))
    }

    fn invalidate_table(&self, schema: &str, table: &str) {
        self.invalidations
            .lock()
            .push((schema.to_string(), table.to_string()));
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// What a [`RecordingHandler`] saw.
#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub table: String,
    pub action: RowsAction,
    pub rows: Vec<Vec<ColumnValue>>,
}

/// Rows handler that records every change; optionally fails on call `n`.
pub struct RecordingHandler {
    name: String,
    seen: Mutex<Vec<Seen>>,
    calls: AtomicUsize,
    fail_on: Option<usize>,
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl RecordingHandler {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_on: None,
            journal: None,
        })
    }

    /// Handler failing on its `n`-th call (1-based).
    pub fn failing_on(name: &str, n: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_on: Some(n),
            journal: None,
        })
    }

    /// Handler appending its name to a shared journal on every call.
    pub fn journaled(name: &str, journal: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_on: None,
            journal: Some(journal),
        })
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RowsEventHandler for RecordingHandler {
    async fn on_rows(&self, change: &RowsChange) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(journal) = &self.journal {
            journal.lock().push(self.name.clone());
        }
        if self.fail_on == Some(call) {
            return Err(BinlogError::transport("downstream unavailable"));
        }
        self.seen.lock().push(Seen {
            table: change.table.full_name(),
            action: change.action,
            rows: change.rows.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Master info handler that records every mirrored save.
#[derive(Default)]
pub struct RecordingMirror {
    saves: Mutex<Vec<Position>>,
}

impl RecordingMirror {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saves(&self) -> Vec<Position> {
        self.saves.lock().clone()
    }
}

#[async_trait]
impl MasterInfoHandler for RecordingMirror {
    async fn save_pos(&self, name: &str, pos: u32) -> Result<()> {
        self.saves.lock().push(Position::new(name, pos));
        Ok(())
    }
}

// ============================================================================
// Event builders
// ============================================================================

pub fn row(id: i64, name: &str) -> Vec<ColumnValue> {
    vec![ColumnValue::Int(id), ColumnValue::Text(name.into())]
}

pub fn insert(
    log_pos: u32,
    schema: &str,
    table: &str,
    rows: Vec<Vec<ColumnValue>>,
) -> ReplicationEvent {
    ReplicationEvent::rows(EventType::WriteRowsEventV2, log_pos, schema, table, rows)
}

pub fn update(
    log_pos: u32,
    schema: &str,
    table: &str,
    rows: Vec<Vec<ColumnValue>>,
) -> ReplicationEvent {
    ReplicationEvent::rows(EventType::UpdateRowsEventV2, log_pos, schema, table, rows)
}

pub fn delete(
    log_pos: u32,
    schema: &str,
    table: &str,
    rows: Vec<Vec<ColumnValue>>,
) -> ReplicationEvent {
    ReplicationEvent::rows(EventType::DeleteRowsEventV2, log_pos, schema, table, rows)
}
