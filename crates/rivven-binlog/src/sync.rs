//! # Binlog sync loop
//!
//! [`BinlogSync`] pulls events from a [`BinlogTransport`] stream and drives
//! the common building blocks:
//!
//! ```text
//! stream ──► advance offset ──► Rotate ─────────► forced save
//!                          ├──► Rows ─► filter ─► resolve ─► dispatch
//!                          ├──► Xid ──────────► best-effort save
//!                          ├──► ALTER TABLE ──► invalidate ─► forced save
//!                          └──► other ────────► ignored
//! ```
//!
//! Row events never trigger a save. A persisted position is therefore always
//! at a transaction, rotation or DDL boundary, and replay after a crash starts
//! at the first event of the interrupted transaction.
//!
//! The loop runs until a fatal error or [`BinlogSync::stop`]. Pull timeouts
//! are not errors; each consecutive timeout doubles the next wait.

use crate::common::{
    parse_alter_table, BinlogError, BinlogEvent, BinlogTransport, EventType, FilePositionStore,
    HandlerRegistry, MasterInfo, MasterInfoHandler, MasterStatus, MemoryPositionStore, Position,
    PullBackoff, ReplicationEvent, Result, RowsChange, RowsEvent, RowsEventHandler, SchemaFilter,
    SharedPositionStore, SyncConfig, TableResolver,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, trace};

/// Which save, if any, an event calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SavePoint {
    None,
    BestEffort,
    Forced,
}

/// Binlog sync engine.
pub struct BinlogSync {
    config: SyncConfig,
    transport: Arc<dyn BinlogTransport>,
    tables: Arc<dyn TableResolver>,
    filter: SchemaFilter,
    master: Arc<MasterInfo>,
    handlers: HandlerRegistry,
    master_info_handler: RwLock<Option<Arc<dyn MasterInfoHandler>>>,
    master_status: Option<Arc<dyn MasterStatus>>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl BinlogSync {
    /// Create an engine around an existing [`MasterInfo`].
    pub fn new(
        config: SyncConfig,
        transport: Arc<dyn BinlogTransport>,
        tables: Arc<dyn TableResolver>,
        master: Arc<MasterInfo>,
    ) -> Result<Self> {
        config.validate()?;
        let filter = SchemaFilter::new(config.scope().map(str::to_string));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            transport,
            tables,
            filter,
            master,
            handlers: HandlerRegistry::new(),
            master_info_handler: RwLock::new(None),
            master_status: None,
            running: AtomicBool::new(false),
            shutdown,
        })
    }

    /// Create an engine whose master info comes from `config`.
    ///
    /// With `master_info_path` set the position is restored from and saved to
    /// that file; otherwise it lives in memory.
    pub async fn open(
        config: SyncConfig,
        transport: Arc<dyn BinlogTransport>,
        tables: Arc<dyn TableResolver>,
    ) -> Result<Self> {
        let store: SharedPositionStore = match &config.master_info_path {
            Some(path) => Arc::new(FilePositionStore::new(path)),
            None => Arc::new(MemoryPositionStore::new()),
        };
        let master = MasterInfo::load(store, config.save_interval).await?;
        Self::new(config, transport, tables, Arc::new(master))
    }

    /// Attach the live master status used by [`Self::catch_master_pos`].
    pub fn with_master_status(mut self, status: Arc<dyn MasterStatus>) -> Self {
        self.master_status = Some(status);
        self
    }

    /// Register a row handler; handlers run in registration order.
    pub fn register_rows_handler(&self, handler: Arc<dyn RowsEventHandler>) {
        info!("Registered rows handler {}", handler.name());
        self.handlers.register(handler);
    }

    /// Mirror every successful position save to `handler`.
    pub fn set_master_info_handler(&self, handler: Arc<dyn MasterInfoHandler>) {
        *self.master_info_handler.write() = Some(handler);
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn master(&self) -> &Arc<MasterInfo> {
        &self.master
    }

    pub fn filter(&self) -> &SchemaFilter {
        &self.filter
    }

    /// Position at the last save point.
    pub fn position(&self) -> Position {
        self.master.position()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the loop to return after the event it is handling.
    ///
    /// A stop requested while no loop runs is kept for the next [`Self::run`],
    /// which then returns `Ok(())` without opening a stream.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Where to resume: saved position, then configured start, then live master.
    pub async fn start_position(&self) -> Result<Position> {
        let saved = self.master.position();
        if !saved.name.is_empty() {
            return Ok(saved);
        }
        if let Some(pos) = &self.config.start_position {
            return Ok(pos.clone());
        }
        match &self.master_status {
            Some(status) => status.master_position().await,
            None => Err(BinlogError::config(
                "no saved position, start_position or master status to start from",
            )),
        }
    }

    /// Resume from [`Self::start_position`].
    pub async fn resume(&self) -> Result<()> {
        let start = self.start_position().await?;
        self.run(start).await
    }

    /// Stream events from `start` until a fatal error or [`Self::stop`].
    pub async fn run(&self, start: Position) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BinlogError::config("sync loop is already running"));
        }
        let result = self.run_loop(start).await;
        // a stop only applies to the session it was aimed at
        self.shutdown.send_replace(false);
        self.running.store(false, Ordering::SeqCst);

        if let Err(e) = &result {
            error!("Binlog sync stopped: {} [{}]", e, e.error_code());
        }
        result
    }

    async fn run_loop(&self, start: Position) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            info!("Binlog sync stopped before start at {}", start);
            return Ok(());
        }

        info!("Start sync binlog at {}", start);
        let mut stream = self.transport.start_sync(&start).await.map_err(|e| match e {
            e @ BinlogError::Transport(_) => e,
            other => BinlogError::transport(format!("start sync at {}: {}", start, other)),
        })?;

        let mut pos = start;
        let mut backoff = PullBackoff::new(self.config.pull_timeout);

        loop {
            if *shutdown.borrow_and_update() {
                info!("Binlog sync stopped at {}", pos);
                return Ok(());
            }

            let wait = backoff.current();
            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("Binlog sync stopped at {}", pos);
                    return Ok(());
                }
                next = stream.next_event(wait) => next?,
            };

            let Some(event) = next else {
                let next_wait = backoff.on_timeout();
                trace!(
                    "No binlog event within {:?}, next wait {:?}",
                    wait,
                    next_wait
                );
                continue;
            };
            backoff.reset();

            match self.handle_event(&mut pos, event).await? {
                SavePoint::None => {}
                SavePoint::BestEffort => self.save(&pos, false).await?,
                SavePoint::Forced => self.save(&pos, true).await?,
            }
        }
    }

    async fn handle_event(&self, pos: &mut Position, event: ReplicationEvent) -> Result<SavePoint> {
        pos.pos = event.header.log_pos;

        match event.event {
            BinlogEvent::Rotate(rotate) => {
                pos.name = rotate.next_binlog;
                pos.pos = u32::try_from(rotate.position).map_err(|_| {
                    BinlogError::transport(format!(
                        "rotate to {} at offset {} exceeds 32 bits",
                        pos.name, rotate.position
                    ))
                })?;
                info!("Rotate binlog to {}", pos);
                Ok(SavePoint::Forced)
            }
            BinlogEvent::Rows(rows) => {
                self.handle_rows(event.header.event_type, rows).await?;
                Ok(SavePoint::None)
            }
            BinlogEvent::Xid(_) => Ok(SavePoint::BestEffort),
            BinlogEvent::Query(query) => match parse_alter_table(&query.query) {
                Some(alter) => {
                    let (schema, table) = alter.resolve(&query.schema);
                    self.tables.invalidate_table(&schema, &table);
                    info!(
                        "Table structure changed on {}.{}, cached metadata dropped",
                        schema, table
                    );
                    Ok(SavePoint::Forced)
                }
                None => Ok(SavePoint::None),
            },
            BinlogEvent::Other => Ok(SavePoint::None),
        }
    }

    async fn handle_rows(&self, event_type: EventType, rows: RowsEvent) -> Result<()> {
        if self.filter.check(&rows.schema).is_skipped() {
            return Ok(());
        }

        let table = self.tables.resolve_table(&rows.schema, &rows.table).await?;
        let change = RowsChange::translate(event_type, table, rows.rows)?;
        debug!(
            "{} {} row(s) on {}",
            change.action,
            change.len(),
            change.table.full_name()
        );
        self.handlers.dispatch(&change).await
    }

    async fn save(&self, pos: &Position, force: bool) -> Result<()> {
        self.master.update(&pos.name, pos.pos);
        if !self.master.save(force).await? {
            return Ok(());
        }

        let handler = self.master_info_handler.read().clone();
        if let Some(handler) = handler {
            handler.save_pos(&pos.name, pos.pos).await?;
        }
        Ok(())
    }

    /// Block until the saved position reaches `target`.
    ///
    /// A zero `timeout` falls back to `default_wait_timeout`.
    pub async fn wait_until_pos(&self, target: &Position, timeout: Duration) -> Result<()> {
        let timeout = if timeout.is_zero() {
            self.config.default_wait_timeout
        } else {
            timeout
        };
        self.master
            .wait_until(target, timeout, self.config.wait_poll_interval)
            .await
    }

    /// Wait until the sync has caught up with the live master position.
    pub async fn catch_master_pos(&self, timeout: Duration) -> Result<()> {
        let status = self
            .master_status
            .as_ref()
            .ok_or_else(|| BinlogError::config("no master status configured"))?;
        let target = status.master_position().await?;
        info!("Waiting to catch up with master at {}", target);
        self.wait_until_pos(&target, timeout).await
    }
}

impl std::fmt::Debug for BinlogSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinlogSync")
            .field("config", &self.config)
            .field("master", &self.master)
            .field("handlers", &self.handlers.len())
            .field("running", &self.is_running())
            .finish()
    }
}
