//! # Master position tracking
//!
//! [`MasterInfo`] is the single owner of the current binlog position and of
//! the persistence throttle. The sync loop is the only writer; wait helpers
//! read concurrently.
//!
//! ## Save policy
//!
//! - **Forced** saves (rotation, DDL) always persist.
//! - **Best-effort** saves (transaction commit) persist unless the previous
//!   persist is younger than `save_interval`.
//!
//! Positions only ever reach [`MasterInfo::save`] at transaction, rotation or
//! DDL boundaries, so the persisted record is always a safe resume point.
//!
//! ## Stores
//!
//! - [`FilePositionStore`] - JSON record, atomic write (temp + fsync + rename)
//! - [`MemoryPositionStore`] - in-process, for tests and embedding

use crate::common::{BinlogError, Position, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Durable sink for the master position.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn save_position(&self, position: &Position) -> Result<()>;
    async fn load_position(&self) -> Result<Option<Position>>;
}

/// Secondary mirror notified after each successful persist.
#[async_trait]
pub trait MasterInfoHandler: Send + Sync {
    async fn save_pos(&self, name: &str, pos: u32) -> Result<()>;
}

/// On-disk master record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct MasterRecord {
    bin_name: String,
    bin_pos: u32,
    /// Unix timestamp (seconds) of the write
    saved_at: u64,
}

/// Master position persisted as a JSON file.
pub struct FilePositionStore {
    path: PathBuf,
    fsync: bool,
}

impl FilePositionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            fsync: true,
        }
    }

    /// Create a store with custom fsync behavior.
    pub fn with_fsync(path: impl AsRef<Path>, fsync: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            fsync,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PositionStore for FilePositionStore {
    async fn save_position(&self, position: &Position) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let record = MasterRecord {
            bin_name: position.name.clone(),
            bin_pos: position.pos,
            saved_at: current_timestamp(),
        };
        let json = serde_json::to_string_pretty(&record)?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        if self.fsync {
            file.sync_all().await?;
        }
        drop(file);

        fs::rename(&temp_path, &self.path).await?;

        debug!("Saved master position {} to {}", position, self.path.display());
        Ok(())
    }

    async fn load_position(&self) -> Result<Option<Position>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: MasterRecord = serde_json::from_str(&contents)?;
        Ok(Some(Position::new(record.bin_name, record.bin_pos)))
    }
}

/// In-memory position store.
#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    position: RwLock<Option<Position>>,
    writes: RwLock<Vec<Position>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every position written so far, oldest first.
    pub fn writes(&self) -> Vec<Position> {
        self.writes.read().clone()
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn save_position(&self, position: &Position) -> Result<()> {
        *self.position.write() = Some(position.clone());
        self.writes.write().push(position.clone());
        Ok(())
    }

    async fn load_position(&self) -> Result<Option<Position>> {
        Ok(self.position.read().clone())
    }
}

/// Shared position store.
pub type SharedPositionStore = Arc<dyn PositionStore>;

/// Current master position plus save throttling.
pub struct MasterInfo {
    position: RwLock<Position>,
    last_saved: RwLock<Option<Position>>,
    last_save_at: Mutex<Option<Instant>>,
    save_interval: Duration,
    store: SharedPositionStore,
}

impl MasterInfo {
    pub fn new(store: SharedPositionStore, save_interval: Duration) -> Self {
        Self {
            position: RwLock::new(Position::default()),
            last_saved: RwLock::new(None),
            last_save_at: Mutex::new(None),
            save_interval,
            store,
        }
    }

    /// Restore the last persisted position from `store`.
    pub async fn load(store: SharedPositionStore, save_interval: Duration) -> Result<Self> {
        let saved = store.load_position().await?;
        let info = Self::new(store, save_interval);
        if let Some(pos) = saved {
            info!("Loaded master position {}", pos);
            *info.position.write() = pos.clone();
            *info.last_saved.write() = Some(pos);
        }
        Ok(info)
    }

    /// Overwrite the tracked position.
    pub fn update(&self, name: &str, pos: u32) {
        let mut current = self.position.write();
        if current.name != name {
            current.name = name.to_string();
        }
        current.pos = pos;
    }

    pub fn position(&self) -> Position {
        self.position.read().clone()
    }

    /// Last position written to the store.
    pub fn last_saved(&self) -> Option<Position> {
        self.last_saved.read().clone()
    }

    pub fn save_interval(&self) -> Duration {
        self.save_interval
    }

    /// Persist the current position.
    ///
    /// Returns whether a write happened. A non-forced save inside the
    /// throttle window is skipped.
    pub async fn save(&self, force: bool) -> Result<bool> {
        if !force {
            let throttled = self
                .last_save_at
                .lock()
                .is_some_and(|at| at.elapsed() < self.save_interval);
            if throttled {
                return Ok(false);
            }
        }

        let position = self.position();
        self.store.save_position(&position).await.map_err(|e| match e {
            e @ BinlogError::Store(_) => e,
            other => BinlogError::store(format!("save {}: {}", position, other)),
        })?;

        *self.last_save_at.lock() = Some(Instant::now());
        *self.last_saved.write() = Some(position);
        Ok(true)
    }

    /// Poll until the tracked position reaches `target` or `timeout` passes.
    ///
    /// A timeout too large to form a deadline (e.g. `Duration::MAX`) waits
    /// without bound.
    pub async fn wait_until(
        &self,
        target: &Position,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now().checked_add(timeout);

        loop {
            let current = self.position();
            if current.reached(target) {
                return Ok(());
            }

            let mut sleep_for = poll_interval;
            if let Some(deadline) = deadline {
                let now = tokio::time::Instant::now();
                if now >= deadline {
                    return Err(BinlogError::WaitTimeout {
                        target: target.clone(),
                        current,
                    });
                }
                sleep_for = sleep_for.min(deadline - now);
            }
            tokio::time::sleep(sleep_for).await;
        }
    }
}

impl std::fmt::Debug for MasterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterInfo")
            .field("position", &self.position())
            .field("last_saved", &self.last_saved())
            .field("save_interval", &self.save_interval)
            .finish()
    }
}

/// Get current Unix timestamp in seconds.
fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
