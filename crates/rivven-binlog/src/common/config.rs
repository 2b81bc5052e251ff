//! Sync session configuration
//!
//! ```rust
//! use rivven_binlog::SyncConfig;
//! use std::time::Duration;
//!
//! let config = SyncConfig::builder()
//!     .table_db("shop")
//!     .save_interval(Duration::from_secs(5))
//!     .build();
//!
//! assert_eq!(config.table_db.as_deref(), Some("shop"));
//! assert!(config.validate().is_ok());
//! ```

use crate::common::{BinlogError, Position, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Sync session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Only replicate row events of this schema (empty/absent = all)
    #[serde(default)]
    pub table_db: Option<String>,

    /// Initial pull wait, doubled on each consecutive timeout (milliseconds)
    #[serde(default = "default_pull_timeout", with = "duration_ms")]
    pub pull_timeout: Duration,

    /// Minimum gap between best-effort position saves (milliseconds)
    #[serde(default = "default_save_interval", with = "duration_ms")]
    pub save_interval: Duration,

    /// Poll interval of position waits (milliseconds)
    #[serde(default = "default_wait_poll_interval", with = "duration_ms")]
    pub wait_poll_interval: Duration,

    /// Wait timeout used when the caller passes zero (milliseconds)
    #[serde(default = "default_wait_timeout", with = "duration_ms")]
    pub default_wait_timeout: Duration,

    /// Master info file; `None` keeps the position in memory only
    #[serde(default)]
    pub master_info_path: Option<PathBuf>,

    /// Position to start from when no saved position exists
    #[serde(default)]
    pub start_position: Option<Position>,
}

fn default_pull_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_save_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_wait_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_wait_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            table_db: None,
            pull_timeout: default_pull_timeout(),
            save_interval: default_save_interval(),
            wait_poll_interval: default_wait_poll_interval(),
            default_wait_timeout: default_wait_timeout(),
            master_info_path: None,
            start_position: None,
        }
    }
}

impl SyncConfig {
    /// Create a new config builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Scope restriction, with an empty name treated as none.
    pub fn scope(&self) -> Option<&str> {
        self.table_db.as_deref().filter(|db| !db.is_empty())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pull_timeout.is_zero() {
            return Err(BinlogError::config("pull_timeout must be greater than zero"));
        }
        if self.wait_poll_interval.is_zero() {
            return Err(BinlogError::config(
                "wait_poll_interval must be greater than zero",
            ));
        }
        if self.default_wait_timeout.is_zero() {
            return Err(BinlogError::config(
                "default_wait_timeout must be greater than zero",
            ));
        }
        if let Some(pos) = &self.start_position {
            if pos.name.is_empty() {
                return Err(BinlogError::config("start_position needs a binlog file name"));
            }
        }
        Ok(())
    }
}

/// Builder for SyncConfig.
#[derive(Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Restrict row events to one schema.
    pub fn table_db(mut self, schema: impl Into<String>) -> Self {
        self.config.table_db = Some(schema.into());
        self
    }

    /// Set the pull wait floor.
    pub fn pull_timeout(mut self, timeout: Duration) -> Self {
        self.config.pull_timeout = timeout;
        self
    }

    /// Set the best-effort save throttle.
    pub fn save_interval(mut self, interval: Duration) -> Self {
        self.config.save_interval = interval;
        self
    }

    /// Set the position wait poll interval.
    pub fn wait_poll_interval(mut self, interval: Duration) -> Self {
        self.config.wait_poll_interval = interval;
        self
    }

    /// Set the default position wait timeout.
    pub fn default_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_wait_timeout = timeout;
        self
    }

    /// Persist the master position to this file.
    pub fn master_info_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.master_info_path = Some(path.into());
        self
    }

    /// Start from this position when nothing was saved yet.
    pub fn start_position(mut self, name: impl Into<String>, pos: u32) -> Self {
        self.config.start_position = Some(Position::new(name, pos));
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

/// Duration fields as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
