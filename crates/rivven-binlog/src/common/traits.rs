//! Collaborator traits at the edge of the sync core
//!
//! The replication transport (handshake, framing, decoding) and live status
//! queries are implemented outside this crate's core loop.

use crate::common::{Position, ReplicationEvent, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Replication transport that can open a binlog stream.
#[async_trait]
pub trait BinlogTransport: Send + Sync {
    /// Begin streaming from `position`.
    async fn start_sync(&self, position: &Position) -> Result<Box<dyn BinlogStream>>;
}

/// Open binlog stream.
#[async_trait]
pub trait BinlogStream: Send {
    /// Wait up to `timeout` for the next event.
    ///
    /// `Ok(None)` means the deadline passed without an event; that is not an
    /// error. Any `Err` ends the sync session.
    async fn next_event(&mut self, timeout: Duration) -> Result<Option<ReplicationEvent>>;
}

/// Live master status (`SHOW MASTER STATUS`).
#[async_trait]
pub trait MasterStatus: Send + Sync {
    async fn master_position(&self) -> Result<Position>;
}
