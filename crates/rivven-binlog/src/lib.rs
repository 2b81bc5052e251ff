//! # rivven-binlog - MySQL binlog sync core for Rivven
//!
//! Consumes a MySQL replication stream and keeps downstream consumers in step
//! with the master:
//!
//! - row changes are filtered by schema, resolved against table metadata and
//!   handed to registered [`RowsEventHandler`]s in registration order
//! - `ALTER TABLE` statements drop cached metadata for the altered table
//! - the binlog position is persisted only at safe boundaries (commit,
//!   rotation, DDL), so a restart replays at most the interrupted transaction
//!
//! ## Features
//!
//! - `mysql` (default) - INFORMATION_SCHEMA table loader and live master
//!   status over `mysql_async`
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ BinlogTransport  │  opens the replication stream
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                       BinlogSync                         │
//! │  SchemaFilter · TableResolver · DDL detector · backoff   │
//! └────────┬────────────────────────────────┬────────────────┘
//!          ▼                                ▼
//! ┌──────────────────┐            ┌──────────────────────────┐
//! │ HandlerRegistry  │            │ MasterInfo               │
//! │  RowsChange ...  │            │  PositionStore + mirror  │
//! └──────────────────┘            └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rivven_binlog::common::{BinlogTransport, TableResolver};
//! use rivven_binlog::{BinlogSync, SyncConfig};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     transport: Arc<dyn BinlogTransport>,
//! #     tables: Arc<dyn TableResolver>,
//! # ) -> rivven_binlog::Result<()> {
//! let config = SyncConfig::builder()
//!     .table_db("shop")
//!     .master_info_path("/var/lib/rivven/master.info")
//!     .start_position("mysql-bin.000001", 4)
//!     .build();
//!
//! let sync = BinlogSync::open(config, transport, tables).await?;
//! sync.resume().await?;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod sync;

#[cfg(feature = "mysql")]
pub mod mysql;

pub use common::{
    // Errors
    BinlogError,
    ErrorCategory,
    Result,
    // Positions
    FilePositionStore,
    MasterInfo,
    MasterInfoHandler,
    MemoryPositionStore,
    Position,
    PositionStore,
    // Events
    BinlogEvent,
    ReplicationEvent,
    // Row dispatch
    RowsAction,
    RowsChange,
    RowsEventHandler,
    // Configuration
    SyncConfig,
    SyncConfigBuilder,
};
pub use sync::BinlogSync;
