//! # Common binlog sync types
//!
//! Building blocks of the sync loop:
//!
//! - [`Position`] - binlog `(file, offset)` with generation ordering
//! - [`ReplicationEvent`] - event header plus [`BinlogEvent`] body
//! - [`SchemaFilter`] - schema scope check with memoized skips
//! - [`parse_alter_table`] - `ALTER TABLE` target extraction
//! - [`RowsChange`] / [`HandlerRegistry`] - row translation and dispatch
//! - [`MasterInfo`] - current position and save throttling
//! - [`TableCache`] - lazily loaded table metadata
//! - [`PullBackoff`] - pull timeout doubling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Common Module                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BinlogTransport ←─── opens the replication stream          │
//! │  SchemaFilter    ←─── drops out-of-scope row events         │
//! │  DDL detector    ←─── invalidates TableResolver entries     │
//! │  RowsChange      ←─── canonical change for handlers         │
//! │  MasterInfo      ←─── position + PositionStore persistence  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod backoff;
mod config;
pub mod ddl;
mod error;
mod event;
mod filter;
mod master;
mod position;
mod rows;
mod table;
mod traits;

pub use backoff::*;
pub use config::*;
pub use ddl::{parse_alter_table, AlterTable};
pub use error::*;
pub use event::*;
pub use filter::*;
pub use master::*;
pub use position::*;
pub use rows::*;
pub use table::*;
pub use traits::*;
