//! Error types for binlog synchronization
//!
//! Every failure that reaches the sync loop ends the session; the caller owns
//! the reconnect policy. Classification helpers let that caller decide
//! whether a restart from the last saved position is worth attempting.

use crate::common::{EventType, Position};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories for metrics and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Database-specific errors (connection, query)
    Database,
    /// Replication stream errors (transport, unsupported events)
    Replication,
    /// Table metadata errors
    Schema,
    /// Downstream handler rejected a change
    Handler,
    /// Position persistence errors
    Storage,
    /// Configuration errors (invalid settings)
    Configuration,
    /// Caller-side errors (wait timeout)
    Caller,
    /// Serialization errors (JSON)
    Serialization,
}

/// Binlog sync errors
#[derive(Error, Debug)]
pub enum BinlogError {
    /// MySQL client error
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    /// Replication transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Replication stream closed by the server
    #[error("Connection closed")]
    ConnectionClosed,

    /// Rows event with a subtype that is not write/update/delete
    #[error("{0:?} is not a supported rows event")]
    UnsupportedRowsEvent(EventType),

    /// Table metadata lookup failure
    #[error("Schema error: {0}")]
    Schema(String),

    /// Downstream handler failure
    #[error("Handler '{handler}' failed: {message}")]
    Handler { handler: String, message: String },

    /// Position store failure
    #[error("Position store error: {0}")]
    Store(String),

    /// Tracked position did not reach the target in time
    #[error("Timed out waiting for position {target} (current: {current})")]
    WaitTimeout { target: Position, current: Position },

    /// Malformed position string
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BinlogError {
    /// Create a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a handler error attributed to `handler`
    pub fn handler(handler: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Handler {
            handler: handler.into(),
            message: msg.into(),
        }
    }

    /// Create a new position store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if restarting the session from the last saved position may succeed.
    ///
    /// Stream and connection problems are transient. A handler that rejected a
    /// change, an unsupported event or a bad configuration will fail the same
    /// way again.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::ConnectionClosed | Self::Store(_) => true,

            #[cfg(feature = "mysql")]
            Self::MySql(e) => matches!(e, mysql_async::Error::Io(_)),

            Self::Io(e) => {
                use std::io::ErrorKind;
                matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::TimedOut
                        | ErrorKind::Interrupted
                )
            }

            Self::UnsupportedRowsEvent(_)
            | Self::Schema(_)
            | Self::Handler { .. }
            | Self::WaitTimeout { .. }
            | Self::InvalidPosition(_)
            | Self::Config(_)
            | Self::Json(_) => false,
        }
    }

    /// Check if this is the caller-side wait timeout rather than a system fault.
    pub fn is_wait_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }

    /// Get the error category for metrics and alerting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            #[cfg(feature = "mysql")]
            Self::MySql(_) => ErrorCategory::Database,
            Self::Transport(_) => ErrorCategory::Replication,
            Self::ConnectionClosed => ErrorCategory::Replication,
            Self::UnsupportedRowsEvent(_) => ErrorCategory::Replication,
            Self::Schema(_) => ErrorCategory::Schema,
            Self::Handler { .. } => ErrorCategory::Handler,
            Self::Store(_) => ErrorCategory::Storage,
            Self::Io(_) => ErrorCategory::Storage,
            Self::WaitTimeout { .. } => ErrorCategory::Caller,
            Self::InvalidPosition(_) => ErrorCategory::Configuration,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Json(_) => ErrorCategory::Serialization,
        }
    }

    /// Get a metric-safe error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            #[cfg(feature = "mysql")]
            Self::MySql(_) => "mysql_error",
            Self::Transport(_) => "transport_error",
            Self::ConnectionClosed => "connection_closed",
            Self::UnsupportedRowsEvent(_) => "unsupported_rows_event",
            Self::Schema(_) => "schema_error",
            Self::Handler { .. } => "handler_error",
            Self::Store(_) => "store_error",
            Self::WaitTimeout { .. } => "wait_timeout",
            Self::InvalidPosition(_) => "invalid_position",
            Self::Config(_) => "config_error",
            Self::Json(_) => "json_error",
            Self::Io(_) => "io_error",
        }
    }
}

/// Result type for binlog sync operations
pub type Result<T> = std::result::Result<T, BinlogError>;
