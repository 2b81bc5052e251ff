//! Row event translation and downstream dispatch
//!
//! A rows event plus its resolved [`TableMetadata`] becomes a [`RowsChange`],
//! which is handed to every registered [`RowsEventHandler`] in registration
//! order. The change is borrowed by handlers and dropped afterwards.

use crate::common::{BinlogError, ColumnValue, EventType, Result, TableMetadata};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Row change kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowsAction {
    Insert,
    Update,
    Delete,
}

impl RowsAction {
    /// Map a rows event subtype (either on-wire version) to an action.
    pub fn from_event_type(event_type: EventType) -> Result<Self> {
        match event_type {
            EventType::WriteRowsEventV1 | EventType::WriteRowsEventV2 => Ok(RowsAction::Insert),
            EventType::UpdateRowsEventV1 | EventType::UpdateRowsEventV2 => Ok(RowsAction::Update),
            EventType::DeleteRowsEventV1 | EventType::DeleteRowsEventV2 => Ok(RowsAction::Delete),
            other => Err(BinlogError::UnsupportedRowsEvent(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowsAction::Insert => "insert",
            RowsAction::Update => "update",
            RowsAction::Delete => "delete",
        }
    }
}

impl fmt::Display for RowsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical row change handed to downstream handlers.
#[derive(Debug, Clone)]
pub struct RowsChange {
    pub table: Arc<TableMetadata>,
    pub action: RowsAction,
    /// Row images; for updates, consecutive (before, after) pairs
    pub rows: Vec<Vec<ColumnValue>>,
}

impl RowsChange {
    /// Build a change record, rejecting an update with an unpaired image.
    pub fn new(
        table: Arc<TableMetadata>,
        action: RowsAction,
        rows: Vec<Vec<ColumnValue>>,
    ) -> Result<Self> {
        if action == RowsAction::Update && rows.len() % 2 != 0 {
            return Err(BinlogError::schema(format!(
                "update on {} carries {} row images, expected before/after pairs",
                table.full_name(),
                rows.len()
            )));
        }
        Ok(Self {
            table,
            action,
            rows,
        })
    }

    /// Translate a rows event of `event_type` against resolved metadata.
    pub fn translate(
        event_type: EventType,
        table: Arc<TableMetadata>,
        rows: Vec<Vec<ColumnValue>>,
    ) -> Result<Self> {
        let action = RowsAction::from_event_type(event_type)?;
        Self::new(table, action, rows)
    }

    /// Number of logical row changes (an update pair counts once).
    pub fn len(&self) -> usize {
        match self.action {
            RowsAction::Update => self.rows.len() / 2,
            RowsAction::Insert | RowsAction::Delete => self.rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// (before, after) pairs of an update. Empty for inserts and deletes.
    pub fn pairs(&self) -> impl Iterator<Item = (&[ColumnValue], &[ColumnValue])> {
        let rows: &[Vec<ColumnValue>] = if self.action == RowsAction::Update {
            &self.rows
        } else {
            &[]
        };
        rows.chunks_exact(2)
            .map(|pair| (pair[0].as_slice(), pair[1].as_slice()))
    }

    /// Render a row as a JSON object keyed by column name.
    ///
    /// Values beyond the known columns are keyed `colN`.
    pub fn row_json(&self, row: &[ColumnValue]) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (i, value) in row.iter().enumerate() {
            let name = self
                .table
                .columns
                .get(i)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("col{}", i));
            map.insert(name, value.to_json());
        }
        serde_json::Value::Object(map)
    }

    /// Primary key values of a row, in key order.
    pub fn primary_key<'a>(&self, row: &'a [ColumnValue]) -> Vec<&'a ColumnValue> {
        self.table
            .pk_columns
            .iter()
            .filter_map(|&idx| row.get(idx))
            .collect()
    }
}

/// Downstream consumer of row changes.
///
/// Handlers run synchronously inside the sync loop; returning an error ends
/// the sync session.
#[async_trait]
pub trait RowsEventHandler: Send + Sync {
    async fn on_rows(&self, change: &RowsChange) -> Result<()>;

    /// Name used in logs and errors
    fn name(&self) -> &str;
}

/// Ordered set of registered handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Arc<dyn RowsEventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn RowsEventHandler>) {
        self.handlers.write().push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Invoke every handler in registration order, stopping at the first failure.
    pub async fn dispatch(&self, change: &RowsChange) -> Result<()> {
        // snapshot so the lock is not held across await
        let handlers: Vec<_> = self.handlers.read().clone();

        for handler in handlers {
            if let Err(e) = handler.on_rows(change).await {
                error!(
                    "Handler '{}' failed on {} {}: {}",
                    handler.name(),
                    change.action,
                    change.table.full_name(),
                    e
                );
                return Err(match e {
                    e @ BinlogError::Handler { .. } => e,
                    other => BinlogError::handler(handler.name(), other.to_string()),
                });
            }
        }
        Ok(())
    }
}
