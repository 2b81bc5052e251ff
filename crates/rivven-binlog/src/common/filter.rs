//! Schema scope filtering
//!
//! A sync session may be restricted to one schema (the dumped database).
//! Row events for any other schema are dropped; the skip decision for each
//! out-of-scope schema is remembered so it is logged once per session.

use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::info;

/// Outcome of a scope check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaDecision {
    /// Schema is in scope
    Include,
    /// Schema is out of scope; `first_seen` is true on the first observation
    Skip { first_seen: bool },
}

impl SchemaDecision {
    pub fn is_skipped(&self) -> bool {
        matches!(self, SchemaDecision::Skip { .. })
    }
}

/// Scope filter owned by one sync session.
#[derive(Debug, Default)]
pub struct SchemaFilter {
    table_db: Option<String>,
    skipped: Mutex<HashSet<String>>,
}

impl SchemaFilter {
    /// Restrict to `table_db`. `None` or an empty name means no restriction.
    pub fn new(table_db: Option<String>) -> Self {
        Self {
            table_db: table_db.filter(|db| !db.is_empty()),
            skipped: Mutex::new(HashSet::new()),
        }
    }

    /// Filter that lets every schema through.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn table_db(&self) -> Option<&str> {
        self.table_db.as_deref()
    }

    pub fn check(&self, schema: &str) -> SchemaDecision {
        let Some(table_db) = self.table_db.as_deref() else {
            return SchemaDecision::Include;
        };
        if table_db == schema {
            return SchemaDecision::Include;
        }

        let first_seen = {
            let mut skipped = self.skipped.lock();
            !skipped.contains(schema) && skipped.insert(schema.to_string())
        };

        if first_seen {
            info!(
                "Schema '{}' is outside the configured scope '{}', skipping its row events",
                schema, table_db
            );
        }
        SchemaDecision::Skip { first_seen }
    }

    pub fn is_skipped(&self, schema: &str) -> bool {
        self.check(schema).is_skipped()
    }

    /// Schemas skipped so far, sorted.
    pub fn skipped_schemas(&self) -> Vec<String> {
        let mut schemas: Vec<_> = self.skipped.lock().iter().cloned().collect();
        schemas.sort();
        schemas
    }
}
