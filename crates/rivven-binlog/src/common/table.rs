//! Table metadata and the metadata cache
//!
//! Binlog row events carry values but no column names. The sync loop
//! resolves `(schema, table)` through a [`TableResolver`] on first use and
//! invalidates the entry when an `ALTER TABLE` for it goes by.
//!
//! [`TableCache`] is the stock resolver: it wraps a [`TableLoader`] (for
//! example the `INFORMATION_SCHEMA` loader behind the `mysql` feature),
//! fetches lazily and evicts FIFO once `max_entries` is exceeded.

use crate::common::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Coarse column type, enough to interpret row values downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Number,
    Float,
    Decimal,
    String,
    Binary,
    Enum,
    Set,
    Bit,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
}

impl ColumnType {
    /// Map a MySQL `DATA_TYPE` / `COLUMN_TYPE` to a coarse type.
    pub fn from_mysql(raw_type: &str) -> Self {
        let lower = raw_type.to_ascii_lowercase();
        let base = lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or("");

        match base {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "year" => {
                ColumnType::Number
            }
            "float" | "double" | "real" => ColumnType::Float,
            "decimal" | "numeric" => ColumnType::Decimal,
            "enum" => ColumnType::Enum,
            "set" => ColumnType::Set,
            "bit" => ColumnType::Bit,
            "date" => ColumnType::Date,
            "time" => ColumnType::Time,
            "datetime" => ColumnType::DateTime,
            "timestamp" => ColumnType::Timestamp,
            "json" => ColumnType::Json,
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                ColumnType::Binary
            }
            _ => ColumnType::String,
        }
    }
}

/// Column descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    /// Column type as reported by the server, e.g. `int(10) unsigned`
    pub raw_type: String,
    pub column_type: ColumnType,
    pub is_unsigned: bool,
}

impl TableColumn {
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        let raw_type = raw_type.into();
        Self {
            name: name.into(),
            column_type: ColumnType::from_mysql(&raw_type),
            is_unsigned: raw_type.to_ascii_lowercase().contains("unsigned"),
            raw_type,
        }
    }
}

/// Table structure used to interpret row images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub schema: String,
    pub name: String,
    pub columns: Vec<TableColumn>,
    /// Indexes into `columns`, in key order
    pub pk_columns: Vec<usize>,
}

impl TableMetadata {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            pk_columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        self.columns.push(TableColumn::new(name, raw_type));
        self
    }

    /// Mark the named column as part of the primary key.
    ///
    /// Unknown names are ignored.
    pub fn with_pk_column(mut self, name: &str) -> Self {
        if let Some(idx) = self.find_column(name) {
            if !self.pk_columns.contains(&idx) {
                self.pk_columns.push(idx);
            }
        }
        self
    }

    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// `schema.table`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Metadata collaborator consulted by the sync loop.
#[async_trait]
pub trait TableResolver: Send + Sync {
    /// Resolve metadata for `schema.table`, fetching it if necessary.
    async fn resolve_table(&self, schema: &str, table: &str) -> Result<Arc<TableMetadata>>;

    /// Drop any cached metadata for `schema.table`. Fire-and-forget.
    fn invalidate_table(&self, schema: &str, table: &str);
}

/// Source of table metadata for [`TableCache`].
#[async_trait]
pub trait TableLoader: Send + Sync {
    async fn load_table(&self, schema: &str, table: &str) -> Result<TableMetadata>;
}

/// Lazily populated table metadata cache with FIFO eviction.
///
/// The lock is never held across the loader call; two concurrent misses for
/// the same table both load and the later insert wins.
pub struct TableCache<L> {
    loader: L,
    inner: Mutex<CacheInner>,
    max_entries: usize,
}

struct CacheInner {
    /// Map of (schema, table) -> metadata
    tables: HashMap<(String, String), Arc<TableMetadata>>,
    /// Insertion order for FIFO eviction
    insertion_order: VecDeque<(String, String)>,
}

impl<L: TableLoader> TableCache<L> {
    /// Default maximum cache entries
    const DEFAULT_MAX_ENTRIES: usize = 1000;

    pub fn new(loader: L) -> Self {
        Self::with_max_entries(loader, Self::DEFAULT_MAX_ENTRIES)
    }

    /// Create with custom maximum entries
    pub fn with_max_entries(loader: L, max_entries: usize) -> Self {
        Self {
            loader,
            inner: Mutex::new(CacheInner {
                tables: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            max_entries: max_entries.max(1),
        }
    }

    /// Get cached metadata without loading.
    pub fn get(&self, schema: &str, table: &str) -> Option<Arc<TableMetadata>> {
        self.inner
            .lock()
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
    }

    pub fn contains(&self, schema: &str, table: &str) -> bool {
        self.get(schema, table).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.tables.clear();
        inner.insertion_order.clear();
    }

    fn insert(&self, metadata: Arc<TableMetadata>) {
        let key = (metadata.schema.clone(), metadata.name.clone());
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.tables.insert(key.clone(), metadata).is_some() {
            return;
        }
        inner.insertion_order.push_back(key);

        while inner.tables.len() > self.max_entries {
            match inner.insertion_order.pop_front() {
                Some(oldest) => {
                    inner.tables.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl<L: TableLoader> TableResolver for TableCache<L> {
    async fn resolve_table(&self, schema: &str, table: &str) -> Result<Arc<TableMetadata>> {
        if let Some(cached) = self.get(schema, table) {
            return Ok(cached);
        }

        let loaded = Arc::new(self.loader.load_table(schema, table).await?);
        debug!(
            "Cached {} columns for {}.{}",
            loaded.columns.len(),
            schema,
            table
        );
        self.insert(loaded.clone());
        Ok(loaded)
    }

    fn invalidate_table(&self, schema: &str, table: &str) {
        let key = (schema.to_string(), table.to_string());
        let mut inner = self.inner.lock();
        if inner.tables.remove(&key).is_some() {
            inner.insertion_order.retain(|k| k != &key);
        }
    }
}
