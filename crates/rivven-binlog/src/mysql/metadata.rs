//! Table metadata from `INFORMATION_SCHEMA.COLUMNS`

use crate::common::{BinlogError, Result, TableLoader, TableMetadata};
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::Pool;
use tracing::debug;

const COLUMNS_QUERY: &str = r"
    SELECT COLUMN_NAME, COLUMN_TYPE, COLUMN_KEY
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
";

/// [`TableLoader`] that reads column definitions over a metadata pool.
///
/// Wrap it in a [`TableCache`](crate::common::TableCache) to get a
/// [`TableResolver`](crate::common::TableResolver).
#[derive(Debug, Clone)]
pub struct InformationSchemaLoader {
    pool: Pool,
}

impl InformationSchemaLoader {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TableLoader for InformationSchemaLoader {
    async fn load_table(&self, schema: &str, table: &str) -> Result<TableMetadata> {
        let mut conn = self.pool.get_conn().await?;
        let columns: Vec<(String, String, String)> =
            conn.exec(COLUMNS_QUERY, (schema, table)).await?;

        let metadata = build_metadata(schema, table, columns)?;
        debug!(
            "Loaded {} column(s) for {} (pk: {:?})",
            metadata.columns.len(),
            metadata.full_name(),
            metadata.pk_columns
        );
        Ok(metadata)
    }
}

fn build_metadata(
    schema: &str,
    table: &str,
    columns: Vec<(String, String, String)>,
) -> Result<TableMetadata> {
    if columns.is_empty() {
        return Err(BinlogError::schema(format!(
            "table {}.{} not found",
            schema, table
        )));
    }

    let mut metadata = TableMetadata::new(schema, table);
    let mut pk = Vec::new();
    for (name, column_type, key) in columns {
        if key == "PRI" {
            pk.push(name.clone());
        }
        metadata = metadata.with_column(name, column_type);
    }
    for name in &pk {
        metadata = metadata.with_pk_column(name);
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ColumnType;

    fn col(name: &str, ty: &str, key: &str) -> (String, String, String) {
        (name.into(), ty.into(), key.into())
    }

    #[test]
    fn test_build_metadata() {
        let t = build_metadata(
            "shop",
            "order_items",
            vec![
                col("order_id", "bigint unsigned", "PRI"),
                col("line", "int", "PRI"),
                col("sku", "varchar(64)", "MUL"),
                col("price", "decimal(10,2)", ""),
            ],
        )
        .unwrap();

        assert_eq!(t.full_name(), "shop.order_items");
        assert_eq!(t.columns.len(), 4);
        assert_eq!(t.pk_columns, vec![0, 1]);
        assert!(t.columns[0].is_unsigned);
        assert_eq!(t.columns[3].column_type, ColumnType::from_mysql("decimal(10,2)"));
    }

    #[test]
    fn test_build_metadata_missing_table() {
        assert!(matches!(
            build_metadata("shop", "gone", Vec::new()),
            Err(BinlogError::Schema(_))
        ));
    }
}
