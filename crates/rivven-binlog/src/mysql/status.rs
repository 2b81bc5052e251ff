//! Live master position via `SHOW BINARY LOG STATUS` / `SHOW MASTER STATUS`

use crate::common::{BinlogError, MasterStatus, Position, Result};
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Pool, Row};
use tracing::{debug, info};

/// [`MasterStatus`] backed by a metadata connection pool.
#[derive(Debug, Clone)]
pub struct MySqlMasterStatus {
    pool: Pool,
}

impl MySqlMasterStatus {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MasterStatus for MySqlMasterStatus {
    async fn master_position(&self) -> Result<Position> {
        let mut conn = self.pool.get_conn().await?;

        // MySQL 8.2+ renamed the statement
        let rows: Vec<Row> = match conn.query("SHOW BINARY LOG STATUS").await {
            Ok(rows) => rows,
            Err(e) => {
                debug!("SHOW BINARY LOG STATUS failed ({}), trying SHOW MASTER STATUS", e);
                conn.query("SHOW MASTER STATUS").await?
            }
        };

        let row = rows.into_iter().next().ok_or_else(|| {
            BinlogError::config(
                "SHOW MASTER STATUS returned no rows, binary logging may be disabled",
            )
        })?;
        let file = row.get_opt::<String, _>(0).and_then(|v| v.ok());
        let pos = row.get_opt::<u64, _>(1).and_then(|v| v.ok());
        let position = position_from_row(file, pos)?;

        info!("Current master position: {}", position);
        Ok(position)
    }
}

fn position_from_row(file: Option<String>, pos: Option<u64>) -> Result<Position> {
    let file = file.filter(|f| !f.is_empty()).ok_or_else(|| {
        BinlogError::config("SHOW MASTER STATUS returned an empty file name")
    })?;
    let pos = pos.unwrap_or(4);
    let pos = u32::try_from(pos)
        .map_err(|_| BinlogError::InvalidPosition(format!("{}:{}", file, pos)))?;
    Ok(Position::new(file, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_row() {
        let pos = position_from_row(Some("mysql-bin.000003".into()), Some(1542)).unwrap();
        assert_eq!(pos, Position::new("mysql-bin.000003", 1542));
    }

    #[test]
    fn test_position_from_row_defaults_offset() {
        let pos = position_from_row(Some("mysql-bin.000003".into()), None).unwrap();
        assert_eq!(pos.pos, 4);
    }

    #[test]
    fn test_position_from_row_rejects_empty_file() {
        assert!(matches!(
            position_from_row(Some(String::new()), Some(4)),
            Err(BinlogError::Config(_))
        ));
        assert!(position_from_row(None, Some(4)).is_err());
    }

    #[test]
    fn test_position_from_row_rejects_wide_offset() {
        assert!(matches!(
            position_from_row(Some("mysql-bin.000001".into()), Some(u64::from(u32::MAX) + 1)),
            Err(BinlogError::InvalidPosition(_))
        ));
    }
}
