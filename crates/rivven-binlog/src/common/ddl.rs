//! `ALTER TABLE` detection in statement events
//!
//! Only `ALTER TABLE [schema.]table` is recognized. CREATE, DROP, RENAME and
//! TRUNCATE pass through unhandled, so cached metadata for a table that is
//! dropped and recreated under the same name stays stale until an ALTER
//! touches it.

use regex::Regex;
use std::sync::LazyLock;

static ALTER_TABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*ALTER\s+TABLE\s+(?:(?:`([^`]+)`|([^`.\s;(]+))\s*\.\s*)?(?:`([^`]+)`|([^`.\s;(]+))",
    )
    .unwrap()
});

/// Table targeted by an `ALTER TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterTable {
    /// Schema qualifier, if the statement had one
    pub schema: Option<String>,
    pub table: String,
}

impl AlterTable {
    /// `(schema, table)`, falling back to the event's default schema.
    pub fn resolve(self, default_schema: &str) -> (String, String) {
        let schema = self
            .schema
            .unwrap_or_else(|| default_schema.to_string());
        (schema, self.table)
    }
}

/// Parse the target of an `ALTER TABLE` statement.
///
/// Matching is case-insensitive; identifiers may be backtick-quoted.
pub fn parse_alter_table(sql: &str) -> Option<AlterTable> {
    let caps = ALTER_TABLE_REGEX.captures(sql)?;

    let schema = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string());
    let table = caps.get(3).or_else(|| caps.get(4))?.as_str().to_string();

    Some(AlterTable { schema, table })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alter(schema: Option<&str>, table: &str) -> Option<AlterTable> {
        Some(AlterTable {
            schema: schema.map(String::from),
            table: table.to_string(),
        })
    }

    #[test]
    fn test_qualified_quoted() {
        let alter = parse_alter_table("ALTER TABLE `shop`.`orders` ADD COLUMN x INT").unwrap();
        assert_eq!(alter.schema.as_deref(), Some("shop"));
        assert_eq!(alter.table, "orders");
    }

    #[test]
    fn test_unqualified_falls_back_to_event_schema() {
        let alter = parse_alter_table("ALTER TABLE orders RENAME COLUMN a TO b").unwrap();
        assert_eq!(alter.schema, None);
        assert_eq!(
            alter.resolve("shop"),
            ("shop".to_string(), "orders".to_string())
        );
    }

    #[test]
    fn test_qualified_resolve_keeps_statement_schema() {
        let alter = parse_alter_table("alter table shop.orders drop column x").unwrap();
        assert_eq!(
            alter.resolve("other"),
            ("shop".to_string(), "orders".to_string())
        );
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(
            parse_alter_table("  Alter\n  Table\t`Orders` ENGINE=InnoDB"),
            alter(None, "Orders")
        );
    }

    #[test]
    fn test_mixed_quoting() {
        assert_eq!(
            parse_alter_table("ALTER TABLE shop.`order items` ADD INDEX (sku)"),
            alter(Some("shop"), "order items")
        );
        assert_eq!(
            parse_alter_table("ALTER TABLE `shop` . orders ADD INDEX (sku)"),
            alter(Some("shop"), "orders")
        );
    }

    #[test]
    fn test_other_ddl_not_recognized() {
        assert_eq!(parse_alter_table("CREATE TABLE orders (id INT)"), None);
        assert_eq!(parse_alter_table("DROP TABLE orders"), None);
        assert_eq!(parse_alter_table("RENAME TABLE orders TO orders_old"), None);
        assert_eq!(parse_alter_table("TRUNCATE TABLE orders"), None);
        assert_eq!(parse_alter_table("BEGIN"), None);
        assert_eq!(parse_alter_table("INSERT INTO t VALUES ('ALTER TABLE x')"), None);
    }
}
