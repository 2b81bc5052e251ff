//! Binlog stream position
//!
//! A position is a `(file, offset)` pointer into the replication log. MySQL
//! names binlog files `<base>.<sequence>` (e.g. `mysql-bin.000003`), so
//! ordering compares the base name first, then the numeric sequence, then
//! the offset inside the file.

use crate::common::{BinlogError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Position in the MySQL binary log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Binlog file name
    pub name: String,
    /// Byte offset of the next event to read
    pub pos: u32,
}

impl Position {
    pub fn new(name: impl Into<String>, pos: u32) -> Self {
        Self {
            name: name.into(),
            pos,
        }
    }

    /// Check if this position has reached `target`.
    pub fn reached(&self, target: &Position) -> bool {
        self >= target
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.pos)
    }
}

impl FromStr for Position {
    type Err = BinlogError;

    /// Parse the `file:offset` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, pos) = s
            .rsplit_once(':')
            .ok_or_else(|| BinlogError::InvalidPosition(s.to_string()))?;
        if name.is_empty() {
            return Err(BinlogError::InvalidPosition(s.to_string()));
        }
        let pos = pos
            .parse::<u32>()
            .map_err(|_| BinlogError::InvalidPosition(s.to_string()))?;
        Ok(Self::new(name, pos))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_binlog_names(&self.name, &other.name).then(self.pos.cmp(&other.pos))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare binlog file names by generation order.
///
/// Names sharing a base compare by numeric sequence, so `mysql-bin.1000000`
/// sorts after `mysql-bin.999999`. Names without a numeric extension sort
/// before numbered names of the same base. The full name breaks remaining
/// ties so that only identical names compare equal.
pub fn compare_binlog_names(a: &str, b: &str) -> Ordering {
    let (a_base, a_seq) = split_binlog_name(a);
    let (b_base, b_seq) = split_binlog_name(b);

    a_base
        .cmp(b_base)
        .then(a_seq.cmp(&b_seq))
        .then_with(|| a.cmp(b))
}

fn split_binlog_name(name: &str) -> (&str, Option<u64>) {
    match name.rsplit_once('.') {
        Some((base, ext)) if !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_digit()) => {
            match ext.parse::<u64>() {
                Ok(seq) => (base, Some(seq)),
                Err(_) => (name, None),
            }
        }
        _ => (name, None),
    }
}
