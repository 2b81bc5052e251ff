//! Replication events as seen by the sync loop
//!
//! The transport decodes the wire format; the sync loop only needs the
//! header (event type and next read offset) and one of a handful of
//! bodies. Everything else arrives as [`BinlogEvent::Other`] and is
//! ignored on purpose.

use base64::Engine;

/// Binlog event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    Unknown = 0,
    StartEventV3 = 1,
    QueryEvent = 2,
    StopEvent = 3,
    RotateEvent = 4,
    IntvarEvent = 5,
    FormatDescriptionEvent = 15,
    XidEvent = 16,
    TableMapEvent = 19,
    WriteRowsEventV1 = 23,
    UpdateRowsEventV1 = 24,
    DeleteRowsEventV1 = 25,
    HeartbeatLogEvent = 27,
    RowsQueryLogEvent = 29,
    WriteRowsEventV2 = 30,
    UpdateRowsEventV2 = 31,
    DeleteRowsEventV2 = 32,
    GtidLogEvent = 33,
    AnonymousGtidLogEvent = 34,
    PreviousGtidsLogEvent = 35,
    PartialUpdateRowsEvent = 39,
}

impl EventType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => EventType::StartEventV3,
            2 => EventType::QueryEvent,
            3 => EventType::StopEvent,
            4 => EventType::RotateEvent,
            5 => EventType::IntvarEvent,
            15 => EventType::FormatDescriptionEvent,
            16 => EventType::XidEvent,
            19 => EventType::TableMapEvent,
            23 => EventType::WriteRowsEventV1,
            24 => EventType::UpdateRowsEventV1,
            25 => EventType::DeleteRowsEventV1,
            27 => EventType::HeartbeatLogEvent,
            29 => EventType::RowsQueryLogEvent,
            30 => EventType::WriteRowsEventV2,
            31 => EventType::UpdateRowsEventV2,
            32 => EventType::DeleteRowsEventV2,
            33 => EventType::GtidLogEvent,
            34 => EventType::AnonymousGtidLogEvent,
            35 => EventType::PreviousGtidsLogEvent,
            39 => EventType::PartialUpdateRowsEvent,
            _ => EventType::Unknown,
        }
    }

    pub fn is_row_event(&self) -> bool {
        matches!(
            self,
            EventType::WriteRowsEventV1
                | EventType::WriteRowsEventV2
                | EventType::UpdateRowsEventV1
                | EventType::UpdateRowsEventV2
                | EventType::DeleteRowsEventV1
                | EventType::DeleteRowsEventV2
        )
    }
}

/// Binlog event header
#[derive(Debug, Clone)]
pub struct EventHeader {
    pub timestamp: u32,
    pub event_type: EventType,
    pub server_id: u32,
    /// Offset of the event following this one in the current file
    pub log_pos: u32,
}

impl EventHeader {
    pub fn new(event_type: EventType, log_pos: u32) -> Self {
        Self {
            timestamp: 0,
            event_type,
            server_id: 0,
            log_pos,
        }
    }
}

/// Decoded event body
#[derive(Debug, Clone)]
pub enum BinlogEvent {
    /// Rotate to new binlog file
    Rotate(RotateEvent),

    /// Row insert/update/delete; the subtype lives in the header
    Rows(RowsEvent),

    /// Transaction commit
    Xid(XidEvent),

    /// Statement (DDL, BEGIN, ...)
    Query(QueryEvent),

    /// Any event the sync loop does not act on
    Other,
}

/// Rotate event
#[derive(Debug, Clone)]
pub struct RotateEvent {
    pub position: u64,
    pub next_binlog: String,
}

/// Rows event with its table identity already resolved from the table map
#[derive(Debug, Clone)]
pub struct RowsEvent {
    pub schema: String,
    pub table: String,
    /// Row images. Update events alternate before/after images.
    pub rows: Vec<Vec<ColumnValue>>,
}

/// XID event (transaction commit)
#[derive(Debug, Clone)]
pub struct XidEvent {
    pub xid: u64,
}

/// Query event
#[derive(Debug, Clone)]
pub struct QueryEvent {
    /// Default schema of the session that issued the statement
    pub schema: String,
    pub query: String,
}

/// One event pulled from the replication stream
#[derive(Debug, Clone)]
pub struct ReplicationEvent {
    pub header: EventHeader,
    pub event: BinlogEvent,
}

impl ReplicationEvent {
    pub fn new(header: EventHeader, event: BinlogEvent) -> Self {
        Self { header, event }
    }

    /// Rotate to `next_binlog` at `position`.
    pub fn rotate(next_binlog: impl Into<String>, position: u64) -> Self {
        Self::new(
            EventHeader::new(EventType::RotateEvent, 0),
            BinlogEvent::Rotate(RotateEvent {
                position,
                next_binlog: next_binlog.into(),
            }),
        )
    }

    /// Rows event of `event_type` ending at `log_pos`.
    pub fn rows(
        event_type: EventType,
        log_pos: u32,
        schema: impl Into<String>,
        table: impl Into<String>,
        rows: Vec<Vec<ColumnValue>>,
    ) -> Self {
        Self::new(
            EventHeader::new(event_type, log_pos),
            BinlogEvent::Rows(RowsEvent {
                schema: schema.into(),
                table: table.into(),
                rows,
            }),
        )
    }

    /// Transaction commit ending at `log_pos`.
    pub fn xid(log_pos: u32, xid: u64) -> Self {
        Self::new(
            EventHeader::new(EventType::XidEvent, log_pos),
            BinlogEvent::Xid(XidEvent { xid }),
        )
    }

    /// Statement ending at `log_pos`.
    pub fn query(log_pos: u32, schema: impl Into<String>, query: impl Into<String>) -> Self {
        Self::new(
            EventHeader::new(EventType::QueryEvent, log_pos),
            BinlogEvent::Query(QueryEvent {
                schema: schema.into(),
                query: query.into(),
            }),
        )
    }

    /// Event the sync loop ignores.
    pub fn other(event_type: EventType, log_pos: u32) -> Self {
        Self::new(EventHeader::new(event_type, log_pos), BinlogEvent::Other)
    }
}

/// Decoded column value of a row image.
///
/// Temporal types arrive already rendered by the transport, so handlers see
/// the same text MySQL would print.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    /// TINYINT..BIGINT, signed
    Int(i64),
    /// TINYINT..BIGINT UNSIGNED, ENUM index, SET bitmap
    UInt(u64),
    /// FLOAT and DOUBLE
    Double(f64),
    /// DECIMAL in exact text form
    Decimal(String),
    /// CHAR, VARCHAR, TEXT
    Text(String),
    /// BINARY, BLOB, BIT
    Bytes(Vec<u8>),
    /// DATE, TIME, DATETIME, TIMESTAMP, YEAR as ISO-8601 text
    Temporal(String),
    Json(serde_json::Value),
}

impl ColumnValue {
    /// JSON form used in row payloads; bytes become base64.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            ColumnValue::Null => Value::Null,
            ColumnValue::Int(v) => Value::from(*v),
            ColumnValue::UInt(v) => Value::from(*v),
            ColumnValue::Double(v) => Value::from(*v),
            ColumnValue::Decimal(v) | ColumnValue::Text(v) | ColumnValue::Temporal(v) => {
                Value::String(v.clone())
            }
            ColumnValue::Bytes(v) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(v))
            }
            ColumnValue::Json(v) => v.clone(),
        }
    }
}
