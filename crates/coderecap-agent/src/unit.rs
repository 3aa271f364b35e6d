use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::path::PathBuf;

use crate::AgentKind;

/// Inclusive UTC window a scan is limited to.
///
/// Most readers ignore it (filtering happens on the resolved session start),
/// but document-grouping sources apply it per message before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScanWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// One addressable piece of raw input. A unit yields at most one session.
#[derive(Debug, Clone)]
pub enum RawUnit {
    /// Syntactically parsed records, ready for field resolution.
    Records { unit_id: String, records: Vec<Value> },
    /// A unit whose raw syntax could not be parsed at all.
    Broken { unit_id: String, reason: String },
}

impl RawUnit {
    pub fn unit_id(&self) -> &str {
        match self {
            RawUnit::Records { unit_id, .. } => unit_id,
            RawUnit::Broken { unit_id, .. } => unit_id,
        }
    }
}

/// Everything one reader found for one agent.
#[derive(Debug)]
pub struct SourceScan {
    pub agent: AgentKind,
    pub root: PathBuf,
    /// False when the root does not exist or could not be read. Zero units
    /// then, and the run continues for other agents.
    pub available: bool,
    pub units: Vec<RawUnit>,
}

impl SourceScan {
    pub fn unavailable(agent: AgentKind, root: PathBuf) -> Self {
        Self {
            agent,
            root,
            available: false,
            units: Vec::new(),
        }
    }
}

/// A parsed source timestamp, normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTimestamp {
    pub at: DateTime<Utc>,
    /// True when the raw text carried no timezone and UTC was assumed.
    pub assumed_utc: bool,
}

/// Parse an RFC 3339 timestamp (`Z` included) or a timezone-less ISO form.
/// Timezone-less input is taken as UTC; callers record a diagnostic for it.
pub fn parse_timestamp(raw: &str) -> Option<ParsedTimestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(ParsedTimestamp {
            at: dt.with_timezone(&Utc),
            assumed_utc: false,
        });
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ParsedTimestamp {
                at: Utc.from_utc_datetime(&naive),
                assumed_utc: true,
            });
        }
    }
    None
}

/// Millisecond epoch (cursor's `createdAt`) to UTC.
pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Borrow `key` from a JSON object, treating JSON null as absent.
pub fn field<'a>(record: &'a Value, key: &str) -> Option<&'a Value> {
    match record.get(key) {
        Some(Value::Null) => None,
        other => other,
    }
}

pub fn str_field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    field(record, key).and_then(Value::as_str)
}

pub fn u64_field(record: &Value, key: &str) -> Option<u64> {
    field(record, key).and_then(Value::as_u64)
}
