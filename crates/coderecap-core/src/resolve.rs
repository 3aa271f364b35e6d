use chrono::{DateTime, Utc};
use serde_json::Value;

use coderecap_agent::{from_epoch_millis, parse_timestamp, AgentKind};

/// How many leading records a first-non-null rule scans. Some sources put a
/// metadata-only summary record first, so the real value can sit a few
/// records in.
pub const LEADING_SCAN_LIMIT: usize = 10;

/// One declarative extraction rule for a logical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Dotted path into the first record.
    Path { path: &'static str },
    /// First non-null hit for the path over the leading `scan_limit` records.
    FirstNonNull {
        path: &'static str,
        scan_limit: usize,
    },
    /// Computed from other resolved values by the builder; resolves to
    /// nothing here.
    Derived,
}

/// Which rules resolve each canonical field for one agent. Rules are tried
/// in order; the first hit wins.
#[derive(Debug)]
pub struct AgentFieldSpec {
    pub id: &'static [FieldRule],
    pub started_at: &'static [FieldRule],
    pub cwd: &'static [FieldRule],
    pub branch: &'static [FieldRule],
}

const CLAUDE_SPEC: AgentFieldSpec = AgentFieldSpec {
    id: &[FieldRule::FirstNonNull {
        path: "sessionId",
        scan_limit: LEADING_SCAN_LIMIT,
    }],
    started_at: &[FieldRule::FirstNonNull {
        path: "timestamp",
        scan_limit: LEADING_SCAN_LIMIT,
    }],
    cwd: &[FieldRule::FirstNonNull {
        path: "cwd",
        scan_limit: LEADING_SCAN_LIMIT,
    }],
    branch: &[FieldRule::FirstNonNull {
        path: "gitBranch",
        scan_limit: LEADING_SCAN_LIMIT,
    }],
};

// Codex rules cover both generations: `session.*` for old single-document
// files, `payload.*` for new session_meta envelopes, then the outer
// timestamp of the leading records as a last resort.
const CODEX_SPEC: AgentFieldSpec = AgentFieldSpec {
    id: &[
        FieldRule::Path { path: "session.id" },
        FieldRule::Path { path: "payload.id" },
    ],
    started_at: &[
        FieldRule::Path {
            path: "session.timestamp",
        },
        FieldRule::Path {
            path: "payload.timestamp",
        },
        FieldRule::FirstNonNull {
            path: "timestamp",
            scan_limit: LEADING_SCAN_LIMIT,
        },
    ],
    cwd: &[
        FieldRule::Path { path: "session.cwd" },
        FieldRule::Path { path: "payload.cwd" },
    ],
    branch: &[],
};

const CURSOR_SPEC: AgentFieldSpec = AgentFieldSpec {
    id: &[FieldRule::Path { path: "composerId" }],
    started_at: &[FieldRule::Path {
        path: "data.createdAt",
    }],
    cwd: &[],
    branch: &[],
};

// Gemini's start/end come from min/max over the whole group.
const GEMINI_SPEC: AgentFieldSpec = AgentFieldSpec {
    id: &[FieldRule::Path { path: "sessionId" }],
    started_at: &[FieldRule::Derived],
    cwd: &[],
    branch: &[],
};

/// Mapping-table lookup: agent to field rules.
pub fn field_spec(agent: AgentKind) -> &'static AgentFieldSpec {
    match agent {
        AgentKind::Claude => &CLAUDE_SPEC,
        AgentKind::Codex => &CODEX_SPEC,
        AgentKind::Cursor => &CURSOR_SPEC,
        AgentKind::Gemini => &GEMINI_SPEC,
    }
}

/// Walk a dotted path through objects (and array indices), treating JSON
/// null as absent.
pub fn walk<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Field resolution over one unit's records. Failures never escape: they
/// turn into `None` plus a diagnostic naming the field, the unit, and the
/// mismatch.
pub struct Resolver<'a> {
    unit_id: &'a str,
    records: &'a [Value],
    diagnostics: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(unit_id: &'a str, records: &'a [Value]) -> Self {
        Self {
            unit_id,
            records,
            diagnostics: Vec::new(),
        }
    }

    pub fn records(&self) -> &'a [Value] {
        self.records
    }

    pub fn note(&mut self, field: &str, problem: impl std::fmt::Display) {
        self.diagnostics
            .push(format!("{}: {} (unit {})", field, problem, self.unit_id));
    }

    pub fn into_diagnostics(self) -> Vec<String> {
        self.diagnostics
    }

    /// Apply one rule. The literal string "null" counts as absent; some
    /// writers serialize missing values that way.
    fn apply(&self, rule: &FieldRule) -> Option<&'a Value> {
        match rule {
            FieldRule::Path { path } => self.records.first().and_then(|record| walk(record, path)),
            FieldRule::FirstNonNull { path, scan_limit } => self
                .records
                .iter()
                .take(*scan_limit)
                .filter_map(|record| walk(record, path))
                .find(|value| value.as_str() != Some("null")),
            FieldRule::Derived => None,
        }
    }

    /// First rule that produces a value wins.
    pub fn resolve(&self, rules: &[FieldRule]) -> Option<&'a Value> {
        rules.iter().find_map(|rule| self.apply(rule))
    }

    /// Resolve to a string, recording a diagnostic on type mismatch.
    pub fn resolve_str(&mut self, field: &str, rules: &[FieldRule]) -> Option<String> {
        let value = self.resolve(rules)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.note(field, format!("expected string, found {}", type_name(value)));
                None
            }
        }
    }

    /// Resolve to a UTC timestamp from an ISO string or millisecond epoch,
    /// recording a diagnostic when the value is malformed or timezone-less.
    pub fn resolve_time(&mut self, field: &str, rules: &[FieldRule]) -> Option<DateTime<Utc>> {
        let value = self.resolve(rules)?;
        match value {
            Value::String(raw) => match parse_timestamp(raw) {
                Some(parsed) => {
                    if parsed.assumed_utc {
                        self.note(field, "timestamp had no timezone, assumed UTC");
                    }
                    Some(parsed.at)
                }
                None => {
                    self.note(field, format!("unparseable timestamp {:?}", raw));
                    None
                }
            },
            Value::Number(n) => match n.as_i64().and_then(from_epoch_millis) {
                Some(at) => Some(at),
                None => {
                    self.note(field, format!("unusable epoch value {}", n));
                    None
                }
            },
            other => {
                self.note(
                    field,
                    format!("expected timestamp, found {}", type_name(other)),
                );
                None
            }
        }
    }
}
