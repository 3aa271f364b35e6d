use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use coderecap_agent::AgentKind;
use coderecap_enrich::{Archetype, Topic, Vibe};

/// The canonical normalized record of one coding-assistant interaction.
///
/// Uniqueness of `id` holds per agent namespace only; consumers key on
/// `(agent, id)`. A session always carries `started_at` — a unit without a
/// resolvable start time becomes a [`Skip`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub agent: AgentKind,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Derived; 0 when `ended_at` is unknown, never negative.
    pub duration_minutes: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub turn_count: u32,
    pub user_message_count: u32,
    pub assistant_message_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
    /// Tool name to invocation count; empty map when no tools were used.
    pub tools_used: BTreeMap<String, u32>,
    pub user_prompts: Vec<String>,
    /// Short error excerpts surfaced by tool results, capped in count and
    /// length at build time.
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<Topic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibe: Option<Vibe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_archetype: Option<Archetype>,
    /// Every recoverable field-resolution failure hit while building this
    /// session. Present (possibly empty) on every session so clean parses
    /// are auditable too.
    pub parse_diagnostics: Vec<String>,
}

impl Session {
    /// Skeleton with required fields set and everything else empty.
    pub fn new(id: String, agent: AgentKind, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            agent,
            started_at,
            ended_at: None,
            duration_minutes: 0.0,
            repo: None,
            branch: None,
            turn_count: 0,
            user_message_count: 0,
            assistant_message_count: 0,
            token_count: None,
            tools_used: BTreeMap::new(),
            user_prompts: Vec::new(),
            errors: Vec::new(),
            topic: None,
            vibe: None,
            prompt_archetype: None,
            parse_diagnostics: Vec::new(),
        }
    }

    /// Calendar day of the start, `YYYY-MM-DD`.
    pub fn date_key(&self) -> String {
        self.started_at.format("%Y-%m-%d").to_string()
    }

    /// Start hour of day, 0-23.
    pub fn start_hour(&self) -> u32 {
        self.started_at.hour()
    }
}

/// A recorded, reasoned non-production of a session for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skip {
    pub agent: AgentKind,
    pub unit_id: String,
    /// Non-empty; the triggering failure first, then any diagnostics
    /// collected before the unit was abandoned.
    pub reasons: Vec<String>,
}

impl Skip {
    pub fn new(agent: AgentKind, unit_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            agent,
            unit_id: unit_id.into(),
            reasons: vec![reason.into()],
        }
    }

    pub fn with_diagnostics(
        agent: AgentKind,
        unit_id: impl Into<String>,
        reason: impl Into<String>,
        diagnostics: Vec<String>,
    ) -> Self {
        let mut reasons = vec![reason.into()];
        reasons.extend(diagnostics);
        Self {
            agent,
            unit_id: unit_id.into(),
            reasons,
        }
    }

    /// The triggering failure.
    pub fn reason(&self) -> &str {
        self.reasons.first().map(String::as_str).unwrap_or("unknown")
    }
}

/// Per-agent accounting for one run. Sessions plus skips always equal the
/// units attempted, so nothing can vanish silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub agent: AgentKind,
    pub root: String,
    pub source_available: bool,
    pub units_attempted: usize,
    pub sessions_produced: usize,
    pub skips: usize,
    /// Triggering reason to occurrence count.
    pub skip_reasons: BTreeMap<String, usize>,
}
