use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coderecap_agent::AgentKind;

/// Statistics for a single agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStats {
    pub session_count: usize,
    pub turn_count: u64,
    pub token_count: u64,
    pub user_message_count: u64,
    pub assistant_message_count: u64,
    pub total_duration_minutes: f64,

    // Distributions
    pub repos: BTreeMap<String, usize>,
    pub tools_used: BTreeMap<String, u64>,
    pub hours_distribution: BTreeMap<u32, usize>,
    pub daily_sessions: BTreeMap<String, usize>,

    // Records
    pub longest_session_minutes: f64,
    pub longest_session_id: Option<String>,
    pub most_turns_session: u32,
    pub most_turns_session_id: Option<String>,
}

impl AgentStats {
    pub fn avg_turns_per_session(&self) -> f64 {
        if self.session_count == 0 {
            return 0.0;
        }
        self.turn_count as f64 / self.session_count as f64
    }

    pub fn avg_duration_minutes(&self) -> f64 {
        if self.session_count == 0 {
            return 0.0;
        }
        self.total_duration_minutes / self.session_count as f64
    }
}

/// Aggregate statistics over every agent's finished sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecapStats {
    pub generated_at: DateTime<Utc>,

    // Totals
    pub total_sessions: usize,
    pub total_turns: u64,
    pub total_tokens: u64,
    pub total_duration_minutes: f64,

    // Per-agent breakdown; absent agents contributed no sessions.
    pub agents: BTreeMap<AgentKind, AgentStats>,

    // Global distributions
    pub all_repos: BTreeMap<String, usize>,
    pub all_tools: BTreeMap<String, u64>,
    pub hours_distribution: BTreeMap<u32, usize>,
    pub daily_sessions: BTreeMap<String, usize>,

    // Streaks, in consecutive calendar days
    pub longest_streak_days: u32,
    pub current_streak_days: u32,
    pub active_days: u32,

    // Records
    pub most_active_day: Option<String>,
    pub most_active_day_sessions: usize,
    pub peak_hour: Option<u32>,
}

impl RecapStats {
    pub(crate) fn new() -> Self {
        RecapStats {
            generated_at: Utc::now(),
            total_sessions: 0,
            total_turns: 0,
            total_tokens: 0,
            total_duration_minutes: 0.0,
            agents: BTreeMap::new(),
            all_repos: BTreeMap::new(),
            all_tools: BTreeMap::new(),
            hours_distribution: BTreeMap::new(),
            daily_sessions: BTreeMap::new(),
            longest_streak_days: 0,
            current_streak_days: 0,
            active_days: 0,
            most_active_day: None,
            most_active_day_sessions: 0,
            peak_hour: None,
        }
    }

    pub fn total_duration_hours(&self) -> f64 {
        self.total_duration_minutes / 60.0
    }
}
