use std::collections::BTreeMap;

use chrono::NaiveDate;

use coderecap_core::Session;

use crate::types::{AgentStats, RecapStats};

/// Fold a finished session stream into totals, distributions, streaks, and
/// records. Pure aggregation; never re-touches raw source data.
pub fn aggregate(sessions: &[Session]) -> RecapStats {
    let mut stats = RecapStats::new();

    for session in sessions {
        let agent = stats.agents.entry(session.agent).or_default();

        // Counts
        agent.session_count += 1;
        agent.turn_count += u64::from(session.turn_count);
        agent.user_message_count += u64::from(session.user_message_count);
        agent.assistant_message_count += u64::from(session.assistant_message_count);
        agent.total_duration_minutes += session.duration_minutes;
        if let Some(tokens) = session.token_count {
            agent.token_count += tokens;
        }

        // Repo and tool rollups
        if let Some(repo) = &session.repo {
            *agent.repos.entry(repo.clone()).or_insert(0) += 1;
            *stats.all_repos.entry(repo.clone()).or_insert(0) += 1;
        }
        for (tool, count) in &session.tools_used {
            *agent.tools_used.entry(tool.clone()).or_insert(0) += u64::from(*count);
            *stats.all_tools.entry(tool.clone()).or_insert(0) += u64::from(*count);
        }

        // Hour and day distributions
        let hour = session.start_hour();
        *agent.hours_distribution.entry(hour).or_insert(0) += 1;
        *stats.hours_distribution.entry(hour).or_insert(0) += 1;
        let date = session.date_key();
        *agent.daily_sessions.entry(date.clone()).or_insert(0) += 1;
        *stats.daily_sessions.entry(date).or_insert(0) += 1;

        // Per-agent records
        if session.duration_minutes > agent.longest_session_minutes {
            agent.longest_session_minutes = session.duration_minutes;
            agent.longest_session_id = Some(session.id.clone());
        }
        if session.turn_count > agent.most_turns_session {
            agent.most_turns_session = session.turn_count;
            agent.most_turns_session_id = Some(session.id.clone());
        }

        // Totals
        stats.total_sessions += 1;
        stats.total_turns += u64::from(session.turn_count);
        stats.total_tokens += session.token_count.unwrap_or(0);
        stats.total_duration_minutes += session.duration_minutes;
    }

    let (longest, current, active) = compute_streaks(&stats.daily_sessions);
    stats.longest_streak_days = longest;
    stats.current_streak_days = current;
    stats.active_days = active;

    // Busiest day and peak hour; strict comparisons keep the earliest on ties.
    for (date, count) in &stats.daily_sessions {
        if *count > stats.most_active_day_sessions {
            stats.most_active_day_sessions = *count;
            stats.most_active_day = Some(date.clone());
        }
    }
    let mut peak_count = 0;
    for (hour, count) in &stats.hours_distribution {
        if *count > peak_count {
            peak_count = *count;
            stats.peak_hour = Some(*hour);
        }
    }

    stats
}

/// Streak statistics from daily session counts, as
/// (longest, current, active_days).
///
/// Streaks run over consecutive calendar days, not consecutive map entries:
/// a gap day breaks the run even though the map stores nothing for it. The
/// current streak is the run ending on the last active day.
fn compute_streaks(daily_sessions: &BTreeMap<String, usize>) -> (u32, u32, u32) {
    let dates: Vec<NaiveDate> = daily_sessions
        .keys()
        .filter_map(|key| NaiveDate::parse_from_str(key, "%Y-%m-%d").ok())
        .collect();
    if dates.is_empty() {
        return (0, 0, 0);
    }

    let mut longest = 1u32;
    let mut run = 1u32;
    for pair in dates.windows(2) {
        if pair[0].succ_opt() == Some(pair[1]) {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    (longest, run, dates.len() as u32)
}

/// Highest-count entries of a rollup, ties broken by name so listings are
/// stable run to run.
pub fn top_entries<V: Copy + Ord>(map: &BTreeMap<String, V>, limit: usize) -> Vec<(&str, V)> {
    let mut entries: Vec<(&str, V)> = map.iter().map(|(key, value)| (key.as_str(), *value)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries.truncate(limit);
    entries
}
