use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;

use coderecap_agent::{field, parse_timestamp, str_field, u64_field, AgentKind, RawUnit};

use crate::model::{Session, Skip};
use crate::resolve::{field_spec, type_name, walk, Resolver};

/// Cap on collected error excerpts per session.
const ERROR_CAP: usize = 10;
/// Source error text at or past this length is a dump, not a message.
const ERROR_SOURCE_LIMIT: usize = 500;
/// Stored excerpt length, in characters.
const ERROR_EXCERPT: usize = 200;

/// Anchor directory names checked in priority order; the first one present
/// anywhere in the path wins.
const REPO_ANCHORS: [&str; 5] = ["git", "projects", "repos", "src", "code"];

/// What one unit became.
#[derive(Debug)]
pub enum BuildOutcome {
    Built(Session),
    Skipped(Skip),
}

/// Compose a session from one unit, or a skip carrying every diagnostic
/// collected on the way. Only missing required fields (`id`, `started_at`)
/// skip a unit; everything else degrades with a diagnostic.
pub fn build_unit(agent: AgentKind, unit: &RawUnit) -> BuildOutcome {
    match unit {
        RawUnit::Broken { unit_id, reason } => {
            BuildOutcome::Skipped(Skip::new(agent, unit_id.clone(), reason.clone()))
        }
        RawUnit::Records { unit_id, records } => build_records(agent, unit_id, records),
    }
}

fn build_records(agent: AgentKind, unit_id: &str, records: &[Value]) -> BuildOutcome {
    let spec = field_spec(agent);
    let mut resolver = Resolver::new(unit_id, records);

    let id = resolver
        .resolve_str("id", spec.id)
        .or_else(|| fallback_id(unit_id));
    let resolved_start = resolver.resolve_time("started_at", spec.started_at);
    let cwd = resolver.resolve_str("cwd", spec.cwd);
    let branch = resolver.resolve_str("branch", spec.branch);

    let agg = match agent {
        AgentKind::Claude => aggregate_claude(records, &mut resolver),
        AgentKind::Codex => aggregate_codex(records, &mut resolver),
        AgentKind::Cursor => aggregate_cursor(records, &mut resolver),
        AgentKind::Gemini => aggregate_gemini(records, &mut resolver),
    };
    let started_at = resolved_start.or(agg.started_at);

    let (id, started_at) = match (id, started_at) {
        (Some(id), Some(started_at)) => (id, started_at),
        (id, started_at) => {
            let mut missing = Vec::new();
            if id.is_none() {
                missing.push("id");
            }
            if started_at.is_none() {
                missing.push("started_at");
            }
            let reason = format!("missing required field: {}", missing.join(", "));
            tracing::debug!(unit = unit_id, %reason, "unit skipped");
            return BuildOutcome::Skipped(Skip::with_diagnostics(
                agent,
                unit_id,
                reason,
                resolver.into_diagnostics(),
            ));
        }
    };

    let mut session = Session::new(id, agent, started_at);
    session.repo = cwd.as_deref().and_then(extract_repo);
    session.branch = branch;
    session.ended_at = agg.ended_at;
    session.turn_count = agg
        .direct_turns
        .unwrap_or(agg.user_count + agg.assistant_count);
    session.user_message_count = agg.user_count;
    session.assistant_message_count = agg.assistant_count;
    session.token_count = (agg.tokens > 0).then_some(agg.tokens);
    session.tools_used = agg.tools;
    session.user_prompts = agg.prompts;
    session.errors = agg.errors;

    if let Some(ended_at) = session.ended_at {
        let seconds = (ended_at - session.started_at).num_seconds();
        if seconds < 0 {
            resolver.note("duration_minutes", "ended before start, clamped to 0");
        } else {
            session.duration_minutes = seconds as f64 / 60.0;
        }
    }

    session.parse_diagnostics = resolver.into_diagnostics();
    BuildOutcome::Built(session)
}

/// File-based sources fall back to the file stem when the records carry no
/// id of their own.
fn fallback_id(unit_id: &str) -> Option<String> {
    Path::new(unit_id)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// Repo identifier from a working directory. The home directory itself maps
/// to `~`; after an anchor the full remaining path is kept, so nested
/// namespaces like `me/mytech` survive; with no anchor the last segment is
/// the best guess.
pub fn extract_repo(cwd: &str) -> Option<String> {
    let trimmed = cwd.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if let Some(home) = dirs::home_dir() {
        if Path::new(trimmed) == home {
            return Some("~".to_string());
        }
    }

    let parts: Vec<&str> = trimmed.split('/').filter(|part| !part.is_empty()).collect();
    for anchor in REPO_ANCHORS {
        if let Some(idx) = parts.iter().position(|part| *part == anchor) {
            let rest = &parts[idx + 1..];
            if !rest.is_empty() {
                return Some(rest.join("/"));
            }
        }
    }
    parts.last().map(|part| part.to_string())
}

#[derive(Default)]
struct Aggregates {
    /// Gemini derives its start from the group; everyone else resolves it.
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    user_count: u32,
    assistant_count: u32,
    /// Set when the source reports turns directly (cursor bubbles); the
    /// user/assistant split is then an estimate and turns are not recomputed.
    direct_turns: Option<u32>,
    tokens: u64,
    tools: BTreeMap<String, u32>,
    prompts: Vec<String>,
    errors: Vec<String>,
}

fn push_error(errors: &mut Vec<String>, text: &str) {
    if errors.len() >= ERROR_CAP {
        return;
    }
    let text = text.trim();
    if text.is_empty() || text.chars().count() >= ERROR_SOURCE_LIMIT {
        return;
    }
    errors.push(text.chars().take(ERROR_EXCERPT).collect());
}

fn last_timestamp(records: &[Value]) -> Option<DateTime<Utc>> {
    records.iter().rev().find_map(|record| {
        str_field(record, "timestamp").and_then(|raw| parse_timestamp(raw).map(|parsed| parsed.at))
    })
}

fn record_tool(tools: &mut BTreeMap<String, u32>, name: Option<&str>) {
    *tools.entry(name.unwrap_or("unknown").to_string()).or_insert(0) += 1;
}

fn aggregate_claude(records: &[Value], resolver: &mut Resolver) -> Aggregates {
    let mut agg = Aggregates::default();
    for record in records {
        match str_field(record, "type") {
            Some("user") => {
                agg.user_count += 1;
                collect_claude_prompts(record, &mut agg);
            }
            Some("assistant") => {
                agg.assistant_count += 1;
                collect_claude_usage(record, &mut agg, resolver);
                if let Some(Value::Array(items)) = walk(record, "message.content") {
                    for item in items {
                        if str_field(item, "type") == Some("tool_use") {
                            record_tool(&mut agg.tools, str_field(item, "name"));
                        }
                    }
                }
            }
            _ => {}
        }
        collect_claude_errors(record, &mut agg, resolver);
    }
    agg.ended_at = last_timestamp(records);
    agg
}

/// User content is either one string or an array mixing strings with
/// tool-result objects; only the bare strings are prompts.
fn collect_claude_prompts(record: &Value, agg: &mut Aggregates) {
    match walk(record, "message.content") {
        Some(Value::String(text)) => {
            if !text.trim().is_empty() {
                agg.prompts.push(text.clone());
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::String(text) = item {
                    if !text.trim().is_empty() {
                        agg.prompts.push(text.clone());
                    }
                }
            }
        }
        _ => {}
    }
}

fn collect_claude_usage(record: &Value, agg: &mut Aggregates, resolver: &mut Resolver) {
    match walk(record, "message.usage") {
        Some(Value::Object(usage)) => {
            for key in [
                "input_tokens",
                "cache_creation_input_tokens",
                "cache_read_input_tokens",
                "output_tokens",
            ] {
                agg.tokens += usage.get(key).and_then(Value::as_u64).unwrap_or(0);
            }
        }
        Some(other) => {
            resolver.note(
                "token_count",
                format!("expected usage object, found {}", type_name(other)),
            );
        }
        None => {}
    }
}

/// Error excerpts come from failed tool results and captured stderr. The
/// result object is sometimes a bare string; that shape must degrade, not
/// abort the unit.
fn collect_claude_errors(record: &Value, agg: &mut Aggregates, resolver: &mut Resolver) {
    if let Some(Value::Array(items)) = walk(record, "message.content") {
        for item in items {
            if str_field(item, "type") == Some("tool_result")
                && field(item, "is_error").and_then(Value::as_bool).unwrap_or(false)
            {
                if let Some(Value::String(text)) = field(item, "content") {
                    push_error(&mut agg.errors, text);
                }
            }
        }
    }
    match field(record, "toolUseResult") {
        Some(Value::Object(result)) => {
            if let Some(Value::String(stderr)) = result.get("stderr") {
                push_error(&mut agg.errors, stderr);
            }
        }
        Some(Value::String(_)) => {
            resolver.note("errors", "toolUseResult was a string, not an object");
        }
        _ => {}
    }
}

fn aggregate_codex(records: &[Value], _resolver: &mut Resolver) -> Aggregates {
    let mut agg = Aggregates::default();
    for record in records {
        // New-generation records wrap the payload in a response_item
        // envelope; old-format items are bare.
        let item = if str_field(record, "type") == Some("response_item") {
            match field(record, "payload") {
                Some(payload) => payload,
                None => continue,
            }
        } else {
            record
        };

        match str_field(item, "role") {
            Some("user") => {
                agg.user_count += 1;
                if let Some(Value::Array(parts)) = field(item, "content") {
                    for part in parts {
                        if str_field(part, "type") == Some("input_text") {
                            if let Some(text) = str_field(part, "text") {
                                if !text.trim().is_empty() {
                                    agg.prompts.push(text.to_string());
                                }
                            }
                        }
                    }
                }
            }
            Some("assistant") => agg.assistant_count += 1,
            _ => {}
        }
        if str_field(item, "type") == Some("function_call") {
            record_tool(&mut agg.tools, str_field(item, "name"));
        }
    }
    agg.ended_at = last_timestamp(records);
    agg
}

fn aggregate_cursor(records: &[Value], resolver: &mut Resolver) -> Aggregates {
    let mut agg = Aggregates::default();
    let Some(record) = records.first() else {
        return agg;
    };

    // One composer row; bubbles measure message volume. The user/assistant
    // split is an even estimate, so turns stay the bubble count.
    let bubbles = u64_field(record, "bubbleCount").unwrap_or(0).max(1) as u32;
    agg.direct_turns = Some(bubbles);
    agg.user_count = bubbles / 2;
    agg.assistant_count = bubbles / 2;

    match walk(record, "data.unifiedMode") {
        Some(Value::String(mode)) if !mode.is_empty() && mode != "unknown" => {
            agg.tools.insert("cursor_mode".to_string(), 1);
        }
        Some(Value::String(_)) | None => {}
        Some(other) => {
            resolver.note(
                "tools_used",
                format!("expected unifiedMode string, found {}", type_name(other)),
            );
        }
    }
    agg
}

fn aggregate_gemini(records: &[Value], resolver: &mut Resolver) -> Aggregates {
    let mut agg = Aggregates::default();
    for record in records {
        if let Some(raw) = str_field(record, "timestamp") {
            match parse_timestamp(raw) {
                Some(parsed) => {
                    agg.started_at =
                        Some(agg.started_at.map_or(parsed.at, |cur| cur.min(parsed.at)));
                    agg.ended_at = Some(agg.ended_at.map_or(parsed.at, |cur| cur.max(parsed.at)));
                }
                None => resolver.note("timestamp", format!("unparseable timestamp {:?}", raw)),
            }
        }
        match str_field(record, "type") {
            Some("user") => {
                agg.user_count += 1;
                if let Some(text) = str_field(record, "content") {
                    if !text.trim().is_empty() {
                        agg.prompts.push(text.to_string());
                    }
                }
            }
            Some("model") => agg.assistant_count += 1,
            _ => {}
        }
    }
    agg
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn records_unit(unit_id: &str, records: Vec<Value>) -> RawUnit {
        RawUnit::Records {
            unit_id: unit_id.to_string(),
            records,
        }
    }

    fn built(outcome: BuildOutcome) -> Session {
        match outcome {
            BuildOutcome::Built(session) => session,
            BuildOutcome::Skipped(skip) => panic!("expected session, got skip {:?}", skip),
        }
    }

    fn skipped(outcome: BuildOutcome) -> Skip {
        match outcome {
            BuildOutcome::Skipped(skip) => skip,
            BuildOutcome::Built(session) => panic!("expected skip, got session {}", session.id),
        }
    }

    #[test]
    fn claude_session_aggregates_counts_tools_and_tokens() {
        let unit = records_unit(
            "/logs/s1.jsonl",
            vec![
                json!({"type": "summary", "summary": "earlier work"}),
                json!({"type": "user", "sessionId": "s1", "timestamp": "2025-05-01T09:00:00Z",
                       "cwd": "/home/u/git/me/mytech", "gitBranch": "main",
                       "message": {"content": "fix the login bug"}}),
                json!({"type": "assistant", "timestamp": "2025-05-01T09:01:00Z",
                       "message": {"usage": {"input_tokens": 100, "output_tokens": 50},
                                   "content": [{"type": "tool_use", "name": "Bash"},
                                               {"type": "tool_use", "name": "Bash"}]}}),
                json!({"type": "user", "timestamp": "2025-05-01T09:30:00Z",
                       "message": {"content": [{"type": "tool_result", "is_error": true,
                                                "content": "command not found"}]}}),
            ],
        );
        let session = built(build_unit(AgentKind::Claude, &unit));

        assert_eq!(session.id, "s1");
        assert_eq!(session.repo.as_deref(), Some("me/mytech"));
        assert_eq!(session.branch.as_deref(), Some("main"));
        assert_eq!(session.user_message_count, 2);
        assert_eq!(session.assistant_message_count, 1);
        assert_eq!(session.turn_count, 3);
        assert_eq!(session.token_count, Some(150));
        assert_eq!(session.tools_used.get("Bash"), Some(&2));
        assert_eq!(session.user_prompts, vec!["fix the login bug"]);
        assert_eq!(session.errors, vec!["command not found"]);
        assert!((session.duration_minutes - 30.0).abs() < 0.01);
        assert!(session.parse_diagnostics.is_empty());
    }

    #[test]
    fn string_tool_use_result_degrades_with_diagnostic() {
        let unit = records_unit(
            "/logs/s2.jsonl",
            vec![json!({"type": "user", "sessionId": "s2",
                        "timestamp": "2025-05-01T09:00:00Z",
                        "toolUseResult": "plain text result",
                        "message": {"content": "hello"}})],
        );
        let session = built(build_unit(AgentKind::Claude, &unit));
        assert!(session.errors.is_empty());
        assert_eq!(session.parse_diagnostics.len(), 1);
        assert!(session.parse_diagnostics[0].contains("toolUseResult"));
    }

    #[test]
    fn missing_start_time_skips_with_diagnostics() {
        let unit = records_unit(
            "/logs/s3.jsonl",
            vec![json!({"type": "user", "sessionId": "s3", "timestamp": "not-a-date",
                        "message": {"content": "hi"}})],
        );
        let skip = skipped(build_unit(AgentKind::Claude, &unit));
        assert_eq!(skip.reason(), "missing required field: started_at");
        assert!(skip.reasons.len() > 1, "diagnostics carried: {:?}", skip.reasons);
    }

    #[test]
    fn negative_duration_clamps_to_zero() {
        let unit = records_unit(
            "/logs/s4.jsonl",
            vec![
                json!({"type": "user", "sessionId": "s4",
                       "timestamp": "2025-05-01T10:00:00Z", "message": {"content": "hi"}}),
                json!({"type": "assistant", "timestamp": "2025-05-01T09:00:00Z", "message": {}}),
            ],
        );
        let session = built(build_unit(AgentKind::Claude, &unit));
        assert_eq!(session.duration_minutes, 0.0);
        assert!(session
            .parse_diagnostics
            .iter()
            .any(|diag| diag.contains("clamped")));
    }

    #[test]
    fn codex_old_format_builds_from_session_metadata() {
        let unit = records_unit(
            "/logs/rollout.json",
            vec![
                json!({"session": {"id": "cx1", "timestamp": "2025-06-01T12:00:00Z",
                                   "cwd": "/Users/u/projects/tool"}}),
                json!({"role": "user",
                       "content": [{"type": "input_text", "text": "add tests"}]}),
                json!({"role": "assistant", "content": []}),
                json!({"type": "function_call", "name": "shell"}),
            ],
        );
        let session = built(build_unit(AgentKind::Codex, &unit));
        assert_eq!(session.id, "cx1");
        assert_eq!(session.repo.as_deref(), Some("tool"));
        assert_eq!(session.user_message_count, 1);
        assert_eq!(session.assistant_message_count, 1);
        assert_eq!(session.turn_count, 2);
        assert_eq!(session.tools_used.get("shell"), Some(&1));
        assert_eq!(session.user_prompts, vec!["add tests"]);
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn codex_new_format_unwraps_response_items() {
        let unit = records_unit(
            "/logs/rollout.jsonl",
            vec![
                json!({"type": "session_meta", "timestamp": "2025-06-02T08:00:00Z",
                       "payload": {"id": "cx2", "timestamp": "2025-06-02T08:00:00Z",
                                   "cwd": "/home/u/code/widget"}}),
                json!({"type": "response_item", "timestamp": "2025-06-02T08:05:00Z",
                       "payload": {"role": "user",
                                    "content": [{"type": "input_text", "text": "ship it"}]}}),
                json!({"type": "response_item", "timestamp": "2025-06-02T08:06:00Z",
                       "payload": {"type": "function_call", "name": "apply_patch"}}),
                json!({"type": "response_item", "timestamp": "2025-06-02T08:07:00Z",
                       "payload": {"role": "assistant", "content": []}}),
            ],
        );
        let session = built(build_unit(AgentKind::Codex, &unit));
        assert_eq!(session.id, "cx2");
        assert_eq!(session.repo.as_deref(), Some("widget"));
        assert_eq!(session.turn_count, 2);
        assert_eq!(session.tools_used.get("apply_patch"), Some(&1));
        assert_eq!(
            session.ended_at,
            Some(Utc.with_ymd_and_hms(2025, 6, 2, 8, 7, 0).unwrap())
        );
        assert!((session.duration_minutes - 7.0).abs() < 0.01);
    }

    #[test]
    fn cursor_counts_are_estimated_halves_of_bubbles() {
        let unit = records_unit(
            "db#composerData:c1",
            vec![json!({"composerId": "c1", "bubbleCount": 7,
                        "data": {"createdAt": 1746090000000i64, "unifiedMode": "agent"}})],
        );
        let session = built(build_unit(AgentKind::Cursor, &unit));
        assert_eq!(session.id, "c1");
        assert_eq!(session.turn_count, 7);
        assert_eq!(session.user_message_count, 3);
        assert_eq!(session.assistant_message_count, 3);
        assert_eq!(session.tools_used.get("cursor_mode"), Some(&1));
        assert!(session.user_prompts.is_empty());
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn cursor_without_created_at_is_skipped() {
        let unit = records_unit(
            "db#composerData:c2",
            vec![json!({"composerId": "c2", "bubbleCount": 2, "data": {}})],
        );
        let skip = skipped(build_unit(AgentKind::Cursor, &unit));
        assert_eq!(skip.reason(), "missing required field: started_at");
    }

    #[test]
    fn gemini_start_and_end_span_the_group() {
        let unit = records_unit(
            "root#session:g1",
            vec![
                json!({"sessionId": "g1", "type": "model",
                       "timestamp": "2025-07-01T10:20:00Z"}),
                json!({"sessionId": "g1", "type": "user", "content": "explain this",
                       "timestamp": "2025-07-01T10:00:00Z"}),
                json!({"sessionId": "g1", "type": "user", "content": "thanks",
                       "timestamp": "2025-07-01T10:30:00Z"}),
            ],
        );
        let session = built(build_unit(AgentKind::Gemini, &unit));
        assert_eq!(session.id, "g1");
        assert_eq!(
            session.started_at,
            Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            session.ended_at,
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 10, 30, 0).unwrap())
        );
        assert_eq!(session.turn_count, 3);
        assert_eq!(session.user_prompts.len(), 2);
    }

    #[test]
    fn repo_extraction_keeps_the_full_remaining_path() {
        assert_eq!(extract_repo("/home/u/git/me/mytech").as_deref(), Some("me/mytech"));
        assert_eq!(extract_repo("/Users/u/projects/acme/api").as_deref(), Some("acme/api"));
        assert_eq!(extract_repo("/opt/standalone").as_deref(), Some("standalone"));
        assert_eq!(extract_repo(""), None);
        assert_eq!(extract_repo("   "), None);
    }

    #[test]
    fn anchor_priority_beats_path_position() {
        // "git" outranks "projects" even when it appears later in the path.
        assert_eq!(
            extract_repo("/home/u/projects/git/acme").as_deref(),
            Some("acme")
        );
    }

    #[test]
    fn error_excerpts_are_capped_in_count_and_length() {
        let mut errors = Vec::new();
        for i in 0..15 {
            push_error(&mut errors, &format!("error {}", i));
        }
        assert_eq!(errors.len(), ERROR_CAP);

        let mut errors = Vec::new();
        push_error(&mut errors, &"x".repeat(600));
        assert!(errors.is_empty(), "dumps are dropped");
        push_error(&mut errors, &"y".repeat(450));
        assert_eq!(errors[0].chars().count(), ERROR_EXCERPT);
    }
}
