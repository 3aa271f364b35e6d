use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use coderecap_agent::{create_reader, AgentKind, ScanWindow};
use coderecap_core::{run_agent, PipelineConfig};
use coderecap_redact::{RedactionTier, PROMPT_MARKER};
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), body).unwrap();
}

/// Helper: a well-formed Claude transcript, March 1st 2025, repo me/mytech.
fn claude_transcript() -> &'static str {
    r#"{"type":"summary","summary":"earlier work"}
{"type":"user","sessionId":"alpha","timestamp":"2025-03-01T10:00:00Z","cwd":"/home/u/git/me/mytech","gitBranch":"main","message":{"content":"fix the broken test error"}}
{"type":"assistant","timestamp":"2025-03-01T10:05:00Z","message":{"usage":{"input_tokens":10,"output_tokens":5},"content":[{"type":"tool_use","name":"Bash"}]}}"#
}

fn config(tier: RedactionTier, window: Option<ScanWindow>) -> PipelineConfig {
    PipelineConfig::new(tier, window).unwrap()
}

// ============================================================
// Accounting: sessions + skips = units, always
// ============================================================

#[test]
fn test_bad_line_yields_local_skip_and_keeps_the_session() {
    let dir = TempDir::new().unwrap();
    // Ten lines, line 7 is invalid JSON: nine records survive as one
    // session, line 7 becomes exactly one skip.
    let body = r#"{"type":"summary","summary":"earlier work"}
{"type":"user","sessionId":"alpha","timestamp":"2025-03-01T10:00:00Z","cwd":"/home/u/git/me/mytech","message":{"content":"fix the broken test"}}
{"type":"assistant","timestamp":"2025-03-01T10:05:00Z","message":{}}
{"type":"user","timestamp":"2025-03-01T10:06:00Z","message":{"content":"run it again"}}
{"type":"assistant","timestamp":"2025-03-01T10:10:00Z","message":{}}
{"type":"user","timestamp":"2025-03-01T10:11:00Z","message":{"content":"deploy"}}
this line is not json at all
{"type":"assistant","timestamp":"2025-03-01T10:15:00Z","message":{}}
{"type":"user","timestamp":"2025-03-01T10:16:00Z","message":{"content":"thanks"}}
{"type":"assistant","timestamp":"2025-03-01T10:20:00Z","message":{}}"#;
    write_file(&dir.path().join("proj"), "session.jsonl", body);

    let reader = create_reader(AgentKind::Claude);
    let run = run_agent(reader.as_ref(), dir.path(), &config(RedactionTier::Normal, None)).unwrap();

    assert_eq!(run.report.units_attempted, 2);
    assert_eq!(run.sessions.len(), 1);
    assert_eq!(run.skips.len(), 1);
    assert!(run.skips[0].unit_id.ends_with(":7"));
    assert_eq!(run.skips[0].reason(), "parse failure");

    let session = &run.sessions[0];
    assert_eq!(session.id, "alpha");
    assert_eq!(session.user_message_count, 4);
    assert_eq!(session.assistant_message_count, 4);
    assert_eq!(session.turn_count, 8);
    assert!((session.duration_minutes - 20.0).abs() < 0.01);
}

#[test]
fn test_sessions_plus_skips_equal_units_attempted() {
    let dir = TempDir::new().unwrap();
    let proj = dir.path().join("proj");
    write_file(&proj, "good.jsonl", claude_transcript());
    write_file(&proj, "empty.jsonl", "\n");
    write_file(&proj, "binaryish.jsonl", "\x00\x01 definitely not json\n{\"type\":\"user\"}\n");
    write_file(
        &proj,
        "no-start.jsonl",
        r#"{"type":"user","sessionId":"beta","message":{"content":"hi"}}"#,
    );

    let reader = create_reader(AgentKind::Claude);
    let run = run_agent(reader.as_ref(), dir.path(), &config(RedactionTier::Normal, None)).unwrap();

    assert_eq!(
        run.sessions.len() + run.skips.len(),
        run.report.units_attempted
    );
    assert_eq!(run.sessions.len(), 1);
    assert_eq!(run.skips.len(), 3);
    assert_eq!(run.report.skip_reasons.get("parse failure"), Some(&1));
    assert_eq!(run.report.skip_reasons.get("no parsable records"), Some(&1));
    assert_eq!(
        run.report
            .skip_reasons
            .get("missing required field: started_at"),
        Some(&1)
    );
}

#[test]
fn test_missing_root_is_agent_level_absence() {
    let dir = TempDir::new().unwrap();
    let reader = create_reader(AgentKind::Claude);
    let run = run_agent(
        reader.as_ref(),
        &dir.path().join("does-not-exist"),
        &config(RedactionTier::Normal, None),
    )
    .unwrap();

    assert!(!run.report.source_available);
    assert_eq!(run.report.units_attempted, 0);
    assert!(run.sessions.is_empty());
    assert!(run.skips.is_empty());
}

// ============================================================
// Determinism
// ============================================================

#[test]
fn test_identical_input_identical_output() {
    let dir = TempDir::new().unwrap();
    let proj = dir.path().join("proj");
    write_file(&proj, "one.jsonl", claude_transcript());
    write_file(
        &proj,
        "two.jsonl",
        r#"{"type":"user","sessionId":"beta","timestamp":"2025-03-02T08:00:00Z","cwd":"/home/u/git/acme","message":{"content":"add a new feature to create users"}}
{"type":"assistant","timestamp":"2025-03-02T08:30:00Z","message":{"usage":{"input_tokens":7,"output_tokens":3}}}"#,
    );
    write_file(&proj, "broken.jsonl", "{oops\n");

    let cfg = config(RedactionTier::Normal, None);
    let reader = create_reader(AgentKind::Claude);
    let first = run_agent(reader.as_ref(), dir.path(), &cfg).unwrap();
    let second = run_agent(reader.as_ref(), dir.path(), &cfg).unwrap();

    assert_eq!(first.sessions, second.sessions);
    assert_eq!(first.skips, second.skips);
    assert_eq!(first.report, second.report);

    // Ordered by start time regardless of file name order.
    assert_eq!(first.sessions[0].id, "alpha");
    assert_eq!(first.sessions[1].id, "beta");
}

// ============================================================
// Window filtering
// ============================================================

#[test]
fn test_out_of_window_units_become_skips() {
    let dir = TempDir::new().unwrap();
    let proj = dir.path().join("proj");
    write_file(&proj, "in.jsonl", claude_transcript());
    write_file(
        &proj,
        "out.jsonl",
        r#"{"type":"user","sessionId":"old","timestamp":"2024-03-01T10:00:00Z","message":{"content":"hello from last year"}}"#,
    );

    let window = ScanWindow::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap(),
    );
    let reader = create_reader(AgentKind::Claude);
    let run = run_agent(
        reader.as_ref(),
        dir.path(),
        &config(RedactionTier::Normal, Some(window)),
    )
    .unwrap();

    assert_eq!(run.report.units_attempted, 2);
    assert_eq!(run.sessions.len(), 1);
    assert_eq!(run.sessions[0].id, "alpha");
    assert_eq!(run.report.skip_reasons.get("outside window"), Some(&1));
}

#[test]
fn test_inverted_window_is_a_config_error() {
    let window = ScanWindow::new(
        Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    );
    assert!(PipelineConfig::new(RedactionTier::Normal, Some(window)).is_err());
}

// ============================================================
// Redaction and enrichment through the pipeline
// ============================================================

#[test]
fn test_normal_tier_summarizes_and_strips() {
    let dir = TempDir::new().unwrap();
    let proj = dir.path().join("proj");
    write_file(
        &proj,
        "s.jsonl",
        r#"{"type":"user","sessionId":"alpha","timestamp":"2025-03-01T10:00:00Z","cwd":"/home/u/git/me/mytech","message":{"content":"deploy with password: hunter2 please"}}"#,
    );

    let reader = create_reader(AgentKind::Claude);
    let run = run_agent(reader.as_ref(), dir.path(), &config(RedactionTier::Normal, None)).unwrap();

    let session = &run.sessions[0];
    assert_eq!(session.repo.as_deref(), Some("me/mytech"));
    assert!(!session.user_prompts[0].contains("hunter2"));
    assert!(session.user_prompts[0].contains("[REDACTED]"));
}

#[test]
fn test_strict_tier_drops_repo_and_labels() {
    let dir = TempDir::new().unwrap();
    let proj = dir.path().join("proj");
    write_file(&proj, "s.jsonl", claude_transcript());

    let reader = create_reader(AgentKind::Claude);
    let run = run_agent(reader.as_ref(), dir.path(), &config(RedactionTier::Strict, None)).unwrap();

    let session = &run.sessions[0];
    assert!(session.repo.is_none());
    assert!(session.branch.is_none());
    assert_eq!(session.user_prompts, vec![PROMPT_MARKER]);
    // Marker text is not prompt text: no labels under strict.
    assert!(session.topic.is_none());
    assert!(session.vibe.is_none());
}

#[test]
fn test_enrichment_labels_flow_from_prompts() {
    let dir = TempDir::new().unwrap();
    let proj = dir.path().join("proj");
    write_file(&proj, "s.jsonl", claude_transcript());

    let reader = create_reader(AgentKind::Claude);
    let run = run_agent(reader.as_ref(), dir.path(), &config(RedactionTier::Normal, None)).unwrap();

    let session = &run.sessions[0];
    // "fix the broken test error" is debugging signal.
    assert!(session.topic.is_some());
    assert!(session.vibe.is_some());
    assert!(session.prompt_archetype.is_some());
}

// ============================================================
// Other sources through the pipeline
// ============================================================

#[test]
fn test_gemini_groups_become_sessions() {
    let dir = TempDir::new().unwrap();
    let aa = dir.path().join("aa");
    let bb = dir.path().join("bb");
    write_file(
        &aa,
        "logs.json",
        r#"[{"sessionId":"g1","type":"user","content":"explain this error","timestamp":"2025-04-01T09:00:00Z"}]"#,
    );
    write_file(
        &bb,
        "logs.json",
        r#"[{"sessionId":"g1","type":"model","timestamp":"2025-04-01T09:10:00Z"},
            {"sessionId":"g2","type":"user","content":"try an experiment","timestamp":"2025-04-02T11:00:00Z"}]"#,
    );

    let reader = create_reader(AgentKind::Gemini);
    let run = run_agent(reader.as_ref(), dir.path(), &config(RedactionTier::Normal, None)).unwrap();

    assert_eq!(run.report.units_attempted, 2);
    assert_eq!(run.sessions.len(), 2);
    assert_eq!(run.sessions[0].id, "g1");
    assert_eq!(run.sessions[0].turn_count, 2);
    assert!((run.sessions[0].duration_minutes - 10.0).abs() < 0.01);
    assert_eq!(run.sessions[1].id, "g2");
}
