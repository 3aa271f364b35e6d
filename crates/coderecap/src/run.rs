use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use colored::Colorize;
use serde::Serialize;
use tokio::task;
use uuid::Uuid;

use coderecap_agent::{create_reader, AgentKind, ScanWindow};
use coderecap_core::{run_agent, AgentReport, PipelineConfig, Session, Skip};
use coderecap_redact::RedactionTier;
use coderecap_stats::{aggregate, top_entries, RecapStats};

use crate::config::{RecapConfig, CONFIG_FILE_NAME};

#[derive(Debug)]
pub struct RunArgs {
    pub year: Option<i32>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub timezone: Option<String>,
    pub redaction: Option<RedactionTier>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

/// One full ingestion run, as written to the report file.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub window: Option<WindowBounds>,
    pub redaction: RedactionTier,
    pub reports: Vec<AgentReport>,
    pub stats: RecapStats,
    pub sessions: Vec<Session>,
    pub skips: Vec<Skip>,
}

#[derive(Debug, Serialize)]
pub struct WindowBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn handle_run(args: RunArgs, config: &RecapConfig) -> Result<()> {
    let tier = resolve_tier(&args, config)?;
    let window = resolve_window(&args, config)?;
    let pipeline = PipelineConfig::new(tier, window)?;

    let (since, until) = effective_bounds(&args, config);
    let output = args
        .output
        .clone()
        .or_else(|| config.output.clone())
        .unwrap_or_else(|| {
            PathBuf::from(format!("coderecap-{}.json", window_label(&since, &until)))
        });

    // One blocking task per agent; each agent pipeline is synchronous and
    // owns its sessions until the join.
    let mut handles = Vec::new();
    for agent in AgentKind::all() {
        let root = resolve_root(agent, config)?;
        handles.push(task::spawn_blocking(move || {
            let reader = create_reader(agent);
            run_agent(reader.as_ref(), &root, &pipeline)
        }));
    }

    let mut sessions = Vec::new();
    let mut skips = Vec::new();
    let mut reports = Vec::new();
    for handle in handles {
        let run = handle.await.context("agent task panicked")??;
        reports.push(run.report);
        sessions.extend(run.sessions);
        skips.extend(run.skips);
    }

    // Merge order must not depend on task completion order.
    sessions.sort_by(|a, b| {
        a.agent
            .cmp(&b.agent)
            .then_with(|| a.started_at.cmp(&b.started_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    skips.sort_by(|a, b| a.agent.cmp(&b.agent).then_with(|| a.unit_id.cmp(&b.unit_id)));

    let stats = aggregate(&sessions);
    let report = RunReport {
        run_id: Uuid::new_v4().to_string(),
        generated_at: Utc::now(),
        window: window.map(|w| WindowBounds {
            start: w.start,
            end: w.end,
        }),
        redaction: tier,
        reports,
        stats,
        sessions,
        skips,
    };

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    if args.json {
        println!("{}", json);
    } else {
        std::fs::write(&output, &json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        print_summary(&report, &output);
    }
    Ok(())
}

fn resolve_tier(args: &RunArgs, config: &RecapConfig) -> Result<RedactionTier> {
    if let Some(tier) = args.redaction {
        return Ok(tier);
    }
    match config.redaction.as_deref() {
        Some(raw) => raw
            .parse()
            .map_err(|err: String| anyhow::anyhow!("{} in {}", err, CONFIG_FILE_NAME)),
        None => Ok(RedactionTier::default()),
    }
}

/// Effective raw day bounds: config beats nothing, `--year` beats config,
/// explicit `--since`/`--until` beat both.
fn effective_bounds(args: &RunArgs, config: &RecapConfig) -> (Option<String>, Option<String>) {
    let mut since = config.window.since.clone();
    let mut until = config.window.until.clone();
    if let Some(year) = args.year {
        since = Some(format!("{}-01-01", year));
        until = Some(format!("{}-12-31", year));
    }
    if args.since.is_some() {
        since = args.since.clone();
    }
    if args.until.is_some() {
        until = args.until.clone();
    }
    (since, until)
}

/// Resolve the inclusive scan window, if any bound is configured. A missing
/// `since` opens the window at the beginning of time, a missing `until`
/// closes it now.
fn resolve_window(args: &RunArgs, config: &RecapConfig) -> Result<Option<ScanWindow>> {
    let (since, until) = effective_bounds(args, config);
    if since.is_none() && until.is_none() {
        return Ok(None);
    }

    let timezone = args
        .timezone
        .as_deref()
        .or(config.window.timezone.as_deref());
    let offset = parse_offset(timezone)?;

    let start = match since {
        Some(raw) => day_bound(&raw, offset, false)?,
        None => DateTime::<Utc>::MIN_UTC,
    };
    let end = match until {
        Some(raw) => day_bound(&raw, offset, true)?,
        None => Utc::now(),
    };
    Ok(Some(ScanWindow::new(start, end)))
}

/// One day bound in the configured offset, converted to UTC.
fn day_bound(raw: &str, offset: FixedOffset, end_of_day: bool) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| anyhow::anyhow!("Invalid date {:?}: {}", raw, err))?;
    let naive = if end_of_day {
        date.and_hms_opt(23, 59, 59).unwrap()
    } else {
        date.and_hms_opt(0, 0, 0).unwrap()
    };
    let local = offset
        .from_local_datetime(&naive)
        .single()
        .with_context(|| format!("Invalid date {:?} in offset {}", raw, offset))?;
    Ok(local.with_timezone(&Utc))
}

/// "UTC", "+HH:MM", or "-HH:MM" to a fixed offset.
fn parse_offset(raw: Option<&str>) -> Result<FixedOffset> {
    let raw = match raw {
        Some(raw) => raw.trim(),
        None => return Ok(FixedOffset::east_opt(0).unwrap()),
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("utc") {
        return Ok(FixedOffset::east_opt(0).unwrap());
    }

    let err = || anyhow::anyhow!("Invalid timezone {:?}: expected +HH:MM, -HH:MM, or UTC", raw);
    let sign = match raw.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(err()),
    };
    let (hours, minutes) = raw[1..].split_once(':').ok_or_else(err)?;
    let hours: i32 = hours.parse().map_err(|_| err())?;
    let minutes: i32 = minutes.parse().map_err(|_| err())?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(err());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(err)
}

/// Short label for the default report file name.
fn window_label(since: &Option<String>, until: &Option<String>) -> String {
    if let (Some(since), Some(until)) = (since, until) {
        // A whole calendar year collapses to just the year.
        if let (Some(start_year), Some(end_year)) =
            (since.strip_suffix("-01-01"), until.strip_suffix("-12-31"))
        {
            if start_year == end_year {
                return start_year.to_string();
            }
        }
        return format!("{}_{}", since, until);
    }
    match (since, until) {
        (Some(since), None) => format!("{}_onward", since),
        (None, Some(until)) => format!("until_{}", until),
        _ => "all".to_string(),
    }
}

fn resolve_root(agent: AgentKind, config: &RecapConfig) -> Result<PathBuf> {
    if let Some(root) = config.root_for(agent) {
        return Ok(root.to_path_buf());
    }
    create_reader(agent).default_root().with_context(|| {
        format!(
            "No default source location for {}; set [roots] {} in {}",
            agent, agent, CONFIG_FILE_NAME
        )
    })
}

fn print_summary(report: &RunReport, output: &Path) {
    println!();
    println!("{}", "=== Coderecap ===".bright_blue().bold());
    if let Some(ref window) = report.window {
        println!(
            "{}  {} to {}",
            "Window:".dimmed(),
            window.start.format("%Y-%m-%d %H:%M UTC"),
            window.end.format("%Y-%m-%d %H:%M UTC")
        );
    }
    println!("{}  {}", "Redaction:".dimmed(), report.redaction);

    println!();
    println!(
        "{:<14} {:>7} {:>10} {:>7}",
        "AGENT".dimmed(),
        "UNITS".dimmed(),
        "SESSIONS".dimmed(),
        "SKIPS".dimmed()
    );
    for agent_report in &report.reports {
        if !agent_report.source_available {
            println!(
                "{:<14} {}",
                agent_report.agent.label(),
                "not found".dimmed()
            );
            continue;
        }
        println!(
            "{:<14} {:>7} {:>10} {:>7}",
            agent_report.agent.label(),
            agent_report.units_attempted,
            agent_report.sessions_produced,
            agent_report.skips
        );
    }

    let mut reasons: BTreeMap<&str, usize> = BTreeMap::new();
    for agent_report in &report.reports {
        for (reason, count) in &agent_report.skip_reasons {
            *reasons.entry(reason.as_str()).or_insert(0) += count;
        }
    }
    if !reasons.is_empty() {
        println!();
        println!("{}", "Skip reasons:".dimmed());
        for (reason, count) in reasons {
            println!("  {:<32} {}", reason, count);
        }
    }

    let stats = &report.stats;
    println!();
    println!("{}", "=== Totals ===".bright_blue().bold());
    println!("{}  {}", "Sessions:".dimmed(), stats.total_sessions);
    println!("{}  {}", "Turns:".dimmed(), stats.total_turns);
    if stats.total_tokens > 0 {
        println!("{}  {}", "Tokens:".dimmed(), stats.total_tokens);
    }
    println!(
        "{}  {:.1}h",
        "Duration:".dimmed(),
        stats.total_duration_hours()
    );
    println!(
        "{}  {} ({} day longest streak)",
        "Active days:".dimmed(),
        stats.active_days,
        stats.longest_streak_days
    );
    if let Some(ref day) = stats.most_active_day {
        println!(
            "{}  {} ({} sessions)",
            "Busiest day:".dimmed(),
            day,
            stats.most_active_day_sessions
        );
    }
    if let Some(hour) = stats.peak_hour {
        println!("{}  {:02}:00 UTC", "Peak hour:".dimmed(), hour);
    }

    let top_repos = top_entries(&stats.all_repos, 5);
    if !top_repos.is_empty() {
        println!();
        println!("{}", "Top repos:".dimmed());
        for (repo, count) in top_repos {
            println!("  {:<28} {}", repo, count);
        }
    }
    let top_tools = top_entries(&stats.all_tools, 10);
    if !top_tools.is_empty() {
        println!();
        println!("{}", "Top tools:".dimmed());
        for (tool, count) in top_tools {
            println!("  {:<28} {}", tool, count);
        }
    }

    println!();
    println!("Report written to {}", output.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> RunArgs {
        RunArgs {
            year: None,
            since: None,
            until: None,
            timezone: None,
            redaction: None,
            output: None,
            json: false,
        }
    }

    #[test]
    fn offset_parsing() {
        assert_eq!(
            parse_offset(None).unwrap(),
            FixedOffset::east_opt(0).unwrap()
        );
        assert_eq!(
            parse_offset(Some("UTC")).unwrap(),
            FixedOffset::east_opt(0).unwrap()
        );
        assert_eq!(
            parse_offset(Some("+02:00")).unwrap(),
            FixedOffset::east_opt(2 * 3600).unwrap()
        );
        assert_eq!(
            parse_offset(Some("-07:30")).unwrap(),
            FixedOffset::west_opt(7 * 3600 + 1800).unwrap()
        );
        assert!(parse_offset(Some("PST")).is_err());
        assert!(parse_offset(Some("+25:00")).is_err());
    }

    #[test]
    fn year_shorthand_expands_to_calendar_bounds() {
        let mut args = bare_args();
        args.year = Some(2025);
        let window = resolve_window(&args, &RecapConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn explicit_bounds_beat_the_year() {
        let mut args = bare_args();
        args.year = Some(2025);
        args.since = Some("2025-06-01".to_string());
        let (since, until) = effective_bounds(&args, &RecapConfig::default());
        assert_eq!(since.as_deref(), Some("2025-06-01"));
        assert_eq!(until.as_deref(), Some("2025-12-31"));
    }

    #[test]
    fn day_bounds_honor_the_offset() {
        let mut args = bare_args();
        args.since = Some("2025-01-01".to_string());
        args.until = Some("2025-01-31".to_string());
        args.timezone = Some("-07:00".to_string());
        let window = resolve_window(&args, &RecapConfig::default())
            .unwrap()
            .unwrap();
        // Midnight at -07:00 is 07:00 UTC.
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap()
        );
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2025, 2, 1, 6, 59, 59).unwrap()
        );
    }

    #[test]
    fn no_bounds_means_no_window() {
        assert!(resolve_window(&bare_args(), &RecapConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn malformed_date_is_a_config_error() {
        let mut args = bare_args();
        args.since = Some("January 1st".to_string());
        assert!(resolve_window(&args, &RecapConfig::default()).is_err());
    }

    #[test]
    fn report_labels() {
        let year = window_label(
            &Some("2025-01-01".to_string()),
            &Some("2025-12-31".to_string()),
        );
        assert_eq!(year, "2025");

        let range = window_label(
            &Some("2025-01-01".to_string()),
            &Some("2025-06-30".to_string()),
        );
        assert_eq!(range, "2025-01-01_2025-06-30");

        assert_eq!(window_label(&None, &None), "all");
    }
}
