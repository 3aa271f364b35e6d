use std::collections::BTreeMap;
use std::path::Path;

use coderecap_agent::{ScanWindow, SourceReader};
use coderecap_redact::RedactionTier;

use crate::build::{build_unit, BuildOutcome};
use crate::enrich::enrich;
use crate::error::CoreError;
use crate::model::{AgentReport, Session, Skip};
use crate::redact::apply_tier;

/// Read-only per-run configuration, passed in explicitly so agent pipelines
/// can run on independent workers with no shared state.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub tier: RedactionTier,
    pub window: Option<ScanWindow>,
}

impl PipelineConfig {
    pub fn new(tier: RedactionTier, window: Option<ScanWindow>) -> Result<Self, CoreError> {
        if let Some(window) = &window {
            if window.start > window.end {
                return Err(CoreError::InvalidWindow(format!(
                    "start {} is after end {}",
                    window.start, window.end
                )));
            }
        }
        Ok(Self { tier, window })
    }
}

/// One agent's finished output: the session stream, the skip stream, and the
/// accounting that ties them to the units attempted.
#[derive(Debug)]
pub struct AgentRun {
    pub sessions: Vec<Session>,
    pub skips: Vec<Skip>,
    pub report: AgentReport,
}

/// Run the full pipeline for one agent: scan, build, window-filter, redact,
/// enrich. Every unit ends up in exactly one of `sessions` or `skips`.
pub fn run_agent(
    reader: &dyn SourceReader,
    root: &Path,
    config: &PipelineConfig,
) -> Result<AgentRun, CoreError> {
    let scan = reader.scan(root, config.window.as_ref())?;
    let agent = scan.agent;
    if !scan.available {
        tracing::warn!(%agent, root = %root.display(), "source unavailable, zero units");
    } else {
        tracing::debug!(%agent, units = scan.units.len(), "scan complete");
    }

    let mut sessions = Vec::new();
    let mut skips = Vec::new();
    for unit in &scan.units {
        match build_unit(agent, unit) {
            BuildOutcome::Skipped(skip) => {
                tracing::debug!(%agent, unit = %skip.unit_id, reason = %skip.reason(), "unit skipped");
                skips.push(skip);
            }
            BuildOutcome::Built(mut session) => {
                if let Some(window) = &config.window {
                    if !window.contains(session.started_at) {
                        skips.push(Skip::new(agent, unit.unit_id(), "outside window"));
                        continue;
                    }
                }
                apply_tier(&mut session, config.tier);
                enrich(&mut session);
                sessions.push(session);
            }
        }
    }

    // Output order must not depend on scan or scheduling order.
    sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
    skips.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

    let mut skip_reasons: BTreeMap<String, usize> = BTreeMap::new();
    for skip in &skips {
        *skip_reasons.entry(skip.reason().to_string()).or_insert(0) += 1;
    }
    let report = AgentReport {
        agent,
        root: scan.root.display().to_string(),
        source_available: scan.available,
        units_attempted: scan.units.len(),
        sessions_produced: sessions.len(),
        skips: skips.len(),
        skip_reasons,
    };
    tracing::info!(
        %agent,
        units = report.units_attempted,
        sessions = report.sessions_produced,
        skips = report.skips,
        "agent pipeline finished"
    );

    Ok(AgentRun {
        sessions,
        skips,
        report,
    })
}
