use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use coderecap_agent::{create_reader, AgentKind};
use coderecap_core::{build_unit, BuildOutcome};

use crate::config::RecapConfig;

/// What one agent's source location looks like right now.
#[derive(Debug, Serialize)]
pub struct SourceProbe {
    pub agent: AgentKind,
    pub root: Option<String>,
    pub found: bool,
    pub units: usize,
    /// Id and start date of the first session that parses, as a smoke check.
    pub sample_session: Option<String>,
}

pub fn handle_check(config: &RecapConfig, json: bool) -> Result<()> {
    let probes: Vec<SourceProbe> = AgentKind::all()
        .into_iter()
        .map(|agent| probe(agent, config))
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&probes).context("Failed to serialize probes")?;
        println!("{}", out);
        return Ok(());
    }

    println!();
    println!("{}", "=== Source Check ===".bright_blue().bold());
    for probe in &probes {
        let status = if probe.found {
            "FOUND".bright_green()
        } else {
            "NOT FOUND".bright_red()
        };
        let root = probe.root.as_deref().unwrap_or("(no known location)");
        println!(
            "{:<12} {:<9}  {}",
            probe.agent.label(),
            status,
            root.dimmed()
        );
        if probe.found {
            match &probe.sample_session {
                Some(sample) => println!(
                    "{:<12} {} units, sample {}",
                    "",
                    probe.units,
                    sample
                ),
                None => println!("{:<12} {} units, none parse yet", "", probe.units),
            }
        }
    }
    Ok(())
}

fn probe(agent: AgentKind, config: &RecapConfig) -> SourceProbe {
    let reader = create_reader(agent);
    let root = config
        .root_for(agent)
        .map(Path::to_path_buf)
        .or_else(|| reader.default_root());
    let root = match root {
        Some(root) => root,
        None => {
            return SourceProbe {
                agent,
                root: None,
                found: false,
                units: 0,
                sample_session: None,
            }
        }
    };

    let display = root.display().to_string();
    let scan = match reader.scan(&root, None) {
        Ok(scan) => scan,
        Err(err) => {
            tracing::warn!(%agent, error = %err, "source probe failed");
            return SourceProbe {
                agent,
                root: Some(display),
                found: false,
                units: 0,
                sample_session: None,
            };
        }
    };
    if !scan.available {
        return SourceProbe {
            agent,
            root: Some(display),
            found: false,
            units: 0,
            sample_session: None,
        };
    }

    let sample_session = scan.units.iter().find_map(|unit| {
        match build_unit(agent, unit) {
            BuildOutcome::Built(session) => Some(format!(
                "{} ({})",
                session.id,
                session.started_at.format("%Y-%m-%d")
            )),
            BuildOutcome::Skipped(_) => None,
        }
    });

    SourceProbe {
        agent,
        root: Some(display),
        found: true,
        units: scan.units.len(),
        sample_session,
    }
}
