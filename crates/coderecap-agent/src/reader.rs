use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::{AgentKind, RawUnit, ScanWindow, SourceError, SourceScan};

/// The core abstraction over agent log sources.
///
/// A reader locates candidate units under a root and parses their raw syntax,
/// without interpreting field semantics. Scans are finite; every call re-scans.
pub trait SourceReader: Send + Sync {
    /// The agent this reader covers
    fn agent(&self) -> AgentKind;

    /// Platform default root (directory, or database file for cursor)
    fn default_root(&self) -> Option<PathBuf>;

    /// Scan `root` for units. A missing or unreadable root yields an
    /// unavailable scan with zero units, never an error for the whole run.
    fn scan(&self, root: &Path, window: Option<&ScanWindow>) -> Result<SourceScan, SourceError>;
}

/// Create a reader by agent
pub fn create_reader(agent: AgentKind) -> Box<dyn SourceReader> {
    match agent {
        AgentKind::Claude => Box::new(crate::claude::ClaudeReader),
        AgentKind::Codex => Box::new(crate::codex::CodexReader),
        AgentKind::Cursor => Box::new(crate::cursor::CursorReader),
        AgentKind::Gemini => Box::new(crate::gemini::GeminiReader),
    }
}

/// Recursively collect files under `dir` whose name passes `keep`, sorted so
/// scan output is independent of directory iteration order.
pub(crate) fn collect_files(dir: &Path, keep: &dyn Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut found = Vec::new();
    walk(dir, keep, &mut found);
    found.sort();
    found
}

fn walk(dir: &Path, keep: &dyn Fn(&Path) -> bool, found: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "skipping unreadable directory");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, keep, found);
        } else if keep(&path) {
            found.push(path);
        }
    }
}

/// Parse one line-delimited JSON file into units.
///
/// Every valid line becomes a record of the file's single `Records` unit. A
/// malformed line after at least one valid line is its own `Broken` unit
/// (`path:line`); a malformed line before any valid one condemns the whole
/// file as a single `Broken` unit, since the file is then likely not JSONL at
/// all.
pub(crate) fn jsonl_units(path: &Path) -> Vec<RawUnit> {
    let unit_id = path.display().to_string();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            return vec![RawUnit::Broken {
                unit_id,
                reason: format!("unreadable file: {}", err),
            }]
        }
    };

    let mut records: Vec<Value> = Vec::new();
    let mut line_skips: Vec<RawUnit> = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => records.push(value),
            Err(_) if records.is_empty() => {
                return vec![RawUnit::Broken {
                    unit_id,
                    reason: "parse failure".to_string(),
                }];
            }
            Err(_) => {
                line_skips.push(RawUnit::Broken {
                    unit_id: format!("{}:{}", unit_id, idx + 1),
                    reason: "parse failure".to_string(),
                });
            }
        }
    }

    if records.is_empty() {
        return vec![RawUnit::Broken {
            unit_id,
            reason: "no parsable records".to_string(),
        }];
    }

    let mut units = line_skips;
    units.push(RawUnit::Records { unit_id, records });
    units
}
