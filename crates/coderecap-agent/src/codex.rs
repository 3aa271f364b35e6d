use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::reader::{collect_files, jsonl_units, SourceReader};
use crate::{AgentKind, RawUnit, ScanWindow, SourceError, SourceScan};

/// Codex CLI sessions live under `~/.codex/sessions`, in two generations:
/// newer line-delimited files (`session_meta` / `response_item` envelopes)
/// and older single-document files (`{"session": {...}, "items": [...]}`).
pub struct CodexReader;

impl SourceReader for CodexReader {
    fn agent(&self) -> AgentKind {
        AgentKind::Codex
    }

    fn default_root(&self) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".codex").join("sessions"))
    }

    fn scan(&self, root: &Path, _window: Option<&ScanWindow>) -> Result<SourceScan, SourceError> {
        if !root.is_dir() {
            return Ok(SourceScan::unavailable(self.agent(), root.to_path_buf()));
        }

        let files = collect_files(root, &|path| {
            path.extension()
                .is_some_and(|ext| ext == "json" || ext == "jsonl")
        });
        tracing::debug!(count = files.len(), root = %root.display(), "codex session files found");

        let mut units = Vec::new();
        for file in &files {
            if file.extension().is_some_and(|ext| ext == "jsonl") {
                units.extend(jsonl_units(file));
            } else {
                units.push(document_unit(file));
            }
        }
        Ok(SourceScan {
            agent: self.agent(),
            root: root.to_path_buf(),
            available: true,
            units,
        })
    }
}

/// One `.json` file is one unit. Old-format documents keep their outer
/// `session` metadata as a leading record, followed by the unpacked `items`.
fn document_unit(path: &Path) -> RawUnit {
    let unit_id = path.display().to_string();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            return RawUnit::Broken {
                unit_id,
                reason: format!("unreadable file: {}", err),
            }
        }
    };
    let doc: Value = match serde_json::from_str(&text) {
        Ok(doc) => doc,
        Err(_) => {
            return RawUnit::Broken {
                unit_id,
                reason: "parse failure".to_string(),
            }
        }
    };

    let records = match doc {
        Value::Object(ref obj) if obj.contains_key("session") => {
            let mut records = vec![Value::Object(
                obj.iter()
                    .filter(|(key, _)| key.as_str() != "items")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            )];
            if let Some(Value::Array(items)) = obj.get("items") {
                records.extend(items.iter().cloned());
            }
            records
        }
        Value::Array(items) => items,
        other => vec![other],
    };

    if records.is_empty() {
        return RawUnit::Broken {
            unit_id,
            reason: "no parsable records".to_string(),
        };
    }
    RawUnit::Records { unit_id, records }
}
