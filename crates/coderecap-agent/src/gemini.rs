use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::reader::{collect_files, SourceReader};
use crate::unit::{parse_timestamp, str_field};
use crate::{AgentKind, RawUnit, ScanWindow, SourceError, SourceScan};

/// Gemini CLI appends messages to `logs.json` documents scattered under
/// `~/.gemini/tmp/<hash>/`. One session's messages can span several files, so
/// units are per `sessionId` group, not per file.
pub struct GeminiReader;

impl SourceReader for GeminiReader {
    fn agent(&self) -> AgentKind {
        AgentKind::Gemini
    }

    fn default_root(&self) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".gemini").join("tmp"))
    }

    fn scan(&self, root: &Path, window: Option<&ScanWindow>) -> Result<SourceScan, SourceError> {
        if !root.is_dir() {
            return Ok(SourceScan::unavailable(self.agent(), root.to_path_buf()));
        }

        let files = collect_files(root, &|path| {
            path.file_name().is_some_and(|name| name == "logs.json")
        });
        tracing::debug!(count = files.len(), root = %root.display(), "gemini log files found");

        let mut broken: Vec<RawUnit> = Vec::new();
        // BTreeMap keeps group order stable across runs.
        let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for file in &files {
            match read_messages(file) {
                Ok(messages) => {
                    for message in messages {
                        // The window applies per message, before grouping, so
                        // a fully-filtered session never becomes a unit.
                        if let (Some(window), Some(raw)) = (window, str_field(&message, "timestamp"))
                        {
                            if let Some(parsed) = parse_timestamp(raw) {
                                if !window.contains(parsed.at) {
                                    continue;
                                }
                            }
                        }
                        match str_field(&message, "sessionId") {
                            Some(session_id) => {
                                groups.entry(session_id.to_string()).or_default().push(message)
                            }
                            None => {
                                tracing::warn!(file = %file.display(), "gemini message without sessionId dropped");
                            }
                        }
                    }
                }
                Err(reason) => broken.push(RawUnit::Broken {
                    unit_id: file.display().to_string(),
                    reason,
                }),
            }
        }

        let mut units = broken;
        units.extend(groups.into_iter().map(|(session_id, records)| {
            RawUnit::Records {
                unit_id: format!("{}#session:{}", root.display(), session_id),
                records,
            }
        }));
        Ok(SourceScan {
            agent: self.agent(),
            root: root.to_path_buf(),
            available: true,
            units,
        })
    }
}

fn read_messages(path: &Path) -> Result<Vec<Value>, String> {
    let text = fs::read_to_string(path).map_err(|err| format!("unreadable file: {}", err))?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(messages)) => Ok(messages),
        Ok(_) => Err("unexpected document shape".to_string()),
        Err(_) => Err("parse failure".to_string()),
    }
}
