use std::path::{Path, PathBuf};

use crate::reader::{collect_files, jsonl_units, SourceReader};
use crate::{AgentKind, ScanWindow, SourceError, SourceScan};

/// Claude Code writes one JSONL transcript per session under
/// `~/.claude/projects/<munged-cwd>/<session-id>.jsonl`.
pub struct ClaudeReader;

impl SourceReader for ClaudeReader {
    fn agent(&self) -> AgentKind {
        AgentKind::Claude
    }

    fn default_root(&self) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".claude").join("projects"))
    }

    fn scan(&self, root: &Path, _window: Option<&ScanWindow>) -> Result<SourceScan, SourceError> {
        if !root.is_dir() {
            return Ok(SourceScan::unavailable(self.agent(), root.to_path_buf()));
        }

        let files = collect_files(root, &|path| {
            path.extension().is_some_and(|ext| ext == "jsonl")
        });
        tracing::debug!(count = files.len(), root = %root.display(), "claude transcripts found");

        let mut units = Vec::new();
        for file in &files {
            units.extend(jsonl_units(file));
        }
        Ok(SourceScan {
            agent: self.agent(),
            root: root.to_path_buf(),
            available: true,
            units,
        })
    }
}
