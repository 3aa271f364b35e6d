use serde::{Deserialize, Serialize};

/// Supported log sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Claude,
    Codex,
    Cursor,
    Gemini,
}

impl AgentKind {
    /// Every known agent, in canonical reporting order.
    pub fn all() -> [AgentKind; 4] {
        [
            AgentKind::Claude,
            AgentKind::Codex,
            AgentKind::Cursor,
            AgentKind::Gemini,
        ]
    }

    /// Human-readable product name for summaries.
    pub fn label(&self) -> &'static str {
        match self {
            AgentKind::Claude => "Claude Code",
            AgentKind::Codex => "Codex CLI",
            AgentKind::Cursor => "Cursor",
            AgentKind::Gemini => "Gemini CLI",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Claude => write!(f, "claude"),
            AgentKind::Codex => write!(f, "codex"),
            AgentKind::Cursor => write!(f, "cursor"),
            AgentKind::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(AgentKind::Claude),
            "codex" | "codex-cli" => Ok(AgentKind::Codex),
            "cursor" => Ok(AgentKind::Cursor),
            "gemini" | "gemini-cli" => Ok(AgentKind::Gemini),
            _ => Err(format!("Unknown agent: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_aliases() {
        assert_eq!(AgentKind::from_str("claude-code").unwrap(), AgentKind::Claude);
        assert_eq!(AgentKind::from_str("CODEX").unwrap(), AgentKind::Codex);
        assert!(AgentKind::from_str("copilot").is_err());
    }

    #[test]
    fn display_round_trips() {
        for kind in AgentKind::all() {
            assert_eq!(AgentKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }
}
