use serde::{Deserialize, Serialize};

/// Privacy tiers, from most to least aggressive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionTier {
    /// Drop repo/branch, replace prompts with a fixed marker
    Strict,
    /// Keep repo/branch, keep prompts only as derived summaries
    Normal,
    /// Keep everything; secret stripping still applies
    Full,
}

impl Default for RedactionTier {
    fn default() -> Self {
        RedactionTier::Normal
    }
}

impl std::fmt::Display for RedactionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedactionTier::Strict => write!(f, "strict"),
            RedactionTier::Normal => write!(f, "normal"),
            RedactionTier::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for RedactionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(RedactionTier::Strict),
            "normal" | "default" => Ok(RedactionTier::Normal),
            "full" | "none" => Ok(RedactionTier::Full),
            _ => Err(format!("Unknown redaction tier: {}", s)),
        }
    }
}
