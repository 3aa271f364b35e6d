use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::matcher::word_regex;

/// How the user tends to open a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Architect,
    Debugger,
    Explorer,
    Builder,
    Shipper,
    Tester,
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Archetype::Architect => "The Architect",
            Archetype::Debugger => "The Debugger",
            Archetype::Explorer => "The Explorer",
            Archetype::Builder => "The Builder",
            Archetype::Shipper => "The Shipper",
            Archetype::Tester => "The Tester",
        };
        write!(f, "{}", name)
    }
}

/// Declaration order doubles as the tie-break priority.
const ARCHETYPE_PATTERNS: &[(Archetype, &[&str])] = &[
    (
        Archetype::Architect,
        &[
            "design", "architecture", "structure", "refactor", "organize", "pattern",
            "abstraction", "interface", "module", "clean up", "restructure", "simplify", "split",
            "extract", "decouple",
        ],
    ),
    (
        Archetype::Debugger,
        &[
            "fix", "error", "bug", "not working", "broken", "why", "issue", "crash", "fail",
            "doesn't", "won't", "can't", "problem", "wrong", "debug", "investigate",
        ],
    ),
    (
        Archetype::Explorer,
        &[
            "how", "what", "explain", "understand", "learn", "why does", "what is", "show me",
            "example", "documentation", "tutorial", "help me understand",
        ],
    ),
    (
        Archetype::Builder,
        &[
            "add", "create", "implement", "build", "new feature", "make", "write", "generate",
            "setup", "configure", "install", "integrate",
        ],
    ),
    (
        Archetype::Shipper,
        &[
            "deploy", "release", "push", "publish", "ship", "merge", "production", "launch",
            "rollout", "ci", "cd", "pipeline",
        ],
    ),
    (
        Archetype::Tester,
        &[
            "test", "verify", "check", "validate", "coverage", "assert", "expect", "mock",
            "fixture", "e2e", "integration test", "unit test",
        ],
    ),
];

lazy_static! {
    static ref ARCHETYPE_MATCHERS: Vec<(Archetype, Vec<(&'static str, Regex)>)> =
        ARCHETYPE_PATTERNS
            .iter()
            .map(|(archetype, keywords)| {
                let compiled = keywords.iter().map(|kw| (*kw, word_regex(kw))).collect();
                (*archetype, compiled)
            })
            .collect();
}

/// Classify a single prompt. Phrases score 2, single words score their
/// occurrence count; no signal means no classification.
pub fn classify_prompt(text: &str) -> Option<Archetype> {
    let text = text.to_lowercase();
    if text.trim().is_empty() {
        return None;
    }

    let mut best: Option<(Archetype, usize)> = None;
    for (archetype, keywords) in ARCHETYPE_MATCHERS.iter() {
        let mut score = 0usize;
        for (keyword, re) in keywords {
            if keyword.contains(' ') {
                if text.contains(keyword) {
                    score += 2;
                }
            } else {
                score += re.find_iter(&text).count();
            }
        }
        if score > 0 && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((*archetype, score));
        }
    }
    best.map(|(archetype, _)| archetype)
}

/// The session's archetype is the one its prompts land on most often;
/// ties fall to declaration order.
pub fn detect_archetype<S: AsRef<str>>(prompts: &[S]) -> Option<Archetype> {
    let mut tally: HashMap<Archetype, usize> = HashMap::new();
    for prompt in prompts {
        if let Some(archetype) = classify_prompt(prompt.as_ref()) {
            *tally.entry(archetype).or_insert(0) += 1;
        }
    }
    if tally.is_empty() {
        return None;
    }

    let mut best: Option<(Archetype, usize)> = None;
    for (archetype, _) in ARCHETYPE_PATTERNS.iter() {
        let count = tally.get(archetype).copied().unwrap_or(0);
        if count > 0 && best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((*archetype, count));
        }
    }
    best.map(|(archetype, _)| archetype)
}
