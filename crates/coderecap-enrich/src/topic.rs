use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::matcher::word_regex;

/// What a session was about, keyword-scored from prompt text plus repo name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    ApiIntegration,
    Frontend,
    Backend,
    Devops,
    Testing,
    AiMl,
    Data,
    Security,
    Refactoring,
    Debugging,
    Documentation,
    CliTooling,
    Mobile,
    Performance,
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Topic::ApiIntegration => "API Integrations",
            Topic::Frontend => "Frontend Development",
            Topic::Backend => "Backend Systems",
            Topic::Devops => "DevOps & Infrastructure",
            Topic::Testing => "Testing & QA",
            Topic::AiMl => "AI & Machine Learning",
            Topic::Data => "Data Processing",
            Topic::Security => "Security",
            Topic::Refactoring => "Refactoring",
            Topic::Debugging => "Debugging",
            Topic::Documentation => "Documentation",
            Topic::CliTooling => "CLI & Tooling",
            Topic::Mobile => "Mobile Development",
            Topic::Performance => "Performance",
        };
        write!(f, "{}", name)
    }
}

/// Declaration order doubles as the tie-break priority.
const TOPIC_KEYWORDS: &[(Topic, &[&str])] = &[
    (
        Topic::ApiIntegration,
        &[
            "api", "endpoint", "rest", "graphql", "fetch", "request", "response", "webhook",
            "oauth", "authentication", "bearer", "token",
        ],
    ),
    (
        Topic::Frontend,
        &[
            "react", "vue", "svelte", "component", "css", "tailwind", "html", "dom", "ui", "ux",
            "layout", "responsive", "animation",
        ],
    ),
    (
        Topic::Backend,
        &[
            "server", "express", "fastapi", "flask", "django", "database", "sql", "postgres",
            "mongodb", "redis", "cache",
        ],
    ),
    (
        Topic::Devops,
        &[
            "docker", "kubernetes", "k8s", "deploy", "ci", "cd", "pipeline", "terraform", "aws",
            "gcp", "azure", "nginx", "coolify",
        ],
    ),
    (
        Topic::Testing,
        &[
            "test", "pytest", "jest", "unittest", "coverage", "mock", "fixture", "e2e",
            "integration", "unit",
        ],
    ),
    (
        Topic::AiMl,
        &[
            "ai", "ml", "model", "llm", "gpt", "claude", "embedding", "vector", "transformer",
            "neural", "training", "inference", "prompt",
        ],
    ),
    (
        Topic::Data,
        &[
            "data", "pandas", "numpy", "dataframe", "csv", "json", "parse", "transform", "etl",
            "analytics",
        ],
    ),
    (
        Topic::Security,
        &[
            "security", "auth", "encrypt", "hash", "password", "jwt", "cors", "xss",
            "sql injection", "vulnerability",
        ],
    ),
    (
        Topic::Refactoring,
        &[
            "refactor", "clean", "organize", "structure", "pattern", "abstract", "modular",
            "simplify",
        ],
    ),
    (
        Topic::Debugging,
        &[
            "debug", "error", "fix", "bug", "issue", "broken", "crash", "exception", "traceback",
            "stack",
        ],
    ),
    (
        Topic::Documentation,
        &["doc", "readme", "comment", "docstring", "api doc", "spec", "markdown"],
    ),
    (
        Topic::CliTooling,
        &["cli", "command", "argparse", "click", "terminal", "shell", "script", "automation"],
    ),
    (
        Topic::Mobile,
        &["mobile", "ios", "android", "react native", "flutter", "swift", "kotlin", "app"],
    ),
    (
        Topic::Performance,
        &[
            "performance", "optimize", "speed", "latency", "memory", "profile", "benchmark",
            "cache",
        ],
    ),
];

lazy_static! {
    static ref TOPIC_MATCHERS: Vec<(Topic, Vec<Regex>)> = TOPIC_KEYWORDS
        .iter()
        .map(|(topic, keywords)| (*topic, keywords.iter().map(|kw| word_regex(kw)).collect()))
        .collect();
}

/// Best-covered topic for the given text, or none when nothing matches.
/// Score is matched-keyword coverage per topic; ties fall to matched count,
/// then declaration order.
pub fn detect_topic(text: &str) -> Option<Topic> {
    let text = text.to_lowercase();
    if text.trim().is_empty() {
        return None;
    }

    let mut best: Option<(Topic, f64, usize)> = None;
    for (topic, matchers) in TOPIC_MATCHERS.iter() {
        let matched = matchers.iter().filter(|re| re.is_match(&text)).count();
        if matched == 0 {
            continue;
        }
        let score = matched as f64 / matchers.len() as f64;
        let wins = match best {
            None => true,
            Some((_, best_score, best_matched)) => {
                score > best_score || (score == best_score && matched > best_matched)
            }
        };
        if wins {
            best = Some((*topic, score, matched));
        }
    }
    best.map(|(topic, _, _)| topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_best_covered_topic() {
        assert_eq!(
            detect_topic("add a rest endpoint with oauth token handling for the api"),
            Some(Topic::ApiIntegration)
        );
        assert_eq!(
            detect_topic("docker deploy to aws with a ci pipeline"),
            Some(Topic::Devops)
        );
    }

    #[test]
    fn no_match_means_no_label() {
        assert_eq!(detect_topic("zzz qqq"), None);
        assert_eq!(detect_topic(""), None);
        assert_eq!(detect_topic("   "), None);
    }

    #[test]
    fn matching_is_deterministic() {
        let text = "fix the broken test for the api server";
        let first = detect_topic(text);
        for _ in 0..5 {
            assert_eq!(detect_topic(text), first);
        }
    }

    #[test]
    fn boundary_rules_out_substrings() {
        // "app" appears inside "apply" only; mobile must not win.
        assert_eq!(detect_topic("apply the css layout to the component"), Some(Topic::Frontend));
    }
}
