use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::matcher::{weighted_occurrences, word_regex};

/// How a session felt, weighted-scored from prompt text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vibe {
    DebuggingHell,
    FlowState,
    Exploration,
    Learning,
    DeepWork,
}

impl std::fmt::Display for Vibe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Vibe::DebuggingHell => "Debugging Hell",
            Vibe::FlowState => "Flow State",
            Vibe::Exploration => "Exploration Mode",
            Vibe::Learning => "Learning Mode",
            Vibe::DeepWork => "Deep Work",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VibeMatch {
    pub vibe: Vibe,
    /// 0.0..=1.0
    pub confidence: f64,
}

/// Declaration order doubles as the tie-break priority.
const VIBE_WEIGHTS: &[(Vibe, &[(&str, f64)])] = &[
    (
        Vibe::DebuggingHell,
        &[
            ("error", 1.0),
            ("not working", 2.0),
            ("why", 0.5),
            ("wtf", 3.0),
            ("broken", 1.5),
            ("fail", 1.0),
            ("crash", 1.5),
            ("bug", 1.0),
            ("issue", 0.5),
            ("stuck", 2.0),
            ("help", 1.0),
            ("doesn't work", 2.0),
            ("won't", 1.0),
            ("can't", 0.5),
            ("exception", 1.0),
            ("traceback", 1.5),
            ("undefined", 1.0),
            ("null", 0.5),
            ("none", 0.3),
        ],
    ),
    (
        Vibe::FlowState,
        &[
            ("perfect", 2.0),
            ("works", 1.0),
            ("great", 1.5),
            ("done", 1.0),
            ("ship", 2.0),
            ("deploy", 1.5),
            ("finish", 1.0),
            ("complete", 1.0),
            ("success", 1.5),
            ("awesome", 1.5),
            ("nice", 0.5),
            ("good", 0.3),
            ("thanks", 0.5),
            ("looks good", 1.5),
            ("lgtm", 2.0),
            ("merged", 1.5),
        ],
    ),
    (
        Vibe::Exploration,
        &[
            ("what if", 2.0),
            ("could we", 1.5),
            ("try", 1.0),
            ("experiment", 2.0),
            ("explore", 2.0),
            ("maybe", 0.5),
            ("possible", 0.5),
            ("alternative", 1.0),
            ("option", 0.5),
            ("approach", 0.5),
            ("idea", 1.0),
            ("prototype", 1.5),
            ("poc", 1.5),
            ("spike", 1.5),
        ],
    ),
    (
        Vibe::Learning,
        &[
            ("how do", 1.5),
            ("how does", 1.5),
            ("explain", 2.0),
            ("understand", 1.5),
            ("what is", 1.5),
            ("why does", 1.5),
            ("learn", 2.0),
            ("tutorial", 1.5),
            ("example", 1.0),
            ("documentation", 1.0),
            ("guide", 1.0),
            ("newbie", 1.5),
            ("beginner", 1.5),
            ("first time", 1.5),
        ],
    ),
    (
        Vibe::DeepWork,
        &[
            ("architecture", 1.5),
            ("design", 1.0),
            ("refactor", 1.5),
            ("system", 0.5),
            ("implement", 1.0),
            ("build", 0.5),
            ("complex", 1.0),
            ("careful", 1.0),
            ("think", 0.5),
            ("plan", 1.0),
        ],
    ),
];

lazy_static! {
    static ref VIBE_MATCHERS: Vec<(Vibe, Vec<(&'static str, f64, Regex)>)> = VIBE_WEIGHTS
        .iter()
        .map(|(vibe, weights)| {
            let compiled = weights
                .iter()
                .map(|(kw, weight)| (*kw, *weight, word_regex(kw)))
                .collect();
            (*vibe, compiled)
        })
        .collect();
}

/// Score the session's vibe. Text with no signal gets none. A long, busy
/// session (> 50 turns and > 60 minutes) reads as a struggle or as
/// concentration: a debugging-hell score is boosted by half, and any other
/// weakly-scored label folds into deep work at half confidence.
pub fn detect_vibe(text: &str, turn_count: u32, duration_minutes: f64) -> Option<VibeMatch> {
    if text.trim().is_empty() {
        return None;
    }
    let text = text.to_lowercase();

    let mut best: Option<(Vibe, f64)> = None;
    for (vibe, weights) in VIBE_MATCHERS.iter() {
        let score: f64 = weights
            .iter()
            .map(|(kw, weight, re)| weighted_occurrences(&text, kw, re) as f64 * weight)
            .sum();
        if score <= 0.0 {
            continue;
        }
        // Strict > keeps the first-declared vibe on ties.
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((*vibe, score));
        }
    }

    let (vibe, mut score) = best?;
    if turn_count > 50 && duration_minutes > 60.0 {
        if vibe == Vibe::DebuggingHell {
            score *= 1.5;
        } else if vibe != Vibe::DeepWork && score < 3.0 {
            return Some(VibeMatch {
                vibe: Vibe::DeepWork,
                confidence: 0.5,
            });
        }
    }
    Some(VibeMatch {
        vibe,
        confidence: (score / 10.0).min(1.0),
    })
}
