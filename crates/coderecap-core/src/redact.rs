use coderecap_redact::{has_secret, strip_secrets, summarize, RedactionTier, PROMPT_MARKER, REDACTED};

use crate::model::Session;

/// Apply a privacy tier to every redactable field. Total and idempotent:
/// every field has a defined treatment, and re-applying the same tier is a
/// no-op. Secret stripping runs in every tier.
pub fn apply_tier(session: &mut Session, tier: RedactionTier) {
    match tier {
        RedactionTier::Strict => {
            session.repo = None;
            session.branch = None;
            for prompt in &mut session.user_prompts {
                *prompt = PROMPT_MARKER.to_string();
            }
        }
        RedactionTier::Normal => {
            for prompt in &mut session.user_prompts {
                *prompt = summarize(prompt);
            }
        }
        RedactionTier::Full => {
            for prompt in &mut session.user_prompts {
                *prompt = strip_secrets(prompt);
            }
        }
    }

    if let Some(branch) = &mut session.branch {
        *branch = strip_secrets(branch);
    }
    for error in &mut session.errors {
        *error = strip_secrets(error);
    }

    // Fail closed: anything still matching a secret pattern after the tier
    // transforms loses its content entirely.
    enforce_clean(&mut session.user_prompts, "user_prompts", &mut session.parse_diagnostics);
    enforce_clean(&mut session.errors, "errors", &mut session.parse_diagnostics);
}

fn enforce_clean(texts: &mut [String], field: &str, diagnostics: &mut Vec<String>) {
    for text in texts {
        if has_secret(text) {
            *text = REDACTED.to_string();
            diagnostics.push(format!("{}: residual secret pattern, content dropped", field));
        }
    }
}
