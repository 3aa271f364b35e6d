mod text;
mod tier;

pub use text::{
    has_secret, scrub_paths, strip_secrets, summarize, truncate, PROMPT_MARKER, REDACTED,
    SUMMARY_LIMIT,
};
pub use tier::RedactionTier;
