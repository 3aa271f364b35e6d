use coderecap_enrich::{detect_archetype, detect_topic, detect_vibe};
use coderecap_redact::PROMPT_MARKER;

use crate::model::Session;

/// Annotate topic, vibe, and archetype from the session's (already
/// redacted) prompt text. Deterministic, lexicon-only. No prompt text means
/// no labels; strict-tier markers count as no text.
pub fn enrich(session: &mut Session) {
    let prompts: Vec<&str> = session
        .user_prompts
        .iter()
        .map(String::as_str)
        .filter(|prompt| *prompt != PROMPT_MARKER)
        .collect();
    let corpus = prompts.join(" ");
    if corpus.trim().is_empty() {
        return;
    }

    // The repo name is extra topic signal, but never enough on its own.
    let topic_input = match &session.repo {
        Some(repo) => format!("{} {}", corpus, repo),
        None => corpus.clone(),
    };
    session.topic = detect_topic(&topic_input);
    session.vibe = detect_vibe(&corpus, session.turn_count, session.duration_minutes)
        .map(|hit| hit.vibe);
    session.prompt_archetype = detect_archetype(&prompts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use coderecap_agent::AgentKind;
    use coderecap_enrich::{Archetype, Topic, Vibe};

    fn session_with_prompts(prompts: &[&str]) -> Session {
        let mut session = Session::new(
            "s1".to_string(),
            AgentKind::Codex,
            Utc.with_ymd_and_hms(2025, 2, 2, 14, 0, 0).unwrap(),
        );
        session.user_prompts = prompts.iter().map(|p| p.to_string()).collect();
        session
    }

    #[test]
    fn labels_follow_prompt_text() {
        let mut session = session_with_prompts(&[
            "fix the broken api endpoint, the request fails with an error",
            "why does the response crash the server",
        ]);
        enrich(&mut session);
        // Four debugging keywords over a 10-word lexicon outscore the four
        // api keywords over twelve.
        assert_eq!(session.topic, Some(Topic::Debugging));
        assert_eq!(session.prompt_archetype, Some(Archetype::Debugger));
        assert_eq!(session.vibe, Some(Vibe::DebuggingHell));
    }

    #[test]
    fn no_prompts_no_labels() {
        let mut session = session_with_prompts(&[]);
        session.repo = Some("mytech".to_string());
        enrich(&mut session);
        assert_eq!(session.topic, None);
        assert_eq!(session.vibe, None);
        assert_eq!(session.prompt_archetype, None);
    }

    #[test]
    fn strict_markers_count_as_no_text() {
        let mut session = session_with_prompts(&[coderecap_redact::PROMPT_MARKER]);
        enrich(&mut session);
        assert_eq!(session.topic, None);
        assert_eq!(session.vibe, None);
        assert_eq!(session.prompt_archetype, None);
    }

    #[test]
    fn identical_text_identical_labels() {
        let prompts = ["refactor the architecture and design a cleaner module structure"];
        let mut a = session_with_prompts(&prompts);
        let mut b = session_with_prompts(&prompts);
        enrich(&mut a);
        enrich(&mut b);
        assert_eq!(a.topic, b.topic);
        assert_eq!(a.vibe, b.vibe);
        assert_eq!(a.prompt_archetype, b.prompt_archetype);
        assert_eq!(a.vibe, Some(Vibe::DeepWork));
        assert_eq!(a.prompt_archetype, Some(Archetype::Architect));
    }
}
