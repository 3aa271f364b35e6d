use regex::Regex;

/// Compile a word-boundary matcher for one keyword. Multi-word keywords keep
/// their internal spaces; boundaries still apply at both ends.
pub(crate) fn word_regex(keyword: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(keyword))).expect("keyword regex")
}

/// Occurrences of a weighted pattern in lowercased text. Multi-word phrases
/// count once on substring presence; single words count word-boundary hits,
/// capped at 3 per keyword.
pub(crate) fn weighted_occurrences(text: &str, keyword: &str, matcher: &Regex) -> usize {
    if keyword.contains(' ') {
        usize::from(text.contains(keyword))
    } else {
        matcher.find_iter(text).count().min(3)
    }
}
