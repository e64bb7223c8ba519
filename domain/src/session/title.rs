//! Session title derivation.

/// Maximum title length in characters, ellipsis excluded.
const TITLE_MAX_CHARS: usize = 24;

/// Derive a short session title from the first user message.
///
/// Whitespace runs collapse to single spaces and the result is truncated
/// on a character boundary with a trailing ellipsis. Called exactly once
/// per session, when the first user turn lands — titles are never
/// recomputed afterwards.
pub fn session_title_from(first_user_text: &str) -> String {
    let collapsed = first_user_text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}…", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_kept_verbatim() {
        assert_eq!(session_title_from("I feel anxious today"), "I feel anxious today");
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(session_title_from("  I   feel\n anxious "), "I feel anxious");
    }

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let title = session_title_from(
            "I have been feeling overwhelmed at work for the last few weeks",
        );
        assert!(title.ends_with('…'));
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
    }

    #[test]
    fn multibyte_text_truncates_on_char_boundary() {
        let title = session_title_from(&"こ".repeat(40));
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
    }
}
