/// Truncate to at most `max_chars` characters, never splitting a character.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_untouched() {
        assert_eq!(truncate_chars("exit 1", 200), "exit 1");
    }

    #[test]
    fn test_truncate_long_string() {
        let long = "x".repeat(300);
        assert_eq!(truncate_chars(&long, 200).len(), 200);
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_chars("⚠️⚠️⚠️", 2), "⚠️");
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }
}
