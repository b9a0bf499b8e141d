//! Outbound text helpers. All user-visible messages are Telegram HTML.

/// Escape user-provided text for inclusion in an HTML message.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Truncate to `max` characters, appending an ellipsis when trimmed.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = s.chars().take(max).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(
            escape_html(r#"<b>"a" & b</b>"#),
            "&lt;b&gt;&quot;a&quot; &amp; b&lt;/b&gt;"
        );
    }

    #[test]
    fn truncation_is_char_based() {
        // Multibyte characters must not be split.
        let s = "ééééé";
        assert_eq!(truncate_chars(s, 3), "ééé...");
        assert_eq!(truncate_chars(s, 5), s);
    }
}
