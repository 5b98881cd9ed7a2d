//! Text helpers exposed to templates.

use quire_core::{Helper, Value};

/// `shorten(content, length)`: plain-text excerpt of at most `length`
/// characters, marked safe.
pub fn shorten_helper() -> Helper {
    Helper::new("shorten", |args| {
        let content = args.first().map(Value::to_text).unwrap_or_default();
        let length = match args.get(1) {
            Some(value) => value
                .as_i64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| format!("shorten: length must be a positive integer, got {}", value.kind()))?,
            None => 160,
        };
        let excerpt = truncate_at_word_boundary(&strip_html(&content), length);
        Ok(Value::Safe(escape_html(&excerpt)))
    })
}

/// `safe(value)`: mark a string as pre-sanitized HTML.
pub fn safe_helper() -> Helper {
    Helper::new("safe", |args| match args.first() {
        Some(value) => Ok(Value::Safe(value.to_text().into_owned())),
        None => Err("safe: expected one argument".to_string()),
    })
}

/// Escape text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Strip HTML tags from content.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

/// Truncate text at word boundary, respecting UTF-8 character boundaries.
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    let truncated = &text[..cut];

    match truncated.rfind(' ') {
        Some(space) if space > 0 => format!("{}...", &truncated[..space]),
        _ => format!("{truncated}..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Hello <strong>World</strong></p>"),
            "Hello World"
        );
        assert_eq!(strip_html("No tags here"), "No tags here");
    }

    #[test]
    fn test_truncate_at_word_boundary() {
        let text = "Hello world this is a test";
        assert_eq!(truncate_at_word_boundary(text, 100), text);
        assert_eq!(truncate_at_word_boundary(text, 11), "Hello...");
        assert_eq!(truncate_at_word_boundary(text, 12), "Hello world...");

        let chinese_text = "你好世界 Hello World";
        assert_eq!(truncate_at_word_boundary(chinese_text, 7), "你好世界...");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_shorten_returns_safe_excerpt() {
        let helper = shorten_helper();
        let out = helper
            .call(&[Value::from("<p>One two three four</p>"), Value::Int(9)])
            .unwrap();
        assert_eq!(out, Value::Safe("One two...".to_string()));
        assert!(matches!(out, Value::Safe(_)));
    }

    #[test]
    fn test_shorten_escapes_after_truncating() {
        let helper = shorten_helper();
        let out = helper
            .call(&[Value::from("ab&cd"), Value::Int(4)])
            .unwrap();
        assert_eq!(out, Value::Safe("ab&amp;c...".to_string()));

        let out = helper
            .call(&[Value::from("Tom & Jerry go"), Value::Int(11)])
            .unwrap();
        assert_eq!(out, Value::Safe("Tom &amp;...".to_string()));
    }

    #[test]
    fn test_shorten_rejects_bad_length() {
        let helper = shorten_helper();
        let err = helper
            .call(&[Value::from("text"), Value::from("ten")])
            .unwrap_err();
        assert!(err.contains("length"));
    }

    #[test]
    fn test_safe_marks_value() {
        let out = safe_helper().call(&[Value::from("<b>x</b>")]).unwrap();
        assert!(matches!(out, Value::Safe(ref s) if s == "<b>x</b>"));
        assert!(safe_helper().call(&[]).is_err());
    }
}
