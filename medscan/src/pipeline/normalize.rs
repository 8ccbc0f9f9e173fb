//! Text normalization between OCR and entity extraction.

/// Prepare raw OCR output for the extraction stage.
///
/// Every `"` becomes `\"` and every line break (`\n` or `\r\n`) becomes a single space, in one
/// pass. Applying this twice is not the same as applying it once.
pub fn normalize_text(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len() + raw.len() / 8);
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => normalized.push_str("\\\""),
            '\n' => normalized.push(' '),
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                normalized.push(' ');
            }
            other => normalized.push(other),
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_quotes_and_collapses_newlines() {
        assert_eq!(normalize_text("He said \"ok\"\ntake 1"), r#"He said \"ok\" take 1"#);
    }

    #[test]
    fn test_each_newline_becomes_one_space() {
        assert_eq!(normalize_text("a\n\nb"), "a  b");
        assert_eq!(normalize_text("a\r\nb"), "a b");
    }

    #[test]
    fn test_single_pass_only() {
        let once = normalize_text("\"x\"");
        assert_eq!(once, r#"\"x\""#);
        assert_eq!(normalize_text(&once), r#"\\"x\\""#);
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(normalize_text("Paracetamol 500mg"), "Paracetamol 500mg");
        assert_eq!(normalize_text(""), "");
    }
}
