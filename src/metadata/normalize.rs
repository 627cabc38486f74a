use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|\r|\n").expect("Failed to compile line break regex"));

/// Makes a provider string safe to drop into a double-quoted template value.
///
/// - Collapses every line break into a single space
/// - Escapes backslashes, then double quotes
/// - Trims surrounding whitespace
pub fn normalize_text(value: &str) -> String {
    escape_quoted(&LINE_BREAKS.replace_all(value.trim(), " "))
}

/// Escapes backslashes, then double quotes.
pub fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Reverses the escaping done by [`normalize_text`].
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_line_breaks() {
        assert_eq!(normalize_text("a\nb\r\nc\rd"), "a b c d");
    }

    #[test]
    fn test_escapes_quotes_and_backslashes() {
        assert_eq!(normalize_text(r#"He said "C:\temp""#), r#"He said \"C:\\temp\""#);
    }

    #[test]
    fn test_trims() {
        assert_eq!(normalize_text("  padded \n"), "padded");
    }

    #[test]
    fn test_unescape_reverses_normalize() {
        let raw = r#"quote " and slash \ here"#;
        assert_eq!(unescape_text(&normalize_text(raw)), raw);
    }
}
