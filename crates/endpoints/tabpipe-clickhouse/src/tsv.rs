//! TabSeparated field encoding.
//!
//! ClickHouse's `TabSeparated` format escapes tab, newline, carriage
//! return, and backslash inside fields and writes nulls as `\N`. Rows are
//! newline-terminated, so a line-oriented reader stays correct as long as
//! these escapes are applied symmetrically.

/// The TabSeparated null marker.
pub const NULL_MARKER: &str = "\\N";

/// Escapes one field for a TabSeparated row.
#[must_use]
pub fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverses [`escape`], tolerating the other escapes ClickHouse emits
/// (`\b`, `\f`, `\0`, quotes) by mapping unknown pairs to the escaped
/// character.
#[must_use]
pub fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Splits one TabSeparated line into unescaped fields, `None` for `\N`.
#[must_use]
pub fn split_line(line: &str) -> Vec<Option<String>> {
    line.split('\t')
        .map(|field| {
            if field == NULL_MARKER {
                None
            } else {
                Some(unescape(field))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        for raw in ["plain", "tab\there", "line\nbreak", "back\\slash", "cr\rlf"] {
            assert_eq!(unescape(&escape(raw)), raw);
        }
    }

    #[test]
    fn test_escape_keeps_lines_intact() {
        assert_eq!(escape("a\nb"), "a\\nb");
        assert!(!escape("a\tb\nc").contains('\n'));
        assert!(!escape("a\tb\nc").contains('\t'));
    }

    #[test]
    fn test_split_line() {
        assert_eq!(
            split_line("1\tall\\tthe\ttext"),
            vec![
                Some("1".to_string()),
                Some("all\tthe".to_string()),
                Some("text".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_line_null_marker() {
        assert_eq!(split_line("\\N"), vec![None]);
        assert_eq!(
            split_line("a\t\\N\tb"),
            vec![Some("a".to_string()), None, Some("b".to_string())]
        );
    }

    #[test]
    fn test_unescape_tolerates_extra_escapes() {
        assert_eq!(unescape("a\\'b"), "a'b");
        assert_eq!(unescape("end\\"), "end\\");
        assert_eq!(unescape("\\0"), "\0");
    }

    #[test]
    fn test_empty_field_is_not_null() {
        assert_eq!(split_line("a\t\tb").len(), 3);
        assert_eq!(split_line("a\t\tb")[1], Some(String::new()));
    }
}
