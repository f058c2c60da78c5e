//! Identifier validation for statement composition.
//!
//! Table and column names are the only user-controlled text that ever
//! reaches an executable statement, so they must match a strict allow-listed
//! grammar first: letters, digits, and underscores, not starting with a
//! digit. Raw user text is never interpolated.

use crate::error::{Result, TransferError};

/// Returns `true` if `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates an identifier before it is composed into a statement.
///
/// # Errors
///
/// Returns [`TransferError::Schema`] naming the offending identifier.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(TransferError::Schema {
            subject: name.to_string(),
            message: format!(
                "{kind} name must contain only letters, digits, and underscores and must not \
                 start with a digit"
            ),
        })
    }
}

/// Validates every identifier in a list.
///
/// # Errors
///
/// Returns [`TransferError::Schema`] for the first invalid name.
pub fn validate_identifiers<'a, I>(kind: &str, names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for name in names {
        validate_identifier(kind, name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_allow_listed_grammar() {
        assert!(is_valid_identifier("users"));
        assert!(is_valid_identifier("_tmp"));
        assert!(is_valid_identifier("order_items_2024"));
        assert!(is_valid_identifier("C"));
    }

    #[test]
    fn test_rejects_everything_else() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier("a b"));
        assert!(!is_valid_identifier("tab;DROP TABLE x"));
        assert!(!is_valid_identifier("naïve"));
        assert!(!is_valid_identifier("a.b"));
    }

    #[test]
    fn test_validate_reports_kind() {
        let err = validate_identifier("table", "x;y").unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
        assert!(err.to_string().contains("x;y"));

        assert!(validate_identifiers("column", ["id", "name"]).is_ok());
        assert!(validate_identifiers("column", ["id", "na me"]).is_err());
    }
}
