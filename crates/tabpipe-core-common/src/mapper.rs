//! Bidirectional type mapping.
//!
//! One closed table relates the engine's [`LogicalType`] tags to ClickHouse
//! native type names and to text-cell encodings. Schema resolution uses the
//! native table in both directions; readers and writers use the text
//! encoding rules. Nothing outside this module parses or formats cell
//! values.
//!
//! Text encodings are fixed: `Date` as `YYYY-MM-DD`, `DateTime` as
//! `YYYY-MM-DD HH:MM:SS`, `Bool` as `true`/`false`, `Float64` with no
//! thousands separators and only finite values.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, TransferError};
use crate::types::{Cell, LogicalType, ScalarValue};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
// Parsing tolerates the fractional seconds DateTime64 columns emit.
const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Inference precedence for file schema sampling: the first type every
/// sampled non-null value parses as wins.
pub const INFERENCE_PRECEDENCE: [LogicalType; 6] = [
    LogicalType::Int64,
    LogicalType::Float64,
    LogicalType::Bool,
    LogicalType::Date,
    LogicalType::DateTime,
    LogicalType::String,
];

/// Returns the ClickHouse native type name for a logical type.
///
/// Total over the closed enum; used for CREATE TABLE generation. Nullable
/// wrapping is the writer's concern, not part of this table.
#[must_use]
pub fn to_native(logical_type: LogicalType) -> &'static str {
    match logical_type {
        LogicalType::String => "String",
        LogicalType::Int64 => "Int64",
        LogicalType::Float64 => "Float64",
        LogicalType::Bool => "Bool",
        LogicalType::Date => "Date",
        LogicalType::DateTime => "DateTime",
    }
}

/// Maps a ClickHouse native type name to the closest logical type.
///
/// Returns the logical type and whether the native type was wrapped in
/// `Nullable(…)`. `LowCardinality(…)` wrappers are transparent. Types with
/// no scalar text representation (arrays, maps, tuples, decimals, …) fail
/// with [`TransferError::UnsupportedType`] naming the column; there is no
/// silent coercion to `String`.
///
/// # Errors
///
/// Returns [`TransferError::UnsupportedType`] for native types outside the
/// closed table.
pub fn from_native(column: &str, native: &str) -> Result<(LogicalType, bool)> {
    let trimmed = native.trim();

    if let Some(inner) = strip_wrapper(trimmed, "Nullable") {
        let (logical, _) = from_native(column, inner)?;
        return Ok((logical, true));
    }
    if let Some(inner) = strip_wrapper(trimmed, "LowCardinality") {
        return from_native(column, inner);
    }

    let logical = match trimmed {
        "String" => Some(LogicalType::String),
        "Int8" | "Int16" | "Int32" | "Int64" | "UInt8" | "UInt16" | "UInt32" | "UInt64" => {
            Some(LogicalType::Int64)
        },
        "Float32" | "Float64" => Some(LogicalType::Float64),
        "Bool" => Some(LogicalType::Bool),
        "Date" | "Date32" => Some(LogicalType::Date),
        "DateTime" => Some(LogicalType::DateTime),
        "UUID" => Some(LogicalType::String),
        _ => {
            if trimmed.starts_with("FixedString(") {
                Some(LogicalType::String)
            } else if trimmed.starts_with("DateTime(") || trimmed.starts_with("DateTime64(") {
                Some(LogicalType::DateTime)
            } else if trimmed.starts_with("Enum8(") || trimmed.starts_with("Enum16(") {
                Some(LogicalType::String)
            } else {
                None
            }
        },
    };

    logical.map(|l| (l, false)).ok_or_else(|| TransferError::UnsupportedType {
        column: column.to_string(),
        native_type: trimmed.to_string(),
    })
}

fn strip_wrapper<'a>(native: &'a str, wrapper: &str) -> Option<&'a str> {
    native
        .strip_prefix(wrapper)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Encodes a validated cell as text for a file sink or insert body.
///
/// `Null` is the caller's concern (the empty string for files, `\N` for
/// ClickHouse); this function only encodes typed values.
///
/// # Errors
///
/// Returns [`TransferError::Encoding`] if the value does not conform to the
/// logical type's domain, e.g. a non-finite `Float64` or a tag mismatch.
pub fn encode_cell(column: &str, cell: &ScalarValue, logical_type: LogicalType) -> Result<String> {
    if cell.logical_type() != logical_type {
        return Err(TransferError::Encoding {
            column: column.to_string(),
            logical_type: logical_type.as_str(),
            message: format!("value has type {}", cell.logical_type()),
        });
    }

    match cell {
        ScalarValue::Str(s) => Ok(s.clone()),
        ScalarValue::Int64(v) => Ok(v.to_string()),
        ScalarValue::Float64(v) => {
            if v.is_finite() {
                Ok(v.to_string())
            } else {
                Err(TransferError::Encoding {
                    column: column.to_string(),
                    logical_type: logical_type.as_str(),
                    message: format!("non-finite value {v}"),
                })
            }
        },
        ScalarValue::Bool(v) => Ok(if *v { "true" } else { "false" }.to_string()),
        ScalarValue::Date(v) => Ok(v.format(DATE_FORMAT).to_string()),
        ScalarValue::DateTime(v) => Ok(v.format(DATETIME_FORMAT).to_string()),
    }
}

/// Decodes a cell against a target column.
///
/// The empty string decodes to `Null` for non-`String` columns (delimited
/// files have no other null representation); an explicit `Null` passes
/// through. Either one fails for a non-nullable column, so the lenient /
/// strict row policy applies uniformly to null violations and parse
/// failures.
///
/// # Errors
///
/// Returns [`TransferError::Decoding`] carrying the column name, row index,
/// and raw text on any parse failure or null violation.
pub fn decode_cell(
    column: &str,
    row_index: u64,
    cell: &Cell,
    logical_type: LogicalType,
    nullable: bool,
) -> Result<Cell> {
    let decode_err = |value: &str| TransferError::Decoding {
        column: column.to_string(),
        row_index,
        logical_type: logical_type.as_str(),
        value: value.to_string(),
    };

    let text = match cell {
        Cell::Null => {
            return if nullable {
                Ok(Cell::Null)
            } else {
                Err(decode_err(""))
            };
        },
        // Already validated upstream; accept matching tags, reject the rest.
        Cell::Typed(value) => {
            return if value.logical_type() == logical_type {
                Ok(cell.clone())
            } else {
                Err(decode_err(&format!("{value:?}")))
            };
        },
        Cell::Text(text) => text,
    };

    if text.is_empty() && logical_type != LogicalType::String {
        return if nullable { Ok(Cell::Null) } else { Err(decode_err("")) };
    }

    let value = parse_scalar(text, logical_type).ok_or_else(|| decode_err(text))?;
    Ok(Cell::Typed(value))
}

/// Parses raw text as one logical type; `None` on any mismatch.
///
/// Shared by cell decoding and file schema inference so both agree on what
/// "parses as" means.
#[must_use]
pub fn parse_scalar(text: &str, logical_type: LogicalType) -> Option<ScalarValue> {
    match logical_type {
        LogicalType::String => Some(ScalarValue::Str(text.to_string())),
        LogicalType::Int64 => text.parse::<i64>().ok().map(ScalarValue::Int64),
        LogicalType::Float64 => text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(ScalarValue::Float64),
        LogicalType::Bool => match text {
            "true" | "True" | "TRUE" | "1" => Some(ScalarValue::Bool(true)),
            "false" | "False" | "FALSE" | "0" => Some(ScalarValue::Bool(false)),
            _ => None,
        },
        LogicalType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
            .ok()
            .map(ScalarValue::Date),
        LogicalType::DateTime => NaiveDateTime::parse_from_str(text, DATETIME_PARSE_FORMAT)
            .ok()
            .map(ScalarValue::DateTime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_round_trip() {
        for logical in [
            LogicalType::String,
            LogicalType::Int64,
            LogicalType::Float64,
            LogicalType::Bool,
            LogicalType::Date,
            LogicalType::DateTime,
        ] {
            let native = to_native(logical);
            let (back, nullable) = from_native("c", native).unwrap();
            assert_eq!(back, logical);
            assert!(!nullable);
        }
    }

    #[test]
    fn test_from_native_wrappers() {
        assert_eq!(
            from_native("c", "Nullable(Int32)").unwrap(),
            (LogicalType::Int64, true)
        );
        assert_eq!(
            from_native("c", "LowCardinality(String)").unwrap(),
            (LogicalType::String, false)
        );
        assert_eq!(
            from_native("c", "Nullable(LowCardinality(String))").unwrap(),
            (LogicalType::String, true)
        );
        assert_eq!(
            from_native("c", "FixedString(16)").unwrap(),
            (LogicalType::String, false)
        );
        assert_eq!(
            from_native("c", "DateTime64(3)").unwrap(),
            (LogicalType::DateTime, false)
        );
    }

    #[test]
    fn test_from_native_unsupported() {
        let err = from_native("tags", "Array(String)").unwrap_err();
        assert_eq!(err.kind(), "UnsupportedTypeError");
        assert!(err.to_string().contains("tags"));
        assert!(err.to_string().contains("Array(String)"));

        assert!(from_native("d", "Decimal(18, 4)").is_err());
        assert!(from_native("m", "Map(String, UInt64)").is_err());
    }

    #[test]
    fn test_encode_cell() {
        assert_eq!(
            encode_cell("n", &ScalarValue::Int64(-42), LogicalType::Int64).unwrap(),
            "-42"
        );
        assert_eq!(
            encode_cell("b", &ScalarValue::Bool(false), LogicalType::Bool).unwrap(),
            "false"
        );
        let d = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(
            encode_cell("d", &ScalarValue::Date(d), LogicalType::Date).unwrap(),
            "2024-01-09"
        );
        let dt = d.and_hms_opt(7, 30, 0).unwrap();
        assert_eq!(
            encode_cell("t", &ScalarValue::DateTime(dt), LogicalType::DateTime).unwrap(),
            "2024-01-09 07:30:00"
        );
    }

    #[test]
    fn test_encode_rejects_non_finite() {
        let err =
            encode_cell("x", &ScalarValue::Float64(f64::NAN), LogicalType::Float64).unwrap_err();
        assert_eq!(err.kind(), "EncodingError");
        assert!(
            encode_cell("x", &ScalarValue::Float64(f64::INFINITY), LogicalType::Float64).is_err()
        );
    }

    #[test]
    fn test_encode_rejects_tag_mismatch() {
        let err = encode_cell("x", &ScalarValue::Int64(1), LogicalType::Bool).unwrap_err();
        assert_eq!(err.kind(), "EncodingError");
    }

    #[test]
    fn test_decode_cell_typed_values() {
        let cell = decode_cell("n", 0, &Cell::Text("123".into()), LogicalType::Int64, false)
            .unwrap();
        assert_eq!(cell, Cell::Typed(ScalarValue::Int64(123)));

        let cell = decode_cell(
            "t",
            0,
            &Cell::Text("2024-01-09 07:30:00".into()),
            LogicalType::DateTime,
            false,
        )
        .unwrap();
        assert!(matches!(cell, Cell::Typed(ScalarValue::DateTime(_))));
    }

    #[test]
    fn test_decode_cell_nulls() {
        // Empty text is null for nullable non-String columns
        let cell =
            decode_cell("n", 0, &Cell::Text(String::new()), LogicalType::Int64, true).unwrap();
        assert_eq!(cell, Cell::Null);

        // ...but the empty string for String columns
        let cell =
            decode_cell("s", 0, &Cell::Text(String::new()), LogicalType::String, false).unwrap();
        assert_eq!(cell, Cell::Typed(ScalarValue::Str(String::new())));

        // Null violations carry the row/column context
        let err = decode_cell("n", 9, &Cell::Null, LogicalType::Int64, false).unwrap_err();
        assert_eq!(err.kind(), "DecodingError");
        assert!(err.to_string().contains("row 9"));
    }

    #[test]
    fn test_decode_cell_parse_failure() {
        let err =
            decode_cell("age", 3, &Cell::Text("abc".into()), LogicalType::Int64, true).unwrap_err();
        assert_eq!(err.kind(), "DecodingError");
        assert!(err.to_string().contains("\"abc\""));
    }

    #[test]
    fn test_parse_scalar_precedence_members() {
        // "1" is an Int64 before it is a Float64 or Bool under the fixed precedence
        assert!(parse_scalar("1", LogicalType::Int64).is_some());
        assert!(parse_scalar("1.5", LogicalType::Int64).is_none());
        assert!(parse_scalar("1.5", LogicalType::Float64).is_some());
        assert!(parse_scalar("nan", LogicalType::Float64).is_none());
        assert!(parse_scalar("true", LogicalType::Bool).is_some());
        assert!(parse_scalar("2024-02-30", LogicalType::Date).is_none());
    }
}
