// sql/formatter.rs
// Identifier quoting and scalar literal rendering. Everything here is pure.

use crate::db::models::SqlValue;
use crate::error::FormatError;
use chrono::{Datelike, NaiveDate};

/// How a declared column type is rendered as a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Numeric,
    Boolean,
    Temporal,
    Binary,
    Text,
    /// Unrecognised type; rendered with textual escaping.
    Other,
}

/// Declared type name → literal class. Names are matched lowercase with any
/// `(...)` modifier stripped.
const TYPE_CLASSES: &[(&str, TypeClass)] = &[
    ("smallint", TypeClass::Numeric),
    ("int2", TypeClass::Numeric),
    ("integer", TypeClass::Numeric),
    ("int", TypeClass::Numeric),
    ("int4", TypeClass::Numeric),
    ("bigint", TypeClass::Numeric),
    ("int8", TypeClass::Numeric),
    ("smallserial", TypeClass::Numeric),
    ("serial", TypeClass::Numeric),
    ("bigserial", TypeClass::Numeric),
    ("numeric", TypeClass::Numeric),
    ("decimal", TypeClass::Numeric),
    ("real", TypeClass::Numeric),
    ("float4", TypeClass::Numeric),
    ("double precision", TypeClass::Numeric),
    ("float8", TypeClass::Numeric),
    ("boolean", TypeClass::Boolean),
    ("bool", TypeClass::Boolean),
    ("date", TypeClass::Temporal),
    ("timestamp", TypeClass::Temporal),
    ("timestamp without time zone", TypeClass::Temporal),
    ("timestamptz", TypeClass::Temporal),
    ("timestamp with time zone", TypeClass::Temporal),
    ("time", TypeClass::Temporal),
    ("time without time zone", TypeClass::Temporal),
    ("timetz", TypeClass::Temporal),
    ("time with time zone", TypeClass::Temporal),
    ("bytea", TypeClass::Binary),
    ("text", TypeClass::Text),
    ("character varying", TypeClass::Text),
    ("varchar", TypeClass::Text),
    ("character", TypeClass::Text),
    ("char", TypeClass::Text),
    ("bpchar", TypeClass::Text),
    ("name", TypeClass::Text),
    ("citext", TypeClass::Text),
    ("json", TypeClass::Text),
    ("jsonb", TypeClass::Text),
    ("uuid", TypeClass::Text),
    ("xml", TypeClass::Text),
];

impl TypeClass {
    pub fn classify(declared_type: &str) -> TypeClass {
        let lowered = declared_type.trim().to_lowercase();
        let base = match lowered.find('(') {
            Some(idx) => {
                // "timestamp(3) with time zone" keeps its suffix
                let close = lowered[idx..].find(')').map(|c| idx + c + 1);
                let suffix = close.map(|c| lowered[c..].trim()).unwrap_or("");
                let head = lowered[..idx].trim();
                if suffix.is_empty() {
                    head.to_string()
                } else {
                    format!("{} {}", head, suffix)
                }
            }
            None => lowered,
        };
        TYPE_CLASSES
            .iter()
            .find(|(name, _)| *name == base)
            .map(|(_, class)| *class)
            .unwrap_or(TypeClass::Other)
    }
}

/// Wrap an identifier in double quotes, doubling embedded quotes. Always
/// quotes, so mixed case, spaces and reserved words survive unchanged.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."name"`
pub fn qualify(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(name))
}

/// Single-quoted string literal. Values containing a backslash use the
/// `E'...'` form so they read back identically whatever
/// `standard_conforming_strings` is set to.
pub fn text_literal(value: &str) -> String {
    let quoted = value.replace('\'', "''");
    if value.contains('\\') {
        format!("E'{}'", quoted.replace('\\', "\\\\"))
    } else {
        format!("'{}'", quoted)
    }
}

/// `'\x...'` bytea literal.
pub fn hex_literal(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("'\\x{}'", hex)
}

/// Render a value for a column of the given declared type.
pub fn format_literal(value: &SqlValue, declared_type: &str) -> Result<String, FormatError> {
    format_classified(value, TypeClass::classify(declared_type))
}

/// Render a value for an already classified column.
pub fn format_classified(value: &SqlValue, class: TypeClass) -> Result<String, FormatError> {
    if value.is_null() {
        return Ok("NULL".to_string());
    }
    match class {
        TypeClass::Numeric => format_numeric(value),
        TypeClass::Boolean => format_boolean(value),
        // Temporal and binary values render quoted through their own variants
        TypeClass::Temporal | TypeClass::Binary | TypeClass::Text | TypeClass::Other => {
            Ok(format_textual(value))
        }
    }
}

fn format_numeric(value: &SqlValue) -> Result<String, FormatError> {
    match value {
        SqlValue::Int(i) => Ok(i.to_string()),
        SqlValue::Float(f) if f.is_finite() => Ok(f.to_string()),
        SqlValue::Float(f) => Err(FormatError::new(format!("not a finite number: {}", f))),
        SqlValue::Text(s) if is_decimal_literal(s) => Ok(s.trim().to_string()),
        SqlValue::Text(s) => Err(FormatError::new(format!("not a decimal number: {:?}", s))),
        other => Err(FormatError::new(format!(
            "cannot render {:?} as a number",
            other
        ))),
    }
}

fn format_boolean(value: &SqlValue) -> Result<String, FormatError> {
    let truth = match value {
        SqlValue::Bool(b) => Some(*b),
        SqlValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "t" | "true" => Some(true),
            "f" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    };
    match truth {
        Some(true) => Ok("TRUE".to_string()),
        Some(false) => Ok("FALSE".to_string()),
        None => Err(FormatError::new(format!(
            "cannot render {:?} as a boolean",
            value
        ))),
    }
}

/// Fallback for every non-numeric, non-boolean value: never drops data.
fn format_textual(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(s) => text_literal(s),
        SqlValue::Bytes(b) => hex_literal(b),
        SqlValue::Bool(b) => text_literal(if *b { "true" } else { "false" }),
        SqlValue::Int(i) => text_literal(&i.to_string()),
        SqlValue::Float(f) => text_literal(&f.to_string()),
        SqlValue::Date(d) => {
            let (day, era) = calendar_date(d);
            text_literal(&format!("{}{}", day, era))
        }
        SqlValue::Time(t) => text_literal(&t.format("%H:%M:%S%.f").to_string()),
        SqlValue::Timestamp(ts) => {
            let (day, era) = calendar_date(&ts.date());
            text_literal(&format!("{} {}{}", day, ts.format("%H:%M:%S%.f"), era))
        }
        SqlValue::TimestampTz(ts) if ts.year() > 0 => text_literal(&ts.to_rfc3339()),
        SqlValue::TimestampTz(ts) => {
            let (day, era) = calendar_date(&ts.date_naive());
            text_literal(&format!("{} {}+00{}", day, ts.format("%H:%M:%S%.f"), era))
        }
    }
}

/// `YYYY-MM-DD` plus the era suffix PostgreSQL expects. chrono counts year 0
/// as 1 BC; PostgreSQL has no year 0 and rejects a negative year.
fn calendar_date(date: &NaiveDate) -> (String, &'static str) {
    if date.year() > 0 {
        (date.format("%Y-%m-%d").to_string(), "")
    } else {
        (
            format!("{:04}-{:02}-{:02}", 1 - date.year(), date.month(), date.day()),
            " BC",
        )
    }
}

/// `[+-]digits[.digits][e[+-]digits]`, at least one digit in the mantissa.
fn is_decimal_literal(s: &str) -> bool {
    let s = s.trim();
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
        None => (s, None),
    };
    let mut parts = mantissa.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next().unwrap_or("");
    let digits_ok = int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit())
        && !(int_part.is_empty() && frac_part.is_empty());
    let exponent_ok = match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && exp.chars().all(|c| c.is_ascii_digit())
        }
    };
    digits_ok && exponent_ok
}
