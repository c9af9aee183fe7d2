//! Literal values

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::fmt;

/// A literal value in a query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Single-quoted string
    String(String),
    /// Integer literal
    Long(i64),
    /// Real literal
    Double(Decimal),
    /// `true` / `false`
    Boolean(bool),
    /// Date, time or date-time literal (written as a string)
    Temporal(TemporalPrimitive),
}

/// Kind of temporal literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalKind {
    Date,
    Time,
    DateTime,
}

/// Temporal literal, keeps its original ISO-8601 text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemporalPrimitive {
    pub text: String,
    pub kind: TemporalKind,
}

impl TemporalPrimitive {
    /// Detect an ISO-8601 date, time or date-time
    pub fn detect(text: &str) -> Option<Self> {
        let kind = if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok() {
            TemporalKind::Date
        } else if DateTime::parse_from_rfc3339(text).is_ok()
            || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
            || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M").is_ok()
        {
            TemporalKind::DateTime
        } else if NaiveTime::parse_from_str(text, "%H:%M:%S%.f").is_ok()
            || NaiveTime::parse_from_str(text, "%H:%M").is_ok()
            || strip_time_zone(text)
                .is_some_and(|t| NaiveTime::parse_from_str(t, "%H:%M:%S%.f").is_ok())
        {
            TemporalKind::Time
        } else {
            return None;
        };
        Some(Self {
            text: text.to_string(),
            kind,
        })
    }
}

fn strip_time_zone(text: &str) -> Option<&str> {
    if let Some(t) = text.strip_suffix('Z') {
        return Some(t);
    }
    let idx = text.rfind(['+', '-'])?;
    Some(&text[..idx])
}

impl Primitive {
    /// A string literal, promoted to a temporal literal when it is ISO-8601
    pub fn from_string(value: impl Into<String>) -> Self {
        let value = value.into();
        match TemporalPrimitive::detect(&value) {
            Some(t) => Primitive::Temporal(t),
            None => Primitive::String(value),
        }
    }

    /// The value as text if it is a string or temporal literal
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Primitive::String(s) => Some(s),
            Primitive::Temporal(t) => Some(&t.text),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Primitive::Long(_) | Primitive::Double(_))
    }

    /// Name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::String(_) => "String",
            Primitive::Long(_) => "Long",
            Primitive::Double(_) => "Double",
            Primitive::Boolean(_) => "Boolean",
            Primitive::Temporal(_) => "Temporal",
        }
    }
}

impl From<&str> for Primitive {
    fn from(s: &str) -> Self {
        Primitive::String(s.to_string())
    }
}

impl From<i64> for Primitive {
    fn from(v: i64) -> Self {
        Primitive::Long(v)
    }
}

impl From<bool> for Primitive {
    fn from(v: bool) -> Self {
        Primitive::Boolean(v)
    }
}

/// Render a string as a single-quoted AQL literal
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::String(s) => f.write_str(&quote_string(s)),
            Primitive::Long(v) => write!(f, "{v}"),
            Primitive::Double(v) => write!(f, "{v}"),
            Primitive::Boolean(v) => write!(f, "{v}"),
            Primitive::Temporal(t) => f.write_str(&quote_string(&t.text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2024-02-29", Some(TemporalKind::Date))]
    #[case("2024-02-29T10:15:00", Some(TemporalKind::DateTime))]
    #[case("2024-02-29T10:15:00.123+01:00", Some(TemporalKind::DateTime))]
    #[case("10:15:00", Some(TemporalKind::Time))]
    #[case("10:15:00Z", Some(TemporalKind::Time))]
    #[case("10:15", Some(TemporalKind::Time))]
    #[case("Systolic", None)]
    #[case("2024-13-01", None)]
    fn test_temporal_detection(#[case] text: &str, #[case] expected: Option<TemporalKind>) {
        assert_eq!(TemporalPrimitive::detect(text).map(|t| t.kind), expected);
    }

    #[test]
    fn test_render_string_escapes_quotes() {
        assert_eq!(Primitive::from("O'Neil").to_string(), r"'O\'Neil'");
        assert_eq!(Primitive::Long(42).to_string(), "42");
    }
}
