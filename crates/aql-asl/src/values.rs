//! Literal values: conversion to SQL values and DV_ORDERED magnitudes

use crate::model::{ColumnType, SqlValue};
use aql_ast::{Primitive, TemporalKind, TemporalPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

/// DV_ORDERED types compared by a numeric magnitude
pub const NUMERIC_DV_ORDERED: [&str; 5] = [
    "DV_ORDINAL",
    "DV_SCALE",
    "DV_PROPORTION",
    "DV_COUNT",
    "DV_QUANTITY",
];

pub const DV_DATE: &str = "DV_DATE";
pub const DV_DATE_TIME: &str = "DV_DATE_TIME";
pub const DV_TIME: &str = "DV_TIME";
pub const DV_DURATION: &str = "DV_DURATION";

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;
/// 30.436875 days
const SECONDS_PER_MONTH: i64 = 2_629_746;
/// 365.2425 days
const SECONDS_PER_YEAR: i64 = 31_556_952;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-)?P(?:([0-9]+(?:[.,][0-9]+)?)Y)?(?:([0-9]+(?:[.,][0-9]+)?)M)?(?:([0-9]+(?:[.,][0-9]+)?)W)?(?:([0-9]+(?:[.,][0-9]+)?)D)?(?:T(?:([0-9]+(?:[.,][0-9]+)?)H)?(?:([0-9]+(?:[.,][0-9]+)?)M)?(?:([0-9]+(?:[.,][0-9]+)?)S)?)?$",
    )
    .expect("valid duration pattern")
});

/// The SQL value of a literal; temporal literals keep their text
pub fn primitive_value(primitive: &Primitive) -> SqlValue {
    match primitive {
        Primitive::String(s) => SqlValue::Text(s.clone()),
        Primitive::Long(v) => SqlValue::Long(*v),
        Primitive::Double(v) => SqlValue::Numeric(*v),
        Primitive::Boolean(v) => SqlValue::Boolean(*v),
        Primitive::Temporal(t) => SqlValue::Text(t.text.clone()),
    }
}

/// Convert a value for comparison with a column of the given type.
///
/// `None` means no row of the column can be equal to the value.
pub fn coerce_value(column_type: ColumnType, value: &SqlValue) -> Option<SqlValue> {
    match (column_type, value) {
        (ColumnType::Jsonb, v) => Some(v.clone()),
        (ColumnType::Text, SqlValue::Text(_))
        | (ColumnType::Integer, SqlValue::Long(_))
        | (ColumnType::Uuid | ColumnType::UuidArray, SqlValue::Uuid(_))
        | (ColumnType::Timestamp, SqlValue::Timestamp(_)) => Some(value.clone()),
        (ColumnType::Uuid | ColumnType::UuidArray, SqlValue::Text(s)) => {
            Uuid::parse_str(s).ok().map(SqlValue::Uuid)
        }
        (ColumnType::Timestamp, SqlValue::Text(s)) => parse_timestamp(s).map(SqlValue::Timestamp),
        _ => None,
    }
}

/// Parse an ISO-8601 date or date-time; missing offsets are UTC
pub fn parse_timestamp(text: &str) -> Option<DateTime<chrono::FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(naive.and_utc().fixed_offset())
}

/// A literal expressed as the magnitude of DV_ORDERED values
#[derive(Debug, Clone, PartialEq)]
pub struct DvOrderedMagnitude {
    /// Types whose magnitude is comparable with the literal
    pub types: Vec<&'static str>,
    pub magnitude: Decimal,
}

/// The magnitude a literal is compared with, if it can be compared with DV_ORDERED values
pub fn dv_ordered_magnitude(primitive: &Primitive) -> Option<DvOrderedMagnitude> {
    match primitive {
        Primitive::Long(v) => Some(DvOrderedMagnitude {
            types: NUMERIC_DV_ORDERED.to_vec(),
            magnitude: Decimal::from(*v),
        }),
        Primitive::Double(v) => Some(DvOrderedMagnitude {
            types: NUMERIC_DV_ORDERED.to_vec(),
            magnitude: *v,
        }),
        Primitive::Temporal(t) => temporal_magnitude(t),
        Primitive::String(s) => iso_duration_seconds(s).map(|magnitude| DvOrderedMagnitude {
            types: vec![DV_DURATION],
            magnitude,
        }),
        Primitive::Boolean(_) => None,
    }
}

fn temporal_magnitude(temporal: &TemporalPrimitive) -> Option<DvOrderedMagnitude> {
    let text = temporal.text.as_str();
    let (rm_type, magnitude) = match temporal.kind {
        TemporalKind::Date => {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
            (DV_DATE, Decimal::from((date - epoch).num_days()))
        }
        TemporalKind::DateTime => {
            let dt = parse_timestamp(text)?;
            let seconds = Decimal::from(dt.timestamp());
            let fraction = Decimal::new(i64::from(dt.timestamp_subsec_nanos()), 9);
            (DV_DATE_TIME, (seconds + fraction).normalize())
        }
        TemporalKind::Time => {
            let time = parse_time(text)?;
            let seconds = Decimal::from(time.num_seconds_from_midnight());
            let fraction = Decimal::new(i64::from(time.nanosecond()), 9);
            (DV_TIME, (seconds + fraction).normalize())
        }
    };
    Some(DvOrderedMagnitude {
        types: vec![rm_type],
        magnitude,
    })
}

/// Time of day; a zone designator is ignored
fn parse_time(text: &str) -> Option<NaiveTime> {
    let local = text
        .strip_suffix('Z')
        .or_else(|| text.rfind(['+', '-']).map(|idx| &text[..idx]))
        .unwrap_or(text);
    NaiveTime::parse_from_str(local, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(local, "%H:%M"))
        .ok()
}

/// Length of an ISO-8601 duration in seconds
pub fn iso_duration_seconds(text: &str) -> Option<Decimal> {
    if text.ends_with('T') {
        return None;
    }
    let captures = ISO_DURATION.captures(text)?;
    let units = [
        SECONDS_PER_YEAR,
        SECONDS_PER_MONTH,
        SECONDS_PER_WEEK,
        SECONDS_PER_DAY,
        SECONDS_PER_HOUR,
        SECONDS_PER_MINUTE,
        1,
    ];
    let mut total = Decimal::ZERO;
    let mut any = false;
    for (group, unit) in (2..).zip(units) {
        let Some(m) = captures.get(group) else {
            continue;
        };
        let amount = Decimal::from_str(&m.as_str().replace(',', ".")).ok()?;
        total = total.checked_add(amount.checked_mul(Decimal::from(unit))?)?;
        any = true;
    }
    if !any {
        return None;
    }
    if captures.get(1).is_some() {
        total = -total;
    }
    Some(total.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("PT1H", 3_600)]
    #[case("P1D", 86_400)]
    #[case("P2W", 1_209_600)]
    #[case("P1Y", 31_556_952)]
    #[case("P1M", 2_629_746)]
    #[case("P1DT1M", 86_460)]
    #[case("-PT30S", -30)]
    fn test_durations(#[case] text: &str, #[case] seconds: i64) {
        assert_eq!(iso_duration_seconds(text), Some(Decimal::from(seconds)));
    }

    #[rstest]
    #[case("P")]
    #[case("PT")]
    #[case("1D")]
    #[case("P1H")]
    fn test_invalid_durations(#[case] text: &str) {
        assert_eq!(iso_duration_seconds(text), None);
    }

    #[test]
    fn test_fractional_duration() {
        assert_eq!(iso_duration_seconds("PT1.5S"), Some(Decimal::new(15, 1)));
    }

    #[test]
    fn test_temporal_magnitudes() {
        let date = dv_ordered_magnitude(&Primitive::from_string("1970-01-11")).unwrap();
        assert_eq!(date.types, vec![DV_DATE]);
        assert_eq!(date.magnitude, Decimal::from(10));

        let date_time =
            dv_ordered_magnitude(&Primitive::from_string("1970-01-01T00:01:00Z")).unwrap();
        assert_eq!(date_time.types, vec![DV_DATE_TIME]);
        assert_eq!(date_time.magnitude, Decimal::from(60));

        let time = dv_ordered_magnitude(&Primitive::from_string("01:00:00")).unwrap();
        assert_eq!(time.types, vec![DV_TIME]);
        assert_eq!(time.magnitude, Decimal::from(3_600));
    }

    #[test]
    fn test_numeric_magnitude() {
        let m = dv_ordered_magnitude(&Primitive::Long(3)).unwrap();
        assert_eq!(m.types.len(), NUMERIC_DV_ORDERED.len());
        assert_eq!(m.magnitude, Decimal::from(3));
        assert_eq!(dv_ordered_magnitude(&Primitive::String("abc".into())), None);
        assert_eq!(dv_ordered_magnitude(&Primitive::Boolean(true)), None);
    }

    #[test]
    fn test_coerce_values() {
        let id = "6e3b3a4c-1d52-4b8a-9c7f-2f5a1c0e9d11";
        assert_eq!(
            coerce_value(ColumnType::Uuid, &SqlValue::Text(id.into())),
            Some(SqlValue::Uuid(Uuid::parse_str(id).unwrap()))
        );
        assert_eq!(coerce_value(ColumnType::Uuid, &SqlValue::Text("x".into())), None);
        assert_eq!(coerce_value(ColumnType::Text, &SqlValue::Long(1)), None);
        assert_eq!(
            coerce_value(ColumnType::Jsonb, &SqlValue::Long(1)),
            Some(SqlValue::Long(1))
        );
        assert!(matches!(
            coerce_value(ColumnType::Timestamp, &SqlValue::Text("2024-01-01".into())),
            Some(SqlValue::Timestamp(_))
        ));
    }
}
