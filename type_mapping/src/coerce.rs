//! Read-side coercion
//!
//! Converts a raw column value, or the absence of one, into the exact type of
//! an entity field. Absent values follow a fixed policy: text becomes an empty
//! string, value types become their default, optional types stay empty.

use crate::errors::CoercionError;
use crate::normalize::SqlEnum;
use crate::types::SqlValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

/// Types that can be assigned from a raw column value
pub trait FromSqlValue: Sized {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError>;
}

/// Coerce a raw value into `T`
pub fn coerce<T: FromSqlValue>(raw: Option<SqlValue>) -> Result<T, CoercionError> {
    T::from_sql_value(raw)
}

/// A write-side `Null` marker read back is treated like an absent value
#[inline]
fn present(raw: Option<SqlValue>) -> Option<SqlValue> {
    raw.filter(|value| !value.is_null())
}

fn float_to_i64(target: &'static str, value: f64) -> Result<i64, CoercionError> {
    let rounded = value.round_ties_even();
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Ok(rounded as i64)
    } else {
        Err(CoercionError::out_of_range(target, value))
    }
}

fn to_i64(target: &'static str, raw: SqlValue) -> Result<i64, CoercionError> {
    match raw {
        SqlValue::SmallInt(v) => Ok(v.into()),
        SqlValue::Integer(v) => Ok(v.into()),
        SqlValue::BigInt(v) => Ok(v),
        SqlValue::Boolean(v) => Ok(v as i64),
        SqlValue::Decimal(v) => v
            .round()
            .to_i64()
            .ok_or_else(|| CoercionError::out_of_range(target, v)),
        SqlValue::Double(v) => float_to_i64(target, v),
        SqlValue::Real(v) => float_to_i64(target, v as f64),
        SqlValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| CoercionError::parse(target, &s)),
        other => Err(CoercionError::unsupported(target, &other)),
    }
}

fn to_f64(target: &'static str, raw: SqlValue) -> Result<f64, CoercionError> {
    match raw {
        SqlValue::SmallInt(v) => Ok(v.into()),
        SqlValue::Integer(v) => Ok(v.into()),
        SqlValue::BigInt(v) => Ok(v as f64),
        SqlValue::Boolean(v) => Ok(if v { 1.0 } else { 0.0 }),
        SqlValue::Decimal(v) => v
            .to_f64()
            .ok_or_else(|| CoercionError::out_of_range(target, v)),
        SqlValue::Double(v) => Ok(v),
        SqlValue::Real(v) => Ok(v.into()),
        SqlValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CoercionError::parse(target, &s)),
        other => Err(CoercionError::unsupported(target, &other)),
    }
}

macro_rules! impl_integer {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FromSqlValue for $ty {
            fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
                match present(raw) {
                    None => Ok(<$ty>::default()),
                    Some(SqlValue::$variant(v)) => Ok(v),
                    Some(other) => {
                        let wide = to_i64($name, other)?;
                        <$ty>::try_from(wide).map_err(|_| CoercionError::out_of_range($name, wide))
                    }
                }
            }
        }
    };
}

impl_integer!(i16, SmallInt, "i16");
impl_integer!(i32, Integer, "i32");
impl_integer!(i64, BigInt, "i64");

impl FromSqlValue for f64 {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(0.0),
            Some(value) => to_f64("f64", value),
        }
    }
}

impl FromSqlValue for f32 {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(0.0),
            Some(SqlValue::Real(v)) => Ok(v),
            Some(value) => {
                let wide = to_f64("f32", value)?;
                let narrow = wide as f32;
                if wide.is_finite() && narrow.is_infinite() {
                    Err(CoercionError::out_of_range("f32", wide))
                } else {
                    Ok(narrow)
                }
            }
        }
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(false),
            Some(SqlValue::Boolean(v)) => Ok(v),
            Some(SqlValue::SmallInt(v)) => Ok(v != 0),
            Some(SqlValue::Integer(v)) => Ok(v != 0),
            Some(SqlValue::BigInt(v)) => Ok(v != 0),
            Some(SqlValue::Decimal(v)) => Ok(!v.is_zero()),
            Some(SqlValue::Double(v)) => Ok(v != 0.0),
            Some(SqlValue::Real(v)) => Ok(v != 0.0),
            Some(SqlValue::Text(s)) => {
                let trimmed = s.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(CoercionError::parse("bool", &s))
                }
            }
            Some(other) => Err(CoercionError::unsupported("bool", &other)),
        }
    }
}

impl FromSqlValue for Decimal {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(Decimal::ZERO),
            Some(SqlValue::Decimal(v)) => Ok(v),
            Some(SqlValue::SmallInt(v)) => Ok(v.into()),
            Some(SqlValue::Integer(v)) => Ok(v.into()),
            Some(SqlValue::BigInt(v)) => Ok(v.into()),
            Some(SqlValue::Boolean(v)) => Ok(if v { Decimal::ONE } else { Decimal::ZERO }),
            Some(SqlValue::Double(v)) => {
                Decimal::try_from(v).map_err(|_| CoercionError::out_of_range("decimal", v))
            }
            Some(SqlValue::Real(v)) => {
                Decimal::try_from(v).map_err(|_| CoercionError::out_of_range("decimal", v))
            }
            Some(SqlValue::Text(s)) => {
                Decimal::from_str(s.trim()).map_err(|_| CoercionError::parse("decimal", &s))
            }
            Some(other) => Err(CoercionError::unsupported("decimal", &other)),
        }
    }
}

impl FromSqlValue for Uuid {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(Uuid::nil()),
            Some(SqlValue::Uuid(v)) => Ok(v),
            Some(SqlValue::Text(s)) => {
                Uuid::parse_str(s.trim()).map_err(|_| CoercionError::parse("uuid", &s))
            }
            Some(other) => Err(CoercionError::unsupported("uuid", &other)),
        }
    }
}

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_naive_date_time(target: &'static str, text: &str) -> Result<NaiveDateTime, CoercionError> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| CoercionError::parse(target, text))
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(NaiveDateTime::default()),
            Some(SqlValue::Timestamp(v)) => Ok(v),
            Some(SqlValue::TimestampTz(v)) => Ok(v.naive_utc()),
            Some(SqlValue::Date(v)) => Ok(v.and_time(NaiveTime::MIN)),
            Some(SqlValue::Text(s)) => parse_naive_date_time("timestamp", &s),
            Some(other) => Err(CoercionError::unsupported("timestamp", &other)),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(DateTime::<Utc>::default()),
            Some(SqlValue::TimestampTz(v)) => Ok(v),
            Some(SqlValue::Timestamp(v)) => Ok(v.and_utc()),
            Some(SqlValue::Date(v)) => Ok(v.and_time(NaiveTime::MIN).and_utc()),
            Some(SqlValue::Text(s)) => parse_naive_date_time("timestamptz", &s).map(|v| v.and_utc()),
            Some(other) => Err(CoercionError::unsupported("timestamptz", &other)),
        }
    }
}

impl FromSqlValue for NaiveDate {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(NaiveDate::default()),
            Some(SqlValue::Date(v)) => Ok(v),
            Some(SqlValue::Timestamp(v)) => Ok(v.date()),
            Some(SqlValue::TimestampTz(v)) => Ok(v.date_naive()),
            Some(SqlValue::Text(s)) => parse_naive_date_time("date", &s).map(|v| v.date()),
            Some(other) => Err(CoercionError::unsupported("date", &other)),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(String::new()),
            Some(SqlValue::Text(v)) => Ok(v),
            Some(other) => Ok(other.to_string()),
        }
    }
}

impl FromSqlValue for serde_json::Value {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(serde_json::Value::Null),
            Some(SqlValue::Json(v)) => Ok(v),
            Some(SqlValue::Text(s)) => {
                serde_json::from_str(&s).map_err(|_| CoercionError::parse("json", &s))
            }
            Some(SqlValue::Boolean(v)) => Ok(v.into()),
            Some(SqlValue::SmallInt(v)) => Ok(v.into()),
            Some(SqlValue::Integer(v)) => Ok(v.into()),
            Some(SqlValue::BigInt(v)) => Ok(v.into()),
            Some(SqlValue::Double(v)) => Ok(v.into()),
            Some(SqlValue::Real(v)) => Ok(f64::from(v).into()),
            Some(other) => Ok(serde_json::Value::String(other.to_string())),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(raw: Option<SqlValue>) -> Result<Self, CoercionError> {
        match present(raw) {
            None => Ok(None),
            value => T::from_sql_value(value).map(Some),
        }
    }
}

/// Coercion for `#[derive(SqlEnum)]` types: the raw value is read as a number
/// and matched against the enum's discriminants
pub fn enum_from_sql_value<E: SqlEnum>(raw: Option<SqlValue>) -> Result<E, CoercionError> {
    match present(raw) {
        None => Ok(E::default()),
        Some(value) => {
            let discriminant = to_i64(E::NAME, value)?;
            E::from_discriminant(discriminant).ok_or(CoercionError::UnknownDiscriminant {
                target: E::NAME,
                value: discriminant,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    enum Level {
        #[default]
        Low,
        High,
    }

    impl SqlEnum for Level {
        const NAME: &'static str = "Level";
        const SQL_TYPE: SqlType = SqlType::Integer;

        fn discriminant(&self) -> i64 {
            match self {
                Level::Low => 0,
                Level::High => 1,
            }
        }

        fn from_discriminant(value: i64) -> Option<Self> {
            match value {
                0 => Some(Level::Low),
                1 => Some(Level::High),
                _ => None,
            }
        }
    }

    #[test]
    fn test_absent_values_follow_default_policy() {
        assert_eq!(coerce::<String>(None).unwrap(), "");
        assert_eq!(coerce::<i32>(None).unwrap(), 0);
        assert_eq!(coerce::<Option<bool>>(None).unwrap(), None);
        assert!(!coerce::<bool>(None).unwrap());
        assert_eq!(coerce::<Decimal>(None).unwrap(), Decimal::ZERO);
        assert_eq!(coerce::<Uuid>(None).unwrap(), Uuid::nil());
        assert_eq!(coerce::<Option<String>>(None).unwrap(), None);
        assert_eq!(coerce::<serde_json::Value>(None).unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_exact_types_pass_through() {
        let id = Uuid::new_v4();
        assert_eq!(coerce::<Uuid>(Some(SqlValue::Uuid(id))).unwrap(), id);
        assert_eq!(coerce::<i64>(Some(SqlValue::BigInt(i64::MAX))).unwrap(), i64::MAX);
        assert_eq!(coerce::<f64>(Some(SqlValue::Double(1.25))).unwrap(), 1.25);
        assert_eq!(
            coerce::<String>(Some(SqlValue::Text("Ana".into()))).unwrap(),
            "Ana"
        );
    }

    #[test]
    fn test_numeric_widening_and_narrowing() {
        assert_eq!(coerce::<i64>(Some(SqlValue::Integer(42))).unwrap(), 42);
        assert_eq!(coerce::<i32>(Some(SqlValue::BigInt(42))).unwrap(), 42);
        assert_eq!(coerce::<i32>(Some(SqlValue::SmallInt(-3))).unwrap(), -3);

        let overflow = coerce::<i32>(Some(SqlValue::BigInt(i64::from(i32::MAX) + 1)));
        assert!(matches!(overflow, Err(CoercionError::OutOfRange { .. })));

        let rounded = coerce::<i32>(Some(SqlValue::Decimal(Decimal::new(25, 1)))).unwrap();
        assert_eq!(rounded, 2, "decimal rounding is to even");
        assert_eq!(coerce::<i32>(Some(SqlValue::Double(3.5))).unwrap(), 4);
    }

    #[test]
    fn test_f32_narrowing() {
        assert_eq!(coerce::<f32>(Some(SqlValue::Double(2.5))).unwrap(), 2.5);
        assert_eq!(coerce::<f32>(Some(SqlValue::Integer(7))).unwrap(), 7.0);
        assert_eq!(
            coerce::<f32>(Some(SqlValue::Text("0.25".into()))).unwrap(),
            0.25
        );
        assert!(coerce::<f32>(Some(SqlValue::Double(f64::INFINITY)))
            .unwrap()
            .is_infinite());

        assert!(matches!(
            coerce::<f32>(Some(SqlValue::Double(1e300))),
            Err(CoercionError::OutOfRange { target: "f32", .. })
        ));
        assert!(matches!(
            coerce::<f32>(Some(SqlValue::Text("-1e40".into()))),
            Err(CoercionError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_text_conversions_are_culture_invariant() {
        assert_eq!(coerce::<i32>(Some(SqlValue::Text(" 17 ".into()))).unwrap(), 17);
        assert_eq!(coerce::<f64>(Some(SqlValue::Text("1.5".into()))).unwrap(), 1.5);
        assert!(coerce::<bool>(Some(SqlValue::Text("True".into()))).unwrap());
        assert_eq!(
            coerce::<Decimal>(Some(SqlValue::Text("10.75".into()))).unwrap(),
            Decimal::new(1075, 2)
        );

        let bad = coerce::<i32>(Some(SqlValue::Text("1,5".into())));
        assert!(matches!(bad, Err(CoercionError::Parse { .. })));
    }

    #[test]
    fn test_date_time_conversions() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let midnight = date.and_time(NaiveTime::MIN);

        assert_eq!(coerce::<NaiveDateTime>(Some(SqlValue::Date(date))).unwrap(), midnight);
        assert_eq!(
            coerce::<NaiveDateTime>(Some(SqlValue::Text("2024-02-29 00:00:00".into()))).unwrap(),
            midnight
        );
        assert_eq!(
            coerce::<DateTime<Utc>>(Some(SqlValue::Timestamp(midnight))).unwrap(),
            midnight.and_utc()
        );
        assert_eq!(coerce::<NaiveDate>(Some(SqlValue::Timestamp(midnight))).unwrap(), date);
    }

    #[test]
    fn test_text_target_uses_string_representation() {
        assert_eq!(coerce::<String>(Some(SqlValue::Integer(7))).unwrap(), "7");
        assert_eq!(coerce::<String>(Some(SqlValue::Boolean(true))).unwrap(), "true");
    }

    #[test]
    fn test_optional_targets_unwrap_to_inner_conversion() {
        assert_eq!(coerce::<Option<i32>>(Some(SqlValue::BigInt(5))).unwrap(), Some(5));
        assert_eq!(
            coerce::<Option<i32>>(Some(SqlValue::Null(SqlType::Integer))).unwrap(),
            None
        );
        assert!(coerce::<Option<Uuid>>(Some(SqlValue::Integer(1))).is_err());
    }

    #[test]
    fn test_unsupported_conversion_fails() {
        let result = coerce::<Uuid>(Some(SqlValue::Boolean(true)));
        assert!(matches!(result, Err(CoercionError::Unsupported { target: "uuid", .. })));
    }

    #[test]
    fn test_enum_coercion() {
        assert_eq!(enum_from_sql_value::<Level>(None).unwrap(), Level::Low);
        assert_eq!(
            enum_from_sql_value::<Level>(Some(SqlValue::Integer(1))).unwrap(),
            Level::High
        );
        assert_eq!(
            enum_from_sql_value::<Level>(Some(SqlValue::BigInt(1))).unwrap(),
            Level::High
        );

        let unknown = enum_from_sql_value::<Level>(Some(SqlValue::Integer(9)));
        assert_eq!(
            unknown,
            Err(CoercionError::UnknownDiscriminant {
                target: "Level",
                value: 9
            })
        );
    }
}
