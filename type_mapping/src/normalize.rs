//! Write-side normalization
//!
//! Converts entity field values into bindable parameter values. Unlike the read
//! side, a missing non-text value is sent as a typed NULL rather than a zero.

use crate::types::{SqlType, SqlValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Types that can be bound as a statement parameter
pub trait ToSqlValue {
    /// Parameter type used when the value is missing
    const SQL_TYPE: SqlType;

    fn normalize_for_write(&self) -> SqlValue;

    /// Whether the value is absent before normalization
    ///
    /// A missing optional text normalizes to `""`, so key checks must ask here
    /// rather than inspect the normalized value.
    fn is_missing(&self) -> bool {
        false
    }
}

/// Normalize a field value for writing
pub fn normalize_for_write<T: ToSqlValue + ?Sized>(value: &T) -> SqlValue {
    value.normalize_for_write()
}

/// Integer-backed enums stored by discriminant
///
/// Implemented by `#[derive(SqlEnum)]`.
pub trait SqlEnum: Sized + Default {
    const NAME: &'static str;
    /// Column type of the underlying representation
    const SQL_TYPE: SqlType;

    fn discriminant(&self) -> i64;

    fn from_discriminant(value: i64) -> Option<Self>;
}

/// Underlying numeric representation of an enum value
pub fn enum_to_sql_value<E: SqlEnum>(value: &E) -> SqlValue {
    let discriminant = value.discriminant();
    match E::SQL_TYPE {
        SqlType::SmallInt => SqlValue::SmallInt(discriminant as i16),
        SqlType::BigInt => SqlValue::BigInt(discriminant),
        _ => SqlValue::Integer(discriminant as i32),
    }
}

macro_rules! impl_copy_value {
    ($ty:ty, $variant:ident) => {
        impl ToSqlValue for $ty {
            const SQL_TYPE: SqlType = SqlType::$variant;

            fn normalize_for_write(&self) -> SqlValue {
                SqlValue::$variant(*self)
            }
        }
    };
}

impl_copy_value!(i16, SmallInt);
impl_copy_value!(i32, Integer);
impl_copy_value!(i64, BigInt);
impl_copy_value!(bool, Boolean);
impl_copy_value!(Uuid, Uuid);
impl_copy_value!(NaiveDateTime, Timestamp);
impl_copy_value!(DateTime<Utc>, TimestampTz);
impl_copy_value!(NaiveDate, Date);
impl_copy_value!(Decimal, Decimal);
impl_copy_value!(f64, Double);
impl_copy_value!(f32, Real);

impl ToSqlValue for String {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn normalize_for_write(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl ToSqlValue for str {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn normalize_for_write(&self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl ToSqlValue for serde_json::Value {
    const SQL_TYPE: SqlType = SqlType::Json;

    fn normalize_for_write(&self) -> SqlValue {
        match self {
            serde_json::Value::Null => SqlValue::Null(SqlType::Json),
            other => SqlValue::Json(other.clone()),
        }
    }

    fn is_missing(&self) -> bool {
        self.is_null()
    }
}

impl<T: ToSqlValue + ?Sized> ToSqlValue for &T {
    const SQL_TYPE: SqlType = T::SQL_TYPE;

    fn normalize_for_write(&self) -> SqlValue {
        (**self).normalize_for_write()
    }

    fn is_missing(&self) -> bool {
        (**self).is_missing()
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;

    fn normalize_for_write(&self) -> SqlValue {
        match self {
            Some(value) => value.normalize_for_write(),
            None if T::SQL_TYPE == SqlType::Text => SqlValue::Text(String::new()),
            None => SqlValue::Null(T::SQL_TYPE),
        }
    }

    fn is_missing(&self) -> bool {
        match self {
            Some(value) => value.is_missing(),
            None => true,
        }
    }
}
