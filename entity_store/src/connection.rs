//! Connection seam between the executor and the database engine
//!
//! The executor drives one connection through this trait. The PostgreSQL
//! implementation sends statements through sqlx; tests use an in-memory one.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgConnection, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Connection, Postgres, Row, TypeInfo};
use type_mapping::{SqlType, SqlValue};
use uuid::Uuid;

use crate::errors::DataError;
use crate::record::ResultRow;
use crate::sql_builder::BoundStatement;

/// A single open connection to the engine
#[async_trait]
pub trait SqlConnection: Send + Sized {
    async fn open(connection_string: &str) -> Result<Self, DataError>;

    /// Run a statement that returns no rows; yields the number of rows affected
    async fn execute_statement(&mut self, statement: &BoundStatement) -> Result<u64, DataError>;

    async fn fetch_rows(&mut self, statement: &BoundStatement) -> Result<Vec<ResultRow>, DataError>;

    async fn begin_transaction(&mut self) -> Result<(), DataError>;

    async fn commit_transaction(&mut self) -> Result<(), DataError>;

    async fn rollback_transaction(&mut self) -> Result<(), DataError>;

    async fn close_connection(self) -> Result<(), DataError>;
}

/// Bind a SqlValue to a query
fn bind_sql_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::SmallInt(v) => query.bind(*v),
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::BigInt(v) => query.bind(*v),
        SqlValue::Boolean(v) => query.bind(*v),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::TimestampTz(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Double(v) => query.bind(*v),
        SqlValue::Real(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(v.clone()),
        SqlValue::Null(ty) => bind_null(query, *ty),
    }
}

/// NULLs are sent with the parameter type of the column they stand for
fn bind_null<'q>(
    query: Query<'q, Postgres, PgArguments>,
    ty: SqlType,
) -> Query<'q, Postgres, PgArguments> {
    match ty {
        SqlType::Text => query.bind(None::<String>),
        SqlType::SmallInt => query.bind(None::<i16>),
        SqlType::Integer => query.bind(None::<i32>),
        SqlType::BigInt => query.bind(None::<i64>),
        SqlType::Boolean => query.bind(None::<bool>),
        SqlType::Uuid => query.bind(None::<Uuid>),
        SqlType::Timestamp => query.bind(None::<NaiveDateTime>),
        SqlType::TimestampTz => query.bind(None::<DateTime<Utc>>),
        SqlType::Date => query.bind(None::<NaiveDate>),
        SqlType::Decimal => query.bind(None::<Decimal>),
        SqlType::Double => query.bind(None::<f64>),
        SqlType::Real => query.bind(None::<f32>),
        SqlType::Json => query.bind(None::<serde_json::Value>),
    }
}

fn build_query(statement: &BoundStatement) -> Query<'_, Postgres, PgArguments> {
    statement
        .values
        .iter()
        .fold(sqlx::query(&statement.sql), bind_sql_value)
}

fn decode<'r, T>(row: &'r PgRow, ordinal: usize) -> Result<Option<T>, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(ordinal)
}

/// Convert a database row into a ResultRow, choosing the value variant from
/// the column's type name
fn row_to_result_row(row: &PgRow) -> Result<ResultRow, DataError> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for column in row.columns() {
        let ordinal = column.ordinal();
        let value = match column.type_info().name() {
            "INT2" => decode::<i16>(row, ordinal)?.map(SqlValue::SmallInt),
            "INT4" => decode::<i32>(row, ordinal)?.map(SqlValue::Integer),
            "INT8" => decode::<i64>(row, ordinal)?.map(SqlValue::BigInt),
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
                decode::<String>(row, ordinal)?.map(SqlValue::Text)
            }
            "BOOL" => decode::<bool>(row, ordinal)?.map(SqlValue::Boolean),
            "UUID" => decode::<Uuid>(row, ordinal)?.map(SqlValue::Uuid),
            "FLOAT4" => decode::<f32>(row, ordinal)?.map(SqlValue::Real),
            "FLOAT8" => decode::<f64>(row, ordinal)?.map(SqlValue::Double),
            "NUMERIC" => decode::<Decimal>(row, ordinal)?.map(SqlValue::Decimal),
            "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, ordinal)?.map(SqlValue::TimestampTz),
            "TIMESTAMP" => decode::<NaiveDateTime>(row, ordinal)?.map(SqlValue::Timestamp),
            "DATE" => decode::<NaiveDate>(row, ordinal)?.map(SqlValue::Date),
            "JSON" | "JSONB" => decode::<serde_json::Value>(row, ordinal)?.map(SqlValue::Json),
            // types without a variant must decode as text, otherwise the read fails
            other => decode::<String>(row, ordinal)
                .map_err(|e| {
                    DataError::Mapping(format!(
                        "column '{}' of type {} cannot be read: {}",
                        column.name(),
                        other,
                        e
                    ))
                })?
                .map(SqlValue::Text),
        };

        columns.push(column.name().to_string());
        values.push(value);
    }

    Ok(ResultRow::new(columns, values))
}

#[async_trait]
impl SqlConnection for PgConnection {
    async fn open(connection_string: &str) -> Result<Self, DataError> {
        Ok(PgConnection::connect(connection_string).await?)
    }

    async fn execute_statement(&mut self, statement: &BoundStatement) -> Result<u64, DataError> {
        let result = build_query(statement).execute(&mut *self).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_rows(&mut self, statement: &BoundStatement) -> Result<Vec<ResultRow>, DataError> {
        let rows = build_query(statement).fetch_all(&mut *self).await?;
        rows.iter().map(row_to_result_row).collect()
    }

    async fn begin_transaction(&mut self) -> Result<(), DataError> {
        sqlx::query("BEGIN").execute(&mut *self).await?;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<(), DataError> {
        sqlx::query("COMMIT").execute(&mut *self).await?;
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<(), DataError> {
        sqlx::query("ROLLBACK").execute(&mut *self).await?;
        Ok(())
    }

    async fn close_connection(self) -> Result<(), DataError> {
        Connection::close(self).await?;
        Ok(())
    }
}
