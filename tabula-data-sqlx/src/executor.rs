//! Statement execution and row decoding.
//!
//! Values travel as [`SqlValue`] and bind with their native driver types;
//! typed nulls bind as `None::<T>` so the parameter keeps its SQL type.
//! Rows decode by column name into a JSON object keyed by wire names and
//! from there into the record type, so a restricted projection leaves the
//! remaining fields default-initialised.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use tabula_core::Error;
use tabula_data::value::{DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use tabula_data::{FieldDescriptor, LogicalType, PkValue, Record, SqlValue};

use crate::error::{classify_with_statement, SqlxErrorExt};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

pub(crate) fn bind_value<'q>(query: PgQuery<'q>, value: &SqlValue) -> PgQuery<'q> {
    match value {
        SqlValue::Null(logical) => bind_null(query, *logical),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(v.clone()),
        SqlValue::BoolSet(v) => query.bind(v.clone()),
        SqlValue::IntSet(v) => query.bind(v.clone()),
        SqlValue::FloatSet(v) => query.bind(v.clone()),
        SqlValue::TextSet(v) => query.bind(v.clone()),
        SqlValue::UuidSet(v) => query.bind(v.clone()),
        SqlValue::DateSet(v) => query.bind(v.clone()),
        SqlValue::TimeSet(v) => query.bind(v.clone()),
        SqlValue::DateTimeSet(v) => query.bind(v.clone()),
    }
}

fn bind_null(query: PgQuery<'_>, logical: LogicalType) -> PgQuery<'_> {
    match logical {
        LogicalType::Bool => query.bind(None::<bool>),
        LogicalType::Int => query.bind(None::<i64>),
        LogicalType::Float => query.bind(None::<f64>),
        LogicalType::Text => query.bind(None::<String>),
        LogicalType::Uuid => query.bind(None::<sqlx::types::Uuid>),
        LogicalType::Date => query.bind(None::<sqlx::types::chrono::NaiveDate>),
        LogicalType::Time => query.bind(None::<sqlx::types::chrono::NaiveTime>),
        LogicalType::DateTime => {
            query.bind(None::<sqlx::types::chrono::DateTime<sqlx::types::chrono::FixedOffset>>)
        }
        LogicalType::Json => query.bind(None::<serde_json::Value>),
    }
}

fn bind_all<'q>(statement: &'q str, args: &[SqlValue]) -> PgQuery<'q> {
    let mut query = sqlx::query(statement);
    for arg in args {
        query = bind_value(query, arg);
    }
    query
}

/// Run a write statement and report the affected row count.
pub(crate) async fn execute<'e, E>(
    executor: E,
    statement: &str,
    args: &[SqlValue],
) -> Result<u64, Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = bind_all(statement, args)
        .execute(executor)
        .await
        .map_err(|e| classify_with_statement(e, statement))?;
    Ok(result.rows_affected())
}

/// Fetch all rows and decode them through the projection.
pub(crate) async fn fetch_records<'e, E, T>(
    executor: E,
    statement: &str,
    args: &[SqlValue],
    projection: &[&FieldDescriptor],
) -> Result<Vec<T>, Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
    T: Record,
{
    let rows = bind_all(statement, args)
        .fetch_all(executor)
        .await
        .map_err(|e| classify_with_statement(e, statement))?;
    rows.iter()
        .map(|row| decode_record(row, projection))
        .collect()
}

/// Fetch exactly one row, or [`Error::NotFound`].
pub(crate) async fn fetch_record<'e, E, T>(
    executor: E,
    statement: &str,
    args: &[SqlValue],
    projection: &[&FieldDescriptor],
) -> Result<T, Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
    T: Record,
{
    let row = bind_all(statement, args)
        .fetch_optional(executor)
        .await
        .map_err(|e| classify_with_statement(e, statement))?;
    match row {
        Some(row) => decode_record(&row, projection),
        None => Err(Error::NotFound),
    }
}

/// Fetch a single `bigint` scalar, e.g. a count.
pub(crate) async fn fetch_scalar<'e, E>(
    executor: E,
    statement: &str,
    args: &[SqlValue],
) -> Result<i64, Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = bind_all(statement, args)
        .fetch_one(executor)
        .await
        .map_err(|e| classify_with_statement(e, statement))?;
    decode_int_at(&row, 0)
}

/// Fetch the generated key of an `INSERT … RETURNING` statement.
pub(crate) async fn fetch_returned_key<'e, E>(
    executor: E,
    statement: &str,
    args: &[SqlValue],
    logical: LogicalType,
) -> Result<PkValue, Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = bind_all(statement, args)
        .fetch_one(executor)
        .await
        .map_err(|e| classify_with_statement(e, statement))?;
    match logical {
        LogicalType::Int => Ok(PkValue::Int(decode_int_at(&row, 0)?)),
        LogicalType::Uuid => {
            let id = row
                .try_get::<sqlx::types::Uuid, _>(0)
                .map_err(SqlxErrorExt::classify)?;
            Ok(PkValue::Uuid(id))
        }
        other => Err(Error::config(format!(
            "key column must be int or uuid, not {other}"
        ))),
    }
}

fn decode_record<T: Record>(row: &PgRow, projection: &[&FieldDescriptor]) -> Result<T, Error> {
    let mut object = serde_json::Map::with_capacity(projection.len());
    for field in projection {
        object.insert(field.wire().to_string(), decode_column(row, field)?);
    }
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| Error::internal(format!("row does not fit the record type: {e}")))
}

fn decode_column(row: &PgRow, field: &FieldDescriptor) -> Result<serde_json::Value, Error> {
    let name = field.storage();
    match field.logical() {
        LogicalType::Bool => Ok(json(row
            .try_get::<Option<bool>, _>(name)
            .map_err(SqlxErrorExt::classify)?)),
        LogicalType::Int => decode_int(row, name),
        LogicalType::Float => decode_float(row, name),
        LogicalType::Text => decode_text(row, name),
        LogicalType::Uuid => Ok(json(row
            .try_get::<Option<sqlx::types::Uuid>, _>(name)
            .map_err(SqlxErrorExt::classify)?
            .map(|u| u.to_string()))),
        LogicalType::Date => Ok(json(row
            .try_get::<Option<sqlx::types::chrono::NaiveDate>, _>(name)
            .map_err(SqlxErrorExt::classify)?
            .map(|d| d.format(DATE_FORMAT).to_string()))),
        LogicalType::Time => Ok(json(row
            .try_get::<Option<sqlx::types::chrono::NaiveTime>, _>(name)
            .map_err(SqlxErrorExt::classify)?
            .map(|t| t.format(TIME_FORMAT).to_string()))),
        LogicalType::DateTime => Ok(json(row
            .try_get::<Option<sqlx::types::chrono::DateTime<sqlx::types::chrono::FixedOffset>>, _>(
                name,
            )
            .map_err(SqlxErrorExt::classify)?
            .map(|dt| dt.format(DATETIME_FORMAT).to_string()))),
        LogicalType::Json => Ok(json(row
            .try_get::<Option<serde_json::Value>, _>(name)
            .map_err(SqlxErrorExt::classify)?)),
    }
}

// int2, int4 and int8 columns all surface as Int; widen in turn.
fn decode_int(row: &PgRow, name: &str) -> Result<serde_json::Value, Error> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
        return Ok(json(v));
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(name) {
        return Ok(json(v.map(i64::from)));
    }
    let v = row
        .try_get::<Option<i16>, _>(name)
        .map_err(SqlxErrorExt::classify)?;
    Ok(json(v.map(i64::from)))
}

fn decode_int_at(row: &PgRow, index: usize) -> Result<i64, Error> {
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Ok(v);
    }
    if let Ok(v) = row.try_get::<i32, _>(index) {
        return Ok(i64::from(v));
    }
    let v = row
        .try_get::<i16, _>(index)
        .map_err(SqlxErrorExt::classify)?;
    Ok(i64::from(v))
}

fn decode_float(row: &PgRow, name: &str) -> Result<serde_json::Value, Error> {
    if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
        return Ok(json(v));
    }
    let v = row
        .try_get::<Option<f32>, _>(name)
        .map_err(SqlxErrorExt::classify)?;
    Ok(json(v.map(f64::from)))
}

fn decode_text(row: &PgRow, name: &str) -> Result<serde_json::Value, Error> {
    if let Ok(v) = row.try_get::<Option<String>, _>(name) {
        return Ok(json(v));
    }
    // User-defined enum columns carry their label as text once the type
    // check is bypassed.
    let v = row
        .try_get_unchecked::<Option<String>, _>(name)
        .map_err(SqlxErrorExt::classify)?;
    Ok(json(v))
}

fn json<T: Into<serde_json::Value>>(value: Option<T>) -> serde_json::Value {
    match value {
        Some(v) => v.into(),
        None => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;

    #[test]
    fn every_value_kind_binds() {
        let now = sqlx::types::chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05+02:00")
            .unwrap();
        let date = now.date_naive();
        let time = now.time();
        let id = sqlx::types::Uuid::nil();
        let values = vec![
            SqlValue::Null(LogicalType::Int),
            SqlValue::Null(LogicalType::DateTime),
            SqlValue::Bool(true),
            SqlValue::Int(5),
            SqlValue::Float(2.5),
            SqlValue::Text("x".to_string()),
            SqlValue::Uuid(id),
            SqlValue::Date(date),
            SqlValue::Time(time),
            SqlValue::DateTime(now),
            SqlValue::Json(serde_json::json!({"a": 1})),
            SqlValue::BoolSet(vec![true, false]),
            SqlValue::IntSet(vec![1, 2]),
            SqlValue::FloatSet(vec![1.0]),
            SqlValue::TextSet(vec!["a".to_string()]),
            SqlValue::UuidSet(vec![id]),
            SqlValue::DateSet(vec![date]),
            SqlValue::TimeSet(vec![time]),
            SqlValue::DateTimeSet(vec![now]),
        ];
        let query = values
            .iter()
            .fold(sqlx::query("SELECT 1"), |q, v| bind_value(q, v));
        assert_eq!(query.sql(), "SELECT 1");
    }

    #[test]
    fn json_helper_maps_none_to_null() {
        assert_eq!(json(Some(5i64)), serde_json::json!(5));
        assert_eq!(json(None::<i64>), serde_json::Value::Null);
    }
}
