//! Typed statement arguments.
//!
//! URL filter values and JSON body values arrive as text; the database
//! driver binds typed parameters. [`LogicalType`] names the type a field
//! carries and performs the coercions; [`SqlValue`] is the coerced value as
//! it will be bound. Nulls and sets stay typed so the driver can infer the
//! parameter type even when no value is present.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use uuid::Uuid;

/// Wire format for date values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Wire format for time values.
pub const TIME_FORMAT: &str = "%H:%M:%S";
/// Wire format for timestamp values (rendering; parsing also accepts a
/// compact offset and a missing offset, the latter read as UTC).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// The logical column types the gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Bool,
    Int,
    Float,
    Text,
    Uuid,
    Date,
    Time,
    DateTime,
    Json,
}

/// A coercion failure: the raw value does not read as the field's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoerceError {
    pub expected: LogicalType,
    pub given: String,
}

impl std::fmt::Display for CoerceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot read {:?} as {}", self.given, self.expected.as_str())
    }
}

impl std::error::Error for CoerceError {}

impl LogicalType {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalType::Bool => "bool",
            LogicalType::Int => "int",
            LogicalType::Float => "float",
            LogicalType::Text => "text",
            LogicalType::Uuid => "uuid",
            LogicalType::Date => "date",
            LogicalType::Time => "time",
            LogicalType::DateTime => "datetime",
            LogicalType::Json => "json",
        }
    }

    /// A typed null of this type.
    pub fn null(self) -> SqlValue {
        SqlValue::Null(self)
    }

    fn err(self, raw: &str) -> CoerceError {
        CoerceError {
            expected: self,
            given: raw.to_string(),
        }
    }

    /// Coerce a raw URL scalar into a bindable value.
    pub fn parse_scalar(self, raw: &str) -> Result<SqlValue, CoerceError> {
        match self {
            LogicalType::Bool => parse_bool(raw).map(SqlValue::Bool).ok_or_else(|| self.err(raw)),
            LogicalType::Int => raw.parse().map(SqlValue::Int).map_err(|_| self.err(raw)),
            LogicalType::Float => raw.parse().map(SqlValue::Float).map_err(|_| self.err(raw)),
            LogicalType::Text => Ok(SqlValue::Text(raw.to_string())),
            LogicalType::Uuid => Uuid::parse_str(raw).map(SqlValue::Uuid).map_err(|_| self.err(raw)),
            LogicalType::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(SqlValue::Date)
                .map_err(|_| self.err(raw)),
            LogicalType::Time => NaiveTime::parse_from_str(raw, TIME_FORMAT)
                .map(SqlValue::Time)
                .map_err(|_| self.err(raw)),
            LogicalType::DateTime => parse_datetime(raw)
                .map(SqlValue::DateTime)
                .ok_or_else(|| self.err(raw)),
            LogicalType::Json => serde_json::from_str(raw)
                .map(SqlValue::Json)
                .map_err(|_| self.err(raw)),
        }
    }

    /// Coerce a set of raw URL scalars into one bindable array value.
    pub fn parse_set(self, raws: &[String]) -> Result<SqlValue, CoerceError> {
        fn collect<T>(
            raws: &[String],
            lt: LogicalType,
            mut one: impl FnMut(&str) -> Option<T>,
        ) -> Result<Vec<T>, CoerceError> {
            raws.iter()
                .map(|raw| one(raw).ok_or_else(|| lt.err(raw)))
                .collect()
        }

        match self {
            LogicalType::Bool => collect(raws, self, parse_bool).map(SqlValue::BoolSet),
            LogicalType::Int => collect(raws, self, |r| r.parse().ok()).map(SqlValue::IntSet),
            LogicalType::Float => collect(raws, self, |r| r.parse().ok()).map(SqlValue::FloatSet),
            LogicalType::Text => Ok(SqlValue::TextSet(raws.to_vec())),
            LogicalType::Uuid => {
                collect(raws, self, |r| Uuid::parse_str(r).ok()).map(SqlValue::UuidSet)
            }
            LogicalType::Date => {
                collect(raws, self, |r| NaiveDate::parse_from_str(r, DATE_FORMAT).ok())
                    .map(SqlValue::DateSet)
            }
            LogicalType::Time => {
                collect(raws, self, |r| NaiveTime::parse_from_str(r, TIME_FORMAT).ok())
                    .map(SqlValue::TimeSet)
            }
            LogicalType::DateTime => {
                collect(raws, self, parse_datetime).map(SqlValue::DateTimeSet)
            }
            LogicalType::Json => Err(self.err("sets of json values")),
        }
    }

    /// Coerce a JSON body value into a bindable value.
    ///
    /// JSON `null` becomes a typed null. For the three date/time types the
    /// literal string `"null"` also reads as null: it is the wire encoding
    /// of an empty timestamp.
    pub fn from_json(self, value: &serde_json::Value) -> Result<SqlValue, CoerceError> {
        use serde_json::Value;

        if value.is_null() {
            return Ok(SqlValue::Null(self));
        }
        match self {
            LogicalType::Bool => match value {
                Value::Bool(b) => Ok(SqlValue::Bool(*b)),
                Value::String(s) => self.parse_scalar(s),
                other => Err(self.err(&other.to_string())),
            },
            LogicalType::Int => match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(SqlValue::Int)
                    .ok_or_else(|| self.err(&n.to_string())),
                Value::String(s) => self.parse_scalar(s),
                other => Err(self.err(&other.to_string())),
            },
            LogicalType::Float => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(SqlValue::Float)
                    .ok_or_else(|| self.err(&n.to_string())),
                Value::String(s) => self.parse_scalar(s),
                other => Err(self.err(&other.to_string())),
            },
            LogicalType::Text => match value {
                Value::String(s) => Ok(SqlValue::Text(s.clone())),
                other => Err(self.err(&other.to_string())),
            },
            LogicalType::Uuid => match value {
                Value::String(s) => self.parse_scalar(s),
                other => Err(self.err(&other.to_string())),
            },
            LogicalType::Date | LogicalType::Time | LogicalType::DateTime => match value {
                Value::String(s) if s == "null" => Ok(SqlValue::Null(self)),
                Value::String(s) => self.parse_scalar(s),
                other => Err(self.err(&other.to_string())),
            },
            LogicalType::Json => Ok(SqlValue::Json(value.clone())),
        }
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value ready to be bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// A typed null; the type lets the driver infer the parameter type.
    Null(LogicalType),
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    Json(serde_json::Value),
    BoolSet(Vec<bool>),
    IntSet(Vec<i64>),
    FloatSet(Vec<f64>),
    TextSet(Vec<String>),
    UuidSet(Vec<Uuid>),
    DateSet(Vec<NaiveDate>),
    TimeSet(Vec<NaiveTime>),
    DateTimeSet(Vec<DateTime<FixedOffset>>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// The logical type this value binds as.
    pub fn logical(&self) -> LogicalType {
        match self {
            SqlValue::Null(lt) => *lt,
            SqlValue::Bool(_) | SqlValue::BoolSet(_) => LogicalType::Bool,
            SqlValue::Int(_) | SqlValue::IntSet(_) => LogicalType::Int,
            SqlValue::Float(_) | SqlValue::FloatSet(_) => LogicalType::Float,
            SqlValue::Text(_) | SqlValue::TextSet(_) => LogicalType::Text,
            SqlValue::Uuid(_) | SqlValue::UuidSet(_) => LogicalType::Uuid,
            SqlValue::Date(_) | SqlValue::DateSet(_) => LogicalType::Date,
            SqlValue::Time(_) | SqlValue::TimeSet(_) => LogicalType::Time,
            SqlValue::DateTime(_) | SqlValue::DateTimeSet(_) => LogicalType::DateTime,
            SqlValue::Json(_) => LogicalType::Json,
        }
    }

    /// Render the value for a JSON payload, applying the wire formats.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            SqlValue::Null(_) => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(i) => Value::from(*i),
            SqlValue::Float(x) => serde_json::Number::from_f64(*x)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Uuid(u) => Value::String(u.to_string()),
            SqlValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            SqlValue::Time(t) => Value::String(t.format(TIME_FORMAT).to_string()),
            SqlValue::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
            SqlValue::Json(v) => v.clone(),
            SqlValue::BoolSet(vs) => vs.iter().copied().map(Value::Bool).collect(),
            SqlValue::IntSet(vs) => vs.iter().copied().map(Value::from).collect(),
            SqlValue::FloatSet(vs) => vs
                .iter()
                .map(|x| {
                    serde_json::Number::from_f64(*x)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                })
                .collect(),
            SqlValue::TextSet(vs) => vs.iter().cloned().map(Value::String).collect(),
            SqlValue::UuidSet(vs) => vs.iter().map(|u| Value::String(u.to_string())).collect(),
            SqlValue::DateSet(vs) => vs
                .iter()
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .collect(),
            SqlValue::TimeSet(vs) => vs
                .iter()
                .map(|t| Value::String(t.format(TIME_FORMAT).to_string()))
                .collect(),
            SqlValue::DateTimeSet(vs) => vs
                .iter()
                .map(|dt| Value::String(dt.format(DATETIME_FORMAT).to_string()))
                .collect(),
        }
    }
}

/// Primary-key value, as extracted from a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PkValue {
    Int(i64),
    Uuid(Uuid),
}

impl PkValue {
    pub fn to_sql(self) -> SqlValue {
        match self {
            PkValue::Int(i) => SqlValue::Int(i),
            PkValue::Uuid(u) => SqlValue::Uuid(u),
        }
    }

    /// Wire rendering: integers stay numbers, UUIDs become strings.
    pub fn to_json(self) -> serde_json::Value {
        match self {
            PkValue::Int(i) => serde_json::Value::from(i),
            PkValue::Uuid(u) => serde_json::Value::from(u.to_string()),
        }
    }
}

impl std::fmt::Display for PkValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PkValue::Int(i) => write!(f, "{i}"),
            PkValue::Uuid(u) => write!(f, "{u}"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%#z") {
        return Some(dt);
    }
    // No offset: read as UTC.
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}
