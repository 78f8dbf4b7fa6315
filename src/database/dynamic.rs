//! Runtime conversion between gateway values and Postgres rows.
//! Statements arriving through the query gateway have no compile-time row type, so their
//! parameters are bound from [`SqlParam`] and their rows are read back column by column.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgArguments, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column, Postgres, Row, TypeInfo};
use std::str::FromStr;

use crate::database::manager::DatabaseError;
use crate::database::models::SqlParam;

/// A gateway parameter converted to the type Postgres inferred for its placeholder.
///
/// Binding with the inferred type lets `null` reach an INTEGER column and an ISO date string
/// reach a DATE column, which a value sent as TEXT cannot.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedParam {
    Bool(Option<bool>),
    Int2(Option<i16>),
    Int4(Option<i32>),
    Int8(Option<i64>),
    Float4(Option<f32>),
    Float8(Option<f64>),
    Numeric(Option<BigDecimal>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Timestamp(Option<NaiveDateTime>),
    Timestamptz(Option<DateTime<Utc>>),
    Uuid(Option<Uuid>),
    Json(Option<Value>),
}

impl TypedParam {
    /// Convert the `index`th (1-based) parameter to the Postgres type named `type_name`.
    ///
    /// Types without a dedicated conversion keep the value's own type.
    pub fn convert(
        index: usize,
        param: &SqlParam,
        type_name: &str,
    ) -> Result<Self, DatabaseError> {
        let slot = Placeholder { index, type_name };
        let typed = match type_name {
            "BOOL" => TypedParam::Bool(match param {
                SqlParam::Bool(b) => Some(*b),
                other => slot.parsed(other)?,
            }),
            "INT2" => TypedParam::Int2(slot.narrowed(param)?),
            "INT4" => TypedParam::Int4(slot.narrowed(param)?),
            "INT8" => TypedParam::Int8(slot.integer(param)?),
            "FLOAT4" => TypedParam::Float4(slot.float(param)?.map(|f| f as f32)),
            "FLOAT8" => TypedParam::Float8(slot.float(param)?),
            "NUMERIC" => TypedParam::Numeric(match param {
                SqlParam::Int(i) => Some(BigDecimal::from(*i)),
                SqlParam::Float(f) => {
                    Some(BigDecimal::from_str(&f.to_string()).map_err(|_| slot.invalid())?)
                }
                other => slot.parsed(other)?,
            }),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => TypedParam::Text(text(param)),
            "DATE" => TypedParam::Date(slot.parsed(param)?),
            "TIME" => TypedParam::Time(slot.parsed(param)?),
            "TIMESTAMP" => TypedParam::Timestamp(
                slot.textual(param)?
                    .map(|s| parse_timestamp(s).ok_or_else(|| slot.invalid()))
                    .transpose()?,
            ),
            "TIMESTAMPTZ" => TypedParam::Timestamptz(
                slot.textual(param)?
                    .map(|s| parse_timestamptz(s).ok_or_else(|| slot.invalid()))
                    .transpose()?,
            ),
            "UUID" => TypedParam::Uuid(slot.parsed(param)?),
            "JSON" | "JSONB" => TypedParam::Json(match param {
                SqlParam::Null => None,
                SqlParam::Bool(b) => Some(Value::Bool(*b)),
                SqlParam::Int(i) => Some(Value::from(*i)),
                SqlParam::Float(f) => Some(
                    Number::from_f64(*f)
                        .map(Value::Number)
                        .ok_or_else(|| slot.invalid())?,
                ),
                SqlParam::Text(s) => Some(Value::String(s.clone())),
            }),
            _ => Self::untyped(param),
        };
        Ok(typed)
    }

    fn untyped(param: &SqlParam) -> Self {
        match param {
            SqlParam::Null => TypedParam::Text(None),
            SqlParam::Bool(b) => TypedParam::Bool(Some(*b)),
            SqlParam::Int(i) => TypedParam::Int8(Some(*i)),
            SqlParam::Float(f) => TypedParam::Float8(Some(*f)),
            SqlParam::Text(s) => TypedParam::Text(Some(s.clone())),
        }
    }

    fn bind(self, q: Query<'_, Postgres, PgArguments>) -> Query<'_, Postgres, PgArguments> {
        match self {
            TypedParam::Bool(v) => q.bind(v),
            TypedParam::Int2(v) => q.bind(v),
            TypedParam::Int4(v) => q.bind(v),
            TypedParam::Int8(v) => q.bind(v),
            TypedParam::Float4(v) => q.bind(v),
            TypedParam::Float8(v) => q.bind(v),
            TypedParam::Numeric(v) => q.bind(v),
            TypedParam::Text(v) => q.bind(v),
            TypedParam::Date(v) => q.bind(v),
            TypedParam::Time(v) => q.bind(v),
            TypedParam::Timestamp(v) => q.bind(v),
            TypedParam::Timestamptz(v) => q.bind(v),
            TypedParam::Uuid(v) => q.bind(v),
            TypedParam::Json(v) => q.bind(v),
        }
    }
}

struct Placeholder<'a> {
    index: usize,
    type_name: &'a str,
}

impl Placeholder<'_> {
    fn invalid(&self) -> DatabaseError {
        DatabaseError::InvalidParam(format!(
            "Parameter {} is not a valid {}",
            self.index, self.type_name
        ))
    }

    fn integer(&self, param: &SqlParam) -> Result<Option<i64>, DatabaseError> {
        match param {
            SqlParam::Null => Ok(None),
            SqlParam::Int(i) => Ok(Some(*i)),
            SqlParam::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(Some(*f as i64))
            }
            SqlParam::Text(s) => s.trim().parse().map(Some).map_err(|_| self.invalid()),
            _ => Err(self.invalid()),
        }
    }

    fn narrowed<T: TryFrom<i64>>(&self, param: &SqlParam) -> Result<Option<T>, DatabaseError> {
        self.integer(param)?
            .map(|i| T::try_from(i).map_err(|_| self.invalid()))
            .transpose()
    }

    fn float(&self, param: &SqlParam) -> Result<Option<f64>, DatabaseError> {
        match param {
            SqlParam::Null => Ok(None),
            SqlParam::Int(i) => Ok(Some(*i as f64)),
            SqlParam::Float(f) => Ok(Some(*f)),
            SqlParam::Text(s) => s.trim().parse().map(Some).map_err(|_| self.invalid()),
            SqlParam::Bool(_) => Err(self.invalid()),
        }
    }

    /// Text content of a parameter that must arrive as a string (or null).
    fn textual<'p>(&self, param: &'p SqlParam) -> Result<Option<&'p str>, DatabaseError> {
        match param {
            SqlParam::Null => Ok(None),
            SqlParam::Text(s) => Ok(Some(s.trim())),
            _ => Err(self.invalid()),
        }
    }

    fn parsed<T: FromStr>(&self, param: &SqlParam) -> Result<Option<T>, DatabaseError> {
        self.textual(param)?
            .map(|s| s.parse().map_err(|_| self.invalid()))
            .transpose()
    }
}

fn text(param: &SqlParam) -> Option<String> {
    match param {
        SqlParam::Null => None,
        SqlParam::Bool(b) => Some(b.to_string()),
        SqlParam::Int(i) => Some(i.to_string()),
        SqlParam::Float(f) => Some(f.to_string()),
        SqlParam::Text(s) => Some(s.clone()),
    }
}

/// ISO 8601 timestamp, with `T` or a space, an offset (normalized to UTC) or a bare date.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.naive_utc());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(t);
        }
    }
    NaiveDate::from_str(s).ok()?.and_hms_opt(0, 0, 0)
}

/// Timestamps without an offset are taken as UTC.
fn parse_timestamptz(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    parse_timestamp(s).map(|t| Utc.from_utc_datetime(&t))
}

/// Bind `params` positionally, each converted to the matching entry of `types`.
pub fn bind_all<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &[SqlParam],
    types: &[PgTypeInfo],
) -> Result<Query<'q, Postgres, PgArguments>, DatabaseError> {
    for (i, param) in params.iter().enumerate() {
        let type_name = types.get(i).map(|t| t.name()).unwrap_or_default();
        q = TypedParam::convert(i + 1, param, type_name)?.bind(q);
    }
    Ok(q)
}

/// Convert a row into a JSON object keyed by column name.
pub fn row_to_json(row: &PgRow) -> Map<String, Value> {
    let mut map = Map::new();
    for i in 0..row.len() {
        map.insert(row.column(i).name().to_string(), column_to_json(row, i));
    }
    map
}

/// The first column of a row as an integer key, if it is one.
pub fn leading_integer(row: &PgRow) -> Option<i64> {
    if row.is_empty() {
        return None;
    }
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(0) {
        return Some(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(0) {
        return Some(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(0) {
        return Some(v.into());
    }
    None
}

fn column_to_json(row: &PgRow, i: usize) -> Value {
    // Typed decoding fails on a type mismatch, so try the supported types in turn.
    if let Ok(v) = row.try_get::<Option<Value>, _>(i) {
        return v.unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(i) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(i) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        return v.and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(i) {
        return v
            .and_then(|f| Number::from_f64(f64::from(f)))
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(i) {
        return v.map(|t| Value::String(t.to_rfc3339())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(i) {
        return v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(i) {
        return v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(i) {
        return v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Uuid>, _>(i) {
        return v.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null);
    }
    // NUMERIC keeps its exact digits as a string.
    if let Ok(v) = row.try_get::<Option<BigDecimal>, _>(i) {
        return v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null);
    }
    Value::Null
}
