//! Conversion of PostgreSQL rows into listing rows.
//!
//! Hydration works on JSON maps keyed by output column name, so every
//! column is decoded according to its server-reported type.

use basequery_engine::Row;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::types::Type;
use tracing::trace;
use uuid::Uuid;

use crate::error::PgResult;

/// How a PostgreSQL column is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// `bool`.
    Bool,
    /// `int2`.
    SmallInt,
    /// `int4`.
    Int,
    /// `int8`.
    BigInt,
    /// `oid`.
    Oid,
    /// `float4`.
    Real,
    /// `float8`.
    Double,
    /// `numeric`, kept as a string.
    Numeric,
    /// Character types.
    Text,
    /// `uuid`, as its hyphenated string.
    Uuid,
    /// `date`, as `YYYY-MM-DD`.
    Date,
    /// `time`.
    Time,
    /// `timestamp`, as ISO-8601 without offset.
    Timestamp,
    /// `timestamptz`, as RFC 3339 in UTC.
    TimestampTz,
    /// `json` / `jsonb`.
    Json,
    /// `text[]` / `varchar[]`.
    TextArray,
    /// `int4[]` / `int8[]`.
    IntArray,
    /// Anything else; decoded as text when the driver allows it.
    Other,
}

impl ColumnKind {
    /// Classify a PostgreSQL type.
    pub fn of(ty: &Type) -> Self {
        match *ty {
            Type::BOOL => Self::Bool,
            Type::INT2 => Self::SmallInt,
            Type::INT4 => Self::Int,
            Type::INT8 => Self::BigInt,
            Type::OID => Self::Oid,
            Type::FLOAT4 => Self::Real,
            Type::FLOAT8 => Self::Double,
            Type::NUMERIC => Self::Numeric,
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => Self::Text,
            Type::UUID => Self::Uuid,
            Type::DATE => Self::Date,
            Type::TIME => Self::Time,
            Type::TIMESTAMP => Self::Timestamp,
            Type::TIMESTAMPTZ => Self::TimestampTz,
            Type::JSON | Type::JSONB => Self::Json,
            Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => Self::TextArray,
            Type::INT4_ARRAY | Type::INT8_ARRAY => Self::IntArray,
            _ => Self::Other,
        }
    }
}

/// Convert one driver row into a listing row.
pub fn row_to_json(row: &tokio_postgres::Row) -> PgResult<Row> {
    let mut map = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_())?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

/// Convert every row of a result set.
pub fn rows_to_json(rows: &[tokio_postgres::Row]) -> PgResult<Vec<Row>> {
    rows.iter().map(row_to_json).collect()
}

fn column_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> PgResult<Value> {
    let value = match ColumnKind::of(ty) {
        ColumnKind::Bool => row.try_get::<_, Option<bool>>(idx)?.map(Value::from),
        ColumnKind::SmallInt => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        ColumnKind::Int => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        ColumnKind::BigInt => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        ColumnKind::Oid => row.try_get::<_, Option<u32>>(idx)?.map(Value::from),
        ColumnKind::Real => row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::from(f64::from(v))),
        ColumnKind::Double => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
        ColumnKind::Numeric => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map(|d| Value::String(d.to_string())),
        ColumnKind::Text => row.try_get::<_, Option<String>>(idx)?.map(Value::String),
        ColumnKind::Uuid => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map(|u| Value::String(u.to_string())),
        ColumnKind::Date => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        ColumnKind::Time => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(|t| Value::String(t.to_string())),
        ColumnKind::Timestamp => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        ColumnKind::TimestampTz => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|t| Value::String(t.to_rfc3339())),
        ColumnKind::Json => row.try_get::<_, Option<Value>>(idx)?,
        ColumnKind::TextArray => row.try_get::<_, Option<Vec<String>>>(idx)?.map(Value::from),
        ColumnKind::IntArray => row
            .try_get::<_, Option<Vec<i64>>>(idx)
            .or_else(|_| {
                row.try_get::<_, Option<Vec<i32>>>(idx)
                    .map(|v| v.map(|ints| ints.into_iter().map(i64::from).collect()))
            })?
            .map(Value::from),
        ColumnKind::Other => match row.try_get::<_, Option<String>>(idx) {
            Ok(text) => text.map(Value::String),
            Err(_) => {
                trace!(column = idx, pg_type = %ty, "Unsupported column type decoded as null");
                None
            }
        },
    };
    Ok(value.unwrap_or(Value::Null))
}
