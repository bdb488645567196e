//! Parameter binding for PostgreSQL.
//!
//! Listing filters arrive as loosely typed [`FilterValue`]s (a date range is
//! a string, a page of ids may be integers). Statements are prepared first,
//! so the server reports the type it inferred for each placeholder and
//! [`PgParam`] encodes the value as that type.

use std::error::Error;
use std::str::FromStr;

use basequery_engine::FilterValue;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{IsNull, ToSql, Type};
use uuid::Uuid;

use crate::error::{PgError, PgResult};

type EncodeResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

/// A [`FilterValue`] bound as a PostgreSQL parameter.
#[derive(Debug, Clone, Copy)]
pub struct PgParam<'a>(&'a FilterValue);

impl<'a> PgParam<'a> {
    /// Wrap a scalar value. Lists are expanded into scalars before binding.
    pub fn new(value: &'a FilterValue) -> PgResult<Self> {
        if value.is_list() {
            return Err(PgError::type_conversion(
                "list values must be expanded into placeholders before binding",
            ));
        }
        Ok(Self(value))
    }

    /// The wrapped value.
    pub fn value(&self) -> &FilterValue {
        self.0
    }
}

/// Wrap every statement parameter.
pub fn bind_params(values: &[FilterValue]) -> PgResult<Vec<PgParam<'_>>> {
    values.iter().map(PgParam::new).collect()
}

/// Borrow bound parameters the way `tokio_postgres` expects them.
pub fn as_sql_refs<'a>(params: &'a [PgParam<'a>]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> EncodeResult {
        match self.0 {
            FilterValue::Null => Ok(IsNull::Yes),
            FilterValue::Bool(b) => match *ty {
                Type::TEXT | Type::VARCHAR => b.to_string().to_sql(ty, out),
                _ => b.to_sql(ty, out),
            },
            FilterValue::Int(i) => encode_int(*i, ty, out),
            FilterValue::Float(f) => encode_float(*f, ty, out),
            FilterValue::String(s) => encode_text(s, ty, out),
            FilterValue::List(_) => Err("list parameter reached the driver".into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn encode_int(value: i64, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        Type::OID => u32::try_from(value)?.to_sql(ty, out),
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(value).to_sql(ty, out),
        Type::BOOL => (value != 0).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => value.to_string().to_sql(ty, out),
        _ => value.to_sql(ty, out),
    }
}

fn encode_float(value: f64, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 if value.fract() == 0.0 => encode_int(value as i64, ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 => Err(format!("{} is not an integer", value).into()),
        Type::NUMERIC => Decimal::try_from(value)?.to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => value.to_string().to_sql(ty, out),
        _ => value.to_sql(ty, out),
    }
}

fn encode_text(value: &str, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::INT2 => value.parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => value.parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => value.parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => value.parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => value.parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => Decimal::from_str(value)?.to_sql(ty, out),
        Type::BOOL => value.parse::<bool>()?.to_sql(ty, out),
        Type::UUID => Uuid::parse_str(value)?.to_sql(ty, out),
        Type::DATE => parse_timestamp(value)?.date().to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(value)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamptz(value)?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::String(value.to_string()).to_sql(ty, out),
        _ => value.to_sql(ty, out),
    }
}

/// Parse a date or date-time string as a naive UTC timestamp.
fn parse_timestamp(value: &str) -> Result<NaiveDateTime, Box<dyn Error + Sync + Send>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a date or timestamp", value))?;
    Ok(date.and_time(NaiveTime::MIN))
}

fn parse_timestamptz(value: &str) -> Result<DateTime<Utc>, Box<dyn Error + Sync + Send>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    Ok(parse_timestamp(value)?.and_utc())
}
