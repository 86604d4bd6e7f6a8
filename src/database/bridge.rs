//! Conversions between cell values and DuckDB values.
use crate::spreadsheet::cell::Value;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveTime;
use chrono::TimeDelta;
use duckdb::types::TimeUnit;
use duckdb::types::Value as DuckValue;

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Converts a DuckDB result value to a cell value.
///
/// Integers of every width become `Int` (`Float` when out of range), temporal values keep
/// their kind and anything without a scalar counterpart is rendered as text.
pub(crate) fn from_duckdb(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(value) => Value::Bool(value),
        DuckValue::TinyInt(value) => Value::Int(value.into()),
        DuckValue::SmallInt(value) => Value::Int(value.into()),
        DuckValue::Int(value) => Value::Int(value.into()),
        DuckValue::BigInt(value) => Value::Int(value),
        DuckValue::UTinyInt(value) => Value::Int(value.into()),
        DuckValue::USmallInt(value) => Value::Int(value.into()),
        DuckValue::UInt(value) => Value::Int(value.into()),
        DuckValue::UBigInt(value) => i64::try_from(value)
            .map(Value::Int)
            .unwrap_or(Value::Float(value as f64)),
        DuckValue::HugeInt(value) => i64::try_from(value)
            .map(Value::Int)
            .unwrap_or(Value::Float(value as f64)),
        DuckValue::Float(value) => Value::Float(value.into()),
        DuckValue::Double(value) => Value::Float(value),
        DuckValue::Decimal(value) => value
            .to_string()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Text(value.to_string())),
        DuckValue::Text(value) => Value::Text(value),
        DuckValue::Enum(value) => Value::Text(value),
        DuckValue::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(TimeDelta::try_days(days.into())?))
            .map(Value::Date)
            .unwrap_or(Value::Null),
        DuckValue::Timestamp(unit, value) => DateTime::from_timestamp_micros(to_micros(unit, value))
            .map(|datetime| Value::DateTime(datetime.naive_utc()))
            .unwrap_or(Value::Null),
        DuckValue::Time64(unit, value) => {
            let micros = to_micros(unit, value);
            NaiveTime::from_num_seconds_from_midnight_opt(
                (micros / 1_000_000) as u32,
                ((micros % 1_000_000) * 1_000) as u32,
            )
            .map(Value::Time)
            .unwrap_or(Value::Null)
        }
        other => Value::Text(format!("{other:?}")),
    }
}

/// Converts a cell value to a DuckDB parameter value.
///
/// Temporal values are bound as ISO text; DuckDB casts them to the type the statement expects.
pub(crate) fn to_duckdb(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(value) => DuckValue::Boolean(*value),
        Value::Int(value) => DuckValue::BigInt(*value),
        Value::Float(value) => DuckValue::Double(*value),
        Value::Text(value) => DuckValue::Text(value.clone()),
        Value::Date(value) => DuckValue::Text(value.format("%Y-%m-%d").to_string()),
        Value::DateTime(value) => DuckValue::Text(value.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        Value::Time(value) => DuckValue::Text(value.format("%H:%M:%S%.6f").to_string()),
    }
}
