//! Coercion of raw cell values into the declared types of record fields.
use crate::query::arguments::TrimSpaces;
use crate::spreadsheet::cell::from_serial;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::Value;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use thiserror::Error;

/// Errors raised while coercing a value to a field type.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Cannot convert {kind} value '{value}' to {target}")]
    Incompatible {
        value: String,
        kind: &'static str,
        target: &'static str,
    },

    #[error("Value '{value}' is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("Transformation failed: {0}")]
    Transform(anyhow::Error),
}

impl ConversionError {
    fn incompatible(value: &Value, target: &'static str) -> Self {
        ConversionError::Incompatible {
            value: value.to_string(),
            kind: value.kind(),
            target,
        }
    }
}

/// Types a record field can be declared with.
///
/// A NULL value converts to the type's default, except for `Option<T>` which yields `None`.
pub trait FromValue: Sized {
    const TYPE_NAME: &'static str;

    fn from_value(value: Value) -> Result<Self, ConversionError>;

    /// Applies the trim policy. Only textual types are affected.
    fn trim(self, _policy: TrimSpaces) -> Self {
        self
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "text";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(text) => Ok(text),
            other => Ok(other.to_string()),
        }
    }

    fn trim(self, policy: TrimSpaces) -> Self {
        policy.apply(&self)
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "bigint";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match &value {
            Value::Null => Ok(0),
            Value::Int(number) => Ok(*number),
            Value::Bool(flag) => Ok(*flag as i64),
            Value::Float(number) if number.is_finite() => {
                let rounded = number.round();
                if rounded >= i64::MIN as f64 && rounded <= i64::MAX as f64 {
                    Ok(rounded as i64)
                } else {
                    Err(ConversionError::OutOfRange {
                        value: value.to_string(),
                        target: Self::TYPE_NAME,
                    })
                }
            }
            Value::Text(text) => match text.as_str().trim().parse::<i64>() {
                Ok(number) => Ok(number),
                Err(_) => match text.as_str().trim().parse::<f64>() {
                    Ok(number) => Self::from_value(Value::Float(number))
                        .map_err(|_| ConversionError::incompatible(&value, Self::TYPE_NAME)),
                    Err(_) => Err(ConversionError::incompatible(&value, Self::TYPE_NAME)),
                },
            },
            _ => Err(ConversionError::incompatible(&value, Self::TYPE_NAME)),
        }
    }
}

impl FromValue for i32 {
    const TYPE_NAME: &'static str = "integer";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        let display = value.to_string();
        let number = i64::from_value(value).map_err(|e| match e {
            ConversionError::Incompatible { value, kind, .. } => ConversionError::Incompatible {
                value,
                kind,
                target: Self::TYPE_NAME,
            },
            other => other,
        })?;
        i32::try_from(number).map_err(|_| ConversionError::OutOfRange {
            value: display,
            target: Self::TYPE_NAME,
        })
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "double";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match &value {
            Value::Null => Ok(0.0),
            Value::Int(number) => Ok(*number as f64),
            Value::Float(number) => Ok(*number),
            Value::Text(text) => text
                .as_str()
                .trim()
                .parse::<f64>()
                .map_err(|_| ConversionError::incompatible(&value, Self::TYPE_NAME)),
            _ => Err(ConversionError::incompatible(&value, Self::TYPE_NAME)),
        }
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match &value {
            Value::Null => Ok(false),
            Value::Bool(flag) => Ok(*flag),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            Value::Text(text) => match text.as_str().trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConversionError::incompatible(&value, Self::TYPE_NAME)),
            },
            _ => Err(ConversionError::incompatible(&value, Self::TYPE_NAME)),
        }
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

const TIME_FORMATS: [&str; 3] = ["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p"];

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| parse_date(text).and_then(|date| date.and_hms_opt(0, 0, 0)))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
}

impl FromValue for NaiveDateTime {
    const TYPE_NAME: &'static str = "timestamp";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        let converted = match &value {
            Value::Null => Some(NaiveDateTime::default()),
            Value::DateTime(datetime) => Some(*datetime),
            Value::Date(date) => date.and_hms_opt(0, 0, 0),
            Value::Int(_) | Value::Float(_) => value.as_f64().and_then(from_serial),
            Value::Text(text) => parse_datetime(text),
            _ => None,
        };
        converted.ok_or_else(|| ConversionError::incompatible(&value, Self::TYPE_NAME))
    }
}

impl FromValue for NaiveDate {
    const TYPE_NAME: &'static str = "date";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        let converted = match &value {
            Value::Null => Some(NaiveDate::default()),
            Value::Date(date) => Some(*date),
            Value::DateTime(datetime) => Some(datetime.date()),
            Value::Int(_) | Value::Float(_) => value.as_f64().and_then(from_serial).map(|it| it.date()),
            Value::Text(text) => parse_date(text).or_else(|| parse_datetime(text).map(|it| it.date())),
            _ => None,
        };
        converted.ok_or_else(|| ConversionError::incompatible(&value, Self::TYPE_NAME))
    }
}

impl FromValue for NaiveTime {
    const TYPE_NAME: &'static str = "time";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        let converted = match &value {
            Value::Null => Some(NaiveTime::default()),
            Value::Time(time) => Some(*time),
            Value::DateTime(datetime) => Some(datetime.time()),
            Value::Float(number) => from_serial(number.fract()).map(|it| it.time()),
            Value::Text(text) => parse_time(text).or_else(|| parse_datetime(text).map(|it| it.time())),
            _ => None,
        };
        converted.ok_or_else(|| ConversionError::incompatible(&value, Self::TYPE_NAME))
    }
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "value";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }

    fn trim(self, policy: TrimSpaces) -> Self {
        match self {
            Value::Text(text) => Value::Text(policy.apply(&text)),
            other => other,
        }
    }
}

impl FromValue for Cell {
    const TYPE_NAME: &'static str = "cell";

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(Cell::from(value))
    }

    fn trim(self, policy: TrimSpaces) -> Self {
        Cell::from(self.into_value().trim(policy))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn trim(self, policy: TrimSpaces) -> Self {
        self.map(|inner| inner.trim(policy))
    }
}
