use crate::mapping::convert::ConversionError;
use crate::mapping::convert::FromValue;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeDelta;
use std::fmt;

/// A single scalar value read from a worksheet, a CSV file or a query result.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Empty cell or SQL NULL
    #[default]
    Null,
    /// Boolean values (true/false)
    Bool(bool),
    /// 64-bit signed integers
    Int(i64),
    /// Double-precision floating point numbers
    Float(f64),
    /// Text
    Text(String),
    /// Date without time component
    Date(NaiveDate),
    /// Date and time with microsecond precision
    DateTime(NaiveDateTime),
    /// Time without date component
    Time(NaiveTime),
}

impl Value {
    /// Returns true for NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for NULL and for empty text.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Returns true for integers and floats.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Returns the text if this is a textual value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Name of the runtime type, used in conversion messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "bigint",
            Value::Float(_) => "double",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::DateTime(_) => "timestamp",
            Value::Time(_) => "time",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
            Value::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Value::DateTime(value) => write!(f, "{value}"),
            Value::Time(value) => write!(f, "{value}"),
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    String => Text,
    &str => Text,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    NaiveTime => Time,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// An immutable cell: a wrapper around exactly one [`Value`].
///
/// Equality and stringification are value-based.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cell {
    value: Value,
}

impl Cell {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Converts the value to `T` with the same rules used when populating record fields.
    pub fn cast<T: FromValue>(&self) -> Result<T, ConversionError> {
        T::from_value(self.value.clone())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        Self { value }
    }
}

impl PartialEq<Value> for Cell {
    fn eq(&self, other: &Value) -> bool {
        &self.value == other
    }
}

impl PartialEq<&str> for Cell {
    fn eq(&self, other: &&str) -> bool {
        self.value.as_str() == Some(*other)
    }
}

/// Converts a spreadsheet serial date number to a timestamp.
///
/// Serial numbers count days from 1899-12-30. Serials below 60 are shifted by one day
/// because spreadsheets treat 1900 as a leap year.
pub(crate) fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(TimeDelta::try_days(days + if days < 60 { 1 } else { 0 })?)?;
    let micros = (serial.fract() * 86_400_000_000f64).round() as i64;
    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::microseconds(micros))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_value_based() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::from("x").to_string(), "x");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2024-03-09");
        assert_eq!(
            Value::DateTime(date.and_hms_opt(8, 30, 0).unwrap()).to_string(),
            "2024-03-09 08:30:00"
        );
    }

    #[test]
    fn cells_compare_by_value() {
        assert_eq!(Cell::new("ACME"), Cell::new(String::from("ACME")));
        assert_eq!(Cell::new("ACME"), "ACME");
        assert_eq!(Cell::new(5), Value::Int(5));
        assert_ne!(Cell::new(5), Cell::new(5.0));
        assert!(Cell::default().is_null());
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn empty_values() {
        assert!(Value::Null.is_empty());
        assert!(Value::from("").is_empty());
        assert!(!Value::from(" ").is_empty());
        assert!(!Value::Int(0).is_empty());
    }

    #[test]
    fn serial_dates() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(from_serial(1.0).unwrap().date(), date(1900, 1, 1));
        assert_eq!(from_serial(59.0).unwrap().date(), date(1900, 2, 28));
        assert_eq!(from_serial(61.0).unwrap().date(), date(1900, 3, 1));
        assert_eq!(from_serial(45292.0).unwrap().date(), date(2024, 1, 1));
        assert_eq!(
            from_serial(45292.5).unwrap(),
            date(2024, 1, 1).and_hms_opt(12, 0, 0).unwrap()
        );
        assert_eq!(from_serial(-1.0), None);
    }
}
