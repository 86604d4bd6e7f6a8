use crate::spreadsheet::cell::Value;

/// Supported column data types for loaded worksheet data.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum ColumnType {
    /// Boolean values (true/false)
    Boolean,
    /// 64-bit signed integers
    BigInt,
    /// Double-precision floating point numbers
    Double,
    /// Variable-length strings
    Varchar,
    /// Date and time with microsecond precision
    Timestamp,
    /// Date without time component
    Date,
    /// Time without date component
    Time,
}

/// A column of a loaded table with name and data type.
#[derive(Clone, Debug)]
pub(crate) struct Column {
    /// Column name (from header row or generated)
    pub(crate) name: String,
    /// Column data type
    pub(crate) kind: ColumnType,
}

impl ColumnType {
    /// Returns the DuckDB type name.
    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
        }
    }

    /// Infers the column type of a single cell value. Empty cells have no type.
    pub(crate) fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Text(text) if text.is_empty() => None,
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Int(_) => Some(ColumnType::BigInt),
            Value::Float(number) if number.fract() == 0.0 && number.abs() < 9.0e15 => Some(ColumnType::BigInt),
            Value::Float(_) => Some(ColumnType::Double),
            Value::Text(_) => Some(ColumnType::Varchar),
            Value::Date(_) => Some(ColumnType::Date),
            Value::DateTime(_) => Some(ColumnType::Timestamp),
            Value::Time(_) => Some(ColumnType::Time),
        }
    }

    /// Detects the most specific common type from a collection of candidate types.
    /// Falls back to VARCHAR if types are inconsistent or empty.
    pub(crate) fn detect(types: Vec<Option<ColumnType>>) -> ColumnType {
        let types: Vec<ColumnType> = types.into_iter().flatten().collect();
        if types.is_empty() {
            ColumnType::Varchar
        } else if types.iter().all(|kind| kind.is_boolean()) {
            ColumnType::Boolean
        } else if types.iter().all(|kind| kind.is_int()) {
            ColumnType::BigInt
        } else if types.iter().all(|kind| kind.is_float()) {
            ColumnType::Double
        } else if types.iter().all(|kind| kind.is_date()) {
            ColumnType::Date
        } else if types.iter().all(|kind| kind.is_time()) {
            ColumnType::Time
        } else if types.iter().all(|kind| kind.is_datetime()) {
            ColumnType::Timestamp
        } else {
            ColumnType::Varchar
        }
    }

    /// Converts a cell value into the representation this column stores.
    pub(crate) fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (_, Value::Text(text)) if text.is_empty() => Value::Null,
            (ColumnType::BigInt, Value::Float(number)) => Value::Int(number as i64),
            (ColumnType::Double, Value::Int(number)) => Value::Float(number as f64),
            (ColumnType::Timestamp, Value::Date(date)) => date
                .and_hms_opt(0, 0, 0)
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
            (ColumnType::Varchar, Value::Text(text)) => Value::Text(text),
            (ColumnType::Varchar, other) => Value::Text(other.to_string()),
            (_, other) => other,
        }
    }

    /// Returns true if this column type represents boolean values.
    #[inline]
    pub(crate) fn is_boolean(&self) -> bool {
        matches!(self, ColumnType::Boolean)
    }

    /// Returns true if this column type represents integer values.
    #[inline]
    pub(crate) fn is_int(&self) -> bool {
        matches!(self, ColumnType::BigInt)
    }

    /// Returns true if this column type represents numeric values (integer or floating point).
    #[inline]
    pub(crate) fn is_float(&self) -> bool {
        matches!(self, ColumnType::BigInt | ColumnType::Double)
    }

    /// Returns true if this column type represents date values.
    #[inline]
    pub(crate) fn is_date(&self) -> bool {
        matches!(self, ColumnType::Date)
    }

    /// Returns true if this column type represents time values.
    #[inline]
    pub(crate) fn is_time(&self) -> bool {
        matches!(self, ColumnType::Time)
    }

    /// Returns true if this column type represents date/time related values.
    #[inline]
    pub(crate) fn is_datetime(&self) -> bool {
        matches!(self, ColumnType::Timestamp | ColumnType::Date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn detect_common_type() {
        let detect = |values: Vec<Value>| ColumnType::detect(values.iter().map(ColumnType::of).collect());
        assert_eq!(detect(vec![Value::Int(1), Value::Null, Value::Float(2.0)]), ColumnType::BigInt);
        assert_eq!(detect(vec![Value::Int(1), Value::Float(2.5)]), ColumnType::Double);
        assert_eq!(detect(vec![Value::Bool(true)]), ColumnType::Boolean);
        assert_eq!(detect(vec![Value::Int(1), Value::from("x")]), ColumnType::Varchar);
        assert_eq!(detect(vec![Value::Null, Value::from("")]), ColumnType::Varchar);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(detect(vec![Value::Date(date)]), ColumnType::Date);
        assert_eq!(
            detect(vec![Value::Date(date), Value::DateTime(date.and_hms_opt(1, 0, 0).unwrap())]),
            ColumnType::Timestamp
        );
    }

    #[test]
    fn coerce_values() {
        assert_eq!(ColumnType::Double.coerce(Value::Int(2)), Value::Float(2.0));
        assert_eq!(ColumnType::BigInt.coerce(Value::Float(2.0)), Value::Int(2));
        assert_eq!(ColumnType::Varchar.coerce(Value::Int(2)), Value::from("2"));
        assert_eq!(ColumnType::Varchar.coerce(Value::from("")), Value::Null);
        assert_eq!(ColumnType::Boolean.coerce(Value::Bool(true)), Value::Bool(true));
    }
}
