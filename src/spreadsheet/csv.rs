//! Delimited text sources.
//!
//! A CSV file is a workbook with a single worksheet named after the file. The text is parsed by
//! DuckDB's `read_csv` on a private in-memory connection; every field is read as text and typed
//! here, so header rows and ranges behave exactly as they do for spreadsheets.
use crate::error::SheetQueryError;
use crate::helpers::string::base_name;
use crate::helpers::string::quote_literal;
use crate::query::arguments::ArgumentsError;
use crate::spreadsheet::cell::Value;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Workbook;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

/// Maps a Windows code page to the name DuckDB's CSV reader uses for it.
///
/// Code page 0 keeps the reader's default (UTF-8).
pub(crate) fn csv_encoding(code_page: u32) -> Result<Option<&'static str>, ArgumentsError> {
    if code_page == 0 {
        return Ok(None);
    }
    let encoding = u16::try_from(code_page)
        .ok()
        .and_then(codepage::to_encoding)
        .ok_or(ArgumentsError::UnsupportedCodePage(code_page))?;
    if encoding == encoding_rs::UTF_8 {
        Ok(Some("utf-8"))
    } else if encoding == encoding_rs::UTF_16LE {
        Ok(Some("utf-16"))
    } else if encoding == encoding_rs::WINDOWS_1252 {
        Ok(Some("latin-1"))
    } else {
        Err(ArgumentsError::UnsupportedCodePage(code_page))
    }
}

/// Types a CSV field: integers, floats, booleans, dates, timestamps and times are recognised,
/// everything else stays text.
pub(crate) fn parse_field(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Text(text.to_owned());
    }
    if let Ok(number) = trimmed.parse::<i64>() {
        Value::Int(number)
    } else if let Ok(number) = trimmed.parse::<f64>().map_err(|_| ()).and_then(|number| {
        if number.is_finite() && trimmed.chars().any(|char| char.is_ascii_digit()) {
            Ok(number)
        } else {
            Err(())
        }
    }) {
        Value::Float(number)
    } else if trimmed.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Value::Date(date)
    } else if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
    {
        Value::DateTime(datetime)
    } else if let Ok(time) = NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f") {
        Value::Time(time)
    } else {
        Value::Text(text.to_owned())
    }
}

/// A CSV file seen as a one-sheet workbook.
pub(crate) struct CsvWorkbook {
    path: String,
    encoding: Option<&'static str>,
}

impl CsvWorkbook {
    pub(crate) fn new(path: &str, encoding: Option<&'static str>) -> Self {
        Self {
            path: path.to_owned(),
            encoding,
        }
    }

    fn read(&self) -> Result<Vec<Vec<Value>>, SheetQueryError> {
        let mut options = vec![
            String::from("header = false"),
            String::from("all_varchar = true"),
            String::from("null_padding = true"),
        ];
        if let Some(encoding) = self.encoding {
            options.push(format!("encoding = {}", quote_literal(encoding)));
        }
        let sql = format!("SELECT * FROM read_csv(?, {})", options.join(", "));
        // Parse the file on a private connection so the query database only holds loaded tables
        let connection = duckdb::Connection::open_in_memory()?;
        let result = Self::query(&connection, &sql, &self.path);
        connection.close().map_err(|(_, e)| e)?;
        result
    }

    fn query(connection: &duckdb::Connection, sql: &str, path: &str) -> Result<Vec<Vec<Value>>, SheetQueryError> {
        let mut statement = connection.prepare(sql)?;
        let mut rows = statement.query([path])?;
        let width = rows.as_ref().map(|statement| statement.column_count()).unwrap_or(0);
        let mut grid = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                let field: Option<String> = row.get(index)?;
                values.push(field.map(|text| parse_field(&text)).unwrap_or_default());
            }
            grid.push(values);
        }
        Ok(grid)
    }
}

impl Workbook for CsvWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        vec![base_name(&self.path).to_owned()]
    }

    fn defined_names(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn sheet(&mut self, name: &str) -> Result<Option<Sheet>, SheetQueryError> {
        if name != base_name(&self.path) {
            return Ok(None);
        }
        Ok(Some(Sheet::from_rows(name, self.read()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn field_types() {
        assert_eq!(parse_field("42"), Value::Int(42));
        assert_eq!(parse_field("2.5"), Value::Float(2.5));
        assert_eq!(parse_field("TRUE"), Value::Bool(true));
        assert_eq!(parse_field("inf"), Value::from("inf"));
        assert_eq!(parse_field("NaN"), Value::from("NaN"));
        assert_eq!(
            parse_field("2024-01-02"),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
        assert_eq!(parse_field("  x  "), Value::from("  x  "));
        assert_eq!(parse_field("ACME"), Value::from("ACME"));
    }

    #[test]
    fn code_pages() {
        assert_eq!(csv_encoding(0).unwrap(), None);
        assert_eq!(csv_encoding(65001).unwrap(), Some("utf-8"));
        assert_eq!(csv_encoding(1252).unwrap(), Some("latin-1"));
        assert!(matches!(csv_encoding(932), Err(ArgumentsError::UnsupportedCodePage(932))));
        assert!(matches!(csv_encoding(70000), Err(ArgumentsError::UnsupportedCodePage(70000))));
    }

    #[test]
    fn read_csv_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Name,EmployeeCount").unwrap();
        writeln!(file, "ACME,120").unwrap();
        writeln!(file, "Contoso,").unwrap();
        let path = file.path().to_string_lossy().to_string();
        let mut workbook = CsvWorkbook::new(&path, None);
        let name = workbook.sheet_names().remove(0);
        let sheet = workbook.sheet(&name).unwrap().unwrap();
        assert_eq!(sheet.get(0, 0), &Value::from("Name"));
        assert_eq!(sheet.get(1, 1), &Value::Int(120));
        assert_eq!(sheet.get(2, 1), &Value::Null);
        assert!(workbook.sheet("other.csv").unwrap().is_none());
    }
}
