//! # Spreadsheet Module
//!
//! Workbook access for the query backend. Excel (.xlsx, .xlsm, .xlam, .xlsb, .xls, .xla) and
//! OpenDocument (.ods) files are read through calamine, CSV files through DuckDB's CSV reader;
//! [`MemoryWorkbook`] holds sheets built in code. Every workbook exposes its sheet names, its
//! defined names and the used area of a sheet.
pub mod cell;
pub(crate) mod csv;
pub mod memory;
pub mod sheet;

use crate::error::SheetQueryError;
use crate::query::arguments::is_csv;
use crate::spreadsheet::cell::Value;
use crate::spreadsheet::csv::csv_encoding;
use crate::spreadsheet::csv::CsvWorkbook;
use crate::spreadsheet::sheet::Sheet;
use calamine::open_workbook;
use calamine::Data;
use calamine::Ods;
use calamine::OdsError;
use calamine::Range;
use calamine::Reader;
use calamine::Xls;
use calamine::XlsError;
use calamine::Xlsb;
use calamine::XlsbError;
use calamine::Xlsx;
use calamine::XlsxError;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

pub use memory::MemoryWorkbook;

/// Errors raised while opening or reading a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Error in Excel 2007+ format (.xlsx, .xlsm, .xlam)
    #[error("Invalid xlsx file format: {0}")]
    InvalidXlsxFileFormat(#[from] XlsxError),

    /// Error in Excel Binary format (.xlsb)
    #[error("Invalid xlsb file format: {0}")]
    InvalidXlsbFileFormat(#[from] XlsbError),

    /// Error in legacy Excel format (.xls, .xla)
    #[error("Invalid xls file format: {0}")]
    InvalidXlsFileFormat(#[from] XlsError),

    /// Error in OpenDocument format (.ods)
    #[error("Invalid ods file format: {0}")]
    InvalidOdsFileFormat(#[from] OdsError),

    /// Unsupported or unrecognized file format
    #[error("Cannot detect file format for '{name}'")]
    InvalidFileFormat { name: String },

    /// Defined name whose target is not a cell range
    #[error("Named range '{name}' does not refer to a cell range: '{formula}'")]
    InvalidNamedRange { name: String, formula: String },
}

/// A source of worksheets.
pub trait Workbook {
    /// Names of all worksheets, in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Defined names as `(name, formula)` pairs, e.g. `("Totals", "Sheet1!$A$1:$C$5")`.
    fn defined_names(&self) -> Vec<(String, String)>;

    /// Reads the used area of a worksheet, or `None` if the workbook has no such sheet.
    fn sheet(&mut self, name: &str) -> Result<Option<Sheet>, SheetQueryError>;
}

/// Type alias for buffered file reader
pub type FileReader = BufReader<File>;

/// Wrapper enum for the spreadsheet formats supported by calamine.
pub enum Spreadsheet {
    /// Excel 2007+ format reader (.xlsx, .xlsm, .xlam)
    Xlsx(Xlsx<FileReader>),
    /// Excel Binary format reader (.xlsb)
    Xlsb(Xlsb<FileReader>),
    /// Legacy Excel format reader (.xls, .xla)
    Xls(Xls<FileReader>),
    /// OpenDocument format reader (.ods)
    Ods(Ods<FileReader>),
}

/// Converts a calamine range into a sheet anchored at the range's start.
macro_rules! range_to_sheet {
    ($name:expr, $range:expr) => {{
        let range: Range<Data> = $range;
        let (row, col) = range.start().unwrap_or((0, 0));
        Sheet::new(
            $name,
            row as usize,
            col as usize,
            range
                .rows()
                .map(|cells| cells.iter().map(to_value).collect())
                .collect(),
        )
    }};
}

impl Spreadsheet {
    /// Opens a spreadsheet file and returns the appropriate reader.
    ///
    /// The format is selected by file extension:
    /// - `.xlsx`, `.xlsm`, `.xlam` - Excel 2007+ format
    /// - `.xlsb` - Excel Binary format
    /// - `.xls`, `.xla` - Legacy Excel format
    /// - `.ods` - OpenDocument format
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the spreadsheet file
    ///
    /// # Returns
    ///
    /// * `Result<Spreadsheet, SpreadsheetError>` - The appropriate reader or error
    pub fn open<P>(path: P) -> Result<Spreadsheet, SpreadsheetError>
    where
        P: AsRef<Path>,
    {
        let extension = path
            .as_ref()
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") | Some("xlam") => Ok(Self::Xlsx(open_workbook(path)?)),
            Some("xlsb") => Ok(Self::Xlsb(open_workbook(path)?)),
            Some("xls") | Some("xla") => Ok(Self::Xls(open_workbook(path)?)),
            Some("ods") => Ok(Self::Ods(open_workbook(path)?)),
            _ => Err(SpreadsheetError::InvalidFileFormat {
                name: path.as_ref().to_string_lossy().to_string(),
            }),
        }
    }
}

impl Workbook for Spreadsheet {
    fn sheet_names(&self) -> Vec<String> {
        match self {
            Self::Xlsx(xlsx) => xlsx.sheet_names(),
            Self::Xlsb(xlsb) => xlsb.sheet_names(),
            Self::Xls(xls) => xls.sheet_names(),
            Self::Ods(ods) => ods.sheet_names(),
        }
    }

    fn defined_names(&self) -> Vec<(String, String)> {
        match self {
            Self::Xlsx(xlsx) => xlsx.defined_names().to_vec(),
            Self::Xlsb(xlsb) => xlsb.defined_names().to_vec(),
            Self::Xls(xls) => xls.defined_names().to_vec(),
            Self::Ods(ods) => ods.defined_names().to_vec(),
        }
    }

    fn sheet(&mut self, name: &str) -> Result<Option<Sheet>, SheetQueryError> {
        if !self.sheet_names().iter().any(|sheet| sheet == name) {
            return Ok(None);
        }
        let sheet = match self {
            Self::Xlsx(xlsx) => range_to_sheet!(name, xlsx.worksheet_range(name).map_err(SpreadsheetError::from)?),
            Self::Xlsb(xlsb) => range_to_sheet!(name, xlsb.worksheet_range(name).map_err(SpreadsheetError::from)?),
            Self::Xls(xls) => range_to_sheet!(name, xls.worksheet_range(name).map_err(SpreadsheetError::from)?),
            Self::Ods(ods) => range_to_sheet!(name, ods.worksheet_range(name).map_err(SpreadsheetError::from)?),
        };
        Ok(Some(sheet))
    }
}

/// Converts a calamine cell to a value.
///
/// Date cells below serial 1 are times, whole serials are dates. Error cells read as null.
fn to_value(data: &Data) -> Value {
    match data {
        Data::Int(value) => Value::Int(*value),
        Data::Float(value) => Value::Float(*value),
        Data::String(value) => Value::Text(value.to_owned()),
        Data::Bool(value) => Value::Bool(*value),
        Data::DateTime(value) if value.is_datetime() => match value.as_datetime() {
            Some(datetime) if value.as_f64() < 1.0 => Value::Time(datetime.time()),
            Some(datetime) if value.as_f64().fract() == 0.0 => Value::Date(datetime.date()),
            Some(datetime) => Value::DateTime(datetime),
            None => Value::Float(value.as_f64()),
        },
        Data::DateTime(value) => Value::Float(value.as_f64()),
        Data::DateTimeIso(value) => parse_iso(value),
        Data::DurationIso(value) => Value::Text(value.to_owned()),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

fn parse_iso(value: &str) -> Value {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        Value::DateTime(datetime)
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Value::Date(date)
    } else if let Ok(time) = NaiveTime::parse_from_str(value, "%H:%M:%S%.f") {
        Value::Time(time)
    } else {
        Value::Text(value.to_owned())
    }
}

/// Returns true for defined names that are user-visible ranges.
/// Built-in names such as the autofilter database and print areas are excluded.
pub(crate) fn is_user_range(name: &str) -> bool {
    !name.contains("FilterDatabase") && !name.contains("Print_Area") && !name.contains("Print_Titles")
}

/// Splits a defined-name formula such as `'My Sheet'!$A$1:$C$5` into sheet and range.
pub(crate) fn parse_defined_name(formula: &str) -> Option<(String, String)> {
    let formula = formula.trim_start_matches('=');
    let (sheet, range) = formula.rsplit_once('!')?;
    let sheet = sheet
        .strip_prefix('\'')
        .and_then(|sheet| sheet.strip_suffix('\''))
        .map(|sheet| sheet.replace("''", "'"))
        .unwrap_or_else(|| sheet.to_owned());
    Some((sheet, range.replace('$', "")))
}

/// Opens a workbook file by extension. The code page only applies to CSV files.
pub(crate) fn open(source: &str, code_page: u32) -> Result<Box<dyn Workbook>, SheetQueryError> {
    // Missing and unreadable files fail with an I/O error before a reader is chosen
    std::fs::metadata(source)?;
    if is_csv(source) {
        Ok(Box::new(CsvWorkbook::new(source, csv_encoding(code_page)?)))
    } else {
        Ok(Box::new(Spreadsheet::open(source)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_name_formulas() {
        assert_eq!(
            parse_defined_name("Sheet1!$A$1:$C$5"),
            Some((String::from("Sheet1"), String::from("A1:C5")))
        );
        assert_eq!(
            parse_defined_name("='Bob''s Sheet'!$B$2:$D$9"),
            Some((String::from("Bob's Sheet"), String::from("B2:D9")))
        );
        assert_eq!(parse_defined_name("42"), None);
    }

    #[test]
    fn built_in_names_are_hidden() {
        assert!(is_user_range("Totals"));
        assert!(!is_user_range("_xlnm._FilterDatabase"));
        assert!(!is_user_range("Sheet1!Print_Area"));
    }

    #[test]
    fn calamine_cells() {
        assert_eq!(to_value(&Data::Int(3)), Value::Int(3));
        assert_eq!(to_value(&Data::String(String::from("x"))), Value::from("x"));
        assert_eq!(to_value(&Data::Empty), Value::Null);
        assert_eq!(
            to_value(&Data::DateTimeIso(String::from("2024-01-01"))),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn unknown_extension() {
        assert!(matches!(
            Spreadsheet::open("companies.txt"),
            Err(SpreadsheetError::InvalidFileFormat { .. })
        ));
    }
}
