use crate::error::SheetQueryError;
use crate::spreadsheet::cell::Value;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Workbook;

/// A workbook held in memory.
///
/// ```
/// use sheetquery::spreadsheet::MemoryWorkbook;
/// use sheetquery::Value;
///
/// let workbook = MemoryWorkbook::new("companies.xlsx")
///     .with_sheet("Sheet1", vec![
///         vec![Value::from("Name"), Value::from("EmployeeCount")],
///         vec![Value::from("ACME"), Value::from(120)],
///     ])
///     .with_named_range("Staff", "Sheet1!$A$1:$B$2");
/// assert_eq!(workbook.name(), "companies.xlsx");
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryWorkbook {
    name: String,
    sheets: Vec<Sheet>,
    named_ranges: Vec<(String, String)>,
}

impl MemoryWorkbook {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// The source name queries use for this workbook.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a sheet whose first row is row 1, replacing any sheet with the same name.
    pub fn with_sheet(self, name: &str, rows: Vec<Vec<Value>>) -> Self {
        self.with(Sheet::from_rows(name, rows))
    }

    /// Adds a prepared sheet, replacing any sheet with the same name.
    pub fn with(mut self, sheet: Sheet) -> Self {
        self.sheets.retain(|existing| existing.name != sheet.name);
        self.sheets.push(sheet);
        self
    }

    /// Defines a named range, e.g. `with_named_range("Totals", "Sheet1!$A$1:$C$5")`.
    pub fn with_named_range(mut self, name: &str, formula: &str) -> Self {
        self.named_ranges.push((name.to_owned(), formula.to_owned()));
        self
    }
}

impl Workbook for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    fn defined_names(&self) -> Vec<(String, String)> {
        self.named_ranges.clone()
    }

    fn sheet(&mut self, name: &str) -> Result<Option<Sheet>, SheetQueryError> {
        Ok(self.sheets.iter().find(|sheet| sheet.name == name).cloned())
    }
}
