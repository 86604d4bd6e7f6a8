use crate::error::SheetQueryError;
use crate::helpers::reference::column_index;
use crate::helpers::string::quote_identifier;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]*)(\d*)(:([A-Z]*)(\d*))?$").expect("Hardcode regex pattern"));

/// Errors related to spreadsheet-style range parsing.
#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String),
}

/// A spreadsheet-style cell range with optional boundaries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CellRange {
    /// Lower row bound (0-based index), None for unbounded
    pub(crate) row_lower_bound: Option<usize>,
    /// Upper row bound (0-based index), None for unbounded
    pub(crate) row_upper_bound: Option<usize>,
    /// Lower column bound (0-based index), None for unbounded
    pub(crate) col_lower_bound: Option<usize>,
    /// Upper column bound (0-based index), None for unbounded
    pub(crate) col_upper_bound: Option<usize>,
}

fn row_to_index(row: &str) -> Option<usize> {
    row.parse::<usize>().ok().filter(|row| *row > 0).map(|row| row - 1)
}

fn col_to_index(col: &str) -> Option<usize> {
    column_index(col).map(|col| col - 1)
}

impl TryFrom<&str> for CellRange {
    type Error = SheetQueryError;

    /// Parses a range string (e.g., "A1", "B2:C5", "A:C", "1:10", "$A$1:$D$8").
    /// Supports single cells, ranges, and partial ranges (columns or rows only).
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.replace('$', "").to_ascii_uppercase();
        let captures = RANGE
            .captures(value.as_str())
            .ok_or(RangeError::FormatError(value.to_owned()))?;
        let part = |index: usize| captures.get(index).map(|matcher| matcher.as_str());
        let mut range = CellRange {
            col_lower_bound: part(1).and_then(col_to_index),
            row_lower_bound: part(2).and_then(row_to_index),
            col_upper_bound: part(4).and_then(col_to_index),
            row_upper_bound: part(5).and_then(row_to_index),
        };
        if captures.get(3).is_none() {
            // A single cell selects exactly itself
            range.col_upper_bound = range.col_lower_bound;
            range.row_upper_bound = range.row_lower_bound;
        }
        Ok(range)
    }
}

impl CellRange {
    /// Builds the range spanned by an optional start and an optional end reference.
    pub(crate) fn between(start: Option<&str>, end: Option<&str>) -> Result<Self, SheetQueryError> {
        let start = start.map(CellRange::try_from).transpose()?.unwrap_or_default();
        let end = end.map(CellRange::try_from).transpose()?.unwrap_or_default();
        Ok(CellRange {
            row_lower_bound: start.row_lower_bound,
            col_lower_bound: start.col_lower_bound,
            row_upper_bound: end.row_upper_bound,
            col_upper_bound: end.col_upper_bound,
        })
    }
}

/// The table a statement reads from: a worksheet, optionally narrowed to a range, or a named range.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub worksheet: String,
    pub named_range: Option<String>,
    pub start_range: Option<String>,
    pub end_range: Option<String>,
    pub header: bool,
}

impl TableRef {
    /// Schema holding tables loaded without a header row.
    pub(crate) const NO_HEADER_SCHEMA: &'static str = "noheader";

    /// Table name inside the backend: `Sheet1`, `Sheet1$A2:D8` or `MyRange`.
    pub fn table_name(&self) -> String {
        if let Some(named_range) = &self.named_range {
            return named_range.clone();
        }
        match (&self.start_range, &self.end_range) {
            (None, None) => self.worksheet.clone(),
            (start, end) => format!(
                "{}${}:{}",
                self.worksheet,
                start.as_deref().unwrap_or("").to_ascii_uppercase(),
                end.as_deref().unwrap_or("").to_ascii_uppercase()
            ),
        }
    }

    /// Fully qualified, quoted table name for use in SQL text.
    pub fn qualified_name(&self) -> String {
        if self.header {
            quote_identifier(&self.table_name())
        } else {
            format!(
                "{}.{}",
                quote_identifier(Self::NO_HEADER_SCHEMA),
                quote_identifier(&self.table_name())
            )
        }
    }

    pub(crate) fn cell_range(&self) -> Result<CellRange, SheetQueryError> {
        CellRange::between(self.start_range.as_deref(), self.end_range.as_deref())
    }
}
