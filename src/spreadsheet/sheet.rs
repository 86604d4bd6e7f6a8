use crate::database::range::CellRange;
use crate::spreadsheet::cell::Value;

/// Last column of a worksheet (`XFD`, 0-based).
const MAX_COLUMN: usize = 16_383;

/// A worksheet's used area: a rectangular grid of values anchored at an absolute position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    /// Row of the first grid row (0-based, absolute)
    pub(crate) row_lower_bound: usize,
    /// Column of the first grid column (0-based, absolute)
    pub(crate) col_lower_bound: usize,
    /// Grid rows; shorter rows are padded with nulls when read
    pub(crate) rows: Vec<Vec<Value>>,
}

impl Sheet {
    /// Creates a sheet whose first cell sits at `(row_lower_bound, col_lower_bound)`.
    pub fn new(name: &str, row_lower_bound: usize, col_lower_bound: usize, rows: Vec<Vec<Value>>) -> Self {
        Self {
            name: name.to_owned(),
            row_lower_bound,
            col_lower_bound,
            rows,
        }
    }

    /// Creates a sheet whose first cell is `A1`.
    pub fn from_rows(name: &str, rows: Vec<Vec<Value>>) -> Self {
        Self::new(name, 0, 0, rows)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.is_empty())
    }

    /// Last used row (0-based, absolute).
    pub(crate) fn row_upper_bound(&self) -> Option<usize> {
        (!self.rows.is_empty()).then(|| self.row_lower_bound + self.rows.len() - 1)
    }

    /// Last used column (0-based, absolute).
    pub(crate) fn col_upper_bound(&self) -> Option<usize> {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        (width > 0).then(|| self.col_lower_bound + width - 1)
    }

    /// Gets the value at an absolute position. Positions outside the used area are null.
    pub fn get(&self, row: usize, col: usize) -> &Value {
        const NULL: &Value = &Value::Null;
        row.checked_sub(self.row_lower_bound)
            .zip(col.checked_sub(self.col_lower_bound))
            .and_then(|(row, col)| self.rows.get(row)?.get(col))
            .unwrap_or(NULL)
    }

    /// Copies the cells of a range into a rectangular grid.
    ///
    /// Unbounded sides of the range fall back to the used area of the sheet. Rows below the used
    /// area are never materialized.
    pub(crate) fn extract(&self, range: &CellRange) -> Vec<Vec<Value>> {
        let (Some(used_row_upper), Some(col_upper)) = (
            self.row_upper_bound(),
            range.col_upper_bound.or(self.col_upper_bound()),
        ) else {
            return Vec::new();
        };
        let col_upper = col_upper.min(MAX_COLUMN);
        let row_upper = range
            .row_upper_bound
            .map_or(used_row_upper, |row| row.min(used_row_upper));
        let row_lower = range.row_lower_bound.unwrap_or(self.row_lower_bound);
        let col_lower = range.col_lower_bound.unwrap_or(self.col_lower_bound);
        (row_lower..=row_upper)
            .map(|row| {
                (col_lower..=col_upper)
                    .map(|col| self.get(row, col).clone())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Sheet {
        Sheet::new(
            "Sheet1",
            1,
            1,
            vec![
                vec![Value::from("a"), Value::from("b")],
                vec![Value::Int(1)],
                vec![Value::Int(3), Value::Int(4)],
            ],
        )
    }

    #[test]
    fn sheet_bounds() {
        let sheet = sheet();
        assert_eq!(sheet.row_upper_bound(), Some(3));
        assert_eq!(sheet.col_upper_bound(), Some(2));
        assert_eq!(sheet.get(2, 1), &Value::Int(1));
        assert_eq!(sheet.get(2, 2), &Value::Null);
        assert_eq!(sheet.get(0, 0), &Value::Null);
        assert!(Sheet::from_rows("Empty", vec![]).is_empty());
        assert_eq!(Sheet::from_rows("Empty", vec![]).row_upper_bound(), None);
    }

    #[test]
    fn extract_used_area() {
        let grid = sheet().extract(&CellRange::default());
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1], vec![Value::Int(1), Value::Null]);
    }

    #[test]
    fn extract_explicit_range() {
        let grid = sheet().extract(&CellRange::try_from("A3:C4").unwrap());
        assert_eq!(
            grid,
            vec![
                vec![Value::Null, Value::Int(1), Value::Null],
                vec![Value::Null, Value::Int(3), Value::Int(4)],
            ]
        );
        assert!(Sheet::default().extract(&CellRange::default()).is_empty());
    }

    #[test]
    fn extract_stops_at_used_rows() {
        let grid = sheet().extract(&CellRange::try_from("B2:C1048576").unwrap());
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[2], vec![Value::Int(3), Value::Int(4)]);

        let grid = sheet().extract(&CellRange::try_from("A1:XFD1048576").unwrap());
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0].len(), 16384);
        assert!(sheet().extract(&CellRange::try_from("A9:B12").unwrap()).is_empty());
        let grid = sheet().extract(&CellRange::try_from("A2:ZZZZZZ3").unwrap());
        assert_eq!(grid[0].len(), MAX_COLUMN + 1);
    }
}
