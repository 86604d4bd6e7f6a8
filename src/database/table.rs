use crate::database::column::Column;
use crate::database::column::ColumnType;
use crate::spreadsheet::cell::Value;
use std::collections::HashSet;

/// A table extracted from a worksheet range, ready to be loaded into the backend.
#[derive(Clone, Debug)]
pub(crate) struct Table {
    /// Table name
    pub(crate) name: String,
    /// Column definitions
    pub(crate) columns: Vec<Column>,
    /// Data rows, coerced to the column types
    pub(crate) rows: Vec<Vec<Value>>,
}

impl Table {
    /// Builds a table from a rectangular grid.
    ///
    /// With a header the first grid row supplies the column names: blank names become `F<n>`
    /// and repeated names get a numeric suffix. Without a header columns are named `F1..Fn`.
    /// A grid without any column yields a single empty `F1` column.
    pub(crate) fn from_grid(name: &str, mut grid: Vec<Vec<Value>>, header: bool) -> Self {
        let width = grid.first().map(Vec::len).unwrap_or(0).max(1);
        let names = if header && !grid.is_empty() {
            let titles = grid.remove(0);
            Self::header_names(&titles, width)
        } else {
            (1..=width).map(|index| format!("F{index}")).collect()
        };
        let columns: Vec<Column> = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Column {
                name,
                kind: ColumnType::detect(
                    grid.iter()
                        .map(|row| row.get(index).and_then(ColumnType::of))
                        .collect(),
                ),
            })
            .collect();
        let rows = grid
            .into_iter()
            .map(|row| {
                let mut row = row.into_iter();
                columns
                    .iter()
                    .map(|column| column.kind.coerce(row.next().unwrap_or_default()))
                    .collect()
            })
            .collect();
        Self {
            name: name.to_owned(),
            columns,
            rows,
        }
    }

    fn header_names(titles: &[Value], width: usize) -> Vec<String> {
        let mut seen = HashSet::<String>::new();
        (0..width)
            .map(|index| {
                let title = titles
                    .get(index)
                    .map(|value| value.to_string().trim().to_owned())
                    .filter(|title| !title.is_empty())
                    .unwrap_or_else(|| format!("F{}", index + 1));
                let mut name = title.clone();
                let mut suffix = 1;
                while !seen.insert(name.to_ascii_lowercase()) {
                    name = format!("{title}{suffix}");
                    suffix += 1;
                }
                name
            })
            .collect()
    }

    pub(crate) fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_names_columns() {
        let table = Table::from_grid(
            "Sheet1",
            vec![
                vec![Value::from("Name"), Value::Null, Value::from("Name")],
                vec![Value::from("ACME"), Value::Int(1), Value::Float(2.5)],
                vec![Value::from("Contoso"), Value::Null, Value::Int(3)],
            ],
            true,
        );
        assert_eq!(table.column_names(), vec!["Name", "F2", "Name1"]);
        assert_eq!(table.columns[1].kind, ColumnType::BigInt);
        assert_eq!(table.columns[2].kind, ColumnType::Double);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][2], Value::Float(3.0));
    }

    #[test]
    fn positional_names_without_header() {
        let table = Table::from_grid(
            "Sheet1",
            vec![vec![Value::from("a"), Value::Int(1)]],
            false,
        );
        assert_eq!(table.column_names(), vec!["F1", "F2"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn empty_grid() {
        let table = Table::from_grid("Sheet1", vec![], true);
        assert_eq!(table.column_names(), vec!["F1"]);
        assert!(table.rows.is_empty());
    }
}
