//! Generic rows, for queries that need no declared record type.
use crate::error::SheetQueryError;
use crate::mapping::convert::FromValue;
use crate::mapping::Mapper;
use crate::mapping::MappingContext;
use crate::mapping::QueryItem;
use crate::query::expr::Projection;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::Value;
use std::collections::HashMap;
use std::ops::Deref;
use std::ops::Index;
use std::rc::Rc;

/// A row of cells addressable by column name or position.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    cells: Vec<Cell>,
    columns: Rc<Vec<String>>,
    index: Rc<HashMap<String, usize>>,
}

impl Row {
    /// Creates a row with one cell per column. Missing cells are null; extra cells are dropped.
    pub fn new(columns: Vec<String>, cells: Vec<Cell>) -> Self {
        let index = Rc::new(Self::index_of(&columns));
        Self::with_header(&Rc::new(columns), &index, cells)
    }

    fn with_header(columns: &Rc<Vec<String>>, index: &Rc<HashMap<String, usize>>, mut cells: Vec<Cell>) -> Self {
        cells.resize_with(columns.len(), Cell::default);
        Self {
            cells,
            columns: columns.clone(),
            index: index.clone(),
        }
    }

    fn index_of(columns: &[String]) -> HashMap<String, usize> {
        columns
            .iter()
            .enumerate()
            .map(|(position, name)| (name.clone(), position))
            .collect()
    }

    /// Returns the cell of a column, or `None` if the row has no such column.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.index.get(column).and_then(|position| self.cells.get(*position))
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Index<usize> for Row {
    type Output = Cell;

    fn index(&self, position: usize) -> &Cell {
        &self.cells[position]
    }
}

impl Index<&str> for Row {
    type Output = Cell;

    /// # Panics
    ///
    /// Panics if the row has no such column.
    fn index(&self, column: &str) -> &Cell {
        match self.get(column) {
            Some(cell) => cell,
            None => panic!("'{column}' is not a column of this row"),
        }
    }
}

impl IntoIterator for Row {
    type Item = Cell;
    type IntoIter = std::vec::IntoIter<Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

/// A row read without a header: cells by position only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowNoHeader(Vec<Cell>);

impl RowNoHeader {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self(cells)
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.0
    }
}

impl Deref for RowNoHeader {
    type Target = [Cell];

    fn deref(&self) -> &[Cell] {
        &self.0
    }
}

impl QueryItem for Row {
    fn mapper(context: &MappingContext) -> Result<Mapper<Self>, SheetQueryError> {
        let trim = context.arguments.trim_spaces();
        match context.projection {
            Projection::Construct(members) => {
                let mappings = context.arguments.column_mappings().clone();
                let members = members.clone();
                let source = Self::index_of(context.columns);
                let columns = Rc::new(members.iter().map(|(name, _)| name.clone()).collect::<Vec<String>>());
                let index = Rc::new(Self::index_of(&columns));
                Ok(Box::new(move |_: usize, values: Vec<Value>| {
                    let lookup = |name: &str| {
                        source
                            .get(name)
                            .and_then(|position| values.get(*position))
                            .cloned()
                            .unwrap_or_default()
                    };
                    let cells = members
                        .iter()
                        .map(|(_, expr)| Cell::from(expr.evaluate(&mappings, &lookup).trim(trim)))
                        .collect();
                    Ok(Row::with_header(&columns, &index, cells))
                }))
            }
            _ => {
                let columns = Rc::new(context.columns.to_vec());
                let index = Rc::new(Self::index_of(&columns));
                Ok(Box::new(move |_: usize, values: Vec<Value>| {
                    let cells = values.into_iter().map(|value| Cell::from(value.trim(trim))).collect();
                    Ok(Row::with_header(&columns, &index, cells))
                }))
            }
        }
    }
}

impl QueryItem for RowNoHeader {
    fn mapper(context: &MappingContext) -> Result<Mapper<Self>, SheetQueryError> {
        let trim = context.arguments.trim_spaces();
        Ok(Box::new(move |_: usize, values: Vec<Value>| {
            Ok(RowNoHeader(
                values.into_iter().map(|value| Cell::from(value.trim(trim))).collect(),
            ))
        }))
    }
}
