//! # Database Module
//!
//! The backend a statement runs against. A [`ConnectionProvider`] turns query arguments into a
//! [`Connection`]; the connection answers schema questions and executes statements, returning
//! a [`RowCursor`]. The bundled implementation loads worksheets into an in-memory DuckDB
//! database (see [`duckdb`]).
pub(crate) mod bridge;
pub(crate) mod column;
pub mod duckdb;
pub mod range;
pub(crate) mod table;

use crate::database::range::TableRef;
use crate::error::SheetQueryError;
use crate::query::arguments::QueryArguments;
use crate::query::statement::Statement;
use crate::spreadsheet::cell::Value;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors raised when the statement does not match the source's schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("'{worksheet}' is not a valid worksheet name in file {source_name}. Valid worksheet names are: '{}'. Error received: {message}", .available.join("', '"))]
    WorksheetNotFound {
        worksheet: String,
        source_name: String,
        available: Vec<String>,
        message: String,
    },

    #[error("Worksheet index {index} is out of range: the file has {count} worksheets")]
    WorksheetIndexOutOfRange { index: usize, count: usize },

    #[error("'{name}' is not a valid named range. Valid named ranges are: '{}'", .available.join("', '"))]
    NamedRangeNotFound { name: String, available: Vec<String> },

    #[error("'{column}' is not a valid column name. Valid column names are: '{}'", .available.join("', '"))]
    InvalidColumn { column: String, available: Vec<String> },
}

/// Errors raised by the connection itself.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection is not open")]
    NotOpen,

    #[error("Read-only connection refuses statement: {0}")]
    ReadOnly(String),
}

/// Creates connections for query arguments.
pub trait ConnectionProvider {
    /// Returns a connection for the arguments' source. The connection is not open yet.
    fn connect(&self, arguments: &QueryArguments) -> Result<Box<dyn Connection>, SheetQueryError>;
}

/// An open-able handle to one source file.
pub trait Connection {
    fn open(&mut self) -> Result<(), SheetQueryError>;

    fn is_open(&self) -> bool;

    /// Names of all worksheets, in workbook order.
    fn worksheet_names(&mut self) -> Result<Vec<String>, SheetQueryError>;

    /// Names of the user-defined named ranges.
    fn named_ranges(&mut self) -> Result<Vec<String>, SheetQueryError>;

    /// Column names of a worksheet, range or named range.
    fn column_names(&mut self, table: &TableRef) -> Result<Vec<String>, SheetQueryError>;

    /// Runs a statement and returns its rows.
    fn execute(&mut self, statement: &Statement) -> Result<RowCursor, SheetQueryError>;

    fn close(&mut self) -> Result<(), SheetQueryError>;
}

/// Rows returned by a statement, handed out one at a time.
#[derive(Clone, Debug, Default)]
pub struct RowCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
}

impl RowCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    /// Column names of the result set.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn next_row(&mut self) -> Option<Vec<Value>> {
        self.rows.pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}
