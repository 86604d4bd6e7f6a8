//! # Mapping Module
//!
//! Turns the untyped rows returned by a statement into results. A result type implements
//! [`QueryItem`], which builds a row mapper once per query from the result schema; the mapper is
//! then applied to every row. Generic rows ([`Row`], [`RowNoHeader`]) and any [`Record`] are
//! supported out of the box.
pub mod convert;
pub mod record;
pub mod row;

use crate::error::SheetQueryError;
use crate::mapping::convert::ConversionError;
use crate::query::arguments::QueryArguments;
use crate::query::expr::Projection;
use crate::spreadsheet::cell::Value;
use thiserror::Error;

pub use record::FieldDef;
pub use record::Record;
pub use row::Row;
pub use row::RowNoHeader;

/// A conversion failure on one field of one row.
#[derive(Error, Debug)]
#[error("Error on row {row} and column name '{column}': {source}")]
pub struct FieldError {
    /// 1-based number of the row among the rows yielded so far
    pub row: usize,
    /// Column the value was read from
    pub column: String,
    #[source]
    pub source: ConversionError,
}

/// Declared names that do not line up with the source schema.
#[derive(Error, Debug)]
pub enum StrictMappingError {
    #[error("'{0}' property is not mapped to a column")]
    FieldNotMapped(String),

    #[error("'{0}' column is not mapped to a property")]
    ColumnNotMapped(String),
}

/// Maps one raw row, numbered from 1, to a result.
pub type Mapper<T> = Box<dyn FnMut(usize, Vec<Value>) -> Result<T, SheetQueryError>>;

/// What a mapper may know about the query it serves.
pub struct MappingContext<'a> {
    /// Columns of the result set, in order
    pub(crate) columns: &'a [String],
    /// Every column of the source table
    pub(crate) schema: &'a [String],
    pub(crate) arguments: &'a QueryArguments,
    pub(crate) projection: &'a Projection,
}

impl MappingContext<'_> {
    pub fn columns(&self) -> &[String] {
        self.columns
    }

    pub fn schema(&self) -> &[String] {
        self.schema
    }

    pub fn arguments(&self) -> &QueryArguments {
        self.arguments
    }

    pub fn projection(&self) -> &Projection {
        self.projection
    }
}

/// A type query results can be mapped to.
pub trait QueryItem: Sized + 'static {
    /// Builds the mapper for one query. Validation that depends only on the schema, such as
    /// strict mapping, happens here, before the first row.
    fn mapper(context: &MappingContext) -> Result<Mapper<Self>, SheetQueryError>;

    /// Column overrides declared by the type as `(field, column)` pairs.
    fn declared_columns() -> Vec<(String, String)> {
        Vec::new()
    }
}

impl<R: Record> QueryItem for R {
    fn mapper(context: &MappingContext) -> Result<Mapper<Self>, SheetQueryError> {
        record::mapper::<R>(context)
    }

    fn declared_columns() -> Vec<(String, String)> {
        R::fields()
            .iter()
            .filter_map(|field| {
                field
                    .column_override()
                    .map(|column| (field.name().to_owned(), column.to_owned()))
            })
            .collect()
    }
}
