//! # sheetquery
//!
//! Declarative, parameterised queries over spreadsheet and CSV files, with results mapped onto
//! generic rows or typed records.
//!
//! A query is written against a worksheet, a cell range or a named range. It is compiled to SQL
//! with every literal bound as a parameter, run against an in-memory DuckDB copy of the source
//! table, and its rows are converted to the requested result type.
//!
//! ## Features
//!
//! - **Multi-format support**: Excel (`.xls`, `.xlsx`, `.xlsm`, `.xlsb`, `.xla`, `.xlam`),
//!   OpenDocument (`.ods`) and CSV files, plus workbooks built in memory
//! - **Query operators**: filters, field projections, constructed rows, ordering, `distinct`,
//!   `skip`, `take`, `reverse`, aggregates and element operators
//! - **Typed records**: column overrides, value transformations, trimming and strict schema
//!   matching
//! - **Error handling**: fail on the first bad value, or collect conversion errors per record
//! - **Header handling**: header rows name the columns; header-less ranges use `F1..Fn`
//!
//! ## Example
//!
//! ```
//! use sheetquery::field;
//! use sheetquery::record;
//! use sheetquery::spreadsheet::MemoryWorkbook;
//! use sheetquery::QueryFactory;
//! use sheetquery::Value;
//!
//! #[derive(Debug, Default)]
//! struct Company {
//!     name: String,
//!     employee_count: i64,
//! }
//!
//! record!(Company { name: "Name", employee_count: "EmployeeCount" });
//!
//! let workbook = MemoryWorkbook::new("companies.xlsx").with_sheet(
//!     "Sheet1",
//!     vec![
//!         vec![Value::from("Name"), Value::from("EmployeeCount")],
//!         vec![Value::from("ACME"), Value::Int(120)],
//!         vec![Value::from("Contoso"), Value::Int(30)],
//!     ],
//! );
//! let factory = QueryFactory::in_memory(workbook);
//! let companies = factory
//!     .worksheet::<Company>("Sheet1")?
//!     .filter(field("employee_count").gt(100))
//!     .to_vec()?;
//! assert_eq!(companies.len(), 1);
//! assert_eq!(companies[0].name, "ACME");
//! # Ok::<(), sheetquery::SheetQueryError>(())
//! ```
pub mod database;
pub mod error;
pub mod factory;
pub mod helpers;
pub mod mapping;
pub mod query;
pub mod spreadsheet;

pub use crate::error::SheetQueryError;
pub use crate::factory::QueryFactory;
pub use crate::mapping::FieldDef;
pub use crate::mapping::FieldError;
pub use crate::mapping::Record;
pub use crate::mapping::Row;
pub use crate::mapping::RowNoHeader;
pub use crate::query::arguments::QueryArguments;
pub use crate::query::arguments::Services;
pub use crate::query::arguments::StrictMapping;
pub use crate::query::arguments::TrimSpaces;
pub use crate::query::expr::column;
pub use crate::query::expr::field;
pub use crate::query::expr::lit;
pub use crate::query::expr::Expr;
pub use crate::query::Query;
pub use crate::spreadsheet::cell::Cell;
pub use crate::spreadsheet::cell::Value;
