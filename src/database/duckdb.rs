//! The bundled backend: an in-memory DuckDB database per connection.
//!
//! Tables are loaded lazily. The first statement that names a worksheet, range or named range
//! reads the cells through the workbook, detects a type per column and loads the rows. Tables
//! without a header row live in the `noheader` schema so they never clash with their headed twin.
use crate::database::bridge::from_duckdb;
use crate::database::bridge::to_duckdb;
use crate::database::range::CellRange;
use crate::database::range::TableRef;
use crate::database::table::Table;
use crate::database::Connection;
use crate::database::ConnectionError;
use crate::database::ConnectionProvider;
use crate::database::RowCursor;
use crate::database::SchemaError;
use crate::error::ResultMessage;
use crate::error::SheetQueryError;
use crate::helpers::string::quote_identifier;
use crate::query::arguments::QueryArguments;
use crate::query::arguments::Services;
use crate::query::statement::Statement;
use crate::spreadsheet;
use crate::spreadsheet::is_user_range;
use crate::spreadsheet::parse_defined_name;
use crate::spreadsheet::MemoryWorkbook;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::Workbook;
use ::duckdb::params_from_iter;
use ::duckdb::types::Value as DuckValue;
use ::duckdb::Config;
use std::collections::HashMap;

/// Creates DuckDB connections, reading files from disk or serving one in-memory workbook.
#[derive(Clone, Debug, Default)]
pub struct DuckDbProvider {
    workbook: Option<MemoryWorkbook>,
}

impl DuckDbProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose connections read `workbook` instead of the source file.
    pub fn with_workbook(workbook: MemoryWorkbook) -> Self {
        Self {
            workbook: Some(workbook),
        }
    }
}

impl ConnectionProvider for DuckDbProvider {
    fn connect(&self, arguments: &QueryArguments) -> Result<Box<dyn Connection>, SheetQueryError> {
        Ok(Box::new(DuckDbConnection {
            source: arguments.source().to_owned(),
            code_page: arguments.code_page(),
            services: arguments.services(),
            read_only: arguments.read_only(),
            memory: self.workbook.clone(),
            state: None,
        }))
    }
}

struct OpenState {
    database: ::duckdb::Connection,
    workbook: Box<dyn Workbook>,
    /// Column names of the loaded tables, keyed by qualified table name
    loaded: HashMap<String, Vec<String>>,
}

/// A connection to one source file backed by an in-memory DuckDB database.
pub struct DuckDbConnection {
    source: String,
    code_page: u32,
    services: Services,
    read_only: bool,
    memory: Option<MemoryWorkbook>,
    state: Option<OpenState>,
}

impl DuckDbConnection {
    fn state(&mut self) -> Result<&mut OpenState, SheetQueryError> {
        Ok(self.state.as_mut().ok_or(ConnectionError::NotOpen)?)
    }

    /// Loads the table if necessary and returns its column names.
    ///
    /// Returns `None` when the workbook has no such worksheet; the table is left undefined so the
    /// statement fails in the backend.
    fn ensure_loaded(&mut self, table: &TableRef) -> Result<Option<Vec<String>>, SheetQueryError> {
        let state = self.state()?;
        let key = table.qualified_name();
        if let Some(columns) = state.loaded.get(&key) {
            return Ok(Some(columns.clone()));
        }

        let (worksheet, range) = match &table.named_range {
            Some(name) => {
                let defined_names = state.workbook.defined_names();
                let Some((_, formula)) = defined_names.iter().find(|(defined, _)| defined == name) else {
                    return Err(SchemaError::NamedRangeNotFound {
                        name: name.clone(),
                        available: defined_names
                            .iter()
                            .map(|(defined, _)| defined.clone())
                            .filter(|defined| is_user_range(defined))
                            .collect(),
                    }
                    .into());
                };
                let (worksheet, range) =
                    parse_defined_name(formula).ok_or_else(|| SpreadsheetError::InvalidNamedRange {
                        name: name.clone(),
                        formula: formula.clone(),
                    })?;
                let (start, end) = range.split_once(':').unwrap_or((range.as_str(), range.as_str()));
                let range = CellRange::between(Some(start), Some(end))?;
                (worksheet, range)
            }
            None => (table.worksheet.clone(), table.cell_range()?),
        };

        let Some(sheet) = state.workbook.sheet(&worksheet)? else {
            return Ok(None);
        };
        let data = Table::from_grid(&table.table_name(), sheet.extract(&range), table.header);
        Self::load(&mut state.database, &key, &data).with_prefix(&format!("Cannot load table {key}"))?;
        tracing::debug!(
            target: "sheetquery::database",
            table = %key,
            rows = data.rows.len(),
            "Loaded table"
        );

        let columns = data.column_names();
        state.loaded.insert(key, columns.clone());
        Ok(Some(columns))
    }

    fn load(database: &mut ::duckdb::Connection, name: &str, table: &Table) -> Result<(), SheetQueryError> {
        let definitions = table
            .columns
            .iter()
            .map(|column| format!("{} {}", quote_identifier(&column.name), column.kind.as_str()))
            .collect::<Vec<String>>()
            .join(", ");
        database.execute_batch(&format!("CREATE TABLE {name} ({definitions})"))?;

        let placeholders = table
            .columns
            .iter()
            .map(|column| format!("CAST(? AS {})", column.kind.as_str()))
            .collect::<Vec<String>>()
            .join(", ");
        let transaction = database.transaction()?;
        {
            let mut insert = transaction.prepare(&format!("INSERT INTO {name} VALUES ({placeholders})"))?;
            for row in &table.rows {
                insert.execute(params_from_iter(row.iter().map(to_duckdb)))?;
            }
        }
        transaction.commit()?;
        Ok(())
    }
}

/// Returns true for statements that only read.
fn is_read_statement(sql: &str) -> bool {
    let head = sql.trim_start().to_ascii_uppercase();
    ["SELECT", "WITH", "DESCRIBE", "SHOW"]
        .iter()
        .any(|keyword| head.starts_with(keyword))
}

impl Connection for DuckDbConnection {
    fn open(&mut self) -> Result<(), SheetQueryError> {
        if self.state.is_some() {
            return Ok(());
        }
        let config = match self.services {
            Services::All => Config::default(),
            Services::Minimal => Config::default().threads(1)?,
        };
        let database = ::duckdb::Connection::open_in_memory_with_flags(config)?;
        database.execute_batch(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_identifier(TableRef::NO_HEADER_SCHEMA)
        ))?;
        let workbook: Box<dyn Workbook> = match &self.memory {
            Some(workbook) => Box::new(workbook.clone()),
            None => spreadsheet::open(&self.source, self.code_page)?,
        };
        tracing::debug!(target: "sheetquery::database", source = %self.source, "Opened connection");
        self.state = Some(OpenState {
            database,
            workbook,
            loaded: HashMap::new(),
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn worksheet_names(&mut self) -> Result<Vec<String>, SheetQueryError> {
        Ok(self.state()?.workbook.sheet_names())
    }

    fn named_ranges(&mut self) -> Result<Vec<String>, SheetQueryError> {
        Ok(self
            .state()?
            .workbook
            .defined_names()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| is_user_range(name))
            .collect())
    }

    fn column_names(&mut self, table: &TableRef) -> Result<Vec<String>, SheetQueryError> {
        match self.ensure_loaded(table)? {
            Some(columns) => Ok(columns),
            None => Err(SchemaError::WorksheetNotFound {
                worksheet: table.worksheet.clone(),
                source_name: self.source.clone(),
                available: self.worksheet_names()?,
                message: format!("Worksheet {} does not exist", table.worksheet),
            })?,
        }
    }

    fn execute(&mut self, statement: &Statement) -> Result<RowCursor, SheetQueryError> {
        if self.read_only && !is_read_statement(statement.text()) {
            Err(ConnectionError::ReadOnly(statement.text().to_owned()))?
        }
        self.ensure_loaded(statement.table())?;

        let state = self.state()?;
        let mut prepared = state.database.prepare(statement.text())?;
        let mut rows = prepared.query(params_from_iter(statement.parameters().iter().map(to_duckdb)))?;
        let columns = rows
            .as_ref()
            .map(|statement| statement.column_names())
            .unwrap_or_default();
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                values.push(from_duckdb(row.get::<_, DuckValue>(index)?));
            }
            data.push(values);
        }
        Ok(RowCursor::new(columns, data))
    }

    fn close(&mut self) -> Result<(), SheetQueryError> {
        if let Some(state) = self.state.take() {
            state.database.close().map_err(|(_, e)| e)?;
            tracing::debug!(target: "sheetquery::database", source = %self.source, "Closed connection");
        }
        Ok(())
    }
}

impl Drop for DuckDbConnection {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::warn!(target: "sheetquery::database", "Failed to close connection: {error}");
        }
    }
}
