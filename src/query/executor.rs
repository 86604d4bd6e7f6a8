//! Runs compiled queries: connection leasing, statement execution, error diagnosis and row
//! streaming.
use crate::database::Connection;
use crate::database::ConnectionProvider;
use crate::database::RowCursor;
use crate::database::SchemaError;
use crate::error::SheetQueryError;
use crate::mapping::Mapper;
use crate::mapping::MappingContext;
use crate::mapping::QueryItem;
use crate::query::arguments::QueryArguments;
use crate::query::expr::QueryModel;
use crate::query::statement::Statement;
use crate::query::translate;
use crate::query::translate::Plan;
use crate::spreadsheet::cell::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::Level;

type SharedConnection = Rc<RefCell<Box<dyn Connection>>>;

/// Connection state shared by every query created from one factory.
pub(crate) struct Session {
    provider: Box<dyn ConnectionProvider>,
    persistent: RefCell<Option<SharedConnection>>,
}

impl Session {
    pub(crate) fn new(provider: Box<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            persistent: RefCell::new(None),
        }
    }

    /// Hands out an open connection: the persistent one if the arguments reuse connections,
    /// otherwise a fresh one that is closed when the lease is dropped.
    pub(crate) fn lease(&self, arguments: &QueryArguments) -> Result<Lease, SheetQueryError> {
        if !arguments.reuse_connection {
            let mut connection = self.provider.connect(arguments)?;
            connection.open()?;
            return Ok(Lease::Owned(connection));
        }
        let mut persistent = self.persistent.borrow_mut();
        if let Some(connection) = persistent.as_ref() {
            if connection.borrow().is_open() {
                return Ok(Lease::Shared(connection.clone()));
            }
        }
        let mut connection = self.provider.connect(arguments)?;
        connection.open()?;
        let connection = Rc::new(RefCell::new(connection));
        *persistent = Some(connection.clone());
        Ok(Lease::Shared(connection))
    }

    /// Closes the persistent connection, if one was opened.
    pub(crate) fn close(&self) -> Result<(), SheetQueryError> {
        if let Some(connection) = self.persistent.borrow_mut().take() {
            connection.borrow_mut().close()?;
        }
        Ok(())
    }
}

/// A connection held for the duration of one query.
pub(crate) enum Lease {
    Owned(Box<dyn Connection>),
    Shared(SharedConnection),
}

impl Lease {
    pub(crate) fn with<T>(&mut self, f: impl FnOnce(&mut dyn Connection) -> T) -> T {
        match self {
            Lease::Owned(connection) => f(connection.as_mut()),
            Lease::Shared(connection) => f(connection.borrow_mut().as_mut()),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Lease::Owned(connection) = self {
            if let Err(error) = connection.close() {
                tracing::warn!(target: "sheetquery::query", "Failed to close connection: {error}");
            }
        }
    }
}

/// A statement that ran, with everything needed to read its result.
pub(crate) struct Execution {
    pub(crate) plan: Plan,
    lease: Lease,
    cursor: RowCursor,
    schema: Vec<String>,
}

/// Compiles the query and resolves its source table without running it.
pub(crate) fn prepare(
    session: &Session,
    arguments: &QueryArguments,
    model: &QueryModel,
) -> Result<(Plan, Statement, Lease), SheetQueryError> {
    // Unsupported shapes fail before any backend contact
    let plan = translate::compile(model, arguments.column_mappings())?;
    let mut lease = session.lease(arguments)?;
    let table = lease.with(|connection| arguments.table_ref(connection))?;
    tracing::info!(target: "sheetquery::query", "{arguments}");
    let statement = plan.render(&table);
    Ok((plan, statement, lease))
}

/// Compiles and runs the query.
pub(crate) fn execute(
    session: &Session,
    arguments: &QueryArguments,
    model: &QueryModel,
) -> Result<Execution, SheetQueryError> {
    let (plan, statement, mut lease) = prepare(session, arguments, model)?;
    if tracing::enabled!(target: "sheetquery::sql", Level::DEBUG) {
        tracing::debug!(target: "sheetquery::sql", "{statement}");
    }

    let cursor = match lease.with(|connection| connection.execute(&statement)) {
        Ok(cursor) => cursor,
        Err(error) => Err(lease.with(|connection| diagnose(connection, arguments, &statement, error)))?,
    };
    let schema = lease.with(|connection| connection.column_names(statement.table()))?;
    for (field, column) in arguments.column_mappings().entries() {
        if !schema.contains(&column) {
            tracing::warn!(
                target: "sheetquery::query",
                "'{column}' column that is mapped to the '{field}' property does not exist in the '{}' worksheet",
                statement.table().table_name()
            );
        }
    }
    Ok(Execution {
        plan,
        lease,
        cursor,
        schema,
    })
}

/// Explains a failed statement.
///
/// A backend error naming the worksheet becomes "worksheet not found" if the workbook really lacks
/// it; otherwise the referenced columns are checked against the table. Anything else is returned
/// unchanged.
fn diagnose(
    connection: &mut dyn Connection,
    arguments: &QueryArguments,
    statement: &Statement,
    error: SheetQueryError,
) -> SheetQueryError {
    if !matches!(error, SheetQueryError::DuckDBError(_)) {
        return error;
    }
    let message = error.to_string();
    let worksheet = &statement.table().worksheet;
    if !worksheet.is_empty() && message.contains(worksheet.as_str()) {
        if let Ok(available) = connection.worksheet_names() {
            if !available.contains(worksheet) {
                return SchemaError::WorksheetNotFound {
                    worksheet: worksheet.clone(),
                    source_name: arguments.source().to_owned(),
                    available,
                    message,
                }
                .into();
            }
        }
    }
    if let Ok(available) = connection.column_names(statement.table()) {
        if let Some(column) = statement
            .columns()
            .iter()
            .find(|column| !available.contains(column))
        {
            return SchemaError::InvalidColumn {
                column: column.clone(),
                available,
            }
            .into();
        }
    }
    error
}

impl Execution {
    /// Reads the single value of an aggregate statement.
    pub(crate) fn scalar(mut self) -> Value {
        self.cursor
            .next_row()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_default()
    }

    /// Streams the rows mapped to `T`. Strict mapping is checked here, before the first row.
    pub(crate) fn rows<T: QueryItem>(self, arguments: &QueryArguments) -> Result<RowStream<T>, SheetQueryError> {
        let context = MappingContext {
            columns: self.cursor.columns(),
            schema: &self.schema,
            arguments,
            projection: &self.plan.projection,
        };
        let mapper = T::mapper(&context)?;
        Ok(RowStream {
            cursor: self.cursor,
            mapper,
            lease: Some(self.lease),
            skip_empty_rows: arguments.skip_empty_rows,
            row: 0,
        })
    }
}

/// Mapped rows, pulled one at a time.
///
/// The connection lease is released as soon as the rows are exhausted, a row fails or the
/// stream is dropped.
pub(crate) struct RowStream<T> {
    cursor: RowCursor,
    mapper: Mapper<T>,
    lease: Option<Lease>,
    skip_empty_rows: bool,
    row: usize,
}

impl<T> RowStream<T> {
    pub(crate) fn close(&mut self) {
        self.lease = None;
    }
}

impl<T> Iterator for RowStream<T> {
    type Item = Result<T, SheetQueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lease.as_ref()?;
        loop {
            let Some(values) = self.cursor.next_row() else {
                self.close();
                return None;
            };
            if self.skip_empty_rows && values.iter().all(Value::is_empty) {
                continue;
            }
            self.row += 1;
            let result = (self.mapper)(self.row, values);
            if result.is_err() {
                self.close();
            }
            return Some(result);
        }
    }
}
