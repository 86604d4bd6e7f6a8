//! The entry point: a factory of queries over one source file.
use crate::database::duckdb::DuckDbProvider;
use crate::database::ConnectionProvider;
use crate::error::SheetQueryError;
use crate::mapping::QueryItem;
use crate::mapping::Record;
use crate::mapping::RowNoHeader;
use crate::query::arguments::ColumnMappings;
use crate::query::arguments::QueryArguments;
use crate::query::arguments::QueryArgumentsBuilder;
use crate::query::arguments::Services;
use crate::query::arguments::StrictMapping;
use crate::query::arguments::Transformations;
use crate::query::arguments::TrimSpaces;
use crate::query::executor::Session;
use crate::query::Query;
use crate::spreadsheet::cell::Value;
use crate::spreadsheet::MemoryWorkbook;
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Creates queries over one source file.
///
/// Options set on the factory apply to every query it creates. Column mappings and
/// transformations are shared: adding one affects queries created earlier too.
pub struct QueryFactory {
    session: Rc<Session>,
    template: QueryArgumentsBuilder,
    mappings: ColumnMappings,
    transformations: Transformations,
    registered: RefCell<HashSet<TypeId>>,
}

impl QueryFactory {
    /// A factory over a file on disk, read through the bundled DuckDB backend.
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_provider(source, DuckDbProvider::new())
    }

    /// A factory over a workbook built in memory.
    pub fn in_memory(workbook: MemoryWorkbook) -> Self {
        let source = workbook.name().to_owned();
        Self::with_provider(source, DuckDbProvider::with_workbook(workbook))
    }

    /// A factory whose connections come from `provider`.
    pub fn with_provider(source: impl Into<String>, provider: impl ConnectionProvider + 'static) -> Self {
        let mappings = ColumnMappings::default();
        let transformations = Transformations::default();
        Self {
            session: Rc::new(Session::new(Box::new(provider))),
            template: QueryArguments::builder(source)
                .column_mappings(mappings.clone())
                .transformations(transformations.clone()),
            mappings,
            transformations,
            registered: RefCell::new(HashSet::new()),
        }
    }

    pub fn strict_mapping(mut self, strict_mapping: StrictMapping) -> Self {
        self.template = self.template.strict_mapping(strict_mapping);
        self
    }

    pub fn trim_spaces(mut self, trim_spaces: TrimSpaces) -> Self {
        self.template = self.template.trim_spaces(trim_spaces);
        self
    }

    /// Keeps one connection open across queries until [`close`](Self::close) is called.
    pub fn reuse_connection(mut self, reuse_connection: bool) -> Self {
        self.template = self.template.reuse_connection(reuse_connection);
        self
    }

    /// Maps rows as they are pulled instead of before the query returns.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.template = self.template.lazy(lazy);
        self
    }

    pub fn skip_empty_rows(mut self, skip_empty_rows: bool) -> Self {
        self.template = self.template.skip_empty_rows(skip_empty_rows);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.template = self.template.read_only(read_only);
        self
    }

    pub fn code_page(mut self, code_page: u32) -> Self {
        self.template = self.template.code_page(code_page);
        self
    }

    pub fn services(mut self, services: Services) -> Self {
        self.template = self.template.services(services);
        self
    }

    /// Reads `field` from `column` in every query.
    pub fn add_mapping(&self, field: &str, column: &str) {
        self.mappings.insert(field, column);
    }

    /// Replaces the values of `R`'s `field` before conversion.
    ///
    /// The transformation receives the raw value as text.
    pub fn add_transformation<R, F>(&self, field: &str, transformation: F)
    where
        R: Record,
        F: Fn(String) -> anyhow::Result<Value> + 'static,
    {
        self.transformations
            .insert(R::TYPE_NAME, field, Rc::new(transformation));
    }

    pub fn column_mappings(&self) -> &ColumnMappings {
        &self.mappings
    }

    /// Queries the default worksheet, `Sheet1` (or the file itself for CSV sources).
    pub fn query<T: QueryItem>(&self) -> Result<Query<T>, SheetQueryError> {
        self.create(self.template.clone())
    }

    pub fn worksheet<T: QueryItem>(&self, name: &str) -> Result<Query<T>, SheetQueryError> {
        self.create(self.template.clone().worksheet(name))
    }

    /// Queries the worksheet at a 0-based position in the workbook.
    pub fn worksheet_by_index<T: QueryItem>(&self, index: usize) -> Result<Query<T>, SheetQueryError> {
        self.create(self.template.clone().worksheet_index(index))
    }

    /// Queries the cells between `start` and `end`, e.g. `B3` and `E9`; the first row is the header.
    pub fn worksheet_range<T: QueryItem>(&self, start: &str, end: &str, name: &str) -> Result<Query<T>, SheetQueryError> {
        self.create(self.template.clone().worksheet(name).range(start, end))
    }

    pub fn worksheet_no_header(&self, name: &str) -> Result<Query<RowNoHeader>, SheetQueryError> {
        self.create(self.template.clone().worksheet(name).no_header(true))
    }

    pub fn worksheet_range_no_header(
        &self,
        start: &str,
        end: &str,
        name: &str,
    ) -> Result<Query<RowNoHeader>, SheetQueryError> {
        self.create(self.template.clone().worksheet(name).range(start, end).no_header(true))
    }

    pub fn named_range<T: QueryItem>(&self, name: &str) -> Result<Query<T>, SheetQueryError> {
        self.create(self.template.clone().named_range(name))
    }

    pub fn named_range_no_header(&self, name: &str) -> Result<Query<RowNoHeader>, SheetQueryError> {
        self.create(self.template.clone().named_range(name).no_header(true))
    }

    /// Names of the worksheets in workbook order.
    pub fn worksheet_names(&self) -> Result<Vec<String>, SheetQueryError> {
        let arguments = self.template.clone().build()?;
        self.session
            .lease(&arguments)?
            .with(|connection| connection.worksheet_names())
    }

    /// Column names of a worksheet, read from its header row.
    pub fn column_names(&self, worksheet: &str) -> Result<Vec<String>, SheetQueryError> {
        let arguments = self.template.clone().worksheet(worksheet).build()?;
        let mut lease = self.session.lease(&arguments)?;
        lease.with(|connection| {
            let table = arguments.table_ref(connection)?;
            connection.column_names(&table)
        })
    }

    /// Column names of a named range, read from its first row.
    pub fn named_range_column_names(&self, name: &str) -> Result<Vec<String>, SheetQueryError> {
        let arguments = self.template.clone().named_range(name).build()?;
        let mut lease = self.session.lease(&arguments)?;
        lease.with(|connection| {
            let table = arguments.table_ref(connection)?;
            connection.column_names(&table)
        })
    }

    /// Names of the user-defined named ranges.
    pub fn named_ranges(&self) -> Result<Vec<String>, SheetQueryError> {
        let arguments = self.template.clone().build()?;
        self.session
            .lease(&arguments)?
            .with(|connection| connection.named_ranges())
    }

    /// Closes the persistent connection. Later queries open a new one.
    pub fn close(&self) -> Result<(), SheetQueryError> {
        self.session.close()
    }

    fn create<T: QueryItem>(&self, builder: QueryArgumentsBuilder) -> Result<Query<T>, SheetQueryError> {
        let arguments = builder.build()?;
        self.register::<T>();
        Ok(Query::new(self.session.clone(), arguments))
    }

    /// Merges the column overrides `T` declares, once per type. Explicit mappings win.
    fn register<T: QueryItem>(&self) {
        if self.registered.borrow_mut().insert(TypeId::of::<T>()) {
            for (field, column) in T::declared_columns() {
                self.mappings.insert_absent(&field, &column);
            }
        }
    }
}
