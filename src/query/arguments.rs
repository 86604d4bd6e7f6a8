//! Resolved configuration of a single query.
use crate::database::range::TableRef;
use crate::database::Connection;
use crate::database::SchemaError;
use crate::error::SheetQueryError;
use crate::helpers::reference::parse_cell_reference;
use crate::helpers::string::base_name;
use crate::spreadsheet::cell::Value;
use std::cell::OnceCell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Errors raised while resolving query arguments.
#[derive(Error, Debug)]
pub enum ArgumentsError {
    #[error("A source file name is required")]
    MissingSource,

    #[error("Invalid {parameter} '{value}': expected a cell reference such as 'A1'")]
    InvalidRange { parameter: &'static str, value: String },

    #[error("Cannot use a worksheet range without a header row on csv files")]
    HeaderlessCsvRange,

    #[error("Unsupported code page {0}")]
    UnsupportedCodePage(u32),

    #[error("{0}")]
    InvalidArgument(String),
}

/// Which declared names must line up with the source schema.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StrictMapping {
    /// No validation
    #[default]
    None,
    /// Every declared field needs a column
    FieldStrict,
    /// Every column needs a declared field
    ColumnStrict,
    /// Both of the above
    Both,
}

impl StrictMapping {
    pub(crate) fn checks_fields(&self) -> bool {
        matches!(self, StrictMapping::FieldStrict | StrictMapping::Both)
    }

    pub(crate) fn checks_columns(&self) -> bool {
        matches!(self, StrictMapping::ColumnStrict | StrictMapping::Both)
    }
}

/// Whitespace trimming applied to textual results.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TrimSpaces {
    #[default]
    None,
    Start,
    End,
    Both,
}

impl TrimSpaces {
    pub fn apply(&self, value: &str) -> String {
        match self {
            TrimSpaces::None => value.to_owned(),
            TrimSpaces::Start => value.trim_start().to_owned(),
            TrimSpaces::End => value.trim_end().to_owned(),
            TrimSpaces::Both => value.trim().to_owned(),
        }
    }
}

/// Backend services a connection may use.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Services {
    /// Everything the engine offers, including its worker thread pool
    #[default]
    All,
    /// A single worker thread
    Minimal,
}

/// Field name to source column name overrides.
///
/// Clones share the same map, so every query created from one factory observes later additions.
#[derive(Clone, Debug, Default)]
pub struct ColumnMappings(Rc<RefCell<HashMap<String, String>>>);

impl ColumnMappings {
    pub fn insert(&self, field: &str, column: &str) {
        self.0.borrow_mut().insert(field.to_owned(), column.to_owned());
    }

    /// Inserts the mapping unless the field already has one.
    pub(crate) fn insert_absent(&self, field: &str, column: &str) {
        self.0
            .borrow_mut()
            .entry(field.to_owned())
            .or_insert_with(|| column.to_owned());
    }

    pub fn get(&self, field: &str) -> Option<String> {
        self.0.borrow().get(field).cloned()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.borrow().contains_key(field)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.0.borrow().values().any(|mapped| mapped == column)
    }

    /// Returns the column a field reads from: its override, or the field name itself.
    pub fn resolve(&self, field: &str) -> String {
        self.get(field).unwrap_or_else(|| field.to_owned())
    }

    /// All mappings sorted by field name.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .0
            .borrow()
            .iter()
            .map(|(field, column)| (field.clone(), column.clone()))
            .collect();
        entries.sort();
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// A value transformation: receives the raw value's text and returns the replacement value.
pub type Transformation = Rc<dyn Fn(String) -> anyhow::Result<Value>>;

/// Value transformations keyed by `"<TypeName>.<FieldName>"`.
///
/// Clones share the same map.
#[derive(Clone, Default)]
pub struct Transformations(Rc<RefCell<HashMap<String, Transformation>>>);

impl Transformations {
    pub fn insert(&self, type_name: &str, field: &str, transformation: Transformation) {
        self.0
            .borrow_mut()
            .insert(Self::key(type_name, field), transformation);
    }

    pub fn get(&self, type_name: &str, field: &str) -> Option<Transformation> {
        self.0.borrow().get(&Self::key(type_name, field)).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn key(type_name: &str, field: &str) -> String {
        format!("{type_name}.{field}")
    }
}

impl fmt::Debug for Transformations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.0.borrow().keys().cloned().collect();
        keys.sort();
        f.debug_tuple("Transformations").field(&keys).finish()
    }
}

/// The resolved configuration for one query.
///
/// Immutable after [`QueryArgumentsBuilder::build`]; the worksheet name behind a worksheet index
/// is looked up on first use and cached.
#[derive(Clone, Debug)]
pub struct QueryArguments {
    pub(crate) source: String,
    pub(crate) worksheet_name: Option<String>,
    pub(crate) worksheet_index: Option<usize>,
    pub(crate) named_range: Option<String>,
    pub(crate) start_range: Option<String>,
    pub(crate) end_range: Option<String>,
    pub(crate) no_header: bool,
    pub(crate) column_mappings: ColumnMappings,
    pub(crate) transformations: Transformations,
    pub(crate) strict_mapping: StrictMapping,
    pub(crate) trim_spaces: TrimSpaces,
    pub(crate) reuse_connection: bool,
    pub(crate) lazy: bool,
    pub(crate) skip_empty_rows: bool,
    pub(crate) read_only: bool,
    pub(crate) code_page: u32,
    pub(crate) services: Services,
    resolved_worksheet: OnceCell<String>,
}

impl QueryArguments {
    pub fn builder(source: impl Into<String>) -> QueryArgumentsBuilder {
        QueryArgumentsBuilder::new(source)
    }

    /// Copies the arguments for another source file.
    ///
    /// Mappings and transformations stay shared with `self`; the cached worksheet is dropped.
    pub fn with_source(&self, source: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.source = source.into();
        copy.resolved_worksheet = OnceCell::new();
        copy
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_csv(&self) -> bool {
        is_csv(&self.source)
    }

    pub fn no_header(&self) -> bool {
        self.no_header
    }

    pub fn column_mappings(&self) -> &ColumnMappings {
        &self.column_mappings
    }

    pub fn transformations(&self) -> &Transformations {
        &self.transformations
    }

    pub fn strict_mapping(&self) -> StrictMapping {
        self.strict_mapping
    }

    pub fn trim_spaces(&self) -> TrimSpaces {
        self.trim_spaces
    }

    pub fn code_page(&self) -> u32 {
        self.code_page
    }

    pub fn services(&self) -> Services {
        self.services
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Resolves the worksheet the query reads from.
    ///
    /// CSV sources use the file name, an index is looked up in the workbook's sheet list, and
    /// without a name or a named range the worksheet defaults to `Sheet1`.
    pub fn worksheet(&self, connection: &mut dyn Connection) -> Result<&str, SheetQueryError> {
        if let Some(name) = self.resolved_worksheet.get() {
            return Ok(name);
        }
        let name = if self.is_csv() {
            base_name(&self.source).to_owned()
        } else if let Some(index) = self.worksheet_index {
            let names = connection.worksheet_names()?;
            names
                .get(index)
                .cloned()
                .ok_or(SchemaError::WorksheetIndexOutOfRange {
                    index,
                    count: names.len(),
                })?
        } else if let Some(name) = &self.worksheet_name {
            name.clone()
        } else if self.named_range.is_some() {
            String::new()
        } else {
            String::from("Sheet1")
        };
        Ok(self.resolved_worksheet.get_or_init(|| name))
    }

    /// The table the statement reads from, resolving the worksheet if necessary.
    pub(crate) fn table_ref(&self, connection: &mut dyn Connection) -> Result<TableRef, SheetQueryError> {
        let worksheet = self.worksheet(connection)?.to_owned();
        Ok(TableRef {
            worksheet,
            named_range: self.named_range.clone().filter(|_| !self.is_csv()),
            start_range: self.start_range.clone(),
            end_range: self.end_range.clone(),
            header: !self.no_header,
        })
    }
}

impl fmt::Display for QueryArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn optional<T: fmt::Display>(value: &Option<T>) -> String {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        }
        write!(
            f,
            "Source: '{}'; Worksheet Name: '{}'; Worksheet Index: '{}'; Named Range: '{}'; \
             Start Range: '{}'; End Range: '{}'; No Header: {}; Column Mappings: '{}'; \
             Transformations: {}; Strict Mapping: {:?}; Trim Spaces: {:?}; \
             Reuse Connection: {}; Lazy: {}; Skip Empty Rows: {}; Read Only: {}; \
             Code Page: {}; Services: {:?}",
            self.source,
            self.resolved_worksheet
                .get()
                .cloned()
                .or_else(|| self.worksheet_name.clone())
                .unwrap_or_default(),
            optional(&self.worksheet_index),
            optional(&self.named_range),
            optional(&self.start_range),
            optional(&self.end_range),
            self.no_header,
            self.column_mappings
                .entries()
                .iter()
                .map(|(field, column)| format!("{field} => {column}"))
                .collect::<Vec<String>>()
                .join(", "),
            self.transformations.len(),
            self.strict_mapping,
            self.trim_spaces,
            self.reuse_connection,
            self.lazy,
            self.skip_empty_rows,
            self.read_only,
            self.code_page,
            self.services,
        )
    }
}

/// Returns true for sources read as delimited text.
pub(crate) fn is_csv(source: &str) -> bool {
    std::path::Path::new(source)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Builder for [`QueryArguments`]. Unset options take their defaults.
#[derive(Clone, Debug)]
pub struct QueryArgumentsBuilder {
    arguments: QueryArguments,
}

impl QueryArgumentsBuilder {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            arguments: QueryArguments {
                source: source.into(),
                worksheet_name: None,
                worksheet_index: None,
                named_range: None,
                start_range: None,
                end_range: None,
                no_header: false,
                column_mappings: ColumnMappings::default(),
                transformations: Transformations::default(),
                strict_mapping: StrictMapping::None,
                trim_spaces: TrimSpaces::None,
                reuse_connection: false,
                lazy: false,
                skip_empty_rows: false,
                read_only: false,
                code_page: 0,
                services: Services::All,
                resolved_worksheet: OnceCell::new(),
            },
        }
    }

    /// Selects a worksheet by name.
    pub fn worksheet(mut self, name: impl Into<String>) -> Self {
        self.arguments.worksheet_name = Some(name.into());
        self.arguments.worksheet_index = None;
        self.arguments.named_range = None;
        self
    }

    /// Selects a worksheet by its 0-based position in the workbook.
    pub fn worksheet_index(mut self, index: usize) -> Self {
        self.arguments.worksheet_index = Some(index);
        self.arguments.worksheet_name = None;
        self.arguments.named_range = None;
        self
    }

    /// Selects a named range defined in the workbook.
    pub fn named_range(mut self, name: impl Into<String>) -> Self {
        self.arguments.named_range = Some(name.into());
        self.arguments.worksheet_name = None;
        self.arguments.worksheet_index = None;
        self
    }

    /// Restricts the query to the cells between two references, e.g. `A1` and `D8`.
    pub fn range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.arguments.start_range = Some(start.into());
        self.arguments.end_range = Some(end.into());
        self
    }

    pub fn no_header(mut self, no_header: bool) -> Self {
        self.arguments.no_header = no_header;
        self
    }

    pub fn column_mappings(mut self, mappings: ColumnMappings) -> Self {
        self.arguments.column_mappings = mappings;
        self
    }

    pub fn transformations(mut self, transformations: Transformations) -> Self {
        self.arguments.transformations = transformations;
        self
    }

    pub fn strict_mapping(mut self, strict_mapping: StrictMapping) -> Self {
        self.arguments.strict_mapping = strict_mapping;
        self
    }

    pub fn trim_spaces(mut self, trim_spaces: TrimSpaces) -> Self {
        self.arguments.trim_spaces = trim_spaces;
        self
    }

    pub fn reuse_connection(mut self, reuse_connection: bool) -> Self {
        self.arguments.reuse_connection = reuse_connection;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.arguments.lazy = lazy;
        self
    }

    pub fn skip_empty_rows(mut self, skip_empty_rows: bool) -> Self {
        self.arguments.skip_empty_rows = skip_empty_rows;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.arguments.read_only = read_only;
        self
    }

    pub fn code_page(mut self, code_page: u32) -> Self {
        self.arguments.code_page = code_page;
        self
    }

    pub fn services(mut self, services: Services) -> Self {
        self.arguments.services = services;
        self
    }

    /// Validates and returns the arguments.
    pub fn build(self) -> Result<QueryArguments, ArgumentsError> {
        let arguments = self.arguments;
        if arguments.source.trim().is_empty() {
            Err(ArgumentsError::MissingSource)?
        }
        for (parameter, value) in [
            ("start range", &arguments.start_range),
            ("end range", &arguments.end_range),
        ] {
            if let Some(value) = value.as_ref().filter(|value| parse_cell_reference(value).is_none()) {
                Err(ArgumentsError::InvalidRange {
                    parameter,
                    value: value.clone(),
                })?
            }
        }
        let has_range = arguments.start_range.is_some() || arguments.end_range.is_some();
        if arguments.is_csv() && arguments.no_header && has_range {
            Err(ArgumentsError::HeaderlessCsvRange)?
        }
        Ok(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let arguments = QueryArguments::builder("companies.xlsx").build().unwrap();
        assert_eq!(arguments.strict_mapping(), StrictMapping::None);
        assert_eq!(arguments.trim_spaces(), TrimSpaces::None);
        assert_eq!(arguments.services(), Services::All);
        assert!(!arguments.no_header());
        assert!(!arguments.lazy);
        assert!(arguments.column_mappings().is_empty());
        assert!(arguments.transformations().is_empty());
    }

    #[test]
    fn validation() {
        assert!(matches!(
            QueryArguments::builder(" ").build(),
            Err(ArgumentsError::MissingSource)
        ));
        assert!(matches!(
            QueryArguments::builder("a.xlsx").range("A1", "D").build(),
            Err(ArgumentsError::InvalidRange { parameter: "end range", .. })
        ));
        assert!(matches!(
            QueryArguments::builder("a.xlsx").range("AAAA1", "B2").build(),
            Err(ArgumentsError::InvalidRange { parameter: "start range", .. })
        ));
        assert!(matches!(
            QueryArguments::builder("a.xlsx").range("A0", "B2").build(),
            Err(ArgumentsError::InvalidRange { parameter: "start range", .. })
        ));
        assert!(QueryArguments::builder("a.xlsx").range("b2", "D8").build().is_ok());
        assert!(matches!(
            QueryArguments::builder("a.CSV").range("A1", "B2").no_header(true).build(),
            Err(ArgumentsError::HeaderlessCsvRange)
        ));
        assert!(QueryArguments::builder("a.csv").no_header(true).build().is_ok());
    }

    #[test]
    fn selection_is_exclusive() {
        let arguments = QueryArguments::builder("a.xlsx")
            .worksheet("Data")
            .worksheet_index(2)
            .build()
            .unwrap();
        assert_eq!(arguments.worksheet_name, None);
        assert_eq!(arguments.worksheet_index, Some(2));
        let arguments = QueryArguments::builder("a.xlsx")
            .worksheet_index(2)
            .named_range("Totals")
            .build()
            .unwrap();
        assert_eq!(arguments.worksheet_index, None);
        assert_eq!(arguments.named_range.as_deref(), Some("Totals"));
    }

    #[test]
    fn copies_share_mappings() {
        let original = QueryArguments::builder("a.xlsx").build().unwrap();
        let copy = original.with_source("b.xlsx");
        original.column_mappings().insert("ceo", "CEO");
        assert_eq!(copy.source(), "b.xlsx");
        assert_eq!(copy.column_mappings().get("ceo").as_deref(), Some("CEO"));
        copy.transformations()
            .insert("Company", "name", Rc::new(|value: String| -> anyhow::Result<Value> {
                Ok(Value::from(value))
            }));
        assert_eq!(original.transformations().len(), 1);
    }

    #[test]
    fn mapping_resolution() {
        let mappings = ColumnMappings::default();
        mappings.insert("ceo", "Chief Executive");
        mappings.insert_absent("ceo", "CEO");
        mappings.insert_absent("name", "Company Name");
        assert_eq!(mappings.resolve("ceo"), "Chief Executive");
        assert_eq!(mappings.resolve("name"), "Company Name");
        assert_eq!(mappings.resolve("employees"), "employees");
        assert!(mappings.contains_column("Company Name"));
        assert!(!mappings.contains_field("employees"));
    }

    #[test]
    fn description() {
        let arguments = QueryArguments::builder("companies.xlsx")
            .worksheet("Data")
            .range("A1", "C5")
            .build()
            .unwrap();
        arguments.column_mappings().insert("ceo", "CEO");
        let description = arguments.to_string();
        assert!(description.starts_with("Source: 'companies.xlsx'; Worksheet Name: 'Data';"));
        assert!(description.contains("Start Range: 'A1'; End Range: 'C5'"));
        assert!(description.contains("Column Mappings: 'ceo => CEO'"));
    }

    #[test]
    fn csv_detection() {
        assert!(is_csv("data/companies.csv"));
        assert!(is_csv("COMPANIES.CSV"));
        assert!(!is_csv("companies.xlsx"));
        assert!(!is_csv("csv"));
    }
}
