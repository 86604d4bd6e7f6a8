use thiserror::Error;

/// Main error type for sheetquery.
/// Aggregates errors from dependencies and from every stage of a query: argument resolution,
/// translation, backend contact, strict-mapping validation, per-field conversion and sequence
/// operators.
#[derive(Error, Debug)]
pub enum SheetQueryError {
    #[error("{0}")]
    WithContextError(String),

    #[error("{0}")]
    AnyhowError(#[from] anyhow::Error),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    // Third-party library errors
    #[error("{0}")]
    DuckDBError(#[from] duckdb::Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Database module errors
    #[error("{0}")]
    SchemaError(#[from] crate::database::SchemaError),

    #[error("{0}")]
    ConnectionError(#[from] crate::database::ConnectionError),

    #[error("{0}")]
    RangeError(#[from] crate::database::range::RangeError),

    // Query module errors
    #[error("{0}")]
    ArgumentsError(#[from] crate::query::arguments::ArgumentsError),

    #[error("{0}")]
    TranslateError(#[from] crate::query::translate::TranslateError),

    #[error("{0}")]
    SequenceError(#[from] crate::query::SequenceError),

    // Mapping module errors
    #[error("{0}")]
    StrictMappingError(#[from] crate::mapping::StrictMappingError),

    #[error("{0}")]
    FieldError(#[from] crate::mapping::FieldError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetQueryError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetQueryError::WithContextError(format!("{}: {}", message, e)))
    }
}
