// error.rs
// Error taxonomy for catalog reads, data reads and SQL rendering.

use thiserror::Error;

/// Boxed error coming out of a connection provider.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for export operations.
///
/// Every variant carries enough context (schema, table, column, batch) to
/// locate the failing record. The library only returns these; it never logs
/// them on behalf of the caller.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Cannot reach or authenticate to the database
    #[error("Database connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: BoxError,
    },

    /// A catalog metadata read failed
    #[error("Structure query failed for {schema}.{table}: {message}")]
    StructureQuery {
        schema: String,
        table: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A row data read failed mid-stream
    #[error("Data query failed for {schema}.{table} (batch {batch})")]
    DataQuery {
        schema: String,
        table: String,
        batch: usize,
        #[source]
        source: BoxError,
    },

    /// A value could not be rendered as a SQL literal
    #[error("Cannot format value of {schema}.{table}.{column} (batch {batch}, row {row}): {reason}")]
    Format {
        schema: String,
        table: String,
        column: String,
        row: usize,
        batch: usize,
        reason: String,
    },

    /// Invalid request or configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Writing the script or manifest failed
    #[error("Output failed: {context}")]
    Output {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ExportError::Configuration {
            message: message.into(),
        }
    }

    pub fn connection(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ExportError::Connection {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn structure_query(
        schema: impl Into<String>,
        table: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        let source = source.into();
        ExportError::StructureQuery {
            schema: schema.into(),
            table: table.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Catalog answered, but not with what we needed (missing table, bad row).
    pub fn structure_message(
        schema: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ExportError::StructureQuery {
            schema: schema.into(),
            table: table.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn output(context: impl Into<String>, source: std::io::Error) -> Self {
        ExportError::Output {
            context: context.into(),
            source,
        }
    }
}

/// A literal that could not be rendered. Carries no location; the data
/// exporter attaches table/column/row context when it converts this into
/// [`ExportError::Format`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct FormatError {
    pub reason: String,
}

impl FormatError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
