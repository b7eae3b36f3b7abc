//! Error types for schema planning.

/// Errors that can occur while planning, rendering, or applying schema changes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Could not reach or authenticate to the database.
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// A metadata query failed; the live model is unusable.
    #[error("Failed to introspect table '{table}': {source}")]
    Introspection {
        /// Table whose metadata query failed.
        table: String,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The desired spec is malformed and was rejected before diffing.
    #[error("Invalid spec for table '{table}': {reason}")]
    InvalidSpec {
        /// Table named by the spec.
        table: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A statement builder was handed a malformed operation.
    ///
    /// This indicates a planner bug, not bad user input.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A desired change has no safe DDL rendering in the dialect.
    #[error("Unsupported change for {dialect}: {detail}")]
    UnsupportedChange {
        /// Dialect that cannot express the change.
        dialect: &'static str,
        /// What was asked for.
        detail: String,
    },

    /// A plan statement failed; remaining statements were not executed.
    #[error("Statement failed: {statement}: {source}")]
    Execution {
        /// The statement that failed.
        statement: String,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// IO error reading/writing spec documents.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize a table document.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for an `InvalidSpec` error.
    pub fn invalid_spec(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an `Introspection` error.
    pub fn introspection(table: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Introspection {
            table: table.into(),
            source,
        }
    }
}

/// Result type for schema planning operations.
pub type Result<T> = std::result::Result<T, Error>;
