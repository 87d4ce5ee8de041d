use thiserror::Error;

/// Result type for schema validation.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema validation errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The instance violates the schema; every violation is listed.
    #[error("{schema} schema validation failed: {}", violations.join("; "))]
    Invalid {
        schema: &'static str,
        violations: Vec<String>,
    },

    /// The instance could not be converted to JSON for validation.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The bundled schema itself failed to compile.
    #[error("schema compilation failed: {0}")]
    Compile(String),
}

impl SchemaError {
    /// Violations carried by an [`SchemaError::Invalid`] error.
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Invalid { violations, .. } => violations,
            _ => &[],
        }
    }
}
