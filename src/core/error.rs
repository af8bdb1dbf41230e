use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Serialization error: {0}")]
    SerializeError(String),

    #[error("Malformed stored document: {0}")]
    MalformedDocument(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
