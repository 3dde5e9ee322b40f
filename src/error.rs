use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Persistence(String),
    Validation { id: String, field: String },
    RowNotFound { id: String },
    InvalidOp(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Persistence(msg) => write!(f, "persistence error: {}", msg),
            Error::Validation { id, field } => {
                write!(f, "validation failed for {}: missing required field '{}'", id, field)
            }
            Error::RowNotFound { id } => write!(f, "row not found: {}", id),
            Error::InvalidOp(msg) => write!(f, "invalid grid operation: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
