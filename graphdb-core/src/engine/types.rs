use std::fmt;
use std::num::TryFromIntError;

/// Error surface for every Storage Engine and Graph Engine operation.
///
/// Kinds map directly onto the specification's error taxonomy: `NotFound` and
/// `InvalidArgument` are recoverable by the caller, `Corruption` means the
/// operation aborted with no partial mutation, and `Io` is surfaced verbatim.
#[derive(Debug)]
pub enum GraphError {
    /// Unknown or tombstoned node/edge id.
    NotFound,
    /// Bad property value, malformed external id, or a negative hop count.
    InvalidArgument(String),
    /// A file header or record failed structural validation.
    Corruption(String),
    /// Underlying read/write failure.
    Io(std::io::Error),
}

impl std::error::Error for GraphError {}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::NotFound => write!(f, "not found"),
            GraphError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            GraphError::Corruption(msg) => write!(f, "corruption: {msg}"),
            GraphError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl From<std::io::Error> for GraphError {
    fn from(error: std::io::Error) -> Self {
        GraphError::Io(error)
    }
}

impl From<TryFromIntError> for GraphError {
    fn from(error: TryFromIntError) -> Self {
        GraphError::Corruption(format!("integer out of range: {error}"))
    }
}
