//! Crate-level error type
//!
//! Startup-scoped failures only. Errors local to one message or one
//! subscriber stay inside their component and are logged there.

use crate::store::StoreError;

/// Error type for bridge construction and startup
#[derive(Debug)]
pub enum Error {
    /// I/O failure (listener bind, socket setup)
    Io(std::io::Error),
    /// Store could not be opened or reached at startup
    Store(StoreError),
    /// A configured series name is not a valid partition identifier
    InvalidSeriesName(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Store(e) => write!(f, "Store error: {}", e),
            Error::InvalidSeriesName(name) => {
                write!(f, "Invalid series name: {:?}", name)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Store(e) => Some(e),
            Error::InvalidSeriesName(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

/// Result alias for bridge startup operations
pub type Result<T> = std::result::Result<T, Error>;
