//! Error types for the KPI layer

use thiserror::Error;

/// Main error type for the KPI layer
#[derive(Error, Debug)]
pub enum Error {
    /// The computation (or anything inside the compute closure) failed
    #[error("Compute failure: {0}")]
    Compute(#[from] ComputeError),

    /// Cache error. Only surfaced by maintenance operations such as
    /// pattern invalidation; `get_or_compute` always recovers these locally.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The request's dates describe a window that cannot be served
    #[error("Invalid date window: {0}")]
    InvalidWindow(String),

    /// The caller cancelled the request before the computation finished
    #[error("Computation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<WarehouseError> for Error {
    fn from(err: WarehouseError) -> Self {
        Error::Compute(ComputeError::from(err))
    }
}

/// Failures inside a computation. Always fatal to the current request.
#[derive(Error, Debug)]
pub enum ComputeError {
    /// The warehouse query failed
    #[error("Warehouse query failed: {0}")]
    Warehouse(#[from] WarehouseError),

    /// A warehouse row could not be decoded into the expected shape
    #[error("Row decode failed: {0}")]
    RowDecode(String),

    /// Anything else raised by a compute closure
    #[error("{0}")]
    Other(String),
}

/// Warehouse client errors
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// The query exceeded the client's timeout
    #[error("Query timed out after {0}ms")]
    Timeout(u64),

    /// Connection to the warehouse failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution failed
    #[error("Query error: {0}")]
    Query(String),
}

/// Cache store errors. Non-fatal to request handling.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store reports itself not ready
    #[error("Cache unavailable")]
    Unavailable,

    /// Connection to the store failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// A store command failed
    #[error("Command error: {0}")]
    Command(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
