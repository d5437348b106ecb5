use thiserror::Error;

use super::{AllocationError, GeneratorError, RepositoryError};

/// Error type for service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid origin URL, missing batch column, bad pagination, ...
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The code never existed or has expired; the two are not distinguished.
    #[error("Short URL not found or expired")]
    NotFoundOrExpired,

    /// Admin lookups, where existence is not a secret
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Allocation exhausted after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AllocationError> for ServiceError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Generator(e) => Self::Generator(e),
            AllocationError::Exhausted { attempts } => Self::AllocationExhausted { attempts },
        }
    }
}
