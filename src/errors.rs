//! Error types for the object pool

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool has been terminated")]
    Terminated,

    #[error("Object factory failed to create an object: {0}")]
    CreationFailed(String),

    #[error("Restored object is not on loan from this pool")]
    InvalidRestore,

    #[error("Object validation failed")]
    ValidationFailed,

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Pool accounting mismatch: {0}")]
    AccountingMismatch(String),
}

pub type PoolResult<T> = Result<T, PoolError>;
