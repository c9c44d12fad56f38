//! Engine error model.
//!
//! Domain failures map through from the pure crates; the engine adds the
//! failure modes that only exist at the coordination layer (lock timeouts,
//! ledger rejections).

use thiserror::Error;

use stockflow_core::{DomainError, ProductId};
use stockflow_ledger::LedgerError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request, rejected before any lock is taken. Recoverable by
    /// resubmitting corrected input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A transfer or a validate-time re-verification found inadequate stock.
    /// Recoverable by retrying later or reducing the requested quantity.
    #[error("insufficient stock for product {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: ProductId,
        requested: i64,
        available: i64,
    },

    /// A transition requested from a state that does not permit it. A caller
    /// logic error, never retried automatically.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The referenced operation does not exist.
    #[error("operation not found")]
    NotFound,

    /// Contention exceeded the bounded wait. Retrying is the caller's call;
    /// this is not data corruption.
    #[error("lock acquisition timed out on {0}")]
    LockTimeout(String),

    /// The ledger rejected the move batch; nothing was written.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::InsufficientStock {
                product,
                requested,
                available,
            } => EngineError::InsufficientStock {
                product,
                requested,
                available,
            },
            DomainError::InvalidTransition(msg) => EngineError::InvalidTransition(msg),
            DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::NotFound => EngineError::NotFound,
        }
    }
}
