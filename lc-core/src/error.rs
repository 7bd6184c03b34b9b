//! Error types for LC orchestration

use crate::operation::OperationRef;
use crate::types::Address;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type for LC operations
pub type Result<T> = std::result::Result<T, Error>;

/// LC orchestration errors
#[derive(Error, Debug)]
pub enum Error {
    /// Bad input; never reaches the ledger
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transition guard violated (stale projection or concurrent change)
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Signer is not the party of record for this transition
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Nonce already consumed or out of order
    #[error("Sequence collision for {signer}: offered nonce {offered}, ledger expects {expected}")]
    SequenceCollision {
        /// Signer whose sequence collided
        signer: Address,
        /// Nonce carried by the rejected operation
        offered: u64,
        /// Next nonce the ledger would accept
        expected: u64,
    },

    /// Fee rate below the ledger's floor
    #[error("Operation underpriced: offered fee rate {offered}, minimum {minimum}")]
    UnderpricedOperation {
        /// Fee rate carried by the rejected operation
        offered: u64,
        /// Minimum fee rate reported by the ledger
        minimum: u64,
    },

    /// Receipt did not arrive in time; the operation may still be applied
    #[error("Confirmation timed out after {waited_ms}ms; operation {reference} may still be pending")]
    ConfirmationTimeout {
        /// Reference of the broadcast operation
        reference: OperationRef,
        /// How long the pipeline waited
        waited_ms: u64,
    },

    /// Caller stopped waiting; the operation may still be applied
    #[error("Stopped waiting for confirmation of {reference}; operation may still be pending")]
    ConfirmationCancelled {
        /// Reference of the broadcast operation
        reference: OperationRef,
    },

    /// Unknown LC id or operation reference
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connectivity failure to the ledger collaborator
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Permanent rejection by the ledger (bad signature, gas budget, ...)
    #[error("Operation rejected by ledger: {0}")]
    Rejected(String),

    /// Signing credential could not be loaded
    #[error("Credential error: {0}")]
    Credential(String),

    /// Receipt did not carry the expected structured event
    #[error("Event decoding error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Canonical encoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Coarse error classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Input rejected before any ledger call
    ValidationError,
    /// Guard violated; re-read state before trying again
    StateConflict,
    /// Wrong signer for the transition
    Unauthorized,
    /// Retries on sequence collisions were exhausted
    SequenceCollision,
    /// Fee bump did not clear the ledger's floor
    UnderpricedOperation,
    /// Outcome unknown; re-query status before resubmitting
    ConfirmationTimeout,
    /// Unknown id
    NotFound,
    /// Ledger could not be reached
    LedgerUnavailable,
    /// Permanent ledger rejection
    Rejected,
    /// Anything else
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::StateConflict => "StateConflict",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::SequenceCollision => "SequenceCollision",
            ErrorKind::UnderpricedOperation => "UnderpricedOperation",
            ErrorKind::ConfirmationTimeout => "ConfirmationTimeout",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::LedgerUnavailable => "LedgerUnavailable",
            ErrorKind::Rejected => "Rejected",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::ValidationError,
            Error::StateConflict(_) => ErrorKind::StateConflict,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::SequenceCollision { .. } => ErrorKind::SequenceCollision,
            Error::UnderpricedOperation { .. } => ErrorKind::UnderpricedOperation,
            Error::ConfirmationTimeout { .. } | Error::ConfirmationCancelled { .. } => {
                ErrorKind::ConfirmationTimeout
            }
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
            Error::Rejected(_) => ErrorKind::Rejected,
            Error::Credential(_)
            | Error::Decode(_)
            | Error::Config(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Metrics(_) => ErrorKind::Internal,
        }
    }

    /// Reference of an operation that was broadcast but not confirmed
    pub fn pending_reference(&self) -> Option<&OperationRef> {
        match self {
            Error::ConfirmationTimeout { reference, .. }
            | Error::ConfirmationCancelled { reference } => Some(reference),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_errors_carry_reference() {
        let reference = OperationRef::from_digest([7u8; 32]);
        let timeout = Error::ConfirmationTimeout {
            reference: reference.clone(),
            waited_ms: 1_000,
        };
        let cancelled = Error::ConfirmationCancelled {
            reference: reference.clone(),
        };

        assert_eq!(timeout.kind(), ErrorKind::ConfirmationTimeout);
        assert_eq!(cancelled.kind(), ErrorKind::ConfirmationTimeout);
        assert_eq!(timeout.pending_reference(), Some(&reference));
        assert!(Error::Rejected("bad signature".into()).pending_reference().is_none());
    }

    #[test]
    fn test_kind_display_matches_taxonomy() {
        assert_eq!(
            Error::Validation("amount".into()).kind().to_string(),
            "ValidationError"
        );
        assert_eq!(Error::NotFound("lc 9".into()).kind().to_string(), "NotFound");
        assert_eq!(
            Error::Decode("missing event".into()).kind(),
            ErrorKind::Internal
        );
    }
}
