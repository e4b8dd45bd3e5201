use thiserror::Error as ThisError;
use tracing::error;

use crate::types::FileContractId;

/// Errors returned by obligation bookkeeping.
///
/// Every variant describes input the caller should never have produced.
/// Environmental failures (disk, network, persistence) are logged where they
/// happen and never surface through this type.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Origin transaction must contain exactly one file contract, found {0}")]
    MalformedOrigin(usize),
    #[error("Expected exactly one file contract revision, found {0}")]
    MalformedRevision(usize),
    #[error("File contract {0} is missing the host's proof outputs")]
    MissingHostOutputs(FileContractId),
    #[error("Revision for {revision} cannot be applied to obligation {obligation}")]
    MismatchedRevision {
        obligation: FileContractId,
        revision: FileContractId,
    },
    #[error("Obligation {0} was added with a revision already present")]
    RevisionOnAdd(FileContractId),
    #[error("Obligation {0} is already tracked")]
    DuplicateObligation(FileContractId),
    #[error("Obligation {0} is not tracked")]
    UnknownObligation(FileContractId),
}

/// Reports a broken internal invariant. Debug builds abort on the spot,
/// release builds log loudly and hand the error back to the caller.
pub(crate) fn invariant_violation(err: Error) -> Error {
    error!("Invariant violation: {}", err);
    debug_assert!(false, "invariant violation: {}", err);
    err
}
