use crate::commitments::Commitment;
use crate::gate::Verification;
use crate::store::StoreError;

/// Errors surfaced by the registry and its components.
///
/// Conflicts carry the record that already exists so the caller can show it
/// without a second lookup.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("owner {} already registered commitment {}", .0.owner_id, .0.value_hex())]
    AlreadyRegistered(Box<Commitment>),

    #[error("owner {} is already verified by {}", .0.owner_id, .0.transaction_ref)]
    AlreadyVerified(Box<Verification>),

    #[error("not found: {0}")]
    NotFound(String),

    // A well-formed value that is not a leaf of the current tree.
    #[error("commitment {0} is not in the current tree")]
    NotInSet(String),

    #[error("payment rejected: {0}")]
    PaymentRejected(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
