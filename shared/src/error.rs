use thiserror::Error;

/// Error taxonomy for the relay core.
///
/// Authorization and validation errors are fatal to the single request that
/// raised them; per-recipient delivery errors never surface here, they are
/// recorded in `DispatchResult.delivery_outcomes` instead.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("identity already registered: {0}")]
    DuplicateIdentity(String),

    #[error("account not found: {0}")]
    NotFound(String),

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("invalid admin credential")]
    Unauthorized,

    #[error("schema violation: {0}")]
    Schema(String),

    #[error("value out of range: {0}")]
    Range(String),

    #[error("direction inconsistent: {0}")]
    DirectionInconsistent(String),

    #[error("store I/O error: {0}")]
    Store(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
