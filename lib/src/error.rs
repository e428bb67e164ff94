//! Error kinds shared by the codec, header store and transaction engine.

use thiserror::Error;

/// Every way a header, a chunk of headers, or a transaction can fail to
/// parse or verify in this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("attempt to read past end of buffer")]
    TruncatedBuffer,

    #[error("invalid header length: expected {expected}, got {actual}")]
    BadHeaderLength { expected: usize, actual: usize },

    #[error("prev hash mismatch: expected {expected}, got {actual}")]
    PrevHashMismatch { expected: String, actual: String },

    #[error("bits mismatch: expected {expected:#010x}, got {actual:#010x}")]
    BitsMismatch { expected: u32, actual: u32 },

    #[error("insufficient proof of work: hash {hash} exceeds target {target}")]
    InsufficientPoW { hash: String, target: String },

    #[error("invalid compact bits encoding: {0:#010x}")]
    InvalidCompactBits(u32),

    #[error("overwintered transaction with invalid version {0}")]
    TransactionVersionError(u32),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("unknown txin type")]
    UnknownTxinType,

    #[error("not a recognized redeem script")]
    NotRecognizedRedeemScript,

    #[error("sanity check verifying our own signature failed")]
    SanityCheckFailed,

    #[error("duplicate URI parameter: {0}")]
    DuplicateParameter(String),

    #[error("invalid payment URI: {0}")]
    InvalidURI(String),

    #[error("header not found at height {0}")]
    HeaderNotFound(i64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
