//! # smpc-types
//!
//! Shared documents and identifiers used across the signing workspace.
//!
//! Everything that crosses a socket or touches disk as JSON lives here: the
//! roster entries a caller sends with `SIGN`, the payload the root forwards to
//! its children, and the persisted share record.

pub mod identity;
pub mod roster;
pub mod share;

pub use identity::{PeerIdentity, SessionId};
pub use roster::{NodeInfo, Participant, SessionPayload, SignRequest};
pub use share::ShareRecord;

/// Length of a base64-decoded X25519 public key in a roster entry.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Errors raised while decoding shared documents.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// A peer identity blob is zero or does not fit a share index.
    #[error("invalid peer identity: {0}")]
    InvalidIdentity(String),

    /// A base64 field failed to decode.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A JSON document failed to parse or serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A public key has the wrong length.
    #[error("invalid public key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// A share record is inconsistent.
    #[error("invalid share record: {0}")]
    InvalidShare(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;
