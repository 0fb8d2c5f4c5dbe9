//! # smpc-protocol
//!
//! Secret-shared ECDSA signing over a complete mesh of secure channels.
//!
//! Every participant runs the same code with only its own share; nothing in
//! this crate ever holds the signing key or the nonce in the clear.
//!
//! ## Modules
//!
//! - [`mesh`]: the per-session map of peer channels and the drain handshake
//! - [`primitives`]: randomness, zero sharing, opening, multiplication, inversion, keypairs
//! - [`signing`]: the signing state machine and DER signature encoding

pub mod mesh;
pub mod primitives;
pub mod signing;

pub use mesh::Mesh;
pub use primitives::Party;
pub use signing::{Signature, Signer, SigningState};

use smpc_crypto::shamir::SecretShare;
use smpc_crypto::CryptoError;
use smpc_transport::TransportError;
use smpc_types::ShareRecord;

/// Session failures. Each is fatal to the current session only.
#[derive(Debug, thiserror::Error)]
pub enum SmpcError {
    /// A channel could not be established or broke mid-session.
    #[error("channel error: {0}")]
    Channel(TransportError),

    /// A message arrived out of the expected order, or a step was skipped.
    #[error("sequencing error: {0}")]
    Sequencing(String),

    /// A non-invertible value or a malformed share.
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] CryptoError),

    /// The chosen participant set cannot run the protocol.
    #[error("roster error: {0}")]
    Roster(String),
}

impl From<TransportError> for SmpcError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::UnexpectedFrame { .. }
            | TransportError::UnknownCommand(_)
            | TransportError::InvalidFrame(_) => SmpcError::Sequencing(err.to_string()),
            other => SmpcError::Channel(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SmpcError>;

/// Smallest session that can open a product of two shared values.
///
/// The product of two degree `k - 1` sharings has degree `2k - 2`, so
/// interpolating it needs `2k - 1` points.
pub fn minimum_participants(threshold: u32) -> usize {
    (2 * threshold as usize).saturating_sub(1)
}

/// Turn a loaded share record into a share over the signing group.
pub fn secret_share_from_record(record: &ShareRecord) -> Result<SecretShare> {
    let value = smpc_crypto::group::scalar_from_str(&record.y)?;
    Ok(SecretShare {
        threshold: record.k,
        total: record.n,
        index: record.x,
        value,
    })
}

#[cfg(test)]
pub(crate) mod testing;
