//! # smpc-crypto
//!
//! Cryptographic building blocks for the threshold signing nodes.
//!
//! The suite is fixed: secp256k1 for the signing group, X25519 +
//! ChaCha20-Poly1305 + BLAKE3 for the node-to-node channels. There is no
//! algorithm negotiation.
//!
//! ## Modules
//!
//! - [`group`]: secp256k1 scalar and point helpers (encoding, inversion, digests)
//! - [`shamir`]: Shamir polynomials, shares and Lagrange reconstruction
//! - [`x25519`]: X25519 static keys and Diffie-Hellman (RFC 7748)
//! - [`chacha20`]: ChaCha20-Poly1305 with Noise-style counter nonces (RFC 8439)
//! - [`blake3`]: BLAKE3 hashing and the HKDF used by the handshake

pub mod blake3;
pub mod chacha20;
pub mod group;
pub mod shamir;
pub mod x25519;

/// Error types for cryptographic and arithmetic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AEAD decryption failed (authentication tag mismatch).
    #[error("AEAD decryption failed")]
    AeadDecryption,

    /// AEAD encryption failed.
    #[error("AEAD encryption failed")]
    AeadEncryption,

    /// The 64-bit nonce counter of a cipher state is used up.
    #[error("nonce counter exhausted")]
    NonceExhausted,

    /// Diffie-Hellman produced the all-zero output (low-order peer key).
    #[error("non-contributory Diffie-Hellman result")]
    NonContributory,

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Attempted to invert zero modulo the group order.
    #[error("zero has no inverse modulo the group order")]
    NotInvertible,

    /// A scalar encoding is out of range or malformed.
    #[error("invalid scalar: {0}")]
    InvalidScalar(String),

    /// A point encoding is not on the curve, or the identity was encoded.
    #[error("invalid point: {0}")]
    InvalidPoint(String),

    /// A share set cannot be interpolated (duplicate or zero index, empty set).
    #[error("malformed share set: {0}")]
    MalformedShares(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
