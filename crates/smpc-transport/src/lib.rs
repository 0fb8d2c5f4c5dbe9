//! # smpc-transport
//!
//! Node-to-node channels and the control-socket command codec.
//!
//! ## Layers
//!
//! ```text
//! SecureChannel (channel.rs)  -- identity bootstrap, clear/sealed messages
//!     |
//!     v
//! Frame (frame.rs)            -- [u16 len][u8 kind][body]
//!     |
//!     v
//! Noise XK (noise.rs)         -- 48/48/64-byte handshake, transport keys
//!     |
//!     v
//! any AsyncRead + AsyncWrite stream (TCP, in-memory duplex)
//! ```
//!
//! Control connections start with a 4-byte tag decoded by [`command`]; a
//! `SECU` tag hands the rest of the stream to [`channel::SecureChannel::accept`].

pub mod channel;
pub mod command;
pub mod frame;
pub mod noise;

pub use channel::SecureChannel;
pub use command::Command;
pub use frame::FrameKind;

use smpc_types::PeerIdentity;

/// Error types for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The Noise handshake or identity bootstrap failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A message had a different size than the reader required.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A channel for this peer identity already exists in the session.
    #[error("duplicate channel for peer {0}")]
    DuplicatePeer(PeerIdentity),

    /// A clear frame arrived where a sealed one was expected, or vice versa.
    #[error("unexpected {actual:?} frame, expected {expected:?}")]
    UnexpectedFrame { expected: FrameKind, actual: FrameKind },

    /// A frame carried an unknown kind byte.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The control socket sent an unknown command tag.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// A command payload could not be decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A command payload exceeds the accepted size.
    #[error("payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// The peer closed the stream.
    #[error("connection closed by peer")]
    Closed,

    /// Socket error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Cipher failure on an established channel.
    #[error("crypto error: {0}")]
    Crypto(#[from] smpc_crypto::CryptoError),

    /// A bounded wait expired.
    #[error("timed out: {0}")]
    Timeout(String),
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Map an I/O error, keeping a premature end of stream distinguishable.
pub(crate) fn io_error(err: std::io::Error) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::UnexpectedEof => TransportError::Closed,
        _ => TransportError::Io(err.to_string()),
    }
}
