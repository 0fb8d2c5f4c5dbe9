//! # smpc-node
//!
//! A signing node. One TCP port serves both control commands (`SIGN`,
//! `HALT`) and the secure channels other nodes open to it (`SECU`).
//!
//! A `SIGN` makes the receiving node the root of a new session: it dials
//! every roster member, hands each direct child the rest of the roster, and
//! once every pair of members shares a channel all of them run the
//! threshold signing protocol together.
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration
//! - [`tree`]: fan-out plan and the channel bootstrap message
//! - [`registry`]: per-session inbox for relay links
//! - [`formation`]: building the mesh as root or as direct child
//! - [`session`]: running the signer over a formed mesh
//! - [`server`]: the accept loop and command dispatch

pub mod config;
pub mod formation;
pub mod registry;
pub mod server;
pub mod session;
pub mod tree;

pub use config::NodeConfig;
pub use server::Server;

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

use smpc_crypto::shamir::SecretShare;
use smpc_crypto::x25519::{X25519PublicKey, X25519StaticSecret};
use smpc_protocol::SmpcError;
use smpc_transport::TransportError;
use smpc_types::PeerIdentity;

use crate::config::TimeoutConfig;
use crate::registry::SessionRegistry;

/// Node-level failures.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// A signing session failed. Only that session is affected.
    #[error(transparent)]
    Session(#[from] SmpcError),

    /// The share or key material cannot run a node.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket error outside any session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Process-wide state shared by every connection task.
pub struct NodeState {
    /// This node's key share.
    pub share: SecretShare,
    /// Share index, used as identity on every channel.
    pub me: PeerIdentity,
    /// Static X25519 key for the Noise handshakes.
    pub static_key: X25519StaticSecret,
    pub public_key: X25519PublicKey,
    pub timeouts: TimeoutConfig,
    /// Relay links waiting for their session.
    pub registry: SessionRegistry,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl NodeState {
    pub fn new(
        share: SecretShare,
        static_key: X25519StaticSecret,
        timeouts: TimeoutConfig,
    ) -> Result<Self> {
        let me = PeerIdentity::new(share.index).map_err(|e| NodeError::Config(e.to_string()))?;
        if share.index > share.total || share.threshold == 0 || share.threshold > share.total {
            return Err(NodeError::Config(format!(
                "share {} of {} with threshold {} is inconsistent",
                share.index, share.total, share.threshold
            )));
        }
        let public_key = static_key.public_key();
        let registry = SessionRegistry::new(timeouts.formation() * 2);
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            share,
            me,
            static_key,
            public_key,
            timeouts,
            registry,
            shutdown_tx,
        })
    }
}

/// Await `fut` for at most `limit`; expiry is a channel timeout naming `what`.
pub(crate) async fn bounded<T, E, F>(
    limit: Duration,
    what: &str,
    fut: F,
) -> smpc_protocol::Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    SmpcError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SmpcError::Channel(TransportError::Timeout(what.to_string()))),
    }
}
