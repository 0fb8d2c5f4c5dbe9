//! The channels of one signing session.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use smpc_transport::{SecureChannel, TransportError};
use smpc_types::PeerIdentity;

use crate::{Result, SmpcError};

/// Message each party sends to every peer once it is finished with the session.
pub const DONE_MESSAGE: &[u8] = b"done";

/// One channel per peer, keyed by share index.
///
/// Iteration order is ascending peer index on every node, which keeps
/// broadcast-then-collect rounds deterministic per channel.
pub struct Mesh<S> {
    me: PeerIdentity,
    channels: BTreeMap<PeerIdentity, SecureChannel<S>>,
}

impl<S> Mesh<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(me: PeerIdentity) -> Self {
        Self {
            me,
            channels: BTreeMap::new(),
        }
    }

    /// This node's share index.
    pub fn me(&self) -> PeerIdentity {
        self.me
    }

    /// Admit a channel. A second channel for the same peer is rejected.
    pub fn insert(&mut self, channel: SecureChannel<S>) -> Result<()> {
        let peer = channel.peer();
        if peer == self.me || self.channels.contains_key(&peer) {
            return Err(SmpcError::Channel(TransportError::DuplicatePeer(peer)));
        }
        self.channels.insert(peer, channel);
        Ok(())
    }

    /// Number of peer channels (session size minus one).
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Peer indices in ascending order.
    pub fn peers(&self) -> Vec<PeerIdentity> {
        self.channels.keys().copied().collect()
    }

    pub(crate) fn channels_mut(
        &mut self,
    ) -> impl Iterator<Item = (&PeerIdentity, &mut SecureChannel<S>)> {
        self.channels.iter_mut()
    }

    pub fn channel_mut(&mut self, peer: PeerIdentity) -> Option<&mut SecureChannel<S>> {
        self.channels.get_mut(&peer)
    }

    /// Tell every peer this node is finished, wait for every peer to say the
    /// same, then close all channels.
    ///
    /// Once a party has read `done` from a peer, that peer has consumed every
    /// message this party sent it, so closing cannot cut off a pending read.
    pub async fn drain(mut self, timeout: Duration) -> Result<()> {
        let exchange = async {
            for (_, channel) in self.channels.iter_mut() {
                channel.send_sealed(DONE_MESSAGE).await?;
            }
            for (peer, channel) in self.channels.iter_mut() {
                let message = channel.recv_sealed().await?;
                if message != DONE_MESSAGE {
                    return Err(SmpcError::Sequencing(format!(
                        "peer {peer} sent {} bytes instead of the drain acknowledgement",
                        message.len()
                    )));
                }
            }
            Ok::<(), SmpcError>(())
        };
        let outcome = match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(SmpcError::Channel(TransportError::Timeout(
                "drain acknowledgement".to_string(),
            ))),
        };
        self.close().await;
        outcome
    }

    /// Close every channel without the drain exchange.
    pub async fn close(&mut self) {
        for (peer, mut channel) in std::mem::take(&mut self.channels) {
            if let Err(e) = channel.shutdown().await {
                tracing::debug!(peer = %peer, error = %e, "channel shutdown failed");
            }
        }
    }
}
