//! TCP accept loop and command dispatch.
//!
//! Every accepted connection gets its own task. The first four bytes pick
//! the handler: `SIGN` starts a session as root, `SECU` is a mesh channel
//! from another node, `HALT` stops the loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use smpc_crypto::shamir::SecretShare;
use smpc_crypto::x25519::X25519StaticSecret;
use smpc_protocol::SmpcError;
use smpc_transport::command::read_command;
use smpc_transport::{Command, SecureChannel};
use smpc_types::NodeInfo;

use crate::config::{ListenConfig, TimeoutConfig};
use crate::tree::{decode_bootstrap, TreeLevel, BOOTSTRAP_LEN};
use crate::{bounded, session, NodeState, Result};

/// A bound node, ready to serve.
pub struct Server {
    state: Arc<NodeState>,
    listener: TcpListener,
    info: NodeInfo,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Server {
    /// Bind the listening socket. Port 0 picks a free port.
    pub async fn bind(
        listen: &ListenConfig,
        share: SecretShare,
        static_key: X25519StaticSecret,
        timeouts: TimeoutConfig,
    ) -> Result<Self> {
        let state = Arc::new(NodeState::new(share, static_key, timeouts)?);
        let listener = TcpListener::bind((listen.addr.as_str(), listen.port)).await?;
        let port = listener.local_addr()?.port();
        let info = NodeInfo::new(listen.addr.clone(), port, state.public_key.as_bytes());
        let shutdown_rx = state.shutdown_tx.subscribe();
        info!(me = %state.me, addr = %listen.addr, port, "node listening");
        Ok(Self {
            state,
            listener,
            info,
            shutdown_rx,
        })
    }

    /// Contact information other nodes put in their rosters.
    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Sender that stops [`Server::run`], as `HALT` does.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.state.shutdown_tx.clone()
    }

    /// Accept connections until shutdown.
    pub async fn run(mut self) -> Result<()> {
        let period = self.state.timeouts.formation().max(Duration::from_secs(1));
        let mut sweep = tokio::time::interval(period);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let state = self.state.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(state, stream, remote).await {
                                warn!("Connection error from {}: {}", remote, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                },
                _ = sweep.tick() => self.state.registry.sweep().await,
                _ = self.shutdown_rx.recv() => {
                    info!(me = %self.state.me, "shutdown requested");
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Handle a single inbound connection.
async fn handle_connection(
    state: Arc<NodeState>,
    mut stream: TcpStream,
    remote: SocketAddr,
) -> Result<()> {
    let command = bounded(
        state.timeouts.handshake(),
        "command",
        read_command(&mut stream),
    )
    .await?;
    debug!(%remote, command = %String::from_utf8_lossy(command.tag()), "command received");

    match command {
        Command::Sign(request) => session::serve_sign(&state, stream, request).await,
        Command::Secure => accept_link(&state, stream).await,
        Command::Halt => {
            info!(%remote, "HALT received");
            let _ = state.shutdown_tx.send(());
            Ok(())
        }
    }
}

/// Complete an inbound mesh channel and route it by tree level.
async fn accept_link(state: &NodeState, stream: TcpStream) -> Result<()> {
    let link = async {
        let mut channel = SecureChannel::accept(stream, &state.static_key, state.me).await?;
        let bootstrap = channel.recv_sealed_exact(BOOTSTRAP_LEN).await?;
        Ok::<_, SmpcError>((channel, bootstrap))
    };
    let (channel, bootstrap) = bounded(state.timeouts.handshake(), "handshake", link).await?;
    let (level, id) = decode_bootstrap(&bootstrap)
        .ok_or_else(|| SmpcError::Sequencing("malformed channel bootstrap".to_string()))?;

    match level {
        TreeLevel::Direct => {
            debug!(session = %id, peer = %channel.peer(), "invited by root");
            session::serve_child(state, channel, id).await
        }
        TreeLevel::Relay => {
            state.registry.deliver(id, channel).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smpc_crypto::group::random_scalar;
    use smpc_transport::command::send_halt;
    use tokio::io::AsyncWriteExt;

    fn share() -> SecretShare {
        SecretShare {
            threshold: 2,
            total: 3,
            index: 2,
            value: random_scalar(),
        }
    }

    fn loopback() -> ListenConfig {
        ListenConfig {
            addr: "127.0.0.1".to_string(),
            port: 0,
        }
    }

    #[tokio::test]
    async fn test_bind_publishes_info() {
        let static_key = X25519StaticSecret::random();
        let public_key = static_key.public_key();
        let server = Server::bind(&loopback(), share(), static_key, TimeoutConfig::default())
            .await
            .expect("bind");
        let info = server.info();
        assert_eq!(info.host(), "127.0.0.1");
        assert_eq!(info.port, server.local_addr().expect("addr").port());
        assert_ne!(info.port, 0);
        assert_eq!(&info.public_key_bytes().expect("key"), public_key.as_bytes());
    }

    #[tokio::test]
    async fn test_halt_ends_run() {
        let server = Server::bind(
            &loopback(),
            share(),
            X25519StaticSecret::random(),
            TimeoutConfig::default(),
        )
        .await
        .expect("bind");
        let addr = server.local_addr().expect("addr");
        let handle = tokio::spawn(server.run());

        // A stray connection does not stop the loop.
        let mut stray = TcpStream::connect(addr).await.expect("connect");
        stray.write_all(b"NOPE").await.expect("write");

        send_halt(addr).await.expect("halt");
        handle.await.expect("join").expect("run");
    }
}
