//! Loopback clusters for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{Signature, VerifyingKey};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use smpc_crypto::group::{mul_base, random_scalar};
use smpc_crypto::shamir::deal;
use smpc_crypto::x25519::X25519StaticSecret;
use smpc_node::config::{ListenConfig, TimeoutConfig};
use smpc_node::Server;
use smpc_transport::command::request_signature;
use smpc_types::{NodeInfo, SignRequest};

/// One running node.
pub struct TestNode {
    pub info: NodeInfo,
    pub addr: SocketAddr,
    pub shutdown: broadcast::Sender<()>,
    pub handle: JoinHandle<smpc_node::Result<()>>,
}

/// Nodes holding the shares of one dealt key.
pub struct Cluster {
    pub nodes: Vec<TestNode>,
    pub verifying_key: VerifyingKey,
}

pub fn test_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        handshake_secs: 5,
        formation_secs: 15,
        session_secs: 60,
        drain_secs: 5,
    }
}

pub fn loopback() -> ListenConfig {
    ListenConfig {
        addr: "127.0.0.1".to_string(),
        port: 0,
    }
}

impl Cluster {
    /// Deal a fresh key into `total` shares and start one node per share.
    pub async fn start(threshold: u32, total: u32) -> Self {
        let secret = random_scalar();
        let shares = deal(secret, threshold, total).expect("deal");
        let verifying_key =
            VerifyingKey::from_affine(mul_base(&secret).to_affine()).expect("verifying key");

        let mut nodes = Vec::with_capacity(shares.len());
        for share in shares {
            let static_key = X25519StaticSecret::random();
            let server = Server::bind(&loopback(), share, static_key, test_timeouts())
                .await
                .expect("bind");
            let info = server.info().clone();
            let addr = server.local_addr().expect("addr");
            let shutdown = server.shutdown_handle();
            let handle = tokio::spawn(server.run());
            nodes.push(TestNode {
                info,
                addr,
                shutdown,
                handle,
            });
        }
        Self {
            nodes,
            verifying_key,
        }
    }

    /// Roster entries for the nodes at `members` (positions, not share indices).
    pub fn roster(&self, members: &[usize]) -> Vec<NodeInfo> {
        members.iter().map(|&i| self.nodes[i].info.clone()).collect()
    }

    /// Ask node `root` to sign `message` with `members`.
    pub async fn sign(
        &self,
        root: usize,
        members: &[usize],
        message: &[u8],
    ) -> smpc_transport::Result<Vec<u8>> {
        let request = SignRequest::new(message, self.roster(members));
        request_signature(self.nodes[root].addr, &request).await
    }

    /// Parse a DER response and check it against the dealt key.
    pub fn verify(&self, message: &[u8], der: &[u8]) -> Signature {
        let signature = Signature::from_der(der).expect("DER signature");
        self.verifying_key
            .verify(message, &signature)
            .expect("signature verifies");
        signature
    }

    pub fn stop(&self) {
        for node in &self.nodes {
            let _ = node.shutdown.send(());
        }
    }
}
