//! In-memory meshes for protocol tests.

use tokio::io::{AsyncReadExt, DuplexStream};

use smpc_crypto::x25519::X25519StaticSecret;
use smpc_transport::SecureChannel;
use smpc_types::PeerIdentity;

use crate::Mesh;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Build one mesh per index with a real handshake on every pair.
///
/// The returned meshes are in the same order as `indices`.
pub(crate) async fn full_mesh(indices: &[u32]) -> Vec<Mesh<DuplexStream>> {
    let ids: Vec<PeerIdentity> = indices
        .iter()
        .map(|&i| PeerIdentity::new(i).expect("index"))
        .collect();
    let statics: Vec<X25519StaticSecret> =
        ids.iter().map(|_| X25519StaticSecret::random()).collect();
    let mut meshes: Vec<Mesh<DuplexStream>> = ids.iter().map(|&id| Mesh::new(id)).collect();

    for a in 0..ids.len() {
        for b in (a + 1)..ids.len() {
            let (a_io, mut b_io) = tokio::io::duplex(PIPE_CAPACITY);
            let connect =
                SecureChannel::connect(a_io, &statics[a], statics[b].public_key(), ids[a]);
            let (b_static, b_id) = (&statics[b], ids[b]);
            let accept = async move {
                let mut tag = [0u8; 4];
                b_io.read_exact(&mut tag).await.expect("tag");
                SecureChannel::accept(b_io, b_static, b_id).await
            };
            let (a_side, b_side) = tokio::join!(connect, accept);
            meshes[a].insert(a_side.expect("connect")).expect("insert");
            meshes[b].insert(b_side.expect("accept")).expect("insert");
        }
    }
    meshes
}
