//! Running a signing session over a formed mesh.

use tokio::net::TcpStream;
use tracing::{info, warn};

use smpc_protocol::{Signature, Signer, SmpcError};
use smpc_transport::command::write_signature;
use smpc_transport::TransportError;
use smpc_types::{SessionId, SignRequest};

use crate::formation::{form_as_child, form_as_root, FormedSession};
use crate::registry::PeerChannel;
use crate::{NodeState, Result};

/// Serve a `SIGN` as root: form, sign, and answer the client with the DER signature.
///
/// On failure the client connection is dropped without a response.
pub async fn serve_sign(
    state: &NodeState,
    mut client: TcpStream,
    request: SignRequest,
) -> Result<()> {
    let formed = form_as_root(state, &request).await?;
    let id = formed.id;
    let signature = sign_and_drain(state, formed).await?;
    let der = signature.to_der()?;
    write_signature(&mut client, &der)
        .await
        .map_err(SmpcError::from)?;
    info!(session = %id, bytes = der.len(), "signature delivered");
    Ok(())
}

/// Serve a session this node was invited to by the root's channel.
pub async fn serve_child(state: &NodeState, root: PeerChannel, id: SessionId) -> Result<()> {
    let formed = form_as_child(state, root, id).await?;
    sign_and_drain(state, formed).await?;
    Ok(())
}

/// Run the signer within the session timeout, then close the mesh.
///
/// After a successful run the mesh is drained; a failed drain is logged and
/// the signature still stands. After a failed run the channels are closed
/// straight away.
pub async fn sign_and_drain(state: &NodeState, formed: FormedSession) -> Result<Signature> {
    let FormedSession {
        id,
        message,
        mut mesh,
    } = formed;

    let run = async {
        let mut signer = Signer::new(&mut mesh, &state.share)?;
        signer.sign(&message).await
    };
    let outcome = match tokio::time::timeout(state.timeouts.session(), run).await {
        Ok(result) => result,
        Err(_) => Err(SmpcError::Channel(TransportError::Timeout(
            "signing session".to_string(),
        ))),
    };

    match outcome {
        Ok(signature) => {
            info!(session = %id, "signature computed");
            if let Err(e) = mesh.drain(state.timeouts.drain()).await {
                warn!(session = %id, error = %e, "drain failed");
            }
            Ok(signature)
        }
        Err(e) => {
            mesh.close().await;
            Err(e.into())
        }
    }
}
