//! Building the mesh of one session.
//!
//! Root side ([`form_as_root`]):
//!
//! 1. drop its own entry from the roster (matched by public key)
//! 2. dial every member at [`TreeLevel::Direct`]
//! 3. for each direct child in roster order, send the [`SessionPayload`]
//!    with that child's suffix and wait for `connected`
//!
//! Direct-child side ([`form_as_child`]):
//!
//! 1. read the payload from the root
//! 2. dial its suffix at [`TreeLevel::Relay`]
//! 3. send `connected`
//! 4. collect relay links from earlier siblings out of the registry inbox
//!
//! Every admitted channel is checked against the participant list, so a
//! link is only accepted from a member under its announced index and key.

use std::collections::BTreeMap;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info};

use smpc_crypto::shamir::SecretShare;
use smpc_crypto::x25519::X25519PublicKey;
use smpc_protocol::{minimum_participants, Mesh, Result, SmpcError};
use smpc_transport::command::MAX_SIGN_PAYLOAD;
use smpc_transport::{SecureChannel, TransportError};
use smpc_types::{NodeInfo, Participant, PeerIdentity, SessionId, SessionPayload, SignRequest};

use crate::registry::{Inbox, PeerChannel};
use crate::tree::{encode_bootstrap, fan_out, TreeLevel};
use crate::{bounded, NodeState};

/// Acknowledgement a direct child sends once its relay links are dialed.
pub const CONNECTED_ACK: &[u8] = b"connected";

/// Largest session payload a child accepts.
pub const MAX_SESSION_PAYLOAD: usize = 4 * MAX_SIGN_PAYLOAD;

/// A complete mesh, ready for signing.
pub struct FormedSession {
    pub id: SessionId,
    pub message: Vec<u8>,
    pub mesh: Mesh<TcpStream>,
}

/// Session members and the static keys they must present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participants {
    members: BTreeMap<PeerIdentity, X25519PublicKey>,
}

impl Participants {
    /// Decode the list carried in a session payload.
    pub fn from_list(list: &[Participant]) -> Result<Self> {
        let mut members = BTreeMap::new();
        for participant in list {
            let key = participant
                .public_key_bytes()
                .map_err(|e| SmpcError::Roster(format!("participant {}: {e}", participant.index)))?;
            if members
                .insert(participant.index, X25519PublicKey::from_bytes(key))
                .is_some()
            {
                return Err(SmpcError::Roster(format!(
                    "participant {} listed twice",
                    participant.index
                )));
            }
        }
        Ok(Self { members })
    }

    /// Number of members, this node included.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Require `peer` to be a member holding `key`.
    pub fn check(&self, peer: PeerIdentity, key: &X25519PublicKey) -> Result<()> {
        match self.members.get(&peer) {
            Some(expected) if expected == key => Ok(()),
            Some(_) => Err(SmpcError::Channel(TransportError::Handshake(format!(
                "peer {peer} presented a static key other than the announced one"
            )))),
            None => Err(SmpcError::Channel(TransportError::Handshake(format!(
                "peer {peer} is not a session participant"
            )))),
        }
    }

    /// Require the channel's identity and authenticated key to match the list.
    pub fn check_channel<S>(&self, channel: &SecureChannel<S>) -> Result<()>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        self.check(channel.peer(), channel.remote_static())
    }
}

/// Reject rosters that cannot open a product or name more members than shares exist.
pub fn check_roster_size(members: usize, share: &SecretShare) -> Result<()> {
    let minimum = minimum_participants(share.threshold);
    if members < minimum {
        return Err(SmpcError::Roster(format!(
            "{members} members, at least {minimum} needed for threshold {}",
            share.threshold
        )));
    }
    if members > share.total as usize {
        return Err(SmpcError::Roster(format!(
            "{members} members, only {} shares exist",
            share.total
        )));
    }
    Ok(())
}

/// Open a channel to `info` and announce the session on it.
async fn dial(
    state: &NodeState,
    info: &NodeInfo,
    key: X25519PublicKey,
    level: TreeLevel,
    session: SessionId,
) -> Result<PeerChannel> {
    let host = info.host().to_string();
    let port = info.port;
    let link = async {
        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| SmpcError::Roster(format!("peer {host}:{port} unreachable: {e}")))?;
        let mut channel = SecureChannel::connect(stream, &state.static_key, key, state.me).await?;
        channel
            .send_sealed(&encode_bootstrap(level, &session))
            .await?;
        Ok::<_, SmpcError>(channel)
    };
    match tokio::time::timeout(state.timeouts.handshake(), link).await {
        Ok(result) => result,
        Err(_) => Err(SmpcError::Roster(format!(
            "peer {host}:{port} did not complete the handshake in time"
        ))),
    }
}

/// Resolve the roster and form the mesh as root of a fresh session.
pub async fn form_as_root(state: &NodeState, request: &SignRequest) -> Result<FormedSession> {
    let message = request
        .message()
        .map_err(|e| SmpcError::Channel(TransportError::InvalidPayload(e.to_string())))?;

    let mut roster = Vec::with_capacity(request.nodes.len());
    for info in &request.nodes {
        let key = X25519PublicKey::from_bytes(info.public_key_bytes().map_err(|e| {
            SmpcError::Roster(format!("roster entry {}:{}: {e}", info.host(), info.port))
        })?);
        if key == state.public_key {
            continue;
        }
        roster.push((info.clone(), key));
    }
    check_roster_size(roster.len() + 1, &state.share)?;

    let id = SessionId::random();
    info!(session = %id, members = roster.len() + 1, "forming mesh as root");

    let mut mesh = Mesh::new(state.me);
    match root_links(state, id, &request.data, &roster, &mut mesh).await {
        Ok(()) => {
            info!(session = %id, peers = mesh.len(), "mesh formed");
            Ok(FormedSession { id, message, mesh })
        }
        Err(e) => {
            mesh.close().await;
            Err(e)
        }
    }
}

async fn root_links(
    state: &NodeState,
    id: SessionId,
    data: &str,
    roster: &[(NodeInfo, X25519PublicKey)],
    mesh: &mut Mesh<TcpStream>,
) -> Result<()> {
    let mut participants = vec![Participant::new(state.me, state.public_key.as_bytes())];
    let mut children = Vec::with_capacity(roster.len());
    for (info, key) in roster {
        let channel = dial(state, info, *key, TreeLevel::Direct, id).await?;
        let peer = channel.peer();
        debug!(session = %id, peer = %peer, level = 0, "direct link open");
        mesh.insert(channel)?;
        participants.push(Participant::new(peer, key.as_bytes()));
        children.push((peer, info.clone()));
    }

    for ((child, _), suffix) in fan_out(&children) {
        let payload = SessionPayload {
            data: data.to_string(),
            nodes: suffix.into_iter().map(|(_, info)| info).collect(),
            participants: participants.clone(),
        };
        let document = payload
            .to_json()
            .map_err(|e| SmpcError::Sequencing(e.to_string()))?;
        let channel = mesh
            .channel_mut(child)
            .ok_or_else(|| SmpcError::Sequencing(format!("no channel for child {child}")))?;
        channel.send_sealed_document(&document).await?;

        let ack = bounded(
            state.timeouts.formation(),
            "connected acknowledgement",
            channel.recv_sealed(),
        )
        .await?;
        if ack != CONNECTED_ACK {
            return Err(SmpcError::Sequencing(format!(
                "child {child} sent {} bytes instead of the connected acknowledgement",
                ack.len()
            )));
        }
        debug!(session = %id, peer = %child, "child connected");
    }
    Ok(())
}

/// Form the mesh as a direct child, starting from the root's channel.
pub async fn form_as_child(
    state: &NodeState,
    root: PeerChannel,
    id: SessionId,
) -> Result<FormedSession> {
    let inbox = state
        .registry
        .claim(id)
        .await
        .ok_or_else(|| SmpcError::Sequencing(format!("session {id} is already running")))?;

    let mut mesh = Mesh::new(state.me);
    let outcome = child_links(state, id, root, inbox, &mut mesh).await;
    state.registry.release(id).await;
    match outcome {
        Ok(message) => {
            info!(session = %id, peers = mesh.len(), "mesh formed");
            Ok(FormedSession { id, message, mesh })
        }
        Err(e) => {
            mesh.close().await;
            Err(e)
        }
    }
}

async fn child_links(
    state: &NodeState,
    id: SessionId,
    mut root: PeerChannel,
    mut inbox: Inbox,
    mesh: &mut Mesh<TcpStream>,
) -> Result<Vec<u8>> {
    let document = bounded(
        state.timeouts.formation(),
        "session payload",
        root.recv_sealed_document(MAX_SESSION_PAYLOAD),
    )
    .await?;
    let payload =
        SessionPayload::from_json(&document).map_err(|e| SmpcError::Sequencing(e.to_string()))?;
    let message = payload
        .message()
        .map_err(|e| SmpcError::Sequencing(e.to_string()))?;

    let participants = Participants::from_list(&payload.participants)?;
    participants.check(state.me, &state.public_key).map_err(|_| {
        SmpcError::Roster(format!("this node ({}) is not listed with its own key", state.me))
    })?;
    participants.check_channel(&root)?;
    check_roster_size(participants.len(), &state.share)?;

    let root_id = root.peer();
    mesh.insert(root)?;

    for info in &payload.nodes {
        let key = X25519PublicKey::from_bytes(info.public_key_bytes().map_err(|e| {
            SmpcError::Roster(format!("suffix entry {}:{}: {e}", info.host(), info.port))
        })?);
        let channel = dial(state, info, key, TreeLevel::Relay, id).await?;
        participants.check_channel(&channel)?;
        debug!(session = %id, peer = %channel.peer(), level = 1, "relay link open");
        mesh.insert(channel)?;
    }

    mesh.channel_mut(root_id)
        .ok_or_else(|| SmpcError::Sequencing("root channel missing".to_string()))?
        .send_sealed(CONNECTED_ACK)
        .await?;

    let deadline = Instant::now() + state.timeouts.formation();
    while mesh.len() + 1 < participants.len() {
        let channel = match tokio::time::timeout_at(deadline, inbox.recv()).await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                return Err(SmpcError::Sequencing(format!(
                    "relay inbox for session {id} closed"
                )))
            }
            Err(_) => {
                return Err(SmpcError::Channel(TransportError::Timeout(format!(
                    "{} of {} relay links",
                    mesh.len() + 1,
                    participants.len()
                ))))
            }
        };
        participants.check_channel(&channel)?;
        debug!(session = %id, peer = %channel.peer(), level = 1, "relay link accepted");
        mesh.insert(channel)?;
    }
    Ok(message)
}
