//! Hand-off point for relay links.
//!
//! A relay channel can arrive before its session has started locally: an
//! earlier sibling finishes its dials while this node is still waiting for
//! the root's payload. Channels are queued per session id until the session
//! claims its inbox.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use smpc_transport::SecureChannel;
use smpc_types::SessionId;

/// A mesh channel over TCP.
pub type PeerChannel = SecureChannel<TcpStream>;

/// Receiving end handed to a session.
pub type Inbox = mpsc::UnboundedReceiver<PeerChannel>;

struct Slot {
    tx: mpsc::UnboundedSender<PeerChannel>,
    rx: Option<Inbox>,
    opened: Instant,
}

impl Slot {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Some(rx),
            opened: Instant::now(),
        }
    }
}

#[derive(Default)]
struct Slots {
    open: HashMap<SessionId, Slot>,
    finished: HashMap<SessionId, Instant>,
}

/// Per-node map from session id to pending relay channels.
///
/// Released sessions are remembered for a while so a late relay link is
/// closed on arrival instead of opening a new slot.
pub struct SessionRegistry {
    slots: Mutex<Slots>,
    max_unclaimed_age: Duration,
}

impl SessionRegistry {
    /// Slots never claimed within `max_unclaimed_age` are dropped with their channels.
    pub fn new(max_unclaimed_age: Duration) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            max_unclaimed_age,
        }
    }

    /// Queue a relay channel for `session`.
    pub async fn deliver(&self, session: SessionId, channel: PeerChannel) {
        let mut slots = self.slots.lock().await;
        self.prune(&mut slots);
        let peer = channel.peer();
        if slots.finished.contains_key(&session) {
            warn!(session = %session, peer = %peer, "relay link for a finished session dropped");
            return;
        }
        let slot = slots.open.entry(session).or_insert_with(Slot::new);
        if slot.tx.send(channel).is_err() {
            warn!(session = %session, peer = %peer, "relay link for a finished session dropped");
        } else {
            debug!(session = %session, peer = %peer, "relay link queued");
        }
    }

    /// Take the inbox of `session`. Only the first caller gets it.
    pub async fn claim(&self, session: SessionId) -> Option<Inbox> {
        let mut slots = self.slots.lock().await;
        self.prune(&mut slots);
        if slots.finished.contains_key(&session) {
            return None;
        }
        slots.open.entry(session).or_insert_with(Slot::new).rx.take()
    }

    /// Forget `session`. Channels still queued are closed.
    pub async fn release(&self, session: SessionId) {
        let mut slots = self.slots.lock().await;
        slots.open.remove(&session);
        slots.finished.insert(session, Instant::now());
        self.prune(&mut slots);
    }

    /// Drop stale slots without waiting for the next delivery.
    pub async fn sweep(&self) {
        let mut slots = self.slots.lock().await;
        self.prune(&mut slots);
    }

    /// Number of sessions with an open slot.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.open.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.open.is_empty()
    }

    fn prune(&self, slots: &mut Slots) {
        let max_age = self.max_unclaimed_age;
        slots.open.retain(|session, slot| {
            let keep = slot.rx.is_none() || slot.opened.elapsed() < max_age;
            if !keep {
                debug!(session = %session, "dropping unclaimed relay links");
            }
            keep
        });
        slots.finished.retain(|_, at| at.elapsed() < max_age);
    }
}
