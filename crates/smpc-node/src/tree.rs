//! Tree fan-out for mesh formation.
//!
//! The root dials every roster member. Each direct child then dials the
//! members listed after it, so with roster `[a, b, c, d]`:
//!
//! ```text
//! root -> a, b, c, d      (level 0)
//! a -> b, c, d            (level 1)
//! b -> c, d
//! c -> d
//! ```
//!
//! Every pair ends up with exactly one channel.

use smpc_types::identity::SESSION_ID_LEN;
use smpc_types::SessionId;

/// Length of the sealed message that opens every mesh channel.
pub const BOOTSTRAP_LEN: usize = 1 + SESSION_ID_LEN;

/// Which side of the tree opened a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeLevel {
    /// Opened by the root; the receiver is a direct child and gets the session payload.
    Direct = 0,
    /// Opened by a direct child towards a later sibling.
    Relay = 1,
}

impl TreeLevel {
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Direct),
            1 => Some(Self::Relay),
            _ => None,
        }
    }
}

/// Every direct child paired with the roster suffix it must dial.
pub fn fan_out<T: Clone>(roster: &[T]) -> Vec<(T, Vec<T>)> {
    roster
        .iter()
        .enumerate()
        .map(|(i, child)| (child.clone(), roster[i + 1..].to_vec()))
        .collect()
}

/// `[level][session id]`.
pub fn encode_bootstrap(level: TreeLevel, session: &SessionId) -> [u8; BOOTSTRAP_LEN] {
    let mut out = [0u8; BOOTSTRAP_LEN];
    out[0] = level.to_byte();
    out[1..].copy_from_slice(session.as_bytes());
    out
}

/// Inverse of [`encode_bootstrap`]. `None` for a wrong length or unknown level.
pub fn decode_bootstrap(bytes: &[u8]) -> Option<(TreeLevel, SessionId)> {
    if bytes.len() != BOOTSTRAP_LEN {
        return None;
    }
    let level = TreeLevel::from_byte(bytes[0])?;
    let mut id = [0u8; SESSION_ID_LEN];
    id.copy_from_slice(&bytes[1..]);
    Some((level, SessionId::from_bytes(id)))
}
