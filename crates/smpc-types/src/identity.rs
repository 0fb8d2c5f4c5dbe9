//! Peer and session identifiers.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{Result, TypesError};

/// Length of the identity blob exchanged after the handshake.
pub const IDENTITY_BLOB_LEN: usize = 32;

/// Length of a session identifier.
pub const SESSION_ID_LEN: usize = 16;

/// A party's share index. Unique among the members of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PeerIdentity(u32);

impl PeerIdentity {
    /// Wrap a share index. Zero is never a valid index.
    pub fn new(index: u32) -> Result<Self> {
        if index == 0 {
            return Err(TypesError::InvalidIdentity("index 0 is reserved".to_string()));
        }
        Ok(Self(index))
    }

    /// The raw share index.
    pub fn index(self) -> u32 {
        self.0
    }

    /// Encode as a 32-byte big-endian integer.
    pub fn to_blob(self) -> [u8; IDENTITY_BLOB_LEN] {
        let mut blob = [0u8; IDENTITY_BLOB_LEN];
        blob[IDENTITY_BLOB_LEN - 4..].copy_from_slice(&self.0.to_be_bytes());
        blob
    }

    /// Decode a 32-byte big-endian integer.
    ///
    /// Rejects zero and values that do not fit a `u32` share index.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        if blob.len() != IDENTITY_BLOB_LEN {
            return Err(TypesError::InvalidIdentity(format!(
                "expected {IDENTITY_BLOB_LEN} bytes, got {}",
                blob.len()
            )));
        }
        let (high, low) = blob.split_at(IDENTITY_BLOB_LEN - 4);
        if high.iter().any(|&b| b != 0) {
            return Err(TypesError::InvalidIdentity(
                "value does not fit a share index".to_string(),
            ));
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(low);
        Self::new(u32::from_be_bytes(raw))
    }
}

impl TryFrom<u32> for PeerIdentity {
    type Error = TypesError;

    fn try_from(index: u32) -> Result<Self> {
        Self::new(index)
    }
}

impl From<PeerIdentity> for u32 {
    fn from(id: PeerIdentity) -> u32 {
        id.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Random tag that ties the channels of one signing session together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    pub fn random() -> Self {
        let mut bytes = [0u8; SESSION_ID_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SESSION_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first half is plenty to tell sessions apart in logs.
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_blob_roundtrip() {
        let id = PeerIdentity::new(0x0102_0304).expect("id");
        let blob = id.to_blob();
        assert_eq!(&blob[..28], &[0u8; 28]);
        assert_eq!(&blob[28..], &[1, 2, 3, 4]);
        assert_eq!(PeerIdentity::from_blob(&blob).expect("decode"), id);
    }

    #[test]
    fn test_identity_zero_rejected() {
        assert!(PeerIdentity::new(0).is_err());
        assert!(PeerIdentity::from_blob(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_identity_overflow_rejected() {
        let mut blob = [0u8; 32];
        blob[27] = 1;
        blob[31] = 1;
        assert!(PeerIdentity::from_blob(&blob).is_err());
        assert!(PeerIdentity::from_blob(&blob[..31]).is_err());
    }

    #[test]
    fn test_identity_ordering() {
        let a = PeerIdentity::new(3).expect("a");
        let b = PeerIdentity::new(12).expect("b");
        assert!(a < b);
        assert_eq!(b.to_string(), "12");
    }

    #[test]
    fn test_identity_json_rejects_zero() {
        assert!(serde_json::from_str::<PeerIdentity>("0").is_err());
        let id: PeerIdentity = serde_json::from_str("7").expect("parse");
        assert_eq!(serde_json::to_string(&id).expect("json"), "7");
    }

    #[test]
    fn test_session_ids_differ() {
        let a = SessionId::random();
        let b = SessionId::random();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 16);
    }
}
