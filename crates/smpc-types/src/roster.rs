//! Roster entries and the JSON documents that carry them.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{PeerIdentity, Result, TypesError, PUBLIC_KEY_LEN};

/// Host used when a roster entry leaves `addr` empty.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Public contact information of a node, as written to its info file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Listen address. `null` means loopback.
    #[serde(default)]
    pub addr: Option<String>,
    pub port: u16,
    /// Base64 X25519 static public key.
    pub public_key: String,
}

impl NodeInfo {
    pub fn new(addr: impl Into<String>, port: u16, public_key: &[u8; PUBLIC_KEY_LEN]) -> Self {
        Self {
            addr: Some(addr.into()),
            port,
            public_key: BASE64.encode(public_key),
        }
    }

    /// Host to dial.
    pub fn host(&self) -> &str {
        match self.addr.as_deref() {
            Some(addr) if !addr.is_empty() => addr,
            _ => DEFAULT_HOST,
        }
    }

    /// Decode the static public key.
    pub fn public_key_bytes(&self) -> Result<[u8; PUBLIC_KEY_LEN]> {
        decode_public_key(&self.public_key)
    }
}

/// A session member as announced by the root: share index and static key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub index: PeerIdentity,
    pub public_key: String,
}

impl Participant {
    pub fn new(index: PeerIdentity, public_key: &[u8; PUBLIC_KEY_LEN]) -> Self {
        Self {
            index,
            public_key: BASE64.encode(public_key),
        }
    }

    pub fn public_key_bytes(&self) -> Result<[u8; PUBLIC_KEY_LEN]> {
        decode_public_key(&self.public_key)
    }
}

/// Body of a `SIGN` command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    /// Base64 message bytes.
    pub data: String,
    pub nodes: Vec<NodeInfo>,
}

impl SignRequest {
    pub fn new(message: &[u8], nodes: Vec<NodeInfo>) -> Self {
        Self {
            data: BASE64.encode(message),
            nodes,
        }
    }

    pub fn message(&self) -> Result<Vec<u8>> {
        Ok(BASE64.decode(&self.data)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Payload the root forwards to each of its direct children.
///
/// `nodes` is the child's suffix of the roster; `participants` names every
/// member of the session so children can authenticate the links they accept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub data: String,
    pub nodes: Vec<NodeInfo>,
    pub participants: Vec<Participant>,
}

impl SessionPayload {
    pub fn message(&self) -> Result<Vec<u8>> {
        Ok(BASE64.decode(&self.data)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

fn decode_public_key(encoded: &str) -> Result<[u8; PUBLIC_KEY_LEN]> {
    let raw = BASE64.decode(encoded)?;
    raw.as_slice()
        .try_into()
        .map_err(|_| TypesError::InvalidKeyLength {
            expected: PUBLIC_KEY_LEN,
            actual: raw.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_info_null_addr_defaults_to_loopback() {
        let info: NodeInfo = serde_json::from_str(
            r#"{"addr": null, "port": 4201, "public_key": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="}"#,
        )
        .expect("parse");
        assert_eq!(info.host(), DEFAULT_HOST);
        assert_eq!(info.public_key_bytes().expect("key"), [0u8; 32]);
    }

    #[test]
    fn test_sign_request_json_shape() {
        let node = NodeInfo::new("10.0.0.2", 4202, &[7u8; 32]);
        let request = SignRequest::new("hello".as_bytes(), vec![node.clone()]);
        let json = request.to_json().expect("json");
        let value: serde_json::Value = serde_json::from_slice(&json).expect("value");
        assert_eq!(value["data"], "aGVsbG8=");
        assert_eq!(value["nodes"][0]["port"], 4202);

        let parsed = SignRequest::from_json(&json).expect("parse");
        assert_eq!(parsed.message().expect("message"), b"hello");
        assert_eq!(parsed.nodes, vec![node]);
    }

    #[test]
    fn test_short_public_key_rejected() {
        let info = NodeInfo {
            addr: None,
            port: 1,
            public_key: BASE64.encode([1u8; 16]),
        };
        assert!(matches!(
            info.public_key_bytes(),
            Err(TypesError::InvalidKeyLength { actual: 16, .. })
        ));
    }

    #[test]
    fn test_session_payload_participants() {
        let payload = SessionPayload {
            data: BASE64.encode(b"msg"),
            nodes: Vec::new(),
            participants: vec![Participant::new(
                PeerIdentity::new(4).expect("id"),
                &[9u8; 32],
            )],
        };
        let parsed = SessionPayload::from_json(&payload.to_json().expect("json")).expect("parse");
        assert_eq!(parsed.participants[0].index.index(), 4);
        assert_eq!(parsed.participants[0].public_key_bytes().expect("key"), [9u8; 32]);
    }

    #[test]
    fn test_invalid_base64_data() {
        let request = SignRequest {
            data: "not base64!".to_string(),
            nodes: Vec::new(),
        };
        assert!(matches!(request.message(), Err(TypesError::Base64(_))));
    }
}
