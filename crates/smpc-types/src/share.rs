//! Persisted share record: `{"k": .., "n": .., "x": .., "y": ..}`.
//!
//! `y` is a 256-bit integer. Share files written by the splitting tool store
//! it as a bare JSON number, which only survives parsing because serde_json
//! is built with `arbitrary_precision`; a decimal or `0x`-hex string is
//! accepted as well. The value stays textual here and is parsed into a
//! scalar by the protocol crate.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{PeerIdentity, Result, TypesError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    /// Threshold.
    pub k: u32,
    /// Number of shares dealt.
    pub n: u32,
    /// Share index.
    pub x: u32,
    /// Share value as decimal or `0x`-hex text.
    #[serde(deserialize_with = "deserialize_big_integer")]
    pub y: String,
}

impl ShareRecord {
    /// Parse and validate a share document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let record: Self = serde_json::from_slice(bytes)?;
        record.validate()?;
        Ok(record)
    }

    /// Read a share file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| TypesError::InvalidShare(format!("{}: {e}", path.display())))?;
        Self::from_json(&bytes)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// The share index as a peer identity.
    pub fn identity(&self) -> Result<PeerIdentity> {
        PeerIdentity::new(self.x)
    }

    fn validate(&self) -> Result<()> {
        if self.k == 0 || self.k > self.n {
            return Err(TypesError::InvalidShare(format!(
                "threshold {} out of range for {} shares",
                self.k, self.n
            )));
        }
        if self.x == 0 || self.x > self.n {
            return Err(TypesError::InvalidShare(format!(
                "index {} out of range 1..={}",
                self.x, self.n
            )));
        }
        if self.y.is_empty() {
            return Err(TypesError::InvalidShare("empty share value".to_string()));
        }
        Ok(())
    }
}

fn deserialize_big_integer<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(number) => Ok(number.to_string()),
        serde_json::Value::String(text) => Ok(text),
        other => Err(serde::de::Error::custom(format!(
            "expected an integer share value, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_number_survives_parsing() {
        let json = br#"{"k": 5, "n": 16, "x": 3, "y": 98137561823759817263598172635981726359871623598716235987162359871}"#;
        let record = ShareRecord::from_json(json).expect("parse");
        assert_eq!(
            record.y,
            "98137561823759817263598172635981726359871623598716235987162359871"
        );
        assert_eq!(record.identity().expect("id").index(), 3);
    }

    #[test]
    fn test_string_value_accepted() {
        let json = br#"{"k": 2, "n": 3, "x": 1, "y": "0xdeadbeef"}"#;
        assert_eq!(ShareRecord::from_json(json).expect("parse").y, "0xdeadbeef");
    }

    #[test]
    fn test_inconsistent_records_rejected() {
        assert!(ShareRecord::from_json(br#"{"k": 4, "n": 3, "x": 1, "y": 1}"#).is_err());
        assert!(ShareRecord::from_json(br#"{"k": 2, "n": 3, "x": 0, "y": 1}"#).is_err());
        assert!(ShareRecord::from_json(br#"{"k": 2, "n": 3, "x": 4, "y": 1}"#).is_err());
        assert!(ShareRecord::from_json(br#"{"k": 2, "n": 3, "x": 1, "y": [1]}"#).is_err());
    }

    #[test]
    fn test_written_record_reloads() {
        let record = ShareRecord {
            k: 2,
            n: 3,
            x: 2,
            y: "12345".to_string(),
        };
        let parsed = ShareRecord::from_json(&record.to_json().expect("json")).expect("parse");
        assert_eq!(parsed, record);
    }
}
