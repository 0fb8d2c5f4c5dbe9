//! X25519 key agreement (RFC 7748).
//!
//! Every node holds one long-lived static key for the lifetime of the process;
//! the handshake additionally draws a fresh ephemeral key per channel.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::{CryptoError, Result};

/// Length of X25519 keys and shared secrets.
pub const KEY_LEN: usize = 32;

/// An X25519 secret key. Used for both static and ephemeral handshake keys.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct X25519StaticSecret {
    inner: StaticSecret,
}

/// An X25519 public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct X25519PublicKey {
    bytes: [u8; KEY_LEN],
}

/// An X25519 shared secret.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SharedSecret {
    bytes: [u8; KEY_LEN],
}

impl X25519StaticSecret {
    /// Generate a new random secret.
    pub fn random() -> Self {
        Self {
            inner: StaticSecret::random_from_rng(OsRng),
        }
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: StaticSecret::from(bytes),
        }
    }

    /// Create from a byte slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(raw))
    }

    /// Get the raw bytes of this secret.
    pub fn to_bytes(&self) -> [u8; KEY_LEN] {
        self.inner.to_bytes()
    }

    /// Compute the corresponding public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey {
            bytes: PublicKey::from(&self.inner).to_bytes(),
        }
    }

    /// Perform Diffie-Hellman key agreement.
    ///
    /// Rejects the all-zero output produced by low-order public keys, so a
    /// peer cannot force a known handshake key.
    pub fn diffie_hellman(&self, their_public: &X25519PublicKey) -> Result<SharedSecret> {
        let shared = self.inner.diffie_hellman(&PublicKey::from(their_public.bytes));
        if !shared.was_contributory() {
            return Err(CryptoError::NonContributory);
        }
        Ok(SharedSecret {
            bytes: *shared.as_bytes(),
        })
    }
}

impl X25519PublicKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Create from a byte slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes: raw })
    }

    /// Get the raw bytes.
    pub fn to_bytes(&self) -> [u8; KEY_LEN] {
        self.bytes
    }

    /// Get the raw bytes as a slice.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl SharedSecret {
    /// Get the raw bytes of the shared secret.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let secret = X25519StaticSecret::random();
        assert_ne!(secret.public_key().to_bytes(), [0u8; KEY_LEN]);
    }

    #[test]
    fn test_diffie_hellman_agreement() {
        let alice = X25519StaticSecret::random();
        let bob = X25519StaticSecret::random();

        let ab = alice.diffie_hellman(&bob.public_key()).expect("dh");
        let ba = bob.diffie_hellman(&alice.public_key()).expect("dh");

        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn test_low_order_point_rejected() {
        let secret = X25519StaticSecret::random();
        let zero = X25519PublicKey::from_bytes([0u8; KEY_LEN]);
        assert!(matches!(
            secret.diffie_hellman(&zero),
            Err(CryptoError::NonContributory)
        ));
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(X25519PublicKey::from_slice(&[1u8; 31]).is_err());
        assert!(X25519StaticSecret::from_slice(&[1u8; 33]).is_err());
        let secret = X25519StaticSecret::random();
        let restored = X25519StaticSecret::from_slice(&secret.to_bytes()).expect("restore");
        assert_eq!(secret.public_key(), restored.public_key());
    }

    #[test]
    fn test_rfc7748_section6_1() {
        let alice_private =
            hex::decode("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a")
                .expect("valid hex");
        let alice_public =
            hex::decode("8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a")
                .expect("valid hex");

        let secret = X25519StaticSecret::from_slice(&alice_private).expect("secret");
        assert_eq!(secret.public_key().as_bytes().as_slice(), alice_public.as_slice());
    }
}
