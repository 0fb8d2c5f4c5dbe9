//! Noise XK handshake over X25519, ChaCha20-Poly1305 and BLAKE3.
//!
//! ```text
//! <- s
//! ...
//! -> e, es          48 bytes
//! <- e, ee          48 bytes
//! -> s, se          64 bytes
//! ```
//!
//! The initiator must already know the responder's static key (it comes from
//! the roster); the responder learns and authenticates the initiator's static
//! key from the third message. Payloads are always empty, so every message has
//! a fixed size.

use zeroize::Zeroize;

use smpc_crypto::blake3::{self, contexts::NOISE_PROTOCOL_NAME, HASH_LEN};
use smpc_crypto::chacha20::{self, TAG_SIZE};
use smpc_crypto::x25519::{X25519PublicKey, X25519StaticSecret, KEY_LEN};
use smpc_crypto::CryptoError;

use crate::{Result, TransportError};

/// Size of `-> e, es`.
pub const MSG1_LEN: usize = KEY_LEN + TAG_SIZE;
/// Size of `<- e, ee`.
pub const MSG2_LEN: usize = KEY_LEN + TAG_SIZE;
/// Size of `-> s, se`.
pub const MSG3_LEN: usize = KEY_LEN + TAG_SIZE + TAG_SIZE;

/// One direction of an established channel.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct CipherState {
    key: [u8; chacha20::KEY_SIZE],
    counter: u64,
}

impl CipherState {
    fn new(key: [u8; chacha20::KEY_SIZE]) -> Self {
        Self { key, counter: 0 }
    }

    /// Seal the next message in this direction.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let counter = self.next_counter()?;
        Ok(chacha20::seal(&self.key, counter, &[], plaintext)?)
    }

    /// Open the next message in this direction.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let counter = self.next_counter()?;
        Ok(chacha20::open(&self.key, counter, &[], ciphertext)?)
    }

    fn next_counter(&mut self) -> Result<u64> {
        // u64::MAX is reserved by Noise.
        if self.counter == u64::MAX {
            return Err(CryptoError::NonceExhausted.into());
        }
        let counter = self.counter;
        self.counter += 1;
        Ok(counter)
    }
}

/// The pair of cipher states produced by `Split()`.
pub struct TransportKeys {
    pub send: CipherState,
    pub recv: CipherState,
}

#[derive(Zeroize)]
#[zeroize(drop)]
struct SymmetricState {
    ck: [u8; HASH_LEN],
    h: [u8; HASH_LEN],
    k: Option<[u8; chacha20::KEY_SIZE]>,
    n: u64,
}

impl SymmetricState {
    fn initialize(responder_static: &X25519PublicKey) -> Self {
        let name = NOISE_PROTOCOL_NAME.as_bytes();
        let mut h = [0u8; HASH_LEN];
        if name.len() <= HASH_LEN {
            h[..name.len()].copy_from_slice(name);
        } else {
            h = blake3::hash(name);
        }
        let mut state = Self {
            ck: h,
            h,
            k: None,
            n: 0,
        };
        // Empty prologue, then the pre-message `<- s`.
        state.mix_hash(&[]);
        state.mix_hash(responder_static.as_bytes());
        state
    }

    fn mix_hash(&mut self, data: &[u8]) {
        self.h = blake3::hash_pair(&self.h, data);
    }

    fn mix_key(&mut self, input_key_material: &[u8]) {
        let (ck, temp_k) = blake3::hkdf2(&self.ck, input_key_material);
        self.ck = ck;
        self.k = Some(temp_k);
        self.n = 0;
    }

    fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = match &self.k {
            Some(k) => {
                let sealed = chacha20::seal(k, self.n, &self.h, plaintext)?;
                self.n += 1;
                sealed
            }
            None => plaintext.to_vec(),
        };
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let plaintext = match &self.k {
            Some(k) => {
                let opened = chacha20::open(k, self.n, &self.h, ciphertext).map_err(|_| {
                    TransportError::Handshake("handshake message failed authentication".to_string())
                })?;
                self.n += 1;
                opened
            }
            None => ciphertext.to_vec(),
        };
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    fn split(&self) -> (CipherState, CipherState) {
        let (k1, k2) = blake3::hkdf2(&self.ck, &[]);
        (CipherState::new(k1), CipherState::new(k2))
    }
}

fn dh(secret: &X25519StaticSecret, public: &X25519PublicKey) -> Result<[u8; KEY_LEN]> {
    let shared = secret
        .diffie_hellman(public)
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    Ok(*shared.as_bytes())
}

fn check_len(message: &[u8], expected: usize) -> Result<()> {
    if message.len() != expected {
        return Err(TransportError::SizeMismatch {
            expected,
            actual: message.len(),
        });
    }
    Ok(())
}

fn public_from(bytes: &[u8]) -> Result<X25519PublicKey> {
    X25519PublicKey::from_slice(bytes).map_err(|e| TransportError::Handshake(e.to_string()))
}

/// Initiator side of the handshake.
pub struct Initiator {
    state: SymmetricState,
    s: X25519StaticSecret,
    e: X25519StaticSecret,
    rs: X25519PublicKey,
    re: Option<X25519PublicKey>,
}

impl Initiator {
    pub fn new(local_static: X25519StaticSecret, remote_static: X25519PublicKey) -> Self {
        Self {
            state: SymmetricState::initialize(&remote_static),
            s: local_static,
            e: X25519StaticSecret::random(),
            rs: remote_static,
            re: None,
        }
    }

    /// `-> e, es`
    pub fn write_first(&mut self) -> Result<[u8; MSG1_LEN]> {
        let e_pub = self.e.public_key();
        self.state.mix_hash(e_pub.as_bytes());
        let es = dh(&self.e, &self.rs)?;
        self.state.mix_key(&es);
        let tag = self.state.encrypt_and_hash(&[])?;

        let mut message = [0u8; MSG1_LEN];
        message[..KEY_LEN].copy_from_slice(e_pub.as_bytes());
        message[KEY_LEN..].copy_from_slice(&tag);
        Ok(message)
    }

    /// `<- e, ee`
    pub fn read_second(&mut self, message: &[u8]) -> Result<()> {
        check_len(message, MSG2_LEN)?;
        let re = public_from(&message[..KEY_LEN])?;
        self.state.mix_hash(re.as_bytes());
        let ee = dh(&self.e, &re)?;
        self.state.mix_key(&ee);
        self.state.decrypt_and_hash(&message[KEY_LEN..])?;
        self.re = Some(re);
        Ok(())
    }

    /// `-> s, se`, then split into transport keys.
    pub fn write_third(mut self) -> Result<([u8; MSG3_LEN], TransportKeys)> {
        let re = self
            .re
            .ok_or_else(|| TransportError::Handshake("second message not read".to_string()))?;
        let encrypted_static = self.state.encrypt_and_hash(self.s.public_key().as_bytes())?;
        let se = dh(&self.s, &re)?;
        self.state.mix_key(&se);
        let tag = self.state.encrypt_and_hash(&[])?;

        let mut message = [0u8; MSG3_LEN];
        message[..KEY_LEN + TAG_SIZE].copy_from_slice(&encrypted_static);
        message[KEY_LEN + TAG_SIZE..].copy_from_slice(&tag);

        let (send, recv) = self.state.split();
        Ok((message, TransportKeys { send, recv }))
    }
}

/// Responder side of the handshake.
pub struct Responder {
    state: SymmetricState,
    s: X25519StaticSecret,
    e: X25519StaticSecret,
    re: Option<X25519PublicKey>,
}

impl Responder {
    pub fn new(local_static: X25519StaticSecret) -> Self {
        let public = local_static.public_key();
        Self {
            state: SymmetricState::initialize(&public),
            s: local_static,
            e: X25519StaticSecret::random(),
            re: None,
        }
    }

    /// `-> e, es`
    pub fn read_first(&mut self, message: &[u8]) -> Result<()> {
        check_len(message, MSG1_LEN)?;
        let re = public_from(&message[..KEY_LEN])?;
        self.state.mix_hash(re.as_bytes());
        let es = dh(&self.s, &re)?;
        self.state.mix_key(&es);
        self.state.decrypt_and_hash(&message[KEY_LEN..])?;
        self.re = Some(re);
        Ok(())
    }

    /// `<- e, ee`
    pub fn write_second(&mut self) -> Result<[u8; MSG2_LEN]> {
        let re = self
            .re
            .ok_or_else(|| TransportError::Handshake("first message not read".to_string()))?;
        let e_pub = self.e.public_key();
        self.state.mix_hash(e_pub.as_bytes());
        let ee = dh(&self.e, &re)?;
        self.state.mix_key(&ee);
        let tag = self.state.encrypt_and_hash(&[])?;

        let mut message = [0u8; MSG2_LEN];
        message[..KEY_LEN].copy_from_slice(e_pub.as_bytes());
        message[KEY_LEN..].copy_from_slice(&tag);
        Ok(message)
    }

    /// `-> s, se`. Returns the initiator's authenticated static key.
    pub fn read_third(mut self, message: &[u8]) -> Result<(X25519PublicKey, TransportKeys)> {
        check_len(message, MSG3_LEN)?;
        let rs_bytes = self.state.decrypt_and_hash(&message[..KEY_LEN + TAG_SIZE])?;
        let rs = public_from(&rs_bytes)?;
        let se = dh(&self.e, &rs)?;
        self.state.mix_key(&se);
        self.state.decrypt_and_hash(&message[KEY_LEN + TAG_SIZE..])?;

        let (recv, send) = self.state.split();
        Ok((rs, TransportKeys { send, recv }))
    }
}
