//! BLAKE3 hashing for the channel handshake.
//!
//! ## Modes
//!
//! - [`hash`]: plain hashing, used for the handshake transcript hash `h`
//! - [`keyed_hash`]: keyed PRF, used in place of HMAC inside [`hkdf2`]
//! - [`derive_key`]: context-separated key derivation
//!
//! The HKDF follows the Noise framework definition with BLAKE3 keyed hashing
//! as the PRF:
//!
//! ```text
//! temp_key = PRF(chaining_key, input_key_material)
//! output1  = PRF(temp_key, 0x01)
//! output2  = PRF(temp_key, output1 || 0x02)
//! ```

/// Registered context strings for [`derive_key`].
pub mod contexts {
    /// Noise protocol name; hashed into the initial chaining key and transcript hash.
    pub const NOISE_PROTOCOL_NAME: &str = "Noise_XK_25519_ChaChaPoly_BLAKE3";
    /// Derivation of a node static key from a seed file.
    pub const NODE_STATIC_KEY: &str = "smpc-node v1 static-key";
}

/// Output length of every function in this module.
pub const HASH_LEN: usize = 32;

/// Compute the BLAKE3 hash of the input data.
pub fn hash(data: &[u8]) -> [u8; HASH_LEN] {
    *::blake3::hash(data).as_bytes()
}

/// Hash the concatenation of two byte strings without allocating.
pub fn hash_pair(first: &[u8], second: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = ::blake3::Hasher::new();
    hasher.update(first);
    hasher.update(second);
    *hasher.finalize().as_bytes()
}

/// Compute a keyed BLAKE3 hash (MAC/PRF).
pub fn keyed_hash(key: &[u8; HASH_LEN], message: &[u8]) -> [u8; HASH_LEN] {
    *::blake3::keyed_hash(key, message).as_bytes()
}

/// Derive a key using BLAKE3's key derivation mode.
pub fn derive_key(context: &str, key_material: &[u8]) -> [u8; HASH_LEN] {
    ::blake3::derive_key(context, key_material)
}

/// Two-output HKDF keyed by a chaining key.
pub fn hkdf2(chaining_key: &[u8; HASH_LEN], ikm: &[u8]) -> ([u8; HASH_LEN], [u8; HASH_LEN]) {
    let temp_key = keyed_hash(chaining_key, ikm);
    let output1 = keyed_hash(&temp_key, &[0x01]);
    let mut second_input = [0u8; HASH_LEN + 1];
    second_input[..HASH_LEN].copy_from_slice(&output1);
    second_input[HASH_LEN] = 0x02;
    let output2 = keyed_hash(&temp_key, &second_input);
    (output1, output2)
}
