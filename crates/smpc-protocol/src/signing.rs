//! Threshold ECDSA signing.
//!
//! ```text
//! Idle -> MeshFormed -> RandomKeypairReady -> InverseComputed -> SignatureOpened -> Done
//! ```
//!
//! 1. `z = SHA-256(message) mod n`
//! 2. `random_keypair` gives a share of the nonce `k` and `R = k·G`; `r = R.x mod n`
//! 3. `invert` gives a share of `k⁻¹`
//! 4. locally, a share of `t = r·d + z` from the key share `d`
//! 5. `multiply_and_open(t, k⁻¹)` opens `s`
//!
//! Each later step masks with randomness drawn in an earlier one, so the
//! order is enforced: a transition to anything but the next state fails.

use std::fmt;

use k256::elliptic_curve::scalar::IsHigh;
use tokio::io::{AsyncRead, AsyncWrite};

use smpc_crypto::group::{self, Scalar};
use smpc_crypto::shamir::SecretShare;
use smpc_crypto::CryptoError;

use crate::{minimum_participants, Mesh, Party, Result, SmpcError};

/// Where a signing run currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningState {
    Idle,
    MeshFormed,
    RandomKeypairReady,
    InverseComputed,
    SignatureOpened,
    Done,
}

impl SigningState {
    /// The only state reachable from this one.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::MeshFormed),
            Self::MeshFormed => Some(Self::RandomKeypairReady),
            Self::RandomKeypairReady => Some(Self::InverseComputed),
            Self::InverseComputed => Some(Self::SignatureOpened),
            Self::SignatureOpened => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl fmt::Display for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::MeshFormed => "mesh_formed",
            Self::RandomKeypairReady => "random_keypair_ready",
            Self::InverseComputed => "inverse_computed",
            Self::SignatureOpened => "signature_opened",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// An ECDSA signature with `s` in the lower half of the group order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    pub r: Scalar,
    pub s: Scalar,
}

impl Signature {
    /// Build a signature, normalising `s` to the low half.
    pub fn new(r: Scalar, s: Scalar) -> Result<Self> {
        if r == Scalar::ZERO || s == Scalar::ZERO {
            return Err(SmpcError::Arithmetic(CryptoError::InvalidScalar(
                "signature component is zero".to_string(),
            )));
        }
        let s = if bool::from(s.is_high()) { -s } else { s };
        Ok(Self { r, s })
    }

    /// The `k256` form, for verification.
    pub fn to_ecdsa(&self) -> Result<k256::ecdsa::Signature> {
        k256::ecdsa::Signature::from_scalars(self.r.to_bytes(), self.s.to_bytes())
            .map_err(|e| SmpcError::Arithmetic(CryptoError::InvalidScalar(e.to_string())))
    }

    /// ASN.1 DER `SEQUENCE { INTEGER r, INTEGER s }`.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_ecdsa()?.to_der().as_bytes().to_vec())
    }
}

/// Drives one party through a signing run.
pub struct Signer<'a, S> {
    party: Party<'a, S>,
    key_share: &'a SecretShare,
    state: SigningState,
}

impl<'a, S> Signer<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Take a formed mesh. The session must be large enough to open products.
    pub fn new(mesh: &'a mut Mesh<S>, key_share: &'a SecretShare) -> Result<Self> {
        let members = mesh.len() + 1;
        let minimum = minimum_participants(key_share.threshold);
        if members < minimum {
            return Err(SmpcError::Roster(format!(
                "{members} participants, at least {minimum} needed for threshold {}",
                key_share.threshold
            )));
        }
        if members > key_share.total as usize {
            return Err(SmpcError::Roster(format!(
                "{members} participants, only {} shares exist",
                key_share.total
            )));
        }
        if mesh.me().index() != key_share.index {
            return Err(SmpcError::Roster(format!(
                "mesh formed as {} but the key share is index {}",
                mesh.me(),
                key_share.index
            )));
        }

        let mut signer = Self {
            party: Party::new(mesh, key_share.threshold),
            key_share,
            state: SigningState::Idle,
        };
        signer.advance(SigningState::MeshFormed)?;
        Ok(signer)
    }

    pub fn state(&self) -> SigningState {
        self.state
    }

    fn advance(&mut self, to: SigningState) -> Result<()> {
        if self.state.next() != Some(to) {
            return Err(SmpcError::Sequencing(format!(
                "cannot move from {} to {to}",
                self.state
            )));
        }
        tracing::debug!(state = %to, "signing state");
        self.state = to;
        Ok(())
    }

    /// Run the whole sequence. Every party must call this with the same message.
    pub async fn sign(&mut self, message: &[u8]) -> Result<Signature> {
        let z = group::message_digest(message);

        let (nonce_share, nonce_point) = self.party.random_keypair().await?;
        let r = group::x_coordinate_scalar(&nonce_point);
        self.advance(SigningState::RandomKeypairReady)?;

        let nonce_inverse_share = self.party.invert(nonce_share).await?;
        self.advance(SigningState::InverseComputed)?;

        let t_share = r * self.key_share.value + z;
        let s = self
            .party
            .multiply_and_open(t_share, nonce_inverse_share)
            .await?;
        self.advance(SigningState::SignatureOpened)?;

        let signature = Signature::new(r, s)?;
        self.advance(SigningState::Done)?;
        Ok(signature)
    }
}
