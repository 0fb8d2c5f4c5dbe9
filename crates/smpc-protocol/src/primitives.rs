//! Secret-sharing sub-protocols.
//!
//! Every party calls the same primitives in the same order. Private
//! evaluations travel sealed; values that are public by construction (masked
//! shares being opened, point shares) travel clear. Each round first sends to
//! every peer and then reads from every peer in ascending index order, so
//! replies may arrive in any relative order across channels.
//!
//! With `m` parties and threshold `k`:
//!
//! | Primitive                  | Output                                   |
//! |----------------------------|------------------------------------------|
//! | `biased_random_share`      | share of a random value (degree `k - 1`) |
//! | `unbiased_random_share`    | share of a random value, re-dealt         |
//! | `random_zero_share`        | share of zero                            |
//! | `share_revealing_open`     | the plaintext behind a share             |
//! | `share_hiding_open`        | the plaintext, masked by a zero share    |
//! | `multiply_and_open`        | the plaintext product (needs `m ≥ 2k-1`)  |
//! | `invert`                   | share of the inverse                     |
//! | `random_keypair`           | share of `k` and the public point `k·G`  |

use tokio::io::{AsyncRead, AsyncWrite};

use smpc_crypto::group::{
    self, point_from_bytes, point_to_bytes, scalar_from_bytes, scalar_to_bytes, Point, Scalar,
    POINT_LEN, SCALAR_LEN,
};
use smpc_crypto::shamir::{recover_point, recover_secret, Polynomial};

use crate::{Mesh, Result};

/// One party's view of a session: its mesh and the sharing threshold.
pub struct Party<'a, S> {
    threshold: usize,
    mesh: &'a mut Mesh<S>,
}

impl<'a, S> Party<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(mesh: &'a mut Mesh<S>, threshold: u32) -> Self {
        Self {
            threshold: threshold as usize,
            mesh,
        }
    }

    fn my_index(&self) -> u32 {
        self.mesh.me().index()
    }

    /// Send each peer the polynomial evaluated at its index; collect the
    /// peers' evaluations at mine. Own evaluation comes first.
    async fn exchange_evaluations(
        &mut self,
        polynomial: &Polynomial,
    ) -> Result<Vec<(u32, Scalar)>> {
        for (peer, channel) in self.mesh.channels_mut() {
            let value = polynomial.evaluate_at(peer.index());
            channel.send_sealed(&scalar_to_bytes(&value)).await?;
        }

        let mut evaluations = Vec::with_capacity(self.mesh.len() + 1);
        evaluations.push((self.my_index(), polynomial.evaluate_at(self.my_index())));
        for (peer, channel) in self.mesh.channels_mut() {
            let bytes = channel.recv_sealed_exact(SCALAR_LEN).await?;
            evaluations.push((peer.index(), scalar_from_bytes(&bytes)?));
        }
        Ok(evaluations)
    }

    /// Re-deal a polynomial whose coefficients are shares, and interpolate
    /// the evaluations received for this party.
    async fn reshare(&mut self, coefficients: Vec<Scalar>) -> Result<Scalar> {
        let polynomial = Polynomial::from_coefficients(coefficients);
        let evaluations = self.exchange_evaluations(&polynomial).await?;
        Ok(recover_secret(&evaluations)?)
    }

    /// Every party deals a fresh random polynomial; a party's output share is
    /// the sum of all evaluations at its index.
    pub async fn biased_random_share(&mut self) -> Result<Scalar> {
        let polynomial = Polynomial::random(self.threshold);
        let evaluations = self.exchange_evaluations(&polynomial).await?;
        Ok(evaluations
            .iter()
            .fold(Scalar::ZERO, |acc, (_, value)| acc + value))
    }

    /// `k` biased shares become the coefficients of a re-dealt polynomial.
    pub async fn unbiased_random_share(&mut self) -> Result<Scalar> {
        let mut coefficients = Vec::with_capacity(self.threshold);
        for _ in 0..self.threshold {
            coefficients.push(self.biased_random_share().await?);
        }
        self.reshare(coefficients).await
    }

    /// As [`Self::unbiased_random_share`] with the constant term fixed to zero.
    pub async fn random_zero_share(&mut self) -> Result<Scalar> {
        let mut coefficients = Vec::with_capacity(self.threshold);
        coefficients.push(Scalar::ZERO);
        for _ in 1..self.threshold {
            coefficients.push(self.biased_random_share().await?);
        }
        self.reshare(coefficients).await
    }

    /// Broadcast the share in the clear and interpolate over all parties.
    pub async fn share_revealing_open(&mut self, share: Scalar) -> Result<Scalar> {
        let encoded = scalar_to_bytes(&share);
        for (_, channel) in self.mesh.channels_mut() {
            channel.send_clear(&encoded).await?;
        }

        let mut shares = Vec::with_capacity(self.mesh.len() + 1);
        shares.push((self.my_index(), share));
        for (peer, channel) in self.mesh.channels_mut() {
            let bytes = channel.recv_clear_exact(SCALAR_LEN).await?;
            shares.push((peer.index(), scalar_from_bytes(&bytes)?));
        }
        Ok(recover_secret(&shares)?)
    }

    /// Mask the share with a fresh zero sharing, then open it.
    pub async fn share_hiding_open(&mut self, share: Scalar) -> Result<Scalar> {
        let zero = self.random_zero_share().await?;
        self.share_revealing_open(share + zero).await
    }

    /// Open the product of two shared values.
    pub async fn multiply_and_open(&mut self, a: Scalar, b: Scalar) -> Result<Scalar> {
        self.share_hiding_open(a * b).await
    }

    /// Share of the inverse of a shared non-zero value.
    ///
    /// Opens `t = r·x` for a random shared `r`; the output share is `r / t`.
    pub async fn invert(&mut self, share: Scalar) -> Result<Scalar> {
        let r = self.biased_random_share().await?;
        let t = self.multiply_and_open(r, share).await?;
        Ok(r * group::invert(&t)?)
    }

    /// Share of a random scalar `k` together with the public point `k·G`.
    pub async fn random_keypair(&mut self) -> Result<(Scalar, Point)> {
        let k = self.unbiased_random_share().await?;
        let point_share = group::mul_base(&k);
        let encoded = point_to_bytes(&point_share)?;
        for (_, channel) in self.mesh.channels_mut() {
            channel.send_clear(&encoded).await?;
        }

        let mut shares = Vec::with_capacity(self.mesh.len() + 1);
        shares.push((self.my_index(), point_share));
        for (peer, channel) in self.mesh.channels_mut() {
            let bytes = channel.recv_clear_exact(POINT_LEN).await?;
            shares.push((peer.index(), point_from_bytes(&bytes)?));
        }
        Ok((k, recover_point(&shares)?))
    }
}
