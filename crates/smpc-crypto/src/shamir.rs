//! Shamir secret sharing over the secp256k1 scalar field.
//!
//! A secret `s` is the constant term of a random polynomial `f` of degree
//! `k - 1`; party `x` holds `f(x)`. Any `k` evaluations determine `f(0)`
//! through Lagrange interpolation at zero. Point shares `f(x)·G` interpolate
//! the same way to `s·G`.

use crate::group::{random_scalar, Point, Scalar};
use crate::{CryptoError, Result};

/// A polynomial with coefficients in the scalar field, lowest degree first.
#[derive(Clone)]
pub struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    /// A polynomial with `size` uniformly random coefficients.
    pub fn random(size: usize) -> Self {
        Self {
            coefficients: (0..size).map(|_| random_scalar()).collect(),
        }
    }

    /// A random polynomial of `size` coefficients whose constant term is fixed.
    pub fn with_constant(constant: Scalar, size: usize) -> Self {
        let mut coefficients = Vec::with_capacity(size.max(1));
        coefficients.push(constant);
        coefficients.extend((1..size).map(|_| random_scalar()));
        Self { coefficients }
    }

    /// A polynomial from explicit coefficients.
    pub fn from_coefficients(coefficients: Vec<Scalar>) -> Self {
        Self { coefficients }
    }

    /// The constant term, i.e. the shared secret.
    pub fn constant(&self) -> Scalar {
        self.coefficients.first().copied().unwrap_or(Scalar::ZERO)
    }

    /// Number of coefficients (degree + 1).
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    /// Whether the polynomial has no coefficients.
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Evaluate at `x` with Horner's rule.
    pub fn evaluate(&self, x: &Scalar) -> Scalar {
        self.coefficients
            .iter()
            .rev()
            .fold(Scalar::ZERO, |acc, coefficient| acc * x + coefficient)
    }

    /// Evaluate at a share index.
    pub fn evaluate_at(&self, index: u32) -> Scalar {
        self.evaluate(&Scalar::from(u64::from(index)))
    }
}

/// One party's share of a secret scalar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretShare {
    /// Number of shares needed to reconstruct.
    pub threshold: u32,
    /// Number of shares dealt.
    pub total: u32,
    /// Evaluation point, `1..=total`.
    pub index: u32,
    /// `f(index)`.
    pub value: Scalar,
}

/// One party's share of a secret scalar lifted to the curve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointShare {
    pub threshold: u32,
    pub total: u32,
    pub index: u32,
    pub value: Point,
}

impl SecretShare {
    /// Lift the share value to the curve by multiplying the generator.
    pub fn to_point_share(&self) -> PointShare {
        PointShare {
            threshold: self.threshold,
            total: self.total,
            index: self.index,
            value: Point::GENERATOR * self.value,
        }
    }
}

impl std::fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Polynomial")
            .field("len", &self.coefficients.len())
            .finish_non_exhaustive()
    }
}

/// Lagrange coefficient at zero for `index` over the evaluation set `indices`.
///
/// `λ_i = Π_{j ≠ i} x_j / (x_j - x_i)`. `indices` must contain `index`, hold
/// no duplicates and no zero.
pub fn lagrange_coefficient(index: u32, indices: &[u32]) -> Result<Scalar> {
    check_indices(indices)?;
    if !indices.contains(&index) {
        return Err(CryptoError::MalformedShares(format!(
            "index {index} is not part of the evaluation set"
        )));
    }

    let x_i = Scalar::from(u64::from(index));
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    for &j in indices.iter().filter(|&&j| j != index) {
        let x_j = Scalar::from(u64::from(j));
        numerator *= x_j;
        denominator *= x_j - x_i;
    }
    let inverse = Option::<Scalar>::from(denominator.invert()).ok_or(CryptoError::NotInvertible)?;
    Ok(numerator * inverse)
}

fn check_indices(indices: &[u32]) -> Result<()> {
    if indices.is_empty() {
        return Err(CryptoError::MalformedShares("no shares".to_string()));
    }
    if indices.contains(&0) {
        return Err(CryptoError::MalformedShares(
            "share index 0 would expose the secret".to_string(),
        ));
    }
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(CryptoError::MalformedShares("duplicate share index".to_string()));
    }
    Ok(())
}

/// Interpolate `f(0)` from `(index, f(index))` pairs.
pub fn recover_secret(shares: &[(u32, Scalar)]) -> Result<Scalar> {
    let indices: Vec<u32> = shares.iter().map(|(index, _)| *index).collect();
    check_indices(&indices)?;
    shares.iter().try_fold(Scalar::ZERO, |acc, (index, value)| {
        Ok(acc + lagrange_coefficient(*index, &indices)? * value)
    })
}

/// Interpolate `f(0)·G` from `(index, f(index)·G)` pairs.
pub fn recover_point(shares: &[(u32, Point)]) -> Result<Point> {
    let indices: Vec<u32> = shares.iter().map(|(index, _)| *index).collect();
    check_indices(&indices)?;
    shares.iter().try_fold(Point::IDENTITY, |acc, (index, value)| {
        Ok(acc + *value * lagrange_coefficient(*index, &indices)?)
    })
}

/// Split `secret` into `total` shares, any `threshold` of which recover it.
pub fn deal(secret: Scalar, threshold: u32, total: u32) -> Result<Vec<SecretShare>> {
    if threshold == 0 || threshold > total {
        return Err(CryptoError::MalformedShares(format!(
            "cannot deal {threshold}-of-{total}"
        )));
    }
    let polynomial = Polynomial::with_constant(secret, threshold as usize);
    Ok((1..=total)
        .map(|index| SecretShare {
            threshold,
            total,
            index,
            value: polynomial.evaluate_at(index),
        })
        .collect())
}
