//! secp256k1 scalar and point helpers.
//!
//! All share arithmetic happens in the scalar field of secp256k1, i.e. modulo
//! the group order. Points travel as 64-byte `x || y` strings (big-endian
//! affine coordinates, no SEC1 tag byte).

use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, EncodedPoint, FieldBytes, U256};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::{CryptoError, Result};

pub use k256::{ProjectivePoint as Point, Scalar};

/// Big-endian bytes of the secp256k1 group order.
pub const GROUP_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Length of an encoded scalar.
pub const SCALAR_LEN: usize = 32;

/// Length of an encoded point.
pub const POINT_LEN: usize = 64;

/// Draw a uniformly random scalar from the OS RNG.
pub fn random_scalar() -> Scalar {
    Scalar::random(&mut OsRng)
}

/// Encode a scalar as 32 big-endian bytes.
pub fn scalar_to_bytes(scalar: &Scalar) -> [u8; SCALAR_LEN] {
    let mut out = [0u8; SCALAR_LEN];
    out.copy_from_slice(&scalar.to_bytes());
    out
}

/// Decode 32 big-endian bytes into a scalar, rejecting values `>= GROUP_ORDER`.
pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar> {
    if bytes.len() != SCALAR_LEN {
        return Err(CryptoError::InvalidScalar(format!(
            "expected {SCALAR_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let repr = FieldBytes::clone_from_slice(bytes);
    Option::<Scalar>::from(Scalar::from_repr(repr))
        .ok_or_else(|| CryptoError::InvalidScalar("value not below the group order".to_string()))
}

/// Reduce 32 big-endian bytes modulo the group order.
pub fn scalar_reduce(bytes: &FieldBytes) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(bytes)
}

/// Parse a non-negative integer written in decimal or `0x`-prefixed hex.
///
/// The value is reduced modulo the group order.
pub fn scalar_from_str(text: &str) -> Result<Scalar> {
    let text = text.trim();
    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => (hex, 16u32),
        None => (text, 10u32),
    };
    if digits.is_empty() {
        return Err(CryptoError::InvalidScalar("empty number".to_string()));
    }

    let base = Scalar::from(u64::from(radix));
    let mut acc = Scalar::ZERO;
    for c in digits.chars() {
        let digit = c.to_digit(radix).ok_or_else(|| {
            CryptoError::InvalidScalar(format!("invalid digit {c:?} in base {radix}"))
        })?;
        acc = acc * base + Scalar::from(u64::from(digit));
    }
    Ok(acc)
}

/// Modular inverse. Zero is an arithmetic error.
pub fn invert(scalar: &Scalar) -> Result<Scalar> {
    Option::<Scalar>::from(scalar.invert()).ok_or(CryptoError::NotInvertible)
}

/// SHA-256 digest of a message read as an integer modulo the group order.
pub fn message_digest(message: &[u8]) -> Scalar {
    let digest = Sha256::digest(message);
    scalar_reduce(&digest)
}

/// The affine x coordinate of a point, reduced modulo the group order.
pub fn x_coordinate_scalar(point: &Point) -> Scalar {
    scalar_reduce(&point.to_affine().x())
}

/// Multiply the generator by a scalar.
pub fn mul_base(scalar: &Scalar) -> Point {
    Point::GENERATOR * scalar
}

/// Encode a point as `x || y`. The identity has no encoding.
pub fn point_to_bytes(point: &Point) -> Result<[u8; POINT_LEN]> {
    let encoded = point.to_affine().to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => {
            let mut out = [0u8; POINT_LEN];
            out[..32].copy_from_slice(x);
            out[32..].copy_from_slice(y);
            Ok(out)
        }
        _ => Err(CryptoError::InvalidPoint(
            "the identity element has no wire encoding".to_string(),
        )),
    }
}

/// Decode `x || y`, rejecting coordinates that are not on the curve.
pub fn point_from_bytes(bytes: &[u8]) -> Result<Point> {
    if bytes.len() != POINT_LEN {
        return Err(CryptoError::InvalidPoint(format!(
            "expected {POINT_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let x = FieldBytes::clone_from_slice(&bytes[..32]);
    let y = FieldBytes::clone_from_slice(&bytes[32..]);
    let encoded = EncodedPoint::from_affine_coordinates(&x, &y, false);
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .map(Point::from)
        .ok_or_else(|| CryptoError::InvalidPoint("coordinates are not on secp256k1".to_string()))
}
