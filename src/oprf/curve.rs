//! secp256k1 helpers: scalar reduction, blinding, and the textual point
//! encoding used on the wire.

use k256::elliptic_curve::sec1::FromEncodedPoint;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::AffinePoint;
use k256::EncodedPoint;
use k256::FieldBytes;
use k256::ProjectivePoint;
use k256::Scalar;
use num_bigint::BigUint;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::ExchangeError;

/// Hex digits in a full-width coordinate.
pub const COORDINATE_HEX_DIGITS: usize = 64;

/// Random bytes behind each blinding scalar: 344 bits, above the 336-bit floor.
pub const BLINDING_ENTROPY_BYTES: usize = 43;

/// Group order N of secp256k1, big-endian.
const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36,
    0x41, 0x41,
];

pub fn curve_order() -> BigUint {
    BigUint::from_bytes_be(&CURVE_ORDER)
}

/// Reduces an arbitrary-width unsigned integer modulo N.
pub fn reduce_to_scalar(value: &BigUint) -> Scalar {
    let reduced = value % curve_order();
    let digits = reduced.to_bytes_be();

    let mut repr = Zeroizing::new([0u8; 32]);
    repr[32 - digits.len()..].copy_from_slice(&digits);

    // reduced < N, so the representation is always canonical
    Scalar::from_repr(FieldBytes::clone_from_slice(repr.as_slice())).unwrap_or(Scalar::ZERO)
}

/// A point coordinate in its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCoordinates {
    pub x: String,
    pub y: String,
}

impl EncodedCoordinates {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }

    /// Wire form of a finite point; `None` for the identity.
    pub fn from_point(point: &ProjectivePoint) -> Option<Self> {
        let encoded = point.to_affine().to_encoded_point(false);
        Some(Self {
            x: format_coordinate(encoded.x()?),
            y: format_coordinate(encoded.y()?),
        })
    }

    /// Decodes and validates the pair as a point on the curve.
    ///
    /// Coordinates that are not hex, wider than 256 bits, not reduced mod p,
    /// or that do not satisfy the curve equation all yield the same
    /// [`ExchangeError::InvalidCurvePoint`].
    pub fn to_point(&self) -> Result<AffinePoint, ExchangeError> {
        parse_point(&self.x, &self.y)
    }
}

/// Decodes a pair of hex coordinates into a point on the curve.
pub fn parse_point(x_hex: &str, y_hex: &str) -> Result<AffinePoint, ExchangeError> {
    let x = parse_coordinate(x_hex).ok_or(ExchangeError::InvalidCurvePoint)?;
    let y = parse_coordinate(y_hex).ok_or(ExchangeError::InvalidCurvePoint)?;

    let encoded = EncodedPoint::from_affine_coordinates(
        &FieldBytes::clone_from_slice(&x),
        &FieldBytes::clone_from_slice(&y),
        false,
    );
    Option::from(AffinePoint::from_encoded_point(&encoded)).ok_or(ExchangeError::InvalidCurvePoint)
}

/// Lowercase hex without leading zeros.
///
/// This is the form that goes on the wire and into the final keyed hash, so
/// it must not change.
pub fn format_coordinate(bytes: &[u8]) -> String {
    BigUint::from_bytes_be(bytes).to_str_radix(16)
}

/// Accepts 1 to 64 hex digits, any case, with or without zero padding.
pub fn parse_coordinate(digits: &str) -> Option<[u8; 32]> {
    if digits.is_empty()
        || digits.len() > COORDINATE_HEX_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }

    let padded = format!("{digits:0>width$}", width = COORDINATE_HEX_DIGITS);
    let mut out = [0u8; 32];
    hex::decode_to_slice(padded, &mut out).ok()?;
    Some(out)
}

/// Random nonzero scalar used to hide a point from the server.
///
/// Stored as its canonical representation and wiped on drop. Not `Clone`:
/// one scalar serves exactly one session.
pub struct BlindingScalar {
    repr: Zeroizing<[u8; 32]>,
}

impl BlindingScalar {
    /// Draws [`BLINDING_ENTROPY_BYTES`] from the thread CSPRNG and reduces
    /// them mod N, redrawing on zero.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        loop {
            let mut bytes = Zeroizing::new([0u8; BLINDING_ENTROPY_BYTES]);
            rng.fill_bytes(bytes.as_mut_slice());

            let scalar = reduce_to_scalar(&BigUint::from_bytes_be(bytes.as_slice()));
            if scalar != Scalar::ZERO {
                return Self::from_scalar(&scalar);
            }
        }
    }

    pub(crate) fn from_scalar(scalar: &Scalar) -> Self {
        let mut repr = Zeroizing::new([0u8; 32]);
        repr.copy_from_slice(scalar.to_repr().as_slice());
        Self { repr }
    }

    pub(crate) fn scalar(&self) -> Scalar {
        Scalar::from_repr(FieldBytes::clone_from_slice(self.repr.as_slice())).unwrap_or(Scalar::ZERO)
    }

    #[cfg(test)]
    pub(crate) fn repr(&self) -> [u8; 32] {
        *self.repr
    }
}

impl std::fmt::Debug for BlindingScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlindingScalar([REDACTED])")
    }
}

/// `point × scalar`.
pub fn blind(point: &ProjectivePoint, scalar: &Scalar) -> ProjectivePoint {
    point * scalar
}

/// `point × scalar⁻¹ mod N`; `None` for the zero scalar.
pub fn unblind(point: &ProjectivePoint, scalar: &Scalar) -> Option<ProjectivePoint> {
    let inverse: Option<Scalar> = scalar.invert().into();
    inverse.map(|inverse| point * &inverse)
}
