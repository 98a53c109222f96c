//! Oblivious pseudorandom function over secp256k1.
//!
//! The client hashes its inputs to a point, hides it behind a random scalar
//! and sends it to the server. The server multiplies by its key without
//! learning the input, the client removes the scalar, and a keyed hash of
//! the result becomes the shared secret that seeds password generation.

pub mod curve;
pub mod exchange;

pub use curve::EncodedCoordinates;
pub use exchange::begin_exchange;
pub use exchange::complete_exchange;
pub use exchange::evaluate;
pub use exchange::BlindedRequest;
pub use exchange::BlindingState;
pub use exchange::ExchangeRequest;
pub use exchange::OprfKey;

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| ExchangeError::Crypto)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

pub(crate) fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> Result<String, ExchangeError> {
    let digest = Zeroizing::new(hmac_sha256(key, data)?);
    Ok(hex::encode(digest.as_slice()))
}

/// Output of a completed exchange, hex-encoded. Wiped on drop and never
/// printed.
pub struct SharedSecret(Zeroizing<String>);

impl SharedSecret {
    pub(crate) fn new(hex: String) -> Self {
        Self(Zeroizing::new(hex))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}
