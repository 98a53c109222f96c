use k256::ProjectivePoint;
use k256::Scalar;
use num_bigint::BigUint;
use tracing::debug;
use zeroize::Zeroizing;

use super::curve;
use super::curve::BlindingScalar;
use super::curve::EncodedCoordinates;
use super::hmac_sha256;
use super::hmac_sha256_hex;
use super::SharedSecret;
use crate::error::ExchangeError;

/// Shortest master password accepted.
pub const MIN_MASTER_PASSWORD_CHARS: usize = 6;

/// Who is asking for which password.
///
/// `offset` rotates the derived password for the same user and domain;
/// `0` is the historical default.
#[derive(Clone)]
pub struct ExchangeRequest {
    master: Zeroizing<String>,
    user: String,
    domain: String,
    offset: u32,
}

impl ExchangeRequest {
    pub fn new(
        master: impl Into<String>,
        user: impl Into<String>,
        domain: impl Into<String>,
    ) -> Result<Self, ExchangeError> {
        let master = Zeroizing::new(master.into());
        let user = user.into();
        let domain = domain.into();

        if master.chars().count() < MIN_MASTER_PASSWORD_CHARS {
            return Err(ExchangeError::invalid_input(format!(
                "master password must be at least {MIN_MASTER_PASSWORD_CHARS} characters"
            )));
        }
        if user.is_empty() {
            return Err(ExchangeError::invalid_input("user must not be empty"));
        }
        if domain.is_empty() {
            return Err(ExchangeError::invalid_input("domain must not be empty"));
        }

        Ok(Self {
            master,
            user,
            domain,
            offset: 0,
        })
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub(crate) fn master(&self) -> &str {
        &self.master
    }
}

impl std::fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRequest")
            .field("user", &self.user)
            .field("domain", &self.domain)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// What the client sends after the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindedRequest {
    pub alpha: EncodedCoordinates,
    /// Keyed hash of user and domain; lets the server associate the request
    /// with an account without learning either.
    pub identity_hash: String,
}

/// Client-side secret state between the two halves of the exchange.
#[derive(Debug)]
pub struct BlindingState {
    rho: BlindingScalar,
    domain: String,
}

/// Blinds the request with a fresh scalar.
///
/// `alpha = (G × H) × ρ` where `H = HMAC-SHA256(hmac_key, user ‖ domain ‖
/// offset ‖ master)` read as an integer mod N.
pub fn begin_exchange(
    request: &ExchangeRequest,
    hmac_key: &str,
) -> Result<(BlindedRequest, BlindingState), ExchangeError> {
    begin_exchange_with_scalar(request, hmac_key, BlindingScalar::random())
}

pub(crate) fn begin_exchange_with_scalar(
    request: &ExchangeRequest,
    hmac_key: &str,
    rho: BlindingScalar,
) -> Result<(BlindedRequest, BlindingState), ExchangeError> {
    let message = Zeroizing::new(format!(
        "{}{}{}{}",
        request.user,
        request.domain,
        request.offset,
        request.master()
    ));
    let digest = Zeroizing::new(hmac_sha256(hmac_key.as_bytes(), message.as_bytes())?);
    let hash_scalar = curve::reduce_to_scalar(&BigUint::from_bytes_be(digest.as_slice()));

    let hash_point = ProjectivePoint::GENERATOR * hash_scalar;
    let alpha_point = curve::blind(&hash_point, &rho.scalar());
    let alpha = EncodedCoordinates::from_point(&alpha_point).ok_or(ExchangeError::Crypto)?;

    let identity_key = request.offset.to_string();
    let identity_message = format!("{}{}", request.user, request.domain);
    let identity_hash = hmac_sha256_hex(identity_key.as_bytes(), identity_message.as_bytes())?;

    debug!(domain = %request.domain, offset = request.offset, "blinded request prepared");

    Ok((
        BlindedRequest {
            alpha,
            identity_hash,
        },
        BlindingState {
            rho,
            domain: request.domain.clone(),
        },
    ))
}

/// Unblinds the server's answer and derives the shared secret.
///
/// Returns `HMAC-SHA256(domain, x ‖ y ‖ master)` hex-encoded, where `(x, y)`
/// is `β × ρ⁻¹` in wire form. Consumes `state`: the scalar is wiped whether
/// or not `beta` is valid.
pub fn complete_exchange(
    beta: &EncodedCoordinates,
    state: BlindingState,
    master: &str,
) -> Result<SharedSecret, ExchangeError> {
    let beta_point = ProjectivePoint::from(beta.to_point()?);

    let rwd_point =
        curve::unblind(&beta_point, &state.rho.scalar()).ok_or(ExchangeError::Crypto)?;
    let rwd = EncodedCoordinates::from_point(&rwd_point).ok_or(ExchangeError::Crypto)?;

    let material = Zeroizing::new(format!("{}{}{}", rwd.x, rwd.y, master));
    let secret = hmac_sha256_hex(state.domain.as_bytes(), material.as_bytes())?;

    Ok(SharedSecret::new(secret))
}

/// Server-side key of the pseudorandom function.
pub struct OprfKey {
    scalar: Scalar,
}

impl OprfKey {
    /// Parses a big-endian hex scalar; zero and values `>= N` are rejected.
    pub fn from_hex(digits: &str) -> Result<Self, ExchangeError> {
        let bytes = curve::parse_coordinate(digits)
            .ok_or_else(|| ExchangeError::invalid_input("OPRF key must be 1 to 64 hex digits"))?;
        let value = BigUint::from_bytes_be(&bytes);
        if value >= curve::curve_order() {
            return Err(ExchangeError::invalid_input("OPRF key must be below the group order"));
        }
        let scalar = curve::reduce_to_scalar(&value);
        if scalar == Scalar::ZERO {
            return Err(ExchangeError::invalid_input("OPRF key must be nonzero"));
        }
        Ok(Self { scalar })
    }

    pub fn random() -> Self {
        let rho = BlindingScalar::random();
        Self {
            scalar: rho.scalar(),
        }
    }
}

impl std::fmt::Debug for OprfKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OprfKey([REDACTED])")
    }
}

/// The server's half: `β = α × k`, after checking `α` is on the curve.
pub fn evaluate(
    alpha: &EncodedCoordinates,
    key: &OprfKey,
) -> Result<EncodedCoordinates, ExchangeError> {
    let alpha_point = ProjectivePoint::from(alpha.to_point()?);
    EncodedCoordinates::from_point(&(alpha_point * key.scalar)).ok_or(ExchangeError::Crypto)
}
