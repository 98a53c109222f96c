use rand::RngCore;
use tracing::trace;
use zeroize::Zeroizing;

use super::arc4::Arc4;
use super::arc4::KeyBuffer;
use super::arc4::WIDTH;
use super::mix_key;
use super::mix_units;
use super::pool;

/// At least six ARC4 outputs go into each double.
const CHUNKS: usize = 6;

/// A double carries 52 significant bits.
const DIGITS: u32 = 52;

const SIGNIFICANCE: u64 = 1 << DIGITS;
const OVERFLOW: u64 = SIGNIFICANCE * 2;

const TWO_POW_32: f64 = 4_294_967_296.0;

/// Fresh OS randomness mixed in by [`PasswordRng::seed_with_entropy`].
const FRESH_ENTROPY_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(&'static str),
}

/// Seeded stream of samples. One instance serves exactly one derivation.
#[derive(Debug)]
pub struct PasswordRng {
    arc4: Arc4,
}

impl PasswordRng {
    /// Seeds a reproducible stream from `secret`.
    ///
    /// The resulting permutation table is also mixed into the process-wide
    /// entropy pool; this has no effect on the samples of this stream.
    pub fn seed(secret: &str) -> Self {
        let mut key = KeyBuffer::new();
        mix_key(secret, &mut key);
        Self::from_key(&key)
    }

    /// Seeds a non-reproducible stream from `secret`, the current entropy
    /// pool, and fresh bytes from the OS-seeded CSPRNG.
    ///
    /// Embedding API for callers that want random characters from an
    /// alphabet, such as a fresh master password. Password derivation never
    /// uses it: a derived password must be reproducible, so it always goes
    /// through [`PasswordRng::seed`].
    pub fn seed_with_entropy(secret: &str) -> Self {
        let mut fresh = Zeroizing::new([0u8; FRESH_ENTROPY_BYTES]);
        rand::rng().fill_bytes(fresh.as_mut_slice());
        let pooled = Zeroizing::new(pool::global().snapshot());

        let units = secret
            .encode_utf16()
            .chain(pooled.iter().map(|&b| u16::from(b)))
            .chain(fresh.iter().map(|&b| u16::from(b)));

        let mut key = KeyBuffer::new();
        mix_units(units, &mut key);
        Self::from_key(&key)
    }

    fn from_key(key: &KeyBuffer) -> Self {
        let arc4 = Arc4::new(key.as_slice());
        pool::global().mix(arc4.table());
        trace!(key_len = key.len(), "seeded ARC4 stream");
        Self { arc4 }
    }

    /// Returns a double in `[0, 1)` with randomness in every mantissa bit.
    pub fn next_unit_interval(&mut self) -> f64 {
        let mut n = self.arc4.g(CHUNKS);
        // denominator is 2^exponent; starts at WIDTH^CHUNKS
        let mut exponent: i32 = 8 * CHUNKS as i32;
        let mut x: u64 = 0;

        while n < SIGNIFICANCE {
            n = (n + x) * WIDTH as u64;
            exponent += 8;
            x = self.arc4.g(1);
        }
        while n >= OVERFLOW {
            n /= 2;
            exponent -= 1;
            x >>= 1;
        }

        (n + x) as f64 / 2f64.powi(exponent)
    }

    /// 32 bits of the stream as a signed integer.
    pub fn next_i32(&mut self) -> i32 {
        let bits = self.arc4.g(4) as u32;
        bits as i32
    }

    /// A double in `[0, 1)` carrying only 32 bits of randomness.
    pub fn next_quick(&mut self) -> f64 {
        let bits = self.arc4.g(4) as u32;
        f64::from(bits) / TWO_POW_32
    }
}

/// Checks an alphabet and length without drawing any samples.
pub fn validate_policy(alphabet: &str, length: usize) -> Result<(), GeneratorError> {
    if alphabet.is_empty() {
        return Err(GeneratorError::InvalidAlphabet("alphabet is empty"));
    }
    if length < 1 {
        return Err(GeneratorError::InvalidAlphabet(
            "password length must be at least 1",
        ));
    }
    Ok(())
}

/// Maps `length` samples from `rng` onto `alphabet`.
///
/// The alphabet is read as a sequence of Unicode scalar values; sample `u`
/// selects symbol `floor(u * alphabet_len)`.
pub fn derive_password(
    rng: &mut PasswordRng,
    alphabet: &str,
    length: usize,
) -> Result<String, GeneratorError> {
    validate_policy(alphabet, length)?;
    let symbols: Vec<char> = alphabet.chars().collect();

    let scale = symbols.len() as f64;
    let password = (0..length)
        .map(|_| {
            let index = (rng.next_unit_interval() * scale).floor() as usize;
            symbols[index]
        })
        .collect();

    Ok(password)
}
