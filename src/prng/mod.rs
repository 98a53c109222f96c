//! Deterministic password-character generator.
//!
//! A secret string seeds an ARC4 stream ([`arc4`]) which is turned into
//! doubles in `[0, 1)` and mapped onto an alphabet ([`generator`]). The
//! mapping is the `seedrandom` algorithm and must stay bit-exact: any change
//! alters every password derived from an existing secret.

pub mod arc4;
pub mod generator;
pub mod pool;

pub use generator::derive_password;
pub use generator::validate_policy;
pub use generator::GeneratorError;
pub use generator::PasswordRng;

use arc4::KeyBuffer;

/// Mixes the UTF-16 code units of `seed` into `key`.
pub fn mix_key(seed: &str, key: &mut KeyBuffer) {
    mix_units(seed.encode_utf16(), key);
}

pub(crate) fn mix_units(units: impl Iterator<Item = u16>, key: &mut KeyBuffer) {
    let mut smear: u32 = 0;
    for (j, unit) in units.enumerate() {
        let index = (j & 0xff) as u8;
        smear ^= u32::from(key.get(index)) * 19;
        key.set(index, ((smear + u32::from(unit)) & 0xff) as u8);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn key_length_is_capped_at_width() {
        let mut key = KeyBuffer::new();
        mix_key(&"k".repeat(1000), &mut key);
        assert_eq!(arc4::WIDTH, key.len());
    }

    #[test]
    fn first_byte_is_char_code_without_smear() {
        let mut key = KeyBuffer::new();
        mix_key("A", &mut key);
        assert_eq!(&[b'A'], key.as_slice());
    }

    #[test]
    fn smear_carries_over_between_positions() {
        let mut key = KeyBuffer::new();
        mix_key("AA", &mut key);
        // slot 1 was empty, so smear stays 0 and both slots hold 'A'
        assert_eq!(&[b'A', b'A'], key.as_slice());

        // second pass reads the populated slots: smear = 65*19 = 1235, then 1235 ^ 1235 = 0
        mix_key("AA", &mut key);
        assert_eq!(&[20, 65], key.as_slice());
    }
}
