//! ARC4 keystream over a fixed 256-entry permutation table.
//!
//! Output is bit-for-bit compatible with the byte stream used by
//! `seedrandom`, including the RC4-drop\[256\] discard that runs on
//! construction.

use zeroize::Zeroize;

/// Number of distinct outputs per step; every output is `0 <= x < WIDTH`.
pub const WIDTH: usize = 256;

/// Largest `count` accepted by [`Arc4::g`]: 7 outputs fill 56 bits of a `u64`.
pub const MAX_OUTPUTS_PER_CALL: usize = 7;

/// Key material for [`Arc4::new`], at most [`WIDTH`] bytes long.
///
/// Slots that were never written read as zero.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyBuffer {
    bytes: [u8; WIDTH],
    len: usize,
}

impl KeyBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0u8; WIDTH],
            len: 0,
        }
    }

    pub(crate) fn get(&self, index: u8) -> u8 {
        self.bytes[usize::from(index)]
    }

    /// Writes `value` at `index`, growing the logical length to cover it.
    pub(crate) fn set(&mut self, index: u8, value: u8) {
        let index = usize::from(index);
        self.bytes[index] = value;
        self.len = self.len.max(index + 1);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Default for KeyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KeyBuffer {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for KeyBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyBuffer([REDACTED; {}])", self.len)
    }
}

/// ARC4 generator state: permutation table plus the two cursors.
pub struct Arc4 {
    s: [u8; WIDTH],
    i: u8,
    j: u8,
}

impl Arc4 {
    /// Runs the standard key schedule over `key`, then discards the first
    /// [`WIDTH`] outputs. The empty key is treated as `[0]`.
    pub fn new(key: &[u8]) -> Self {
        let key: &[u8] = if key.is_empty() { &[0] } else { key };

        let mut s = [0u8; WIDTH];
        for (slot, value) in s.iter_mut().zip(0u8..=u8::MAX) {
            *slot = value;
        }

        let mut j: u8 = 0;
        for i in 0..WIDTH {
            let t = s[i];
            j = j.wrapping_add(key[i % key.len()]).wrapping_add(t);
            s[i] = s[usize::from(j)];
            s[usize::from(j)] = t;
        }

        let mut arc4 = Self { s, i: 0, j: 0 };
        arc4.discard(WIDTH);
        arc4
    }

    /// Returns the next `count` outputs concatenated as one big-endian number,
    /// i.e. a value in `0 <= x < 256^count`.
    ///
    /// # Panics
    ///
    /// Panics if `count > MAX_OUTPUTS_PER_CALL`, since the result would not
    /// fit in a `u64`.
    pub fn g(&mut self, count: usize) -> u64 {
        assert!(
            count <= MAX_OUTPUTS_PER_CALL,
            "at most {MAX_OUTPUTS_PER_CALL} outputs fit in one u64, requested {count}"
        );

        let mut r: u64 = 0;
        for _ in 0..count {
            r = (r << 8) | u64::from(self.next_byte());
        }
        r
    }

    fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        let t = self.s[usize::from(self.i)];
        self.j = self.j.wrapping_add(t);
        self.s.swap(usize::from(self.i), usize::from(self.j));
        let index = self.s[usize::from(self.i)].wrapping_add(self.s[usize::from(self.j)]);
        self.s[usize::from(index)]
    }

    fn discard(&mut self, count: usize) {
        for _ in 0..count {
            self.next_byte();
        }
    }

    /// Current permutation table.
    pub fn table(&self) -> &[u8; WIDTH] {
        &self.s
    }
}

impl Drop for Arc4 {
    fn drop(&mut self) {
        self.s.zeroize();
        self.i = 0;
        self.j = 0;
    }
}

impl std::fmt::Debug for Arc4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arc4").finish_non_exhaustive()
    }
}
