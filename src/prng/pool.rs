//! Process-wide entropy accumulator.
//!
//! Every seeding mixes its resulting permutation table in here, so seeds
//! drawn in entropy mode later on are decorrelated from one another. The pool
//! is only ever mixed into, never cleared.

use std::sync::Mutex;
use std::sync::MutexGuard;

use super::arc4::KeyBuffer;
use super::mix_units;

static POOL: EntropyPool = EntropyPool::new();

/// Returns the process-wide pool.
pub fn global() -> &'static EntropyPool {
    &POOL
}

#[derive(Debug)]
pub struct EntropyPool {
    key: Mutex<KeyBuffer>,
}

impl EntropyPool {
    pub const fn new() -> Self {
        Self {
            key: Mutex::new(KeyBuffer::new()),
        }
    }

    /// Mixes `bytes` into the pool with the same smear step used for seeds.
    pub fn mix(&self, bytes: &[u8]) {
        let mut key = self.lock();
        mix_units(bytes.iter().map(|&b| u16::from(b)), &mut key);
    }

    /// Copy of the current pool contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().as_slice().to_vec()
    }

    /// Number of pool slots written so far; saturates at 256.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A writer that panicked mid-mix leaves a pool that is still a valid
    // byte table, so poisoning is not an error here.
    fn lock(&self) -> MutexGuard<'_, KeyBuffer> {
        self.key
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for EntropyPool {
    fn default() -> Self {
        Self::new()
    }
}
