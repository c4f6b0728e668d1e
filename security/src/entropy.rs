// SPDX-License-Identifier: MPL-2.0

//! The entropy pool behind every random draw in the security kernel.
//!
//! Events XOR into the pool, never replace it, so a low-quality source
//! cannot wash out what better sources contributed. The pool counts as
//! seeded only once initial mixing has covered it end to end; until then
//! draws fall back to clock-and-cycle mixing, and after [`EntropyPool::init`]
//! that fallback is unreachable.

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use orion_hal::Platform;
use spin::Mutex;

use crate::config::{ENTROPY_POOL_SIZE, RESEED_INTERVAL_NS};

pub struct EntropyPool {
    pool: Mutex<[u8; ENTROPY_POOL_SIZE]>,
    write_cursor: AtomicUsize,
    read_cursor: AtomicUsize,
    /// Estimated entropy content in bits, saturating at the pool size.
    estimate_bits: AtomicU64,
    last_reseed: AtomicU64,
    initialized: AtomicBool,
}

impl EntropyPool {
    pub const fn new() -> Self {
        Self {
            pool: Mutex::new([0; ENTROPY_POOL_SIZE]),
            write_cursor: AtomicUsize::new(0),
            read_cursor: AtomicUsize::new(0),
            estimate_bits: AtomicU64::new(0),
            last_reseed: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Seeds the pool past one full wrap. Idempotent.
    pub fn init(&self, plat: &dyn Platform) {
        if self.initialized.load(Ordering::Acquire) {
            return;
        }
        let rounds = ENTROPY_POOL_SIZE / 8 + 1;
        for i in 0..rounds {
            let word = plat
                .hw_entropy()
                .unwrap_or_else(|| plat.now_monotonic() ^ plat.cycle_counter().rotate_left(32));
            self.add_event(gmix::mix64_pair(word, i as u64));
        }
        self.last_reseed
            .store(plat.now_monotonic(), Ordering::Release);
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Estimated entropy content in bits.
    pub fn estimate_bits(&self) -> u64 {
        self.estimate_bits.load(Ordering::Relaxed)
    }

    /// XORs an event word into the pool at the write cursor.
    pub fn add_event(&self, word: u64) {
        let mut pool = self.pool.lock();
        let cursor = self.write_cursor.load(Ordering::Relaxed);
        for (i, byte) in word.to_le_bytes().iter().enumerate() {
            pool[(cursor + i) % ENTROPY_POOL_SIZE] ^= byte;
        }
        self.write_cursor
            .store((cursor + 8) % ENTROPY_POOL_SIZE, Ordering::Relaxed);
        let cap = (ENTROPY_POOL_SIZE as u64) * 8;
        let _ = self
            .estimate_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((bits + 64).min(cap))
            });
    }

    /// Draws 64 bits and stirs a timestamp back in, so consecutive draws
    /// never observe identical pool state.
    pub fn get_u64(&self, plat: &dyn Platform) -> u64 {
        if !self.is_initialized() {
            // Boot-window fallback only; `init` retires it.
            return gmix::mix64(plat.now_monotonic() ^ plat.cycle_counter().rotate_left(17));
        }
        self.maybe_reseed(plat);
        let now = plat.now_monotonic();
        let value = {
            let mut pool = self.pool.lock();
            let cursor = self.read_cursor.load(Ordering::Relaxed);
            let mut bytes = [0u8; 8];
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = pool[(cursor + i) % ENTROPY_POOL_SIZE];
            }
            self.read_cursor
                .store((cursor + 8) % ENTROPY_POOL_SIZE, Ordering::Relaxed);
            let wcursor = self.write_cursor.load(Ordering::Relaxed);
            for (i, byte) in now.to_le_bytes().iter().enumerate() {
                pool[(wcursor + i) % ENTROPY_POOL_SIZE] ^= byte;
            }
            self.write_cursor
                .store((wcursor + 8) % ENTROPY_POOL_SIZE, Ordering::Relaxed);
            u64::from_le_bytes(bytes)
        };
        gmix::mix64_pair(value, now)
    }

    fn maybe_reseed(&self, plat: &dyn Platform) {
        let now = plat.now_monotonic();
        let last = self.last_reseed.load(Ordering::Acquire);
        if now.saturating_sub(last) < RESEED_INTERVAL_NS {
            return;
        }
        if self
            .last_reseed
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            // Another thread took this reseed window.
            return;
        }
        for _ in 0..8 {
            if let Some(word) = plat.hw_entropy() {
                self.add_event(word);
            }
        }
    }
}

impl Default for EntropyPool {
    fn default() -> Self {
        Self::new()
    }
}
