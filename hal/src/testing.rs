// SPDX-License-Identifier: MPL-2.0

//! A deterministic platform for test suites.
//!
//! The clock and cycle counter advance by a fixed stride on every read,
//! so time-dependent paths (sleeps, benchmarks, reseeds) terminate and
//! reproduce. Crates building on the dispatch core use this in their own
//! tests; nothing here is compiled into a kernel image that does not ask
//! for it.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::{mm::Vaddr, platform::Platform, prelude::*};

const NOW_STRIDE_NS: u64 = 50;
const CYCLE_STRIDE: u64 = 7;
const USER_TOP: Vaddr = 0x0000_8000_0000_0000;

pub struct TestPlatform {
    now: AtomicU64,
    cycles: AtomicU64,
    entropy: AtomicU64,
}

impl TestPlatform {
    pub fn new() -> Self {
        Self::starting_at(1_000)
    }

    pub fn starting_at(now_ns: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ns),
            cycles: AtomicU64::new(1),
            entropy: AtomicU64::new(0x243f_6a88_85a3_08d3),
        }
    }

    /// Jumps the clock forward, e.g. across a reseed interval.
    pub fn advance(&self, ns: u64) {
        self.now.fetch_add(ns, Ordering::SeqCst);
    }
}

impl Default for TestPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for TestPlatform {
    fn now_monotonic(&self) -> u64 {
        self.now.fetch_add(NOW_STRIDE_NS, Ordering::SeqCst) + NOW_STRIDE_NS
    }

    fn cycle_counter(&self) -> u64 {
        self.cycles.fetch_add(CYCLE_STRIDE, Ordering::SeqCst) + CYCLE_STRIDE
    }

    fn hw_entropy(&self) -> Option<u64> {
        // A weyl sequence is plenty for deterministic tests.
        Some(
            self.entropy
                .fetch_add(0x9e37_79b9_7f4a_7c15, Ordering::SeqCst),
        )
    }

    fn validate_user_address(&self, va: Vaddr, size: u64, _write: bool) -> bool {
        if va == 0 || size == 0 {
            return false;
        }
        match va.checked_add(size) {
            Some(end) => end <= USER_TOP,
            None => false,
        }
    }

    fn enable_smep(&self) -> Result<()> {
        Ok(())
    }

    fn enable_smap(&self) -> Result<()> {
        Ok(())
    }

    fn enable_umip(&self) -> Result<()> {
        Err(Error::Unsupported)
    }
}
