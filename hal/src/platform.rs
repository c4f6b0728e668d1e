// SPDX-License-Identifier: MPL-2.0

//! The platform collaborator surface.
//!
//! Everything the dispatch core needs from the surrounding kernel but does
//! not own: the monotonic clock, raw hardware probes, and the privileged
//! lockdown knobs. The embedding kernel supplies one implementation; tests
//! supply a deterministic one.

use crate::{
    arch::{self, ArchId},
    prelude::*,
};

pub trait Platform: Send + Sync {
    /// Monotonic nanoseconds since boot. Never decreases.
    fn now_monotonic(&self) -> u64;

    /// The raw CPU cycle counter.
    fn cycle_counter(&self) -> u64;

    /// One word of hardware entropy, if the platform has a source.
    fn hw_entropy(&self) -> Option<u64> {
        None
    }

    /// Identifies the architecture this kernel is actually running on.
    fn probe_architecture(&self) -> ArchId {
        arch::compiled_arch()
    }

    /// Probes whether `[va, va + size)` is a valid user range.
    fn validate_user_address(&self, va: Vaddr, size: u64, write: bool) -> bool;

    fn enable_smep(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn enable_smap(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn enable_umip(&self) -> Result<()> {
        Err(Error::Unsupported)
    }
}
