// SPDX-License-Identifier: MPL-2.0

//! Boot-time hardware hardening: KASLR, the stack canary, the CFI edge
//! table, the W^X rule and address validation.
//!
//! The random material here is drawn exactly once, at boot, from the
//! entropy pool. The checks are pure; wiring a failed check into the
//! audit ring and the IDS is the policy surface's job.

use alloc::{boxed::Box, vec::Vec};
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use align_ext::AlignExt;
use spin::Mutex;

use orion_hal::{PageFlags, Platform, Vaddr};

use crate::config::{CFI_TABLE_SIZE, KASLR_ALIGN, KASLR_BASE, KASLR_SLOTS};

/// The boot-time KASLR offset.
pub struct Kaslr {
    offset: AtomicU64,
}

impl Kaslr {
    pub const fn new() -> Self {
        Self {
            offset: AtomicU64::new(0),
        }
    }

    /// Draws the offset: one of [`KASLR_SLOTS`] values at 2 MiB steps.
    pub fn randomize(&self, random: u64) {
        let offset = (random & (KASLR_SLOTS - 1)) * KASLR_ALIGN;
        debug_assert_eq!(offset, offset.align_down(KASLR_ALIGN));
        self.offset.store(offset, Ordering::Release);
    }

    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }
}

impl Default for Kaslr {
    fn default() -> Self {
        Self::new()
    }
}

/// The boot-time stack canary.
pub struct StackCanary {
    value: AtomicU64,
}

impl StackCanary {
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn arm(&self, random: u64) {
        // A zero canary would make a cleared stack look intact.
        self.value.store(random | 1, Ordering::Release);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    pub fn matches(&self, candidate: u64) -> bool {
        candidate == self.value()
    }
}

impl Default for StackCanary {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
struct CfiEdge {
    source: Vaddr,
    target: Vaddr,
    hash: u64,
    valid: bool,
}

/// The pre-registered indirect-control-flow allow-list.
pub struct CfiTable {
    slots: Box<[Mutex<CfiEdge>]>,
    next_slot: AtomicUsize,
}

impl CfiTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(CFI_TABLE_SIZE);
        slots.resize_with(CFI_TABLE_SIZE, || {
            Mutex::new(CfiEdge {
                source: 0,
                target: 0,
                hash: 0,
                valid: false,
            })
        });
        Self {
            slots: slots.into_boxed_slice(),
            next_slot: AtomicUsize::new(0),
        }
    }

    /// Allows the indirect edge `source -> target`. The table is a ring;
    /// the oldest registration falls off when it wraps.
    pub fn register(&self, source: Vaddr, target: Vaddr) {
        let idx = self.next_slot.fetch_add(1, Ordering::AcqRel) % CFI_TABLE_SIZE;
        *self.slots[idx].lock() = CfiEdge {
            source,
            target,
            hash: gmix::mix64_pair(source, target),
            valid: true,
        };
    }

    /// Whether `source -> target` was registered.
    pub fn validate(&self, source: Vaddr, target: Vaddr) -> bool {
        let hash = gmix::mix64_pair(source, target);
        self.slots.iter().any(|slot| {
            let edge = slot.lock();
            edge.valid && edge.source == source && edge.hash == hash
        })
    }
}

impl Default for CfiTable {
    fn default() -> Self {
        Self::new()
    }
}

/// The W^X rule: writable and executable never combine.
pub fn wx_violation(flags: PageFlags) -> bool {
    flags.contains(PageFlags::WRITABLE | PageFlags::EXECUTABLE)
}

/// Structural address validation, then the architecture probe.
///
/// Rejects the null page, empty and overflowing ranges, and anything
/// touching the KASLR-protected window.
pub fn address_valid(
    va: Vaddr,
    size: u64,
    write: bool,
    kaslr_offset: u64,
    plat: &dyn Platform,
) -> bool {
    if va == 0 || size == 0 {
        return false;
    }
    let Some(end) = va.checked_add(size) else {
        return false;
    };
    let window_end = KASLR_BASE.saturating_add(kaslr_offset);
    if va < window_end && end > KASLR_BASE {
        return false;
    }
    plat.validate_user_address(va, size, write)
}

#[cfg(test)]
mod test {
    use super::*;
    use orion_hal::testing::TestPlatform;

    #[test]
    fn kaslr_offsets_are_aligned_and_bounded() {
        let kaslr = Kaslr::new();
        for seed in [0u64, 1, 0xffff, u64::MAX, 0xdead_beef_cafe] {
            kaslr.randomize(seed);
            let offset = kaslr.offset();
            assert_eq!(offset % KASLR_ALIGN, 0);
            assert!(offset < KASLR_SLOTS * KASLR_ALIGN);
        }
    }

    #[test]
    fn canary_is_never_zero() {
        let canary = StackCanary::new();
        canary.arm(0);
        assert_ne!(canary.value(), 0);
        assert!(canary.matches(canary.value()));
        assert!(!canary.matches(canary.value() ^ 1));
    }

    #[test]
    fn cfi_validates_registered_edges_only() {
        let cfi = CfiTable::new();
        cfi.register(0x1000, 0x2000);
        assert!(cfi.validate(0x1000, 0x2000));
        assert!(!cfi.validate(0x1000, 0x3000));
        assert!(!cfi.validate(0x2000, 0x1000));
    }

    #[test]
    fn cfi_ring_overwrites_the_oldest() {
        let cfi = CfiTable::new();
        cfi.register(0xaaaa, 0xbbbb);
        for i in 0..CFI_TABLE_SIZE as u64 {
            cfi.register(0x10_0000 + i, 0x20_0000 + i);
        }
        assert!(!cfi.validate(0xaaaa, 0xbbbb));
        assert!(cfi.validate(0x10_0000 + CFI_TABLE_SIZE as u64 - 1, 0x20_0000 + CFI_TABLE_SIZE as u64 - 1));
    }

    #[test]
    fn wx_rule() {
        assert!(wx_violation(PageFlags::WRITABLE | PageFlags::EXECUTABLE));
        assert!(!wx_violation(PageFlags::WRITABLE | PageFlags::PRESENT));
        assert!(!wx_violation(PageFlags::EXECUTABLE));
    }

    #[test]
    fn address_validation_rejects_the_kaslr_window() {
        let plat = TestPlatform::new();
        let offset = 4 * KASLR_ALIGN;
        assert!(!address_valid(0, 8, false, offset, &plat));
        assert!(!address_valid(0x1000, 0, false, offset, &plat));
        assert!(!address_valid(u64::MAX - 4, 8, false, offset, &plat));
        assert!(!address_valid(KASLR_BASE + 0x1000, 8, false, offset, &plat));
        assert!(address_valid(0x40_0000, 0x1000, true, offset, &plat));
    }
}
