// SPDX-License-Identifier: MPL-2.0

//! Generic memory types and the page-flag translation tables.
//!
//! Page flags cross the HAL boundary in exactly one place: the dispatch
//! layer translates the generic [`PageFlags`] set into the active
//! architecture's encoding before a backend ever sees them, and translates
//! hardware bits back on the way out. Backends never interpret generic
//! bits and callers never interpret architecture bits.

use bitflags::bitflags;

use crate::arch::ArchId;

/// A virtual address, wider than any target register file.
pub type Vaddr = u64;
/// A physical address.
pub type Paddr = u64;

bitflags! {
    /// The architecture-neutral page attribute set.
    pub struct PageFlags: u64 {
        const PRESENT    = 1 << 0;
        const WRITABLE   = 1 << 1;
        const USER       = 1 << 2;
        const EXECUTABLE = 1 << 3;
        /// Global kernel mapping; unmaps flush on all CPUs.
        const KERNEL     = 1 << 4;
        /// Device memory; implies strong ordering on targets that have it.
        const DEVICE     = 1 << 5;
        const NOCACHE    = 1 << 6;
    }
}

/// One row per generic bit an architecture supports, mapping it to that
/// architecture's mask.
pub(crate) type FlagTable = &'static [(PageFlags, u64)];

fn table_for(arch: ArchId) -> FlagTable {
    match arch {
        ArchId::X86_64 => crate::arch::x86_64::FLAG_TABLE,
        ArchId::Aarch64 => crate::arch::aarch64::FLAG_TABLE,
        ArchId::Riscv64 => crate::arch::riscv64::FLAG_TABLE,
        ArchId::PowerPc => crate::arch::powerpc::FLAG_TABLE,
        ArchId::LoongArch => crate::arch::loongarch::FLAG_TABLE,
        ArchId::Mips => crate::arch::mips::FLAG_TABLE,
        ArchId::Armv7l => crate::arch::armv7l::FLAG_TABLE,
        ArchId::S390x => crate::arch::s390x::FLAG_TABLE,
    }
}

/// Translates generic flags into `arch`'s encoding.
///
/// Total: bits the architecture does not support are silently dropped.
pub fn to_arch(flags: PageFlags, arch: ArchId) -> u64 {
    let mut out = 0;
    for &(generic, mask) in table_for(arch) {
        if flags.contains(generic) {
            out |= mask;
        }
    }
    out
}

/// Translates `arch` encoding bits back into the generic set.
///
/// Total: hardware bits with no generic counterpart are cleared.
pub fn from_arch(bits: u64, arch: ArchId) -> PageFlags {
    let mut out = PageFlags::empty();
    for &(generic, mask) in table_for(arch) {
        if bits & mask == mask {
            out |= generic;
        }
    }
    out
}

/// The subset of generic flags `arch` can express.
pub fn supported_flags(arch: ArchId) -> PageFlags {
    let mut out = PageFlags::empty();
    for &(generic, _) in table_for(arch) {
        out |= generic;
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_preserves_supported_bits() {
        for &arch in ArchId::ALL {
            let supported = supported_flags(arch);
            for raw in 0..(1u64 << 7) {
                let generic = PageFlags::from_bits_truncate(raw);
                let back = from_arch(to_arch(generic, arch), arch);
                assert_eq!(back, generic & supported, "arch {arch:?}, flags {generic:?}");
            }
        }
    }

    #[test]
    fn core_permission_bits_supported_everywhere() {
        let core = PageFlags::PRESENT
            | PageFlags::WRITABLE
            | PageFlags::USER
            | PageFlags::EXECUTABLE;
        for &arch in ArchId::ALL {
            assert_eq!(from_arch(to_arch(core, arch), arch), core, "arch {arch:?}");
        }
    }

    #[test]
    fn unknown_hardware_bits_are_cleared() {
        for &arch in ArchId::ALL {
            let all = to_arch(PageFlags::all(), arch);
            // Bits outside every table row must not invent generic flags.
            let noise = !all;
            assert_eq!(from_arch(noise & !all, arch), PageFlags::empty());
        }
    }

    #[test]
    fn encodings_are_disjoint_per_arch() {
        for &arch in ArchId::ALL {
            let table = super::table_for(arch);
            for (i, &(_, a)) in table.iter().enumerate() {
                assert_ne!(a, 0);
                for &(_, b) in &table[i + 1..] {
                    assert_eq!(a & b, 0, "overlapping masks on {arch:?}");
                }
            }
        }
    }
}
