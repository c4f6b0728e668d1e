// SPDX-License-Identifier: MPL-2.0

//! The mips (64-bit, release 6) backend.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::{
    arch::{
        common::{impl_soft_slots, ArchSpec, SoftState},
        ArchId,
    },
    backend::{ArchExtension, Backend, BackendCaps, BackendInfo, CpuFeatures, TaskContext},
    mm::{FlagTable, PageFlags},
    platform::Platform,
    prelude::*,
};

/// TLB EntryLo bits plus the software half-word. MIPS has no distinct
/// device memory type; DEVICE is not representable and gets dropped at
/// the translation boundary.
pub(crate) const FLAG_TABLE: FlagTable = &[
    (PageFlags::KERNEL, 1 << 0),     // G
    (PageFlags::PRESENT, 1 << 1),    // V
    (PageFlags::WRITABLE, 1 << 2),   // D
    (PageFlags::NOCACHE, 1 << 3),    // C = uncached
    (PageFlags::USER, 1 << 6),       // software
    (PageFlags::EXECUTABLE, 1 << 7), // XI slot
];

/// Callee-saved slot assignment: s0..s7, then gp, fp and ra.
pub const CTX_S0: usize = 0;
pub const CTX_GP: usize = 8;
pub const CTX_FP: usize = 9;
pub const CTX_RA: usize = 10;

const STATUS_IE: u64 = 1 << 0;

static SPEC: ArchSpec = ArchSpec {
    page_size: 4096,
    kernel_flag: 1 << 0,
    irq_max: 64,
    vector_base: 0,
    timer_freq_hz: 100_000_000,
    timer_min_ns: 10_000,
    timer_max_ns: 10_000_000_000,
    cache_line: 32,
    nr_cpus: 2,
    nr_perf_counters: 2,
    nr_breakpoints: 2,
    nr_watchpoints: 1,
    nr_ipc_ports: 0,
    power_codes: [0x0, 0x1, 0x2, 0x3, 0x7],
};

pub(crate) struct MipsBackend {
    soft: SoftState,
    msa_enabled: AtomicBool,
}

impl MipsBackend {
    pub(crate) fn new(plat: Arc<dyn Platform>) -> Self {
        Self {
            soft: SoftState::new(&SPEC, plat),
            msa_enabled: AtomicBool::new(false),
        }
    }
}

impl Backend for MipsBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            arch: ArchId::Mips,
            name: "mips",
            version: 1,
        }
    }

    fn caps(&self) -> BackendCaps {
        BackendCaps::MMU
            | BackendCaps::IRQ
            | BackendCaps::TIMER
            | BackendCaps::CACHE
            | BackendCaps::SMP
            | BackendCaps::CONTEXT
            | BackendCaps::PERF
            | BackendCaps::POWER
            | BackendCaps::SECURE
            | BackendCaps::DEBUG
            | BackendCaps::VECTOR
    }

    fn cpu_features(&self) -> CpuFeatures {
        CpuFeatures::FPU | CpuFeatures::SIMD | CpuFeatures::LARGE_PAGES | CpuFeatures::PERFMON
    }

    impl_soft_slots!();

    fn context_init(&self, ctx: &mut TaskContext, entry: Vaddr, stack: Vaddr) -> Result<()> {
        if entry == 0 || stack == 0 {
            return Err(Error::InvalidArgument);
        }
        *ctx = TaskContext::zeroed();
        ctx.pc = entry;
        ctx.sp = stack & !0xf;
        ctx.regs[CTX_RA] = entry;
        ctx.flags = STATUS_IE;
        Ok(())
    }

    fn secure_init(&self) -> Result<()> {
        Ok(())
    }

    fn extension_call(&self, ext: ArchExtension, args: &[u64]) -> Result<u64> {
        match ext {
            ArchExtension::VectorEnable => {
                self.msa_enabled.store(true, Ordering::SeqCst);
                Ok(1)
            }
            ArchExtension::VectorDisable => {
                self.msa_enabled.store(false, Ordering::SeqCst);
                Ok(0)
            }
            ArchExtension::VectorStatus => Ok(self.msa_enabled.load(Ordering::SeqCst) as u64),
            ArchExtension::PlatformFeature => {
                let leaf = *args.first().ok_or(Error::InvalidArgument)?;
                match leaf {
                    0 => Ok(1), // CP0 count/compare
                    _ => Err(Error::Unsupported),
                }
            }
            _ => Err(Error::Unsupported),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mm::{from_arch, to_arch};

    #[test]
    fn device_memory_is_not_representable() {
        let out = to_arch(PageFlags::DEVICE, ArchId::Mips);
        assert_eq!(out, 0);
        assert_eq!(from_arch(out, ArchId::Mips), PageFlags::empty());
    }
}
