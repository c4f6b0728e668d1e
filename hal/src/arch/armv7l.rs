// SPDX-License-Identifier: MPL-2.0

//! The armv7l backend.

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

/// Short-descriptor small-page bits. EXECUTABLE rides the XN slot and
/// KERNEL the nG slot; both are inverted by the walker.
pub(crate) const FLAG_TABLE: FlagTable = &[
    (PageFlags::EXECUTABLE, 1 << 0), // XN slot
    (PageFlags::PRESENT, 1 << 1),    // small page
    (PageFlags::DEVICE, 1 << 2),     // B, shareable device
    (PageFlags::NOCACHE, 1 << 6),    // TEX[0], non-cacheable
    (PageFlags::WRITABLE, 1 << 4),   // AP[0]
    (PageFlags::USER, 1 << 5),       // AP[1]
    (PageFlags::KERNEL, 1 << 11),    // nG slot
];

/// Callee-saved slot assignment: r4..r11, then lr.
pub const CTX_R4: usize = 0;
pub const CTX_LR: usize = 8;

/// CPSR: SVC mode, IRQs unmasked.
const CPSR_SVC: u64 = 0x13;

static SPEC: ArchSpec = ArchSpec {
    page_size: 4096,
    kernel_flag: 1 << 11,
    irq_max: 160,
    vector_base: 32,
    timer_freq_hz: 24_000_000,
    timer_min_ns: 10_000,
    timer_max_ns: 10_000_000_000,
    cache_line: 32,
    nr_cpus: 4,
    nr_perf_counters: 4,
    nr_breakpoints: 6,
    nr_watchpoints: 4,
    nr_ipc_ports: 0,
    power_codes: [0x0, 0x1, 0x2, 0x3, 0x7],
};

pub(crate) struct Armv7Backend {
    soft: SoftState,
    neon_enabled: AtomicBool,
}

impl Armv7Backend {
    pub(crate) fn new(plat: Arc<dyn Platform>) -> Self {
        Self {
            soft: SoftState::new(&SPEC, plat),
            neon_enabled: AtomicBool::new(false),
        }
    }
}

impl Backend for Armv7Backend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            arch: ArchId::Armv7l,
            name: "armv7l",
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
        CpuFeatures::FPU | CpuFeatures::SIMD | CpuFeatures::PERFMON
    }

    impl_soft_slots!();

    fn context_init(&self, ctx: &mut TaskContext, entry: Vaddr, stack: Vaddr) -> Result<()> {
        if entry == 0 || stack == 0 {
            return Err(Error::InvalidArgument);
        }
        *ctx = TaskContext::zeroed();
        // Bit 0 selects Thumb; entry points here are always A32.
        ctx.pc = entry & !0x1;
        ctx.sp = stack & !0x7;
        ctx.regs[CTX_LR] = entry;
        ctx.flags = CPSR_SVC;
        Ok(())
    }

    fn secure_init(&self) -> Result<()> {
        Ok(())
    }

    fn extension_call(&self, ext: ArchExtension, args: &[u64]) -> Result<u64> {
        match ext {
            ArchExtension::VectorEnable => {
                self.neon_enabled.store(true, Ordering::SeqCst);
                Ok(1)
            }
            ArchExtension::VectorDisable => {
                self.neon_enabled.store(false, Ordering::SeqCst);
                Ok(0)
            }
            ArchExtension::VectorStatus => Ok(self.neon_enabled.load(Ordering::SeqCst) as u64),
            ArchExtension::PlatformFeature => {
                let leaf = *args.first().ok_or(Error::InvalidArgument)?;
                match leaf {
                    0 => Ok(1), // generic timer
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
    use crate::testing::TestPlatform;

    #[test]
    fn thumb_bit_is_stripped_from_entry() {
        let b = Armv7Backend::new(Arc::new(TestPlatform::new()));
        let mut ctx = TaskContext::zeroed();
        b.context_init(&mut ctx, 0x8001, 0x9000_0008).unwrap();
        assert_eq!(ctx.pc, 0x8000);
        assert_eq!(ctx.sp % 8, 0);
    }
}
