// SPDX-License-Identifier: MPL-2.0

//! The loongarch backend.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

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

/// LoongArch PTE bits. USER rides the PLV3 slot and EXECUTABLE the NX
/// slot (inverted by the walker); DEVICE/NOCACHE select the MAT types.
pub(crate) const FLAG_TABLE: FlagTable = &[
    (PageFlags::PRESENT, 1 << 0),     // V
    (PageFlags::USER, 1 << 3),        // PLV3
    (PageFlags::DEVICE, 1 << 4),      // MAT = SUC
    (PageFlags::NOCACHE, 1 << 5),     // MAT = WUC
    (PageFlags::KERNEL, 1 << 6),      // G
    (PageFlags::WRITABLE, 1 << 8),    // W
    (PageFlags::EXECUTABLE, 1 << 62), // NX slot
];

/// Static slot assignment: s0..s8, then fp and ra.
pub const CTX_S0: usize = 0;
pub const CTX_FP: usize = 9;
pub const CTX_RA: usize = 10;

/// CSR.CRMD: PLV0 with interrupts enabled.
const CRMD_IE: u64 = 1 << 2;

static SPEC: ArchSpec = ArchSpec {
    page_size: 4096,
    kernel_flag: 1 << 6,
    irq_max: 256,
    vector_base: 64,
    timer_freq_hz: 100_000_000,
    timer_min_ns: 1_000,
    timer_max_ns: 10_000_000_000,
    cache_line: 64,
    nr_cpus: 4,
    nr_perf_counters: 4,
    nr_breakpoints: 8,
    nr_watchpoints: 8,
    nr_ipc_ports: 0,
    power_codes: [0x0, 0x1, 0x2, 0x3, 0x7],
};

pub(crate) struct LoongArchBackend {
    soft: SoftState,
    /// 128 for LSX, 256 for LASX, zero while disabled.
    simd_width: AtomicU64,
}

impl LoongArchBackend {
    pub(crate) fn new(plat: Arc<dyn Platform>) -> Self {
        Self {
            soft: SoftState::new(&SPEC, plat),
            simd_width: AtomicU64::new(0),
        }
    }
}

impl Backend for LoongArchBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            arch: ArchId::LoongArch,
            name: "loongarch",
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
        CpuFeatures::FPU
            | CpuFeatures::SIMD
            | CpuFeatures::WIDE_SIMD
            | CpuFeatures::VIRTUALIZATION
            | CpuFeatures::LARGE_PAGES
            | CpuFeatures::PERFMON
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
        ctx.flags = CRMD_IE;
        Ok(())
    }

    fn secure_init(&self) -> Result<()> {
        Ok(())
    }

    fn extension_call(&self, ext: ArchExtension, args: &[u64]) -> Result<u64> {
        match ext {
            ArchExtension::VectorEnable => {
                let width = *args.first().ok_or(Error::InvalidArgument)?;
                if width != 128 && width != 256 {
                    return Err(Error::InvalidArgument);
                }
                self.simd_width.store(width, Ordering::SeqCst);
                Ok(width)
            }
            ArchExtension::VectorDisable => {
                self.simd_width.store(0, Ordering::SeqCst);
                Ok(0)
            }
            ArchExtension::VectorStatus => Ok(self.simd_width.load(Ordering::SeqCst)),
            ArchExtension::PlatformFeature => {
                let leaf = *args.first().ok_or(Error::InvalidArgument)?;
                match leaf {
                    0 => Ok(1), // LVZ
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
    fn only_lsx_and_lasx_widths_are_accepted() {
        let b = LoongArchBackend::new(Arc::new(TestPlatform::new()));
        assert!(b.extension_call(ArchExtension::VectorEnable, &[512]).is_err());
        assert_eq!(b.extension_call(ArchExtension::VectorEnable, &[256]).unwrap(), 256);
    }
}
