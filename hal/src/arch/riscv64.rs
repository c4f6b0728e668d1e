// SPDX-License-Identifier: MPL-2.0

//! The riscv64 backend.

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

/// Sv39 PTE bits; DEVICE and NOCACHE ride the Svpbmt memory types.
pub(crate) const FLAG_TABLE: FlagTable = &[
    (PageFlags::PRESENT, 1 << 0),    // V
    (PageFlags::WRITABLE, 1 << 2),   // W
    (PageFlags::EXECUTABLE, 1 << 3), // X
    (PageFlags::USER, 1 << 4),       // U
    (PageFlags::KERNEL, 1 << 5),     // G
    (PageFlags::NOCACHE, 1 << 61),   // PBMT = NC
    (PageFlags::DEVICE, 1 << 62),    // PBMT = IO
];

/// Callee-saved slot assignment: s0..s11, then ra and gp.
pub const CTX_S0: usize = 0;
pub const CTX_RA: usize = 12;
pub const CTX_GP: usize = 13;

/// sstatus.SPIE: interrupts on after the first sret.
const SSTATUS_SPIE: u64 = 1 << 5;

const RVV_VLEN_MAX_BITS: u64 = 65_536;

static SPEC: ArchSpec = ArchSpec {
    page_size: 4096,
    kernel_flag: 1 << 5,
    irq_max: 1024,
    vector_base: 0,
    timer_freq_hz: 10_000_000,
    timer_min_ns: 1_000,
    timer_max_ns: 10_000_000_000,
    cache_line: 64,
    nr_cpus: 4,
    nr_perf_counters: 4,
    nr_breakpoints: 2,
    nr_watchpoints: 2,
    nr_ipc_ports: 0,
    // SBI HSM-style: started, suspended-retentive, suspended, system-suspend, stopped
    power_codes: [0x0, 0x1, 0x2, 0x3, 0x4],
};

pub(crate) struct Riscv64Backend {
    soft: SoftState,
    /// Configured RVV VLEN in bits; zero while vtype is off.
    rvv_vlen: AtomicU64,
}

impl Riscv64Backend {
    pub(crate) fn new(plat: Arc<dyn Platform>) -> Self {
        Self {
            soft: SoftState::new(&SPEC, plat),
            rvv_vlen: AtomicU64::new(0),
        }
    }
}

impl Backend for Riscv64Backend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            arch: ArchId::Riscv64,
            name: "riscv64",
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
            | CpuFeatures::SCALABLE_VECTOR
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
        ctx.flags = SSTATUS_SPIE;
        Ok(())
    }

    fn secure_init(&self) -> Result<()> {
        // PMP regions are the firmware's business.
        Ok(())
    }

    fn extension_call(&self, ext: ArchExtension, args: &[u64]) -> Result<u64> {
        match ext {
            ArchExtension::VectorEnable => {
                let vlen = *args.first().ok_or(Error::InvalidArgument)?;
                if !vlen.is_power_of_two() || vlen < 128 || vlen > RVV_VLEN_MAX_BITS {
                    return Err(Error::InvalidArgument);
                }
                self.rvv_vlen.store(vlen, Ordering::SeqCst);
                Ok(vlen)
            }
            ArchExtension::VectorDisable => {
                self.rvv_vlen.store(0, Ordering::SeqCst);
                Ok(0)
            }
            ArchExtension::VectorStatus => Ok(self.rvv_vlen.load(Ordering::SeqCst)),
            ArchExtension::PlatformFeature => {
                let leaf = *args.first().ok_or(Error::InvalidArgument)?;
                match leaf {
                    0 => Ok(1), // sstc
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
    fn rvv_vlen_must_be_a_power_of_two() {
        let b = Riscv64Backend::new(Arc::new(TestPlatform::new()));
        assert!(b.extension_call(ArchExtension::VectorEnable, &[192]).is_err());
        assert_eq!(b.extension_call(ArchExtension::VectorEnable, &[512]).unwrap(), 512);
    }

    #[test]
    fn no_fast_path_ipc() {
        let b = Riscv64Backend::new(Arc::new(TestPlatform::new()));
        assert!(matches!(b.ipc_setup(8), Err(Error::Unsupported)));
    }
}
