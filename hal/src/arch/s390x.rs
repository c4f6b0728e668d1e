// SPDX-License-Identifier: MPL-2.0

//! The s390x backend.

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

/// Software view of a DAT page-table entry. DAT protection is mostly
/// inverted hardware-side, so these are the software slots the walker
/// folds into real entries. z/Architecture has no device memory type;
/// DEVICE is dropped at the translation boundary.
pub(crate) const FLAG_TABLE: FlagTable = &[
    (PageFlags::PRESENT, 1 << 0),
    (PageFlags::WRITABLE, 1 << 1),   // PROTECT slot
    (PageFlags::USER, 1 << 2),
    (PageFlags::EXECUTABLE, 1 << 3), // NOEXEC slot
    (PageFlags::KERNEL, 1 << 4),
    (PageFlags::NOCACHE, 1 << 6),
];

/// Callee-saved slot assignment: r6..r13, then r14 (link) and r15 (sp).
pub const CTX_R6: usize = 0;
pub const CTX_LINK: usize = 8;

/// Fixed z/Architecture stack frame reserved below the entry sp.
const STACK_FRAME: u64 = 160;

/// PSW: machine-check and I/O masks on, primary space mode.
const PSW_BASE: u64 = 0x0406_0000_0000_0000;

static SPEC: ArchSpec = ArchSpec {
    page_size: 4096,
    kernel_flag: 1 << 4,
    irq_max: 64,
    vector_base: 0,
    timer_freq_hz: 4_096_000,
    timer_min_ns: 1_000,
    timer_max_ns: 10_000_000_000,
    cache_line: 256,
    nr_cpus: 4,
    nr_perf_counters: 2,
    nr_breakpoints: 1,
    nr_watchpoints: 1,
    nr_ipc_ports: 0,
    power_codes: [0x0, 0x1, 0x2, 0x3, 0x7],
};

pub(crate) struct S390Backend {
    soft: SoftState,
    vx_enabled: AtomicBool,
}

impl S390Backend {
    pub(crate) fn new(plat: Arc<dyn Platform>) -> Self {
        Self {
            soft: SoftState::new(&SPEC, plat),
            vx_enabled: AtomicBool::new(false),
        }
    }
}

impl Backend for S390Backend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            arch: ArchId::S390x,
            name: "s390x",
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
        // Vector facility, CPACF, transactional execution, 1M segments.
        CpuFeatures::FPU
            | CpuFeatures::SIMD
            | CpuFeatures::CRYPTO
            | CpuFeatures::HW_RNG
            | CpuFeatures::TRANSACTIONAL
            | CpuFeatures::LARGE_PAGES
            | CpuFeatures::PERFMON
    }

    impl_soft_slots!();

    fn context_init(&self, ctx: &mut TaskContext, entry: Vaddr, stack: Vaddr) -> Result<()> {
        if entry == 0 || stack == 0 {
            return Err(Error::InvalidArgument);
        }
        if stack <= STACK_FRAME {
            return Err(Error::InvalidArgument);
        }
        *ctx = TaskContext::zeroed();
        ctx.pc = entry;
        ctx.sp = (stack - STACK_FRAME) & !0x7;
        ctx.regs[CTX_LINK] = entry;
        ctx.flags = PSW_BASE;
        Ok(())
    }

    fn secure_init(&self) -> Result<()> {
        Ok(())
    }

    fn extension_call(&self, ext: ArchExtension, args: &[u64]) -> Result<u64> {
        match ext {
            ArchExtension::VectorEnable => {
                self.vx_enabled.store(true, Ordering::SeqCst);
                Ok(1)
            }
            ArchExtension::VectorDisable => {
                self.vx_enabled.store(false, Ordering::SeqCst);
                Ok(0)
            }
            ArchExtension::VectorStatus => Ok(self.vx_enabled.load(Ordering::SeqCst) as u64),
            ArchExtension::CryptoEnable | ArchExtension::CryptoStatus => {
                // CPACF is wired in.
                Ok(1)
            }
            ArchExtension::PlatformFeature => {
                let leaf = *args.first().ok_or(Error::InvalidArgument)?;
                match leaf {
                    0 => Ok(1), // TOD clock steering
                    _ => Err(Error::Unsupported),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::TestPlatform;

    #[test]
    fn entry_stack_reserves_the_fixed_frame() {
        let b = S390Backend::new(Arc::new(TestPlatform::new()));
        let mut ctx = TaskContext::zeroed();
        b.context_init(&mut ctx, 0x1_0000, 0x8_0000).unwrap();
        assert_eq!(ctx.sp, 0x8_0000 - 160);
        assert!(b.context_init(&mut ctx, 0x1_0000, 100).is_err());
    }
}
