// SPDX-License-Identifier: MPL-2.0

//! The powerpc (64-bit, radix MMU) backend.

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

/// Radix PTE bits. USER occupies the privileged slot (inverted by the
/// walker); PRESENT is the high valid bit.
pub(crate) const FLAG_TABLE: FlagTable = &[
    (PageFlags::EXECUTABLE, 1 << 0), // EXEC
    (PageFlags::WRITABLE, 1 << 1),   // WRITE
    (PageFlags::USER, 1 << 2),       // PRIVILEGED slot
    (PageFlags::DEVICE, 1 << 5),     // non-idempotent I/O
    (PageFlags::NOCACHE, 1 << 6),    // cache-inhibited
    (PageFlags::KERNEL, 1 << 15),    // shared/global slot
    (PageFlags::PRESENT, 1 << 63),   // VALID
];

/// Non-volatile slot assignment: r14..r31, then r2 (TOC) and lr.
pub const CTX_R14: usize = 0;
pub const CTX_TOC: usize = 18;
pub const CTX_LR: usize = 19;

const MSR_SF: u64 = 1 << 63;
const MSR_EE: u64 = 1 << 15;

static SPEC: ArchSpec = ArchSpec {
    page_size: 4096,
    kernel_flag: 1 << 15,
    irq_max: 512,
    vector_base: 0,
    timer_freq_hz: 512_000_000,
    timer_min_ns: 1_000,
    timer_max_ns: 10_000_000_000,
    cache_line: 128,
    nr_cpus: 8,
    nr_perf_counters: 6,
    nr_breakpoints: 1,
    nr_watchpoints: 1,
    nr_ipc_ports: 0,
    // running, nap, sleep, winkle, off
    power_codes: [0x0, 0x1, 0x2, 0x3, 0xf],
};

pub(crate) struct PowerPcBackend {
    soft: SoftState,
    vsx_enabled: AtomicBool,
}

impl PowerPcBackend {
    pub(crate) fn new(plat: Arc<dyn Platform>) -> Self {
        Self {
            soft: SoftState::new(&SPEC, plat),
            vsx_enabled: AtomicBool::new(false),
        }
    }
}

impl Backend for PowerPcBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            arch: ArchId::PowerPc,
            name: "powerpc",
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
        // AltiVec/VSX, in-core crypto, HTM, 64K/16M pages.
        CpuFeatures::FPU
            | CpuFeatures::SIMD
            | CpuFeatures::WIDE_SIMD
            | CpuFeatures::CRYPTO
            | CpuFeatures::TRANSACTIONAL
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
        ctx.regs[CTX_LR] = entry;
        ctx.flags = MSR_SF | MSR_EE;
        Ok(())
    }

    fn secure_init(&self) -> Result<()> {
        Ok(())
    }

    fn extension_call(&self, ext: ArchExtension, args: &[u64]) -> Result<u64> {
        match ext {
            ArchExtension::VectorEnable => {
                self.vsx_enabled.store(true, Ordering::SeqCst);
                Ok(1)
            }
            ArchExtension::VectorDisable => {
                self.vsx_enabled.store(false, Ordering::SeqCst);
                Ok(0)
            }
            ArchExtension::VectorStatus => Ok(self.vsx_enabled.load(Ordering::SeqCst) as u64),
            ArchExtension::CryptoEnable | ArchExtension::CryptoStatus => Ok(1),
            ArchExtension::PlatformFeature => {
                let leaf = *args.first().ok_or(Error::InvalidArgument)?;
                match leaf {
                    0 => Ok(1), // radix MMU
                    _ => Err(Error::Unsupported),
                }
            }
        }
    }
}
