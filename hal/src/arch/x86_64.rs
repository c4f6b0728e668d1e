// SPDX-License-Identifier: MPL-2.0

//! The x86_64 backend.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::{
    arch::{
        common::{impl_soft_slots, ArchSpec, SoftState},
        ArchId,
    },
    backend::{
        ArchExtension, Backend, BackendCaps, BackendInfo, CpuFeatures, IpcMessage, TaskContext,
    },
    mm::{FlagTable, PageFlags},
    platform::Platform,
    prelude::*,
};

/// Page-table bit assignment. EXECUTABLE occupies the NX slot; the table
/// walker below this layer inverts it when committing real entries.
pub(crate) const FLAG_TABLE: FlagTable = &[
    (PageFlags::PRESENT, 1 << 0),     // P
    (PageFlags::WRITABLE, 1 << 1),    // RW
    (PageFlags::USER, 1 << 2),        // US
    (PageFlags::DEVICE, 1 << 3),      // PWT
    (PageFlags::NOCACHE, 1 << 4),     // PCD
    (PageFlags::KERNEL, 1 << 8),      // G
    (PageFlags::EXECUTABLE, 1 << 63), // NX
];

/// Callee-saved slot assignment in a saved context, per the SysV ABI.
pub const CTX_RBX: usize = 0;
pub const CTX_RBP: usize = 1;
pub const CTX_R12: usize = 2;
pub const CTX_R13: usize = 3;
pub const CTX_R14: usize = 4;
pub const CTX_R15: usize = 5;

const RFLAGS_RESERVED: u64 = 1 << 1;
const RFLAGS_IF: u64 = 1 << 9;

static SPEC: ArchSpec = ArchSpec {
    page_size: 4096,
    kernel_flag: 1 << 8,
    irq_max: 224,
    vector_base: 32,
    timer_freq_hz: 1_000_000,
    timer_min_ns: 1_000,
    timer_max_ns: 10_000_000_000,
    cache_line: 64,
    nr_cpus: 8,
    nr_perf_counters: 8,
    nr_breakpoints: 4,
    nr_watchpoints: 4,
    nr_ipc_ports: 64,
    // C0, C1(hlt), C3, S3, S5
    power_codes: [0x00, 0x01, 0x03, 0x53, 0x55],
};

pub(crate) struct X86Backend {
    soft: SoftState,
    xsave_enabled: AtomicBool,
}

impl X86Backend {
    pub(crate) fn new(plat: Arc<dyn Platform>) -> Self {
        Self {
            soft: SoftState::new(&SPEC, plat),
            xsave_enabled: AtomicBool::new(false),
        }
    }
}

impl Backend for X86Backend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            arch: ArchId::X86_64,
            name: "x86_64",
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
            | BackendCaps::IPC_FAST
            | BackendCaps::PERF
            | BackendCaps::POWER
            | BackendCaps::SECURE
            | BackendCaps::DEBUG
            | BackendCaps::VECTOR
    }

    fn cpu_features(&self) -> CpuFeatures {
        // SSE2 baseline, AVX2, AES-NI, RDRAND, VMX, 2M/1G pages, PMCs.
        CpuFeatures::FPU
            | CpuFeatures::SIMD
            | CpuFeatures::WIDE_SIMD
            | CpuFeatures::CRYPTO
            | CpuFeatures::HW_RNG
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
        ctx.regs[CTX_RBP] = 0;
        ctx.flags = RFLAGS_RESERVED | RFLAGS_IF;
        Ok(())
    }

    fn ipc_setup(&self, nr_ports: u32) -> Result<()> {
        self.soft.ipc_setup(nr_ports)
    }

    fn ipc_fast_send(&self, port: u32, msg: &IpcMessage) -> Result<()> {
        self.soft.ipc_fast_send(port, msg)
    }

    fn ipc_fast_recv(&self, port: u32) -> Result<IpcMessage> {
        self.soft.ipc_fast_recv(port)
    }

    fn secure_init(&self) -> Result<()> {
        // Lockdowns are best-effort: older parts lack UMIP, and SMAP
        // arrived after SMEP. Anything else the platform reports is real.
        let plat = self.soft.platform();
        for res in [plat.enable_smep(), plat.enable_smap(), plat.enable_umip()] {
            match res {
                Ok(()) | Err(Error::Unsupported) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn extension_call(&self, ext: ArchExtension, args: &[u64]) -> Result<u64> {
        match ext {
            ArchExtension::VectorEnable => {
                self.xsave_enabled.store(true, Ordering::SeqCst);
                Ok(1)
            }
            ArchExtension::VectorDisable => {
                self.xsave_enabled.store(false, Ordering::SeqCst);
                Ok(0)
            }
            ArchExtension::VectorStatus => Ok(self.xsave_enabled.load(Ordering::SeqCst) as u64),
            ArchExtension::CryptoEnable | ArchExtension::CryptoStatus => {
                // AES-NI needs no opt-in.
                Ok(1)
            }
            ArchExtension::PlatformFeature => {
                let leaf = *args.first().ok_or(Error::InvalidArgument)?;
                match leaf {
                    0 => Ok(1), // TSC deadline
                    1 => Ok(1), // XSAVE
                    _ => Err(Error::Unsupported),
                }
            }
        }
    }
}
