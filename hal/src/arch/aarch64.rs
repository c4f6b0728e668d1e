// SPDX-License-Identifier: MPL-2.0

//! The aarch64 backend.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

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

/// Stage-1 descriptor bit assignment. WRITABLE sits in the AP[2] slot and
/// EXECUTABLE in the UXN slot; both are inverted by the table walker.
pub(crate) const FLAG_TABLE: FlagTable = &[
    (PageFlags::PRESENT, 1 << 0),     // VALID
    (PageFlags::DEVICE, 1 << 2),      // AttrIndx = Device-nGnRE
    (PageFlags::NOCACHE, 1 << 3),     // AttrIndx = Normal-NC
    (PageFlags::USER, 1 << 6),        // AP[1], EL0 accessible
    (PageFlags::WRITABLE, 1 << 7),    // AP[2] slot
    (PageFlags::KERNEL, 1 << 11),     // nG slot
    (PageFlags::EXECUTABLE, 1 << 54), // UXN slot
];

/// Callee-saved slot assignment: x19..x28, then fp (x29) and lr (x30).
pub const CTX_X19: usize = 0;
pub const CTX_FP: usize = 10;
pub const CTX_LR: usize = 11;

/// SPSR_EL1: EL1h, DAIF clear.
const SPSR_EL1H: u64 = 0b0101;

/// Legal SVE vector lengths: multiples of 128 bits up to 2048.
const SVE_VL_MAX_BITS: u64 = 2048;

static SPEC: ArchSpec = ArchSpec {
    page_size: 4096,
    kernel_flag: 1 << 11,
    irq_max: 988,
    vector_base: 32,
    timer_freq_hz: 25_000_000,
    timer_min_ns: 1_000,
    timer_max_ns: 10_000_000_000,
    cache_line: 64,
    nr_cpus: 8,
    nr_perf_counters: 6,
    nr_breakpoints: 6,
    nr_watchpoints: 4,
    nr_ipc_ports: 64,
    // PSCI-style: running, WFI, cpu-standby, system-suspend, system-off
    power_codes: [0x0, 0x1, 0x0100_0000, 0x0100_0001, 0x0840_0000],
};

pub(crate) struct Aarch64Backend {
    soft: SoftState,
    /// Configured SVE vector length in bits; zero while disabled.
    sve_vl: AtomicU64,
}

impl Aarch64Backend {
    pub(crate) fn new(plat: Arc<dyn Platform>) -> Self {
        Self {
            soft: SoftState::new(&SPEC, plat),
            sve_vl: AtomicU64::new(0),
        }
    }
}

impl Backend for Aarch64Backend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            arch: ArchId::Aarch64,
            name: "aarch64",
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
        // NEON baseline, SVE, the crypto extension, RNDR, EL2, PMUv3.
        CpuFeatures::FPU
            | CpuFeatures::SIMD
            | CpuFeatures::SCALABLE_VECTOR
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
        ctx.regs[CTX_FP] = 0;
        ctx.regs[CTX_LR] = entry;
        ctx.flags = SPSR_EL1H;
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
        // PAN/UAO are armed by the trap path below this crate.
        Ok(())
    }

    fn extension_call(&self, ext: ArchExtension, args: &[u64]) -> Result<u64> {
        match ext {
            ArchExtension::VectorEnable => {
                let vl = *args.first().ok_or(Error::InvalidArgument)?;
                if vl == 0 || vl % 128 != 0 || vl > SVE_VL_MAX_BITS {
                    return Err(Error::InvalidArgument);
                }
                self.sve_vl.store(vl, Ordering::SeqCst);
                Ok(vl)
            }
            ArchExtension::VectorDisable => {
                self.sve_vl.store(0, Ordering::SeqCst);
                Ok(0)
            }
            ArchExtension::VectorStatus => Ok(self.sve_vl.load(Ordering::SeqCst)),
            ArchExtension::CryptoEnable | ArchExtension::CryptoStatus => Ok(1),
            ArchExtension::PlatformFeature => {
                let leaf = *args.first().ok_or(Error::InvalidArgument)?;
                match leaf {
                    0 => Ok(1), // generic timer
                    1 => Ok(1), // GICv3
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
    fn sve_length_is_validated() {
        let b = Aarch64Backend::new(Arc::new(TestPlatform::new()));
        assert!(matches!(
            b.extension_call(ArchExtension::VectorEnable, &[100]),
            Err(Error::InvalidArgument)
        ));
        assert_eq!(b.extension_call(ArchExtension::VectorEnable, &[256]).unwrap(), 256);
        assert_eq!(b.extension_call(ArchExtension::VectorStatus, &[]).unwrap(), 256);
        assert_eq!(b.extension_call(ArchExtension::VectorDisable, &[]).unwrap(), 0);
    }
}
