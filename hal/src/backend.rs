// SPDX-License-Identifier: MPL-2.0

//! The architecture backend abstraction.
//!
//! A [`Backend`] is the full operation vector for one CPU family. The
//! dispatch layer selects exactly one at boot and forwards every
//! architecture-dependent request to it, after running page flags through
//! the translation tables in [`crate::mm`]. Every slot a family cannot
//! implement falls through to the default body returning
//! [`Error::Unsupported`]; the registry reports such slots as stubs.
//!
//! Backends are stateless from the dispatch layer's perspective. Whatever
//! per-family bookkeeping a backend needs lives in its own private fields,
//! which the generic layer never interprets.

use bitflags::bitflags;

use crate::{
    arch::ArchId,
    config::NR_CONTEXT_REGS,
    prelude::*,
};

/// Identification of a backend, immutable after registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendInfo {
    pub arch: ArchId,
    pub name: &'static str,
    pub version: u32,
}

bitflags! {
    /// Which operation groups of a backend are real implementations.
    ///
    /// The scheduler and drivers use this to pick code paths without
    /// probing individual slots.
    pub struct BackendCaps: u32 {
        const MMU      = 1 << 0;
        const IRQ      = 1 << 1;
        const TIMER    = 1 << 2;
        const CACHE    = 1 << 3;
        const SMP      = 1 << 4;
        const CONTEXT  = 1 << 5;
        const IPC_FAST = 1 << 6;
        const PERF     = 1 << 7;
        const POWER    = 1 << 8;
        const SECURE   = 1 << 9;
        const DEBUG    = 1 << 10;
        /// A vector/SIMD extension reachable through `extension_call`.
        const VECTOR   = 1 << 11;
    }
}

bitflags! {
    /// The closed, architecture-neutral CPU feature set.
    ///
    /// Family-specific names (SSE/AVX/NEON/SVE/RVV/VSX/MSA/VXE) map onto
    /// these generic bits in each backend's `cpu_features`.
    pub struct CpuFeatures: u64 {
        const FPU             = 1 << 0;
        /// 128-bit SIMD (SSE2, NEON, MSA, VX).
        const SIMD            = 1 << 1;
        /// 256-bit or wider fixed SIMD (AVX2, VSX extensions).
        const WIDE_SIMD       = 1 << 2;
        /// Length-agnostic vectors (SVE, RVV).
        const SCALABLE_VECTOR = 1 << 3;
        const CRYPTO          = 1 << 4;
        const HW_RNG          = 1 << 5;
        const VIRTUALIZATION  = 1 << 6;
        const LARGE_PAGES     = 1 << 7;
        const PERFMON         = 1 << 8;
        const TRANSACTIONAL   = 1 << 9;
    }
}

/// Generic power states, translated to family encodings inside backends.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, int_to_c_enum::TryFromInt)]
pub enum PowerState {
    Run = 0,
    Idle = 1,
    Standby = 2,
    Suspend = 3,
    Off = 4,
}

/// Breakpoint kinds. Software and hardware breakpoints are distinct.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, int_to_c_enum::TryFromInt)]
pub enum BreakpointKind {
    Software = 0,
    Hardware = 1,
}

/// The generic namespace of architecture-extension calls.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, int_to_c_enum::TryFromInt)]
pub enum ArchExtension {
    VectorEnable = 0,
    VectorDisable = 1,
    VectorStatus = 2,
    CryptoEnable = 3,
    CryptoStatus = 4,
    PlatformFeature = 5,
}

/// Hardware performance events every backend understands.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, int_to_c_enum::TryFromInt)]
pub enum PerfEvent {
    Cycles = 0,
    Instructions = 1,
    CacheReferences = 2,
    CacheMisses = 3,
    BranchMisses = 4,
    TlbMisses = 5,
}

/// An interrupt handler: the IRQ number plus an opaque data word.
pub type IrqHandler = fn(irq: u32, data: usize);

/// A periodic timer callback, given the current tick count.
pub type TimerCallback = fn(ticks: u64);

/// A saved register-file image.
///
/// The slot assignment inside `regs` is family-specific; each backend
/// publishes named index constants for its layout. Only the context
/// operations may observe or modify this state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskContext {
    pub regs: [u64; NR_CONTEXT_REGS],
    pub pc: u64,
    pub sp: u64,
    /// Processor status word (RFLAGS, PSTATE, sstatus, MSR, ...).
    pub flags: u64,
}

impl TaskContext {
    pub const fn zeroed() -> Self {
        Self {
            regs: [0; NR_CONTEXT_REGS],
            pc: 0,
            sp: 0,
            flags: 0,
        }
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// A register-sized IPC message, small enough for the no-copy fast path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IpcMessage {
    pub tag: u64,
    pub words: [u64; 6],
}

/// The operation vector implemented once per CPU family.
///
/// Addresses and sizes arrive unvalidated; backends return
/// [`Error::InvalidArgument`] for out-of-range input and never panic on it.
/// Page-flag arguments arrive already translated to the family encoding.
#[allow(unused_variables)]
pub trait Backend: Send + Sync {
    fn info(&self) -> BackendInfo;

    fn caps(&self) -> BackendCaps;

    // MMU

    fn mmu_init(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn mmu_map(&self, va: Vaddr, pa: Paddr, size: u64, arch_flags: u64) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn mmu_unmap(&self, va: Vaddr, size: u64) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn mmu_protect(&self, va: Vaddr, size: u64, arch_flags: u64) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Returns `None` if `va` is unmapped.
    fn mmu_translate(&self, va: Vaddr) -> Option<Paddr> {
        None
    }

    // Interrupts

    fn interrupt_init(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Registers `handler`, atomically replacing any existing one.
    fn interrupt_register(&self, irq: u32, handler: IrqHandler, data: usize) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn interrupt_unregister(&self, irq: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn interrupt_enable(&self, irq: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn interrupt_disable(&self, irq: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Acknowledges `irq`. Idempotent against a cleared pending state.
    fn interrupt_ack(&self, irq: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn interrupt_set_priority(&self, irq: u32, priority: u8) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn interrupt_is_pending(&self, irq: u32) -> Result<bool> {
        Err(Error::Unsupported)
    }

    // Timer

    fn timer_init(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn timer_set_interval(&self, interval_ns: u64) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Monotonic tick count; never decreases short of a documented wrap.
    fn timer_get_current(&self) -> Result<u64> {
        Err(Error::Unsupported)
    }

    fn timer_enable(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn timer_disable(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn timer_set_callback(&self, callback: TimerCallback) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn timer_frequency(&self) -> Result<u64> {
        Err(Error::Unsupported)
    }

    // Cache. Ranges are normalized to cache-line boundaries internally.

    fn cache_init(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn dcache_invalidate(&self, va: Vaddr, size: u64) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn dcache_clean(&self, va: Vaddr, size: u64) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn dcache_flush(&self, va: Vaddr, size: u64) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn icache_invalidate(&self, va: Vaddr, size: u64) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Global barrier making prior cache operations visible to other cores.
    fn cache_sync(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    // CPU

    fn cpu_init(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn cpu_id(&self) -> u32 {
        0
    }

    fn cpu_count(&self) -> u32 {
        1
    }

    /// Brings up a stopped, non-current CPU at `entry` with `stack`.
    fn cpu_start(&self, cpu: u32, entry: Vaddr, stack: Vaddr) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn cpu_stop(&self, cpu: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Idles the calling core until the next event.
    fn cpu_idle(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn cpu_features(&self) -> CpuFeatures {
        CpuFeatures::empty()
    }

    // Context. The only slots allowed to touch register state.

    /// Seeds a fresh context that enters `entry` on `stack`.
    fn context_init(&self, ctx: &mut TaskContext, entry: Vaddr, stack: Vaddr) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn context_save(&self, ctx: &mut TaskContext) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn context_restore(&self, ctx: &TaskContext) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Saves into `from` (absent for the initial switch) and loads `to`.
    fn context_switch(&self, from: Option<&mut TaskContext>, to: &TaskContext) -> Result<()> {
        Err(Error::Unsupported)
    }

    // IPC fast path. `ipc_setup` returning `Unsupported` sends callers to
    // the generic slow path.

    fn ipc_setup(&self, nr_ports: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn ipc_fast_send(&self, port: u32, msg: &IpcMessage) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn ipc_fast_recv(&self, port: u32) -> Result<IpcMessage> {
        Err(Error::Unsupported)
    }

    // Performance counters

    fn perf_init(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn perf_start(&self, counter: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn perf_stop(&self, counter: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn perf_read(&self, counter: u32) -> Result<u64> {
        Err(Error::Unsupported)
    }

    fn perf_set_event(&self, counter: u32, event: PerfEvent) -> Result<()> {
        Err(Error::Unsupported)
    }

    // Power

    fn power_init(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn power_set_state(&self, state: PowerState) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn power_get_state(&self) -> Result<PowerState> {
        Err(Error::Unsupported)
    }

    /// Suspends the calling core for at least `duration_ns`.
    fn power_sleep(&self, duration_ns: u64) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn power_wake(&self, cpu: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn power_set_frequency(&self, khz: u32) -> Result<()> {
        Err(Error::Unsupported)
    }

    // Secure

    fn secure_init(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    // Debug

    fn debug_init(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn debug_set_breakpoint(&self, va: Vaddr, kind: BreakpointKind) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn debug_clear_breakpoint(&self, va: Vaddr) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn debug_set_watchpoint(&self, va: Vaddr, len: u64, on_write: bool) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn debug_single_step(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn debug_resume(&self) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Escape hatch for family-unique operations.
    ///
    /// Unknown extension ids return [`Error::Unsupported`].
    fn extension_call(&self, ext: ArchExtension, args: &[u64]) -> Result<u64> {
        Err(Error::Unsupported)
    }
}
