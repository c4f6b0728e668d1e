// SPDX-License-Identifier: MPL-2.0

//! The backend registry and dispatch manager.
//!
//! At most one backend is *current*; only the current backend receives
//! dispatched operations, and only while the manager is in the `Ready`
//! state. Page flags are translated to the family encoding here, so
//! backends never see a generic bit; everything else of the operation
//! vector is reached through [`HalManager::current`].
//!
//! Lifecycle: `Uninitialized → Initializing → Ready ↔ Switching`, driven
//! by the boot path (or a management thread) only. Once the manager is
//! sealed at the end of boot, `switch` is refused: re-pointing dispatch at
//! a foreign backend on a running system is a diagnostics-only affair.

use alloc::{sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use spin::RwLock;

use crate::{
    arch::{self, ArchId},
    backend::{Backend, BackendCaps},
    config::{BENCH_ITERS, NR_ARCHS},
    init::InitProgress,
    mm::{self, PageFlags},
    platform::Platform,
    prelude::*,
};

const NO_CURRENT: usize = usize::MAX;
const NO_DETECTED: u32 = u32::MAX;

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, int_to_c_enum::TryFromInt)]
enum ManagerState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Switching = 3,
}

/// Timing of the cheap dispatch slots, in nanoseconds per call.
#[derive(Clone, Copy, Debug, Default)]
pub struct BenchReport {
    pub translate_ns: u64,
    pub cpu_id_ns: u64,
    pub timer_read_ns: u64,
}

pub struct HalManager {
    state: AtomicU32,
    sealed: AtomicBool,
    detected: AtomicU32,
    init_progress: AtomicU32,
    current: AtomicUsize,
    backends: RwLock<Vec<Arc<dyn Backend>>>,
}

impl HalManager {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(ManagerState::Uninitialized as u32),
            sealed: AtomicBool::new(false),
            detected: AtomicU32::new(NO_DETECTED),
            init_progress: AtomicU32::new(0),
            current: AtomicUsize::new(NO_CURRENT),
            backends: RwLock::new(Vec::new()),
        }
    }

    fn state(&self) -> ManagerState {
        // The atomic only ever holds discriminants of `ManagerState`.
        ManagerState::try_from(self.state.load(Ordering::Acquire))
            .unwrap_or(ManagerState::Uninitialized)
    }

    /// Starts the one-shot lifecycle. Idempotent: calling it again after
    /// initialization has begun (or completed) succeeds without effect.
    pub fn init(&self) -> Result<()> {
        let _ = self.state.compare_exchange(
            ManagerState::Uninitialized as u32,
            ManagerState::Initializing as u32,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        Ok(())
    }

    /// Tears the registry down to its boot-time state.
    pub fn shutdown(&self) -> Result<()> {
        self.backends.write().clear();
        self.current.store(NO_CURRENT, Ordering::Release);
        self.detected.store(NO_DETECTED, Ordering::Release);
        self.init_progress.store(0, Ordering::Release);
        self.sealed.store(false, Ordering::Release);
        self.state
            .store(ManagerState::Uninitialized as u32, Ordering::Release);
        Ok(())
    }

    /// Identifies the running architecture.
    ///
    /// The hardware probe is authoritative; a disagreement with the
    /// compile-time constant is loud, because it means the image was
    /// booted on the wrong machine.
    pub fn detect(&self, plat: &dyn Platform) -> Result<ArchId> {
        if self.state() == ManagerState::Uninitialized {
            return Err(Error::InvalidState);
        }
        let probed = plat.probe_architecture();
        let compiled = arch::compiled_arch();
        if probed != compiled {
            log::warn!(
                "architecture probe says {} but this image targets {}",
                probed.name(),
                compiled.name()
            );
        }
        self.detected.store(probed as u32, Ordering::Release);
        Ok(probed)
    }

    pub fn detected(&self) -> Option<ArchId> {
        ArchId::try_from(self.detected.load(Ordering::Acquire)).ok()
    }

    /// Adds a backend. The first registration becomes the current backend
    /// and moves the manager to `Ready`.
    pub fn register(&self, backend: Arc<dyn Backend>) -> Result<()> {
        if self.state() == ManagerState::Uninitialized {
            return Err(Error::InvalidState);
        }
        let mut backends = self.backends.write();
        if backends.len() >= NR_ARCHS {
            return Err(Error::OutOfMemory);
        }
        let info = backend.info();
        if backends
            .iter()
            .any(|b| b.info().arch == info.arch || b.info().name == info.name)
        {
            return Err(Error::AlreadyExists);
        }
        backends.push(backend);
        if backends.len() == 1 {
            self.current.store(0, Ordering::Release);
            self.state
                .store(ManagerState::Ready as u32, Ordering::Release);
        }
        Ok(())
    }

    pub fn current(&self) -> Result<Arc<dyn Backend>> {
        let idx = self.current.load(Ordering::Acquire);
        if idx == NO_CURRENT {
            return Err(Error::NoArch);
        }
        let backends = self.backends.read();
        backends.get(idx).cloned().ok_or(Error::NoArch)
    }

    pub fn get(&self, arch: ArchId) -> Result<Arc<dyn Backend>> {
        let backends = self.backends.read();
        backends
            .iter()
            .find(|b| b.info().arch == arch)
            .cloned()
            .ok_or(Error::UnsupportedArch)
    }

    /// Re-points dispatch at another registered backend.
    ///
    /// Refused once the manager is sealed: post-boot switching is
    /// diagnostics-only.
    pub fn switch(&self, arch: ArchId) -> Result<()> {
        if self.sealed.load(Ordering::Acquire) {
            return Err(Error::InvalidState);
        }
        self.state
            .compare_exchange(
                ManagerState::Ready as u32,
                ManagerState::Switching as u32,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| Error::InvalidState)?;
        let result = {
            let backends = self.backends.read();
            match backends.iter().position(|b| b.info().arch == arch) {
                Some(idx) => {
                    self.current.store(idx, Ordering::Release);
                    Ok(())
                }
                None => Err(Error::UnsupportedArch),
            }
        };
        self.state
            .store(ManagerState::Ready as u32, Ordering::Release);
        result
    }

    /// Closes the boot window; `switch` fails from here on.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ManagerState::Ready
    }

    fn ready_backend(&self) -> Result<Arc<dyn Backend>> {
        if !self.is_ready() {
            return Err(Error::InvalidState);
        }
        self.current()
    }

    pub(crate) fn set_init_progress(&self, progress: InitProgress) {
        self.init_progress
            .store(progress.bits(), Ordering::Release);
    }

    /// Which backend init slots have completed, for the boot observer.
    pub fn init_progress(&self) -> InitProgress {
        InitProgress::from_bits_truncate(self.init_progress.load(Ordering::Acquire))
    }

    // The dispatch entry. Page flags are translated here; the rest of the
    // operation vector is reached through `current()`.

    pub fn mmu_map(&self, va: Vaddr, pa: Paddr, size: u64, flags: PageFlags) -> Result<()> {
        let b = self.ready_backend()?;
        let arch = b.info().arch;
        b.mmu_map(va, pa, size, mm::to_arch(flags, arch))
    }

    pub fn mmu_unmap(&self, va: Vaddr, size: u64) -> Result<()> {
        self.ready_backend()?.mmu_unmap(va, size)
    }

    pub fn mmu_protect(&self, va: Vaddr, size: u64, flags: PageFlags) -> Result<()> {
        let b = self.ready_backend()?;
        let arch = b.info().arch;
        b.mmu_protect(va, size, mm::to_arch(flags, arch))
    }

    pub fn mmu_translate(&self, va: Vaddr) -> Option<Paddr> {
        self.ready_backend().ok()?.mmu_translate(va)
    }

    /// Times the cheap dispatch slots of the current backend.
    pub fn benchmark(&self, plat: &dyn Platform) -> Result<BenchReport> {
        let b = self.ready_backend()?;
        let time = |op: &dyn Fn()| {
            let t0 = plat.now_monotonic();
            for _ in 0..BENCH_ITERS {
                op();
            }
            (plat.now_monotonic() - t0) / u64::from(BENCH_ITERS)
        };
        Ok(BenchReport {
            translate_ns: time(&|| {
                let _ = b.mmu_translate(0x1000);
            }),
            cpu_id_ns: time(&|| {
                let _ = b.cpu_id();
            }),
            timer_read_ns: time(&|| {
                let _ = b.timer_get_current();
            }),
        })
    }

    /// Logs which operation groups of the current backend are real.
    pub fn report_capabilities(&self) -> Result<BackendCaps> {
        let b = self.ready_backend()?;
        let caps = b.caps();
        let groups = [
            (BackendCaps::MMU, "mmu"),
            (BackendCaps::IRQ, "irq"),
            (BackendCaps::TIMER, "timer"),
            (BackendCaps::CACHE, "cache"),
            (BackendCaps::SMP, "smp"),
            (BackendCaps::CONTEXT, "context"),
            (BackendCaps::IPC_FAST, "ipc-fast"),
            (BackendCaps::PERF, "perf"),
            (BackendCaps::POWER, "power"),
            (BackendCaps::SECURE, "secure"),
            (BackendCaps::DEBUG, "debug"),
            (BackendCaps::VECTOR, "vector"),
        ];
        for (bit, name) in groups {
            log::debug!(
                "hal: {} {}",
                name,
                if caps.contains(bit) { "ok" } else { "stub" }
            );
        }
        Ok(caps)
    }
}

impl Default for HalManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::TestPlatform;

    fn ready_manager() -> (HalManager, Arc<TestPlatform>) {
        let plat = Arc::new(TestPlatform::new());
        let m = HalManager::new();
        m.init().unwrap();
        m.register(arch::new_backend(ArchId::X86_64, plat.clone()))
            .unwrap();
        (m, plat)
    }

    #[test]
    fn init_is_idempotent() {
        let m = HalManager::new();
        m.init().unwrap();
        m.init().unwrap();
        assert!(!m.is_ready());
    }

    #[test]
    fn registration_requires_init() {
        let plat = Arc::new(TestPlatform::new());
        let m = HalManager::new();
        assert!(matches!(
            m.register(arch::new_backend(ArchId::X86_64, plat)),
            Err(Error::InvalidState)
        ));
    }

    #[test]
    fn first_registration_becomes_current() {
        let (m, plat) = ready_manager();
        assert!(m.is_ready());
        assert_eq!(m.current().unwrap().info().arch, ArchId::X86_64);
        m.register(arch::new_backend(ArchId::Aarch64, plat)).unwrap();
        assert_eq!(m.current().unwrap().info().arch, ArchId::X86_64);
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let (m, plat) = ready_manager();
        assert!(matches!(
            m.register(arch::new_backend(ArchId::X86_64, plat)),
            Err(Error::AlreadyExists)
        ));
    }

    #[test]
    fn all_families_register_side_by_side() {
        let (m, plat) = ready_manager();
        for &a in ArchId::ALL.iter().skip(1) {
            m.register(arch::new_backend(a, plat.clone())).unwrap();
        }
        for &a in ArchId::ALL {
            assert_eq!(m.get(a).unwrap().info().arch, a);
        }
    }

    #[test]
    fn switch_and_seal() {
        let (m, plat) = ready_manager();
        m.register(arch::new_backend(ArchId::Riscv64, plat)).unwrap();
        assert!(matches!(m.switch(ArchId::Mips), Err(Error::UnsupportedArch)));
        m.switch(ArchId::Riscv64).unwrap();
        assert_eq!(m.current().unwrap().info().arch, ArchId::Riscv64);
        assert!(m.is_ready());
        m.seal();
        assert!(matches!(m.switch(ArchId::X86_64), Err(Error::InvalidState)));
    }

    #[test]
    fn dispatch_translates_generic_flags() {
        let (m, _plat) = ready_manager();
        m.current().unwrap().mmu_init().unwrap();
        m.mmu_map(
            0x40_0000,
            0x80_0000,
            0x1000,
            PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::KERNEL,
        )
        .unwrap();
        assert_eq!(m.mmu_translate(0x40_0010), Some(0x80_0010));
        m.mmu_unmap(0x40_0000, 0x1000).unwrap();
        assert_eq!(m.mmu_translate(0x40_0010), None);
    }

    #[test]
    fn detect_prefers_the_probe() {
        let (m, plat) = ready_manager();
        let arch = m.detect(&*plat).unwrap();
        assert_eq!(m.detected(), Some(arch));
    }

    #[test]
    fn benchmark_and_capability_report() {
        let (m, plat) = ready_manager();
        let report = m.benchmark(&*plat).unwrap();
        // The deterministic test clock always advances.
        assert!(report.translate_ns > 0);
        let caps = m.report_capabilities().unwrap();
        assert!(caps.contains(BackendCaps::MMU));
    }

    #[test]
    fn shutdown_returns_to_uninitialized() {
        let (m, _plat) = ready_manager();
        m.shutdown().unwrap();
        assert!(matches!(m.current(), Err(Error::NoArch)));
        assert!(!m.is_ready());
    }
}
