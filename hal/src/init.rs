// SPDX-License-Identifier: MPL-2.0

//! Boot-time integration of the dispatch core.
//!
//! [`hal_init`] wires the manager, the detected backend, and the backend's
//! subsystem init slots together in a fixed order. Each completed step is
//! visible through [`HalManager::init_progress`]; the first failing step
//! aborts the sequence and surfaces its error unchanged.

use alloc::sync::Arc;

use bitflags::bitflags;

use crate::{
    arch,
    backend::Backend,
    platform::Platform,
    prelude::*,
    registry::HalManager,
};

bitflags! {
    /// The backend init slots that have completed, in boot order.
    pub struct InitProgress: u32 {
        const MMU    = 1 << 0;
        const IRQ    = 1 << 1;
        const TIMER  = 1 << 2;
        const CACHE  = 1 << 3;
        const CPU    = 1 << 4;
        const PERF   = 1 << 5;
        const POWER  = 1 << 6;
        const SECURE = 1 << 7;
        const DEBUG  = 1 << 8;
    }
}

/// Brings the dispatch core up on the detected architecture.
///
/// On success the manager is `Ready` and sealed; `hal_switch` is only
/// available to diagnostics that run before this returns.
pub fn hal_init(manager: &HalManager, plat: Arc<dyn Platform>) -> Result<()> {
    manager.init()?;
    let detected = manager.detect(&*plat)?;
    let backend = arch::new_backend(detected, plat);
    manager.register(backend)?;

    let backend = manager.current()?;
    type InitSlot = fn(&dyn Backend) -> Result<()>;
    let sequence: [(InitProgress, InitSlot); 9] = [
        (InitProgress::MMU, |b| b.mmu_init()),
        (InitProgress::IRQ, |b| b.interrupt_init()),
        (InitProgress::TIMER, |b| b.timer_init()),
        (InitProgress::CACHE, |b| b.cache_init()),
        (InitProgress::CPU, |b| b.cpu_init()),
        (InitProgress::PERF, |b| b.perf_init()),
        (InitProgress::POWER, |b| b.power_init()),
        (InitProgress::SECURE, |b| b.secure_init()),
        (InitProgress::DEBUG, |b| b.debug_init()),
    ];
    let mut progress = InitProgress::empty();
    for (step, op) in sequence {
        op(&*backend)?;
        progress |= step;
        manager.set_init_progress(progress);
    }
    manager.seal();
    log::debug!("hal: {} up", detected.name());
    Ok(())
}

/// Tears the dispatch core down. The inverse of [`hal_init`].
pub fn hal_shutdown(manager: &HalManager) -> Result<()> {
    manager.shutdown()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::TestPlatform;

    #[test]
    fn full_bring_up_reaches_every_slot() {
        let m = HalManager::new();
        hal_init(&m, Arc::new(TestPlatform::new())).unwrap();
        assert!(m.is_ready());
        assert_eq!(m.init_progress(), InitProgress::all());
        // Sealed: boot-time diagnostics are over.
        assert!(m.switch(crate::ArchId::X86_64).is_err());
    }

    #[test]
    fn shutdown_is_the_inverse() {
        let m = HalManager::new();
        hal_init(&m, Arc::new(TestPlatform::new())).unwrap();
        hal_shutdown(&m).unwrap();
        assert!(!m.is_ready());
        assert_eq!(m.init_progress(), InitProgress::empty());
    }
}
