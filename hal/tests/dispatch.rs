// SPDX-License-Identifier: MPL-2.0

//! End-to-end dispatch scenarios against real backends.

use std::sync::Arc;

use orion_hal::{
    arch::{self, ArchId},
    hal_init, hal_shutdown,
    testing::TestPlatform,
    Backend, Error, HalManager, InitProgress, PageFlags,
};

/// Some family other than `arch`, for two-backend scenarios.
fn other_arch(arch: ArchId) -> ArchId {
    if arch == ArchId::X86_64 {
        ArchId::Aarch64
    } else {
        ArchId::X86_64
    }
}

#[test]
fn registry_happy_path() {
    let plat = Arc::new(TestPlatform::new());
    let manager = HalManager::new();
    manager.init().unwrap();

    let native = manager.detect(&*plat).unwrap();
    let second = other_arch(native);

    manager
        .register(arch::new_backend(native, plat.clone()))
        .unwrap();
    manager
        .register(arch::new_backend(second, plat.clone()))
        .unwrap();

    assert_eq!(manager.detected(), Some(native));
    assert_eq!(manager.current().unwrap().info().arch, native);

    manager.switch(second).unwrap();
    assert_eq!(manager.current().unwrap().info().arch, second);

    manager.switch(native).unwrap();
    assert_eq!(manager.current().unwrap().info().arch, native);
}

#[test]
fn boot_runs_the_init_slots_in_order() {
    let plat = Arc::new(TestPlatform::new());
    let manager = HalManager::new();
    hal_init(&manager, plat.clone()).unwrap();

    assert!(manager.is_ready());
    assert_eq!(manager.init_progress(), InitProgress::all());
    assert_eq!(
        manager.current().unwrap().info().arch,
        manager.detected().unwrap()
    );

    // Booting twice is harmless for the manager but the backend tag is
    // already taken.
    assert!(matches!(
        hal_init(&manager, plat),
        Err(Error::AlreadyExists)
    ));

    hal_shutdown(&manager).unwrap();
    assert!(!manager.is_ready());
}

#[test]
fn switching_is_a_boot_time_diagnostic() {
    let plat = Arc::new(TestPlatform::new());
    let manager = HalManager::new();
    hal_init(&manager, plat).unwrap();

    let elsewhere = other_arch(manager.detected().unwrap());
    assert!(matches!(manager.switch(elsewhere), Err(Error::InvalidState)));
}

#[test]
fn dispatch_requires_ready() {
    let manager = HalManager::new();
    assert!(matches!(
        manager.mmu_map(0x1000, 0x2000, 0x1000, PageFlags::PRESENT),
        Err(Error::InvalidState)
    ));
    assert_eq!(manager.mmu_translate(0x1000), None);
}

#[test]
fn generic_flags_round_trip_through_dispatch() {
    let plat = Arc::new(TestPlatform::new());
    let manager = HalManager::new();
    hal_init(&manager, plat).unwrap();

    let flags = PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER;
    manager.mmu_map(0x70_0000, 0x100_0000, 0x2000, flags).unwrap();
    assert_eq!(manager.mmu_translate(0x70_0a00), Some(0x100_0a00));

    manager
        .mmu_protect(0x70_0000, 0x2000, PageFlags::PRESENT)
        .unwrap();
    manager.mmu_unmap(0x70_0000, 0x2000).unwrap();
    assert_eq!(manager.mmu_translate(0x70_0a00), None);
}
