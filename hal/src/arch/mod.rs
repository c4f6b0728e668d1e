// SPDX-License-Identifier: MPL-2.0

//! Architecture identification and the per-family backends.

pub mod aarch64;
pub mod armv7l;
pub(crate) mod common;
pub mod loongarch;
pub mod mips;
pub mod powerpc;
pub mod riscv64;
pub mod s390x;
pub mod x86_64;

use alloc::sync::Arc;

use int_to_c_enum::TryFromInt;

use crate::{backend::Backend, platform::Platform};

/// The closed set of CPU families Orion runs on.
#[allow(non_camel_case_types)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, TryFromInt)]
pub enum ArchId {
    X86_64 = 0,
    Aarch64 = 1,
    Riscv64 = 2,
    PowerPc = 3,
    LoongArch = 4,
    Mips = 5,
    Armv7l = 6,
    S390x = 7,
}

impl ArchId {
    pub const ALL: &'static [ArchId] = &[
        ArchId::X86_64,
        ArchId::Aarch64,
        ArchId::Riscv64,
        ArchId::PowerPc,
        ArchId::LoongArch,
        ArchId::Mips,
        ArchId::Armv7l,
        ArchId::S390x,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArchId::X86_64 => "x86_64",
            ArchId::Aarch64 => "aarch64",
            ArchId::Riscv64 => "riscv64",
            ArchId::PowerPc => "powerpc",
            ArchId::LoongArch => "loongarch",
            ArchId::Mips => "mips",
            ArchId::Armv7l => "armv7l",
            ArchId::S390x => "s390x",
        }
    }
}

/// The family this kernel was compiled for.
pub fn compiled_arch() -> ArchId {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "x86_64")] {
            ArchId::X86_64
        } else if #[cfg(target_arch = "aarch64")] {
            ArchId::Aarch64
        } else if #[cfg(target_arch = "riscv64")] {
            ArchId::Riscv64
        } else if #[cfg(target_arch = "powerpc64")] {
            ArchId::PowerPc
        } else if #[cfg(target_arch = "loongarch64")] {
            ArchId::LoongArch
        } else if #[cfg(any(target_arch = "mips", target_arch = "mips64"))] {
            ArchId::Mips
        } else if #[cfg(target_arch = "arm")] {
            ArchId::Armv7l
        } else if #[cfg(target_arch = "s390x")] {
            ArchId::S390x
        } else {
            compile_error!("no Orion backend for this build target");
        }
    }
}

/// Constructs the backend for `arch`.
pub fn new_backend(arch: ArchId, plat: Arc<dyn Platform>) -> Arc<dyn Backend> {
    match arch {
        ArchId::X86_64 => Arc::new(x86_64::X86Backend::new(plat)),
        ArchId::Aarch64 => Arc::new(aarch64::Aarch64Backend::new(plat)),
        ArchId::Riscv64 => Arc::new(riscv64::Riscv64Backend::new(plat)),
        ArchId::PowerPc => Arc::new(powerpc::PowerPcBackend::new(plat)),
        ArchId::LoongArch => Arc::new(loongarch::LoongArchBackend::new(plat)),
        ArchId::Mips => Arc::new(mips::MipsBackend::new(plat)),
        ArchId::Armv7l => Arc::new(armv7l::Armv7Backend::new(plat)),
        ArchId::S390x => Arc::new(s390x::S390Backend::new(plat)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        backend::{BackendCaps, PerfEvent, PowerState},
        testing::TestPlatform,
    };

    fn platforms() -> Arc<dyn Platform> {
        Arc::new(TestPlatform::new())
    }

    #[test]
    fn every_family_has_a_backend() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            assert_eq!(b.info().arch, arch);
            assert_eq!(b.info().name, arch.name());
        }
    }

    #[test]
    fn mapping_contract_holds_on_every_family() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            b.mmu_init().unwrap();
            let flags = crate::mm::to_arch(
                crate::mm::PageFlags::PRESENT | crate::mm::PageFlags::WRITABLE,
                arch,
            );
            b.mmu_map(0x10_0000, 0x20_0000, 0x4000, flags).unwrap();
            // Idempotent remap.
            b.mmu_map(0x10_0000, 0x20_0000, 0x4000, flags).unwrap();
            // Overlap is refused.
            assert!(b.mmu_map(0x10_1000, 0x30_0000, 0x1000, flags).is_err());
            assert_eq!(b.mmu_translate(0x10_1008), Some(0x20_1008));
            // Unaligned input is an argument error.
            assert!(matches!(
                b.mmu_map(0x10_0001, 0x20_0000, 0x1000, flags),
                Err(crate::Error::InvalidArgument)
            ));
            b.mmu_unmap(0x10_0000, 0x4000).unwrap();
            assert_eq!(b.mmu_translate(0x10_1008), None);
        }
    }

    #[test]
    fn irq_bounds_are_enforced_per_family() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            b.interrupt_init().unwrap();
            fn nop(_irq: u32, _data: usize) {}
            b.interrupt_register(1, nop, 0).unwrap();
            b.interrupt_enable(1).unwrap();
            assert!(matches!(
                b.interrupt_register(u32::MAX, nop, 0),
                Err(crate::Error::InvalidArgument)
            ));
            // Double ack against a cleared pending state.
            b.interrupt_ack(1).unwrap();
            b.interrupt_ack(1).unwrap();
            assert!(!b.interrupt_is_pending(1).unwrap());
        }
    }

    #[test]
    fn timer_interval_bounds_and_monotonic_ticks() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            b.timer_init().unwrap();
            assert!(b.timer_set_interval(1).is_err());
            b.timer_set_interval(1_000_000).unwrap();
            b.timer_enable().unwrap();
            let t0 = b.timer_get_current().unwrap();
            let t1 = b.timer_get_current().unwrap();
            assert!(t1 >= t0);
            assert!(b.timer_frequency().unwrap() > 0);
        }
    }

    #[test]
    fn cpu_start_rejects_running_cpus() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            b.cpu_init().unwrap();
            assert!(matches!(
                b.cpu_start(0, 0x1000, 0x2000),
                Err(crate::Error::AlreadyExists)
            ));
            if b.cpu_count() > 1 {
                b.cpu_start(1, 0x1000, 0x2000).unwrap();
                assert!(matches!(
                    b.cpu_start(1, 0x1000, 0x2000),
                    Err(crate::Error::AlreadyExists)
                ));
                b.cpu_stop(1).unwrap();
            }
            assert!(b.cpu_start(b.cpu_count(), 0x1000, 0x2000).is_err());
        }
    }

    #[test]
    fn context_switch_round_trips() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            let mut a = Default::default();
            b.context_init(&mut a, 0x40_0000, 0x80_0000).unwrap();
            b.context_restore(&a).unwrap();
            let mut saved = Default::default();
            let mut other = Default::default();
            b.context_init(&mut other, 0x41_0000, 0x90_0000).unwrap();
            b.context_switch(Some(&mut saved), &other).unwrap();
            assert_eq!(saved, a);
            let mut now = Default::default();
            b.context_save(&mut now).unwrap();
            assert_eq!(now, other);
        }
    }

    #[test]
    fn perf_counters_are_bounded() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            b.perf_init().unwrap();
            b.perf_set_event(0, PerfEvent::Instructions).unwrap();
            b.perf_start(0).unwrap();
            b.perf_stop(0).unwrap();
            assert!(b.perf_read(0).is_ok());
            assert!(matches!(
                b.perf_start(10_000),
                Err(crate::Error::InvalidArgument)
            ));
        }
    }

    #[test]
    fn power_states_and_sleep() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            b.power_init().unwrap();
            b.power_set_state(PowerState::Standby).unwrap();
            assert_eq!(b.power_get_state().unwrap(), PowerState::Standby);
            b.power_sleep(1_000).unwrap();
            assert!(b.power_set_frequency(0).is_err());
            assert!(b.power_wake(b.cpu_count()).is_err());
        }
    }

    #[test]
    fn ipc_fast_path_only_where_advertised() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            let advertised = b.caps().contains(BackendCaps::IPC_FAST);
            match b.ipc_setup(4) {
                Ok(()) => {
                    assert!(advertised);
                    let msg = crate::backend::IpcMessage {
                        tag: 7,
                        words: [1, 2, 3, 4, 5, 6],
                    };
                    b.ipc_fast_send(2, &msg).unwrap();
                    // The slot holds a single message.
                    assert!(matches!(b.ipc_fast_send(2, &msg), Err(crate::Error::Busy)));
                    assert_eq!(b.ipc_fast_recv(2).unwrap(), msg);
                    assert!(matches!(b.ipc_fast_recv(2), Err(crate::Error::Busy)));
                }
                Err(crate::Error::Unsupported) => assert!(!advertised),
                Err(e) => panic!("unexpected ipc_setup error {e:?}"),
            }
        }
    }

    #[test]
    fn unknown_extension_ids_are_unsupported() {
        for &arch in ArchId::ALL {
            let b = new_backend(arch, platforms());
            b.debug_init().unwrap();
            b.debug_set_breakpoint(0x5000, crate::backend::BreakpointKind::Software)
                .unwrap();
            b.debug_clear_breakpoint(0x5000).unwrap();
            // Crypto is genuinely absent on some families.
            match b.extension_call(crate::backend::ArchExtension::CryptoStatus, &[]) {
                Ok(_) | Err(crate::Error::Unsupported) => {}
                Err(e) => panic!("unexpected extension error {e:?}"),
            }
        }
    }
}
