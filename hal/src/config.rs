// SPDX-License-Identifier: MPL-2.0

//! Compile-time tunables of the dispatch core.

/// Maximum number of architecture backends the registry can hold.
pub const NR_ARCHS: usize = 16;

/// Number of general-purpose register slots in a saved task context.
///
/// Sized for the widest register file among the supported targets
/// (31 GPRs on aarch64 and riscv64, plus room for a few extras).
pub const NR_CONTEXT_REGS: usize = 32;

/// Iterations each probe runs in `HalManager::benchmark`.
pub const BENCH_ITERS: u32 = 64;

// Eight families ship today; the registry must hold them all at once.
static_assertions::const_assert!(NR_ARCHS >= 8);
// Enough slots for the widest callee-saved file plus link and frame.
static_assertions::const_assert!(NR_CONTEXT_REGS >= 20);
