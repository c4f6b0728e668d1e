// SPDX-License-Identifier: MPL-2.0

//! Compile-time tunables of the security kernel.

/// Capability slots in the pool.
pub const CAP_POOL_SIZE: usize = 4096;

/// Longest grant chain from a primary capability.
pub const MAX_DELEGATION_DEPTH: u8 = 10;

/// Per-process security context slots.
pub const CONTEXT_TABLE_SIZE: usize = 1024;

/// Audit ring capacity.
pub const AUDIT_RING_SIZE: usize = 4096;

/// Truncation bound of an audit description, in bytes.
pub const AUDIT_DESC_LEN: usize = 128;

/// Audit severity at and above which entries also hit the kernel log.
pub const AUDIT_LOG_SEVERITY: u8 = 7;

/// Entropy pool size in bytes.
pub const ENTROPY_POOL_SIZE: usize = 4096;

/// How often fresh hardware entropy is folded in.
pub const RESEED_INTERVAL_NS: u64 = 10_000_000_000;

/// CFI edge table capacity.
pub const CFI_TABLE_SIZE: usize = 1024;

/// Number of possible KASLR offsets.
pub const KASLR_SLOTS: u64 = 1 << 16;

/// KASLR offsets are 2 MiB aligned.
pub const KASLR_ALIGN: u64 = 0x20_0000;

/// Base of the KASLR-protected virtual window.
pub const KASLR_BASE: u64 = 0xffff_ffff_8000_0000;

/// Context defaults.
pub const DEFAULT_MEMORY_LIMIT: u64 = 512 * 1024 * 1024;
pub const DEFAULT_FILE_LIMIT: u32 = 1024;
pub const DEFAULT_SOCKET_LIMIT: u32 = 64;

/// Words in the denied-syscall bitmap (8 x 64 syscall numbers).
pub const SYSCALL_BITMAP_WORDS: usize = 8;

/// Severe violations a process survives before termination is requested.
pub const TERMINATE_THRESHOLD: u32 = 5;

/// Violation severity that counts toward termination and flips IDS alert.
pub const SEVERE_SEVERITY: u8 = 8;

/// Per-process violation severity that counts as severe for escalation.
pub const ESCALATION_SEVERITY: u8 = 9;

/// Quiet window after an alert before the next violation re-alerts.
pub const ALERT_WINDOW_NS: u64 = 1_000_000_000;
