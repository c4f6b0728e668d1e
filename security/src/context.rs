// SPDX-License-Identifier: MPL-2.0

//! Per-process security contexts.
//!
//! A fixed table with first-free-slot placement and no eviction: a full
//! table refuses creation. Contexts are torn down explicitly, after the
//! capability pool has swept the owner's capabilities; nothing recycles a
//! slot behind a live process.

use alloc::{boxed::Box, vec::Vec};
use core::sync::atomic::{AtomicU32, Ordering};

use bit_field::BitField;
use id_alloc::IdAlloc;
use spin::Mutex;

use orion_hal::{Error, Result};

use crate::{
    cap::SecLevel,
    config::{
        CONTEXT_TABLE_SIZE, DEFAULT_FILE_LIMIT, DEFAULT_MEMORY_LIMIT, DEFAULT_SOCKET_LIMIT,
        SYSCALL_BITMAP_WORDS,
    },
    sched::Pid,
};

const NO_PID: u32 = u32::MAX;
const NR_SYSCALLS: u32 = (SYSCALL_BITMAP_WORDS * 64) as u32;

/// The mutable body of a context, guarded by the slot lock.
#[derive(Clone, Copy, Debug)]
pub struct SecurityContext {
    pub pid: Pid,
    pub level: SecLevel,
    /// Bitmap over [`crate::cap::CapType`] discriminants the process holds.
    pub cap_types: u64,
    pub denied_syscalls: [u64; SYSCALL_BITMAP_WORDS],
    pub memory_limit: u64,
    pub file_limit: u32,
    pub socket_limit: u32,
    pub sandboxed: bool,
    /// Object id of the jail root directory; zero means none.
    pub jail_root: u64,
    pub created_at: u64,
}

struct ContextSlot {
    pid: AtomicU32,
    violations: AtomicU32,
    severe_violations: AtomicU32,
    inner: Mutex<SecurityContext>,
}

pub struct ContextTable {
    /// Also serializes creation, so a pid cannot land in two slots.
    alloc: Mutex<IdAlloc>,
    slots: Box<[ContextSlot]>,
}

impl ContextTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(CONTEXT_TABLE_SIZE);
        slots.resize_with(CONTEXT_TABLE_SIZE, || ContextSlot {
            pid: AtomicU32::new(NO_PID),
            violations: AtomicU32::new(0),
            severe_violations: AtomicU32::new(0),
            inner: Mutex::new(SecurityContext {
                pid: 0,
                level: SecLevel::Public,
                cap_types: 0,
                denied_syscalls: [0; SYSCALL_BITMAP_WORDS],
                memory_limit: 0,
                file_limit: 0,
                socket_limit: 0,
                sandboxed: false,
                jail_root: 0,
                created_at: 0,
            }),
        });
        Self {
            alloc: Mutex::new(IdAlloc::with_capacity(CONTEXT_TABLE_SIZE)),
            slots: slots.into_boxed_slice(),
        }
    }

    fn index_of(&self, pid: Pid) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.pid.load(Ordering::Acquire) == pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        pid != NO_PID && self.index_of(pid).is_some()
    }

    /// Creates a context for `pid` if it has none.
    pub fn ensure(&self, pid: Pid, level: SecLevel, now: u64) -> Result<()> {
        if pid == NO_PID {
            return Err(Error::InvalidArgument);
        }
        let mut alloc = self.alloc.lock();
        if self.index_of(pid).is_some() {
            return Ok(());
        }
        let idx = alloc.alloc().ok_or(Error::OutOfMemory)?;
        let slot = &self.slots[idx];
        {
            let mut inner = slot.inner.lock();
            *inner = SecurityContext {
                pid,
                level,
                cap_types: 0,
                denied_syscalls: [0; SYSCALL_BITMAP_WORDS],
                memory_limit: DEFAULT_MEMORY_LIMIT,
                file_limit: DEFAULT_FILE_LIMIT,
                socket_limit: DEFAULT_SOCKET_LIMIT,
                sandboxed: level >= SecLevel::Restricted,
                jail_root: 0,
                created_at: now,
            };
        }
        slot.violations.store(0, Ordering::Relaxed);
        slot.severe_violations.store(0, Ordering::Relaxed);
        slot.pid.store(pid, Ordering::Release);
        Ok(())
    }

    /// Runs `f` against the context body of `pid`.
    pub fn with<R>(&self, pid: Pid, f: impl FnOnce(&mut SecurityContext) -> R) -> Option<R> {
        let idx = self.index_of(pid)?;
        let slot = &self.slots[idx];
        let mut inner = slot.inner.lock();
        // The slot may have been retired between lookup and lock.
        if slot.pid.load(Ordering::Acquire) != pid {
            return None;
        }
        Some(f(&mut inner))
    }

    pub fn deny_syscall(&self, pid: Pid, num: u32) -> Result<()> {
        if num >= NR_SYSCALLS {
            return Err(Error::InvalidArgument);
        }
        self.with(pid, |ctx| {
            ctx.denied_syscalls[(num / 64) as usize].set_bit((num % 64) as usize, true);
        })
        .ok_or(Error::NotFound)
    }

    pub fn permit_syscall(&self, pid: Pid, num: u32) -> Result<()> {
        if num >= NR_SYSCALLS {
            return Err(Error::InvalidArgument);
        }
        self.with(pid, |ctx| {
            ctx.denied_syscalls[(num / 64) as usize].set_bit((num % 64) as usize, false);
        })
        .ok_or(Error::NotFound)
    }

    /// Whether `pid` has `num` denied. Unknown pids and out-of-range
    /// numbers are not denied; absence means allow-by-default.
    pub fn is_syscall_denied(&self, pid: Pid, num: u32) -> bool {
        if num >= NR_SYSCALLS {
            return false;
        }
        self.with(pid, |ctx| {
            ctx.denied_syscalls[(num / 64) as usize].get_bit((num % 64) as usize)
        })
        .unwrap_or(false)
    }

    /// Bumps the violation counters; returns (total, severe).
    pub fn record_violation(&self, pid: Pid, severe: bool) -> Option<(u32, u32)> {
        let idx = self.index_of(pid)?;
        let slot = &self.slots[idx];
        let total = slot.violations.fetch_add(1, Ordering::AcqRel) + 1;
        let severe_count = if severe {
            slot.severe_violations.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            slot.severe_violations.load(Ordering::Acquire)
        };
        Some((total, severe_count))
    }

    pub fn violations(&self, pid: Pid) -> Option<u32> {
        let idx = self.index_of(pid)?;
        Some(self.slots[idx].violations.load(Ordering::Acquire))
    }

    /// Retires the context of `pid`.
    ///
    /// The caller must have swept the pid's capabilities first.
    pub fn remove(&self, pid: Pid) -> Result<()> {
        let mut alloc = self.alloc.lock();
        let idx = self.index_of(pid).ok_or(Error::NotFound)?;
        self.slots[idx].pid.store(NO_PID, Ordering::Release);
        alloc.free(idx);
        Ok(())
    }
}

impl Default for ContextTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn creation_applies_the_defaults() {
        let table = ContextTable::new();
        table.ensure(42, SecLevel::Restricted, 5).unwrap();
        table
            .with(42, |ctx| {
                assert_eq!(ctx.memory_limit, DEFAULT_MEMORY_LIMIT);
                assert_eq!(ctx.file_limit, DEFAULT_FILE_LIMIT);
                assert_eq!(ctx.socket_limit, DEFAULT_SOCKET_LIMIT);
                assert!(ctx.sandboxed);
                assert_eq!(ctx.created_at, 5);
            })
            .unwrap();
        table.ensure(43, SecLevel::Public, 6).unwrap();
        assert_eq!(table.with(43, |ctx| ctx.sandboxed), Some(false));
    }

    #[test]
    fn ensure_is_idempotent_per_pid() {
        let table = ContextTable::new();
        table.ensure(7, SecLevel::Public, 1).unwrap();
        table.deny_syscall(7, 3).unwrap();
        table.ensure(7, SecLevel::TopSecret, 2).unwrap();
        // The original context survives.
        assert!(table.is_syscall_denied(7, 3));
        assert_eq!(table.with(7, |ctx| ctx.level), Some(SecLevel::Public));
    }

    #[test]
    fn syscall_bitmap_spans_all_words() {
        let table = ContextTable::new();
        table.ensure(1, SecLevel::Public, 0).unwrap();
        for num in [0, 63, 64, 200, NR_SYSCALLS - 1] {
            table.deny_syscall(1, num).unwrap();
            assert!(table.is_syscall_denied(1, num));
            table.permit_syscall(1, num).unwrap();
            assert!(!table.is_syscall_denied(1, num));
        }
        assert!(table.deny_syscall(1, NR_SYSCALLS).is_err());
        assert!(!table.is_syscall_denied(1, NR_SYSCALLS));
    }

    #[test]
    fn full_table_refuses_creation() {
        let table = ContextTable::new();
        for pid in 0..CONTEXT_TABLE_SIZE as u32 {
            table.ensure(pid, SecLevel::Public, 0).unwrap();
        }
        assert!(matches!(
            table.ensure(999_999, SecLevel::Public, 0),
            Err(Error::OutOfMemory)
        ));
        // Teardown frees a slot for reuse.
        table.remove(0).unwrap();
        table.ensure(999_999, SecLevel::Public, 0).unwrap();
    }

    #[test]
    fn violation_counters_accumulate() {
        let table = ContextTable::new();
        table.ensure(9, SecLevel::Public, 0).unwrap();
        assert_eq!(table.record_violation(9, false), Some((1, 0)));
        assert_eq!(table.record_violation(9, true), Some((2, 1)));
        assert_eq!(table.violations(9), Some(2));
        assert_eq!(table.record_violation(12345, false), None);
    }
}
