// SPDX-License-Identifier: MPL-2.0

//! The append-only audit ring.
//!
//! Writers claim a sequence number with one atomic add and store their
//! record in the slot it names; a full ring silently overwrites the
//! oldest entries. Records carry their sequence number so a reader can
//! tell how much of a snapshot survived the writers racing past it.

use alloc::{boxed::Box, vec::Vec};
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::{
    config::{AUDIT_DESC_LEN, AUDIT_LOG_SEVERITY, AUDIT_RING_SIZE},
    sched::{Pid, Tid},
};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, int_to_c_enum::TryFromInt)]
pub enum AuditEvent {
    CapCreate = 0,
    CapGrant = 1,
    CapRevoke = 2,
    CapAccess = 3,
    CapViolation = 4,
    SyscallDenied = 5,
    MemoryViolation = 6,
    SecurityBreach = 7,
}

/// A fixed-size, truncating description.
#[derive(Clone, Copy)]
pub struct AuditDesc {
    bytes: [u8; AUDIT_DESC_LEN],
    len: u8,
}

static_assertions::const_assert!(AUDIT_DESC_LEN <= u8::MAX as usize);

impl AuditDesc {
    pub const fn empty() -> Self {
        Self {
            bytes: [0; AUDIT_DESC_LEN],
            len: 0,
        }
    }

    pub fn new(text: &str) -> Self {
        let mut take = text.len().min(AUDIT_DESC_LEN);
        while !text.is_char_boundary(take) {
            take -= 1;
        }
        let mut bytes = [0; AUDIT_DESC_LEN];
        bytes[..take].copy_from_slice(&text.as_bytes()[..take]);
        Self {
            bytes,
            len: take as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl core::fmt::Debug for AuditDesc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AuditRecord {
    pub seq: u64,
    pub timestamp: u64,
    pub pid: Pid,
    pub tid: Tid,
    pub event: AuditEvent,
    pub severity: u8,
    pub cap_id: u64,
    pub object_id: u64,
    pub result: i64,
    pub desc: AuditDesc,
}

impl AuditRecord {
    const fn unwritten() -> Self {
        Self {
            seq: u64::MAX,
            timestamp: 0,
            pid: 0,
            tid: 0,
            event: AuditEvent::CapCreate,
            severity: 0,
            cap_id: 0,
            object_id: 0,
            result: 0,
            desc: AuditDesc::empty(),
        }
    }
}

pub struct AuditRing {
    head: AtomicU64,
    slots: Box<[Mutex<AuditRecord>]>,
}

impl AuditRing {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(AUDIT_RING_SIZE);
        slots.resize_with(AUDIT_RING_SIZE, || Mutex::new(AuditRecord::unwritten()));
        Self {
            head: AtomicU64::new(0),
            slots: slots.into_boxed_slice(),
        }
    }

    /// Entries written so far (monotonic; not bounded by capacity).
    pub fn head(&self) -> u64 {
        self.head.load(Ordering::Acquire)
    }

    /// Appends `record`, assigning its sequence number.
    pub fn push(&self, mut record: AuditRecord) -> u64 {
        let seq = self.head.fetch_add(1, Ordering::AcqRel);
        record.seq = seq;
        if record.severity >= AUDIT_LOG_SEVERITY {
            log::warn!(
                "audit: {:?} sev {} pid {} cap {:#x}: {}",
                record.event,
                record.severity,
                record.pid,
                record.cap_id,
                record.desc.as_str()
            );
        }
        *self.slots[(seq % AUDIT_RING_SIZE as u64) as usize].lock() = record;
        seq
    }

    /// A consistent snapshot of the resident entries, oldest first.
    ///
    /// Reads the head, copies the resident window, then re-reads the
    /// head; if the writers lapped the whole ring in between, the copy
    /// is discarded and the read repeats.
    pub fn snapshot(&self) -> Vec<AuditRecord> {
        loop {
            let h0 = self.head.load(Ordering::Acquire);
            let resident = h0.min(AUDIT_RING_SIZE as u64);
            let first = h0 - resident;
            let mut out = Vec::with_capacity(resident as usize);
            for seq in first..h0 {
                let rec = *self.slots[(seq % AUDIT_RING_SIZE as u64) as usize].lock();
                out.push(rec);
            }
            let h1 = self.head.load(Ordering::Acquire);
            if h1.saturating_sub(h0) <= AUDIT_RING_SIZE as u64 {
                // Entries overwritten mid-copy carry a later seq; they are
                // valid but out of window order, so order the snapshot.
                out.retain(|r| r.seq < h1 && r.seq >= first && r.seq != u64::MAX);
                out.sort_unstable_by_key(|r| r.seq);
                return out;
            }
        }
    }

    /// Resident entries matching `event`, for drain policies and tests.
    pub fn count_matching(&self, event: AuditEvent, severity: Option<u8>) -> usize {
        self.snapshot()
            .iter()
            .filter(|r| r.event == event && severity.map_or(true, |s| r.severity == s))
            .count()
    }
}

impl Default for AuditRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(event: AuditEvent, severity: u8) -> AuditRecord {
        AuditRecord {
            seq: 0,
            timestamp: 1,
            pid: 7,
            tid: 8,
            event,
            severity,
            cap_id: 0,
            object_id: 0,
            result: 0,
            desc: AuditDesc::new("test"),
        }
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let ring = AuditRing::new();
        let a = ring.push(record(AuditEvent::CapCreate, 1));
        let b = ring.push(record(AuditEvent::CapAccess, 1));
        assert!(a < b);
        assert_eq!(ring.head(), 2);
    }

    #[test]
    fn overwrites_the_oldest_when_full() {
        let ring = AuditRing::new();
        for i in 0..(AUDIT_RING_SIZE as u64 + 10) {
            let mut r = record(AuditEvent::CapAccess, 1);
            r.object_id = i;
            ring.push(r);
        }
        let snap = ring.snapshot();
        assert_eq!(snap.len(), AUDIT_RING_SIZE);
        assert_eq!(snap.first().unwrap().object_id, 10);
        assert_eq!(
            snap.last().unwrap().object_id,
            AUDIT_RING_SIZE as u64 + 9
        );
    }

    #[test]
    fn descriptions_truncate_at_char_boundaries() {
        let long = "α".repeat(200);
        let desc = AuditDesc::new(&long);
        assert!(desc.as_str().len() <= AUDIT_DESC_LEN);
        assert!(desc.as_str().chars().all(|c| c == 'α'));
    }

    #[test]
    fn snapshot_orders_by_sequence() {
        let ring = AuditRing::new();
        for _ in 0..100 {
            ring.push(record(AuditEvent::CapGrant, 2));
        }
        let snap = ring.snapshot();
        for pair in snap.windows(2) {
            assert!(pair[0].seq < pair[1].seq);
        }
    }
}
