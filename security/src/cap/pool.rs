// SPDX-License-Identifier: MPL-2.0

//! The capability pool.
//!
//! A fixed slotted table. Every slot carries its own lock; the atomics
//! (`id`, `rights`, `state`, `refs`) let the hot checks read without one,
//! and every mutation happens under the slot lock. Sweeps lock one slot
//! at a time in ascending index order and never nest, which is the whole
//! deadlock story.
//!
//! Identifiers are a monotonic serial XORed with a secure random draw, so
//! watching the allocation rate reveals nothing about neighboring ids.
//! The integrity checksum covers the fields that only change under the
//! slot lock; a mismatch quarantines the slot instead of trusting it.

use alloc::{boxed::Box, vec::Vec};
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use spin::Mutex;

use orion_hal::{Error, Platform, Result};

use crate::{
    audit::{AuditDesc, AuditEvent, AuditRecord, AuditRing},
    cap::{CapId, CapRights, CapState, CapType, SecLevel},
    config::{CAP_POOL_SIZE, MAX_DELEGATION_DEPTH},
    context::ContextTable,
    entropy::EntropyPool,
    ids::{IntrusionDetector, ViolationClass},
    sched::{Pid, Scheduler},
};

/// The collaborators a pool operation may touch.
pub(crate) struct CapEnv<'a> {
    pub audit: &'a AuditRing,
    pub ids: &'a IntrusionDetector,
    pub contexts: &'a ContextTable,
    pub entropy: &'a EntropyPool,
    pub plat: &'a dyn Platform,
    pub sched: &'a dyn Scheduler,
}

impl CapEnv<'_> {
    pub(crate) fn emit(
        &self,
        event: AuditEvent,
        severity: u8,
        pid: Pid,
        cap_id: CapId,
        object_id: u64,
        result: i64,
        desc: &str,
    ) {
        self.audit.push(AuditRecord {
            seq: 0,
            timestamp: self.plat.now_monotonic(),
            pid,
            tid: self.sched.current_thread(),
            event,
            severity,
            cap_id,
            object_id,
            result,
            desc: AuditDesc::new(desc),
        });
    }
}

/// Fields guarded by the slot lock.
struct CapMeta {
    cap_type: CapType,
    object_id: u64,
    owner_pid: Pid,
    creator_pid: Pid,
    creation_time: u64,
    last_access_time: u64,
    access_count: u64,
    level: SecLevel,
    /// Zero means the capability never expires.
    expiry_time: u64,
    delegation_depth: u8,
    /// Rights whose exercise is audited.
    audit_mask: CapRights,
    checksum: u64,
}

impl CapMeta {
    const fn cleared() -> Self {
        Self {
            cap_type: CapType::None,
            object_id: 0,
            owner_pid: 0,
            creator_pid: 0,
            creation_time: 0,
            last_access_time: 0,
            access_count: 0,
            level: SecLevel::Public,
            expiry_time: 0,
            delegation_depth: 0,
            audit_mask: CapRights::empty(),
            checksum: 0,
        }
    }
}

struct CapSlot {
    /// Zero marks an empty slot.
    id: AtomicU64,
    refs: AtomicU32,
    rights: AtomicU64,
    state: AtomicU8,
    meta: Mutex<CapMeta>,
}

impl CapSlot {
    fn state(&self) -> CapState {
        // The atomic only ever holds `CapState` discriminants.
        CapState::try_from(self.state.load(Ordering::Acquire)).unwrap_or(CapState::Revoked)
    }

    fn rights(&self) -> CapRights {
        CapRights::from_bits_truncate(self.rights.load(Ordering::Acquire))
    }

    /// Zeroes the slot into the canonical revoked shape
    /// (`id == 0 && rights == 0`).
    fn quarantine(&self) {
        self.state.store(CapState::Revoked as u8, Ordering::Release);
        self.id.store(0, Ordering::Release);
        self.rights.store(0, Ordering::Release);
        self.refs.store(0, Ordering::Release);
    }
}

fn integrity_checksum(
    cap_id: CapId,
    cap_type: CapType,
    object_id: u64,
    rights_bits: u64,
    owner_pid: Pid,
    creation_time: u64,
) -> u64 {
    let mut acc = 0;
    for word in [
        cap_id,
        cap_type as u64,
        object_id,
        rights_bits,
        owner_pid as u64,
        creation_time,
    ] {
        acc = gmix::fold64(acc, word);
    }
    gmix::mix64(acc)
}

pub struct CapPool {
    slots: Box<[CapSlot]>,
    next_serial: AtomicU64,
}

impl CapPool {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(CAP_POOL_SIZE);
        slots.resize_with(CAP_POOL_SIZE, || CapSlot {
            id: AtomicU64::new(0),
            refs: AtomicU32::new(0),
            rights: AtomicU64::new(0),
            state: AtomicU8::new(CapState::Revoked as u8),
            meta: Mutex::new(CapMeta::cleared()),
        });
        Self {
            slots: slots.into_boxed_slice(),
            next_serial: AtomicU64::new(1),
        }
    }

    fn find(&self, cap_id: CapId) -> Option<&CapSlot> {
        if cap_id == 0 {
            return None;
        }
        self.slots
            .iter()
            .find(|s| s.id.load(Ordering::Acquire) == cap_id)
    }

    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state() == CapState::Active)
            .count()
    }

    /// Creates a primary capability. Returns 0 when the pool (or the
    /// context table) cannot take it.
    pub(crate) fn create(
        &self,
        cap_type: CapType,
        object_id: u64,
        rights: CapRights,
        owner_pid: Pid,
        env: &CapEnv<'_>,
    ) -> CapId {
        let now = env.plat.now_monotonic();
        if env.contexts.ensure(owner_pid, SecLevel::Restricted, now).is_err() {
            return 0;
        }
        let level = env
            .contexts
            .with(owner_pid, |ctx| ctx.level)
            .unwrap_or(SecLevel::Restricted);
        let cap_id = self.claim_slot(cap_type, object_id, rights, owner_pid, owner_pid, level, 0, env);
        if cap_id != 0 {
            env.emit(
                AuditEvent::CapCreate,
                3,
                owner_pid,
                cap_id,
                object_id,
                0,
                "capability created",
            );
        }
        cap_id
    }

    /// Finds the first revoked slot and populates it. Shared by `create`
    /// and `grant`; audits only the exhaustion path.
    #[allow(clippy::too_many_arguments)]
    fn claim_slot(
        &self,
        cap_type: CapType,
        object_id: u64,
        rights: CapRights,
        owner_pid: Pid,
        creator_pid: Pid,
        level: SecLevel,
        delegation_depth: u8,
        env: &CapEnv<'_>,
    ) -> CapId {
        let now = env.plat.now_monotonic();
        for slot in self.slots.iter() {
            if slot.state() != CapState::Revoked {
                continue;
            }
            let mut meta = slot.meta.lock();
            if slot.state() != CapState::Revoked {
                continue;
            }
            let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
            let mut cap_id = serial ^ env.entropy.get_u64(env.plat);
            if cap_id == 0 {
                cap_id = serial | 1;
            }
            *meta = CapMeta {
                cap_type,
                object_id,
                owner_pid,
                creator_pid,
                creation_time: now,
                last_access_time: now,
                access_count: 0,
                level,
                expiry_time: 0,
                delegation_depth,
                audit_mask: CapRights::empty(),
                checksum: integrity_checksum(
                    cap_id,
                    cap_type,
                    object_id,
                    rights.bits(),
                    owner_pid,
                    now,
                ),
            };
            slot.rights.store(rights.bits(), Ordering::Release);
            slot.refs.store(1, Ordering::Release);
            slot.id.store(cap_id, Ordering::Release);
            // Publishing Active is last; until here the slot still reads
            // as revoked and the meta lock keeps claimants out.
            slot.state.store(CapState::Active as u8, Ordering::Release);
            drop(meta);
            env.contexts.with(owner_pid, |ctx| {
                ctx.cap_types |= 1u64 << (cap_type as u32);
            });
            return cap_id;
        }
        env.ids
            .report(ViolationClass::CapabilityExhaustion, 7, now);
        env.emit(
            AuditEvent::CapViolation,
            7,
            owner_pid,
            0,
            object_id,
            -i64::from(Error::OutOfMemory.code()),
            "capability pool exhausted",
        );
        0
    }

    /// The privileged check every capability use funnels through.
    pub(crate) fn check_rights(
        &self,
        cap_id: CapId,
        required: CapRights,
        caller_pid: Pid,
        env: &CapEnv<'_>,
    ) -> bool {
        let now = env.plat.now_monotonic();
        let Some(slot) = self.find(cap_id) else {
            env.emit(
                AuditEvent::CapViolation,
                4,
                caller_pid,
                cap_id,
                0,
                -i64::from(Error::NotFound.code()),
                "no such capability",
            );
            return false;
        };
        let mut meta = slot.meta.lock();
        if slot.id.load(Ordering::Acquire) != cap_id {
            // Recycled while we waited on the lock.
            drop(meta);
            env.emit(
                AuditEvent::CapViolation,
                4,
                caller_pid,
                cap_id,
                0,
                -i64::from(Error::NotFound.code()),
                "no such capability",
            );
            return false;
        }
        if slot.state() != CapState::Active {
            let object_id = meta.object_id;
            drop(meta);
            env.emit(
                AuditEvent::CapViolation,
                4,
                caller_pid,
                cap_id,
                object_id,
                -i64::from(Error::InvalidState.code()),
                "capability not active",
            );
            return false;
        }
        if meta.expiry_time != 0 && now > meta.expiry_time {
            slot.state.store(CapState::Expired as u8, Ordering::Release);
            let object_id = meta.object_id;
            drop(meta);
            env.emit(
                AuditEvent::CapViolation,
                4,
                caller_pid,
                cap_id,
                object_id,
                -i64::from(Error::Timeout.code()),
                "capability expired",
            );
            return false;
        }
        let expected = integrity_checksum(
            cap_id,
            meta.cap_type,
            meta.object_id,
            slot.rights.load(Ordering::Acquire),
            meta.owner_pid,
            meta.creation_time,
        );
        if expected != meta.checksum {
            let object_id = meta.object_id;
            slot.quarantine();
            drop(meta);
            env.ids
                .report(ViolationClass::CapabilityCorruption, 9, now);
            env.emit(
                AuditEvent::SecurityBreach,
                9,
                caller_pid,
                cap_id,
                object_id,
                -i64::from(Error::Security.code()),
                "capability integrity failure",
            );
            return false;
        }
        if meta.owner_pid != caller_pid {
            let object_id = meta.object_id;
            drop(meta);
            env.emit(
                AuditEvent::CapViolation,
                6,
                caller_pid,
                cap_id,
                object_id,
                -i64::from(Error::PermissionDenied.code()),
                "caller does not own capability",
            );
            return false;
        }
        if !slot.rights().contains(required) {
            let object_id = meta.object_id;
            drop(meta);
            env.emit(
                AuditEvent::CapViolation,
                5,
                caller_pid,
                cap_id,
                object_id,
                -i64::from(Error::PermissionDenied.code()),
                "insufficient rights",
            );
            return false;
        }
        meta.last_access_time = now;
        meta.access_count += 1;
        let audited = meta.audit_mask.intersects(required);
        let object_id = meta.object_id;
        drop(meta);
        if audited {
            env.emit(
                AuditEvent::CapAccess,
                2,
                caller_pid,
                cap_id,
                object_id,
                0,
                "audited access",
            );
        }
        true
    }

    /// Delegates a reduced copy of `cap_id` to `target_pid`.
    pub(crate) fn grant(
        &self,
        cap_id: CapId,
        target_pid: Pid,
        rights_mask: CapRights,
        caller_pid: Pid,
        env: &CapEnv<'_>,
    ) -> Result<CapId> {
        if !self.check_rights(cap_id, CapRights::GRANT, caller_pid, env) {
            return Err(Error::PermissionDenied);
        }
        let (cap_type, object_id, src_rights, depth, level) = {
            let slot = self.find(cap_id).ok_or(Error::NotFound)?;
            let meta = slot.meta.lock();
            if slot.id.load(Ordering::Acquire) != cap_id {
                return Err(Error::NotFound);
            }
            (
                meta.cap_type,
                meta.object_id,
                slot.rights(),
                meta.delegation_depth,
                meta.level,
            )
        };
        if depth >= MAX_DELEGATION_DEPTH {
            env.emit(
                AuditEvent::CapViolation,
                5,
                caller_pid,
                cap_id,
                object_id,
                -i64::from(Error::PermissionDenied.code()),
                "delegation depth exceeded",
            );
            return Err(Error::PermissionDenied);
        }
        let now = env.plat.now_monotonic();
        env.contexts
            .ensure(target_pid, SecLevel::Restricted, now)?;
        // IMMORTAL never crosses a grant.
        let delegated = src_rights & rights_mask & !CapRights::IMMORTAL;
        let new_id = self.claim_slot(
            cap_type,
            object_id,
            delegated,
            target_pid,
            caller_pid,
            level,
            depth + 1,
            env,
        );
        if new_id == 0 {
            return Err(Error::OutOfMemory);
        }
        env.emit(
            AuditEvent::CapGrant,
            3,
            caller_pid,
            new_id,
            object_id,
            i64::from(target_pid),
            "capability granted",
        );
        Ok(new_id)
    }

    /// Strips `rights_mask` from every active capability of `target_pid`
    /// derived through the caller. Returns how many slots were touched.
    pub(crate) fn revoke(
        &self,
        cap_id: CapId,
        target_pid: Pid,
        rights_mask: CapRights,
        caller_pid: Pid,
        env: &CapEnv<'_>,
    ) -> Result<u32> {
        if !self.check_rights(cap_id, CapRights::REVOKE, caller_pid, env) {
            return Err(Error::PermissionDenied);
        }
        // IMMORTAL rights survive revocation.
        let remove = rights_mask & !CapRights::IMMORTAL;
        let mut affected = 0;
        for slot in self.slots.iter() {
            if slot.state() != CapState::Active {
                continue;
            }
            let mut meta = slot.meta.lock();
            if slot.state() != CapState::Active {
                continue;
            }
            if meta.owner_pid != target_pid {
                continue;
            }
            // The derivation predicate: anonymous objects, or created by
            // the revoker.
            if !(meta.object_id == 0 || meta.creator_pid == caller_pid) {
                continue;
            }
            let victim_id = slot.id.load(Ordering::Acquire);
            let new_rights = slot.rights() & !remove;
            let object_id = meta.object_id;
            if new_rights.is_empty() {
                slot.quarantine();
            } else {
                slot.rights.store(new_rights.bits(), Ordering::Release);
                meta.checksum = integrity_checksum(
                    victim_id,
                    meta.cap_type,
                    object_id,
                    new_rights.bits(),
                    meta.owner_pid,
                    meta.creation_time,
                );
            }
            drop(meta);
            env.emit(
                AuditEvent::CapRevoke,
                3,
                caller_pid,
                victim_id,
                object_id,
                i64::from(target_pid),
                "rights revoked",
            );
            affected += 1;
        }
        Ok(affected)
    }

    /// Destroys a capability outright. IMMORTAL capabilities refuse.
    pub(crate) fn destroy(&self, cap_id: CapId, env: &CapEnv<'_>) -> Result<()> {
        let slot = self.find(cap_id).ok_or(Error::NotFound)?;
        let mut meta = slot.meta.lock();
        if slot.id.load(Ordering::Acquire) != cap_id {
            return Err(Error::NotFound);
        }
        if slot.rights().contains(CapRights::IMMORTAL) {
            let owner = meta.owner_pid;
            let object_id = meta.object_id;
            drop(meta);
            env.emit(
                AuditEvent::CapViolation,
                6,
                owner,
                cap_id,
                object_id,
                -i64::from(Error::PermissionDenied.code()),
                "attempt to destroy immortal capability",
            );
            return Err(Error::PermissionDenied);
        }
        let owner = meta.owner_pid;
        let object_id = meta.object_id;
        meta.object_id = 0;
        meta.owner_pid = 0;
        slot.quarantine();
        drop(meta);
        env.emit(
            AuditEvent::CapRevoke,
            3,
            owner,
            cap_id,
            object_id,
            0,
            "capability destroyed",
        );
        Ok(())
    }

    /// Sweeps every non-IMMORTAL capability owned by `pid`, for process
    /// teardown. Returns how many were revoked.
    pub(crate) fn revoke_all_for(&self, pid: Pid, env: &CapEnv<'_>) -> u32 {
        let mut revoked = 0;
        for slot in self.slots.iter() {
            if slot.state() != CapState::Active {
                continue;
            }
            let mut meta = slot.meta.lock();
            if slot.state() != CapState::Active || meta.owner_pid != pid {
                continue;
            }
            if slot.rights().contains(CapRights::IMMORTAL) {
                continue;
            }
            let victim_id = slot.id.load(Ordering::Acquire);
            let object_id = meta.object_id;
            meta.object_id = 0;
            meta.owner_pid = 0;
            slot.quarantine();
            drop(meta);
            env.emit(
                AuditEvent::CapRevoke,
                3,
                pid,
                victim_id,
                object_id,
                0,
                "owner torn down",
            );
            revoked += 1;
        }
        revoked
    }

    /// Takes another handle on `cap_id`.
    pub(crate) fn retain(&self, cap_id: CapId) -> Result<u32> {
        let slot = self.find(cap_id).ok_or(Error::NotFound)?;
        if slot.state() != CapState::Active {
            return Err(Error::InvalidState);
        }
        Ok(slot.refs.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Drops a handle on `cap_id`; the count floors at zero.
    pub(crate) fn release(&self, cap_id: CapId) -> Result<u32> {
        let slot = self.find(cap_id).ok_or(Error::NotFound)?;
        let prev = slot
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| {
                refs.checked_sub(1)
            })
            .map_err(|_| Error::InvalidState)?;
        Ok(prev - 1)
    }

    /// Administrator hold on a capability.
    pub(crate) fn suspend(&self, cap_id: CapId) -> Result<()> {
        self.transition(cap_id, CapState::Active, CapState::Suspended)
    }

    /// Releases an administrator hold.
    pub(crate) fn resume(&self, cap_id: CapId) -> Result<()> {
        self.transition(cap_id, CapState::Suspended, CapState::Active)
    }

    fn transition(&self, cap_id: CapId, from: CapState, to: CapState) -> Result<()> {
        let slot = self.find(cap_id).ok_or(Error::NotFound)?;
        let meta = slot.meta.lock();
        if slot.id.load(Ordering::Acquire) != cap_id {
            return Err(Error::NotFound);
        }
        if slot.state() != from {
            return Err(Error::InvalidState);
        }
        slot.state.store(to as u8, Ordering::Release);
        drop(meta);
        Ok(())
    }

    /// Marks which right bits of `cap_id` are audited on use. Owner only.
    pub(crate) fn set_audit_mask(
        &self,
        cap_id: CapId,
        mask: CapRights,
        caller_pid: Pid,
    ) -> Result<()> {
        let slot = self.find(cap_id).ok_or(Error::NotFound)?;
        let mut meta = slot.meta.lock();
        if slot.id.load(Ordering::Acquire) != cap_id {
            return Err(Error::NotFound);
        }
        if meta.owner_pid != caller_pid {
            return Err(Error::PermissionDenied);
        }
        meta.audit_mask = mask;
        Ok(())
    }

    /// Arms an absolute expiry deadline (zero clears it). Owner only.
    pub(crate) fn set_expiry(&self, cap_id: CapId, deadline: u64, caller_pid: Pid) -> Result<()> {
        let slot = self.find(cap_id).ok_or(Error::NotFound)?;
        let mut meta = slot.meta.lock();
        if slot.id.load(Ordering::Acquire) != cap_id {
            return Err(Error::NotFound);
        }
        if meta.owner_pid != caller_pid {
            return Err(Error::PermissionDenied);
        }
        meta.expiry_time = deadline;
        Ok(())
    }

    /// Flips stored rights bits without touching the checksum, to model
    /// external memory corruption. Test hook; not part of the API.
    #[doc(hidden)]
    pub fn corrupt_rights(&self, cap_id: CapId, bits: u64) -> Result<()> {
        let slot = self.find(cap_id).ok_or(Error::NotFound)?;
        slot.rights.fetch_xor(bits, Ordering::Release);
        Ok(())
    }
}

impl Default for CapPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::TestScheduler;
    use orion_hal::testing::TestPlatform;

    struct Fixture {
        audit: AuditRing,
        ids: IntrusionDetector,
        contexts: ContextTable,
        entropy: EntropyPool,
        plat: TestPlatform,
        sched: TestScheduler,
        pool: CapPool,
    }

    impl Fixture {
        fn new() -> Self {
            let plat = TestPlatform::new();
            let entropy = EntropyPool::new();
            entropy.init(&plat);
            Self {
                audit: AuditRing::new(),
                ids: IntrusionDetector::new(),
                contexts: ContextTable::new(),
                entropy,
                plat,
                sched: TestScheduler::new(),
                pool: CapPool::new(),
            }
        }

        fn env(&self) -> CapEnv<'_> {
            CapEnv {
                audit: &self.audit,
                ids: &self.ids,
                contexts: &self.contexts,
                entropy: &self.entropy,
                plat: &self.plat,
                sched: &self.sched,
            }
        }
    }

    #[test]
    fn create_check_destroy() {
        let f = Fixture::new();
        let env = f.env();
        let id = f.pool.create(
            CapType::Memory,
            0xabcd,
            CapRights::READ | CapRights::WRITE,
            42,
            &env,
        );
        assert_ne!(id, 0);
        assert!(f.pool.check_rights(id, CapRights::READ, 42, &env));
        assert!(!f.pool.check_rights(id, CapRights::EXEC, 42, &env));
        assert!(!f.pool.check_rights(id, CapRights::READ, 43, &env));
        f.pool.destroy(id, &env).unwrap();
        assert!(!f.pool.check_rights(id, CapRights::READ, 42, &env));
        assert_eq!(f.pool.active_count(), 0);
    }

    #[test]
    fn ids_do_not_leak_the_serial() {
        let f = Fixture::new();
        let env = f.env();
        let a = f.pool.create(CapType::File, 1, CapRights::READ, 1, &env);
        let b = f.pool.create(CapType::File, 2, CapRights::READ, 1, &env);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
        assert_ne!(b.wrapping_sub(a), 1, "ids must not be consecutive");
    }

    #[test]
    fn expiry_transitions_lazily() {
        let f = Fixture::new();
        let env = f.env();
        let id = f.pool.create(CapType::Timer, 5, CapRights::READ, 1, &env);
        let now = f.plat.now_monotonic();
        f.pool.set_expiry(id, now + 1_000, 1).unwrap();
        assert!(f.pool.check_rights(id, CapRights::READ, 1, &env));
        f.plat.advance(10_000);
        assert!(!f.pool.check_rights(id, CapRights::READ, 1, &env));
        // The slot is parked in Expired, not recycled.
        assert!(matches!(f.pool.resume(id), Err(Error::InvalidState)));
    }

    #[test]
    fn corruption_is_quarantined() {
        let f = Fixture::new();
        let env = f.env();
        let id = f.pool.create(CapType::Device, 9, CapRights::READ, 7, &env);
        f.pool.corrupt_rights(id, CapRights::ADMIN.bits()).unwrap();
        assert!(!f.pool.check_rights(id, CapRights::READ, 7, &env));
        assert_eq!(f.ids.count(ViolationClass::CapabilityCorruption), 1);
        assert!(f.ids.in_alert_mode());
        // Quarantined means fully cleared.
        assert!(!f.pool.check_rights(id, CapRights::ADMIN, 7, &env));
    }

    #[test]
    fn grant_respects_masks_and_depth() {
        let f = Fixture::new();
        let env = f.env();
        let root = f.pool.create(
            CapType::File,
            3,
            CapRights::READ | CapRights::WRITE | CapRights::GRANT,
            1,
            &env,
        );
        let child = f
            .pool
            .grant(root, 2, CapRights::READ | CapRights::GRANT, 1, &env)
            .unwrap();
        assert!(f.pool.check_rights(child, CapRights::READ, 2, &env));
        assert!(!f.pool.check_rights(child, CapRights::WRITE, 2, &env));
        // Rights only narrow.
        let grandchild = f
            .pool
            .grant(child, 3, CapRights::all(), 2, &env)
            .unwrap();
        assert!(f.pool.check_rights(grandchild, CapRights::READ, 3, &env));
        assert!(!f.pool.check_rights(grandchild, CapRights::WRITE, 3, &env));
    }

    #[test]
    fn immortal_never_delegates() {
        let f = Fixture::new();
        let env = f.env();
        let root = f.pool.create(
            CapType::Device,
            1,
            CapRights::READ | CapRights::GRANT | CapRights::IMMORTAL,
            1,
            &env,
        );
        let child = f.pool.grant(root, 2, CapRights::all(), 1, &env).unwrap();
        assert!(f.pool.check_rights(child, CapRights::READ, 2, &env));
        assert!(!f.pool.check_rights(child, CapRights::IMMORTAL, 2, &env));
    }

    #[test]
    fn refcounts_floor_at_zero() {
        let f = Fixture::new();
        let env = f.env();
        let id = f.pool.create(CapType::Socket, 1, CapRights::READ, 1, &env);
        assert_eq!(f.pool.retain(id).unwrap(), 2);
        assert_eq!(f.pool.release(id).unwrap(), 1);
        assert_eq!(f.pool.release(id).unwrap(), 0);
        assert!(matches!(f.pool.release(id), Err(Error::InvalidState)));
    }

    #[test]
    fn suspend_parks_a_capability() {
        let f = Fixture::new();
        let env = f.env();
        let id = f.pool.create(CapType::IpcPort, 1, CapRights::READ, 1, &env);
        f.pool.suspend(id).unwrap();
        assert!(!f.pool.check_rights(id, CapRights::READ, 1, &env));
        assert!(matches!(f.pool.suspend(id), Err(Error::InvalidState)));
        f.pool.resume(id).unwrap();
        assert!(f.pool.check_rights(id, CapRights::READ, 1, &env));
    }

    #[test]
    fn audit_mask_logs_exercised_rights() {
        let f = Fixture::new();
        let env = f.env();
        let id = f.pool.create(
            CapType::File,
            1,
            CapRights::READ | CapRights::WRITE,
            1,
            &env,
        );
        f.pool.set_audit_mask(id, CapRights::WRITE, 1).unwrap();
        let before = f.audit.count_matching(AuditEvent::CapAccess, None);
        assert!(f.pool.check_rights(id, CapRights::READ, 1, &env));
        assert_eq!(f.audit.count_matching(AuditEvent::CapAccess, None), before);
        assert!(f.pool.check_rights(id, CapRights::WRITE, 1, &env));
        assert_eq!(
            f.audit.count_matching(AuditEvent::CapAccess, None),
            before + 1
        );
    }
}
