// SPDX-License-Identifier: MPL-2.0

//! The capability and security kernel of Orion.
//!
//! One [`SecurityCore`] owns every security singleton: the capability
//! pool, the per-process contexts, the audit ring, the entropy pool, the
//! intrusion detector and the boot-time hardening state. It is built
//! once at boot and handed down explicitly; nothing in this crate hides
//! behind a process-wide global, which is what keeps it testable.
//!
//! The collaborating kernel supplies a clock and hardware probes through
//! [`orion_hal::Platform`] and process knowledge through [`Scheduler`].

#![cfg_attr(not(test), no_std)]
#![allow(dead_code)]

extern crate alloc;

pub mod audit;
pub mod cap;
pub mod config;
pub mod context;
pub mod entropy;
pub mod hardening;
pub mod ids;
mod policy;
pub mod sched;
pub mod testing;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use orion_hal::Platform;

pub use orion_hal::{Error, Result};

pub use crate::{
    audit::{AuditEvent, AuditRecord, AuditRing},
    cap::{CapId, CapRights, CapState, CapType, SecLevel},
    context::ContextTable,
    entropy::EntropyPool,
    ids::{IntrusionDetector, ViolationClass},
    sched::{Pid, ProcessInfo, Scheduler, Tid},
};

use crate::{
    cap::pool::{CapEnv, CapPool},
    hardening::{CfiTable, Kaslr, StackCanary},
};

pub struct SecurityCore {
    plat: Arc<dyn Platform>,
    sched: Arc<dyn Scheduler>,
    entropy: EntropyPool,
    caps: CapPool,
    contexts: ContextTable,
    audit: AuditRing,
    ids: IntrusionDetector,
    kaslr: Kaslr,
    canary: StackCanary,
    cfi: CfiTable,
    initialized: AtomicBool,
}

impl SecurityCore {
    pub fn new(plat: Arc<dyn Platform>, sched: Arc<dyn Scheduler>) -> Self {
        Self {
            plat,
            sched,
            entropy: EntropyPool::new(),
            caps: CapPool::new(),
            contexts: ContextTable::new(),
            audit: AuditRing::new(),
            ids: IntrusionDetector::new(),
            kaslr: Kaslr::new(),
            canary: StackCanary::new(),
            cfi: CfiTable::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Seeds the entropy pool and draws the boot-time randomness (KASLR
    /// offset, stack canary). Idempotent; later calls are no-ops.
    pub fn init(&self) -> Result<()> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        self.entropy.init(&*self.plat);
        self.kaslr.randomize(self.entropy.get_u64(&*self.plat));
        self.canary.arm(self.entropy.get_u64(&*self.plat));
        log::debug!(
            "security: up, kaslr offset {:#x}",
            self.kaslr.offset()
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn env(&self) -> CapEnv<'_> {
        CapEnv {
            audit: &self.audit,
            ids: &self.ids,
            contexts: &self.contexts,
            entropy: &self.entropy,
            plat: &*self.plat,
            sched: &*self.sched,
        }
    }

    // Randomness

    pub fn random_u64(&self) -> u64 {
        self.entropy.get_u64(&*self.plat)
    }

    /// Feeds an event word (interrupt timing, device noise) into the pool.
    pub fn add_entropy(&self, word: u64) {
        self.entropy.add_event(word);
    }

    // The capability surface

    /// Creates a capability; returns 0 when the pool is exhausted.
    pub fn cap_create(
        &self,
        cap_type: CapType,
        object_id: u64,
        rights: CapRights,
        owner_pid: Pid,
    ) -> CapId {
        self.caps
            .create(cap_type, object_id, rights, owner_pid, &self.env())
    }

    pub fn cap_check(&self, cap_id: CapId, required: CapRights, caller_pid: Pid) -> bool {
        self.caps
            .check_rights(cap_id, required, caller_pid, &self.env())
    }

    pub fn cap_grant(
        &self,
        cap_id: CapId,
        target_pid: Pid,
        rights_mask: CapRights,
        caller_pid: Pid,
    ) -> Result<CapId> {
        self.caps
            .grant(cap_id, target_pid, rights_mask, caller_pid, &self.env())
    }

    pub fn cap_revoke(
        &self,
        cap_id: CapId,
        target_pid: Pid,
        rights_mask: CapRights,
        caller_pid: Pid,
    ) -> Result<u32> {
        self.caps
            .revoke(cap_id, target_pid, rights_mask, caller_pid, &self.env())
    }

    pub fn cap_destroy(&self, cap_id: CapId) -> Result<()> {
        self.caps.destroy(cap_id, &self.env())
    }

    pub fn cap_retain(&self, cap_id: CapId) -> Result<u32> {
        self.caps.retain(cap_id)
    }

    pub fn cap_release(&self, cap_id: CapId) -> Result<u32> {
        self.caps.release(cap_id)
    }

    pub fn cap_suspend(&self, cap_id: CapId) -> Result<()> {
        self.caps.suspend(cap_id)
    }

    pub fn cap_resume(&self, cap_id: CapId) -> Result<()> {
        self.caps.resume(cap_id)
    }

    pub fn cap_set_audit_mask(
        &self,
        cap_id: CapId,
        mask: CapRights,
        caller_pid: Pid,
    ) -> Result<()> {
        self.caps.set_audit_mask(cap_id, mask, caller_pid)
    }

    pub fn cap_set_expiry(&self, cap_id: CapId, deadline: u64, caller_pid: Pid) -> Result<()> {
        self.caps.set_expiry(cap_id, deadline, caller_pid)
    }

    /// Models external corruption of a capability record. Test hook.
    #[doc(hidden)]
    pub fn cap_corrupt_rights(&self, cap_id: CapId, bits: u64) -> Result<()> {
        self.caps.corrupt_rights(cap_id, bits)
    }

    /// Sweeps a dying process: revokes its capabilities, then retires its
    /// security context.
    pub fn process_teardown(&self, pid: Pid) -> Result<u32> {
        let revoked = self.caps.revoke_all_for(pid, &self.env());
        match self.contexts.remove(pid) {
            Ok(()) | Err(Error::NotFound) => Ok(revoked),
            Err(e) => Err(e),
        }
    }

    // Subsystem accessors for the administrative surfaces and tests.

    pub fn audit(&self) -> &AuditRing {
        &self.audit
    }

    pub fn intrusion(&self) -> &IntrusionDetector {
        &self.ids
    }

    pub fn contexts(&self) -> &ContextTable {
        &self.contexts
    }

    pub fn entropy(&self) -> &EntropyPool {
        &self.entropy
    }

    pub fn active_capabilities(&self) -> usize {
        self.caps.active_count()
    }

    pub fn kaslr_offset(&self) -> u64 {
        self.kaslr.offset()
    }

    pub fn canary_value(&self) -> u64 {
        self.canary.value()
    }
}
