// SPDX-License-Identifier: MPL-2.0

//! The policy enforcement surface.
//!
//! These are the entry points the rest of the kernel calls on its hot
//! paths. Every denial is audited; classified failures feed the
//! intrusion detector and the owning process's violation counter, and a
//! process that keeps tripping severe violations gets a termination
//! request sent to the scheduler. The security kernel itself never
//! touches scheduler state beyond that one hook.

use orion_hal::{Error, PageFlags, Platform, Vaddr};

use crate::{
    audit::{AuditDesc, AuditEvent, AuditRecord},
    config::{ESCALATION_SEVERITY, TERMINATE_THRESHOLD},
    hardening,
    ids::ViolationClass,
    sched::{Pid, Scheduler},
    SecurityCore,
};

fn event_for(class: ViolationClass) -> AuditEvent {
    match class {
        ViolationClass::MemoryCorruption
        | ViolationClass::WxViolation
        | ViolationClass::StackOverflow => AuditEvent::MemoryViolation,
        ViolationClass::SuspiciousSyscall => AuditEvent::SyscallDenied,
        ViolationClass::CapabilityExhaustion | ViolationClass::CapabilityCorruption => {
            AuditEvent::CapViolation
        }
        ViolationClass::AuthFailure
        | ViolationClass::PrivilegeEscalation
        | ViolationClass::CfiViolation
        | ViolationClass::Other => AuditEvent::SecurityBreach,
    }
}

impl SecurityCore {
    /// Consults the pid's denied-syscall bitmap. No context means
    /// allow-by-default.
    pub fn syscall_allowed(&self, syscall_num: u32, pid: Pid) -> bool {
        if !self.contexts().is_syscall_denied(pid, syscall_num) {
            return true;
        }
        self.env().emit(
            AuditEvent::SyscallDenied,
            5,
            pid,
            0,
            u64::from(syscall_num),
            -i64::from(Error::PermissionDenied.code()),
            "denied syscall",
        );
        self.contexts().record_violation(pid, false);
        false
    }

    /// Whether charging `bytes` more to `pid` stays within its limit.
    pub fn memory_limit_ok(&self, pid: Pid, bytes: u64) -> bool {
        let limit = self
            .contexts()
            .with(pid, |ctx| ctx.memory_limit)
            .unwrap_or(crate::config::DEFAULT_MEMORY_LIMIT);
        let usage = self.sched.memory_usage(pid);
        if usage.saturating_add(bytes) <= limit {
            return true;
        }
        self.env().emit(
            AuditEvent::MemoryViolation,
            4,
            pid,
            0,
            bytes,
            -i64::from(Error::OutOfMemory.code()),
            "memory limit exceeded",
        );
        false
    }

    /// The single reporting funnel for every subsystem.
    ///
    /// Updates the intrusion detector, writes the audit record, counts
    /// the violation against `pid`, and requests termination once a
    /// process has accumulated more than [`TERMINATE_THRESHOLD`] severe
    /// violations.
    pub fn report_violation(
        &self,
        class: ViolationClass,
        severity: u8,
        pid: Pid,
        details: &str,
    ) {
        let now = self.plat.now_monotonic();
        self.intrusion().report(class, severity, now);
        self.audit().push(AuditRecord {
            seq: 0,
            timestamp: now,
            pid,
            tid: self.sched.current_thread(),
            event: event_for(class),
            severity,
            cap_id: 0,
            object_id: 0,
            result: -i64::from(Error::Security.code()),
            desc: AuditDesc::new(details),
        });
        let severe = severity >= ESCALATION_SEVERITY;
        if let Some((_, severe_count)) = self.contexts().record_violation(pid, severe) {
            if severe
                && severe_count > TERMINATE_THRESHOLD
                && self.sched.find_process(pid).is_some()
            {
                log::warn!("security: requesting termination of pid {pid}");
                self.sched
                    .request_terminate(pid, -(Error::Security.code()));
            }
        }
    }

    /// Compares a stack canary candidate against the boot value.
    pub fn canary_check(&self, candidate: u64, pid: Pid) -> bool {
        if self.canary.matches(candidate) {
            return true;
        }
        self.report_violation(ViolationClass::StackOverflow, 9, pid, "stack canary mismatch");
        false
    }

    /// Allows the indirect edge `source -> target`.
    pub fn cfi_register(&self, source: Vaddr, target: Vaddr) {
        self.cfi.register(source, target);
    }

    /// Validates an indirect branch before it is taken.
    pub fn cfi_validate(&self, source: Vaddr, target: Vaddr, pid: Pid) -> bool {
        if self.cfi.validate(source, target) {
            return true;
        }
        self.report_violation(
            ViolationClass::CfiViolation,
            9,
            pid,
            "unregistered indirect branch",
        );
        false
    }

    /// Enforces W^X on a mapping request. Returns whether it is allowed.
    pub fn wx_check(&self, va: Vaddr, flags: PageFlags, pid: Pid) -> bool {
        if !hardening::wx_violation(flags) {
            return true;
        }
        self.report_violation(
            ViolationClass::WxViolation,
            7,
            pid,
            &alloc::format!("writable and executable mapping at {va:#x}"),
        );
        false
    }

    /// Structural address validation, the KASLR window, then the
    /// architecture probe.
    pub fn validate_address(&self, va: Vaddr, size: u64, write: bool) -> bool {
        hardening::address_valid(va, size, write, self.kaslr_offset(), &*self.plat)
    }

    /// Clears IDS alert mode. Administrator action.
    pub fn clear_alert(&self) {
        self.intrusion().clear_alert();
    }
}
