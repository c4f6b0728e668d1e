// SPDX-License-Identifier: MPL-2.0

//! The intrusion-detection aggregator.
//!
//! Counts violations by class and decides when the system enters alert
//! mode. Alert mode is sticky: once raised it stays up until an
//! administrator clears it, however quiet the system becomes.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use spin::Mutex;

use crate::config::{ALERT_WINDOW_NS, SEVERE_SEVERITY};

pub const NR_VIOLATION_CLASSES: usize = 10;

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, int_to_c_enum::TryFromInt)]
pub enum ViolationClass {
    AuthFailure = 0,
    PrivilegeEscalation = 1,
    SuspiciousSyscall = 2,
    MemoryCorruption = 3,
    CapabilityExhaustion = 4,
    CapabilityCorruption = 5,
    WxViolation = 6,
    StackOverflow = 7,
    CfiViolation = 8,
    Other = 9,
}

pub struct IntrusionDetector {
    counts: [AtomicU64; NR_VIOLATION_CLASSES],
    total: AtomicU64,
    alert_mode: AtomicBool,
    /// Guards the alert rule evaluation; the counters stay lock-free.
    alert_rule: Mutex<AlertRule>,
}

struct AlertRule {
    last_alert_ns: u64,
    has_alerted: bool,
}

impl IntrusionDetector {
    #[allow(clippy::declare_interior_mutable_const)]
    pub fn new() -> Self {
        const ZERO: AtomicU64 = AtomicU64::new(0);
        Self {
            counts: [ZERO; NR_VIOLATION_CLASSES],
            total: AtomicU64::new(0),
            alert_mode: AtomicBool::new(false),
            alert_rule: Mutex::new(AlertRule {
                last_alert_ns: 0,
                has_alerted: false,
            }),
        }
    }

    /// Records one violation and evaluates the alert rule.
    ///
    /// Alerts fire for any event at severity [`SEVERE_SEVERITY`] or
    /// above, and for any violation arriving more than the quiet window
    /// after the previous alert. Returns whether this event raised one.
    pub fn report(&self, class: ViolationClass, severity: u8, now_ns: u64) -> bool {
        self.counts[class as usize].fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);

        let mut rule = self.alert_rule.lock();
        let stale = rule.has_alerted && now_ns.saturating_sub(rule.last_alert_ns) > ALERT_WINDOW_NS;
        let alert = severity >= SEVERE_SEVERITY || stale;
        if alert {
            rule.last_alert_ns = now_ns;
            rule.has_alerted = true;
            self.alert_mode.store(true, Ordering::Release);
            log::warn!("ids: alert on {class:?} sev {severity}");
        }
        alert
    }

    pub fn in_alert_mode(&self) -> bool {
        self.alert_mode.load(Ordering::Acquire)
    }

    /// Administrator action; the only way out of alert mode.
    pub fn clear_alert(&self) {
        let mut rule = self.alert_rule.lock();
        rule.has_alerted = false;
        rule.last_alert_ns = 0;
        self.alert_mode.store(false, Ordering::Release);
    }

    pub fn count(&self, class: ViolationClass) -> u64 {
        self.counts[class as usize].load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for IntrusionDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn severe_events_alert_immediately() {
        let ids = IntrusionDetector::new();
        assert!(!ids.report(ViolationClass::AuthFailure, 3, 1_000));
        assert!(!ids.in_alert_mode());
        assert!(ids.report(ViolationClass::MemoryCorruption, 9, 2_000));
        assert!(ids.in_alert_mode());
        assert_eq!(ids.total(), 2);
        assert_eq!(ids.count(ViolationClass::MemoryCorruption), 1);
    }

    #[test]
    fn quiet_window_re_alerts_on_low_severity() {
        let ids = IntrusionDetector::new();
        assert!(ids.report(ViolationClass::Other, 8, 1_000));
        // Within the window low severity stays quiet.
        assert!(!ids.report(ViolationClass::Other, 2, 500_000_000));
        // Past it, any violation re-alerts.
        assert!(ids.report(ViolationClass::Other, 2, 3_000_000_000));
    }

    #[test]
    fn alert_mode_is_sticky_until_cleared() {
        let ids = IntrusionDetector::new();
        ids.report(ViolationClass::CfiViolation, 9, 1_000);
        assert!(ids.in_alert_mode());
        ids.report(ViolationClass::AuthFailure, 1, 2_000);
        assert!(ids.in_alert_mode());
        ids.clear_alert();
        assert!(!ids.in_alert_mode());
        // Cleared means low-severity traffic no longer re-alerts off the
        // stale stamp.
        assert!(!ids.report(ViolationClass::AuthFailure, 1, 5_000_000_000));
    }
}
