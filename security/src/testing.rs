// SPDX-License-Identifier: MPL-2.0

//! Deterministic collaborators for test suites.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use spin::Mutex;

use crate::sched::{Pid, ProcessInfo, Scheduler, Tid};

/// A scheduler stub that knows every pid and records termination
/// requests instead of acting on them.
pub struct TestScheduler {
    current_tid: AtomicU32,
    memory_per_pid: Mutex<Vec<(Pid, u64)>>,
    terminated: Mutex<Vec<(Pid, i32)>>,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self {
            current_tid: AtomicU32::new(1),
            memory_per_pid: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
        }
    }

    pub fn set_memory_usage(&self, pid: Pid, bytes: u64) {
        let mut table = self.memory_per_pid.lock();
        if let Some(entry) = table.iter_mut().find(|(p, _)| *p == pid) {
            entry.1 = bytes;
        } else {
            table.push((pid, bytes));
        }
    }

    pub fn set_current_thread(&self, tid: Tid) {
        self.current_tid.store(tid, Ordering::SeqCst);
    }

    pub fn termination_requests(&self) -> Vec<(Pid, i32)> {
        self.terminated.lock().clone()
    }
}

impl Default for TestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TestScheduler {
    fn find_process(&self, pid: Pid) -> Option<ProcessInfo> {
        Some(ProcessInfo { pid, parent: 0 })
    }

    fn memory_usage(&self, pid: Pid) -> u64 {
        self.memory_per_pid
            .lock()
            .iter()
            .find(|(p, _)| *p == pid)
            .map_or(0, |(_, bytes)| *bytes)
    }

    fn current_thread(&self) -> Tid {
        self.current_tid.load(Ordering::SeqCst)
    }

    fn request_terminate(&self, pid: Pid, exit_code: i32) {
        self.terminated.lock().push((pid, exit_code));
    }
}
