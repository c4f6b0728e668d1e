// SPDX-License-Identifier: MPL-2.0

//! The scheduler collaborator surface.
//!
//! The security kernel refers to processes by identifier only; the
//! scheduler owns their lifetime. Termination is a request, not an
//! action: the security kernel never mutates scheduler state itself.

pub type Pid = u32;
pub type Tid = u32;

/// What the scheduler tells us about a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub parent: Pid,
}

pub trait Scheduler: Send + Sync {
    fn find_process(&self, pid: Pid) -> Option<ProcessInfo>;

    /// Bytes currently charged to `pid`.
    fn memory_usage(&self, pid: Pid) -> u64;

    /// The thread on whose behalf the current call runs.
    fn current_thread(&self) -> Tid;

    /// Asks for `pid` to be torn down with `exit_code`.
    fn request_terminate(&self, pid: Pid, exit_code: i32);
}
