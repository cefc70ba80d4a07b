// Fatal kernel errors for the rrkernel scheduling core
use std::fmt;

use crate::process::pcb::Pid;

/// Unrecoverable kernel conditions.
///
/// Any of these means either the simulator broke its contract or the
/// scheduler state is corrupted. The kernel never continues past one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A PID outside `0..max_processes` reached the kernel.
    InvalidPid(u64),
    /// R1 carried a trap code the kernel does not know.
    UnknownTrap(u64),
    /// A PID was enqueued while already sitting in the ready queue.
    AlreadyQueued(Pid),
    /// The ready queue has no room left; it is sized to the process table.
    QueueOverflow(Pid),
    /// A fork targeted a slot that still holds a live process.
    SlotInUse(Pid),
    /// An I/O trap arrived while no process was running.
    NoCurrentProcess,
    /// Capacity or quantum of zero.
    InvalidConfig,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelError::InvalidPid(raw) => write!(f, "Invalid process ID {}", raw),
            KernelError::UnknownTrap(code) => write!(f, "Unknown trap code {}", code),
            KernelError::AlreadyQueued(pid) => {
                write!(f, "Ready queue corrupted: PID {} queued twice", pid)
            }
            KernelError::QueueOverflow(pid) => {
                write!(f, "Ready queue corrupted: no room for PID {}", pid)
            }
            KernelError::SlotInUse(pid) => write!(f, "Process slot {} is already in use", pid),
            KernelError::NoCurrentProcess => write!(f, "No current process"),
            KernelError::InvalidConfig => write!(f, "Invalid kernel configuration"),
        }
    }
}

impl std::error::Error for KernelError {}
