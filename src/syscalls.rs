// Trap codes carried in R1 when a process raises a trap
use std::fmt;

use crate::error::KernelError;

/// Kernel services a running process can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum TrapKind {
    DiskRead = 0,     // R2 = block argument, blocks the caller
    DiskWrite = 1,    // non-blocking
    KeyboardRead = 2, // blocks the caller
    Fork = 3,         // R2 = child PID
    Exit = 4,         // R2 = PID to terminate
}

impl TrapKind {
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Whether the trap takes the caller off the CPU.
    pub fn blocks(self) -> bool {
        matches!(self, TrapKind::DiskRead | TrapKind::KeyboardRead)
    }
}

impl TryFrom<u64> for TrapKind {
    type Error = KernelError;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TrapKind::DiskRead),
            1 => Ok(TrapKind::DiskWrite),
            2 => Ok(TrapKind::KeyboardRead),
            3 => Ok(TrapKind::Fork),
            4 => Ok(TrapKind::Exit),
            _ => Err(KernelError::UnknownTrap(code)),
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrapKind::DiskRead => write!(f, "DISK_READ"),
            TrapKind::DiskWrite => write!(f, "DISK_WRITE"),
            TrapKind::KeyboardRead => write!(f, "KEYBOARD_READ"),
            TrapKind::Fork => write!(f, "FORK_PROGRAM"),
            TrapKind::Exit => write!(f, "END_PROGRAM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_decode_back() {
        for kind in [
            TrapKind::DiskRead,
            TrapKind::DiskWrite,
            TrapKind::KeyboardRead,
            TrapKind::Fork,
            TrapKind::Exit,
        ] {
            assert_eq!(TrapKind::try_from(kind.code()), Ok(kind));
        }
    }

    #[test]
    fn unknown_code_is_fatal() {
        assert_eq!(TrapKind::try_from(9), Err(KernelError::UnknownTrap(9)));
    }

    #[test]
    fn only_reads_block() {
        assert!(TrapKind::DiskRead.blocks());
        assert!(TrapKind::KeyboardRead.blocks());
        assert!(!TrapKind::DiskWrite.blocks());
        assert!(!TrapKind::Fork.blocks());
    }
}
