// Kernel and simulator configuration
use crate::error::KernelError;
use crate::process::pcb::Clock;

/// Time slice for round-robin scheduling (in clock units)
pub const QUANTUM: Clock = 40;

/// Number of slots in the process table
pub const MAX_PROCESSES: usize = 16;

/// Clock units a disk read takes before its completion interrupt
pub const DISK_LATENCY: Clock = 25;

/// Clock units a keyboard read takes before its completion interrupt
pub const KEYBOARD_LATENCY: Clock = 60;

/// Hard stop for simulated runs that never finish
pub const TIME_LIMIT: Clock = 100_000;

/// Scheduling parameters fixed for the kernel's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub quantum: Clock,
    pub max_processes: usize,
}

impl KernelConfig {
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.quantum == 0 || self.max_processes == 0 {
            return Err(KernelError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            quantum: QUANTUM,
            max_processes: MAX_PROCESSES,
        }
    }
}

/// Device timing and run bounds for the hardware simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    pub disk_latency: Clock,
    pub keyboard_latency: Clock,
    pub time_limit: Clock,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            disk_latency: DISK_LATENCY,
            keyboard_latency: KEYBOARD_LATENCY,
            time_limit: TIME_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = KernelConfig::default();
        assert_eq!(config.quantum, 40);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = KernelConfig {
            quantum: QUANTUM,
            max_processes: 0,
        };
        assert_eq!(config.validate(), Err(KernelError::InvalidConfig));
    }
}
