//! rrkernel: the scheduling core of a single-CPU, preemptive round-robin
//! kernel, driven by a simulated interrupt-delivering machine.
//!
//! The kernel owns a fixed-size process table and a FIFO ready queue and
//! reacts to four interrupt classes: traps raised by the running process,
//! clock ticks, disk completions and keyboard completions.

pub mod config;
pub mod console;
pub mod drivers;
pub mod error;
pub mod hardware;
pub mod interrupts;
pub mod kernel;
pub mod process;
pub mod syscalls;

pub use config::{KernelConfig, SimConfig, MAX_PROCESSES, QUANTUM};
pub use drivers::{DeviceLayer, DeviceRequest, RequestLog};
pub use error::KernelError;
pub use interrupts::{Control, Event, InterruptIndex, InterruptTable, Registers};
pub use kernel::{initialize_kernel, Kernel, ProcessExit, SystemStats};
pub use process::{Clock, Pid, ProcessState};
