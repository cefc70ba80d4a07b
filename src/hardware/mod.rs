// Hardware simulator driving the kernel: clock, registers, devices
pub mod devices;
pub mod workload;

use std::fmt;

use log::debug;

use crate::config::{KernelConfig, SimConfig};
use crate::drivers::DeviceRequest;
use crate::error::KernelError;
use crate::interrupts::{Control, Event, InterruptContext, InterruptTable, Registers};
use crate::kernel::{initialize_kernel, Kernel, ProcessExit, SystemStats};
use crate::process::pcb::{Clock, Pid};

pub use devices::{Completion, SimDevices};
pub use workload::{Op, Workload};

/// Why a simulated run stopped without the kernel halting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    Kernel(KernelError),
    TimeLimit(Clock),
}

impl From<KernelError> for SimError {
    fn from(error: KernelError) -> Self {
        SimError::Kernel(error)
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::Kernel(error) => write!(f, "Kernel error: {}", error),
            SimError::TimeLimit(clock) => write!(f, "Time limit reached at {}", clock),
        }
    }
}

impl std::error::Error for SimError {}

/// Outcome of a run that ended with the kernel halting
#[derive(Debug, Clone)]
pub struct RunReport {
    pub clock: Clock,
    pub stats: SystemStats,
    pub exits: Vec<ProcessExit>,
    pub requests: Vec<DeviceRequest>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    pc: usize,
    remaining: Option<Clock>,
}

/// The simulated machine.
///
/// Each [`Machine::step`] lets the running process issue its pending traps
/// and compute for one clock unit, advances the clock, delivers due device
/// completions and finally the clock interrupt.
pub struct Machine {
    clock: Clock,
    registers: Registers,
    table: InterruptTable,
    kernel: Kernel,
    devices: SimDevices,
    workload: Workload,
    cursors: Vec<Cursor>,
    config: SimConfig,
}

impl Machine {
    /// Initializes the kernel against a fresh interrupt table.
    pub fn boot(
        kernel_config: KernelConfig,
        config: SimConfig,
        workload: Workload,
    ) -> Result<Self, SimError> {
        let mut table = InterruptTable::new();
        let kernel = initialize_kernel(kernel_config, &mut table)?;
        Ok(Self {
            clock: 0,
            registers: Registers::default(),
            table,
            kernel,
            devices: SimDevices::new(&config),
            workload,
            cursors: vec![Cursor::default(); kernel_config.max_processes],
            config,
        })
    }

    /// Loads the registers for `event` and runs the registered handler.
    pub fn interrupt(&mut self, event: Event) -> Result<Control, KernelError> {
        let (index, registers) = event.encode();
        self.registers = registers;
        self.devices.set_clock(self.clock);
        let mut ctx = InterruptContext {
            clock: self.clock,
            registers,
            devices: &mut self.devices,
        };
        self.table.dispatch(index, &mut self.kernel, &mut ctx)
    }

    pub fn step(&mut self) -> Result<Control, SimError> {
        if self.run_current()? == Control::Halt {
            return Ok(Control::Halt);
        }
        self.clock += 1;
        while let Some(completion) = self.devices.poll(self.clock) {
            if self.interrupt(completion.event())? == Control::Halt {
                return Ok(Control::Halt);
            }
        }
        Ok(self.interrupt(Event::ClockTick)?)
    }

    /// Steps until the kernel halts or the time limit is hit.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        loop {
            if self.clock >= self.config.time_limit {
                return Err(SimError::TimeLimit(self.clock));
            }
            if self.step()? == Control::Halt {
                break;
            }
        }
        Ok(RunReport {
            clock: self.clock,
            stats: self.kernel.stats(),
            exits: self.kernel.exits().to_vec(),
            requests: self.devices.requests().to_vec(),
        })
    }

    /// Issues the running process's traps until it computes for one unit
    /// or the CPU goes idle. Whoever holds the CPU after a trap continues
    /// in the same unit.
    fn run_current(&mut self) -> Result<Control, SimError> {
        while let Some(pid) = self.kernel.current() {
            let op = self.next_op(pid);
            match op {
                Op::Compute(0) => self.advance(pid),
                Op::Compute(units) => {
                    let cursor = &mut self.cursors[pid.index()];
                    let left = cursor.remaining.get_or_insert(units);
                    *left -= 1;
                    if *left == 0 {
                        cursor.remaining = None;
                        cursor.pc += 1;
                    }
                    return Ok(Control::Continue);
                }
                Op::Fork(child) => {
                    self.advance(pid);
                    if let Some(cursor) = self.cursors.get_mut(child.index()) {
                        *cursor = Cursor::default();
                    }
                    if self.interrupt(Event::Fork { child })? == Control::Halt {
                        return Ok(Control::Halt);
                    }
                }
                trap => {
                    self.advance(pid);
                    if let Some(event) = trap.trap(pid) {
                        debug!("Time {}: process {} traps with {:?}", self.clock, pid, event);
                        if self.interrupt(event)? == Control::Halt {
                            return Ok(Control::Halt);
                        }
                    }
                }
            }
        }
        Ok(Control::Continue)
    }

    /// Current op of `pid`; past the end of its program it exits.
    fn next_op(&self, pid: Pid) -> Op {
        let pc = self.cursors[pid.index()].pc;
        self.workload.program(pid).get(pc).copied().unwrap_or(Op::Exit)
    }

    fn advance(&mut self, pid: Pid) {
        let cursor = &mut self.cursors[pid.index()];
        cursor.pc += 1;
        cursor.remaining = None;
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn registers(&self) -> Registers {
        self.registers
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn devices(&self) -> &SimDevices {
        &self.devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::pcb::ProcessState;

    fn boot(workload: Workload) -> Machine {
        Machine::boot(KernelConfig::default(), SimConfig::default(), workload).unwrap()
    }

    #[test]
    fn compute_only_process_exits_with_its_work() {
        let mut machine = boot(Workload::new().with_program(Pid::INIT, vec![Op::Compute(90)]));
        let report = machine.run().unwrap();
        assert_eq!(report.clock, 90);
        assert_eq!(report.exits.len(), 1);
        assert_eq!(report.exits[0].cpu_time_used, 90);
        assert!(machine.kernel().is_halted());
    }

    #[test]
    fn blocked_process_resumes_after_disk_latency() {
        let workload = Workload::new().with_program(
            Pid::INIT,
            vec![Op::Compute(5), Op::DiskRead(1), Op::Compute(5)],
        );
        let mut machine = boot(workload);
        for _ in 0..5 {
            machine.step().unwrap();
        }
        machine.step().unwrap();
        assert_eq!(machine.kernel().state(Pid::INIT), Some(ProcessState::Blocked));
        assert!(machine.kernel().is_idle());

        let report = machine.run().unwrap();
        assert_eq!(report.exits[0].cpu_time_used, 10);
        assert_eq!(report.clock, 5 + SimConfig::default().disk_latency + 5);
    }

    #[test]
    fn fork_restarts_child_program() {
        let child = Pid::new(1);
        let workload = Workload::new()
            .with_program(Pid::INIT, vec![Op::Fork(child), Op::Compute(10)])
            .with_program(child, vec![Op::Compute(10)]);
        let mut machine = boot(workload);
        let report = machine.run().unwrap();
        assert_eq!(report.exits.len(), 2);
        assert_eq!(report.clock, 20);
        assert!(report.exits.iter().all(|exit| exit.cpu_time_used == 10));
    }

    #[test]
    fn unknown_fork_target_stops_the_run() {
        let workload = Workload::new().with_program(Pid::INIT, vec![Op::Fork(Pid::new(99))]);
        let mut machine = boot(workload);
        assert_eq!(
            machine.run().err(),
            Some(SimError::Kernel(KernelError::InvalidPid(99)))
        );

        // The kernel refuses to go on after the fault.
        assert_eq!(
            machine.step().err(),
            Some(SimError::Kernel(KernelError::InvalidPid(99)))
        );
        assert_eq!(machine.kernel().current(), Some(Pid::INIT));
        assert!(machine.kernel().exits().is_empty());
    }

    #[test]
    fn traps_are_issued_before_the_clock_advances() {
        let workload =
            Workload::new().with_program(Pid::INIT, vec![Op::Compute(5), Op::DiskRead(1)]);
        let mut machine = boot(workload);
        for _ in 0..6 {
            machine.step().unwrap();
        }
        assert_eq!(machine.clock(), 6);
        // Charged at clock 5, the moment the read was issued.
        assert_eq!(machine.kernel().cpu_time_used(Pid::INIT), Some(5));
        assert_eq!(
            machine.devices().requests(),
            &[DeviceRequest::DiskRead {
                pid: Pid::INIT,
                block: 1
            }]
        );
        assert_eq!(machine.devices().in_flight(), 1);
    }

    #[test]
    fn endless_program_hits_time_limit() {
        let workload = Workload::new().with_program(Pid::INIT, vec![Op::Compute(Clock::MAX)]);
        let config = SimConfig {
            time_limit: 200,
            ..SimConfig::default()
        };
        let mut machine = Machine::boot(KernelConfig::default(), config, workload).unwrap();
        assert_eq!(machine.run().err(), Some(SimError::TimeLimit(200)));
    }

    #[test]
    fn trap_registers_are_visible() {
        let workload = Workload::new().with_program(Pid::INIT, vec![Op::DiskRead(33)]);
        let mut machine = boot(workload);
        machine.step().unwrap();
        // The clock interrupt was the last delivery of the step.
        assert_eq!(machine.registers(), Registers::default());
        assert_eq!(
            machine.devices().requests(),
            &[DeviceRequest::DiskRead {
                pid: Pid::INIT,
                block: 33
            }]
        );
    }
}
