// Interrupt-driven round-robin kernel state machine
use log::{debug, error, info, warn};

use crate::config::KernelConfig;
use crate::drivers::DeviceLayer;
use crate::error::KernelError;
use crate::interrupts::{self, Control, Event, InterruptTable};
use crate::process::pcb::{Clock, Pid, ProcessControlBlock, ProcessState};
use crate::process::scheduler::Scheduler;

/// Owned scheduling state of the kernel.
///
/// Every interrupt is handed to [`Kernel::handle_event`] together with the
/// simulator's clock and device layer, runs to completion, and reports
/// whether the kernel is still alive. The first fatal error sticks: every
/// later event is refused with it.
#[derive(Debug)]
pub struct Kernel {
    config: KernelConfig,
    scheduler: Scheduler,
    num_processes: usize,
    halted: bool,
    failed: Option<KernelError>,
    exits: Vec<ProcessExit>,
}

/// Final accounting of a terminated process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub pid: Pid,
    pub clock: Clock,
    pub cpu_time_used: Clock,
}

/// System-wide snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStats {
    pub total_processes: usize,
    pub running_processes: usize,
    pub ready_processes: usize,
    pub blocked_processes: usize,
    pub current_process: Option<Pid>,
    pub ready_queue_len: usize,
    pub dispatches: u64,
    pub idle_dispatches: u64,
    pub preemptions: u64,
    pub exited_processes: usize,
}

/// Builds the kernel and registers its handlers with the simulator's table.
/// Must run once, before the first interrupt.
pub fn initialize_kernel(
    config: KernelConfig,
    table: &mut InterruptTable,
) -> Result<Kernel, KernelError> {
    let kernel = Kernel::new(config)?;
    interrupts::install(table);
    info!(
        "Kernel initialized: {} slots, quantum {}",
        config.max_processes, config.quantum
    );
    Ok(kernel)
}

impl Kernel {
    /// Fresh kernel with process 0 running since clock 0.
    pub fn new(config: KernelConfig) -> Result<Self, KernelError> {
        config.validate()?;
        let mut scheduler = Scheduler::new(config.max_processes, config.quantum);
        scheduler.reset(Pid::INIT, 0)?;
        info!("Time 0: Process {} runs", Pid::INIT);
        Ok(Self {
            config,
            scheduler,
            num_processes: 1,
            halted: false,
            failed: None,
            exits: Vec::new(),
        })
    }

    /// Applies one interrupt.
    pub fn handle_event(
        &mut self,
        event: Event,
        clock: Clock,
        devices: &mut dyn DeviceLayer,
    ) -> Result<Control, KernelError> {
        if let Some(error) = self.failed {
            return Err(error);
        }
        if self.halted {
            debug!("Time {}: kernel halted, {:?} ignored", clock, event);
            return Ok(Control::Halt);
        }
        match self.apply(event, clock, devices) {
            Ok(control) => {
                debug_assert!(self.is_consistent(), "scheduler invariants broken by {:?}", event);
                Ok(control)
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Records a fatal error and hands back the one that stopped the kernel.
    pub fn fail(&mut self, error: KernelError) -> KernelError {
        let first = *self.failed.get_or_insert(error);
        error!("Fatal kernel error: {}", first);
        first
    }

    fn apply(
        &mut self,
        event: Event,
        clock: Clock,
        devices: &mut dyn DeviceLayer,
    ) -> Result<Control, KernelError> {
        let control = match event {
            Event::DiskRead { block } => self.handle_disk_read(block, clock, devices)?,
            Event::DiskWrite => self.handle_disk_write(clock, devices)?,
            Event::KeyboardRead => self.handle_keyboard_read(clock, devices)?,
            Event::Fork { child } => self.handle_fork(child, clock)?,
            Event::Exit { pid } => self.handle_exit(pid, clock)?,
            Event::ClockTick => self.handle_clock_tick(clock)?,
            Event::DiskComplete { pid } => self.handle_completion(pid, clock, "DISK_INTERRUPT")?,
            Event::KeyboardComplete { pid } => {
                self.handle_completion(pid, clock, "KEYBOARD_INTERRUPT")?
            }
        };
        Ok(control)
    }

    fn handle_disk_read(
        &mut self,
        block: u64,
        clock: Clock,
        devices: &mut dyn DeviceLayer,
    ) -> Result<Control, KernelError> {
        let pid = self.scheduler.block_current(clock)?;
        devices.disk_read_request(pid, block);
        self.scheduler.choose_next_process(clock);
        Ok(Control::Continue)
    }

    fn handle_disk_write(
        &mut self,
        clock: Clock,
        devices: &mut dyn DeviceLayer,
    ) -> Result<Control, KernelError> {
        let pid = self.scheduler.current().ok_or(KernelError::NoCurrentProcess)?;
        devices.disk_write_request(pid);
        debug!("Time {}: Process {} writes to disk", clock, pid);
        Ok(Control::Continue)
    }

    fn handle_keyboard_read(
        &mut self,
        clock: Clock,
        devices: &mut dyn DeviceLayer,
    ) -> Result<Control, KernelError> {
        let pid = self.scheduler.block_current(clock)?;
        devices.keyboard_read_request(pid);
        self.scheduler.choose_next_process(clock);
        Ok(Control::Continue)
    }

    fn handle_fork(&mut self, child: Pid, clock: Clock) -> Result<Control, KernelError> {
        let child = self.scheduler.table().check(child)?;
        if self.scheduler.is_idle() {
            warn!("Time {}: fork of pid {} ignored, processor is idle", clock, child);
            return Ok(Control::Continue);
        }
        self.scheduler.table_mut().create(child)?;
        self.scheduler.make_ready(child)?;
        self.num_processes += 1;
        info!("Time {}: Creating process entry for pid {}", clock, child);
        Ok(Control::Continue)
    }

    /// Terminates `pid`. Only a process that holds the CPU is charged for
    /// the running slice; another process killed from outside keeps what
    /// it had and simply leaves the queue.
    fn handle_exit(&mut self, pid: Pid, clock: Clock) -> Result<Control, KernelError> {
        let pid = self.scheduler.table().check(pid)?;
        if self.scheduler.table().get(pid).is_none() {
            warn!("Time {}: exit of uninitialized pid {} ignored", clock, pid);
            return Ok(Control::Continue);
        }

        if self.scheduler.current() == Some(pid) {
            self.scheduler.accrue(pid, clock);
            self.scheduler.clear_current();
        } else {
            self.scheduler.ready_mut().remove(pid)?;
        }
        let cpu_time_used = self
            .scheduler
            .table_mut()
            .release(pid)
            .map_or(0, |pcb| pcb.cpu_time_used);
        self.exits.push(ProcessExit {
            pid,
            clock,
            cpu_time_used,
        });
        info!(
            "Time {}: Process {} exits. Total CPU time = {}",
            clock, pid, cpu_time_used
        );

        self.num_processes -= 1;
        if self.num_processes == 0 {
            info!("--No more processes to execute--");
            self.halted = true;
            self.scheduler.clear_current();
            return Ok(Control::Halt);
        }
        if self.scheduler.is_idle() {
            self.scheduler.choose_next_process(clock);
        }
        Ok(Control::Continue)
    }

    fn handle_clock_tick(&mut self, clock: Clock) -> Result<Control, KernelError> {
        if self.scheduler.quantum_expired(clock) {
            self.scheduler.preempt_current(clock)?;
        }
        Ok(Control::Continue)
    }

    fn handle_completion(
        &mut self,
        pid: Pid,
        clock: Clock,
        source: &str,
    ) -> Result<Control, KernelError> {
        let pid = self.scheduler.table().check(pid)?;
        match self.scheduler.table().state(pid) {
            Some(ProcessState::Blocked) => {}
            state => {
                warn!(
                    "Time {}: {} for pid {} ignored, process is {:?}",
                    clock, source, pid, state
                );
                return Ok(Control::Continue);
            }
        }
        self.scheduler.make_ready(pid)?;
        info!("Time {}: Handled {} for pid {}", clock, source, pid);
        if self.scheduler.is_idle() {
            self.scheduler.choose_next_process(clock);
        }
        Ok(Control::Continue)
    }

    /// Checks the table, queue and current cell against each other: the
    /// queue holds exactly the Ready processes, at most one process runs
    /// and it is the current one, and the process count matches the table.
    pub fn is_consistent(&self) -> bool {
        let table = self.scheduler.table();
        let ready = self.scheduler.ready();
        let queued = ready.pids();

        let queue_matches = queued.len() == table.count(ProcessState::Ready)
            && queued
                .iter()
                .all(|&pid| table.state(pid) == Some(ProcessState::Ready));
        let running: Vec<Pid> = table
            .iter()
            .filter(|(_, pcb)| pcb.state == ProcessState::Running)
            .map(|(pid, _)| pid)
            .collect();
        let current_matches = match self.scheduler.current() {
            Some(pid) => running == [pid],
            None => running.is_empty(),
        };
        queue_matches && current_matches && table.live_count() == self.num_processes
    }

    pub fn current(&self) -> Option<Pid> {
        self.scheduler.current()
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The fatal error that stopped the kernel, if any.
    pub fn failure(&self) -> Option<KernelError> {
        self.failed
    }

    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    /// State of `pid`, `None` if the slot is free or out of range.
    pub fn state(&self, pid: Pid) -> Option<ProcessState> {
        self.process(pid).map(|pcb| pcb.state)
    }

    pub fn process(&self, pid: Pid) -> Option<&ProcessControlBlock> {
        let table = self.scheduler.table();
        table.check(pid).ok().and_then(|pid| table.get(pid))
    }

    pub fn cpu_time_used(&self, pid: Pid) -> Option<Clock> {
        self.process(pid).map(|pcb| pcb.cpu_time_used)
    }

    /// Ready queue from head to tail
    pub fn ready_pids(&self) -> Vec<Pid> {
        self.scheduler.ready().pids()
    }

    pub fn exits(&self) -> &[ProcessExit] {
        &self.exits
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> SystemStats {
        let table = self.scheduler.table();
        let counters = self.scheduler.stats();
        SystemStats {
            total_processes: table.live_count(),
            running_processes: table.count(ProcessState::Running),
            ready_processes: table.count(ProcessState::Ready),
            blocked_processes: table.count(ProcessState::Blocked),
            current_process: self.scheduler.current(),
            ready_queue_len: self.scheduler.ready().len(),
            dispatches: counters.dispatches,
            idle_dispatches: counters.idle_dispatches,
            preemptions: counters.preemptions,
            exited_processes: self.exits.len(),
        }
    }
}
