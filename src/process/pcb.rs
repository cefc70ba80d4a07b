// Process Control Block (PCB) and fixed-capacity process table
use std::fmt;
use std::mem;

use crate::error::KernelError;

/// Simulated clock value, in milliseconds
pub type Clock = u64;

/// Process ID: index of a slot in the process table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(usize);

impl Pid {
    /// The process started by kernel initialization
    pub const INIT: Pid = Pid(0);

    /// Wraps a raw slot index. Bounds are checked against a table, never
    /// here; table lookups past the end yield `None` or `InvalidPid`.
    pub const fn new(index: usize) -> Self {
        Pid(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a live process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,   // Waiting in the ready queue
    Running, // Holding the CPU
    Blocked, // Waiting for a disk or keyboard completion
}

/// Per-process scheduling record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessControlBlock {
    pub state: ProcessState,
    pub cpu_time_used: Clock,
    /// Clock value when the process last started running; only meaningful
    /// while `state == Running`.
    pub quantum_start_time: Clock,
}

impl ProcessControlBlock {
    pub fn new() -> Self {
        Self {
            state: ProcessState::Ready,
            cpu_time_used: 0,
            quantum_start_time: 0,
        }
    }

    /// Time spent on the CPU since the current quantum began.
    pub fn elapsed(&self, clock: Clock) -> Clock {
        clock.saturating_sub(self.quantum_start_time)
    }

    /// Charges the running slice to this process and returns the amount charged.
    pub fn accrue(&mut self, clock: Clock) -> Clock {
        let slice = self.elapsed(clock);
        self.cpu_time_used += slice;
        slice
    }
}

impl Default for ProcessControlBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of the process table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Free slot; no queue membership, no accounting
    Uninitialized,
    Active(ProcessControlBlock),
}

/// Fixed-capacity mapping from PID to slot. Never resized after creation.
#[derive(Debug)]
pub struct ProcessTable {
    slots: Vec<Slot>,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize(capacity, Slot::Uninitialized);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Converts a raw register value into a PID, rejecting anything outside the table.
    pub fn pid_from_raw(&self, raw: u64) -> Result<Pid, KernelError> {
        match usize::try_from(raw) {
            Ok(index) if index < self.slots.len() => Ok(Pid(index)),
            _ => Err(KernelError::InvalidPid(raw)),
        }
    }

    /// Bounds check for PIDs built outside the table.
    pub fn check(&self, pid: Pid) -> Result<Pid, KernelError> {
        if pid.0 < self.slots.len() {
            Ok(pid)
        } else {
            Err(KernelError::InvalidPid(pid.0 as u64))
        }
    }

    /// The slot behind `pid`, `None` past the end of the table.
    pub fn slot(&self, pid: Pid) -> Option<&Slot> {
        self.slots.get(pid.0)
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessControlBlock> {
        match self.slots.get(pid.0) {
            Some(Slot::Active(pcb)) => Some(pcb),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessControlBlock> {
        match self.slots.get_mut(pid.0) {
            Some(Slot::Active(pcb)) => Some(pcb),
            _ => None,
        }
    }

    /// State of the slot, `None` when uninitialized.
    pub fn state(&self, pid: Pid) -> Option<ProcessState> {
        self.get(pid).map(|pcb| pcb.state)
    }

    /// Occupies a free slot with a fresh Ready process.
    pub fn create(&mut self, pid: Pid) -> Result<(), KernelError> {
        let slot = self
            .slots
            .get_mut(pid.0)
            .ok_or(KernelError::InvalidPid(pid.0 as u64))?;
        if let Slot::Active(_) = slot {
            return Err(KernelError::SlotInUse(pid));
        }
        *slot = Slot::Active(ProcessControlBlock::new());
        Ok(())
    }

    /// Frees a slot and hands back its last record.
    pub fn release(&mut self, pid: Pid) -> Option<ProcessControlBlock> {
        let slot = self.slots.get_mut(pid.0)?;
        match mem::replace(slot, Slot::Uninitialized) {
            Slot::Active(pcb) => Some(pcb),
            Slot::Uninitialized => None,
        }
    }

    /// Marks every slot uninitialized.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = Slot::Uninitialized);
    }

    /// Live processes in PID order
    pub fn iter(&self) -> impl Iterator<Item = (Pid, &ProcessControlBlock)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Active(pcb) => Some((Pid(index), pcb)),
            Slot::Uninitialized => None,
        })
    }

    pub fn count(&self, state: ProcessState) -> usize {
        self.iter().filter(|(_, pcb)| pcb.state == state).count()
    }

    pub fn live_count(&self) -> usize {
        self.iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_all_uninitialized() {
        let table = ProcessTable::new(4);
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.live_count(), 0);
        assert_eq!(table.slot(Pid::new(3)), Some(&Slot::Uninitialized));
    }

    #[test]
    fn raw_pids_are_bounds_checked() {
        let table = ProcessTable::new(4);
        assert_eq!(table.pid_from_raw(3), Ok(Pid::new(3)));
        assert_eq!(table.pid_from_raw(4), Err(KernelError::InvalidPid(4)));
        assert_eq!(table.pid_from_raw(u64::MAX), Err(KernelError::InvalidPid(u64::MAX)));
        assert_eq!(table.check(Pid::new(9)), Err(KernelError::InvalidPid(9)));
    }

    #[test]
    fn create_refuses_live_slot() {
        let mut table = ProcessTable::new(2);
        let pid = Pid::new(1);
        table.create(pid).unwrap();
        table.get_mut(pid).unwrap().cpu_time_used = 7;
        assert_eq!(table.state(pid), Some(ProcessState::Ready));
        assert_eq!(table.create(pid), Err(KernelError::SlotInUse(pid)));
        assert_eq!(table.get(pid).unwrap().cpu_time_used, 7);
    }

    #[test]
    fn release_frees_slot_for_reuse() {
        let mut table = ProcessTable::new(2);
        let pid = Pid::new(1);
        table.create(pid).unwrap();
        table.get_mut(pid).unwrap().cpu_time_used = 12;
        let last = table.release(pid).unwrap();
        assert_eq!(last.cpu_time_used, 12);
        assert_eq!(table.state(pid), None);
        assert_eq!(table.release(pid), None);

        table.create(pid).unwrap();
        assert_eq!(table.get(pid).unwrap().cpu_time_used, 0);
    }

    #[test]
    fn lookups_past_the_end_do_not_panic() {
        let mut table = ProcessTable::new(2);
        let far = Pid::new(7);
        assert_eq!(table.slot(far), None);
        assert_eq!(table.get(far), None);
        assert!(table.get_mut(far).is_none());
        assert_eq!(table.state(far), None);
        assert_eq!(table.release(far), None);
        assert_eq!(table.create(far), Err(KernelError::InvalidPid(7)));
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn accrue_adds_elapsed_slice() {
        let mut pcb = ProcessControlBlock::new();
        pcb.quantum_start_time = 10;
        assert_eq!(pcb.accrue(25), 15);
        assert_eq!(pcb.cpu_time_used, 15);
        pcb.quantum_start_time = 30;
        assert_eq!(pcb.accrue(30), 0);
        assert_eq!(pcb.cpu_time_used, 15);
    }
}
