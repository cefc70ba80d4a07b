// Round-robin process scheduler for rrkernel
use log::info;

use crate::error::KernelError;
use crate::process::pcb::{Clock, Pid, ProcessState, ProcessTable};
use crate::process::ready_queue::ReadyQueue;

/// Process table, ready queue and the CPU's current occupant.
///
/// `current` is `None` while the CPU idles. Only [`Scheduler::choose_next_process`]
/// moves a process into `Running`.
#[derive(Debug)]
pub struct Scheduler {
    table: ProcessTable,
    ready: ReadyQueue,
    current: Option<Pid>,
    quantum: Clock,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(capacity: usize, quantum: Clock) -> Self {
        Self {
            table: ProcessTable::new(capacity),
            ready: ReadyQueue::new(capacity),
            current: None,
            quantum,
            stats: SchedulerStats::default(),
        }
    }

    /// Clears every slot and the queue, then puts `pid` on the CPU at `clock`
    /// with no CPU time charged.
    pub fn reset(&mut self, pid: Pid, clock: Clock) -> Result<(), KernelError> {
        self.table.reset();
        self.ready.clear();
        self.stats = SchedulerStats::default();
        self.table.create(pid)?;
        if let Some(pcb) = self.table.get_mut(pid) {
            pcb.state = ProcessState::Running;
            pcb.quantum_start_time = clock;
        }
        self.current = Some(pid);
        Ok(())
    }

    /// Pops the ready queue and gives the CPU to the head, or idles.
    pub fn choose_next_process(&mut self, clock: Clock) -> Option<Pid> {
        self.current = self.ready.dequeue();
        match self.current {
            Some(pid) => {
                if let Some(pcb) = self.table.get_mut(pid) {
                    pcb.state = ProcessState::Running;
                    pcb.quantum_start_time = clock;
                }
                self.stats.dispatches += 1;
                info!("Time {}: Process {} runs", clock, pid);
            }
            None => {
                self.stats.idle_dispatches += 1;
                info!("Time {}: Processor is idle", clock);
            }
        }
        self.current
    }

    /// Marks `pid` Ready and appends it to the queue.
    pub fn make_ready(&mut self, pid: Pid) -> Result<(), KernelError> {
        let pid = self.table.check(pid)?;
        if let Some(pcb) = self.table.get_mut(pid) {
            pcb.state = ProcessState::Ready;
        }
        self.ready.enqueue(pid)
    }

    /// Whether the running process has held the CPU for a full quantum.
    pub fn quantum_expired(&self, clock: Clock) -> bool {
        self.current
            .and_then(|pid| self.table.get(pid))
            .map_or(false, |pcb| pcb.elapsed(clock) >= self.quantum)
    }

    /// Charges the current process, sends it to the back of the queue and
    /// dispatches the next one.
    pub fn preempt_current(&mut self, clock: Clock) -> Result<Option<Pid>, KernelError> {
        let pid = match self.current {
            Some(pid) => pid,
            None => return Ok(None),
        };
        let slice = self.accrue(pid, clock);
        self.make_ready(pid)?;
        self.stats.preemptions += 1;
        info!("Time {}: Process {} preempted after {}", clock, pid, slice);
        Ok(self.choose_next_process(clock))
    }

    /// Charges the current process and parks it as Blocked. The caller
    /// dispatches once the device request is out.
    pub fn block_current(&mut self, clock: Clock) -> Result<Pid, KernelError> {
        let pid = self.current.ok_or(KernelError::NoCurrentProcess)?;
        if let Some(pcb) = self.table.get_mut(pid) {
            pcb.state = ProcessState::Blocked;
            pcb.accrue(clock);
        }
        info!("Time {}: Process {} blocks", clock, pid);
        Ok(pid)
    }

    /// Adds the running slice of `pid` to its CPU time.
    pub fn accrue(&mut self, pid: Pid, clock: Clock) -> Clock {
        self.table.get_mut(pid).map_or(0, |pcb| pcb.accrue(clock))
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Gives up the CPU without dispatching anyone.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut ProcessTable {
        &mut self.table
    }

    pub fn ready(&self) -> &ReadyQueue {
        &self.ready
    }

    pub fn ready_mut(&mut self) -> &mut ReadyQueue {
        &mut self.ready
    }

    pub fn quantum(&self) -> Clock {
        self.quantum
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Dispatches that put a process on the CPU
    pub dispatches: u64,
    /// Dispatches that found the queue empty
    pub idle_dispatches: u64,
    pub preemptions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> Scheduler {
        let mut scheduler = Scheduler::new(4, 40);
        scheduler.reset(Pid::INIT, 0).unwrap();
        scheduler
    }

    #[test]
    fn reset_runs_init_process() {
        let scheduler = scheduler();
        assert_eq!(scheduler.current(), Some(Pid::INIT));
        assert_eq!(scheduler.table().state(Pid::INIT), Some(ProcessState::Running));
        assert_eq!(scheduler.table().live_count(), 1);
        assert!(scheduler.ready().is_empty());
    }

    #[test]
    fn make_ready_rejects_pid_past_table() {
        let mut scheduler = scheduler();
        assert_eq!(
            scheduler.make_ready(Pid::new(4)),
            Err(KernelError::InvalidPid(4))
        );
        assert!(scheduler.ready().is_empty());
    }

    #[test]
    fn dispatch_on_empty_queue_idles() {
        let mut scheduler = scheduler();
        scheduler.block_current(5).unwrap();
        assert_eq!(scheduler.choose_next_process(5), None);
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.stats().idle_dispatches, 1);
        assert_eq!(scheduler.table().get(Pid::INIT).unwrap().cpu_time_used, 5);
    }

    #[test]
    fn dispatch_stamps_quantum_start() {
        let mut scheduler = scheduler();
        let child = Pid::new(2);
        scheduler.table_mut().create(child).unwrap();
        scheduler.make_ready(child).unwrap();
        scheduler.block_current(12).unwrap();

        assert_eq!(scheduler.choose_next_process(12), Some(child));
        let pcb = scheduler.table().get(child).unwrap();
        assert_eq!(pcb.state, ProcessState::Running);
        assert_eq!(pcb.quantum_start_time, 12);
        assert_eq!(scheduler.stats().dispatches, 1);
    }

    #[test]
    fn quantum_boundary_is_inclusive() {
        let scheduler = scheduler();
        assert!(!scheduler.quantum_expired(39));
        assert!(scheduler.quantum_expired(40));
        assert!(scheduler.quantum_expired(41));
    }

    #[test]
    fn preempt_rotates_to_next_ready() {
        let mut scheduler = scheduler();
        let child = Pid::new(1);
        scheduler.table_mut().create(child).unwrap();
        scheduler.make_ready(child).unwrap();

        assert_eq!(scheduler.preempt_current(40), Ok(Some(child)));
        assert_eq!(scheduler.table().state(Pid::INIT), Some(ProcessState::Ready));
        assert_eq!(scheduler.table().get(Pid::INIT).unwrap().cpu_time_used, 40);
        assert_eq!(scheduler.ready().pids(), vec![Pid::INIT]);
    }

    #[test]
    fn block_without_current_is_fatal() {
        let mut scheduler = scheduler();
        scheduler.block_current(1).unwrap();
        scheduler.choose_next_process(1);
        assert_eq!(scheduler.block_current(2), Err(KernelError::NoCurrentProcess));
    }
}
