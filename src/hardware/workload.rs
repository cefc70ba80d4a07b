// Scripted process programs for the hardware simulator
use std::collections::BTreeMap;

use crate::interrupts::Event;
use crate::process::pcb::{Clock, Pid};

/// One step of a simulated program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Use the CPU for this many clock units
    Compute(Clock),
    DiskRead(u64),
    DiskWrite,
    KeyboardRead,
    Fork(Pid),
    /// Terminate the issuing process
    Exit,
    /// Terminate another process
    Kill(Pid),
}

impl Op {
    /// The trap `pid` raises for this op; `None` for compute bursts.
    pub fn trap(self, pid: Pid) -> Option<Event> {
        match self {
            Op::Compute(_) => None,
            Op::DiskRead(block) => Some(Event::DiskRead { block }),
            Op::DiskWrite => Some(Event::DiskWrite),
            Op::KeyboardRead => Some(Event::KeyboardRead),
            Op::Fork(child) => Some(Event::Fork { child }),
            Op::Exit => Some(Event::Exit { pid }),
            Op::Kill(target) => Some(Event::Exit { pid: target }),
        }
    }
}

/// Program image per PID. A process restarts its program from the top
/// every time it is forked; running past the end exits it.
#[derive(Debug, Clone, Default)]
pub struct Workload {
    programs: BTreeMap<Pid, Vec<Op>>,
}

impl Workload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, pid: Pid, ops: Vec<Op>) -> Self {
        self.programs.insert(pid, ops);
        self
    }

    pub fn program(&self, pid: Pid) -> &[Op] {
        self.programs.get(&pid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total compute units scripted for `pid`.
    pub fn compute_time(&self, pid: Pid) -> Clock {
        self.program(pid)
            .iter()
            .map(|op| match op {
                Op::Compute(units) => *units,
                _ => 0,
            })
            .sum()
    }

    /// Three processes mixing compute, disk, keyboard and forks.
    pub fn demo() -> Self {
        let (init, editor, indexer) = (Pid::INIT, Pid::new(1), Pid::new(2));
        Workload::new()
            .with_program(
                init,
                vec![
                    Op::Compute(15),
                    Op::Fork(editor),
                    Op::Compute(30),
                    Op::DiskRead(7),
                    Op::Compute(50),
                    Op::Fork(indexer),
                    Op::Compute(20),
                    Op::KeyboardRead,
                    Op::Compute(10),
                    Op::Exit,
                ],
            )
            .with_program(
                editor,
                vec![
                    Op::Compute(60),
                    Op::DiskWrite,
                    Op::Compute(25),
                    Op::DiskRead(3),
                    Op::Compute(10),
                    Op::Exit,
                ],
            )
            .with_program(
                indexer,
                vec![Op::Compute(45), Op::KeyboardRead, Op::Compute(5), Op::Exit],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_empty() {
        let workload = Workload::new();
        assert!(workload.program(Pid::new(3)).is_empty());
        assert_eq!(workload.compute_time(Pid::new(3)), 0);
    }

    #[test]
    fn kill_targets_other_process() {
        let op = Op::Kill(Pid::new(4));
        assert_eq!(op.trap(Pid::new(1)), Some(Event::Exit { pid: Pid::new(4) }));
        assert_eq!(Op::Exit.trap(Pid::new(1)), Some(Event::Exit { pid: Pid::new(1) }));
        assert_eq!(Op::Compute(3).trap(Pid::new(1)), None);
    }

    #[test]
    fn demo_compute_totals() {
        let workload = Workload::demo();
        assert_eq!(workload.compute_time(Pid::INIT), 125);
        assert_eq!(workload.compute_time(Pid::new(1)), 95);
        assert_eq!(workload.compute_time(Pid::new(2)), 50);
    }
}
