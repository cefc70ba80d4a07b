// Process management: table, ready queue and dispatcher
pub mod pcb;
pub mod ready_queue;
pub mod scheduler;

pub use pcb::{Clock, Pid, ProcessControlBlock, ProcessState, ProcessTable, Slot};
pub use ready_queue::ReadyQueue;
pub use scheduler::{Scheduler, SchedulerStats};
