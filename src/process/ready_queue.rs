// FIFO ready queue backed by a fixed-capacity ring buffer
use crossbeam_queue::ArrayQueue;

use crate::error::KernelError;
use crate::process::pcb::Pid;

/// Runnable processes in arrival order.
///
/// The ring holds at most one entry per process slot. `queued` mirrors ring
/// membership so a second enqueue of the same PID is caught instead of
/// silently duplicating it.
#[derive(Debug)]
pub struct ReadyQueue {
    ring: ArrayQueue<Pid>,
    queued: Vec<bool>,
}

impl ReadyQueue {
    /// `capacity` must match the process table and be non-zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity),
            queued: vec![false; capacity],
        }
    }

    /// Appends `pid` at the tail.
    pub fn enqueue(&mut self, pid: Pid) -> Result<(), KernelError> {
        let member = self
            .queued
            .get_mut(pid.index())
            .ok_or(KernelError::InvalidPid(pid.index() as u64))?;
        if *member {
            return Err(KernelError::AlreadyQueued(pid));
        }
        self.ring.push(pid).map_err(KernelError::QueueOverflow)?;
        *member = true;
        Ok(())
    }

    /// Removes the head, or `None` when nothing is ready (the CPU goes idle).
    pub fn dequeue(&mut self) -> Option<Pid> {
        let pid = self.ring.pop()?;
        self.queued[pid.index()] = false;
        Some(pid)
    }

    /// Takes `pid` out of the queue wherever it sits, keeping the order of
    /// everyone else. Returns whether it was queued.
    pub fn remove(&mut self, pid: Pid) -> Result<bool, KernelError> {
        if !self.contains(pid) {
            return Ok(false);
        }
        for _ in 0..self.ring.len() {
            if let Some(next) = self.ring.pop() {
                if next != pid {
                    self.ring.push(next).map_err(KernelError::QueueOverflow)?;
                }
            }
        }
        self.queued[pid.index()] = false;
        Ok(true)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.queued.get(pid.index()).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Snapshot of the queue from head to tail.
    pub fn pids(&self) -> Vec<Pid> {
        let mut pids = Vec::with_capacity(self.ring.len());
        for _ in 0..self.ring.len() {
            if let Some(pid) = self.ring.pop() {
                pids.push(pid);
            }
        }
        for &pid in &pids {
            // Room is guaranteed: every entry was just popped.
            let _ = self.ring.push(pid);
        }
        pids
    }

    pub fn clear(&mut self) {
        while self.ring.pop().is_some() {}
        self.queued.iter_mut().for_each(|member| *member = false);
    }
}
