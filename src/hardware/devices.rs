// Simulated disk and keyboard with fixed service latencies
use std::collections::VecDeque;

use crate::config::SimConfig;
use crate::drivers::{DeviceLayer, DeviceRequest, RequestLog};
use crate::interrupts::Event;
use crate::process::pcb::{Clock, Pid};

/// A finished device read, waiting to be delivered as an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Disk(Pid),
    Keyboard(Pid),
}

impl Completion {
    pub fn event(self) -> Event {
        match self {
            Completion::Disk(pid) => Event::DiskComplete { pid },
            Completion::Keyboard(pid) => Event::KeyboardComplete { pid },
        }
    }
}

/// Single-server FIFO device
#[derive(Debug)]
struct Channel {
    latency: Clock,
    busy_until: Clock,
    pending: VecDeque<(Clock, Pid)>,
}

impl Channel {
    fn new(latency: Clock) -> Self {
        Self {
            latency,
            busy_until: 0,
            pending: VecDeque::new(),
        }
    }

    fn submit(&mut self, now: Clock, pid: Pid) {
        let due = now.max(self.busy_until) + self.latency;
        self.busy_until = due;
        self.pending.push_back((due, pid));
    }

    fn next_due(&self) -> Option<Clock> {
        self.pending.front().map(|&(due, _)| due)
    }

    fn pop(&mut self) -> Option<Pid> {
        self.pending.pop_front().map(|(_, pid)| pid)
    }
}

/// Device layer of the simulator: queues reads and hands back completions
/// once their latency has passed.
#[derive(Debug)]
pub struct SimDevices {
    now: Clock,
    disk: Channel,
    keyboard: Channel,
    log: RequestLog,
}

impl SimDevices {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            now: 0,
            disk: Channel::new(config.disk_latency),
            keyboard: Channel::new(config.keyboard_latency),
            log: RequestLog::new(),
        }
    }

    /// Clock value stamped on requests made from now on.
    pub fn set_clock(&mut self, clock: Clock) {
        self.now = clock;
    }

    /// Next completion due at or before `clock`, disk first on ties.
    pub fn poll(&mut self, clock: Clock) -> Option<Completion> {
        let disk = self.disk.next_due().filter(|&due| due <= clock);
        let keyboard = self.keyboard.next_due().filter(|&due| due <= clock);
        match (disk, keyboard) {
            (Some(d), Some(k)) if k < d => self.keyboard.pop().map(Completion::Keyboard),
            (Some(_), _) => self.disk.pop().map(Completion::Disk),
            (None, Some(_)) => self.keyboard.pop().map(Completion::Keyboard),
            (None, None) => None,
        }
    }

    /// Reads still in flight
    pub fn in_flight(&self) -> usize {
        self.disk.pending.len() + self.keyboard.pending.len()
    }

    pub fn requests(&self) -> &[DeviceRequest] {
        self.log.requests()
    }

    pub fn take_requests(&mut self) -> Vec<DeviceRequest> {
        self.log.take()
    }
}

impl DeviceLayer for SimDevices {
    fn disk_read_request(&mut self, pid: Pid, block: u64) {
        self.disk.submit(self.now, pid);
        self.log.disk_read_request(pid, block);
    }

    fn disk_write_request(&mut self, pid: Pid) {
        self.log.disk_write_request(pid);
    }

    fn keyboard_read_request(&mut self, pid: Pid) {
        self.keyboard.submit(self.now, pid);
        self.log.keyboard_read_request(pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> SimDevices {
        SimDevices::new(&SimConfig {
            disk_latency: 10,
            keyboard_latency: 4,
            time_limit: 1000,
        })
    }

    #[test]
    fn reads_complete_after_latency() {
        let mut devices = devices();
        devices.set_clock(5);
        devices.disk_read_request(Pid::new(1), 0);
        assert_eq!(devices.poll(14), None);
        assert_eq!(devices.poll(15), Some(Completion::Disk(Pid::new(1))));
        assert_eq!(devices.poll(15), None);
    }

    #[test]
    fn disk_serves_requests_in_order() {
        let mut devices = devices();
        devices.set_clock(0);
        devices.disk_read_request(Pid::new(1), 0);
        devices.disk_read_request(Pid::new(2), 0);
        assert_eq!(devices.in_flight(), 2);
        assert_eq!(devices.poll(10), Some(Completion::Disk(Pid::new(1))));
        assert_eq!(devices.poll(19), None);
        assert_eq!(devices.poll(20), Some(Completion::Disk(Pid::new(2))));
    }

    #[test]
    fn earliest_completion_first() {
        let mut devices = devices();
        devices.set_clock(0);
        devices.disk_read_request(Pid::new(1), 0);
        devices.keyboard_read_request(Pid::new(2));
        assert_eq!(devices.poll(50), Some(Completion::Keyboard(Pid::new(2))));
        assert_eq!(devices.poll(50), Some(Completion::Disk(Pid::new(1))));
    }

    #[test]
    fn writes_are_logged_without_completion() {
        let mut devices = devices();
        devices.disk_write_request(Pid::new(3));
        assert_eq!(devices.in_flight(), 0);
        assert_eq!(devices.poll(100), None);
        assert_eq!(
            devices.take_requests(),
            vec![DeviceRequest::DiskWrite { pid: Pid::new(3) }]
        );
    }
}
