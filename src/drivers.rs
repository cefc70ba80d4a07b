// Kernel-to-device request interface
use crate::process::pcb::Pid;

/// Requests the kernel forwards to the device layer.
///
/// Calls return immediately; completion comes back later as its own
/// interrupt (disk writes never complete visibly).
pub trait DeviceLayer {
    fn disk_read_request(&mut self, pid: Pid, block: u64);
    fn disk_write_request(&mut self, pid: Pid);
    fn keyboard_read_request(&mut self, pid: Pid);
}

/// A device request as seen by the device layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    DiskRead { pid: Pid, block: u64 },
    DiskWrite { pid: Pid },
    KeyboardRead { pid: Pid },
}

impl DeviceRequest {
    pub fn pid(&self) -> Pid {
        match *self {
            DeviceRequest::DiskRead { pid, .. }
            | DeviceRequest::DiskWrite { pid }
            | DeviceRequest::KeyboardRead { pid } => pid,
        }
    }
}

/// Device layer that only records what it was asked to do
#[derive(Debug, Default)]
pub struct RequestLog {
    requests: Vec<DeviceRequest>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[DeviceRequest] {
        &self.requests
    }

    pub fn take(&mut self) -> Vec<DeviceRequest> {
        std::mem::take(&mut self.requests)
    }
}

impl DeviceLayer for RequestLog {
    fn disk_read_request(&mut self, pid: Pid, block: u64) {
        self.requests.push(DeviceRequest::DiskRead { pid, block });
    }

    fn disk_write_request(&mut self, pid: Pid) {
        self.requests.push(DeviceRequest::DiskWrite { pid });
    }

    fn keyboard_read_request(&mut self, pid: Pid) {
        self.requests.push(DeviceRequest::KeyboardRead { pid });
    }
}
