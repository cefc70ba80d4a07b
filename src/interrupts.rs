// Interrupt classes, register decoding and the dispatch table
use log::{debug, warn};

use crate::drivers::DeviceLayer;
use crate::error::KernelError;
use crate::kernel::Kernel;
use crate::process::pcb::{Clock, Pid};
use crate::syscalls::TrapKind;

pub const INTERRUPT_COUNT: usize = 4;

/// Interrupt classes delivered by the hardware simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptIndex {
    Trap = 0,
    Clock,
    Disk,
    Keyboard,
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.as_u8())
    }
}

/// Argument registers. R1 holds the trap code or completed PID, R2 the
/// target PID or block argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub r1: u64,
    pub r2: u64,
}

/// What a handler gets to see of the machine
pub struct InterruptContext<'a> {
    pub clock: Clock,
    pub registers: Registers,
    pub devices: &'a mut dyn DeviceLayer,
}

/// Whether the simulator should keep delivering interrupts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// The last process exited; the kernel is done.
    Halt,
}

/// A decoded interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    DiskRead { block: u64 },
    DiskWrite,
    KeyboardRead,
    Fork { child: Pid },
    Exit { pid: Pid },
    ClockTick,
    DiskComplete { pid: Pid },
    KeyboardComplete { pid: Pid },
}

impl Event {
    /// Builds an event from an interrupt class and its registers.
    ///
    /// Only the width of PID registers is checked here; bounds against the
    /// process table are checked when the kernel takes the event.
    pub fn decode(index: InterruptIndex, registers: Registers) -> Result<Self, KernelError> {
        let event = match index {
            InterruptIndex::Trap => match TrapKind::try_from(registers.r1)? {
                TrapKind::DiskRead => Event::DiskRead { block: registers.r2 },
                TrapKind::DiskWrite => Event::DiskWrite,
                TrapKind::KeyboardRead => Event::KeyboardRead,
                TrapKind::Fork => Event::Fork {
                    child: raw_pid(registers.r2)?,
                },
                TrapKind::Exit => Event::Exit {
                    pid: raw_pid(registers.r2)?,
                },
            },
            InterruptIndex::Clock => Event::ClockTick,
            InterruptIndex::Disk => Event::DiskComplete {
                pid: raw_pid(registers.r1)?,
            },
            InterruptIndex::Keyboard => Event::KeyboardComplete {
                pid: raw_pid(registers.r1)?,
            },
        };
        Ok(event)
    }

    /// The interrupt class and register values that deliver this event.
    pub fn encode(&self) -> (InterruptIndex, Registers) {
        let trap = |kind: TrapKind, r2: u64| {
            (
                InterruptIndex::Trap,
                Registers {
                    r1: kind.code(),
                    r2,
                },
            )
        };
        match *self {
            Event::DiskRead { block } => trap(TrapKind::DiskRead, block),
            Event::DiskWrite => trap(TrapKind::DiskWrite, 0),
            Event::KeyboardRead => trap(TrapKind::KeyboardRead, 0),
            Event::Fork { child } => trap(TrapKind::Fork, child.index() as u64),
            Event::Exit { pid } => trap(TrapKind::Exit, pid.index() as u64),
            Event::ClockTick => (InterruptIndex::Clock, Registers::default()),
            Event::DiskComplete { pid } => (
                InterruptIndex::Disk,
                Registers {
                    r1: pid.index() as u64,
                    r2: 0,
                },
            ),
            Event::KeyboardComplete { pid } => (
                InterruptIndex::Keyboard,
                Registers {
                    r1: pid.index() as u64,
                    r2: 0,
                },
            ),
        }
    }
}

fn raw_pid(raw: u64) -> Result<Pid, KernelError> {
    usize::try_from(raw)
        .map(Pid::new)
        .map_err(|_| KernelError::InvalidPid(raw))
}

/// Handler signature stored in the interrupt table
pub type InterruptHandler =
    fn(&mut Kernel, &mut InterruptContext<'_>) -> Result<Control, KernelError>;

/// Interrupt class to handler table, owned by the hardware simulator
#[derive(Clone, Default)]
pub struct InterruptTable {
    handlers: [Option<InterruptHandler>; INTERRUPT_COUNT],
}

impl InterruptTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, index: InterruptIndex, handler: InterruptHandler) {
        self.handlers[index.as_usize()] = Some(handler);
    }

    pub fn is_registered(&self, index: InterruptIndex) -> bool {
        self.handlers[index.as_usize()].is_some()
    }

    /// Runs the handler for `index`. An empty entry drops the interrupt.
    pub fn dispatch(
        &self,
        index: InterruptIndex,
        kernel: &mut Kernel,
        ctx: &mut InterruptContext<'_>,
    ) -> Result<Control, KernelError> {
        match self.handlers[index.as_usize()] {
            Some(handler) => handler(kernel, ctx),
            None => {
                warn!("Time {}: no handler for {:?}, interrupt dropped", ctx.clock, index);
                Ok(Control::Continue)
            }
        }
    }
}

/// Installs the kernel's four handlers.
pub fn install(table: &mut InterruptTable) {
    table.register(InterruptIndex::Trap, trap_handler);
    table.register(InterruptIndex::Clock, clock_interrupt_handler);
    table.register(InterruptIndex::Disk, disk_interrupt_handler);
    table.register(InterruptIndex::Keyboard, keyboard_interrupt_handler);
}

fn deliver(
    index: InterruptIndex,
    kernel: &mut Kernel,
    ctx: &mut InterruptContext<'_>,
) -> Result<Control, KernelError> {
    let event = Event::decode(index, ctx.registers).map_err(|error| kernel.fail(error))?;
    kernel.handle_event(event, ctx.clock, &mut *ctx.devices)
}

pub fn trap_handler(
    kernel: &mut Kernel,
    ctx: &mut InterruptContext<'_>,
) -> Result<Control, KernelError> {
    debug!("IN HANDLE_TRAP. Clock = {} Trap = {}", ctx.clock, ctx.registers.r1);
    deliver(InterruptIndex::Trap, kernel, ctx)
}

pub fn clock_interrupt_handler(
    kernel: &mut Kernel,
    ctx: &mut InterruptContext<'_>,
) -> Result<Control, KernelError> {
    deliver(InterruptIndex::Clock, kernel, ctx)
}

pub fn disk_interrupt_handler(
    kernel: &mut Kernel,
    ctx: &mut InterruptContext<'_>,
) -> Result<Control, KernelError> {
    deliver(InterruptIndex::Disk, kernel, ctx)
}

pub fn keyboard_interrupt_handler(
    kernel: &mut Kernel,
    ctx: &mut InterruptContext<'_>,
) -> Result<Control, KernelError> {
    deliver(InterruptIndex::Keyboard, kernel, ctx)
}
