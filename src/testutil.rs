//! Recording fakes for register and control-line traffic
//!
//! The protocol tests assert on the exact sequence of set/clear register
//! writes and control-line transitions, so the fakes share one ordered
//! event log.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::{DATA_SHIFT, WR_BIT};
use crate::gpio::{GpioPort, Level, OutputPin};
use crate::Result;

/// Which control line a recorded transition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineId {
    ChipSelect,
    CommandData,
    WriteStrobe,
    ReadStrobe,
}

/// One observed bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    SetBits(u32),
    ClearBits(u32),
    Line(LineId, Level),
}

/// Shared chronological log of everything the bus did.
pub type EventLog = Rc<RefCell<Vec<BusEvent>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Register-port fake appending to the shared log.
pub struct RecordingPort {
    log: EventLog,
}

impl RecordingPort {
    pub fn new(log: EventLog) -> Self {
        RecordingPort { log }
    }
}

impl GpioPort for RecordingPort {
    fn set_bits(&mut self, mask: u32) {
        self.log.borrow_mut().push(BusEvent::SetBits(mask));
    }

    fn clear_bits(&mut self, mask: u32) {
        self.log.borrow_mut().push(BusEvent::ClearBits(mask));
    }
}

/// Control-line fake appending to the shared log.
pub struct RecordingPin {
    id: LineId,
    log: EventLog,
}

impl RecordingPin {
    pub fn new(id: LineId, log: EventLog) -> Self {
        RecordingPin { id, log }
    }
}

impl OutputPin for RecordingPin {
    fn write(&mut self, level: Level) -> Result<()> {
        self.log.borrow_mut().push(BusEvent::Line(self.id, level));
        Ok(())
    }
}

/// A byte presented on the data lines, split by the command/data select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presented {
    Command(u8),
    Data(u8),
}

/// Replay the log and extract every byte presented via the single-byte
/// write path, tagged command or data by the state of the select line.
///
/// Pure strobe writes (mask exactly the strobe bit) are skipped, so this
/// sees the first pixel of a fill but none of the strobe-only repeats.
pub fn presented_bytes(log: &[BusEvent]) -> Vec<Presented> {
    let mut command = false;
    let mut out = Vec::new();
    for event in log {
        match *event {
            BusEvent::Line(LineId::CommandData, level) => command = level == Level::Low,
            BusEvent::SetBits(mask) if mask != WR_BIT => {
                let byte = ((mask >> DATA_SHIFT) & 0xFF) as u8;
                out.push(if command {
                    Presented::Command(byte)
                } else {
                    Presented::Data(byte)
                });
            }
            _ => {}
        }
    }
    out
}

/// Count strobe-only toggles: clears of exactly the strobe bit.
pub fn strobe_toggles(log: &[BusEvent]) -> usize {
    log.iter()
        .filter(|event| matches!(event, BusEvent::ClearBits(mask) if *mask == WR_BIT))
        .count()
}

/// True when no event after `start` drives or releases a data line.
pub fn data_lines_untouched(log: &[BusEvent], start: usize) -> bool {
    const DATA_MASK: u32 = 0xFF << DATA_SHIFT;
    log[start..].iter().all(|event| match *event {
        BusEvent::SetBits(mask) | BusEvent::ClearBits(mask) => mask & DATA_MASK == 0,
        BusEvent::Line(..) => true,
    })
}
