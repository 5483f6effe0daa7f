//! Display protocol engine
//!
//! 8080-style parallel bus over the GPIO fast path: eight data lines plus
//! a write strobe live in one register group, the remaining control lines
//! go through the slow per-pin path. A byte write presents the value by
//! setting the one bits and clearing the zero bits, then pulses the
//! strobe; the controller latches on the strobe's rising edge.
//!
//! Two strobe timings are supported, selected by [`StrobeTiming`]. The
//! engine also carries the addressing-window write and the block fill,
//! whose strobe-only fast path depends on the register block's bus-state
//! retention (see [`crate::gpio::GpioRegisterBlock`]).

use serde::{Deserialize, Serialize};

use crate::gpio::{GpioPort, Level, OutputPin, SysfsPin, DATA_BUS_PIN, WRITE_STROBE_PIN};
use crate::Result;

/// Bit position of the data bus within the register group.
pub(crate) const DATA_SHIFT: u32 = DATA_BUS_PIN % 32;

/// Mask of the write strobe within the register group.
pub(crate) const WR_BIT: u32 = 1 << (WRITE_STROBE_PIN % 32);

/// Column address set opcode (shared by the supported controller families).
const COLUMN_ADDRESS_SET: u8 = 0x2A;

/// Page address set opcode (shared by the supported controller families).
const PAGE_ADDRESS_SET: u8 = 0x2B;

/// Pixels per block in the strobe-only fill loop.
const FILL_BLOCK_PIXELS: u32 = 64;

/// Logical pin assignment of the display bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusPins {
    /// Chip select (active low)
    pub chip_select: u32,
    /// Command/data select (low = command)
    pub command_data: u32,
    /// Write strobe (active low)
    pub write_strobe: u32,
    /// Read strobe (active low, held idle)
    pub read_strobe: u32,
    /// The eight data lines, bus bit 0 first
    pub data: [u32; 8],
}

impl Default for BusPins {
    fn default() -> Self {
        BusPins {
            chip_select: 9,
            command_data: 8,
            write_strobe: 7,
            read_strobe: 6,
            data: [13, 10, 12, 11, 14, 15, 16, 17],
        }
    }
}

/// Write-strobe timing strategy.
///
/// The controller's datasheet wants the data lines held steady for at
/// least 10 ns across the strobe's rising edge. The merged sequence
/// breaks that: it folds the strobe-raise into the next byte's data-set
/// write, saving two of six register writes per word. It has held up on
/// the supported board revision; whether by design margin or luck is
/// unresolved, so both timings stay selectable and tested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrobeTiming {
    /// Present data, strobe active, strobe idle; honors the hold time.
    WithinSpec,
    /// Fold the strobe-idle edge into the following data-set write.
    #[default]
    MergedStrobe,
}

/// The parallel bus: fast word path for data and strobe, slow pins for
/// the control lines. All methods must be called from a single thread.
pub struct ParallelBus<R: GpioPort, P: OutputPin> {
    port: R,
    chip_select: P,
    command_data: P,
    write_strobe: P,
    read_strobe: P,
    timing: StrobeTiming,
}

impl<R: GpioPort> ParallelBus<R, SysfsPin> {
    /// Open the bus on real hardware: export and configure every pin as
    /// an output, drive the control lines to their idle levels.
    ///
    /// The data pins only need their direction set once; afterwards they
    /// are driven exclusively through the register block, so their sysfs
    /// handles are dropped here.
    pub fn open(port: R, pins: &BusPins, timing: StrobeTiming) -> Result<Self> {
        for pin in pins.data {
            SysfsPin::output(pin)?;
        }

        let mut bus = ParallelBus::new(
            port,
            SysfsPin::output(pins.chip_select)?,
            SysfsPin::output(pins.command_data)?,
            SysfsPin::output(pins.write_strobe)?,
            SysfsPin::output(pins.read_strobe)?,
            timing,
        );

        bus.chip_select.write(Level::High)?;
        bus.write_strobe.write(Level::High)?;
        bus.read_strobe.write(Level::High)?;
        bus.command_data.write(Level::High)?;

        log::info!("display bus ready ({timing:?})");
        Ok(bus)
    }
}

impl<R: GpioPort, P: OutputPin> ParallelBus<R, P> {
    /// Assemble a bus from already-configured parts. Performs no I/O.
    pub fn new(
        port: R,
        chip_select: P,
        command_data: P,
        write_strobe: P,
        read_strobe: P,
        timing: StrobeTiming,
    ) -> Self {
        ParallelBus {
            port,
            chip_select,
            command_data,
            write_strobe,
            read_strobe,
            timing,
        }
    }

    /// Selected strobe timing.
    pub fn timing(&self) -> StrobeTiming {
        self.timing
    }

    /// Present one byte on the data lines and pulse the strobe.
    ///
    /// The strobe-low edge rides along with the complementary-bit clear;
    /// the data lines are steady before the rising edge, so this sequence
    /// is within spec for either timing.
    #[inline]
    pub fn write8(&mut self, value: u8) {
        let set = (value as u32) << DATA_SHIFT;
        let clear = ((!value) as u32) << DATA_SHIFT | WR_BIT;
        self.port.set_bits(set);
        self.port.clear_bits(clear);
        self.port.set_bits(WR_BIT);
    }

    /// Write one 16-bit value, high byte then low byte, using the
    /// selected strobe timing.
    #[inline]
    pub fn write16(&mut self, value: u16) {
        let hi = (value >> 8) as u8;
        let lo = value as u8;

        let set_hi = (hi as u32) << DATA_SHIFT;
        let clear_hi = ((!hi) as u32) << DATA_SHIFT | WR_BIT;
        let set_lo = (lo as u32) << DATA_SHIFT;
        let clear_lo = ((!lo) as u32) << DATA_SHIFT | WR_BIT;

        match self.timing {
            StrobeTiming::WithinSpec => {
                self.port.set_bits(set_hi);
                self.port.clear_bits(clear_hi);
                self.port.set_bits(WR_BIT);
                self.port.set_bits(set_lo);
                self.port.clear_bits(clear_lo);
                self.port.set_bits(WR_BIT);
            }
            StrobeTiming::MergedStrobe => {
                self.port.set_bits(WR_BIT | set_hi);
                self.port.clear_bits(clear_hi);
                self.port.set_bits(WR_BIT | set_lo);
                self.port.clear_bits(clear_lo);
            }
        }
    }

    /// Toggle the write strobe without touching the data lines.
    ///
    /// Valid only because set/clear writes leave unmasked lines at their
    /// last driven value: the controller re-latches whatever byte is
    /// still on the bus.
    #[inline]
    pub fn wr_strobe(&mut self) {
        self.port.clear_bits(WR_BIT);
        self.port.set_bits(WR_BIT);
    }

    /// Write a command byte followed by one data byte.
    pub fn write_register8(&mut self, register: u8, value: u8) -> Result<()> {
        self.cd_command()?;
        self.write8(register);
        self.cd_data()?;
        self.write8(value);
        Ok(())
    }

    /// Write a command byte followed by a 16-bit value.
    pub fn write_register16(&mut self, register: u8, value: u16) -> Result<()> {
        self.cd_command()?;
        self.write8(register);
        self.cd_data()?;
        self.write16(value);
        Ok(())
    }

    /// Write a command byte followed by a 32-bit value, high byte first.
    pub fn write_register32(&mut self, register: u8, value: u32) -> Result<()> {
        self.cd_command()?;
        self.write8(register);
        self.cd_data()?;
        self.write8((value >> 24) as u8);
        self.write8((value >> 16) as u8);
        self.write8((value >> 8) as u8);
        self.write8(value as u8);
        Ok(())
    }

    /// Program the controller's addressing window. Coordinates are
    /// assumed pre-sorted (`x2 >= x1`, `y2 >= y1`); the window stays in
    /// effect until reprogrammed and must precede any pixel stream.
    pub fn set_addr_window(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) -> Result<()> {
        self.cs_active()?;
        self.write_register32(COLUMN_ADDRESS_SET, (x1 as u32) << 16 | x2 as u32)?;
        self.write_register32(PAGE_ADDRESS_SET, (y1 as u32) << 16 | y2 as u32)?;
        self.cs_idle()?;
        Ok(())
    }

    /// Stream `len` copies of one pixel into the current window. `len`
    /// must be >= 1; the memory-write command must already be issued.
    ///
    /// When the color's high and low bytes match, only the first pixel is
    /// written in full; every further pixel is two strobe-only toggles
    /// against the retained bus value, in blocks of 64 pixels plus a
    /// remainder loop. Distinct bytes fall back to plain 16-bit writes.
    pub fn fill_pixels(&mut self, color: u16, len: u32) {
        debug_assert!(len >= 1, "fill length is inclusive and must be >= 1");
        let hi = (color >> 8) as u8;
        let lo = color as u8;

        if hi == lo {
            self.write8(hi);
            self.write8(lo);
            let remaining = len - 1;

            for _ in 0..remaining / FILL_BLOCK_PIXELS {
                for _ in 0..FILL_BLOCK_PIXELS {
                    self.wr_strobe();
                    self.wr_strobe();
                }
            }
            for _ in 0..remaining % FILL_BLOCK_PIXELS {
                self.wr_strobe();
                self.wr_strobe();
            }
        } else {
            for _ in 0..len {
                self.write16(color);
            }
        }
    }

    /// Assert chip select.
    pub fn cs_active(&mut self) -> Result<()> {
        self.chip_select.write(Level::Low)
    }

    /// Release chip select.
    pub fn cs_idle(&mut self) -> Result<()> {
        self.chip_select.write(Level::High)
    }

    /// Select command interpretation of the data bus.
    pub fn cd_command(&mut self) -> Result<()> {
        self.command_data.write(Level::Low)
    }

    /// Select data interpretation of the data bus.
    pub fn cd_data(&mut self) -> Result<()> {
        self.command_data.write(Level::High)
    }

    /// Park the write strobe high via the slow path.
    pub fn wr_idle(&mut self) -> Result<()> {
        self.write_strobe.write(Level::High)
    }

    /// Park the read strobe high; reads are never performed.
    pub fn rd_idle(&mut self) -> Result<()> {
        self.read_strobe.write(Level::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        data_lines_untouched, event_log, presented_bytes, strobe_toggles, BusEvent, EventLog,
        LineId, Presented, RecordingPin, RecordingPort,
    };

    fn recording_bus(timing: StrobeTiming) -> (ParallelBus<RecordingPort, RecordingPin>, EventLog)
    {
        let log = event_log();
        let bus = ParallelBus::new(
            RecordingPort::new(log.clone()),
            RecordingPin::new(LineId::ChipSelect, log.clone()),
            RecordingPin::new(LineId::CommandData, log.clone()),
            RecordingPin::new(LineId::WriteStrobe, log.clone()),
            RecordingPin::new(LineId::ReadStrobe, log.clone()),
            timing,
        );
        (bus, log)
    }

    #[test]
    fn write8_presents_then_strobes() {
        let (mut bus, log) = recording_bus(StrobeTiming::MergedStrobe);
        bus.write8(0xA5);

        let expected = vec![
            BusEvent::SetBits(0xA5 << DATA_SHIFT),
            BusEvent::ClearBits((!0xA5u8 as u32) << DATA_SHIFT | WR_BIT),
            BusEvent::SetBits(WR_BIT),
        ];
        assert_eq!(*log.borrow(), expected);
    }

    #[test]
    fn write16_within_spec_is_six_writes() {
        let (mut bus, log) = recording_bus(StrobeTiming::WithinSpec);
        bus.write16(0x12FE);

        let expected = vec![
            BusEvent::SetBits(0x12 << DATA_SHIFT),
            BusEvent::ClearBits((!0x12u8 as u32) << DATA_SHIFT | WR_BIT),
            BusEvent::SetBits(WR_BIT),
            BusEvent::SetBits(0xFE << DATA_SHIFT),
            BusEvent::ClearBits((!0xFEu8 as u32) << DATA_SHIFT | WR_BIT),
            BusEvent::SetBits(WR_BIT),
        ];
        assert_eq!(*log.borrow(), expected);
    }

    #[test]
    fn write16_merged_is_four_writes() {
        let (mut bus, log) = recording_bus(StrobeTiming::MergedStrobe);
        bus.write16(0x12FE);

        let expected = vec![
            BusEvent::SetBits(WR_BIT | 0x12 << DATA_SHIFT),
            BusEvent::ClearBits((!0x12u8 as u32) << DATA_SHIFT | WR_BIT),
            BusEvent::SetBits(WR_BIT | 0xFE << DATA_SHIFT),
            BusEvent::ClearBits((!0xFEu8 as u32) << DATA_SHIFT | WR_BIT),
        ];
        assert_eq!(*log.borrow(), expected);
    }

    #[test]
    fn strobe_leaves_data_lines_alone() {
        let (mut bus, log) = recording_bus(StrobeTiming::MergedStrobe);
        bus.wr_strobe();

        assert_eq!(
            *log.borrow(),
            vec![BusEvent::ClearBits(WR_BIT), BusEvent::SetBits(WR_BIT)]
        );
        assert!(data_lines_untouched(&log.borrow(), 0));
    }

    #[test]
    fn fill_equal_bytes_writes_one_pixel_then_strobes() {
        for len in [1u32, 2, 63, 64, 65, 200] {
            let (mut bus, log) = recording_bus(StrobeTiming::MergedStrobe);
            bus.fill_pixels(0x4242, len);

            let log = log.borrow();
            // First pixel: two full byte writes, three events each.
            let prefix = 6;
            assert_eq!(
                presented_bytes(&log),
                vec![Presented::Data(0x42), Presented::Data(0x42)],
                "len {len}: exactly one full pixel presented"
            );
            assert!(
                data_lines_untouched(&log, prefix),
                "len {len}: data lines changed after the first pixel"
            );
            // Two strobe-only toggles per remaining pixel; the first
            // pixel's byte writes clear data bits and are not counted.
            assert_eq!(
                strobe_toggles(&log),
                (len as usize - 1) * 2,
                "len {len}: wrong toggle count"
            );
        }
    }

    #[test]
    fn fill_distinct_bytes_matches_plain_word_writes() {
        for timing in [StrobeTiming::WithinSpec, StrobeTiming::MergedStrobe] {
            for len in [1u32, 64, 130] {
                let (mut bus, log) = recording_bus(timing);
                bus.fill_pixels(0x12FE, len);

                let (mut reference_bus, reference_log) = recording_bus(timing);
                for _ in 0..len {
                    reference_bus.write16(0x12FE);
                }

                assert_eq!(
                    *log.borrow(),
                    *reference_log.borrow(),
                    "{timing:?} len {len}: fill differs from direct word writes"
                );
            }
        }
    }

    #[test]
    fn addr_window_packs_coordinates() {
        let (mut bus, log) = recording_bus(StrobeTiming::MergedStrobe);
        bus.set_addr_window(5, 7, 319, 239).unwrap();

        let bytes = presented_bytes(&log.borrow());
        let expected = [
            Presented::Command(COLUMN_ADDRESS_SET),
            Presented::Data(0x00),
            Presented::Data(0x05),
            Presented::Data(0x01),
            Presented::Data(0x3F),
            Presented::Command(PAGE_ADDRESS_SET),
            Presented::Data(0x00),
            Presented::Data(0x07),
            Presented::Data(0x00),
            Presented::Data(0xEF),
        ];
        assert_eq!(bytes, expected);

        // Readback of the packed register values.
        let col = u32::from_be_bytes([0x00, 0x05, 0x01, 0x3F]);
        let page = u32::from_be_bytes([0x00, 0x07, 0x00, 0xEF]);
        assert_eq!(col, 5 << 16 | 319);
        assert_eq!(page, 7 << 16 | 239);
    }

    #[test]
    fn addr_window_accepts_degenerate_rectangles() {
        // x1 == x2, y1 == y2 (single pixel) is a valid pre-sorted window.
        let (mut bus, log) = recording_bus(StrobeTiming::MergedStrobe);
        bus.set_addr_window(10, 20, 10, 20).unwrap();

        let bytes = presented_bytes(&log.borrow());
        assert_eq!(bytes[1..5], [
            Presented::Data(0),
            Presented::Data(10),
            Presented::Data(0),
            Presented::Data(10),
        ]);
    }

    #[test]
    fn register_writes_toggle_command_select() {
        let (mut bus, log) = recording_bus(StrobeTiming::MergedStrobe);
        bus.write_register8(0x36, 0x88).unwrap();

        assert_eq!(
            presented_bytes(&log.borrow()),
            vec![Presented::Command(0x36), Presented::Data(0x88)]
        );
    }
}
