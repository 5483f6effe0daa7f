//! Display controller state machine
//!
//! Chip-specific bring-up, rotation and pixel streaming on top of the
//! protocol engine. The driver recognizes a small family of controllers
//! by their 16-bit identifier; an unrecognized identifier is not fatal,
//! it leaves the driver degraded with a generic graphics-RAM opcode.
//!
//! Lifecycle: `Uninitialized` → `Reset` (parser resynchronized) →
//! `Initialized(variant)` → `Ready` with one of four rotations. Bring-up
//! ends with a full-screen window and a single flood to black so the
//! panel never shows stale RAM.

pub mod commands;

use std::thread;
use std::time::Duration;

use commands::Madctl;

use crate::bus::ParallelBus;
use crate::gpio::{GpioPort, OutputPin};
use crate::Result;

/// Native panel width (portrait).
pub const NATIVE_WIDTH: u16 = 240;

/// Native panel height (portrait).
pub const NATIVE_HEIGHT: u16 = 320;

/// The one identifier with a full bring-up sequence.
const ILI9341_ID: u16 = 0x9341;

/// Controller family, decoded once from the 16-bit chip identifier.
///
/// Selects the graphics-RAM write opcode and the addressing semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerVariant {
    /// ILI9320/9325/9328 register-indexed controllers
    Ili932x,
    /// ILI9341 command-stream controller
    Ili9341,
    /// HX8357D, command-compatible with the ILI9341 for our purposes
    Hx8357d,
    /// Unrecognized identifier; drawing falls back to a generic opcode
    Unknown,
}

impl ControllerVariant {
    /// Decode a chip identifier read from (or configured for) the panel.
    pub fn from_id(id: u16) -> Self {
        match id {
            0x9325 | 0x9328 => ControllerVariant::Ili932x,
            0x9341 => ControllerVariant::Ili9341,
            0x8357 => ControllerVariant::Hx8357d,
            _ => ControllerVariant::Unknown,
        }
    }

    /// Command bytes that start a graphics-RAM write for this family.
    fn gram_write(self) -> &'static [u8] {
        match self {
            // High byte of the register index, then the GRAM register.
            ControllerVariant::Ili932x => &[0x00, commands::GRAM_WRITE_LEGACY],
            ControllerVariant::Ili9341 | ControllerVariant::Hx8357d => &[commands::MEMORY_WRITE],
            ControllerVariant::Unknown => &[commands::GRAM_WRITE_LEGACY],
        }
    }
}

/// Panel rotation, multiples of 90 degrees clockwise from portrait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    /// Portrait, connector at the bottom
    #[default]
    Deg0,
    /// Landscape
    Deg90,
    /// Portrait, flipped
    Deg180,
    /// Landscape, flipped
    Deg270,
}

impl Rotation {
    /// Rotation index 0-3.
    pub fn index(self) -> u8 {
        self as u8
    }

    fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Driver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No bus traffic yet
    Uninitialized,
    /// Parser resynchronized, no chip programming done
    Reset,
    /// Variant decoded; degraded if the variant is `Unknown`
    Initialized(ControllerVariant),
    /// Fully programmed and accepting pixel streams
    Ready(ControllerVariant),
}

/// The display driver: protocol engine plus controller state.
pub struct TftDisplay<R: GpioPort, P: OutputPin> {
    bus: ParallelBus<R, P>,
    state: State,
    rotation: Rotation,
    width: u16,
    height: u16,
}

impl<R: GpioPort, P: OutputPin> TftDisplay<R, P> {
    /// Wrap a bus in an uninitialized driver.
    pub fn new(bus: ParallelBus<R, P>) -> Self {
        TftDisplay {
            bus,
            state: State::Uninitialized,
            rotation: Rotation::Deg0,
            width: NATIVE_WIDTH,
            height: NATIVE_HEIGHT,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Current rotation.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Width of the addressable area under the current rotation.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height of the addressable area under the current rotation.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Decoded controller variant, `Unknown` before initialization.
    pub fn variant(&self) -> ControllerVariant {
        match self.state {
            State::Initialized(variant) | State::Ready(variant) => variant,
            _ => ControllerVariant::Unknown,
        }
    }

    /// Resynchronize the controller's command parser.
    ///
    /// Idles every control line, then issues a zero command byte followed
    /// by three bare strobe pulses. Works on every family because 0x00 is
    /// a no-op everywhere; any half-transferred byte from a previous run
    /// is flushed out.
    pub fn reset(&mut self) -> Result<()> {
        self.bus.cs_idle()?;
        self.bus.wr_idle()?;
        self.bus.rd_idle()?;

        self.bus.cs_active()?;
        self.bus.cd_command()?;
        self.bus.write8(0x00);
        for _ in 0..3 {
            self.bus.wr_strobe(); // Three extra 0x00s
        }
        self.bus.cs_idle()?;

        self.state = State::Reset;
        Ok(())
    }

    /// Bring the panel up for the given chip identifier.
    ///
    /// For the recognized identifier this runs the full programming
    /// sequence with its mandatory settle delays, programs a full-screen
    /// window and floods the panel black, leaving the driver `Ready` at
    /// rotation 0. Any other identifier degrades the driver instead of
    /// failing: drawing then uses the generic opcode and rotation is a
    /// no-op.
    pub fn begin(&mut self, id: u16) -> Result<()> {
        self.reset()?;
        sleep_ms(200);

        if id != ILI9341_ID {
            log::warn!("unsupported display controller id {id:#06x}, drawing degraded");
            self.state = State::Initialized(ControllerVariant::Unknown);
            return Ok(());
        }

        let variant = ControllerVariant::Ili9341;
        self.bus.cs_active()?;
        self.bus.write_register8(commands::SOFT_RESET, 0)?;
        sleep_ms(50);
        self.bus.write_register8(commands::DISPLAY_OFF, 0)?;

        self.bus.write_register8(commands::POWER_CONTROL_1, 0x23)?;
        self.bus.write_register8(commands::POWER_CONTROL_2, 0x10)?;
        self.bus.write_register16(commands::VCOM_CONTROL_1, 0x2B2B)?;
        self.bus.write_register8(commands::VCOM_CONTROL_2, 0xC0)?;
        self.bus.write_register8(
            commands::MEMORY_ACCESS_CONTROL,
            (Madctl::ROW_ORDER | Madctl::BGR).bits(),
        )?;
        self.bus.write_register8(commands::PIXEL_FORMAT, 0x55)?;
        self.bus.write_register16(commands::FRAME_CONTROL, 0x001B)?;
        self.bus.write_register8(commands::ENTRY_MODE, 0x07)?;

        self.bus.write_register8(commands::SLEEP_OUT, 0)?;
        sleep_ms(150);
        self.bus.write_register8(commands::DISPLAY_ON, 0)?;
        sleep_ms(500);

        self.state = State::Initialized(variant);
        self.rotation = Rotation::Deg0;
        self.width = NATIVE_WIDTH;
        self.height = NATIVE_HEIGHT;

        // Clear screen to black so stale RAM never flashes up.
        self.bus
            .set_addr_window(0, 0, NATIVE_WIDTH - 1, NATIVE_HEIGHT - 1)?;
        self.flood(0x0000, NATIVE_WIDTH as u32 * NATIVE_HEIGHT as u32)?;

        self.state = State::Ready(variant);
        log::info!("display ready (ILI9341, {NATIVE_WIDTH}x{NATIVE_HEIGHT})");
        Ok(())
    }

    /// Program the addressing window for subsequent pixel streams.
    ///
    /// Coordinates must be pre-sorted by the caller.
    pub fn set_addr_window(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) -> Result<()> {
        self.bus.set_addr_window(x1, y1, x2, y2)
    }

    /// Fill `len` pixels of the current window with one color.
    pub fn flood(&mut self, color: u16, len: u32) -> Result<()> {
        self.bus.cs_active()?;
        self.bus.cd_command()?;
        for &byte in self.variant().gram_write() {
            self.bus.write8(byte);
        }
        self.bus.cd_data()?;
        self.bus.fill_pixels(color, len);
        self.bus.cs_idle()?;
        Ok(())
    }

    /// Stream externally produced 5-6-5 pixels into the current window.
    ///
    /// Issue the graphics-RAM write command only when `first` is set, so
    /// a large frame can be chunked over multiple calls without restarting
    /// the transfer at the window origin.
    pub fn push_colors(&mut self, data: &[u16], first: bool) -> Result<()> {
        self.bus.cs_active()?;
        if first {
            self.bus.cd_command()?;
            for &byte in self.variant().gram_write() {
                self.bus.write8(byte);
            }
        }
        self.bus.cd_data()?;
        for &color in data {
            self.bus.write16(color);
        }
        self.bus.cs_idle()?;
        Ok(())
    }

    /// Select one of the four panel rotations.
    ///
    /// Supported on the ILI9341 and HX8357D families: writes the fixed
    /// memory-access-control combination for the rotation, then
    /// reprograms the full-screen window with the axes swapped for the
    /// landscape orientations. No-op for other variants.
    pub fn set_rotation(&mut self, rotation: Rotation) -> Result<()> {
        let madctl = match self.variant() {
            ControllerVariant::Ili9341 => {
                let base = Madctl::BGR;
                match rotation {
                    Rotation::Deg0 => Madctl::ROW_ORDER | base,
                    Rotation::Deg90 => {
                        Madctl::COLUMN_ORDER | Madctl::ROW_ORDER | Madctl::ROW_COLUMN_EXCHANGE | base
                    }
                    Rotation::Deg180 => Madctl::COLUMN_ORDER | base,
                    Rotation::Deg270 => Madctl::ROW_COLUMN_EXCHANGE | base,
                }
            }
            ControllerVariant::Hx8357d => match rotation {
                // RGB panel: same geometry bits, no BGR.
                Rotation::Deg0 => Madctl::COLUMN_ORDER | Madctl::ROW_ORDER,
                Rotation::Deg90 => Madctl::ROW_COLUMN_EXCHANGE | Madctl::ROW_ORDER,
                Rotation::Deg180 => Madctl::empty(),
                Rotation::Deg270 => Madctl::COLUMN_ORDER | Madctl::ROW_COLUMN_EXCHANGE,
            },
            _ => return Ok(()),
        };

        self.bus.cs_active()?;
        self.bus
            .write_register8(commands::MEMORY_ACCESS_CONTROL, madctl.bits())?;

        let (width, height) = if rotation.swaps_axes() {
            (NATIVE_HEIGHT, NATIVE_WIDTH)
        } else {
            (NATIVE_WIDTH, NATIVE_HEIGHT)
        };
        self.width = width;
        self.height = height;
        self.rotation = rotation;

        // Window reprogramming releases chip select.
        self.bus.set_addr_window(0, 0, width - 1, height - 1)
    }
}

/// Pack 8-bit R, G, B into a 16-bit 5-6-5 color.
#[inline]
pub fn color565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

fn sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}
