//! Controller opcodes and memory-access-control bits
//!
//! Command set of the ILI9341; the HX8357D shares the command opcodes
//! used here, the ILI932x family addresses its graphics RAM through a
//! 16-bit register index instead.

/// Software reset
pub const SOFT_RESET: u8 = 0x01;
/// Exit sleep mode
pub const SLEEP_OUT: u8 = 0x11;
/// Blank the panel without losing RAM contents
pub const DISPLAY_OFF: u8 = 0x28;
/// Unblank the panel
pub const DISPLAY_ON: u8 = 0x29;
/// Begin a graphics RAM write at the window origin
pub const MEMORY_WRITE: u8 = 0x2C;
/// Memory access control (scan order, mirroring, color order)
pub const MEMORY_ACCESS_CONTROL: u8 = 0x36;
/// Interface pixel format
pub const PIXEL_FORMAT: u8 = 0x3A;
/// Frame rate control
pub const FRAME_CONTROL: u8 = 0xB1;
/// Entry mode set
pub const ENTRY_MODE: u8 = 0xB7;
/// Power control 1 (GVDD level)
pub const POWER_CONTROL_1: u8 = 0xC0;
/// Power control 2 (step-up factor)
pub const POWER_CONTROL_2: u8 = 0xC1;
/// VCOM control 1
pub const VCOM_CONTROL_1: u8 = 0xC5;
/// VCOM control 2
pub const VCOM_CONTROL_2: u8 = 0xC7;

/// ILI932x GRAM write register index, also the opcode blindly issued for
/// unidentified controllers.
pub const GRAM_WRITE_LEGACY: u8 = 0x22;

bitflags::bitflags! {
    /// Memory access control bits (the MADCTL byte).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Madctl: u8 {
        /// Row address order (vertical mirror)
        const ROW_ORDER = 0x80;
        /// Column address order (horizontal mirror)
        const COLUMN_ORDER = 0x40;
        /// Row/column exchange (landscape)
        const ROW_COLUMN_EXCHANGE = 0x20;
        /// Vertical refresh order
        const VERTICAL_REFRESH = 0x10;
        /// BGR subpixel order (panel wiring)
        const BGR = 0x08;
        /// Horizontal refresh order
        const HORIZONTAL_REFRESH = 0x04;
    }
}
