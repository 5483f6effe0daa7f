//! GPIO register interface
//!
//! Two access paths to the same pins, with very different speed classes:
//!
//! - [`GpioRegisterBlock`] memory-maps the SoC's pin-state registers once
//!   and writes whole set/clear words. This is the only path fast enough
//!   for real-time pixel streaming on the eight data-bus lines and the
//!   write strobe.
//! - [`SysfsPin`] drives a single pin through the kernel's sysfs GPIO
//!   files. Milliseconds-per-write slow, but fine for the four control
//!   lines (chip select, command/data select, read/write strobes idle
//!   state) and for one-time pin setup.
//!
//! Neither path supports concurrent callers; all writes must be serialized
//! by the owner of the handles.

mod pin;
mod registers;

pub use pin::{Level, OutputPin, SysfsPin};
pub use registers::{
    GpioPort, GpioRegisterBlock, DATA_BUS_PIN, REGISTER_RESOURCE_PATH, WRITE_STROBE_PIN,
};
