//! Per-pin sysfs output path
//!
//! The slow road to a pin: export it, set its direction, then write "0" or
//! "1" to its value file. Each write is a full syscall round trip through
//! the kernel, three orders of magnitude slower than the register block.
//! Acceptable for control lines that change a few times per transfer, not
//! for the data bus.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::{AvError, Result};

/// Root of the kernel's sysfs GPIO interface.
const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Logic level of an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Driven low (0)
    Low,
    /// Driven high (1)
    High,
}

/// A single writable output line.
///
/// The display bus is generic over this seam so tests can substitute
/// recording pins for the four control lines.
pub trait OutputPin {
    /// Drive the pin to the given level.
    fn write(&mut self, level: Level) -> Result<()>;
}

/// An exported sysfs GPIO pin configured as an output.
///
/// Holds the pin's value file open for the lifetime of the handle so a
/// level change costs one `write(2)` and no path lookups.
#[derive(Debug)]
pub struct SysfsPin {
    pin: u32,
    value: File,
}

impl SysfsPin {
    /// Export `pin` and configure it as an output.
    ///
    /// Fails with [`AvError::Pin`] when the pin is not valid for the
    /// platform; callers treat that as fatal, the hardware cannot be
    /// driven with a control line missing.
    pub fn output(pin: u32) -> Result<Self> {
        Self::output_at(Path::new(SYSFS_GPIO_ROOT), pin)
    }

    /// Like [`SysfsPin::output`], rooted at `root` instead of the real
    /// sysfs tree. Test hook.
    pub(crate) fn output_at(root: &Path, pin: u32) -> Result<Self> {
        let wrap = |source: io::Error| AvError::Pin { pin, source };

        let pin_dir = root.join(format!("gpio{pin}"));
        if !pin_dir.is_dir() {
            // Export creates the per-pin directory; EBUSY means some
            // earlier run already exported it, which is fine.
            Self::export(root, pin).map_err(wrap)?;
        }

        Self::write_attr(&pin_dir.join("direction"), b"out").map_err(wrap)?;

        let value = OpenOptions::new()
            .write(true)
            .open(pin_dir.join("value"))
            .map_err(wrap)?;

        Ok(SysfsPin { pin, value })
    }

    fn export(root: &Path, pin: u32) -> io::Result<()> {
        let result = Self::write_attr(&root.join("export"), pin.to_string().as_bytes());
        match result {
            Err(err) if err.kind() == io::ErrorKind::ResourceBusy => Ok(()),
            other => other,
        }
    }

    fn write_attr(path: &Path, value: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.write_all(value)
    }

    /// Pin number this handle drives.
    pub fn pin(&self) -> u32 {
        self.pin
    }
}

impl OutputPin for SysfsPin {
    fn write(&mut self, level: Level) -> Result<()> {
        let byte: &[u8] = match level {
            Level::Low => b"0",
            Level::High => b"1",
        };
        self.value
            .write_all(byte)
            .map_err(|source| AvError::Pin {
                pin: self.pin,
                source,
            })
    }
}
