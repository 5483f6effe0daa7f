//! PWM speaker output
//!
//! The speaker hangs off a hardware PWM pin behind an RC low-pass; an
//! audio sample becomes the fraction of the PWM period the output is held
//! high. The kernel exposes the channel as sysfs attribute files, and the
//! duty cycle is written as an ASCII decimal nanosecond count, once per
//! synthesized sample, so the file handle is held open for the life of
//! the process.

mod playback;

pub use playback::{
    DropPolicy, PlaybackConfig, PlaybackDriver, PlaybackHandle, SampleClock, TimingStats,
};

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::{AvError, Result};

/// Root of the kernel's sysfs PWM interface.
const SYSFS_PWM_ROOT: &str = "/sys/class/pwm";

/// Default PWM period: 10 µs, chosen to sit well above the audio band
/// and within reach of the output RC filter.
pub const DEFAULT_PERIOD_NS: u32 = 10_000;

/// A duty-cycle consumer: one value per synthesized sample.
///
/// Implemented by [`SysfsPwm`] on hardware and by recording fakes in
/// tests.
pub trait DutySink {
    /// Configured PWM period in nanoseconds.
    fn period_ns(&self) -> u32;

    /// Program the high time for the current period.
    fn write_duty_ns(&mut self, duty_ns: u32) -> Result<()>;
}

/// An exported, enabled sysfs PWM channel with its duty file held open.
#[derive(Debug)]
pub struct SysfsPwm {
    chip: u32,
    channel: u32,
    period_ns: u32,
    duty: File,
}

impl SysfsPwm {
    /// Export and enable `channel` on `chip` with the given period.
    ///
    /// Fails with [`AvError::Pwm`] when the channel cannot be brought
    /// up; callers treat that as fatal, there is no other audio output.
    pub fn open(chip: u32, channel: u32, period_ns: u32) -> Result<Self> {
        Self::open_at(Path::new(SYSFS_PWM_ROOT), chip, channel, period_ns)
    }

    /// Like [`SysfsPwm::open`], rooted at `root`. Test hook.
    pub(crate) fn open_at(root: &Path, chip: u32, channel: u32, period_ns: u32) -> Result<Self> {
        let wrap = |source: io::Error| AvError::Pwm {
            chip,
            channel,
            source,
        };

        let chip_dir = root.join(format!("pwmchip{chip}"));
        let channel_dir = chip_dir.join(format!("pwm{channel}"));

        if !channel_dir.is_dir() {
            // EBUSY means a previous run left the channel exported.
            match write_attr(&chip_dir.join("export"), channel.to_string().as_bytes()) {
                Err(err) if err.kind() == io::ErrorKind::ResourceBusy => {}
                other => other.map_err(wrap)?,
            }
        }

        write_attr(
            &channel_dir.join("period"),
            period_ns.to_string().as_bytes(),
        )
        .map_err(wrap)?;
        write_attr(&channel_dir.join("enable"), b"1").map_err(wrap)?;

        let duty = OpenOptions::new()
            .write(true)
            .open(channel_dir.join("duty_cycle"))
            .map_err(wrap)?;

        log::info!("PWM {chip}:{channel} enabled, period {period_ns} ns");
        Ok(SysfsPwm {
            chip,
            channel,
            period_ns,
            duty,
        })
    }
}

impl DutySink for SysfsPwm {
    fn period_ns(&self) -> u32 {
        self.period_ns
    }

    fn write_duty_ns(&mut self, duty_ns: u32) -> Result<()> {
        write!(self.duty, "{duty_ns}").map_err(|source| AvError::Pwm {
            chip: self.chip,
            channel: self.channel,
            source,
        })
    }
}

fn write_attr(path: &Path, value: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(value)
}
