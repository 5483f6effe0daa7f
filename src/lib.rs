//! Direct-drive display and speaker output for Intel Edison class boards
//!
//! Kernel-driver-free control of two output peripherals: an 8-bit parallel
//! bus TFT controller (ILI9341 family) and a PWM-driven speaker, together
//! with the software mixer that synthesizes the speaker signal in real time.
//!
//! # Features
//! - Memory-mapped GPIO set/clear registers for real-time pixel streaming
//! - 8080-style parallel bus protocol with two selectable strobe timings
//! - ILI9341-family controller bring-up, rotation and block fill
//! - 8-voice fixed-point resampling PCM mixer with channel eviction
//! - Free-running playback thread driving a sysfs PWM duty cycle
//!
//! # Layering
//! The rendering path goes [`display`] → [`bus`] → [`gpio`]; the audio path
//! goes [`mixer`] → [`pwm`]. The two paths are independent: the display is
//! used from the rendering thread only, the mixer is shared between the
//! simulation thread (triggers) and the playback thread (mixdown) behind a
//! single mutex.
//!
//! # Quick start
//! ```no_run
//! use edison_av::bus::{BusPins, ParallelBus, StrobeTiming};
//! use edison_av::display::{Rotation, TftDisplay};
//! use edison_av::gpio::GpioRegisterBlock;
//!
//! let pins = BusPins::default();
//! let port = GpioRegisterBlock::map()?;
//! let bus = ParallelBus::open(port, &pins, StrobeTiming::MergedStrobe)?;
//! let mut tft = TftDisplay::new(bus);
//! tft.begin(0x9341)?;
//! tft.set_rotation(Rotation::Deg90)?;
//! # Ok::<(), edison_av::AvError>(())
//! ```
//!
//! Audio:
//! ```no_run
//! use edison_av::mixer::Mixer;
//! use edison_av::pwm::{PlaybackConfig, PlaybackDriver, SysfsPwm};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! let mixer = Arc::new(Mutex::new(Mixer::new(&[])));
//! let pwm = SysfsPwm::open(0, 0, 10_000)?;
//! let _playback = PlaybackDriver::spawn(Arc::clone(&mixer), pwm, PlaybackConfig::default())?;
//! # Ok::<(), edison_av::AvError>(())
//! ```

#![warn(missing_docs)]

pub mod bus;
pub mod display;
pub mod gpio;
pub mod mixer;
pub mod pwm;

#[cfg(test)]
pub(crate) mod testutil;

use std::io;

/// Error types for driver bring-up and device I/O
///
/// Bring-up errors (pins, register mapping, PWM channel) are unrecoverable
/// for the embedding process: the hardware cannot be driven without them.
/// Runtime audio scheduling delay is not an error at all; it degrades to
/// dropped samples and shows up in timing telemetry only.
#[derive(thiserror::Error, Debug)]
pub enum AvError {
    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A GPIO pin could not be acquired or configured
    #[error("GPIO pin {pin} unavailable: {source}")]
    Pin {
        /// Logical pin number as passed to the sysfs interface
        pin: u32,
        /// Underlying filesystem error
        source: io::Error,
    },

    /// The GPIO register resource could not be memory-mapped
    #[error("cannot map GPIO register block {path}: {source}")]
    Mmap {
        /// Resource path that failed to map
        path: String,
        /// Underlying open/mmap error
        source: io::Error,
    },

    /// The GPIO register block is mapped at most once per process
    #[error("GPIO register block is already mapped")]
    AlreadyMapped,

    /// A PWM channel could not be exported or configured
    #[error("PWM channel {chip}:{channel} unavailable: {source}")]
    Pwm {
        /// PWM chip index under /sys/class/pwm
        chip: u32,
        /// Channel index within the chip
        channel: u32,
        /// Underlying filesystem error
        source: io::Error,
    },
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, AvError>;

// Public API exports
pub use bus::{BusPins, ParallelBus, StrobeTiming};
pub use display::{ControllerVariant, Rotation, TftDisplay};
pub use gpio::{GpioPort, GpioRegisterBlock, Level, OutputPin, SysfsPin};
pub use mixer::Mixer;
pub use pwm::{DropPolicy, PlaybackConfig, PlaybackDriver, SysfsPwm, TimingStats};
