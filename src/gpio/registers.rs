//! Memory-mapped pin-state registers
//!
//! The Edison exposes its GPIO controller as a PCI resource file. Within
//! the mapped block every group of 32 pins has a set register and a clear
//! register at fixed byte offsets; writing a mask flips exactly the masked
//! pins and leaves every other line untouched. The display bus depends on
//! that retention: strobe-only writes are valid precisely because the data
//! lines keep their last driven value.

use std::fs::OpenOptions;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use memmap2::MmapMut;

use crate::{AvError, Result};

/// Absolute path of the pin-state register resource within sysfs.
///
/// Might not always be correct. First thing to check if mapping stops
/// working: look for device 0x1199 with the Intel vendor id (0x8086).
pub const REGISTER_RESOURCE_PATH: &str = "/sys/devices/pci0000:00/0000:00:0c.0/resource0";

/// First hardware pin of the display data bus (pins 40-47).
pub const DATA_BUS_PIN: u32 = 40;

/// Hardware pin of the write strobe. Must share the 32-pin register group
/// with [`DATA_BUS_PIN`] so one set/clear word drives data and strobe.
pub const WRITE_STROBE_PIN: u32 = 48;

/// Byte offset of a group's set register within the block.
const SET_REGISTER_OFFSET: usize = 0x34;

/// Byte offset of a group's clear register within the block.
const CLEAR_REGISTER_OFFSET: usize = 0x4c;

/// Word-level fast path to the pin-state registers.
///
/// `set_bits`/`clear_bits` write a full 32-bit mask to the data-bus pin
/// group. Implemented by [`GpioRegisterBlock`] on hardware and by
/// recording fakes in tests.
pub trait GpioPort {
    /// Drive every masked pin high.
    fn set_bits(&mut self, mask: u32);

    /// Drive every masked pin low.
    fn clear_bits(&mut self, mask: u32);
}

/// Process-wide guard: the register block is mapped at most once and the
/// mapping lives until process exit.
static MAPPED: AtomicBool = AtomicBool::new(false);

/// The memory-mapped register block, with the set/clear offsets of the
/// data-bus pin group resolved once at mapping time.
pub struct GpioRegisterBlock {
    map: MmapMut,
    set_offset: usize,
    clear_offset: usize,
}

impl GpioRegisterBlock {
    /// Map the register resource and resolve the data-bus group offsets.
    ///
    /// May be called once per process; a second call fails with
    /// [`AvError::AlreadyMapped`]. Mapping failure is unrecoverable for
    /// callers: without the fast path the display cannot be driven.
    pub fn map() -> Result<Self> {
        if MAPPED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AvError::AlreadyMapped);
        }

        match Self::map_resource(REGISTER_RESOURCE_PATH) {
            Ok(block) => Ok(block),
            Err(err) => {
                MAPPED.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn map_resource(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| AvError::Mmap {
                path: path.to_string(),
                source,
            })?;

        // Shared mapping of device registers; the kernel forwards every
        // store to the bus, so all register writes below are volatile.
        let map = unsafe { MmapMut::map_mut(&file) }.map_err(|source| AvError::Mmap {
            path: path.to_string(),
            source,
        })?;

        let group = (DATA_BUS_PIN / 32) as usize * std::mem::size_of::<u32>();
        log::info!("mapped GPIO registers from {path} (pin group offset {group:#x})");

        Ok(GpioRegisterBlock {
            map,
            set_offset: group + SET_REGISTER_OFFSET,
            clear_offset: group + CLEAR_REGISTER_OFFSET,
        })
    }

    #[inline]
    fn write_register(&mut self, offset: usize, mask: u32) {
        // In-range by construction: the resource file spans the controller's
        // register space and the offsets were resolved at mapping time.
        unsafe {
            let reg = self.map.as_mut_ptr().add(offset) as *mut u32;
            ptr::write_volatile(reg, mask);
        }
    }
}

impl GpioPort for GpioRegisterBlock {
    #[inline]
    fn set_bits(&mut self, mask: u32) {
        self.write_register(self.set_offset, mask);
    }

    #[inline]
    fn clear_bits(&mut self, mask: u32) {
        self.write_register(self.clear_offset, mask);
    }
}
