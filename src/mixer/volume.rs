//! Volume and pitch lookup tables
//!
//! The mixdown never multiplies per sample: every (volume, sample byte)
//! pair is precomputed into a signed contribution, which also folds the
//! unsigned-to-signed PCM conversion into the lookup.

/// Number of discrete volume levels (0-127).
pub const VOLUME_LEVELS: usize = 128;

/// 16.16 fixed-point step that plays a sound at its recorded rate.
pub const UNITY_STEP: u32 = 1 << 16;

/// Precomputed volume scaling table, one 256-entry row per volume level.
///
/// `row(v)[s] = (v * (s - 128) * 256) / 127`: an 8-bit unsigned sample
/// scaled to a signed 16-bit range at volume `v`.
pub struct VolumeTable {
    table: Vec<i32>,
}

impl VolumeTable {
    /// Build the full 128x256 table.
    pub fn new() -> Self {
        let mut table = Vec::with_capacity(VOLUME_LEVELS * 256);
        for volume in 0..VOLUME_LEVELS as i32 {
            for sample in 0..256i32 {
                table.push((volume * (sample - 128) * 256) / 127);
            }
        }
        VolumeTable { table }
    }

    /// Scaled contribution of `sample` at volume level `volume` (0-127).
    #[inline]
    pub fn lookup(&self, volume: u8, sample: u8) -> i32 {
        self.table[volume as usize * 256 + sample as usize]
    }
}

impl Default for VolumeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// 16.16 fixed-point resampling step for a pitch byte.
///
/// Pitch 128 is unity; each 64 steps double or halve the playback rate
/// (`2^((pitch - 128) / 64)`).
pub fn pitch_step(pitch: u8) -> u32 {
    (f64::powf(2.0, (pitch as f64 - 128.0) / 64.0) * 65536.0) as u32
}
