//! Volume and progress `SET_PARAMETER` bodies.
//!
//! Track-metadata and album-art pushes carry DAAP/PList-encoded bytes produced by an external
//! encoder (out of scope here, per the engine's external-interface contract); this module only
//! builds the two bodies it owns the format of.

/// A volume level in `[0.0, 1.0]`, with dB conversion clamped to the range receivers accept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume(f32);

impl Volume {
    /// Fully muted.
    pub const MIN: Volume = Volume(0.0);
    /// Full volume.
    pub const MAX: Volume = Volume(1.0);

    /// The sentinel dB value sent in place of a real level when the volume is silent.
    pub const MUTE_DB: f32 = -144.0;

    /// Clamp `value` into `[0.0, 1.0]`.
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    /// The raw linear value.
    #[must_use]
    pub fn as_f32(self) -> f32 {
        self.0
    }

    /// Whether this level is exactly silent.
    #[must_use]
    pub fn is_silent(self) -> bool {
        self.0 <= 0.0
    }

    /// Convert to the dB value the `volume:` parameter body carries: `-144.0` when silent,
    /// otherwise `20 * log10(level)` clamped to `[-30.0, 0.0]` — the range RAOP receivers
    /// accept for a non-muted level.
    #[must_use]
    pub fn to_db(self) -> f32 {
        if self.is_silent() {
            return Self::MUTE_DB;
        }
        (20.0 * self.0.log10()).clamp(-30.0, 0.0)
    }
}

impl From<f32> for Volume {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

/// Build the `volume: {f}\r\n` body for `SET_PARAMETER`.
#[must_use]
pub fn volume_body(volume: Volume) -> Vec<u8> {
    format!("volume: {:.6}\r\n", volume.to_db()).into_bytes()
}

/// Build the `progress: {start}/{current}/{end}\r\n` body for `SET_PARAMETER`, all as RTP
/// timestamps.
#[must_use]
pub fn progress_body(start: u32, current: u32, end: u32) -> Vec<u8> {
    format!("progress: {start}/{current}/{end}\r\n").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_volume_sends_mute_sentinel() {
        let body = volume_body(Volume::MIN);
        assert_eq!(body, b"volume: -144.000000\r\n");
    }

    #[test]
    fn full_volume_clamps_to_zero_db() {
        let body = volume_body(Volume::MAX);
        assert_eq!(body, b"volume: 0.000000\r\n");
    }

    #[test]
    fn very_quiet_nonzero_volume_clamps_to_minus_thirty_db_not_unbounded_negative() {
        // log10(0.001) * 20 == -60.0, which must be clamped to -30.0, not sent as-is.
        let volume = Volume::new(0.001);
        assert!(!volume.is_silent());
        let db = volume.to_db();
        assert_eq!(db, -30.0);
    }

    #[test]
    fn volume_out_of_range_input_is_clamped_on_construction() {
        assert_eq!(Volume::new(-1.0), Volume::MIN);
        assert_eq!(Volume::new(2.0), Volume::MAX);
    }

    #[test]
    fn progress_body_formats_three_rtp_timestamps() {
        let body = progress_body(1000, 2000, 5000);
        assert_eq!(body, b"progress: 1000/2000/5000\r\n");
    }
}
