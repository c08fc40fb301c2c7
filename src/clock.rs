//! Monotonic process clock and NTP timestamp conversion.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01): `0x83AA7E80`.
pub const NTP_EPOCH_OFFSET_SECS: u64 = 0x83AA_7E80;

/// RTP timestamp ticks per second for 44.1 kHz audio.
pub const TIMESTAMPS_PER_SECOND: u32 = 44_100;

/// A 64-bit NTP timestamp: 32-bit integer seconds (since the NTP epoch) plus a 32-bit fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtpTimestamp {
    /// Seconds since 1900-01-01.
    pub seconds: u32,
    /// Fractional second, `[0, 2^32)` mapping uniformly onto `[0, 1)`.
    pub fraction: u32,
}

impl NtpTimestamp {
    /// Encode as 8 big-endian bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.seconds.to_be_bytes());
        buf[4..8].copy_from_slice(&self.fraction.to_be_bytes());
        buf
    }

    /// Decode from 8 big-endian bytes.
    #[must_use]
    pub fn decode(buf: &[u8; 8]) -> Self {
        Self {
            seconds: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            fraction: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }

    /// Combine into a single 64-bit value (seconds in the high word), as used for ordering
    /// comparisons in tests.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        (u64::from(self.seconds) << 32) | u64::from(self.fraction)
    }

    fn from_duration_since_ntp_epoch(d: Duration) -> Self {
        let seconds = d.as_secs().wrapping_add(0); // fits u32 for any realistic run
        #[allow(clippy::cast_possible_truncation)]
        let seconds = seconds as u32;
        let nanos = d.subsec_nanos();
        // Map [0, 1_000_000_000) nanoseconds onto [0, 2^32) uniformly.
        let fraction = ((u64::from(nanos) << 32) / 1_000_000_000) as u32;
        Self { seconds, fraction }
    }
}

/// Process-wide monotonic clock, anchored once at construction.
///
/// `now_ntp()` never regresses and is immune to mid-stream wall-clock adjustments: every call
/// adds the monotonic elapsed time since construction to the wall-clock reading taken at
/// construction, rather than re-sampling `SystemTime::now()` directly.
#[derive(Debug, Clone)]
pub struct Clock {
    anchor_instant: Instant,
    anchor_unix: Duration,
}

impl Clock {
    /// Anchor a new clock to the current instant.
    #[must_use]
    pub fn new() -> Self {
        let anchor_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self {
            anchor_instant: Instant::now(),
            anchor_unix,
        }
    }

    /// Current NTP timestamp.
    #[must_use]
    pub fn now_ntp(&self) -> NtpTimestamp {
        let elapsed = self.anchor_instant.elapsed();
        let unix_now = self.anchor_unix + elapsed;
        let ntp_now = unix_now + Duration::from_secs(NTP_EPOCH_OFFSET_SECS);
        NtpTimestamp::from_duration_since_ntp_epoch(ntp_now)
    }

    /// Extrapolate the RTP timestamp for "now", given the timestamp and instant recorded at
    /// stream start.
    #[must_use]
    pub fn now_rtp(&self, start_ts: u32, start_instant: Instant) -> u32 {
        let elapsed = start_instant.elapsed();
        let ticks = (elapsed.as_secs_f64() * f64::from(TIMESTAMPS_PER_SECOND)).floor();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = ticks as u32;
        start_ts.wrapping_add(ticks)
    }

    /// The `Instant` this clock was anchored at (used by callers that need a monotonic
    /// reference point alongside NTP values, e.g. stream-start bookkeeping).
    #[must_use]
    pub fn anchor(&self) -> Instant {
        self.anchor_instant
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntp_round_trips_through_wire_bytes() {
        let ts = NtpTimestamp {
            seconds: 0x1234_5678,
            fraction: 0x9abc_def0,
        };
        let encoded = ts.encode();
        assert_eq!(NtpTimestamp::decode(&encoded), ts);
    }

    #[test]
    fn now_ntp_is_monotonic_non_decreasing() {
        let clock = Clock::new();
        let a = clock.now_ntp();
        let b = clock.now_ntp();
        assert!(b.as_u64() >= a.as_u64());
    }

    #[test]
    fn now_ntp_seconds_are_past_the_ntp_epoch_offset() {
        let clock = Clock::new();
        let ts = clock.now_ntp();
        assert!(ts.seconds as u64 >= NTP_EPOCH_OFFSET_SECS);
    }

    #[test]
    fn now_rtp_extrapolates_from_start() {
        let clock = Clock::new();
        let start_instant = clock.anchor();
        let start_ts = 1000u32;
        // Called immediately, elapsed is near zero, so the result should be very close to
        // start_ts (allow a few ticks of scheduling slack).
        let now = clock.now_rtp(start_ts, start_instant);
        assert!(now >= start_ts);
        assert!(now - start_ts < 4410); // well under 100ms worth of ticks
    }
}
