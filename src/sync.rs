//! Outbound sync-packet cadence and inbound timing-request handling.

use bytes::Bytes;

use crate::clock::{Clock, NtpTimestamp};
use crate::codec::{self, TimingRequest};

/// Frame count between periodic sync packets (once per second at 44.1 kHz).
pub const TIMESYNC_INTERVAL_FRAMES: u32 = 44_100;

/// Tracks when the next `SyncPacket` is due and builds it, plus answers inbound timing requests.
///
/// Cadence is driven by frame count rather than wall-clock elapsed time, so it stays exact under
/// scheduling jitter: a burst of packets that catches the controller up after falling behind
/// still emits sync packets at the same frame boundaries it would have on time.
pub struct SyncEngine {
    clock: Clock,
    frames_since_sync: u32,
    last_sync_ntp: NtpTimestamp,
    /// Set at stream-start and after every FLUSH; cleared once the next sync has been sent.
    pending_first: bool,
    interval_frames: u32,
    audio_latency_frames: u32,
}

impl SyncEngine {
    /// A sync engine for a freshly connected or resumed stream: the next `next_due` check
    /// always fires immediately because `pending_first` starts true.
    #[must_use]
    pub fn new(clock: Clock, interval_frames: u32, audio_latency_frames: u32) -> Self {
        let last_sync_ntp = clock.now_ntp();
        Self {
            clock,
            frames_since_sync: 0,
            last_sync_ntp,
            pending_first: true,
            interval_frames,
            audio_latency_frames,
        }
    }

    /// Record that `frames` worth of audio have just been emitted.
    pub fn record_frames_sent(&mut self, frames: u32) {
        self.frames_since_sync = self.frames_since_sync.saturating_add(frames);
    }

    /// Replace the latency figure carried in every subsequent sync packet. Called once the
    /// handshake has resolved the receiver's actual `Audio-Latency` response, which supersedes
    /// the default this engine was constructed with.
    pub fn set_audio_latency(&mut self, frames: u32) {
        self.audio_latency_frames = frames;
    }

    /// Whether a sync packet is due: either this is the first sync since connect/FLUSH, or at
    /// least `interval_frames` have been emitted since the last one.
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.pending_first || self.frames_since_sync >= self.interval_frames
    }

    /// Build the due sync packet for `next_ts` (the RTP timestamp of the next audio packet to
    /// be emitted) and reset the cadence counters.
    pub fn build_sync(&mut self, next_ts: u32) -> Bytes {
        let first = self.pending_first;
        // The first-after-connect-or-FLUSH packet reports its own emission time as
        // `time_last_sync`, since there is no genuine previous sync to report.
        let last_sync_ntp = if first {
            self.clock.now_ntp()
        } else {
            self.last_sync_ntp
        };

        let packet = codec::encode_sync(next_ts, self.audio_latency_frames, last_sync_ntp, first);

        self.last_sync_ntp = self.clock.now_ntp();
        self.frames_since_sync = 0;
        self.pending_first = false;

        packet
    }

    /// Reset cadence state after a FLUSH or a fresh TEARDOWN→resume: the next sync is due
    /// immediately and reports itself as first-after-connect.
    pub fn reset_for_resume(&mut self) {
        self.frames_since_sync = 0;
        self.pending_first = true;
        self.last_sync_ntp = self.clock.now_ntp();
    }

    /// Build the timing response for an inbound timing request. `received_at` should be sampled
    /// as close to socket-read time as possible by the caller; `send_time` is sampled here,
    /// immediately before the caller writes the response to the socket.
    #[must_use]
    pub fn answer_timing_request(&self, request: &TimingRequest, received_at: NtpTimestamp) -> Bytes {
        let send_time = self.clock.now_ntp();
        codec::encode_timing_response(request, received_at, send_time)
    }
}
