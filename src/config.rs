//! Engine configuration knobs.

use std::time::Duration;

/// Tunable parameters for a streaming engine instance.
///
/// Defaults match the AirTunes v2 reference values; only `rtsp_port`/`audio_port`/
/// `control_port`/`timing_port` are preferences the receiver is free to override during SETUP.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum number of recently-sent audio packets retained for resend.
    pub backlog_size: usize,
    /// Frame count between periodic sync packets.
    pub timesync_interval_frames: u32,
    /// How long a paused stream may sit before the controller issues TEARDOWN.
    pub pause_teardown_timeout: Duration,
    /// Per-request RTSP timeout.
    pub rtsp_request_timeout: Duration,
    /// Fallback audio latency (frames) when the receiver's `Audio-Latency` header is absent or
    /// distrusted (see `rtsp::capabilities::resolve_latency`).
    pub default_latency_frames: u32,
    /// Preferred RTSP TCP port.
    pub rtsp_port: u16,
    /// Preferred audio UDP port.
    pub audio_port: u16,
    /// Preferred control UDP port.
    pub control_port: u16,
    /// Preferred timing UDP port.
    pub timing_port: u16,
    /// `User-Agent` header sent on every RTSP request.
    pub user_agent: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backlog_size: 1000,
            timesync_interval_frames: 44_100,
            pause_teardown_timeout: Duration::from_secs(2),
            rtsp_request_timeout: Duration::from_secs(5),
            default_latency_frames: 11_025,
            rtsp_port: 5000,
            audio_port: 6000,
            control_port: 6001,
            timing_port: 6002,
            user_agent: "iTunes/7.6.2 (Windows; N;)".to_string(),
        }
    }
}

impl StreamConfig {
    /// Start building a configuration from defaults.
    #[must_use]
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::default()
    }
}

/// Fluent builder for [`StreamConfig`].
#[derive(Debug, Default)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    /// Set the backlog ring size.
    #[must_use]
    pub fn backlog_size(mut self, size: usize) -> Self {
        self.config.backlog_size = size;
        self
    }

    /// Set the sync cadence, in frames.
    #[must_use]
    pub fn timesync_interval_frames(mut self, frames: u32) -> Self {
        self.config.timesync_interval_frames = frames;
        self
    }

    /// Set the pause-to-teardown timeout.
    #[must_use]
    pub fn pause_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.config.pause_teardown_timeout = timeout;
        self
    }

    /// Set the per-RTSP-request timeout.
    #[must_use]
    pub fn rtsp_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.rtsp_request_timeout = timeout;
        self
    }

    /// Set the fallback audio latency, in frames.
    #[must_use]
    pub fn default_latency_frames(mut self, frames: u32) -> Self {
        self.config.default_latency_frames = frames;
        self
    }

    /// Set the preferred ports (rtsp, audio, control, timing).
    #[must_use]
    pub fn preferred_ports(mut self, rtsp: u16, audio: u16, control: u16, timing: u16) -> Self {
        self.config.rtsp_port = rtsp;
        self.config.audio_port = audio;
        self.config.control_port = control;
        self.config.timing_port = timing;
        self
    }

    /// Set the `User-Agent` header value.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> StreamConfig {
        self.config
    }
}
