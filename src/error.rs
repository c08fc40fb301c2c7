//! Crate-wide error taxonomy.

use std::net::SocketAddr;

use crate::rtsp::Method;

/// Errors produced by the streaming engine.
///
/// Variants map onto the error kinds the engine distinguishes: malformed wire data is dropped
/// by the caller rather than raised here (see `codec::CodecError`, which is a narrower type
/// consumed internally by packet-decoding call sites); everything that can surface to a
/// `Session` or the `StreamController` is one of these.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// An RTSP request/response exchange failed at the protocol level (non-2xx status, or a
    /// response the session could not interpret).
    #[error("RTSP {method} to {device} failed: {status} {reason}")]
    RtspProtocolError {
        /// Method that was sent.
        method: Method,
        /// Device the request was sent to.
        device: SocketAddr,
        /// Status code returned.
        status: u16,
        /// Reason phrase returned.
        reason: String,
    },

    /// Digest authentication was required but credentials were absent or rejected twice.
    #[error("authentication required for {device} but not satisfied: {message}")]
    AuthRequired {
        /// Device that demanded authentication.
        device: SocketAddr,
        /// Explanation (missing credentials, rejected twice, unsupported scheme).
        message: String,
    },

    /// A request did not complete within its configured deadline.
    #[error("{method} to {device} timed out after {elapsed_secs}s")]
    Timeout {
        /// Method that was sent.
        method: Method,
        /// Device the request was sent to.
        device: SocketAddr,
        /// Configured timeout that elapsed.
        elapsed_secs: u64,
    },

    /// The transport (TCP session or UDP socket) is no longer usable.
    #[error("transport to {device} is down: {source}")]
    TransportDown {
        /// Device the transport was connected to.
        device: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The receiver's negotiated capabilities are incompatible with the session's configuration
    /// (e.g. the receiver demands encryption but no AES key was provisioned, or vice versa).
    #[error("capability mismatch with {device}: {message}")]
    CapabilityMismatch {
        /// Device whose capabilities were incompatible.
        device: SocketAddr,
        /// Explanation.
        message: String,
    },

    /// An internal failure in the codec or crypto path that cannot be attributed to the network
    /// peer; fatal to the stream.
    #[error("fatal internal error: {0}")]
    FatalInternal(String),

    /// A wire-format decode failure surfaced past the point where it could be silently dropped
    /// (e.g. during a capability-relevant response parse).
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
}

impl StreamError {
    /// Whether the controller should treat this as a reason to remove just the offending
    /// session from its group, rather than fail the whole stream.
    #[must_use]
    pub fn is_session_local(&self) -> bool {
        matches!(
            self,
            Self::RtspProtocolError { .. }
                | Self::Timeout { .. }
                | Self::TransportDown { .. }
                | Self::AuthRequired { .. }
                | Self::MalformedPacket(_)
        )
    }
}
