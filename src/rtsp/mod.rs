//! Sans-IO RTSP request/response types, wire codec, Digest auth, and the RTSP client proper.

pub mod capabilities;
pub mod client;
pub mod codec;
pub mod digest;
pub mod headers;
pub mod request;
pub mod response;

pub use capabilities::Capabilities;
pub use client::{RtspClient, RtspClientError};
pub use codec::{RtspCodec, RtspCodecError};
pub use headers::Headers;
pub use request::{RtspRequest, RtspRequestBuilder};
pub use response::{RtspResponse, StatusCode};

use std::fmt;

/// RTSP methods the engine sends. `GET_PARAMETER`/`PLAY`/`POST` are never needed by a sender and
/// are not represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Capability probe, carries the `Apple-Challenge` header.
    Options,
    /// Announce stream parameters via an SDP body.
    Announce,
    /// Negotiate UDP transport.
    Setup,
    /// Start streaming.
    Record,
    /// Set a session parameter (volume, progress, metadata).
    SetParameter,
    /// Discard buffered audio and restart the RTP sequence from a new position.
    Flush,
    /// End the session.
    Teardown,
    /// Rogue Amoeba extension: push raw album art image bytes.
    XRaSetAlbumArt,
}

impl Method {
    /// The method name as it appears on the request line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Announce => "ANNOUNCE",
            Method::Setup => "SETUP",
            Method::Record => "RECORD",
            Method::SetParameter => "SET_PARAMETER",
            Method::Flush => "FLUSH",
            Method::Teardown => "TEARDOWN",
            Method::XRaSetAlbumArt => "X_RA_SET_ALBUM_ART",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
