//! A receiver's address plus the TXT-record fields a discovery collaborator resolves ahead of
//! connecting. Discovery itself (mDNS/Zeroconf) is out of scope; this type is the narrow
//! contract between that collaborator and [`crate::controller::ReceiverGroup`].

use std::net::IpAddr;

/// A receiver discovered on the network, described by its RAOP `_raop._tcp` TXT record.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    /// Resolved address to dial for RTSP.
    pub address: IpAddr,
    /// RTSP TCP port (`_raop._tcp`'s resolved port, usually 5000).
    pub port: u16,
    /// `txtvers` TXT field; only `1` is understood.
    pub txt_version: u8,
    /// `pw` TXT field: whether the receiver requires Digest authentication.
    pub password_required: bool,
    /// `sr` TXT field: sample rate, expected to be `44100`.
    pub sample_rate: u32,
    /// `ss` TXT field: sample size in bits, expected to be `16`.
    pub sample_size: u8,
    /// `ch` TXT field: channel count, expected to be `2`.
    pub channels: u8,
    /// `tp` TXT field: supported transports, e.g. `"UDP"`.
    pub transports: String,
    /// `raAudioFormats` TXT field, when present (Rogue Amoeba extension).
    pub ra_audio_formats: Option<String>,
    /// `rast` TXT field, when present.
    pub ra_stream_type: Option<String>,
    /// `ramach` TXT field, when present.
    pub ra_machine: Option<String>,
    /// `raver` TXT field, when present.
    pub ra_version: Option<String>,
}

impl DeviceDescriptor {
    /// Whether this descriptor describes a receiver this engine can actually stream to: TXT
    /// version 1, 44.1 kHz, 16-bit, stereo.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.txt_version == 1 && self.sample_rate == 44_100 && self.sample_size == 16 && self.channels == 2
    }

    /// Socket address to open the RTSP connection against.
    #[must_use]
    pub fn rtsp_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.address, self.port)
    }
}
