//! Receiver capability derivation from OPTIONS/ANNOUNCE/RECORD response headers.

use super::headers::raop;
use super::RtspResponse;

/// What the audio pipeline must produce for this receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    EncryptedAlac,
    UnencryptedAlac,
}

/// What metadata, if any, the receiver wants pushed via `SET_PARAMETER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    None,
    Daap,
}

/// Whether/how the receiver wants album art pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkFormat {
    None,
    Daap,
}

/// The `Audio-Jack-Status` speaker-type probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerType {
    Analog,
    Digital,
    Unplugged,
    Unknown,
}

impl SpeakerType {
    /// Derive from the raw `Audio-Jack-Status` header value, if present.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return SpeakerType::Unknown;
        };

        if value.contains("disconnected") {
            return SpeakerType::Unplugged;
        }
        if value.contains("connected") {
            if value.contains("digital") {
                return SpeakerType::Digital;
            }
            return SpeakerType::Analog;
        }
        SpeakerType::Unknown
    }
}

/// Immutable receiver capabilities, fixed once after RECORD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub audio_format: AudioFormat,
    pub wants_album_art: ArtworkFormat,
    pub wants_metadata: MetadataFormat,
    pub wants_progress: bool,
    pub lowercase_password: bool,
    pub has_bad_latency_header: bool,
    pub audio_latency_frames: Option<u32>,
}

impl Default for Capabilities {
    /// The conservative default: encrypted ALAC, no metadata surface, well-behaved latency
    /// header. Used when a receiver answers OPTIONS with neither `Apple-Response` nor `Server`.
    fn default() -> Self {
        Self {
            audio_format: AudioFormat::EncryptedAlac,
            wants_album_art: ArtworkFormat::None,
            wants_metadata: MetadataFormat::None,
            wants_progress: false,
            lowercase_password: false,
            has_bad_latency_header: false,
            audio_latency_frames: None,
        }
    }
}

impl Capabilities {
    /// Derive capabilities from an OPTIONS response. `Audio-Latency` is applied afterward, once
    /// it is known from a later response (it may arrive on OPTIONS, ANNOUNCE, or SETUP
    /// depending on receiver).
    #[must_use]
    pub fn from_options_response(response: &RtspResponse) -> Self {
        let has_apple_response = response.headers.contains(raop::APPLE_RESPONSE);
        let has_server = response.headers.contains(raop::SERVER);

        let mut caps = Self::default();

        if has_apple_response {
            caps.lowercase_password = false;
            caps.audio_format = AudioFormat::EncryptedAlac;
            caps.wants_album_art = ArtworkFormat::None;
            caps.wants_metadata = MetadataFormat::None;
            caps.wants_progress = false;
            caps.has_bad_latency_header = false;
        }

        if has_server {
            caps.lowercase_password = true;
            caps.has_bad_latency_header = true;

            if !has_apple_response {
                caps.audio_format = AudioFormat::UnencryptedAlac;
                caps.wants_album_art = ArtworkFormat::Daap;
                caps.wants_metadata = MetadataFormat::Daap;
                caps.wants_progress = true;
            }
        }

        caps
    }

    /// Fold in an `Audio-Latency` header observed on any response. Preserves the documented
    /// quirk: a bad-latency-header receiver's advertised value is discarded in favor of a fixed
    /// 11025-frame default, even though that default happens to coincide with some receivers'
    /// genuine advertised value.
    #[must_use]
    pub fn with_audio_latency(mut self, header_value: Option<&str>) -> Self {
        let Some(value) = header_value.and_then(|v| v.parse::<u32>().ok()) else {
            return self;
        };

        self.audio_latency_frames = Some(if self.has_bad_latency_header {
            11025
        } else {
            value
        });

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtsp::{Headers, StatusCode};

    fn response_with(headers: &[(&str, &str)]) -> RtspResponse {
        let mut h = Headers::new();
        for (k, v) in headers {
            h.insert(*k, *v);
        }
        RtspResponse {
            version: "RTSP/1.0".to_string(),
            status: StatusCode::OK,
            reason: "OK".to_string(),
            headers: h,
            body: Vec::new(),
        }
    }

    #[test]
    fn apple_response_only_means_encrypted_alac_no_metadata() {
        let caps = Capabilities::from_options_response(&response_with(&[(
            raop::APPLE_RESPONSE,
            "abc",
        )]));

        assert_eq!(caps.audio_format, AudioFormat::EncryptedAlac);
        assert_eq!(caps.wants_metadata, MetadataFormat::None);
        assert_eq!(caps.wants_album_art, ArtworkFormat::None);
        assert!(!caps.wants_progress);
        assert!(!caps.has_bad_latency_header);
        assert!(!caps.lowercase_password);
    }

    #[test]
    fn server_only_means_unencrypted_alac_with_daap_metadata() {
        let caps = Capabilities::from_options_response(&response_with(&[(
            raop::SERVER,
            "AirTunes/220.68",
        )]));

        assert_eq!(caps.audio_format, AudioFormat::UnencryptedAlac);
        assert_eq!(caps.wants_metadata, MetadataFormat::Daap);
        assert_eq!(caps.wants_album_art, ArtworkFormat::Daap);
        assert!(caps.wants_progress);
        assert!(caps.has_bad_latency_header);
        assert!(caps.lowercase_password);
    }

    #[test]
    fn both_headers_present_apple_response_wins_audio_format() {
        let caps = Capabilities::from_options_response(&response_with(&[
            (raop::APPLE_RESPONSE, "abc"),
            (raop::SERVER, "AirTunes/220.68"),
        ]));

        assert_eq!(caps.audio_format, AudioFormat::EncryptedAlac);
        assert_eq!(caps.wants_metadata, MetadataFormat::None);
        assert!(caps.lowercase_password);
        assert!(caps.has_bad_latency_header);
    }

    #[test]
    fn bad_latency_header_forces_11025_regardless_of_advertised_value() {
        let caps = Capabilities::from_options_response(&response_with(&[(
            raop::SERVER,
            "AirTunes/220.68",
        )]))
        .with_audio_latency(Some("322"));

        assert_eq!(caps.audio_latency_frames, Some(11025));
    }

    #[test]
    fn well_behaved_latency_header_uses_advertised_value() {
        let caps = Capabilities::from_options_response(&response_with(&[(
            raop::APPLE_RESPONSE,
            "abc",
        )]))
        .with_audio_latency(Some("500"));

        assert_eq!(caps.audio_latency_frames, Some(500));
    }

    #[test]
    fn missing_latency_header_leaves_it_unset() {
        let caps = Capabilities::from_options_response(&response_with(&[(
            raop::APPLE_RESPONSE,
            "abc",
        )]));
        assert_eq!(caps.audio_latency_frames, None);
    }

    #[test]
    fn speaker_type_from_jack_status() {
        assert_eq!(
            SpeakerType::from_header(Some("type=digital, connected")),
            SpeakerType::Digital
        );
        assert_eq!(
            SpeakerType::from_header(Some("type=analog, connected")),
            SpeakerType::Analog
        );
        assert_eq!(
            SpeakerType::from_header(Some("disconnected")),
            SpeakerType::Unplugged
        );
        assert_eq!(SpeakerType::from_header(None), SpeakerType::Unknown);
    }
}
