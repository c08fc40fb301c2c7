//! Frame assembly, ALAC encoding, optional AES encryption, and RTP packetization.
//!
//! Fixed to the one format the engine supports: 44.1 kHz, 16-bit, stereo, 352 frames per
//! packet. Arbitrary sample rates and channel counts are out of scope.

use bytes::Bytes;

use crate::audio::crypto::SessionKey;
use crate::codec;

/// PCM frames packed into a single RTP audio packet.
pub const FRAMES_PER_PACKET: usize = 352;
/// Fixed channel count: stereo.
pub const CHANNELS: usize = 2;
/// Fixed sample rate.
pub const SAMPLE_RATE: u32 = 44_100;
/// Bytes of interleaved 16-bit PCM per packet, before ALAC encoding.
pub const PCM_BYTES_PER_PACKET: usize = FRAMES_PER_PACKET * CHANNELS * 2;

/// Which of the three wire encodings a session's audio packets use.
pub enum AudioFormat {
    /// ALAC payload, AES-128-CBC encrypted (whole blocks only).
    EncryptedAlac(SessionKey),
    /// Plain ALAC payload.
    UnencryptedAlac,
    /// Uncompressed, big-endian 16-bit stereo PCM, unencrypted. Used by receivers that never
    /// negotiate ALAC.
    RawL16,
}

/// Byte-swap interleaved 16-bit little-endian PCM samples to big-endian, the wire order a raw
/// L16 payload is sent in (ALAC receivers never see this; the encoder handles byte order
/// itself).
fn big_endian_pcm(pcm: &[u8]) -> Vec<u8> {
    let mut out = pcm.to_vec();
    for sample in out.chunks_exact_mut(2) {
        sample.swap(0, 1);
    }
    out
}

/// Turns successive PCM chunks into wire-ready RTP audio packets.
///
/// One `AudioPipeline` per `Session`; sequence number, RTP timestamp, and the "first packet"
/// marker bit all live here because they are part of this session's RTP stream state, not the
/// receiver's.
pub struct AudioPipeline {
    encoder: alac_encoder::AlacEncoder,
    input_format: alac_encoder::FormatDescription,
    format: AudioFormat,
    ssrc: u32,
    seq: u16,
    timestamp: u32,
    first_packet: bool,
}

impl AudioPipeline {
    /// Build a pipeline for a freshly connected session.
    #[must_use]
    pub fn new(ssrc: u32, format: AudioFormat) -> Self {
        let alac_format = alac_encoder::FormatDescription::alac(
            f64::from(SAMPLE_RATE),
            FRAMES_PER_PACKET as u32,
            CHANNELS as u32,
        );
        let input_format =
            alac_encoder::FormatDescription::pcm::<i16>(f64::from(SAMPLE_RATE), CHANNELS as u32);
        Self {
            encoder: alac_encoder::AlacEncoder::new(&alac_format),
            input_format,
            format,
            ssrc,
            seq: 0,
            timestamp: 0,
            first_packet: true,
        }
    }

    /// Current RTP sequence number (next packet to be emitted will use this value).
    #[must_use]
    pub fn sequence(&self) -> u16 {
        self.seq
    }

    /// Current RTP timestamp.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Encode one packet's worth of interleaved 16-bit little-endian PCM bytes. `pcm` shorter
    /// than [`PCM_BYTES_PER_PACKET`] is zero-padded (silence) to a full packet; this only
    /// happens for the final packet of a source.
    pub fn encode_packet(&mut self, pcm: &[u8]) -> Bytes {
        let mut padded;
        let pcm = if pcm.len() < PCM_BYTES_PER_PACKET {
            padded = pcm.to_vec();
            padded.resize(PCM_BYTES_PER_PACKET, 0);
            padded.as_slice()
        } else {
            pcm
        };

        let (payload, payload_type) = match &self.format {
            AudioFormat::RawL16 => (big_endian_pcm(pcm), codec::PAYLOAD_TYPE_L16),
            AudioFormat::UnencryptedAlac | AudioFormat::EncryptedAlac(_) => {
                let mut alac_out = vec![0u8; PCM_BYTES_PER_PACKET];
                let encoded_len = self.encoder.encode(&self.input_format, pcm, &mut alac_out);
                alac_out.truncate(encoded_len);
                if let AudioFormat::EncryptedAlac(key) = &self.format {
                    key.encrypt_packet(&mut alac_out);
                }
                (alac_out, codec::PAYLOAD_TYPE_ALAC)
            }
        };

        let marker = self.first_packet;
        self.first_packet = false;
        let packet = codec::encode_audio(self.seq, self.timestamp, self.ssrc, &payload, marker, payload_type);

        self.seq = self.seq.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(FRAMES_PER_PACKET as u32);

        packet
    }

    /// Reset sequence/timestamp/marker state after a FLUSH (new playback run within the same
    /// session).
    pub fn flush(&mut self) {
        self.first_packet = true;
    }
}
