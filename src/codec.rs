//! Byte-exact encode/decode of the four on-wire RTP/RAOP packet shapes.
//!
//! All multi-byte fields are big-endian; there is no alignment padding. These are pure,
//! stateless functions — no session state is threaded through them.

use bytes::{BufMut, Bytes, BytesMut};

use crate::clock::NtpTimestamp;

/// RAOP control-channel payload types, carried in byte 1 (masked with `0x7f`) of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    /// Receiver → sender timing request.
    TimingRequest,
    /// Sender → receiver timing response.
    TimingResponse,
    /// Sender → receiver clock sync.
    Sync,
    /// Receiver → sender resend (retransmit) request.
    RetransmitRequest,
    /// Sender → receiver audio, real-time channel.
    AudioRealtime,
    /// Sender → receiver audio, buffered channel.
    AudioBuffered,
}

impl PayloadType {
    /// Recover the payload type from the low 7 bits of header byte 1.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte & 0x7f {
            0x52 => Some(Self::TimingRequest),
            0x53 => Some(Self::TimingResponse),
            0x54 => Some(Self::Sync),
            0x55 => Some(Self::RetransmitRequest),
            0x60 => Some(Self::AudioRealtime),
            0x61 => Some(Self::AudioBuffered),
            _ => None,
        }
    }
}

/// A decoded timing request, as sent by the receiver on the timing channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingRequest {
    /// The receiver's send timestamp, echoed back verbatim in the response's `reference_time`.
    pub send_time: NtpTimestamp,
}

/// Errors raised while decoding a wire packet. Any occurrence means the caller should drop the
/// packet and count it, never treat it as fatal.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer was shorter than the packet shape requires.
    #[error("buffer too small: need {needed} bytes, have {have}")]
    TooShort {
        /// Bytes required.
        needed: usize,
        /// Bytes actually present.
        have: usize,
    },
    /// Header byte 1's low 7 bits did not match the expected payload type.
    #[error("unexpected payload type: {0:#04x}")]
    UnexpectedPayloadType(u8),
}

fn require_len(buf: &[u8], needed: usize) -> Result<(), CodecError> {
    if buf.len() < needed {
        Err(CodecError::TooShort {
            needed,
            have: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Size in bytes of the RTP audio header that precedes every audio payload.
pub const AUDIO_HEADER_SIZE: usize = 12;

/// RTP payload type for an ALAC-encoded audio packet (encrypted or not).
pub const PAYLOAD_TYPE_ALAC: u8 = 0x60;
/// RTP payload type for a raw, uncompressed L16 stereo audio packet.
pub const PAYLOAD_TYPE_L16: u8 = 0x0A;

/// Encode an audio packet: 12-byte RTP header followed by `payload`.
///
/// Byte 0 is always `0x80` (version 2, no padding/extension/csrc). Byte 1 is `payload_type`
/// with the marker bit (`0x80`) set when `marker` is true, so the first packet of a stream (or
/// of a resumed stream) has its top bit set.
#[must_use]
pub fn encode_audio(seq: u16, ts: u32, ssrc: u32, payload: &[u8], marker: bool, payload_type: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(AUDIO_HEADER_SIZE + payload.len());
    buf.put_u8(0x80);
    buf.put_u8(payload_type | if marker { 0x80 } else { 0 });
    buf.put_u16(seq);
    buf.put_u32(ts);
    buf.put_u32(ssrc);
    buf.put_slice(payload);
    buf.freeze()
}

/// Size in bytes of an encoded sync packet.
pub const SYNC_PACKET_SIZE: usize = 20;

/// Literal sequence number every `SyncPacket` carries. The reference implementation hardcodes
/// this value; its significance (if any) is undocumented, so it is preserved verbatim here.
const SYNC_SEQ: u16 = 7;

/// Encode a sync packet.
///
/// - `now_ts`: the RTP timestamp of the next audio packet to be emitted.
/// - `latency`: the session's resolved audio latency, in frames.
/// - `last_sync_ntp`: the NTP time of the *previous* sync emission (or of this one, for the
///   first sync of a stream/resume — the caller decides which to pass).
/// - `first`: whether this is the first sync after connect or after a FLUSH; sets the
///   extension bit.
#[must_use]
pub fn encode_sync(now_ts: u32, latency: u32, last_sync_ntp: NtpTimestamp, first: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(SYNC_PACKET_SIZE);
    buf.put_u8(0x80 | if first { 0x10 } else { 0 });
    buf.put_u8(0xD4);
    buf.put_u16(SYNC_SEQ);
    buf.put_u32(now_ts.wrapping_sub(latency));
    buf.put_slice(&last_sync_ntp.encode());
    buf.put_u32(now_ts);
    buf.freeze()
}

/// A decoded sync packet, for the receiver-facing test fixtures and round-trip tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPacket {
    /// Extension bit: first-after-connect-or-FLUSH.
    pub first: bool,
    /// `now_ts - latency`.
    pub now_minus_latency: u32,
    /// NTP time of the previous sync.
    pub time_last_sync: NtpTimestamp,
    /// `now_ts`.
    pub now_ts: u32,
}

/// Decode a sync packet (used by tests and by any mock receiver fixture).
///
/// # Errors
/// Returns [`CodecError`] if the buffer is too short or the payload type byte doesn't match.
pub fn decode_sync(buf: &[u8]) -> Result<SyncPacket, CodecError> {
    require_len(buf, SYNC_PACKET_SIZE)?;
    if buf[1] & 0x7f != 0x54 {
        return Err(CodecError::UnexpectedPayloadType(buf[1]));
    }
    let first = buf[0] & 0x10 != 0;
    let now_minus_latency = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let time_last_sync = NtpTimestamp::decode(&[
        buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
    ]);
    let now_ts = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);
    Ok(SyncPacket {
        first,
        now_minus_latency,
        time_last_sync,
        now_ts,
    })
}

/// Size in bytes of a timing request/response packet.
pub const TIMING_PACKET_SIZE: usize = 32;

/// Decode a timing request from the timing channel.
///
/// # Errors
/// Returns [`CodecError`] if the buffer is too short or the payload type byte doesn't match.
pub fn decode_timing_request(buf: &[u8]) -> Result<TimingRequest, CodecError> {
    require_len(buf, TIMING_PACKET_SIZE)?;
    if PayloadType::from_byte(buf[1]) != Some(PayloadType::TimingRequest) {
        return Err(CodecError::UnexpectedPayloadType(buf[1]));
    }
    // The request's own send time occupies the last 8 bytes of the 32-byte packet (mirroring
    // the response's trailing `send_time` field, which is what the receiver compares against).
    let send_time = NtpTimestamp::decode(&[
        buf[24], buf[25], buf[26], buf[27], buf[28], buf[29], buf[30], buf[31],
    ]);
    Ok(TimingRequest { send_time })
}

/// Encode a timing response.
///
/// `received_time` should be sampled as close to socket-read time as possible; `send_time` is
/// sampled immediately before the encoded bytes are written to the socket. The two must be
/// independent clock reads — the gap between them is the engine's internal processing delay,
/// which the receiver uses for clock offset estimation.
#[must_use]
pub fn encode_timing_response(
    request: &TimingRequest,
    received_time: NtpTimestamp,
    send_time: NtpTimestamp,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(TIMING_PACKET_SIZE);
    buf.put_u8(0x80);
    buf.put_u8(0x53 | 0x80); // marker set
    buf.put_u16(0x0007);
    buf.put_u32(0);
    buf.put_slice(&request.send_time.encode()); // reference_time
    buf.put_slice(&received_time.encode());
    buf.put_slice(&send_time.encode());
    buf.freeze()
}

/// A decoded resend (retransmit) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRequest {
    /// First missing sequence number.
    pub missed_seq: u16,
    /// Number of consecutive sequence numbers missing, starting at `missed_seq`.
    pub count: u16,
}

/// Decode a resend request from the control channel.
///
/// # Errors
/// Returns [`CodecError`] if the buffer is too short or the payload type byte doesn't match.
pub fn decode_resend_request(buf: &[u8]) -> Result<ResendRequest, CodecError> {
    require_len(buf, 8)?;
    if PayloadType::from_byte(buf[1]) != Some(PayloadType::RetransmitRequest) {
        return Err(CodecError::UnexpectedPayloadType(buf[1]));
    }
    let missed_seq = u16::from_be_bytes([buf[4], buf[5]]);
    let count = u16::from_be_bytes([buf[6], buf[7]]);
    Ok(ResendRequest { missed_seq, count })
}
