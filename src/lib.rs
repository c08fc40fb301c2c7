//! A client-side AirTunes v2 (RAOP) audio streaming engine: sends a stereo 44.1 kHz PCM stream,
//! synchronized and reliably, to one or more AirPlay-compatible receivers over an RTSP control
//! channel plus three UDP channels (audio, control/resend, timing).
//!
//! Device discovery (mDNS/Zeroconf), on-disk audio decoding, the ALAC codec, AES/RSA/Digest
//! crypto primitives, and DAAP/PList encoding helpers are treated as narrow, external
//! dependencies rather than reimplemented; see [`device::DeviceDescriptor`] for the contract a
//! discovery collaborator fulfills.
//!
//! ## Example
//!
//! ```rust,no_run
//! use airtunes2::config::StreamConfig;
//! use airtunes2::controller::ReceiverGroup;
//! use airtunes2::rtsp::client::Credentials;
//!
//! # async fn example() -> Result<(), airtunes2::error::StreamError> {
//! let receivers = vec!["192.168.1.50:5000".parse().unwrap()];
//! let mut group = ReceiverGroup::new(
//!     "192.168.1.20".parse().unwrap(),
//!     StreamConfig::default(),
//!     Credentials::default(),
//!     None,
//!     receivers,
//! );
//! group.connect().await?;
//!
//! let silence = vec![0u8; 352 * 2 * 2];
//! group.send_frame(&silence).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Audio pipeline: ALAC framing, optional AES encryption, RTP packetization.
pub mod audio;
/// Bounded ring of recently-sent audio packets, for resend.
pub mod backlog;
/// Monotonic clock and NTP timestamp conversion.
pub mod clock;
/// Wire encode/decode for RTP audio, sync, timing, and resend packets.
pub mod codec;
/// Engine configuration knobs.
pub mod config;
/// Group-level orchestration: shared clock, fan-out, and the stream state machine.
pub mod controller;
/// The narrow contract a discovery collaborator populates before connecting.
pub mod device;
/// Engine error types.
pub mod error;
/// Volume and progress `SET_PARAMETER` bodies.
pub mod metadata;
/// `AsyncRead`/`AsyncWrite` abstraction and UDP socket binding helpers.
pub mod net;
/// RTSP request/response types, the client state machine, and capability derivation.
pub mod rtsp;
/// SDP body construction for `ANNOUNCE`.
pub mod sdp;
/// Per-receiver session: RTSP connection, UDP sockets, capabilities, handshake.
pub mod session;
/// RSA/AES key material.
pub mod crypto;
/// Sync/timing engine: periodic sync packets, inbound timing-request answers.
pub mod sync;

pub use config::StreamConfig;
pub use controller::{ReceiverGroup, StreamState};
pub use device::DeviceDescriptor;
pub use error::StreamError;
pub use session::Session;
