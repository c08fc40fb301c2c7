//! PCM frame assembly, ALAC encoding, and optional AES encryption.

pub mod crypto;
pub mod pipeline;

pub use crypto::SessionKey;
pub use pipeline::{AudioFormat, AudioPipeline, CHANNELS, FRAMES_PER_PACKET, SAMPLE_RATE};
