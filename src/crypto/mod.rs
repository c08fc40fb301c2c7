//! RSA session-key wrapping for the ANNOUNCE handshake.

pub mod rsa;

pub use rsa::AppleRsaPublicKey;

/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The public key constant failed to load (should never happen at runtime).
    #[error("invalid public key")]
    InvalidPublicKey,

    /// OAEP encryption failed (plaintext too long, or the underlying crate rejected it).
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}
