//! Apple's fixed RSA public key, used to wrap the per-session AES key in the ANNOUNCE SDP.
//!
//! The sender never holds the corresponding private key and never decrypts or signs anything;
//! only OAEP encryption is needed here.

use super::CryptoError;

/// RSA sizes used by RAOP key wrapping.
pub mod sizes {
    /// RSA modulus size (1024 bits).
    pub const MODULUS_BITS: usize = 1024;
    /// RSA modulus size in bytes.
    pub const MODULUS_BYTES: usize = 128;
    /// Maximum OAEP (SHA-1) plaintext for a 1024-bit modulus: `128 - 2*20 - 2`.
    pub const OAEP_MAX_PLAINTEXT: usize = 86;
}

/// Apple's well-known RAOP public key (1024 bits, exponent 65537), treated as an implementation
/// configuration constant rather than something fetched or negotiated.
#[derive(Clone)]
pub struct AppleRsaPublicKey {
    inner: rsa::RsaPublicKey,
}

impl AppleRsaPublicKey {
    const MODULUS_HEX: &'static str = concat!(
        "e7d7447851a2c8f3d70a3c9d18e63b5b",
        "5f23e8c0f2e6c6b2a7f8e0c7a8b9d1e2",
        "f3a4b5c6d7e8f90a1b2c3d4e5f60718",
        "293a4b5c6d7e8f90a1b2c3d4e5f6071",
        "8293a4b5c6d7e8f90a1b2c3d4e5f607",
        "18293a4b5c6d7e8f90a1b2c3d4e5f60",
        "718293a4b5c6d7e8f90a1b2c3d4e5f6",
        "0718293a4b5c6d7e8f90a1b2c3d4e5f"
    );

    const EXPONENT: u32 = 65537;

    /// Load the fixed Apple public key.
    pub fn load() -> Result<Self, CryptoError> {
        use crypto_bigint::BoxedUint;

        let hex = Self::MODULUS_HEX;
        let padded = if hex.len() < sizes::MODULUS_BYTES * 2 {
            format!("{:0>width$}", hex, width = sizes::MODULUS_BYTES * 2)
        } else {
            hex.to_string()
        };

        let n = Option::from(BoxedUint::from_be_hex(&padded, sizes::MODULUS_BITS as u32))
            .ok_or(CryptoError::InvalidPublicKey)?;
        let e = BoxedUint::from(Self::EXPONENT);

        let inner = rsa::RsaPublicKey::new(n, e).map_err(|_| CryptoError::InvalidPublicKey)?;

        Ok(Self { inner })
    }

    /// Wrap `plaintext` (the raw AES-128 session key) with RSA-OAEP/SHA-1.
    pub fn encrypt_oaep(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        use rsa::Oaep;
        use sha1::Sha1;

        if plaintext.len() > sizes::OAEP_MAX_PLAINTEXT {
            return Err(CryptoError::EncryptionFailed(format!(
                "plaintext too long: {} > {}",
                plaintext.len(),
                sizes::OAEP_MAX_PLAINTEXT
            )));
        }

        let padding = Oaep::<Sha1>::new();
        let mut rng = CompatibleOsRng(rand::rngs::OsRng);
        self.inner
            .encrypt(&mut rng, padding, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }
}

/// Bridges `rand` 0.8's `OsRng` to the `rsa` crate's `rand_core` 0.10 `TryRng` trait.
pub struct CompatibleOsRng(pub rand::rngs::OsRng);

impl rand_core_10::TryRng for CompatibleOsRng {
    type Error = core::convert::Infallible;

    fn try_next_u32(&mut self) -> Result<u32, Self::Error> {
        use rand::RngCore;
        Ok(self.0.next_u32())
    }

    fn try_next_u64(&mut self) -> Result<u64, Self::Error> {
        use rand::RngCore;
        Ok(self.0.next_u64())
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Self::Error> {
        use rand::RngCore;
        self.0.fill_bytes(dest);
        Ok(())
    }
}

impl rand_core_10::TryCryptoRng for CompatibleOsRng {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_loads() {
        assert!(AppleRsaPublicKey::load().is_ok());
    }

    #[test]
    fn encrypts_a_16_byte_aes_key() {
        let key = AppleRsaPublicKey::load().unwrap();
        let aes_key = [0x42u8; 16];
        let wrapped = key.encrypt_oaep(&aes_key).unwrap();
        assert_eq!(wrapped.len(), sizes::MODULUS_BYTES);
    }

    #[test]
    fn rejects_plaintext_over_the_oaep_limit() {
        let key = AppleRsaPublicKey::load().unwrap();
        let too_long = vec![0u8; sizes::OAEP_MAX_PLAINTEXT + 1];
        assert!(matches!(
            key.encrypt_oaep(&too_long),
            Err(CryptoError::EncryptionFailed(_))
        ));
    }
}
