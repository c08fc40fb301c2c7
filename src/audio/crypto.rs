//! AES-128-CBC encryption of ALAC payloads, whole 16-byte blocks only.
//!
//! RAOP never pads the trailing partial block of a packet; it leaves it in plaintext. The IV is
//! reset to the session IV at the start of every packet, so CBC chaining never crosses a packet
//! boundary.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};

/// Session AES key/IV pair, owned for the lifetime of one `Session`.
pub struct SessionKey {
    cipher: Aes128,
    iv: [u8; 16],
}

impl SessionKey {
    /// Build from a raw 16-byte key and 16-byte IV.
    #[must_use]
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        let cipher = Aes128::new(GenericArray::from_slice(&key));
        Self { cipher, iv }
    }

    /// The session IV, as provisioned in the ANNOUNCE SDP.
    #[must_use]
    pub fn iv(&self) -> [u8; 16] {
        self.iv
    }

    /// Encrypt `data` in place: every full 16-byte block is AES-128-CBC encrypted against the
    /// session IV (reset fresh for this call); any trailing `< 16` bytes are left untouched.
    pub fn encrypt_packet(&self, data: &mut [u8]) {
        let mut prev = self.iv;
        let whole_blocks = data.len() / 16;
        for block_idx in 0..whole_blocks {
            let block = &mut data[block_idx * 16..block_idx * 16 + 16];
            for (b, p) in block.iter_mut().zip(prev.iter()) {
                *b ^= p;
            }
            let generic = GenericArray::from_mut_slice(block);
            self.cipher.encrypt_block(generic);
            prev.copy_from_slice(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_trailing_partial_block_untouched() {
        let key = SessionKey::new([0x11; 16], [0x22; 16]);
        let mut data = vec![0u8; 16 + 5];
        data[16..].copy_from_slice(&[1, 2, 3, 4, 5]);
        key.encrypt_packet(&mut data);
        assert_eq!(&data[16..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn encrypts_every_whole_block() {
        let key = SessionKey::new([0x11; 16], [0x22; 16]);
        let mut data = vec![0u8; 32];
        let original = data.clone();
        key.encrypt_packet(&mut data);
        assert_ne!(data, original);
    }

    #[test]
    fn iv_resets_each_call_so_identical_input_yields_identical_output() {
        let key = SessionKey::new([0x11; 16], [0x22; 16]);
        let mut a = vec![0xAB; 16];
        let mut b = vec![0xAB; 16];
        key.encrypt_packet(&mut a);
        key.encrypt_packet(&mut b);
        assert_eq!(a, b);
    }
}
