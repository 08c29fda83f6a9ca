use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use cast5::Cast5;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};
use des::TdesEde3;
use idea::Idea;
use num_enum::{FromPrimitive, IntoPrimitive};
use twofish::Twofish;

use crate::errors::Result;

/// Available symmetric key algorithms.
/// Ref: https://tools.ietf.org/html/rfc4880#section-9.2
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    Plaintext = 0,
    Idea = 1,
    /// TripleDES (DES-EDE, 168 bit key derived from 192)
    TripleDes = 2,
    /// CAST5 (128 bit key, as per [RFC2144])
    Cast5 = 3,
    /// Blowfish (128 bit key, 16 rounds)
    Blowfish = 4,
    Aes128 = 7,
    Aes192 = 8,
    Aes256 = 9,
    /// Twofish with 256-bit key [TWOFISH]
    Twofish = 10,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::Aes256
    }
}

/// Block cipher mode used to protect secret key material.
///
/// Not part of the OpenPGP wire format (which is always CFB); carried so an
/// injected secret key codec can describe foreign encodings.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum CipherMode {
    #[default]
    Cfb,
    Cbc,
    Other(u8),
}

macro_rules! cfb_decrypt {
    ($cipher:ty, $key:expr, $iv:expr, $data:expr) => {
        Decryptor::<$cipher>::new_from_slices($key, $iv)
            .map_err(|_| format_err!("cfb: invalid key or iv length"))?
            .decrypt($data)
    };
}

macro_rules! cfb_encrypt {
    ($cipher:ty, $key:expr, $iv:expr, $data:expr) => {
        Encryptor::<$cipher>::new_from_slices($key, $iv)
            .map_err(|_| format_err!("cfb: invalid key or iv length"))?
            .encrypt($data)
    };
}

impl SymmetricKeyAlgorithm {
    /// The size of a single block in bytes.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Idea
            | SymmetricKeyAlgorithm::TripleDes
            | SymmetricKeyAlgorithm::Cast5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::Aes128
            | SymmetricKeyAlgorithm::Aes192
            | SymmetricKeyAlgorithm::Aes256
            | SymmetricKeyAlgorithm::Twofish => 16,
            _ => 0,
        }
    }

    /// The key size in bytes.
    pub fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Idea
            | SymmetricKeyAlgorithm::Cast5
            | SymmetricKeyAlgorithm::Blowfish
            | SymmetricKeyAlgorithm::Aes128 => 16,
            SymmetricKeyAlgorithm::TripleDes | SymmetricKeyAlgorithm::Aes192 => 24,
            SymmetricKeyAlgorithm::Aes256 | SymmetricKeyAlgorithm::Twofish => 32,
            _ => 0,
        }
    }

    /// Decrypt `data` in place, regular CFB with the given IV.
    pub fn decrypt_with_iv(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::Idea => cfb_decrypt!(Idea, key, iv, data),
            SymmetricKeyAlgorithm::TripleDes => cfb_decrypt!(TdesEde3, key, iv, data),
            SymmetricKeyAlgorithm::Cast5 => cfb_decrypt!(Cast5, key, iv, data),
            SymmetricKeyAlgorithm::Blowfish => cfb_decrypt!(Blowfish, key, iv, data),
            SymmetricKeyAlgorithm::Aes128 => cfb_decrypt!(Aes128, key, iv, data),
            SymmetricKeyAlgorithm::Aes192 => cfb_decrypt!(Aes192, key, iv, data),
            SymmetricKeyAlgorithm::Aes256 => cfb_decrypt!(Aes256, key, iv, data),
            SymmetricKeyAlgorithm::Twofish => cfb_decrypt!(Twofish, key, iv, data),
            _ => unsupported_err!("symmetric algorithm {:?}", self),
        }
        Ok(())
    }

    /// Encrypt `data` in place, regular CFB with the given IV.
    pub fn encrypt_with_iv(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::Idea => cfb_encrypt!(Idea, key, iv, data),
            SymmetricKeyAlgorithm::TripleDes => cfb_encrypt!(TdesEde3, key, iv, data),
            SymmetricKeyAlgorithm::Cast5 => cfb_encrypt!(Cast5, key, iv, data),
            SymmetricKeyAlgorithm::Blowfish => cfb_encrypt!(Blowfish, key, iv, data),
            SymmetricKeyAlgorithm::Aes128 => cfb_encrypt!(Aes128, key, iv, data),
            SymmetricKeyAlgorithm::Aes192 => cfb_encrypt!(Aes192, key, iv, data),
            SymmetricKeyAlgorithm::Aes256 => cfb_encrypt!(Aes256, key, iv, data),
            SymmetricKeyAlgorithm::Twofish => cfb_encrypt!(Twofish, key, iv, data),
            _ => unsupported_err!("symmetric algorithm {:?}", self),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(SymmetricKeyAlgorithm::Aes128.key_size(), 16);
        assert_eq!(SymmetricKeyAlgorithm::Aes128.block_size(), 16);
        assert_eq!(SymmetricKeyAlgorithm::TripleDes.key_size(), 24);
        assert_eq!(SymmetricKeyAlgorithm::TripleDes.block_size(), 8);
        assert_eq!(SymmetricKeyAlgorithm::Plaintext.key_size(), 0);
    }

    #[test]
    fn test_cfb_roundtrip() {
        let key = [0x2bu8; 16];
        let iv = [0x01u8; 16];
        let plain = b"not block aligned data".to_vec();

        let mut data = plain.clone();
        SymmetricKeyAlgorithm::Aes128
            .encrypt_with_iv(&key, &iv, &mut data)
            .unwrap();
        assert_ne!(data, plain);

        SymmetricKeyAlgorithm::Aes128
            .decrypt_with_iv(&key, &iv, &mut data)
            .unwrap();
        assert_eq!(data, plain);
    }

    #[test]
    fn test_cfb_bad_key_len() {
        let mut data = vec![0u8; 8];
        assert!(SymmetricKeyAlgorithm::Aes256
            .encrypt_with_iv(&[0u8; 16], &[0u8; 16], &mut data)
            .is_err());
    }
}
