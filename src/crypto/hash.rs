use digest::Digest;
use md5::Md5;
use num_enum::{FromPrimitive, IntoPrimitive};
use ripemd::Ripemd160;
use sha1::Sha1;

use crate::errors::Result;

/// Available hash algorithms.
/// Ref: https://tools.ietf.org/html/rfc4880.html#section-9.4
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, Hash)]
#[repr(u8)]
pub enum HashAlgorithm {
    None = 0,
    Md5 = 1,
    Sha1 = 2,
    Ripemd160 = 3,

    Sha256 = 8,
    Sha384 = 9,
    Sha512 = 10,
    Sha224 = 11,
    Sha3_256 = 12,
    Sha3_512 = 14,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

/// Trait to work around the fact that the `Digest` trait from rustcrypto can
/// not be used as `Box<Digest>`.
pub trait Hasher {
    /// Update the hash with the given value.
    fn update(&mut self, _: &[u8]);
    /// Finalize the hash and return the result.
    fn finish(self: Box<Self>) -> Vec<u8>;
    /// Snapshot the hash state, so two signatures can share a message prefix.
    fn clone_boxed(&self) -> Box<dyn Hasher>;
}

macro_rules! derive_hasher {
    ($name:ident, $struct:path) => {
        #[derive(Clone, Default)]
        pub struct $name {
            inner: $struct,
        }

        impl Hasher for $name {
            fn update(&mut self, data: &[u8]) {
                self.inner.update(data);
            }

            fn finish(self: Box<Self>) -> Vec<u8> {
                self.inner.finalize().as_slice().to_vec()
            }

            fn clone_boxed(&self) -> Box<dyn Hasher> {
                Box::new(self.clone())
            }
        }
    };
}

derive_hasher!(Md5Hasher, Md5);
derive_hasher!(Sha1Hasher, Sha1);
derive_hasher!(Ripemd160Hasher, Ripemd160);
derive_hasher!(Sha2_256Hasher, sha2::Sha256);
derive_hasher!(Sha2_384Hasher, sha2::Sha384);
derive_hasher!(Sha2_512Hasher, sha2::Sha512);
derive_hasher!(Sha2_224Hasher, sha2::Sha224);
derive_hasher!(Sha3_256Hasher, sha3::Sha3_256);
derive_hasher!(Sha3_512Hasher, sha3::Sha3_512);

impl HashAlgorithm {
    /// Create a new hasher.
    pub fn new_hasher(self) -> Result<Box<dyn Hasher>> {
        match self {
            HashAlgorithm::Md5 => Ok(Box::<Md5Hasher>::default()),
            HashAlgorithm::Sha1 => Ok(Box::<Sha1Hasher>::default()),
            HashAlgorithm::Ripemd160 => Ok(Box::<Ripemd160Hasher>::default()),
            HashAlgorithm::Sha256 => Ok(Box::<Sha2_256Hasher>::default()),
            HashAlgorithm::Sha384 => Ok(Box::<Sha2_384Hasher>::default()),
            HashAlgorithm::Sha512 => Ok(Box::<Sha2_512Hasher>::default()),
            HashAlgorithm::Sha224 => Ok(Box::<Sha2_224Hasher>::default()),
            HashAlgorithm::Sha3_256 => Ok(Box::<Sha3_256Hasher>::default()),
            HashAlgorithm::Sha3_512 => Ok(Box::<Sha3_512Hasher>::default()),
            _ => unsupported_err!("hasher {:?}", self),
        }
    }

    /// Calculate the digest of the given input data.
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = self.new_hasher()?;
        hasher.update(data);
        Ok(hasher.finish())
    }

    /// Returns the expected digest size for the given algorithm.
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Md5 => Md5::output_size(),
            HashAlgorithm::Sha1 => Sha1::output_size(),
            HashAlgorithm::Ripemd160 => Ripemd160::output_size(),
            HashAlgorithm::Sha256 => sha2::Sha256::output_size(),
            HashAlgorithm::Sha384 => sha2::Sha384::output_size(),
            HashAlgorithm::Sha512 => sha2::Sha512::output_size(),
            HashAlgorithm::Sha224 => sha2::Sha224::output_size(),
            HashAlgorithm::Sha3_256 => sha3::Sha3_256::output_size(),
            HashAlgorithm::Sha3_512 => sha3::Sha3_512::output_size(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_digest_sizes() {
        assert_eq!(HashAlgorithm::Md5.digest_size(), 16);
        assert_eq!(HashAlgorithm::Sha1.digest_size(), 20);
        assert_eq!(HashAlgorithm::Sha256.digest_size(), 32);
        assert_eq!(HashAlgorithm::Sha512.digest_size(), 64);
        assert_eq!(HashAlgorithm::Other(99).digest_size(), 0);
    }

    #[test]
    fn test_hash_state_snapshot() {
        let mut h = HashAlgorithm::Sha1.new_hasher().unwrap();
        h.update(b"shared prefix");
        let snapshot = h.clone_boxed();

        h.update(b" and more");
        let full = h.finish();
        let prefix_only = snapshot.finish();

        assert_eq!(
            prefix_only,
            HashAlgorithm::Sha1.digest(b"shared prefix").unwrap()
        );
        assert_ne!(full, prefix_only);
    }
}
