use std::io;
use std::time::Instant;

use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;
use crate::parsing::ByteReader;
use crate::ser::Serialize;
use crate::types::Password;

const EXPBIAS: u32 = 6;
pub const SALT_SIZE: usize = 8;

/// How the secret key data is protected.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.5.3
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum S2kUsage {
    /// Cleartext secret data, sum16 checksum.
    None = 0,
    /// Encrypted, SHA1 integrity tail.
    EncryptedAndHashed = 254,
    /// Encrypted, sum16 checksum.
    Encrypted = 255,

    #[num_enum(catch_all)]
    Other(u8) = 1,
}

impl Default for S2kUsage {
    fn default() -> Self {
        Self::None
    }
}

/// Available String-To-Key specifiers.
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum StringToKeyType {
    Simple = 0,
    Salted = 1,
    Reserved = 2,
    IteratedAndSalted = 3,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for StringToKeyType {
    fn default() -> Self {
        Self::IteratedAndSalted
    }
}

fn has_salt(typ: StringToKeyType) -> bool {
    matches!(
        typ,
        StringToKeyType::Salted | StringToKeyType::IteratedAndSalted
    )
}

fn has_count(typ: StringToKeyType) -> bool {
    matches!(typ, StringToKeyType::IteratedAndSalted)
}

/// String-To-Key descriptor: converts a password into a symmetric key.
/// Ref: https://tools.ietf.org/html/rfc4880#section-3.7
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringToKey {
    typ: StringToKeyType,
    hash: HashAlgorithm,
    salt: Option<Vec<u8>>,
    count: Option<u8>,
}

impl StringToKey {
    pub fn new_iterated<R: CryptoRng + Rng>(rng: &mut R, hash: HashAlgorithm, count: u8) -> Self {
        let mut salt = vec![0u8; SALT_SIZE];
        rng.fill(&mut salt[..]);

        StringToKey {
            typ: StringToKeyType::IteratedAndSalted,
            hash,
            salt: Some(salt),
            count: Some(count),
        }
    }

    pub fn typ(&self) -> StringToKeyType {
        self.typ
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn set_hash(&mut self, hash: HashAlgorithm) {
        self.hash = hash;
    }

    pub fn salt(&self) -> Option<&[u8]> {
        self.salt.as_deref()
    }

    pub fn regenerate_salt<R: CryptoRng + Rng>(&mut self, rng: &mut R) {
        if has_salt(self.typ) {
            let mut salt = vec![0u8; SALT_SIZE];
            rng.fill(&mut salt[..]);
            self.salt = Some(salt);
        }
    }

    /// Converts the coded count into the octet count.
    /// Ref: https://tools.ietf.org/html/rfc4880#section-3.7.1.3
    pub fn count(&self) -> Option<usize> {
        self.count
            .map(|c| (((16u32 + u32::from(c & 15)) << (u32::from(c >> 4) + EXPBIAS)) as usize))
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        if has_count(self.typ) {
            self.count = Some(encode_iterations(iterations));
        }
    }

    pub fn try_from_reader(i: &mut ByteReader<'_>) -> Result<Self> {
        let typ = StringToKeyType::from(i.read_u8()?);
        let hash = HashAlgorithm::from(i.read_u8()?);
        let salt = if has_salt(typ) {
            Some(i.take(SALT_SIZE)?.to_vec())
        } else {
            None
        };
        let count = if has_count(typ) {
            Some(i.read_u8()?)
        } else {
            None
        };

        Ok(StringToKey {
            typ,
            hash,
            salt,
            count,
        })
    }

    /// Derive a key of `key_size` bytes from the password.
    pub fn derive_key(&self, password: &Password, key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        let digest_size = self.hash.digest_size();
        ensure!(digest_size > 0, "s2k with unusable hash {:?}", self.hash);
        let rounds = key_size.div_ceil(digest_size);

        let pw = password.as_bytes();
        let mut key = Zeroizing::new(Vec::with_capacity(key_size));

        for round in 0..rounds {
            let mut hasher = self.hash.new_hasher()?;

            // zero-octet preload, one more per round
            if round > 0 {
                hasher.update(&vec![0u8; round]);
            }

            match self.typ {
                StringToKeyType::Simple => {
                    hasher.update(pw);
                }
                StringToKeyType::Salted => {
                    let salt = self.salt.as_ref().ok_or_else(|| format_err!("missing salt"))?;
                    hasher.update(salt);
                    hasher.update(pw);
                }
                StringToKeyType::IteratedAndSalted => {
                    let salt = self.salt.as_ref().ok_or_else(|| format_err!("missing salt"))?;
                    let data_size = salt.len() + pw.len();
                    let mut count = self
                        .count()
                        .ok_or_else(|| format_err!("missing iteration count"))?;

                    // hash at least one full salt || password set
                    if count < data_size {
                        count = data_size;
                    }

                    while count > data_size {
                        hasher.update(salt);
                        hasher.update(pw);
                        count -= data_size;
                    }

                    if count < salt.len() {
                        hasher.update(&salt[..count]);
                    } else {
                        hasher.update(salt);
                        count -= salt.len();
                        hasher.update(&pw[..count]);
                    }
                }
                _ => unsupported_err!("s2k specifier {:?}", self.typ),
            }

            let digest = hasher.finish();
            let needed = key_size - key.len();
            key.extend_from_slice(&digest[..needed.min(digest.len())]);
        }

        Ok(key)
    }
}

impl Default for StringToKey {
    fn default() -> Self {
        StringToKey {
            typ: StringToKeyType::IteratedAndSalted,
            hash: HashAlgorithm::default(),
            salt: Some(vec![0u8; SALT_SIZE]),
            count: Some(encode_iterations(DEFAULT_ITERATIONS)),
        }
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[u8::from(self.typ), u8::from(self.hash)])?;

        if let Some(ref salt) = self.salt {
            writer.write_all(salt)?;
        }

        if let Some(count) = self.count {
            writer.write_all(&[count])?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.salt.as_ref().map_or(0, Vec::len) + usize::from(self.count.is_some())
    }
}

const DEFAULT_ITERATIONS: u32 = 65536;
const MAX_ITERATIONS: u32 = (16 + 15) << (15 + EXPBIAS);
const TUNE_MSEC: u128 = 10;

/// Decode a RFC 4880 coded iteration count.
pub fn decode_iterations(coded: u8) -> u32 {
    (16 + u32::from(coded & 15)) << (u32::from(coded >> 4) + EXPBIAS)
}

/// Encode an iteration count as the smallest coded count not below it.
pub fn encode_iterations(iterations: u32) -> u8 {
    for coded in 0..=u8::MAX {
        if decode_iterations(coded) >= iterations {
            return coded;
        }
    }
    u8::MAX
}

/// Round an iteration count up to the nearest encodable value.
pub fn round_iterations(iterations: u32) -> u32 {
    decode_iterations(encode_iterations(iterations))
}

/// Estimate how many S2K iterations take roughly `desired_msec` of wall clock
/// on this machine, by timing a short burst of hashing.
pub fn compute_iterations(hash: HashAlgorithm, desired_msec: u32) -> Result<u32> {
    let buf = [0u8; 8192];
    let mut hashed: u64 = 0;

    let start = Instant::now();
    let mut hasher = hash.new_hasher()?;
    while start.elapsed().as_millis() < TUNE_MSEC {
        hasher.update(&buf);
        hashed += buf.len() as u64;
    }
    let _ = hasher.finish();

    let elapsed = start.elapsed().as_millis().max(1) as u64;
    let per_msec = hashed / elapsed;
    let iterations = per_msec.saturating_mul(u64::from(desired_msec));

    Ok(round_iterations(
        iterations.clamp(u64::from(DEFAULT_ITERATIONS), u64::from(MAX_ITERATIONS)) as u32,
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_coded_count() {
        // lowest and highest representable values
        assert_eq!(decode_iterations(0), 1024);
        assert_eq!(decode_iterations(255), MAX_ITERATIONS);
        // 96 decodes to 65536, the usual default
        assert_eq!(decode_iterations(96), 65536);
        assert_eq!(encode_iterations(65536), 96);
        assert_eq!(round_iterations(65537), decode_iterations(97));

        for coded in 0..=u8::MAX {
            assert_eq!(encode_iterations(decode_iterations(coded)), coded);
        }
    }

    #[test]
    fn test_derive_key_iterated() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha1, 96);

        let k1 = s2k.derive_key(&"abc".into(), 16).unwrap();
        let k2 = s2k.derive_key(&"abc".into(), 16).unwrap();
        let k3 = s2k.derive_key(&"abd".into(), 16).unwrap();

        assert_eq!(k1.len(), 16);
        assert_eq!(&k1[..], &k2[..]);
        assert_ne!(&k1[..], &k3[..]);

        // keys longer than one digest come from the zero-preloaded rounds
        let k4 = s2k.derive_key(&"abc".into(), 32).unwrap();
        assert_eq!(k4.len(), 32);
        assert_eq!(&k4[..16], &k1[..]);
    }

    #[test]
    fn test_s2k_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha256, 192);

        let bytes = s2k.to_bytes().unwrap();
        assert_eq!(bytes.len(), s2k.write_len());

        let back = StringToKey::try_from_reader(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(s2k, back);
    }

    #[test]
    fn test_compute_iterations_bounds() {
        let iters = compute_iterations(HashAlgorithm::Sha256, 150).unwrap();
        assert!(iters >= DEFAULT_ITERATIONS);
        assert!(iters <= MAX_ITERATIONS);
        assert_eq!(iters, round_iterations(iters));
    }
}
