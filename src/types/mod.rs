mod mpi;

use std::fmt;

use bitfield::bitfield;
use num_enum::{FromPrimitive, IntoPrimitive};
use zeroize::Zeroizing;

use crate::errors::{BadFormatSnafu, Result};

pub use self::mpi::Mpi;

/// Packet tags.
/// Ref: https://tools.ietf.org/html/rfc4880#section-4.3
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, Hash)]
#[repr(u8)]
pub enum Tag {
    Signature = 2,
    SecretKey = 5,
    PublicKey = 6,
    SecretSubkey = 7,
    Marker = 10,
    Trust = 12,
    UserId = 13,
    PublicSubkey = 14,
    UserAttribute = 17,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Tag {
    pub fn is_key(self) -> bool {
        matches!(
            self,
            Tag::PublicKey | Tag::SecretKey | Tag::PublicSubkey | Tag::SecretSubkey
        )
    }

    pub fn is_primary_key(self) -> bool {
        matches!(self, Tag::PublicKey | Tag::SecretKey)
    }

    pub fn is_subkey(self) -> bool {
        matches!(self, Tag::PublicSubkey | Tag::SecretSubkey)
    }

    pub fn is_secret_key(self) -> bool {
        matches!(self, Tag::SecretKey | Tag::SecretSubkey)
    }
}

/// Available compression algorithms.
/// Ref: https://tools.ietf.org/html/rfc4880#section-9.3
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum CompressionAlgorithm {
    Uncompressed = 0,
    Zip = 1,
    Zlib = 2,
    Bzip2 = 3,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        Self::Uncompressed
    }
}

/// Key packet versions.
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum KeyVersion {
    V2 = 2,
    V3 = 3,
    V4 = 4,
    V5 = 5,

    #[num_enum(catch_all)]
    Other(u8),
}

/// An 8 byte key identifier, the low 64 bits of the fingerprint for v4 keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; 8]);

impl KeyId {
    pub fn from_slice(input: &[u8]) -> Result<KeyId> {
        snafu::ensure!(
            input.len() == 8,
            BadFormatSnafu {
                message: format!("invalid key id length {}", input.len()),
            }
        );
        let mut raw = [0u8; 8];
        raw.copy_from_slice(input);
        Ok(KeyId(raw))
    }
}

impl From<[u8; 8]> for KeyId {
    fn from(raw: [u8; 8]) -> Self {
        KeyId(raw)
    }
}

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(self.0))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0).to_uppercase())
    }
}

/// Hash over the public key packet body: MD5 (16 bytes) for v3 keys,
/// SHA1 (20 bytes) for v4.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn new(raw: Vec<u8>) -> Self {
        Fingerprint(raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(&self.0))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0).to_uppercase())
    }
}

/// The library-local 20 byte key handle, a SHA1 over the canonical public
/// key material. Stable across public/secret renditions of the same key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyGrip([u8; 20]);

impl KeyGrip {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 20]> for KeyGrip {
    fn from(raw: [u8; 20]) -> Self {
        KeyGrip(raw)
    }
}

impl fmt::Debug for KeyGrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyGrip({})", hex::encode(self.0))
    }
}

impl fmt::Display for KeyGrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0).to_uppercase())
    }
}

bitfield! {
    #[derive(Default, PartialEq, Eq, Copy, Clone)]
    pub struct KeyFlags(u8);
    impl Debug;

    pub certify, set_certify: 0;
    pub sign, set_sign: 1;
    pub encrypt_comms, set_encrypt_comms: 2;
    pub encrypt_storage, set_encrypt_storage: 3;
    pub shared, set_shared: 4;
    pub authentication, set_authentication: 5;
    pub group, set_group: 7;
}

impl KeyFlags {
    pub fn from_bits(bits: u8) -> Self {
        KeyFlags(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn encrypt(&self) -> bool {
        self.encrypt_comms() || self.encrypt_storage()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Any of the `other` bits set here as well?
    pub fn intersects(&self, other: KeyFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl<'a> From<&'a [u8]> for KeyFlags {
    fn from(other: &'a [u8]) -> Self {
        if other.is_empty() {
            Default::default()
        } else {
            KeyFlags(other[0])
        }
    }
}

/// On-disk format the key was loaded from, or should be written in.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum KeyStoreFormat {
    #[default]
    Gpg,
    Kbx,
    G10,
}

/// A passphrase, held in memory that is wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Zeroizing<Vec<u8>>);

impl Password {
    pub fn empty() -> Self {
        Password(Zeroizing::new(Vec::new()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Password {
    fn from(pw: &str) -> Self {
        Password(Zeroizing::new(pw.as_bytes().to_vec()))
    }
}

impl From<String> for Password {
    fn from(pw: String) -> Self {
        Password(Zeroizing::new(pw.into_bytes()))
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password([..])")
    }
}

/// The wire bytes of a single packet, header included.
///
/// A curated key keeps the raw packets it was built from; they are the
/// authoritative on-disk form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub tag: Tag,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_keyflags() {
        let flags: KeyFlags = Default::default();
        assert_eq!(flags.bits(), 0x00);

        let mut flags = KeyFlags::default();
        flags.set_certify(true);
        assert!(flags.certify());
        assert_eq!(flags.bits(), 0x01);

        let mut flags = KeyFlags::default();
        flags.set_sign(true);
        assert_eq!(flags.bits(), 0x02);

        let mut flags = KeyFlags::default();
        flags.set_encrypt_comms(true);
        flags.set_encrypt_storage(true);
        assert!(flags.encrypt());
        assert_eq!(flags.bits(), 0x0C);

        assert!(KeyFlags::from_bits(0x2F).intersects(KeyFlags::from_bits(0x02)));
        assert!(!KeyFlags::from_bits(0x0C).intersects(KeyFlags::from_bits(0x02)));
    }

    #[test]
    fn test_tag_predicates() {
        assert!(Tag::PublicKey.is_primary_key());
        assert!(Tag::SecretSubkey.is_subkey());
        assert!(Tag::SecretSubkey.is_secret_key());
        assert!(!Tag::Signature.is_key());
        assert_eq!(Tag::from(99u8), Tag::Other(99));
    }
}
