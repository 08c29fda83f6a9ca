use std::fmt;
use std::io;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use chrono::{DateTime, Duration, TimeZone, Utc};
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use smallvec::SmallVec;

use crate::crypto::ecc_curve::EccCurve;
use crate::crypto::hash::{HashAlgorithm, Hasher};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{eddsa, rsa};
use crate::errors::{BadFormatSnafu, Result};
use crate::packet::header::PacketHeader;
use crate::packet::key::{KeyPacket, PublicParams};
use crate::packet::user_id::UserIdPacket;
use crate::parsing::ByteReader;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, Fingerprint, KeyId, KeyVersion, Mpi, Tag};

#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureVersion {
    V2 = 2,
    V3 = 3,
    V4 = 4,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for SignatureVersion {
    fn default() -> Self {
        Self::V4
    }
}

/// Available signature types.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.2.1
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    /// Signature of a binary document.
    Binary = 0x00,
    /// Signature of a canonical text document.
    Text = 0x01,
    /// Standalone signature, over its own subpacket contents.
    Standalone = 0x02,
    /// Generic certification of a User ID and Public-Key packet.
    CertGeneric = 0x10,
    /// Persona certification: no verification of the identity claim.
    CertPersona = 0x11,
    /// Casual certification: some casual verification of the claim.
    CertCasual = 0x12,
    /// Positive certification: substantial verification of the claim.
    CertPositive = 0x13,
    /// Subkey Binding Signature, by the primary over (primary, subkey).
    /// A binding for a signing-capable subkey must carry an embedded 0x19
    /// signature made by the subkey.
    SubkeyBinding = 0x18,
    /// Primary Key Binding Signature, by the subkey over the same data.
    KeyBinding = 0x19,
    /// Signature directly on a key.
    Key = 0x1F,
    /// Key revocation signature, on the key being revoked.
    KeyRevocation = 0x20,
    /// Subkey revocation signature.
    SubkeyRevocation = 0x28,
    /// Certification revocation signature.
    CertRevocation = 0x30,
    /// Timestamp signature.
    Timestamp = 0x40,
    /// Third-Party Confirmation signature.
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

impl SignatureType {
    pub fn is_certification(self) -> bool {
        matches!(
            self,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
        )
    }
}

/// Codes for revocation reasons.
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RevocationCode {
    /// No reason specified (key revocations or cert revocations)
    NoReason = 0,
    /// Key is superseded (key revocations)
    KeySuperseded = 1,
    /// Key material has been compromised (key revocations)
    KeyCompromised = 2,
    /// Key is retired and no longer used (key revocations)
    KeyRetired = 3,
    /// User ID information is no longer valid (cert revocations)
    CertUserIdInvalid = 32,

    #[num_enum(catch_all)]
    Other(u8),
}

impl RevocationCode {
    /// The canonical description, filled in when a revocation carries no
    /// textual reason. Unknown codes map to the "no reason" text.
    pub fn description(self) -> &'static str {
        match self {
            RevocationCode::KeySuperseded => "Key is superseded",
            RevocationCode::KeyCompromised => "Key material has been compromised",
            RevocationCode::KeyRetired => "Key is retired and no longer used",
            RevocationCode::CertUserIdInvalid => "User ID information is no longer valid",
            _ => "No reason specified",
        }
    }
}

/// Available signature subpacket types.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SubpacketType {
    SignatureCreationTime,
    SignatureExpirationTime,
    ExportableCertification,
    TrustSignature,
    Revocable,
    KeyExpirationTime,
    PreferredSymmetricAlgorithms,
    Issuer,
    PreferredHashAlgorithms,
    PreferredCompressionAlgorithms,
    KeyServerPreferences,
    PreferredKeyServer,
    PrimaryUserId,
    KeyFlags,
    RevocationReason,
    EmbeddedSignature,
    IssuerFingerprint,
    Other(u8),
}

impl SubpacketType {
    pub fn as_u8(&self, is_critical: bool) -> u8 {
        let raw: u8 = match self {
            SubpacketType::SignatureCreationTime => 2,
            SubpacketType::SignatureExpirationTime => 3,
            SubpacketType::ExportableCertification => 4,
            SubpacketType::TrustSignature => 5,
            SubpacketType::Revocable => 7,
            SubpacketType::KeyExpirationTime => 9,
            SubpacketType::PreferredSymmetricAlgorithms => 11,
            SubpacketType::Issuer => 16,
            SubpacketType::PreferredHashAlgorithms => 21,
            SubpacketType::PreferredCompressionAlgorithms => 22,
            SubpacketType::KeyServerPreferences => 23,
            SubpacketType::PreferredKeyServer => 24,
            SubpacketType::PrimaryUserId => 25,
            SubpacketType::KeyFlags => 27,
            SubpacketType::RevocationReason => 29,
            SubpacketType::EmbeddedSignature => 32,
            SubpacketType::IssuerFingerprint => 33,
            SubpacketType::Other(n) => *n,
        };

        if is_critical {
            raw | 0b1000_0000
        } else {
            raw
        }
    }

    #[inline]
    pub fn from_u8(n: u8) -> (Self, bool) {
        let is_critical = (n >> 7) == 1;
        let n = n & 0b0111_1111;

        let m = match n {
            2 => SubpacketType::SignatureCreationTime,
            3 => SubpacketType::SignatureExpirationTime,
            4 => SubpacketType::ExportableCertification,
            5 => SubpacketType::TrustSignature,
            7 => SubpacketType::Revocable,
            9 => SubpacketType::KeyExpirationTime,
            11 => SubpacketType::PreferredSymmetricAlgorithms,
            16 => SubpacketType::Issuer,
            21 => SubpacketType::PreferredHashAlgorithms,
            22 => SubpacketType::PreferredCompressionAlgorithms,
            23 => SubpacketType::KeyServerPreferences,
            24 => SubpacketType::PreferredKeyServer,
            25 => SubpacketType::PrimaryUserId,
            27 => SubpacketType::KeyFlags,
            29 => SubpacketType::RevocationReason,
            32 => SubpacketType::EmbeddedSignature,
            33 => SubpacketType::IssuerFingerprint,
            _ => SubpacketType::Other(n),
        };

        (m, is_critical)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
}

impl Subpacket {
    /// Construct a new regular subpacket.
    pub const fn regular(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: false,
            data,
        }
    }

    pub fn typ(&self) -> SubpacketType {
        self.data.typ()
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// Seconds after creation at which the signature expires; 0 never.
    SignatureExpirationTime(u32),
    /// Seconds after key creation at which the key expires; 0 never.
    KeyExpirationTime(u32),
    /// The OpenPGP Key ID of the key issuing the signature.
    Issuer(KeyId),
    /// Symmetric algorithms the key holder prefers to use.
    PreferredSymmetricAlgorithms(SmallVec<[SymmetricKeyAlgorithm; 8]>),
    /// Hash algorithms the key holder prefers to use.
    PreferredHashAlgorithms(SmallVec<[HashAlgorithm; 8]>),
    /// Compression algorithms the key holder prefers to use.
    PreferredCompressionAlgorithms(SmallVec<[CompressionAlgorithm; 8]>),
    KeyServerPreferences(SmallVec<[u8; 4]>),
    PreferredKeyServer(Vec<u8>),
    IsPrimary(bool),
    KeyFlags(SmallVec<[u8; 1]>),
    /// Reason code plus human readable text, raw bytes as found on the wire.
    RevocationReason(RevocationCode, Vec<u8>),
    TrustSignature(u8, u8),
    Revocable(bool),
    ExportableCertification(bool),
    EmbeddedSignature(Box<Signature>),
    IssuerFingerprint(KeyVersion, SmallVec<[u8; 20]>),
    Other(u8, Vec<u8>),
}

impl SubpacketData {
    pub fn typ(&self) -> SubpacketType {
        match self {
            SubpacketData::SignatureCreationTime(_) => SubpacketType::SignatureCreationTime,
            SubpacketData::SignatureExpirationTime(_) => SubpacketType::SignatureExpirationTime,
            SubpacketData::KeyExpirationTime(_) => SubpacketType::KeyExpirationTime,
            SubpacketData::Issuer(_) => SubpacketType::Issuer,
            SubpacketData::PreferredSymmetricAlgorithms(_) => {
                SubpacketType::PreferredSymmetricAlgorithms
            }
            SubpacketData::PreferredHashAlgorithms(_) => SubpacketType::PreferredHashAlgorithms,
            SubpacketData::PreferredCompressionAlgorithms(_) => {
                SubpacketType::PreferredCompressionAlgorithms
            }
            SubpacketData::KeyServerPreferences(_) => SubpacketType::KeyServerPreferences,
            SubpacketData::PreferredKeyServer(_) => SubpacketType::PreferredKeyServer,
            SubpacketData::IsPrimary(_) => SubpacketType::PrimaryUserId,
            SubpacketData::KeyFlags(_) => SubpacketType::KeyFlags,
            SubpacketData::RevocationReason(_, _) => SubpacketType::RevocationReason,
            SubpacketData::TrustSignature(_, _) => SubpacketType::TrustSignature,
            SubpacketData::Revocable(_) => SubpacketType::Revocable,
            SubpacketData::ExportableCertification(_) => SubpacketType::ExportableCertification,
            SubpacketData::EmbeddedSignature(_) => SubpacketType::EmbeddedSignature,
            SubpacketData::IssuerFingerprint(_, _) => SubpacketType::IssuerFingerprint,
            SubpacketData::Other(n, _) => SubpacketType::Other(*n),
        }
    }

    fn body_len(&self) -> usize {
        match self {
            SubpacketData::SignatureCreationTime(_)
            | SubpacketData::SignatureExpirationTime(_)
            | SubpacketData::KeyExpirationTime(_) => 4,
            SubpacketData::Issuer(_) => 8,
            SubpacketData::PreferredSymmetricAlgorithms(v) => v.len(),
            SubpacketData::PreferredHashAlgorithms(v) => v.len(),
            SubpacketData::PreferredCompressionAlgorithms(v) => v.len(),
            SubpacketData::KeyServerPreferences(v) => v.len(),
            SubpacketData::PreferredKeyServer(v) => v.len(),
            SubpacketData::IsPrimary(_)
            | SubpacketData::Revocable(_)
            | SubpacketData::ExportableCertification(_) => 1,
            SubpacketData::KeyFlags(v) => v.len(),
            SubpacketData::RevocationReason(_, text) => 1 + text.len(),
            SubpacketData::TrustSignature(_, _) => 2,
            SubpacketData::EmbeddedSignature(sig) => sig.write_len(),
            SubpacketData::IssuerFingerprint(_, fp) => 1 + fp.len(),
            SubpacketData::Other(_, data) => data.len(),
        }
    }

    fn body_to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SubpacketData::SignatureCreationTime(t) => {
                writer.write_u32::<BigEndian>(t.timestamp() as u32)?;
            }
            SubpacketData::SignatureExpirationTime(d) | SubpacketData::KeyExpirationTime(d) => {
                writer.write_u32::<BigEndian>(*d)?;
            }
            SubpacketData::Issuer(id) => writer.write_all(id.as_ref())?,
            SubpacketData::PreferredSymmetricAlgorithms(v) => {
                for alg in v {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::PreferredHashAlgorithms(v) => {
                for alg in v {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::PreferredCompressionAlgorithms(v) => {
                for alg in v {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::KeyServerPreferences(v) => writer.write_all(v)?,
            SubpacketData::PreferredKeyServer(v) => writer.write_all(v)?,
            SubpacketData::IsPrimary(v)
            | SubpacketData::Revocable(v)
            | SubpacketData::ExportableCertification(v) => {
                writer.write_u8(u8::from(*v))?;
            }
            SubpacketData::KeyFlags(v) => writer.write_all(v)?,
            SubpacketData::RevocationReason(code, text) => {
                writer.write_u8((*code).into())?;
                writer.write_all(text)?;
            }
            SubpacketData::TrustSignature(depth, amount) => {
                writer.write_all(&[*depth, *amount])?;
            }
            SubpacketData::EmbeddedSignature(sig) => sig.to_writer(writer)?,
            SubpacketData::IssuerFingerprint(version, fp) => {
                writer.write_u8((*version).into())?;
                writer.write_all(fp)?;
            }
            SubpacketData::Other(_, data) => writer.write_all(data)?,
        }
        Ok(())
    }
}

fn read_subpacket_len(i: &mut ByteReader<'_>) -> Result<usize> {
    let o1 = i.read_u8()?;
    Ok(match o1 {
        0..=191 => usize::from(o1),
        192..=254 => (usize::from(o1) - 192) * 256 + usize::from(i.read_u8()?) + 192,
        255 => i.read_be_u32()? as usize,
    })
}

fn write_subpacket_len<W: io::Write>(len: usize, writer: &mut W) -> Result<()> {
    match len {
        0..=191 => writer.write_u8(len as u8)?,
        192..=16319 => {
            let adjusted = len - 192;
            writer.write_u8((adjusted / 256 + 192) as u8)?;
            writer.write_u8((adjusted % 256) as u8)?;
        }
        _ => {
            writer.write_u8(255)?;
            writer.write_u32::<BigEndian>(len as u32)?;
        }
    }
    Ok(())
}

fn subpacket_len_len(len: usize) -> usize {
    match len {
        0..=191 => 1,
        192..=16319 => 2,
        _ => 5,
    }
}

fn read_subpacket_area(i: &mut ByteReader<'_>) -> Result<Vec<Subpacket>> {
    let mut packets = Vec::new();
    while !i.is_empty() {
        let len = read_subpacket_len(i)?;
        snafu::ensure!(
            len > 0,
            BadFormatSnafu {
                message: "zero length signature subpacket".to_string(),
            }
        );
        let body = i.take(len)?;
        let mut body = ByteReader::new(body);
        let (typ, is_critical) = SubpacketType::from_u8(body.read_u8()?);

        let data = match typ {
            SubpacketType::SignatureCreationTime => {
                let ts = body.read_be_u32()?;
                let t = Utc
                    .timestamp_opt(i64::from(ts), 0)
                    .single()
                    .ok_or_else(|| format_err!("invalid signature creation time {}", ts))?;
                SubpacketData::SignatureCreationTime(t)
            }
            SubpacketType::SignatureExpirationTime => {
                SubpacketData::SignatureExpirationTime(body.read_be_u32()?)
            }
            SubpacketType::KeyExpirationTime => {
                SubpacketData::KeyExpirationTime(body.read_be_u32()?)
            }
            SubpacketType::Issuer => SubpacketData::Issuer(KeyId::from_slice(body.take(8)?)?),
            SubpacketType::PreferredSymmetricAlgorithms => {
                SubpacketData::PreferredSymmetricAlgorithms(
                    body.rest().iter().map(|v| (*v).into()).collect(),
                )
            }
            SubpacketType::PreferredHashAlgorithms => SubpacketData::PreferredHashAlgorithms(
                body.rest().iter().map(|v| (*v).into()).collect(),
            ),
            SubpacketType::PreferredCompressionAlgorithms => {
                SubpacketData::PreferredCompressionAlgorithms(
                    body.rest().iter().map(|v| (*v).into()).collect(),
                )
            }
            SubpacketType::KeyServerPreferences => {
                SubpacketData::KeyServerPreferences(SmallVec::from_slice(body.rest()))
            }
            SubpacketType::PreferredKeyServer => {
                SubpacketData::PreferredKeyServer(body.rest().to_vec())
            }
            SubpacketType::PrimaryUserId => SubpacketData::IsPrimary(body.read_u8()? != 0),
            SubpacketType::KeyFlags => SubpacketData::KeyFlags(SmallVec::from_slice(body.rest())),
            SubpacketType::RevocationReason => {
                let code = RevocationCode::from(body.read_u8()?);
                SubpacketData::RevocationReason(code, body.rest().to_vec())
            }
            SubpacketType::TrustSignature => {
                SubpacketData::TrustSignature(body.read_u8()?, body.read_u8()?)
            }
            SubpacketType::Revocable => SubpacketData::Revocable(body.read_u8()? != 0),
            SubpacketType::ExportableCertification => {
                SubpacketData::ExportableCertification(body.read_u8()? != 0)
            }
            SubpacketType::EmbeddedSignature => {
                let sig = Signature::try_from_reader(
                    PacketHeader::new(Tag::Signature, body.remaining()),
                    body.rest(),
                )?;
                SubpacketData::EmbeddedSignature(Box::new(sig))
            }
            SubpacketType::IssuerFingerprint => {
                let version = KeyVersion::from(body.read_u8()?);
                SubpacketData::IssuerFingerprint(version, SmallVec::from_slice(body.rest()))
            }
            SubpacketType::Other(n) => SubpacketData::Other(n, body.rest().to_vec()),
        };

        packets.push(Subpacket { is_critical, data });
    }

    Ok(packets)
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let body_len = 1 + self.data.body_len();
        write_subpacket_len(body_len, writer)?;
        writer.write_u8(self.typ().as_u8(self.is_critical))?;
        self.data.body_to_writer(writer)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        let body_len = 1 + self.data.body_len();
        subpacket_len_len(body_len) + body_len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureVersionSpecific {
    V3 {
        version: SignatureVersion,
        created: DateTime<Utc>,
        issuer: KeyId,
    },
    V4,
}

/// The hashed portion of a signature packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureConfig {
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,

    pub hashed_subpackets: Vec<Subpacket>,
    pub unhashed_subpackets: Vec<Subpacket>,

    pub version_specific: SignatureVersionSpecific,
}

impl SignatureConfig {
    pub fn v4(typ: SignatureType, pub_alg: PublicKeyAlgorithm, hash_alg: HashAlgorithm) -> Self {
        SignatureConfig {
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets: Vec::new(),
            unhashed_subpackets: Vec::new(),
            version_specific: SignatureVersionSpecific::V4,
        }
    }

    pub fn version(&self) -> SignatureVersion {
        match &self.version_specific {
            SignatureVersionSpecific::V3 { version, .. } => *version,
            SignatureVersionSpecific::V4 => SignatureVersion::V4,
        }
    }

    /// Hash the part of the signature packet that is covered by the digest.
    /// Returns the number of octets hashed, for the trailer.
    pub fn hash_signature_data(&self, hasher: &mut dyn Hasher) -> Result<usize> {
        match &self.version_specific {
            SignatureVersionSpecific::V3 { created, .. } => {
                let mut buf = [0u8; 5];
                buf[0] = self.typ.into();
                BigEndian::write_u32(&mut buf[1..], created.timestamp() as u32);
                hasher.update(&buf);

                // no trailer
                Ok(0)
            }
            SignatureVersionSpecific::V4 => {
                let mut res = vec![
                    self.version().into(),
                    self.typ.into(),
                    self.pub_alg.into(),
                    self.hash_alg.into(),
                ];

                let mut hashed_subpackets = Vec::new();
                for packet in &self.hashed_subpackets {
                    packet.to_writer(&mut hashed_subpackets)?;
                }

                res.extend((hashed_subpackets.len() as u16).to_be_bytes());
                res.extend(hashed_subpackets);

                hasher.update(&res);

                Ok(res.len())
            }
        }
    }

    /// The v4 hash trailer: version, 0xFF and the hashed octet count.
    pub fn trailer(&self, len: usize) -> Vec<u8> {
        match self.version_specific {
            SignatureVersionSpecific::V3 { .. } => Vec::new(),
            SignatureVersionSpecific::V4 => {
                let mut trailer = vec![self.version().into(), 0xFF, 0, 0, 0, 0];
                BigEndian::write_u32(&mut trailer[2..], len as u32);
                trailer
            }
        }
    }

    fn hashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets.iter()
    }

    fn subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets
            .iter()
            .chain(self.unhashed_subpackets.iter())
    }
}

/// Signature packet.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.2
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    packet_header: PacketHeader,
    pub config: SignatureConfig,
    pub signed_hash_value: [u8; 2],
    pub signature: Vec<Mpi>,
}

impl Signature {
    pub fn try_from_reader(packet_header: PacketHeader, body: &[u8]) -> Result<Self> {
        let mut i = ByteReader::new(body);
        let version = SignatureVersion::from(i.read_u8()?);

        let config = match version {
            SignatureVersion::V2 | SignatureVersion::V3 => {
                let hashed_len = i.read_u8()?;
                snafu::ensure!(
                    hashed_len == 5,
                    BadFormatSnafu {
                        message: format!("invalid v3 signature hashed length {hashed_len}"),
                    }
                );
                let typ = SignatureType::from(i.read_u8()?);
                let ts = i.read_be_u32()?;
                let created = Utc
                    .timestamp_opt(i64::from(ts), 0)
                    .single()
                    .ok_or_else(|| format_err!("invalid signature creation time {}", ts))?;
                let issuer = KeyId::from_slice(i.take(8)?)?;
                let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
                let hash_alg = HashAlgorithm::from(i.read_u8()?);

                SignatureConfig {
                    typ,
                    pub_alg,
                    hash_alg,
                    hashed_subpackets: Vec::new(),
                    unhashed_subpackets: Vec::new(),
                    version_specific: SignatureVersionSpecific::V3 {
                        version,
                        created,
                        issuer,
                    },
                }
            }
            SignatureVersion::V4 => {
                let typ = SignatureType::from(i.read_u8()?);
                let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
                let hash_alg = HashAlgorithm::from(i.read_u8()?);

                let hashed_len = usize::from(i.read_be_u16()?);
                let hashed_subpackets =
                    read_subpacket_area(&mut ByteReader::new(i.take(hashed_len)?))?;

                let unhashed_len = usize::from(i.read_be_u16()?);
                let unhashed_subpackets =
                    read_subpacket_area(&mut ByteReader::new(i.take(unhashed_len)?))?;

                SignatureConfig {
                    typ,
                    pub_alg,
                    hash_alg,
                    hashed_subpackets,
                    unhashed_subpackets,
                    version_specific: SignatureVersionSpecific::V4,
                }
            }
            v => {
                return BadFormatSnafu {
                    message: format!("unsupported signature version {:?}", v),
                }
                .fail();
            }
        };

        let lead = i.take(2)?;
        let signed_hash_value = [lead[0], lead[1]];

        let mut signature = Vec::new();
        while !i.is_empty() {
            signature.push(Mpi::try_from_reader(&mut i)?);
        }

        Ok(Signature {
            packet_header,
            config,
            signed_hash_value,
            signature,
        })
    }

    pub fn from_config(
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: Vec<Mpi>,
    ) -> Self {
        let mut sig = Signature {
            packet_header: PacketHeader::new(Tag::Signature, 0),
            config,
            signed_hash_value,
            signature,
        };
        sig.packet_header = PacketHeader::new(Tag::Signature, sig.write_len());
        sig
    }

    pub fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }

    /// Re-frame after the unhashed area changed (embedded signatures are
    /// added after the signature itself is calculated).
    pub fn refresh_header(&mut self) {
        self.packet_header = PacketHeader::new(Tag::Signature, self.write_len());
    }

    /// Returns what kind of signature this is.
    pub fn typ(&self) -> SignatureType {
        self.config.typ
    }

    /// Packet-byte equality, the identity used when merging signature lists.
    pub fn pkt_eq(&self, other: &Signature) -> bool {
        match (self.to_bytes(), other.to_bytes()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.config.subpackets()
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        if let SignatureVersionSpecific::V3 { created, .. } = self.config.version_specific {
            return Some(created);
        }
        self.config
            .hashed_subpackets()
            .find_map(|p| match p.data {
                SubpacketData::SignatureCreationTime(d) => Some(d),
                _ => None,
            })
    }

    pub fn issuer(&self) -> Option<KeyId> {
        if let SignatureVersionSpecific::V3 { issuer, .. } = self.config.version_specific {
            return Some(issuer);
        }
        self.subpackets().find_map(|p| match p.data {
            SubpacketData::Issuer(id) => Some(id),
            _ => None,
        })
    }

    pub fn issuer_fingerprint(&self) -> Option<Fingerprint> {
        self.subpackets().find_map(|p| match &p.data {
            SubpacketData::IssuerFingerprint(_, fp) => Some(Fingerprint::new(fp.to_vec())),
            _ => None,
        })
    }

    /// Key expiration in seconds after key creation, if any.
    pub fn key_expiration(&self) -> Option<u32> {
        self.subpackets().find_map(|p| match p.data {
            SubpacketData::KeyExpirationTime(d) => Some(d),
            _ => None,
        })
    }

    /// Signature expiration in seconds after signature creation, if any.
    pub fn expiration(&self) -> Option<u32> {
        self.subpackets().find_map(|p| match p.data {
            SubpacketData::SignatureExpirationTime(d) => Some(d),
            _ => None,
        })
    }

    /// Whether the signature itself has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let Some(expiration) = self.expiration() else {
            return false;
        };
        if expiration == 0 {
            return false;
        }
        match self.created() {
            Some(created) => created + Duration::seconds(i64::from(expiration)) < now,
            // an expiration without a creation time can not be honored
            None => true,
        }
    }

    /// The raw key flags octet, if the signature carries one.
    pub fn key_flags(&self) -> Option<u8> {
        self.subpackets().find_map(|p| match &p.data {
            SubpacketData::KeyFlags(flags) => Some(flags.first().copied().unwrap_or(0)),
            _ => None,
        })
    }

    pub fn preferred_symmetric_algs(&self) -> &[SymmetricKeyAlgorithm] {
        self.subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::PreferredSymmetricAlgorithms(d) => Some(&d[..]),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn preferred_hash_algs(&self) -> &[HashAlgorithm] {
        self.subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::PreferredHashAlgorithms(d) => Some(&d[..]),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn preferred_compression_algs(&self) -> &[CompressionAlgorithm] {
        self.subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::PreferredCompressionAlgorithms(d) => Some(&d[..]),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn key_server_prefs(&self) -> &[u8] {
        self.subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::KeyServerPreferences(d) => Some(&d[..]),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn preferred_key_server(&self) -> Option<String> {
        self.subpackets().find_map(|p| match &p.data {
            SubpacketData::PreferredKeyServer(d) => {
                Some(String::from_utf8_lossy(d).into_owned())
            }
            _ => None,
        })
    }

    pub fn is_primary(&self) -> bool {
        self.subpackets()
            .find_map(|p| match p.data {
                SubpacketData::IsPrimary(d) => Some(d),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn trust_signature(&self) -> Option<(u8, u8)> {
        self.subpackets().find_map(|p| match p.data {
            SubpacketData::TrustSignature(depth, value) => Some((depth, value)),
            _ => None,
        })
    }

    pub fn revocation_reason(&self) -> Option<(RevocationCode, &[u8])> {
        self.subpackets().find_map(|p| match &p.data {
            SubpacketData::RevocationReason(code, reason) => Some((*code, &reason[..])),
            _ => None,
        })
    }

    pub fn embedded_signature(&self) -> Option<&Signature> {
        self.subpackets().find_map(|p| match &p.data {
            SubpacketData::EmbeddedSignature(d) => Some(&**d),
            _ => None,
        })
    }

    /// Finish hashing and check the digest against the signature.
    fn finish_verify(&self, key: &KeyPacket, mut hasher: Box<dyn Hasher>) -> Result<()> {
        let len = self.config.hash_signature_data(&mut *hasher)?;
        hasher.update(&self.config.trailer(len));

        let hash = hasher.finish();
        ensure_eq!(
            &self.signed_hash_value,
            &hash[0..2],
            "signature: invalid signed hash value"
        );

        verify_signature_mpis(key, self.config.hash_alg, &hash, &self.signature)
    }

    fn check_issuer(&self, key: &KeyPacket) -> Result<()> {
        if let Some(issuer) = self.issuer() {
            let key_id = key.key_id()?;
            if key_id != issuer {
                bail!(
                    "validating signature with a non matching Key ID {:?} != {:?}",
                    key_id,
                    issuer
                );
            }
        }
        Ok(())
    }

    /// Verifies a certification over `(key, user id)`.
    pub fn verify_certification(&self, key: &KeyPacket, id: &UserIdPacket) -> Result<()> {
        debug!("verifying certification {:?} {:?}", key.key_id(), self.typ());
        self.check_issuer(key)?;

        let mut hasher = self.config.hash_alg.new_hasher()?;

        key.hash_for_signature(&mut |data| hasher.update(data))?;

        // the certified identity, length framed for v4 signatures
        {
            let packet_buf = id.to_bytes()?;

            if self.config.version() == SignatureVersion::V4 {
                let prefix = match id.tag() {
                    Tag::UserAttribute => 0xD1,
                    _ => 0xB4,
                };
                let mut prefix_buf = [prefix, 0u8, 0u8, 0u8, 0u8];
                BigEndian::write_u32(&mut prefix_buf[1..], packet_buf.len() as u32);
                hasher.update(&prefix_buf);
            }

            hasher.update(&packet_buf);
        }

        self.finish_verify(key, hasher)
    }

    /// Verifies a binding over `(signing key, bound key)`, in either
    /// direction.
    pub fn verify_binding(&self, signing_key: &KeyPacket, key: &KeyPacket) -> Result<()> {
        debug!(
            "verifying key binding: {:?} -> {:?}",
            signing_key.key_id(),
            key.key_id()
        );
        self.check_issuer(signing_key)?;

        let mut hasher = self.config.hash_alg.new_hasher()?;
        signing_key.hash_for_signature(&mut |data| hasher.update(data))?;
        key.hash_for_signature(&mut |data| hasher.update(data))?;

        self.finish_verify(signing_key, hasher)
    }

    /// Verifies a direct signature on a key, including revocations.
    pub fn verify_direct(&self, key: &KeyPacket) -> Result<()> {
        debug!("verifying direct key signature: {:?}", key.key_id());
        self.check_issuer(key)?;

        let mut hasher = self.config.hash_alg.new_hasher()?;
        key.hash_for_signature(&mut |data| hasher.update(data))?;

        self.finish_verify(key, hasher)
    }
}

/// Check a digest against signature MPIs with the key's public material.
pub fn verify_signature_mpis(
    key: &KeyPacket,
    hash: HashAlgorithm,
    digest: &[u8],
    sig: &[Mpi],
) -> Result<()> {
    match key.public_params() {
        PublicParams::Rsa { n, e } => {
            ensure!(sig.len() == 1, "rsa signature must be a single mpi");
            rsa::verify(n, e, hash, digest, &sig[0])
        }
        PublicParams::Ec { curve, p } if *curve == EccCurve::Ed25519 => {
            ensure!(sig.len() == 2, "eddsa signature must be two mpis");
            eddsa::verify(p, digest, &sig[0], &sig[1])
        }
        _ => unsupported_err!("signature verification for {:?}", key.algorithm()),
    }
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.config.version().into())?;

        match &self.config.version_specific {
            SignatureVersionSpecific::V3 {
                created, issuer, ..
            } => {
                writer.write_u8(5)?;
                writer.write_u8(self.config.typ.into())?;
                writer.write_u32::<BigEndian>(created.timestamp() as u32)?;
                writer.write_all(issuer.as_ref())?;
                writer.write_u8(self.config.pub_alg.into())?;
                writer.write_u8(self.config.hash_alg.into())?;
            }
            SignatureVersionSpecific::V4 => {
                writer.write_u8(self.config.typ.into())?;
                writer.write_u8(self.config.pub_alg.into())?;
                writer.write_u8(self.config.hash_alg.into())?;

                let hashed: usize = self
                    .config
                    .hashed_subpackets
                    .iter()
                    .map(Serialize::write_len)
                    .sum();
                writer.write_u16::<BigEndian>(hashed as u16)?;
                for packet in &self.config.hashed_subpackets {
                    packet.to_writer(writer)?;
                }

                let unhashed: usize = self
                    .config
                    .unhashed_subpackets
                    .iter()
                    .map(Serialize::write_len)
                    .sum();
                writer.write_u16::<BigEndian>(unhashed as u16)?;
                for packet in &self.config.unhashed_subpackets {
                    packet.to_writer(writer)?;
                }
            }
        }

        writer.write_all(&self.signed_hash_value)?;
        for mpi in &self.signature {
            mpi.to_writer(writer)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        let version_len = match self.config.version_specific {
            SignatureVersionSpecific::V3 { .. } => 1 + 1 + 1 + 4 + 8 + 1 + 1,
            SignatureVersionSpecific::V4 => {
                let hashed: usize = self
                    .config
                    .hashed_subpackets
                    .iter()
                    .map(Serialize::write_len)
                    .sum();
                let unhashed: usize = self
                    .config
                    .unhashed_subpackets
                    .iter()
                    .map(Serialize::write_len)
                    .sum();
                1 + 1 + 1 + 1 + 2 + hashed + 2 + unhashed
            }
        };
        version_len + 2 + self.signature.iter().map(Serialize::write_len).sum::<usize>()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("config", &self.config)
            .field("signed_hash_value", &hex::encode(self.signed_hash_value))
            .field(
                "signature",
                &self.signature.iter().map(hex::encode).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use smallvec::smallvec;

    use super::*;

    fn sample_sig() -> Signature {
        let mut config = SignatureConfig::v4(
            SignatureType::CertPositive,
            PublicKeyAlgorithm::Rsa,
            HashAlgorithm::Sha256,
        );
        config.hashed_subpackets = vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
            )),
            Subpacket::regular(SubpacketData::KeyExpirationTime(86400)),
            Subpacket::regular(SubpacketData::KeyFlags(smallvec![0x03])),
            Subpacket::regular(SubpacketData::PreferredSymmetricAlgorithms(smallvec![
                SymmetricKeyAlgorithm::Aes256,
                SymmetricKeyAlgorithm::Aes128,
            ])),
        ];
        config.unhashed_subpackets = vec![Subpacket::regular(SubpacketData::Issuer(
            KeyId::from([1, 2, 3, 4, 5, 6, 7, 8]),
        ))];

        Signature::from_config(config, [0xAB, 0xCD], vec![Mpi::from_slice(&[0x99; 64])])
    }

    #[test]
    fn test_signature_roundtrip() {
        let sig = sample_sig();
        let bytes = sig.to_bytes().unwrap();
        assert_eq!(bytes.len(), sig.write_len());

        let back =
            Signature::try_from_reader(PacketHeader::new(Tag::Signature, bytes.len()), &bytes)
                .unwrap();
        assert_eq!(sig, back);
        assert!(sig.pkt_eq(&back));

        assert_eq!(back.key_expiration(), Some(86400));
        assert_eq!(back.key_flags(), Some(0x03));
        assert_eq!(back.issuer(), Some(KeyId::from([1, 2, 3, 4, 5, 6, 7, 8])));
        assert_eq!(back.preferred_symmetric_algs().len(), 2);
    }

    #[test]
    fn test_unknown_subpacket_preserved() {
        let mut sig = sample_sig();
        sig.config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::Other(
                99,
                vec![0xDE, 0xAD],
            )));
        sig.refresh_header();

        let bytes = sig.to_bytes().unwrap();
        let back =
            Signature::try_from_reader(PacketHeader::new(Tag::Signature, bytes.len()), &bytes)
                .unwrap();
        assert_eq!(sig, back);
    }

    #[test]
    fn test_expiration() {
        let mut sig = sample_sig();
        assert!(!sig.is_expired(Utc::now()));

        sig.config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::SignatureExpirationTime(
                3600,
            )));
        assert!(sig.is_expired(Utc.timestamp_opt(1_500_000_000 + 3601, 0).unwrap()));
        assert!(!sig.is_expired(Utc.timestamp_opt(1_500_000_000 + 3599, 0).unwrap()));
    }

    #[test]
    fn test_revocation_description() {
        assert_eq!(
            RevocationCode::KeyCompromised.description(),
            "Key material has been compromised"
        );
        assert_eq!(
            RevocationCode::Other(77).description(),
            "No reason specified"
        );
    }

    #[test]
    fn test_critical_bit() {
        for (typ, raw) in [
            (SubpacketType::SignatureCreationTime, 2u8),
            (SubpacketType::IssuerFingerprint, 33),
            (SubpacketType::Other(95), 95),
        ] {
            assert_eq!(SubpacketType::from_u8(typ.as_u8(false)), (typ, false));
            assert_eq!(SubpacketType::from_u8(typ.as_u8(true)), (typ, true));
            assert_eq!(typ.as_u8(true), raw | 0x80);
        }
    }
}
