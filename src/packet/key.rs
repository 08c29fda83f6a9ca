use std::fmt;
use std::io;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use digest::Digest;
use log::debug;
use md5::Md5;
use sha1::Sha1;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::ecc_curve::EccCurve;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::s2k::{S2kUsage, StringToKey};
use crate::crypto::sym::{CipherMode, SymmetricKeyAlgorithm};
use crate::errors::{BadFormatSnafu, BadParametersSnafu, Result};
use crate::packet::header::PacketHeader;
use crate::parsing::ByteReader;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyGrip, KeyId, KeyVersion, Mpi, Tag};

/// Algorithm specific public key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicParams {
    Rsa {
        n: Mpi,
        e: Mpi,
    },
    Dsa {
        p: Mpi,
        q: Mpi,
        g: Mpi,
        y: Mpi,
    },
    Elgamal {
        p: Mpi,
        g: Mpi,
        y: Mpi,
    },
    /// ECDSA, EdDSA and SM2 share the curve-plus-point shape.
    Ec {
        curve: EccCurve,
        p: Mpi,
    },
    Ecdh {
        curve: EccCurve,
        p: Mpi,
        hash: HashAlgorithm,
        alg_sym: SymmetricKeyAlgorithm,
    },
    Unknown {
        data: Vec<u8>,
    },
}

impl PublicParams {
    fn try_from_reader(alg: PublicKeyAlgorithm, i: &mut ByteReader<'_>) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::Rsa
            | PublicKeyAlgorithm::RsaEncrypt
            | PublicKeyAlgorithm::RsaSign => Ok(PublicParams::Rsa {
                n: Mpi::try_from_reader(i)?,
                e: Mpi::try_from_reader(i)?,
            }),
            PublicKeyAlgorithm::Dsa => Ok(PublicParams::Dsa {
                p: Mpi::try_from_reader(i)?,
                q: Mpi::try_from_reader(i)?,
                g: Mpi::try_from_reader(i)?,
                y: Mpi::try_from_reader(i)?,
            }),
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncryptSign => {
                Ok(PublicParams::Elgamal {
                    p: Mpi::try_from_reader(i)?,
                    g: Mpi::try_from_reader(i)?,
                    y: Mpi::try_from_reader(i)?,
                })
            }
            PublicKeyAlgorithm::Ecdsa | PublicKeyAlgorithm::EdDsa | PublicKeyAlgorithm::Sm2 => {
                let curve = read_curve(i)?;
                let p = Mpi::try_from_reader(i)?;
                Ok(PublicParams::Ec { curve, p })
            }
            PublicKeyAlgorithm::Ecdh => {
                let curve = read_curve(i)?;
                let p = Mpi::try_from_reader(i)?;
                let kdf_len = i.read_u8()?;
                snafu::ensure!(
                    kdf_len == 3,
                    BadFormatSnafu {
                        message: format!("invalid ecdh kdf parameter length {kdf_len}"),
                    }
                );
                let _reserved = i.read_u8()?;
                let hash = HashAlgorithm::from(i.read_u8()?);
                let alg_sym = SymmetricKeyAlgorithm::from(i.read_u8()?);
                Ok(PublicParams::Ecdh {
                    curve,
                    p,
                    hash,
                    alg_sym,
                })
            }
            PublicKeyAlgorithm::Unknown(raw) => {
                debug!("unknown public key algorithm {}", raw);
                Ok(PublicParams::Unknown {
                    data: i.rest().to_vec(),
                })
            }
        }
    }
}

fn read_curve(i: &mut ByteReader<'_>) -> Result<EccCurve> {
    let oid_len = i.read_u8()?;
    snafu::ensure!(
        oid_len != 0 && oid_len != 0xFF,
        BadFormatSnafu {
            message: format!("reserved curve oid length {oid_len}"),
        }
    );
    let oid = i.take(usize::from(oid_len))?;
    Ok(EccCurve::from_oid(oid))
}

fn write_curve<W: io::Write>(curve: &EccCurve, writer: &mut W) -> Result<()> {
    let oid = curve.oid();
    writer.write_u8(oid.len() as u8)?;
    writer.write_all(oid)?;
    Ok(())
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::Rsa { n, e } => {
                n.to_writer(writer)?;
                e.to_writer(writer)?;
            }
            PublicParams::Dsa { p, q, g, y } => {
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::Elgamal { p, g, y } => {
                p.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::Ec { curve, p } => {
                write_curve(curve, writer)?;
                p.to_writer(writer)?;
            }
            PublicParams::Ecdh {
                curve,
                p,
                hash,
                alg_sym,
            } => {
                write_curve(curve, writer)?;
                p.to_writer(writer)?;
                writer.write_all(&[3, 1, u8::from(*hash), u8::from(*alg_sym)])?;
            }
            PublicParams::Unknown { data } => {
                writer.write_all(data)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PublicParams::Rsa { n, e } => n.write_len() + e.write_len(),
            PublicParams::Dsa { p, q, g, y } => {
                p.write_len() + q.write_len() + g.write_len() + y.write_len()
            }
            PublicParams::Elgamal { p, g, y } => p.write_len() + g.write_len() + y.write_len(),
            PublicParams::Ec { curve, p } => 1 + curve.oid().len() + p.write_len(),
            PublicParams::Ecdh { curve, p, .. } => 1 + curve.oid().len() + p.write_len() + 4,
            PublicParams::Unknown { data } => data.len(),
        }
    }
}

/// Parsed cleartext secret MPIs, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub enum SecretMaterial {
    Rsa { d: Mpi, p: Mpi, q: Mpi, u: Mpi },
    Dsa { x: Mpi },
    Elgamal { x: Mpi },
    Ec { x: Mpi },
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretMaterial::Rsa { .. } => write!(f, "SecretMaterial::Rsa([..])"),
            SecretMaterial::Dsa { .. } => write!(f, "SecretMaterial::Dsa([..])"),
            SecretMaterial::Elgamal { .. } => write!(f, "SecretMaterial::Elgamal([..])"),
            SecretMaterial::Ec { .. } => write!(f, "SecretMaterial::Ec([..])"),
        }
    }
}

/// S2K protection descriptor of a secret key packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretProtection {
    pub usage: S2kUsage,
    pub sym_alg: SymmetricKeyAlgorithm,
    pub cipher_mode: CipherMode,
    pub s2k: StringToKey,
    pub iv: Vec<u8>,
}

impl Default for SecretProtection {
    fn default() -> Self {
        SecretProtection {
            usage: S2kUsage::None,
            sym_alg: SymmetricKeyAlgorithm::Plaintext,
            cipher_mode: CipherMode::Cfb,
            s2k: StringToKey::default(),
            iv: Vec::new(),
        }
    }
}

/// The secret portion of a secret key packet: protection descriptor plus the
/// raw (possibly encrypted) secret data, and, once decrypted, the parsed
/// cleartext MPIs.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretParams {
    #[zeroize(skip)]
    pub protection: SecretProtection,
    pub sec_data: Vec<u8>,
    pub material: Option<SecretMaterial>,
}

impl fmt::Debug for SecretParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretParams")
            .field("protection", &self.protection)
            .field("sec_data", &"[..]")
            .field("material", &self.material)
            .finish()
    }
}

impl SecretParams {
    fn try_from_reader(i: &mut ByteReader<'_>) -> Result<Self> {
        let usage = S2kUsage::from(i.read_u8()?);

        let protection = match usage {
            S2kUsage::None => SecretProtection {
                usage,
                ..Default::default()
            },
            S2kUsage::Encrypted | S2kUsage::EncryptedAndHashed => {
                let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);
                let s2k = StringToKey::try_from_reader(i)?;
                let iv = i.take(sym_alg.block_size())?.to_vec();
                SecretProtection {
                    usage,
                    sym_alg,
                    cipher_mode: CipherMode::Cfb,
                    s2k,
                    iv,
                }
            }
            S2kUsage::Other(raw) => {
                return BadFormatSnafu {
                    message: format!("unsupported s2k usage {raw}"),
                }
                .fail();
            }
        };

        Ok(SecretParams {
            protection,
            sec_data: i.rest().to_vec(),
            material: None,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.protection.usage != S2kUsage::None
    }
}

impl Serialize for SecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.protection.usage.into())?;
        if self.protection.usage != S2kUsage::None {
            writer.write_u8(self.protection.sym_alg.into())?;
            self.protection.s2k.to_writer(writer)?;
            writer.write_all(&self.protection.iv)?;
        }
        writer.write_all(&self.sec_data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = 1;
        if self.protection.usage != S2kUsage::None {
            sum += 1 + self.protection.s2k.write_len() + self.protection.iv.len();
        }
        sum + self.sec_data.len()
    }
}

/// A public or secret key packet, primary or subkey.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPacket {
    packet_header: PacketHeader,
    version: KeyVersion,
    created_at: DateTime<Utc>,
    /// v2/v3 keys carry an expiration in days instead of a subpacket.
    validity_days: Option<u16>,
    algorithm: PublicKeyAlgorithm,
    public_params: PublicParams,
    secret: Option<SecretParams>,
}

impl KeyPacket {
    pub fn try_from_reader(packet_header: PacketHeader, body: &[u8]) -> Result<Self> {
        let tag = packet_header.tag();
        snafu::ensure!(
            tag.is_key(),
            BadParametersSnafu {
                message: format!("not a key packet tag: {:?}", tag),
            }
        );

        let mut i = ByteReader::new(body);
        let version = KeyVersion::from(i.read_u8()?);

        let (created_at, validity_days) = match version {
            KeyVersion::V2 | KeyVersion::V3 => {
                let created = read_timestamp(&mut i)?;
                let validity = i.read_be_u16()?;
                (created, Some(validity))
            }
            KeyVersion::V4 => (read_timestamp(&mut i)?, None),
            v => {
                return BadFormatSnafu {
                    message: format!("unsupported key version {:?}", v),
                }
                .fail();
            }
        };

        let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let public_params = PublicParams::try_from_reader(algorithm, &mut i)?;

        let secret = if tag.is_secret_key() {
            snafu::ensure!(
                !matches!(algorithm, PublicKeyAlgorithm::Unknown(_)),
                BadFormatSnafu {
                    message: "secret key packet with unknown algorithm".to_string(),
                }
            );
            Some(SecretParams::try_from_reader(&mut i)?)
        } else {
            snafu::ensure!(
                i.is_empty(),
                BadFormatSnafu {
                    message: format!("{} trailing bytes in public key packet", i.remaining()),
                }
            );
            None
        };

        Ok(KeyPacket {
            packet_header,
            version,
            created_at,
            validity_days,
            algorithm,
            public_params,
            secret,
        })
    }

    pub fn new(
        tag: Tag,
        version: KeyVersion,
        created_at: DateTime<Utc>,
        algorithm: PublicKeyAlgorithm,
        public_params: PublicParams,
        secret: Option<SecretParams>,
    ) -> Result<Self> {
        snafu::ensure!(
            tag.is_key() && tag.is_secret_key() == secret.is_some(),
            BadParametersSnafu {
                message: format!("tag {:?} does not match secret material", tag),
            }
        );
        let mut pkt = KeyPacket {
            packet_header: PacketHeader::new(tag, 0),
            version,
            created_at,
            validity_days: None,
            algorithm,
            public_params,
            secret,
        };
        pkt.packet_header = PacketHeader::new(tag, pkt.write_len());
        Ok(pkt)
    }

    pub fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }

    pub fn tag(&self) -> Tag {
        self.packet_header.tag()
    }

    pub fn version(&self) -> KeyVersion {
        self.version
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn validity_days(&self) -> Option<u16> {
        self.validity_days
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.public_params
    }

    pub fn secret(&self) -> Option<&SecretParams> {
        self.secret.as_ref()
    }

    pub fn secret_mut(&mut self) -> Option<&mut SecretParams> {
        self.secret.as_mut()
    }

    pub fn is_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn is_subkey(&self) -> bool {
        self.tag().is_subkey()
    }

    pub fn is_encrypted(&self) -> bool {
        self.secret.as_ref().is_some_and(SecretParams::is_encrypted)
    }

    pub fn has_secret_material(&self) -> bool {
        self.secret.as_ref().is_some_and(|s| s.material.is_some())
    }

    /// Re-frame after the secret data region changed size.
    pub fn refresh_header(&mut self) {
        self.packet_header = PacketHeader::new(self.tag(), self.write_len());
    }

    /// Wipe the parsed cleartext MPIs, keeping `sec_data` intact.
    pub fn forget_secret_material(&mut self) {
        if let Some(secret) = self.secret.as_mut() {
            if let Some(material) = secret.material.as_mut() {
                material.zeroize();
            }
            secret.material = None;
        }
    }

    /// A public-only rendition of this packet, with the matching public tag.
    pub fn public_copy(&self) -> Result<KeyPacket> {
        let tag = match self.tag() {
            Tag::SecretKey | Tag::PublicKey => Tag::PublicKey,
            _ => Tag::PublicSubkey,
        };
        let mut pkt = KeyPacket {
            packet_header: PacketHeader::new(tag, 0),
            version: self.version,
            created_at: self.created_at,
            validity_days: self.validity_days,
            algorithm: self.algorithm,
            public_params: self.public_params.clone(),
            secret: None,
        };
        pkt.packet_header = PacketHeader::new(tag, pkt.write_len());
        Ok(pkt)
    }

    /// Compare the public portion only; used by merge to decide whether two
    /// packets describe the same key.
    pub fn public_eq(&self, other: &KeyPacket) -> bool {
        self.version == other.version
            && self.created_at == other.created_at
            && self.validity_days == other.validity_days
            && self.algorithm == other.algorithm
            && self.public_params == other.public_params
    }

    fn public_body_len(&self) -> usize {
        let version_fields = match self.version {
            KeyVersion::V2 | KeyVersion::V3 => 1 + 4 + 2 + 1,
            _ => 1 + 4 + 1,
        };
        version_fields + self.public_params.write_len()
    }

    fn write_public_body<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version.into())?;
        writer.write_u32::<BigEndian>(self.created_at.timestamp() as u32)?;
        if let KeyVersion::V2 | KeyVersion::V3 = self.version {
            writer.write_u16::<BigEndian>(self.validity_days.unwrap_or(0))?;
        }
        writer.write_u8(self.algorithm.into())?;
        self.public_params.to_writer(writer)?;
        Ok(())
    }

    /// Hash the public portion the way signatures over keys expect it:
    /// prefixed with `0x99` and a two octet length.
    pub fn hash_for_signature(&self, hasher: &mut dyn FnMut(&[u8])) -> Result<()> {
        let mut body = Vec::with_capacity(self.public_body_len());
        self.write_public_body(&mut body)?;

        let mut prefix = [0x99u8, 0, 0];
        BigEndian::write_u16(&mut prefix[1..], body.len() as u16);

        hasher(&prefix);
        hasher(&body);
        Ok(())
    }

    /// The key fingerprint: SHA1 over the v4 public body, MD5 over the raw
    /// RSA material for v2/v3 keys.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        match self.version {
            KeyVersion::V2 | KeyVersion::V3 => match &self.public_params {
                PublicParams::Rsa { n, e } => {
                    let mut h = Md5::new();
                    h.update(n.as_ref());
                    h.update(e.as_ref());
                    Ok(Fingerprint::new(h.finalize().to_vec()))
                }
                _ => BadParametersSnafu {
                    message: "v3 keys must use RSA".to_string(),
                }
                .fail(),
            },
            KeyVersion::V4 => {
                let mut h = Sha1::new();
                self.hash_for_signature(&mut |data| h.update(data))?;
                Ok(Fingerprint::new(h.finalize().to_vec()))
            }
            v => BadParametersSnafu {
                message: format!("unsupported key version {:?}", v),
            }
            .fail(),
        }
    }

    /// The 8 byte key id: low 64 fingerprint bits for v4, low 64 modulus
    /// bits for v2/v3.
    pub fn key_id(&self) -> Result<KeyId> {
        match self.version {
            KeyVersion::V2 | KeyVersion::V3 => match &self.public_params {
                PublicParams::Rsa { n, .. } => {
                    let raw = n.as_ref();
                    snafu::ensure!(
                        raw.len() >= 8,
                        BadParametersSnafu {
                            message: "rsa modulus too small for key id".to_string(),
                        }
                    );
                    KeyId::from_slice(&raw[raw.len() - 8..])
                }
                _ => BadParametersSnafu {
                    message: "v3 keys must use RSA".to_string(),
                }
                .fail(),
            },
            _ => {
                let fp = self.fingerprint()?;
                let raw = fp.as_bytes();
                KeyId::from_slice(&raw[raw.len() - 8..])
            }
        }
    }

    /// The keygrip, SHA1 over the canonical public material. Compatible with
    /// the libgcrypt rules for RSA, DSA and Elgamal.
    pub fn grip(&self) -> Result<KeyGrip> {
        let mut h = Sha1::new();
        match &self.public_params {
            PublicParams::Rsa { n, .. } => {
                h.update(n.as_ref());
            }
            PublicParams::Dsa { p, q, g, y } => {
                grip_hash_mpi(&mut h, p, 'p');
                grip_hash_mpi(&mut h, q, 'q');
                grip_hash_mpi(&mut h, g, 'g');
                grip_hash_mpi(&mut h, y, 'y');
            }
            PublicParams::Elgamal { p, g, y } => {
                grip_hash_mpi(&mut h, p, 'p');
                grip_hash_mpi(&mut h, g, 'g');
                grip_hash_mpi(&mut h, y, 'y');
            }
            PublicParams::Ec { p, .. } | PublicParams::Ecdh { p, .. } => {
                grip_hash_mpi(&mut h, p, 'q');
            }
            PublicParams::Unknown { .. } => {
                return BadParametersSnafu {
                    message: "cannot compute grip for unknown algorithm".to_string(),
                }
                .fail();
            }
        }

        let digest: [u8; 20] = h.finalize().into();
        Ok(digest.into())
    }
}

/// Hash one MPI in the libgcrypt s-expression framing, normalizing the value
/// with a zero octet when the high bit is set.
fn grip_hash_mpi(h: &mut Sha1, mpi: &Mpi, name: char) {
    let raw = mpi.as_ref();
    let lzero = !raw.is_empty() && raw[0] & 0x80 != 0;
    let len = raw.len() + usize::from(lzero);

    h.update(format!("(1:{name}{len}:").as_bytes());
    if lzero {
        h.update([0u8]);
    }
    h.update(raw);
    h.update(b")");
}

fn read_timestamp(i: &mut ByteReader<'_>) -> Result<DateTime<Utc>> {
    let ts = i.read_be_u32()?;
    Utc.timestamp_opt(i64::from(ts), 0)
        .single()
        .ok_or_else(|| format_err!("invalid key creation timestamp {}", ts))
}

impl Serialize for KeyPacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.write_public_body(writer)?;
        if let Some(ref secret) = self.secret {
            secret.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.public_body_len() + self.secret.as_ref().map_or(0, Serialize::write_len)
    }
}
