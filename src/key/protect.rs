use log::debug;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::s2k::{S2kUsage, StringToKeyType};
use crate::crypto::sym::CipherMode;
use crate::errors::{BadFormatSnafu, BadParametersSnafu, Error, Result};
use crate::packet::{KeyPacket, SecretMaterial};
use crate::parsing::ByteReader;
use crate::ser::Serialize;
use crate::types::{KeyVersion, Mpi, Password};

/// Check the integrity tail over the cleartext secret data and parse the
/// algorithm specific MPIs into the packet.
pub(crate) fn parse_secret_key_mpis(pkt: &mut KeyPacket, mpis: &[u8]) -> Result<()> {
    let usage = pkt
        .secret()
        .ok_or_else(|| Error::BadParameters {
            message: "not a secret key packet".to_string(),
        })?
        .protection
        .usage;

    let body = match usage {
        S2kUsage::None | S2kUsage::Encrypted => {
            snafu::ensure!(
                mpis.len() >= 2,
                BadFormatSnafu {
                    message: "secret key data too short for checksum".to_string(),
                }
            );
            let (body, tail) = mpis.split_at(mpis.len() - 2);
            checksum::simple(tail, body)?;
            body
        }
        S2kUsage::EncryptedAndHashed => {
            snafu::ensure!(
                mpis.len() >= checksum::SHA1_TAIL_SIZE,
                BadFormatSnafu {
                    message: "secret key data too short for sha1 tail".to_string(),
                }
            );
            let (body, tail) = mpis.split_at(mpis.len() - checksum::SHA1_TAIL_SIZE);
            checksum::sha1(tail, body)?;
            body
        }
        S2kUsage::Other(raw) => {
            return BadParametersSnafu {
                message: format!("unknown s2k usage {raw}"),
            }
            .fail();
        }
    };

    let mut i = ByteReader::new(body);
    let material = if pkt.algorithm().is_rsa() {
        SecretMaterial::Rsa {
            d: Mpi::try_from_reader(&mut i)?,
            p: Mpi::try_from_reader(&mut i)?,
            q: Mpi::try_from_reader(&mut i)?,
            u: Mpi::try_from_reader(&mut i)?,
        }
    } else {
        use crate::crypto::public_key::PublicKeyAlgorithm::*;
        match pkt.algorithm() {
            Dsa => SecretMaterial::Dsa {
                x: Mpi::try_from_reader(&mut i)?,
            },
            Elgamal | ElgamalEncryptSign => SecretMaterial::Elgamal {
                x: Mpi::try_from_reader(&mut i)?,
            },
            EdDsa | Ecdsa | Sm2 | Ecdh => SecretMaterial::Ec {
                x: Mpi::try_from_reader(&mut i)?,
            },
            alg => {
                return BadParametersSnafu {
                    message: format!("unknown pk algorithm {:?}", alg),
                }
                .fail();
            }
        }
    };

    snafu::ensure!(
        i.is_empty(),
        BadFormatSnafu {
            message: format!("{} extra bytes in secret key data", i.remaining()),
        }
    );

    pkt.secret_mut().expect("checked above").material = Some(material);
    Ok(())
}

/// Serialize the secret MPIs with their integrity tail, ready for the
/// secret data region of the packet.
pub(crate) fn write_secret_key_mpis(pkt: &KeyPacket) -> Result<Zeroizing<Vec<u8>>> {
    let secret = pkt.secret().ok_or_else(|| Error::BadParameters {
        message: "not a secret key packet".to_string(),
    })?;
    let material = secret.material.as_ref().ok_or_else(|| Error::BadParameters {
        message: "secret material is not available".to_string(),
    })?;

    let mut body = Zeroizing::new(Vec::new());
    match material {
        SecretMaterial::Rsa { d, p, q, u } => {
            d.to_writer(&mut *body)?;
            p.to_writer(&mut *body)?;
            q.to_writer(&mut *body)?;
            u.to_writer(&mut *body)?;
        }
        SecretMaterial::Dsa { x }
        | SecretMaterial::Elgamal { x }
        | SecretMaterial::Ec { x } => {
            x.to_writer(&mut *body)?;
        }
    }

    if secret.protection.usage == S2kUsage::EncryptedAndHashed {
        let tail = checksum::calculate_sha1(&body);
        body.extend_from_slice(&tail);
    } else {
        let sum = checksum::calculate_simple(&body);
        body.extend_from_slice(&sum.to_be_bytes());
    }

    Ok(body)
}

/// v3 secret data: four RSA MPIs, each with a cleartext length prefix and a
/// CFB resync at every MPI boundary; the sum16 tail is cleartext.
fn decrypt_secret_key_v3(
    pkt: &KeyPacket,
    key: &[u8],
    enc: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let protection = &pkt.secret().expect("caller checked").protection;
    let sym_alg = protection.sym_alg;
    let block_size = sym_alg.block_size();
    snafu::ensure!(
        block_size > 0,
        BadParametersSnafu {
            message: format!("symmetric algorithm {:?} unusable for v3 keys", sym_alg),
        }
    );

    let mut dec = Zeroizing::new(enc.to_vec());
    let mut register = protection.iv.clone();
    let mut pos = 0usize;

    for _ in 0..4 {
        snafu::ensure!(
            pos + 2 <= enc.len(),
            BadFormatSnafu {
                message: "bad v3 secret key data".to_string(),
            }
        );
        let bits = u16::from_be_bytes([enc[pos], enc[pos + 1]]);
        let mpi_len = usize::from((bits + 7) >> 3);
        pos += 2;

        snafu::ensure!(
            pos + mpi_len <= enc.len() && mpi_len >= block_size,
            BadFormatSnafu {
                message: "bad v3 rsa mpi length".to_string(),
            }
        );

        sym_alg.decrypt_with_iv(key, &register, &mut dec[pos..pos + mpi_len])?;
        pos += mpi_len;

        // resync: the register continues from the last ciphertext block
        register = enc[pos - block_size..pos].to_vec();
    }

    snafu::ensure!(
        pos + 2 == enc.len(),
        BadFormatSnafu {
            message: "bad v3 secret key data".to_string(),
        }
    );

    Ok(dec)
}

/// Decrypt (or, for unprotected keys, just parse) the secret portion of the
/// packet, filling in the cleartext MPIs.
///
/// Every derived key and intermediate cleartext buffer is wiped on all exit
/// paths.
pub fn decrypt_secret_key(pkt: &mut KeyPacket, password: Option<&Password>) -> Result<()> {
    snafu::ensure!(
        pkt.is_secret(),
        BadParametersSnafu {
            message: "not a secret key packet".to_string(),
        }
    );

    if let KeyVersion::V2 | KeyVersion::V3 = pkt.version() {
        snafu::ensure!(
            pkt.algorithm().is_rsa(),
            BadParametersSnafu {
                message: "non-RSA v3 key".to_string(),
            }
        );
    }

    let secret = pkt.secret().expect("checked above");
    if !secret.is_encrypted() {
        let sec_data = secret.sec_data.clone();
        return parse_secret_key_mpis(pkt, &sec_data);
    }

    let password = password.ok_or_else(|| Error::BadParameters {
        message: "password required for protected key".to_string(),
    })?;

    let protection = &secret.protection;
    snafu::ensure!(
        protection.cipher_mode == CipherMode::Cfb,
        BadParametersSnafu {
            message: "unsupported secret key encryption mode".to_string(),
        }
    );

    let key_size = protection.sym_alg.key_size();
    snafu::ensure!(
        key_size > 0,
        BadParametersSnafu {
            message: format!("unusable symmetric algorithm {:?}", protection.sym_alg),
        }
    );

    let key = protection.s2k.derive_key(password, key_size)?;

    let dec = match pkt.version() {
        KeyVersion::V2 | KeyVersion::V3 => decrypt_secret_key_v3(pkt, &key, &secret.sec_data)?,
        KeyVersion::V4 => {
            let mut dec = Zeroizing::new(secret.sec_data.clone());
            protection
                .sym_alg
                .decrypt_with_iv(&key, &protection.iv, &mut dec)?;
            dec
        }
        v => {
            return BadParametersSnafu {
                message: format!("unsupported key version {:?}", v),
            }
            .fail();
        }
    };

    parse_secret_key_mpis(pkt, &dec)
}

/// Serialize and, unless the usage is `None`, encrypt the secret MPIs back
/// into the packet's secret data region.
///
/// Encrypting wipes the parsed cleartext MPIs; a cleartext rewrite keeps
/// them.
pub fn encrypt_secret_key<R: CryptoRng + Rng>(
    pkt: &mut KeyPacket,
    password: Option<&Password>,
    rng: &mut R,
) -> Result<()> {
    snafu::ensure!(
        pkt.is_secret() && pkt.has_secret_material(),
        BadParametersSnafu {
            message: "secret material required for encryption".to_string(),
        }
    );

    {
        let protection = &pkt.secret().expect("checked above").protection;
        if protection.usage != S2kUsage::None {
            snafu::ensure!(
                protection.cipher_mode == CipherMode::Cfb,
                BadParametersSnafu {
                    message: "unsupported secret key encryption mode".to_string(),
                }
            );
        }
    }

    let mut body = write_secret_key_mpis(pkt)?;

    let secret = pkt.secret_mut().expect("checked above");
    if secret.protection.usage == S2kUsage::None {
        secret.sec_data = body.to_vec();
        pkt.refresh_header();
        return Ok(());
    }

    let password = password.ok_or_else(|| Error::BadParameters {
        message: "password required to protect key".to_string(),
    })?;

    snafu::ensure!(
        pkt.version() == KeyVersion::V4,
        BadParametersSnafu {
            message: "encryption of v3 keys is not supported".to_string(),
        }
    );

    let secret = pkt.secret_mut().expect("checked above");
    let sym_alg = secret.protection.sym_alg;
    let key_size = sym_alg.key_size();
    let block_size = sym_alg.block_size();
    snafu::ensure!(
        key_size > 0 && block_size > 0,
        BadParametersSnafu {
            message: format!("unusable symmetric algorithm {:?}", sym_alg),
        }
    );

    // fresh iv and salt for every encryption
    let mut iv = vec![0u8; block_size];
    rng.fill(&mut iv[..]);
    secret.protection.iv = iv;
    if secret.protection.s2k.typ() != StringToKeyType::Simple {
        secret.protection.s2k.regenerate_salt(rng);
    }

    let key = secret.protection.s2k.derive_key(password, key_size)?;
    sym_alg.encrypt_with_iv(&key, &secret.protection.iv, &mut body)?;

    secret.sec_data = body.to_vec();
    debug!("secret key data encrypted with {:?}", sym_alg);

    pkt.forget_secret_material();
    pkt.refresh_header();
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::crypto::s2k::StringToKey;
    use crate::crypto::sym::SymmetricKeyAlgorithm;
    use crate::packet::{PublicParams, SecretParams, SecretProtection};
    use crate::types::Tag;

    fn cleartext_secret_key() -> KeyPacket {
        let material = SecretMaterial::Rsa {
            d: Mpi::from_slice(&[0x11; 64]),
            p: Mpi::from_slice(&[0x22; 32]),
            q: Mpi::from_slice(&[0x33; 32]),
            u: Mpi::from_slice(&[0x44; 32]),
        };
        let mut pkt = KeyPacket::new(
            Tag::SecretKey,
            KeyVersion::V4,
            Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
            PublicKeyAlgorithm::Rsa,
            PublicParams::Rsa {
                n: Mpi::from_slice(&[0xAA; 128]),
                e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
            },
            Some(SecretParams {
                protection: SecretProtection::default(),
                sec_data: Vec::new(),
                material: Some(material),
            }),
        )
        .unwrap();

        // fill sec_data with the cleartext rendition
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        encrypt_secret_key(&mut pkt, None, &mut rng).unwrap();
        pkt
    }

    fn protect(pkt: &mut KeyPacket, password: &Password, seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let secret = pkt.secret_mut().unwrap();
        secret.protection.usage = S2kUsage::EncryptedAndHashed;
        secret.protection.sym_alg = SymmetricKeyAlgorithm::Aes128;
        secret.protection.s2k =
            StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha1, 96);
        encrypt_secret_key(pkt, Some(password), &mut rng).unwrap();
    }

    #[test]
    fn test_cleartext_roundtrip() {
        let mut pkt = cleartext_secret_key();
        assert!(pkt.has_secret_material());
        let before = pkt.secret().unwrap().material.clone();

        pkt.forget_secret_material();
        assert!(!pkt.has_secret_material());

        // no password needed for an unprotected key
        decrypt_secret_key(&mut pkt, None).unwrap();
        assert_eq!(pkt.secret().unwrap().material, before);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let mut pkt = cleartext_secret_key();
        let before = pkt.secret().unwrap().material.clone();
        let password = Password::from("abc");

        protect(&mut pkt, &password, 7);
        assert!(pkt.is_encrypted());
        assert!(!pkt.has_secret_material());

        decrypt_secret_key(&mut pkt, Some(&password)).unwrap();
        assert_eq!(pkt.secret().unwrap().material, before);
    }

    #[test]
    fn test_wrong_password() {
        let mut pkt = cleartext_secret_key();
        protect(&mut pkt, &Password::from("abc"), 7);

        let err = decrypt_secret_key(&mut pkt, Some(&Password::from("abd"))).unwrap_err();
        assert!(matches!(err, Error::DecryptFailed));
        assert!(!pkt.has_secret_material());
    }

    #[test]
    fn test_corrupted_sec_data() {
        let mut pkt = cleartext_secret_key();
        let password = Password::from("abc");
        protect(&mut pkt, &password, 7);

        pkt.secret_mut().unwrap().sec_data[0] ^= 0xFF;
        assert!(decrypt_secret_key(&mut pkt, Some(&password)).is_err());
    }

    #[test]
    fn test_missing_password() {
        let mut pkt = cleartext_secret_key();
        protect(&mut pkt, &Password::from("abc"), 7);
        assert!(matches!(
            decrypt_secret_key(&mut pkt, None).unwrap_err(),
            Error::BadParameters { .. }
        ));
    }

    #[test]
    fn test_sum16_tail_for_encrypted_usage() {
        let mut pkt = cleartext_secret_key();
        let password = Password::from("xyz");
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let secret = pkt.secret_mut().unwrap();
        secret.protection.usage = S2kUsage::Encrypted;
        secret.protection.sym_alg = SymmetricKeyAlgorithm::Aes256;
        secret.protection.s2k = StringToKey::new_iterated(&mut rng, HashAlgorithm::Sha256, 96);
        encrypt_secret_key(&mut pkt, Some(&password), &mut rng).unwrap();

        decrypt_secret_key(&mut pkt, Some(&password)).unwrap();
        assert!(pkt.has_secret_material());
    }
}
