use byteorder::{BigEndian, ByteOrder};
use chrono::{SubsecRound, Utc};
use log::debug;
use rand::{CryptoRng, Rng};
use smallvec::smallvec;

use crate::crypto::ecc_curve::EccCurve;
use crate::crypto::hash::{HashAlgorithm, Hasher};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::{eddsa, rsa};
use crate::errors::{BadParametersSnafu, Result};
use crate::key::object::{BindingInfo, CertInfo};
use crate::packet::{
    KeyPacket, PublicParams, RevocationCode, SecretMaterial, Signature, SignatureConfig,
    SignatureType, Subpacket, SubpacketData, UserIdPacket,
};
use crate::ser::Serialize;
use crate::types::{KeyFlags, Mpi, Tag};

/// Produce the signature MPIs for a digest with the secret material of an
/// unlocked secret key packet.
pub(crate) fn signature_calculate(
    seckey: &KeyPacket,
    hash_alg: HashAlgorithm,
    digest: &[u8],
) -> Result<Vec<Mpi>> {
    let material = seckey
        .secret()
        .and_then(|secret| secret.material.as_ref())
        .ok_or_else(|| crate::errors::Error::BadParameters {
            message: "signing requires an unlocked secret key".to_string(),
        })?;

    match (seckey.public_params(), material) {
        (PublicParams::Rsa { n, e }, SecretMaterial::Rsa { d, p, q, .. }) => {
            rsa::sign(n, e, d, p, q, hash_alg, digest)
        }
        (PublicParams::Ec { curve, .. }, SecretMaterial::Ec { x })
            if *curve == EccCurve::Ed25519 =>
        {
            eddsa::sign(x, digest)
        }
        _ => unsupported_err!("signing with {:?}", seckey.algorithm()),
    }
}

/// Substitute a stronger hash when the signer algorithm requires one: DSA
/// keys demand a digest at least as wide as q, ECDSA at least the curve's
/// minimum.
pub fn adjust_hash_to_key(hash: HashAlgorithm, signer: &KeyPacket) -> HashAlgorithm {
    let min = match signer.public_params() {
        PublicParams::Dsa { q, .. } => {
            let qbits = q.bits();
            if qbits <= 160 {
                HashAlgorithm::Sha1
            } else if qbits <= 224 {
                HashAlgorithm::Sha224
            } else if qbits <= 256 {
                HashAlgorithm::Sha256
            } else {
                HashAlgorithm::Sha512
            }
        }
        PublicParams::Ec { curve, .. } if signer.algorithm() == PublicKeyAlgorithm::Ecdsa => {
            curve.min_hash()
        }
        _ => return hash,
    };

    if hash.digest_size() < min.digest_size() {
        min
    } else {
        hash
    }
}

/// Finish a signature: hash its own data and trailer, then sign the digest.
fn finalize_signature(
    config: SignatureConfig,
    mut hasher: Box<dyn Hasher>,
    seckey: &KeyPacket,
) -> Result<Signature> {
    let len = config.hash_signature_data(&mut *hasher)?;
    hasher.update(&config.trailer(len));

    let digest = hasher.finish();
    let signed_hash_value = [digest[0], digest[1]];
    let signature = signature_calculate(seckey, config.hash_alg, &digest)?;

    Ok(Signature::from_config(
        config,
        signed_hash_value,
        signature,
    ))
}

/// Build a positive self-certification over `(key, userid)`.
///
/// Hashed subpackets carry the issuer fingerprint, creation time and the
/// certification metadata; the issuer key id goes into the unhashed area.
pub fn certify_userid<R: CryptoRng + Rng>(
    key: &KeyPacket,
    uid: &UserIdPacket,
    signer: &KeyPacket,
    hash_alg: HashAlgorithm,
    cert: &CertInfo,
    _rng: &mut R,
) -> Result<Signature> {
    let keyid = signer.key_id()?;
    let keyfp = signer.fingerprint()?;

    let mut config = SignatureConfig::v4(
        SignatureType::CertPositive,
        signer.algorithm(),
        adjust_hash_to_key(hash_alg, signer),
    );

    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::IssuerFingerprint(
            signer.version(),
            keyfp.as_bytes().into(),
        )));
    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::SignatureCreationTime(
            Utc::now().trunc_subsecs(0),
        )));
    if cert.key_expiration != 0 {
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::KeyExpirationTime(
                cert.key_expiration,
            )));
    }
    if cert.key_flags != 0 {
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::KeyFlags(smallvec![
                cert.key_flags
            ])));
    }
    if cert.primary {
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::IsPrimary(true)));
    }
    if !cert.prefs.symm_algs.is_empty() {
        config.hashed_subpackets.push(Subpacket::regular(
            SubpacketData::PreferredSymmetricAlgorithms(cert.prefs.symm_algs.clone()),
        ));
    }
    if !cert.prefs.hash_algs.is_empty() {
        config.hashed_subpackets.push(Subpacket::regular(
            SubpacketData::PreferredHashAlgorithms(cert.prefs.hash_algs.clone()),
        ));
    }
    if !cert.prefs.z_algs.is_empty() {
        config.hashed_subpackets.push(Subpacket::regular(
            SubpacketData::PreferredCompressionAlgorithms(cert.prefs.z_algs.clone()),
        ));
    }
    if let Some(pref) = cert.prefs.ks_prefs.first() {
        config.hashed_subpackets.push(Subpacket::regular(
            SubpacketData::KeyServerPreferences(smallvec![*pref]),
        ));
    }
    if let Some(ref server) = cert.prefs.key_server {
        config.hashed_subpackets.push(Subpacket::regular(
            SubpacketData::PreferredKeyServer(server.as_bytes().to_vec()),
        ));
    }

    config
        .unhashed_subpackets
        .push(Subpacket::regular(SubpacketData::Issuer(keyid)));

    let mut hasher = config.hash_alg.new_hasher()?;
    key.hash_for_signature(&mut |data| hasher.update(data))?;

    let packet_buf = uid.to_bytes()?;
    let prefix = match uid.tag() {
        Tag::UserAttribute => 0xD1,
        _ => 0xB4,
    };
    let mut prefix_buf = [prefix, 0u8, 0u8, 0u8, 0u8];
    BigEndian::write_u32(&mut prefix_buf[1..], packet_buf.len() as u32);
    hasher.update(&prefix_buf);
    hasher.update(&packet_buf);

    finalize_signature(config, hasher, signer)
}

/// Build a key revocation: a direct signature on the key carrying the
/// revocation reason.
pub fn revoke_key<R: CryptoRng + Rng>(
    key: &KeyPacket,
    signer: &KeyPacket,
    hash_alg: HashAlgorithm,
    code: RevocationCode,
    reason: &str,
    _rng: &mut R,
) -> Result<Signature> {
    let keyid = signer.key_id()?;
    let keyfp = signer.fingerprint()?;

    let typ = if key.tag().is_subkey() {
        SignatureType::SubkeyRevocation
    } else {
        SignatureType::KeyRevocation
    };
    let mut config = SignatureConfig::v4(
        typ,
        signer.algorithm(),
        adjust_hash_to_key(hash_alg, signer),
    );

    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::IssuerFingerprint(
            signer.version(),
            keyfp.as_bytes().into(),
        )));
    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::SignatureCreationTime(
            Utc::now().trunc_subsecs(0),
        )));
    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::RevocationReason(
            code,
            reason.as_bytes().to_vec(),
        )));
    config
        .unhashed_subpackets
        .push(Subpacket::regular(SubpacketData::Issuer(keyid)));

    let mut hasher = config.hash_alg.new_hasher()?;
    if typ == SignatureType::SubkeyRevocation {
        signer.hash_for_signature(&mut |data| hasher.update(data))?;
    }
    key.hash_for_signature(&mut |data| hasher.update(data))?;

    finalize_signature(config, hasher, signer)
}

/// The embedded cross signature: a primary key binding made with the
/// subkey over the same `(primary, subkey)` hash.
fn calculate_primary_binding(
    subkey: &KeyPacket,
    hash_alg: HashAlgorithm,
    hasher: Box<dyn Hasher>,
) -> Result<Signature> {
    let keyid = subkey.key_id()?;

    let mut config = SignatureConfig::v4(
        SignatureType::KeyBinding,
        subkey.algorithm(),
        adjust_hash_to_key(hash_alg, subkey),
    );
    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::SignatureCreationTime(
            Utc::now().trunc_subsecs(0),
        )));
    config
        .unhashed_subpackets
        .push(Subpacket::regular(SubpacketData::Issuer(keyid)));

    finalize_signature(config, hasher, subkey)
}

/// Build a subkey binding signature over `(key, subkey)`.
///
/// When the effective key flags grant signing, a primary key binding made
/// with the subkey is embedded; it is hashed over a snapshot of the binding
/// hash state taken before the binding signature itself is finished.
pub fn bind_subkey<R: CryptoRng + Rng>(
    key: &KeyPacket,
    subkey: &KeyPacket,
    hash_alg: HashAlgorithm,
    binding: &BindingInfo,
    _rng: &mut R,
) -> Result<Signature> {
    snafu::ensure!(
        !subkey.tag().is_primary_key(),
        BadParametersSnafu {
            message: "binding target must be a subkey packet".to_string(),
        }
    );

    let keyid = key.key_id()?;
    let keyfp = key.fingerprint()?;

    let mut config = SignatureConfig::v4(
        SignatureType::SubkeyBinding,
        key.algorithm(),
        adjust_hash_to_key(hash_alg, key),
    );

    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::IssuerFingerprint(
            key.version(),
            keyfp.as_bytes().into(),
        )));
    config
        .hashed_subpackets
        .push(Subpacket::regular(SubpacketData::SignatureCreationTime(
            Utc::now().trunc_subsecs(0),
        )));
    if binding.key_expiration != 0 {
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::KeyExpirationTime(
                binding.key_expiration,
            )));
    }
    if binding.key_flags != 0 {
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::KeyFlags(smallvec![
                binding.key_flags
            ])));
    }

    let mut hasher = config.hash_alg.new_hasher()?;
    key.hash_for_signature(&mut |data| hasher.update(data))?;
    subkey.hash_for_signature(&mut |data| hasher.update(data))?;

    // the cross signature shares the message hashed so far
    let hasher_snapshot = hasher.clone_boxed();

    let mut sig = finalize_signature(config, hasher, key)?;

    let effective_flags = if binding.key_flags != 0 {
        KeyFlags::from_bits(binding.key_flags)
    } else {
        key.algorithm().capabilities()
    };
    if effective_flags.sign() {
        debug!("embedding primary key binding signature");
        let embedded = calculate_primary_binding(subkey, hash_alg, hasher_snapshot)?;
        sig.config
            .unhashed_subpackets
            .push(Subpacket::regular(SubpacketData::EmbeddedSignature(
                Box::new(embedded),
            )));
    }

    sig.config
        .unhashed_subpackets
        .push(Subpacket::regular(SubpacketData::Issuer(keyid)));
    sig.refresh_header();

    Ok(sig)
}
