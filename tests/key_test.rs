#![allow(clippy::unwrap_used)]

use chrono::{SubsecRound, Utc};
use num_bigint_dig::ModInverse;
use pretty_assertions::assert_eq;
use rand::{CryptoRng, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::RsaPrivateKey;

use pgp_keyring::crypto::hash::HashAlgorithm;
use pgp_keyring::crypto::public_key::PublicKeyAlgorithm;
use pgp_keyring::crypto::sym::SymmetricKeyAlgorithm;
use pgp_keyring::errors::Error;
use pgp_keyring::key::{
    bind_subkey, certify_userid, revoke_key, BindingInfo, CertInfo, Key, KeyOp, Keyring,
    ProtectionParams, UserPrefs,
};
use pgp_keyring::packet::{
    KeyPacket, PublicParams, RevocationCode, SecretMaterial, SecretParams, SecretProtection,
    SignatureType,
};
use pgp_keyring::ser::Serialize;
use pgp_keyring::types::{KeyStoreFormat, KeyVersion, Mpi, Password, Tag};
use pgp_keyring::{KeySequence, TransferableKey, TransferableSubkey};

/// A fresh RSA secret key packet with parsed material, plus its public
/// rendition.
fn gen_rsa_key<R: CryptoRng + Rng>(rng: &mut R, bits: usize, tag: Tag) -> KeyPacket {
    let key = RsaPrivateKey::new(rng, bits).unwrap();

    let n = Mpi::from_slice(&key.n().to_bytes_be());
    let e = Mpi::from_slice(&key.e().to_bytes_be());
    let d = Mpi::from_slice(&key.d().to_bytes_be());
    let p = &key.primes()[0];
    let q = &key.primes()[1];
    let u = p
        .mod_inverse(q)
        .and_then(|u| u.to_biguint())
        .expect("p and q are coprime");

    let material = SecretMaterial::Rsa {
        d,
        p: Mpi::from_slice(&p.to_bytes_be()),
        q: Mpi::from_slice(&q.to_bytes_be()),
        u: Mpi::from_slice(&u.to_bytes_be()),
    };

    let mut pkt = KeyPacket::new(
        tag,
        KeyVersion::V4,
        Utc::now().trunc_subsecs(0),
        PublicKeyAlgorithm::Rsa,
        PublicParams::Rsa { n, e },
        Some(SecretParams {
            protection: SecretProtection::default(),
            sec_data: Vec::new(),
            material: Some(material),
        }),
    )
    .unwrap();

    // populate sec_data with the cleartext serialization
    let mut rng2 = ChaCha8Rng::seed_from_u64(0);
    pgp_keyring::key::encrypt_secret_key(&mut pkt, None, &mut rng2).unwrap();
    pkt
}

fn certified_public_key<R: CryptoRng + Rng>(
    rng: &mut R,
    bits: usize,
    userid: &str,
) -> (TransferableKey, KeyPacket) {
    let seckey = gen_rsa_key(rng, bits, Tag::SecretKey);
    let pubkey = seckey.public_copy().unwrap();

    let mut tkey = TransferableKey {
        key: pubkey.clone(),
        signatures: Vec::new(),
        userids: Vec::new(),
        subkeys: Vec::new(),
    };
    let uid = tkey.add_userid(userid);

    let cert = CertInfo {
        userid: userid.to_string(),
        primary: true,
        // certify and sign only, encryption is for subkeys
        key_flags: 0x03,
        ..Default::default()
    };
    let sig = certify_userid(&pubkey, &uid.uid, &seckey, HashAlgorithm::Sha256, &cert, rng).unwrap();
    uid.signatures.push(sig);

    (tkey, seckey)
}

#[test]
fn test_parse_and_reserialize_certified_key() {
    let _ = pretty_env_logger::try_init();
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    let (tkey, _) = certified_public_key(&mut rng, 2048, "Alice <alice@example.com>");

    let bytes = tkey.to_bytes().unwrap();
    let seq = KeySequence::from_bytes(&bytes).unwrap();
    assert_eq!(seq.keys.len(), 1);
    assert_eq!(seq.to_bytes().unwrap(), bytes, "byte exact roundtrip");

    // armored roundtrip carries the same packets
    let armored = tkey.to_armored_bytes().unwrap();
    let seq2 = KeySequence::from_bytes(&armored).unwrap();
    assert_eq!(seq2.to_bytes().unwrap(), bytes);

    let mut ring = Keyring::new();
    let grip = ring.add_transferable_key(&seq.keys[0]).unwrap();
    ring.validate_key(&grip).unwrap();

    let key = ring.get_by_grip(&grip).unwrap();
    assert!(key.is_validated());
    assert!(key.is_valid());
    assert!(!key.is_revoked());
    assert_eq!(key.uids().len(), 1);
    assert_eq!(key.uids()[0].name, "Alice <alice@example.com>");
    assert_eq!(key.primary_uid(), Some(0));
}

#[test]
fn test_validation_is_idempotent() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let (tkey, _) = certified_public_key(&mut rng, 1024, "Ida <ida@example.com>");

    let mut ring = Keyring::new();
    let grip = ring.add_transferable_key(&tkey).unwrap();
    ring.validate_key(&grip).unwrap();
    let first = (
        ring.get_by_grip(&grip).unwrap().is_valid(),
        ring.get_by_grip(&grip).unwrap().is_validated(),
    );
    ring.validate_key(&grip).unwrap();
    let second = (
        ring.get_by_grip(&grip).unwrap().is_valid(),
        ring.get_by_grip(&grip).unwrap().is_validated(),
    );
    assert_eq!(first, second);
    assert_eq!(first, (true, true));
}

#[test]
fn test_lock_unlock_cycles() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let seckey = gen_rsa_key(&mut rng, 1024, Tag::SecretKey);

    let tkey = TransferableKey {
        key: seckey,
        signatures: Vec::new(),
        userids: Vec::new(),
        subkeys: Vec::new(),
    };
    let mut key = Key::from_transferable(&tkey).unwrap();
    assert!(!key.is_locked());
    assert!(!key.is_protected());

    let password = Password::from("abc");
    let decrypted = key.pkt().clone();
    let params = ProtectionParams {
        sym_alg: Some(SymmetricKeyAlgorithm::Aes128),
        hash_alg: Some(HashAlgorithm::Sha1),
        iterations: Some(65536),
        ..Default::default()
    };
    key.protect(
        decrypted,
        KeyStoreFormat::Gpg,
        Some(params),
        &password,
        &mut rng,
        None,
    )
    .unwrap();

    assert!(key.is_protected());
    assert!(key.is_locked());
    assert_eq!(key.format(), KeyStoreFormat::Gpg);

    // unlock -> lock -> unlock, material identical across cycles
    key.unlock(&password).unwrap();
    assert!(!key.is_locked());
    let material_first = key.pkt().secret().unwrap().material.clone().unwrap();

    key.lock().unwrap();
    assert!(key.is_locked());

    key.unlock(&password).unwrap();
    let material_second = key.pkt().secret().unwrap().material.clone().unwrap();
    assert_eq!(material_first, material_second);

    // wrong password fails decryption
    key.lock().unwrap();
    let err = key.unlock(&Password::from("nope")).unwrap_err();
    assert!(matches!(err, Error::DecryptFailed));
    assert!(key.is_locked());
}

#[test]
fn test_protect_unprotect_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let seckey = gen_rsa_key(&mut rng, 1024, Tag::SecretKey);
    let material_before = seckey.secret().unwrap().material.clone().unwrap();

    let tkey = TransferableKey {
        key: seckey,
        signatures: Vec::new(),
        userids: Vec::new(),
        subkeys: Vec::new(),
    };
    let mut key = Key::from_transferable(&tkey).unwrap();

    let password = Password::from("first");
    let decrypted = key.pkt().clone();
    key.protect(decrypted, KeyStoreFormat::Gpg, None, &password, &mut rng, None)
        .unwrap();
    assert!(key.is_protected());

    // unprotect leaves the key unprotected but locked
    key.unprotect(&password, &mut rng, None).unwrap();
    assert!(!key.is_protected());
    assert!(key.is_locked());

    // raw packet 0 now parses as an unprotected secret key
    let raw = &key.rawpackets()[0];
    assert_eq!(raw.tag, Tag::SecretKey);
    let reparsed = TransferableKey::from_bytes(&raw.data).unwrap();
    assert!(!reparsed.key.is_encrypted());

    // a plain unlock recovers the original material without a password
    key.unlock(&Password::empty()).unwrap();
    assert_eq!(
        key.pkt().secret().unwrap().material.as_ref().unwrap(),
        &material_before
    );

    // protecting again with a different password still roundtrips
    let password2 = Password::from("second");
    let decrypted = key.pkt().clone();
    key.protect(decrypted, KeyStoreFormat::Gpg, None, &password2, &mut rng, None)
        .unwrap();
    key.unlock(&password2).unwrap();
    assert_eq!(
        key.pkt().secret().unwrap().material.as_ref().unwrap(),
        &material_before
    );
}

fn bound_subkey_key<R: CryptoRng + Rng>(
    rng: &mut R,
    subkey_flags: u8,
) -> (TransferableKey, KeyPacket, KeyPacket) {
    let (mut tkey, primary_sec) = certified_public_key(rng, 1024, "Sub <sub@example.com>");
    let subkey_sec = gen_rsa_key(rng, 1024, Tag::SecretSubkey);
    let subkey_pub = subkey_sec.public_copy().unwrap();

    let binding = BindingInfo {
        key_flags: subkey_flags,
        ..Default::default()
    };
    let sig = bind_subkey(
        &primary_sec,
        &subkey_sec,
        HashAlgorithm::Sha256,
        &binding,
        rng,
    )
    .unwrap();

    tkey.subkeys.push(TransferableSubkey {
        subkey: subkey_pub,
        signatures: vec![sig],
    });

    (tkey, primary_sec, subkey_sec)
}

#[test]
fn test_subkey_binding() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    // encryption only subkey
    let (tkey, _, _) = bound_subkey_key(&mut rng, 0x0C);

    let bytes = tkey.to_bytes().unwrap();
    let seq = KeySequence::from_bytes(&bytes).unwrap();

    let mut ring = Keyring::new();
    let grip = ring.add_transferable_key(&seq.keys[0]).unwrap();

    let primary = ring.get_by_grip(&grip).unwrap();
    assert_eq!(primary.subkey_grips().len(), 1);
    let sub_grip = primary.subkey_grips()[0];

    let subkey = ring.get_by_grip(&sub_grip).unwrap();
    assert_eq!(subkey.primary_grip(), Some(&grip));
    assert!(subkey.can_encrypt());
    assert!(!subkey.can_sign());

    ring.validate_all().unwrap();
    assert!(ring.get_by_grip(&grip).unwrap().is_valid());
    let subkey = ring.get_by_grip(&sub_grip).unwrap();
    assert!(subkey.is_validated());
    assert!(subkey.is_valid());
}

#[test]
fn test_corrupted_subkey_binding_is_invalid() {
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let (mut tkey, _, _) = bound_subkey_key(&mut rng, 0x0C);

    // corrupt the signed hash value of the binding signature
    tkey.subkeys[0].signatures[0].signed_hash_value[0] ^= 0xFF;

    let mut ring = Keyring::new();
    let grip = ring.add_transferable_key(&tkey).unwrap();
    ring.validate_all().unwrap();

    let primary = ring.get_by_grip(&grip).unwrap();
    assert!(primary.is_valid());

    let sub_grip = primary.subkey_grips()[0];
    let subkey = ring.get_by_grip(&sub_grip).unwrap();
    assert!(subkey.is_validated());
    assert!(!subkey.is_valid());
}

#[test]
fn test_primary_binding_cross_signature() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    // signing capable subkey carries the embedded cross signature
    let (tkey, _, _) = bound_subkey_key(&mut rng, 0x02);

    let binding = &tkey.subkeys[0].signatures[0];
    let embedded = binding.embedded_signature().expect("cross signature");
    assert_eq!(embedded.typ(), SignatureType::KeyBinding);

    // survives serialization
    let bytes = tkey.to_bytes().unwrap();
    let seq = KeySequence::from_bytes(&bytes).unwrap();
    let binding = &seq.keys[0].subkeys[0].signatures[0];
    assert_eq!(
        binding.embedded_signature().map(|s| s.typ()),
        Some(SignatureType::KeyBinding)
    );

    let mut ring = Keyring::new();
    let grip = ring.add_transferable_key(&seq.keys[0]).unwrap();
    ring.validate_all().unwrap();

    let sub_grip = ring.get_by_grip(&grip).unwrap().subkey_grips()[0];
    assert!(ring.get_by_grip(&sub_grip).unwrap().is_valid());
}

#[test]
fn test_revoked_key() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let (mut tkey, seckey) = certified_public_key(&mut rng, 1024, "Rev <rev@example.com>");

    let revocation = revoke_key(
        &tkey.key,
        &seckey,
        HashAlgorithm::Sha256,
        RevocationCode::KeyRetired,
        "",
        &mut rng,
    )
    .unwrap();
    tkey.signatures.push(revocation);

    let bytes = tkey.to_bytes().unwrap();
    let seq = KeySequence::from_bytes(&bytes).unwrap();

    let mut ring = Keyring::new();
    let grip = ring.add_transferable_key(&seq.keys[0]).unwrap();
    ring.validate_key(&grip).unwrap();

    let key = ring.get_by_grip(&grip).unwrap();
    assert!(key.is_validated());
    assert!(key.is_valid());
    assert!(key.is_revoked());

    // the empty reason text was replaced by the canonical description
    let revocation = key.key_revocation().expect("whole key revocation");
    assert_eq!(revocation.code, RevocationCode::KeyRetired);
    assert_eq!(revocation.reason, "Key is retired and no longer used");
    assert_eq!(revocation.uid, None);
}

#[test]
fn test_merge_union_and_idempotence() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let (tkey, _) = certified_public_key(&mut rng, 1024, "Merge <merge@example.com>");

    // a second copy carrying an extra third party certification
    let mut other = tkey.clone();
    let signer = gen_rsa_key(&mut rng, 1024, Tag::SecretKey);
    let cert = CertInfo {
        userid: "Merge <merge@example.com>".to_string(),
        prefs: UserPrefs::default(),
        ..Default::default()
    };
    let third_party = certify_userid(
        &other.key,
        &other.userids[0].uid,
        &signer,
        HashAlgorithm::Sha256,
        &cert,
        &mut rng,
    )
    .unwrap();
    other.userids[0].signatures.push(third_party);

    let mut merged = tkey.clone();
    merged.merge(&other).unwrap();
    assert_eq!(merged.userids[0].signatures.len(), 2);
    assert_eq!(merged.signatures, tkey.signatures);

    // merging again changes nothing
    let snapshot = merged.clone();
    merged.merge(&other).unwrap();
    assert_eq!(merged, snapshot);

    // self merge is the identity
    let mut self_merged = tkey.clone();
    self_merged.merge(&tkey).unwrap();
    assert_eq!(self_merged, tkey);

    // unrelated keys refuse to merge
    let (unrelated, _) = certified_public_key(&mut rng, 1024, "Other <other@example.com>");
    assert!(matches!(
        merged.merge(&unrelated).unwrap_err(),
        Error::BadParameters { .. }
    ));
}

#[test]
fn test_write_xfer_filters_polarity() {
    let mut rng = ChaCha8Rng::seed_from_u64(10);
    let (tkey, primary_sec, subkey_sec) = bound_subkey_key(&mut rng, 0x0C);

    // build the secret rendition of the same key
    let mut sec_tkey = tkey.clone();
    sec_tkey.key = primary_sec;
    sec_tkey.subkeys[0].subkey = subkey_sec;

    let mut ring = Keyring::new();
    let grip = ring.add_transferable_key(&sec_tkey).unwrap();

    // secret export carries the secret packets
    let mut out = Vec::new();
    ring.get_by_grip(&grip)
        .unwrap()
        .write_xfer(&mut out, Some(&ring))
        .unwrap();
    let sec_parsed = TransferableKey::from_bytes(&out).unwrap();
    assert!(sec_parsed.key.is_secret());
    assert_eq!(sec_parsed.subkeys.len(), 1);
    assert_eq!(sec_parsed.userids.len(), 1);

    // write_to skips keys of the wrong polarity
    let mut none = Vec::new();
    ring.write_to(&mut none, false).unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_find_suitable_key_walks_subkeys() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let (tkey, _, _) = bound_subkey_key(&mut rng, 0x0C);

    let mut ring = Keyring::new();
    let grip = ring.add_transferable_key(&tkey).unwrap();

    let primary = ring.get_by_grip(&grip).unwrap();
    let mut want_encrypt = pgp_keyring::types::KeyFlags::default();
    want_encrypt.set_encrypt_comms(true);

    let found = pgp_keyring::key::find_suitable_key(KeyOp::Encrypt, primary, &ring, want_encrypt)
        .unwrap()
        .expect("the encryption subkey");
    assert!(found.is_subkey());

    // primary for the subkey resolves through the binding issuer
    let null_provider = pgp_keyring::key::NullKeyProvider;
    let subkey = ring.get_by_grip(found.grip()).unwrap();
    let resolved = pgp_keyring::key::primary_for(subkey, Some(&ring), &null_provider)
        .expect("primary via issuer fingerprint");
    assert_eq!(resolved.grip(), &grip);

    // an empty usage mask is a caller error
    assert!(pgp_keyring::key::find_suitable_key(
        KeyOp::Encrypt,
        primary,
        &ring,
        pgp_keyring::types::KeyFlags::default(),
    )
    .is_err());
}

#[test]
fn test_v3_keys_are_read_only() {
    let mut rng = ChaCha8Rng::seed_from_u64(13);

    // v3 RSA keys parse, expose identifiers, but cannot gain user ids
    let v4 = gen_rsa_key(&mut rng, 1024, Tag::SecretKey);
    let (n, e) = match v4.public_params() {
        PublicParams::Rsa { n, e } => (n.clone(), e.clone()),
        _ => unreachable!(),
    };
    let v3 = KeyPacket::new(
        Tag::PublicKey,
        KeyVersion::V3,
        Utc::now().trunc_subsecs(0),
        PublicKeyAlgorithm::Rsa,
        PublicParams::Rsa { n: n.clone(), e },
        None,
    )
    .unwrap();

    assert_eq!(v3.fingerprint().unwrap().len(), 16, "v3 uses md5");
    let modulus = n.as_ref();
    assert_eq!(
        v3.key_id().unwrap().as_ref(),
        &modulus[modulus.len() - 8..],
        "v3 key id is the low modulus bits"
    );

    let mut key = Key::from_key_pkt(&v3).unwrap();
    let cert = CertInfo {
        userid: "V3 <v3@example.com>".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        key.add_userid_certified(&v4, HashAlgorithm::Sha256, &cert, &mut rng)
            .unwrap_err(),
        Error::BadParameters { .. }
    ));

    // a v3 key with a non RSA algorithm is rejected on secret parsing
    let mut dsa_v3 = KeyPacket::new(
        Tag::SecretKey,
        KeyVersion::V3,
        Utc::now().trunc_subsecs(0),
        PublicKeyAlgorithm::Dsa,
        PublicParams::Dsa {
            p: Mpi::from_slice(&[0x7F; 64]),
            q: Mpi::from_slice(&[0x7F; 20]),
            g: Mpi::from_slice(&[0x02]),
            y: Mpi::from_slice(&[0x7F; 64]),
        },
        Some(SecretParams {
            protection: SecretProtection::default(),
            sec_data: vec![0; 24],
            material: None,
        }),
    )
    .unwrap();
    assert!(matches!(
        pgp_keyring::key::decrypt_secret_key(&mut dsa_v3, None).unwrap_err(),
        Error::BadParameters { .. }
    ));
}

#[test]
fn test_bare_subkey_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(14);
    let (tkey, _, _) = bound_subkey_key(&mut rng, 0x0C);

    let bytes = tkey.subkeys[0].to_bytes().unwrap();
    let tsub = TransferableSubkey::from_bytes(&bytes).unwrap();
    assert_eq!(&tsub, &tkey.subkeys[0]);
    assert_eq!(tsub.to_bytes().unwrap(), bytes);
}

#[test]
fn test_non_primary_leading_packet_is_rejected() {
    let mut rng = ChaCha8Rng::seed_from_u64(15);
    let (tkey, _, _) = bound_subkey_key(&mut rng, 0x0C);

    // a bare subkey stream is not a transferable key
    let bytes = tkey.subkeys[0].to_bytes().unwrap();
    assert!(matches!(
        KeySequence::from_bytes(&bytes).unwrap_err(),
        Error::BadFormat { .. }
    ));
}

#[test]
fn test_add_userid_certified() {
    let mut rng = ChaCha8Rng::seed_from_u64(12);
    let seckey = gen_rsa_key(&mut rng, 1024, Tag::SecretKey);

    let tkey = TransferableKey {
        key: seckey.clone(),
        signatures: Vec::new(),
        userids: Vec::new(),
        subkeys: Vec::new(),
    };
    let mut key = Key::from_transferable(&tkey).unwrap();

    let cert = CertInfo {
        userid: "New <new@example.com>".to_string(),
        primary: true,
        key_flags: 0x03,
        ..Default::default()
    };
    key.add_userid_certified(&seckey, HashAlgorithm::Sha256, &cert, &mut rng)
        .unwrap();

    assert!(key.has_userid("New <new@example.com>"));
    assert_eq!(key.primary_uid(), Some(0));
    // the certification's key flags win over the algorithm defaults
    assert_eq!(key.key_flags().bits(), 0x03);

    // the exported transferable form verifies
    let mut out = Vec::new();
    key.write_xfer(&mut out, None).unwrap();
    let mut ring = Keyring::new();
    let reparsed = TransferableKey::from_bytes(&out).unwrap();
    let grip = ring.add_transferable_key(&reparsed).unwrap();
    ring.validate_key(&grip).unwrap();
    assert!(ring.get_by_grip(&grip).unwrap().is_valid());

    // duplicates are rejected
    let dup = CertInfo {
        userid: "New <new@example.com>".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        key.add_userid_certified(&seckey, HashAlgorithm::Sha256, &dup, &mut rng)
            .unwrap_err(),
        Error::BadParameters { .. }
    ));
}
