use std::io;

use log::{debug, warn};
use rand::{CryptoRng, Rng};
use smallvec::SmallVec;

use crate::composed::{TransferableKey, TransferableSubkey, TransferableUserId};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::s2k::{self, S2kUsage, StringToKey};
use crate::crypto::sym::{CipherMode, SymmetricKeyAlgorithm};
use crate::errors::{BadParametersSnafu, BadStateSnafu, Error, Result};
use crate::key::protect::{decrypt_secret_key, encrypt_secret_key};
use crate::key::provider::{
    KeyOp, KeyProvider, KeyRequest, KeySearch, PasswordCtx, PasswordProvider, SecretKeyCodec,
};
use crate::key::store::Keyring;
use crate::packet::{
    packet_to_raw, KeyPacket, RevocationCode, Signature, SignatureType, UserIdPacket,
};
use crate::types::{
    CompressionAlgorithm, Fingerprint, KeyFlags, KeyGrip, KeyId, KeyStoreFormat, Password,
    RawPacket, Tag,
};

/// Default wall clock target for tuning S2K iterations, in milliseconds.
const DEFAULT_S2K_MSEC: u32 = 150;

/// Preference subpacket data denormalised from a signature at ingest time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPrefs {
    pub symm_algs: SmallVec<[SymmetricKeyAlgorithm; 8]>,
    pub hash_algs: SmallVec<[HashAlgorithm; 8]>,
    pub z_algs: SmallVec<[CompressionAlgorithm; 8]>,
    pub ks_prefs: SmallVec<[u8; 4]>,
    pub key_server: Option<String>,
}

/// A signature attached to a key, with the fields consumers ask for most
/// cached at ingest time.
#[derive(Debug, Clone)]
pub struct SubSig {
    /// Index of the user id this signature certifies, if any was present.
    pub uid: Option<usize>,
    pub sig: Signature,
    pub trust_level: u8,
    pub trust_amount: u8,
    /// Raw key flags octet carried by the signature, 0 when absent.
    pub key_flags: u8,
    pub prefs: UserPrefs,
}

/// A revocation, denormalised from a revocation-reason subpacket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revocation {
    /// The revoked user id; `None` for a whole-key revocation.
    pub uid: Option<usize>,
    pub code: RevocationCode,
    /// Never empty: filled from the code's canonical description when the
    /// packet carries no text.
    pub reason: String,
}

/// A user identity held by a key, with its denormalised textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUserId {
    pub pkt: UserIdPacket,
    pub name: String,
}

/// Tunables for password based protection; unset fields fall back to the
/// defaults (AES-256, CFB, SHA-256, wall clock tuned iterations).
#[derive(Debug, Clone, Default)]
pub struct ProtectionParams {
    pub sym_alg: Option<SymmetricKeyAlgorithm>,
    pub cipher_mode: Option<CipherMode>,
    pub hash_alg: Option<HashAlgorithm>,
    pub iterations: Option<u32>,
}

/// Metadata for a self-certification of a user id.
#[derive(Debug, Clone, Default)]
pub struct CertInfo {
    pub userid: String,
    /// Key expiration in seconds after key creation; 0 for none.
    pub key_expiration: u32,
    /// Raw key flags octet; 0 to omit.
    pub key_flags: u8,
    /// Mark the certified user id as the primary one.
    pub primary: bool,
    pub prefs: UserPrefs,
}

/// Metadata for a subkey binding signature.
#[derive(Debug, Clone, Default)]
pub struct BindingInfo {
    pub key_expiration: u32,
    pub key_flags: u8,
}

/// The curated, keyring facing form of a key: the parsed packet, the raw
/// packets it arrived in, its identities, ingested signatures, revocations,
/// derived identifiers, and grip links to its primary or subkeys.
#[derive(Debug, Clone)]
pub struct Key {
    pub(crate) pkt: KeyPacket,
    /// Authoritative wire form; index 0 is the key packet itself and is
    /// rewritten when the secret portion changes.
    pub(crate) rawpackets: Vec<RawPacket>,
    pub(crate) uids: Vec<KeyUserId>,
    pub(crate) subsigs: Vec<SubSig>,
    pub(crate) revokes: Vec<Revocation>,
    pub(crate) revocation: Option<Revocation>,
    pub(crate) revoked: bool,
    pub(crate) uid0: Option<usize>,
    /// Key expiration in seconds after creation; 0 for none.
    pub(crate) expiration: u32,
    pub(crate) key_flags: KeyFlags,
    pub(crate) keyid: KeyId,
    pub(crate) fingerprint: Fingerprint,
    pub(crate) grip: KeyGrip,
    pub(crate) primary_grip: Option<KeyGrip>,
    pub(crate) subkey_grips: Vec<KeyGrip>,
    pub(crate) format: KeyStoreFormat,
    pub(crate) valid: bool,
    pub(crate) validated: bool,
}

impl Key {
    /// Build the curated key from a bare key packet: parse cleartext secret
    /// material eagerly, compute the derived identifiers (failing hard), and
    /// seed the key flags from the algorithm's capabilities.
    pub fn from_key_pkt(pkt: &KeyPacket) -> Result<Key> {
        let mut keypkt = pkt.clone();

        if keypkt.is_secret() && !keypkt.is_encrypted() {
            decrypt_secret_key(&mut keypkt, None)?;
        }

        let keyid = keypkt.key_id()?;
        let fingerprint = keypkt.fingerprint()?;
        let grip = keypkt.grip()?;
        let key_flags = keypkt.algorithm().capabilities();
        let rawpacket = packet_to_raw(pkt)?;

        Ok(Key {
            pkt: keypkt,
            rawpackets: vec![rawpacket],
            uids: Vec::new(),
            subsigs: Vec::new(),
            revokes: Vec::new(),
            revocation: None,
            revoked: false,
            uid0: None,
            expiration: 0,
            key_flags,
            keyid,
            fingerprint,
            grip,
            primary_grip: None,
            subkey_grips: Vec::new(),
            format: KeyStoreFormat::Gpg,
            valid: false,
            validated: false,
        })
    }

    /// Build a key from a foreign-format secret key blob through the
    /// injected codec. The blob itself stays the authoritative on-disk form
    /// in raw packet index 0.
    pub fn from_g10(data: &[u8], codec: &dyn SecretKeyCodec) -> Result<Key> {
        let pkt = codec.parse_seckey(data)?;
        let mut key = Key::from_key_pkt(&pkt)?;
        key.rawpackets[0] = RawPacket {
            tag: key.pkt.tag(),
            data: data.to_vec(),
        };
        key.format = KeyStoreFormat::G10;
        Ok(key)
    }

    /// Canonicalise a transferable key: direct-key signatures first, then
    /// each user id with its signatures, in wire order.
    pub fn from_transferable(tkey: &TransferableKey) -> Result<Key> {
        let mut key = Key::from_key_pkt(&tkey.key)?;

        for sig in &tkey.signatures {
            key.add_signature(sig)?;
        }

        for uid in &tkey.userids {
            key.add_transferable_userid(uid)?;
        }

        Ok(key)
    }

    /// Canonicalise a bare subkey, linking the grips when the primary is
    /// known.
    pub fn from_transferable_subkey(
        tskey: &TransferableSubkey,
        primary: Option<&mut Key>,
    ) -> Result<Key> {
        let mut subkey = Key::from_key_pkt(&tskey.subkey)?;

        for sig in &tskey.signatures {
            subkey.add_signature(sig)?;
        }

        if let Some(primary) = primary {
            primary.link_subkey_grip(&mut subkey);
        }

        Ok(subkey)
    }

    pub(crate) fn link_subkey_grip(&mut self, subkey: &mut Key) {
        if !self.subkey_grips.contains(&subkey.grip) {
            self.subkey_grips.push(subkey.grip);
        }
        subkey.primary_grip = Some(self.grip);
    }

    /// Ingest one signature: record its raw packet and cache the fields
    /// consumers want. Later signatures overwrite earlier denormalised
    /// values.
    pub fn add_signature(&mut self, sig: &Signature) -> Result<()> {
        self.rawpackets.push(packet_to_raw(sig)?);

        let uid = self.uids.len().checked_sub(1);
        let mut subsig = SubSig {
            uid,
            sig: sig.clone(),
            trust_level: 0,
            trust_amount: 0,
            key_flags: 0,
            prefs: UserPrefs::default(),
        };

        if let Some(expiration) = sig.key_expiration() {
            self.expiration = expiration;
        }
        if let Some((level, amount)) = sig.trust_signature() {
            subsig.trust_level = level;
            subsig.trust_amount = amount;
        }
        if sig.is_primary() {
            self.uid0 = uid;
        }

        subsig.prefs.symm_algs = SmallVec::from_slice(sig.preferred_symmetric_algs());
        subsig.prefs.hash_algs = SmallVec::from_slice(sig.preferred_hash_algs());
        subsig.prefs.z_algs = SmallVec::from_slice(sig.preferred_compression_algs());

        if let Some(flags) = sig.key_flags() {
            subsig.key_flags = flags;
            self.key_flags = KeyFlags::from_bits(flags);
        }
        let ks_prefs = sig.key_server_prefs();
        if !ks_prefs.is_empty() {
            subsig.prefs.ks_prefs = SmallVec::from_slice(&ks_prefs[..1]);
        }
        if let Some(server) = sig.preferred_key_server() {
            subsig.prefs.key_server = Some(server);
        }

        if let Some((code, reason_raw)) = sig.revocation_reason() {
            let mut reason = String::from_utf8_lossy(reason_raw).into_owned();
            if reason.is_empty() {
                reason = code.description().to_string();
            }
            if self.uids.is_empty() {
                // no user ids yet: the whole key is revoked
                self.revoked = true;
                self.revocation = Some(Revocation {
                    uid: None,
                    code,
                    reason,
                });
            } else {
                self.revokes.push(Revocation {
                    uid: Some(self.uids.len() - 1),
                    code,
                    reason,
                });
            }
        }

        self.subsigs.push(subsig);
        Ok(())
    }

    pub fn add_transferable_userid(&mut self, uid: &TransferableUserId) -> Result<()> {
        self.rawpackets.push(packet_to_raw(&uid.uid)?);
        self.uids.push(KeyUserId {
            pkt: uid.uid.clone(),
            name: uid.uid.display_name(),
        });

        for sig in &uid.signatures {
            self.add_signature(sig)?;
        }

        Ok(())
    }

    // accessors

    pub fn pkt(&self) -> &KeyPacket {
        &self.pkt
    }

    pub fn grip(&self) -> &KeyGrip {
        &self.grip
    }

    pub fn key_id(&self) -> &KeyId {
        &self.keyid
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn key_flags(&self) -> KeyFlags {
        self.key_flags
    }

    /// Key expiration in seconds after creation; 0 for none.
    pub fn expiration(&self) -> u32 {
        self.expiration
    }

    pub fn format(&self) -> KeyStoreFormat {
        self.format
    }

    pub fn is_secret(&self) -> bool {
        self.pkt.is_secret()
    }

    pub fn is_public(&self) -> bool {
        !self.is_secret()
    }

    pub fn is_subkey(&self) -> bool {
        self.pkt.is_subkey()
    }

    pub fn is_primary(&self) -> bool {
        !self.is_subkey()
    }

    /// A secret key whose cleartext MPIs are not currently parsed.
    pub fn is_locked(&self) -> bool {
        self.is_secret() && !self.pkt.has_secret_material()
    }

    /// A secret key whose secret data region is password protected.
    pub fn is_protected(&self) -> bool {
        self.pkt.is_encrypted()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn can_sign(&self) -> bool {
        self.key_flags.sign()
    }

    pub fn can_certify(&self) -> bool {
        self.key_flags.certify()
    }

    pub fn can_encrypt(&self) -> bool {
        self.key_flags.encrypt()
    }

    pub fn primary_grip(&self) -> Option<&KeyGrip> {
        self.primary_grip.as_ref()
    }

    pub fn subkey_grips(&self) -> &[KeyGrip] {
        &self.subkey_grips
    }

    pub fn uids(&self) -> &[KeyUserId] {
        &self.uids
    }

    pub fn primary_uid(&self) -> Option<usize> {
        self.uid0
    }

    pub fn subsigs(&self) -> &[SubSig] {
        &self.subsigs
    }

    pub fn revocations(&self) -> &[Revocation] {
        &self.revokes
    }

    pub fn key_revocation(&self) -> Option<&Revocation> {
        self.revocation.as_ref()
    }

    pub fn rawpackets(&self) -> &[RawPacket] {
        &self.rawpackets
    }

    pub fn has_userid(&self, id: &str) -> bool {
        self.uids.iter().any(|uid| uid.name == id)
    }

    /// Decrypt a copy of the secret key packet, prompting through the
    /// password provider when the key is protected.
    pub fn decrypt_seckey(
        &self,
        provider: &dyn PasswordProvider,
        op: KeyOp,
    ) -> Result<KeyPacket> {
        snafu::ensure!(
            self.is_secret(),
            BadParametersSnafu {
                message: "key is not a secret key".to_string(),
            }
        );

        let mut pkt = self.pkt.clone();
        let password = if pkt.is_encrypted() {
            let ctx = PasswordCtx { op, key: self };
            Some(
                provider
                    .get(&ctx)?
                    .ok_or_else(|| format_err!("password request was cancelled"))?,
            )
        } else {
            None
        };

        decrypt_secret_key(&mut pkt, password.as_ref())?;
        Ok(pkt)
    }

    /// Clear the parsed secret MPIs; the secret data region is untouched.
    pub fn lock(&mut self) -> Result<()> {
        snafu::ensure!(
            self.is_secret(),
            BadParametersSnafu {
                message: "cannot lock a public key".to_string(),
            }
        );

        self.pkt.forget_secret_material();
        Ok(())
    }

    /// Re-parse (decrypting if needed) the secret MPIs. Unlocking an
    /// unprotected key succeeds without prompting.
    pub fn unlock(&mut self, provider: &dyn PasswordProvider) -> Result<()> {
        snafu::ensure!(
            self.is_secret(),
            BadParametersSnafu {
                message: "key is not a secret key".to_string(),
            }
        );

        if !self.is_locked() {
            return Ok(());
        }

        let mut decrypted = self.decrypt_seckey(provider, KeyOp::Unlock)?;
        self.pkt.forget_secret_material();
        self.pkt.secret_mut().expect("secret key").material =
            decrypted.secret_mut().expect("secret key").material.take();

        Ok(())
    }

    /// Serialize (and for the PGP formats encrypt) `seckey` into raw packet
    /// index 0, the authoritative on-disk form.
    fn write_key_to_rawpacket<R: CryptoRng + Rng>(
        &mut self,
        mut seckey: KeyPacket,
        format: KeyStoreFormat,
        password: Option<&Password>,
        rng: &mut R,
        g10: Option<&dyn SecretKeyCodec>,
    ) -> Result<KeyPacket> {
        let data = match format {
            KeyStoreFormat::Gpg | KeyStoreFormat::Kbx => {
                encrypt_secret_key(&mut seckey, password, rng)?;
                packet_to_raw(&seckey)?.data
            }
            KeyStoreFormat::G10 => g10
                .ok_or_else(|| Error::BadParameters {
                    message: "G10 format requires an injected secret key codec".to_string(),
                })?
                .write_seckey(&seckey, password)?,
        };

        self.rawpackets[0] = RawPacket {
            tag: self.pkt.tag(),
            data,
        };

        Ok(seckey)
    }

    /// Protect the secret material with a new password, forcing the
    /// iterated-and-salted SHA1-checked encoding and rewriting raw packet
    /// index 0 in the chosen format. The key is left locked.
    pub fn protect<R: CryptoRng + Rng>(
        &mut self,
        decrypted: KeyPacket,
        format: KeyStoreFormat,
        params: Option<ProtectionParams>,
        new_password: &Password,
        rng: &mut R,
        g10: Option<&dyn SecretKeyCodec>,
    ) -> Result<()> {
        snafu::ensure!(
            self.is_secret(),
            BadParametersSnafu {
                message: "this is not a secret key".to_string(),
            }
        );
        snafu::ensure!(
            decrypted.has_secret_material(),
            BadParametersSnafu {
                message: "decrypted secret key must be provided".to_string(),
            }
        );

        let params = params.unwrap_or_default();
        let sym_alg = params.sym_alg.unwrap_or(SymmetricKeyAlgorithm::Aes256);
        let cipher_mode = params.cipher_mode.unwrap_or(CipherMode::Cfb);
        let hash_alg = params.hash_alg.unwrap_or(HashAlgorithm::Sha256);
        let iterations = match params.iterations {
            Some(iterations) if iterations > 0 => s2k::round_iterations(iterations),
            _ => s2k::compute_iterations(hash_alg, DEFAULT_S2K_MSEC)?,
        };

        let mut seckey = decrypted;
        {
            let protection = &mut seckey.secret_mut().expect("checked above").protection;
            // the only method we produce
            protection.usage = S2kUsage::EncryptedAndHashed;
            protection.sym_alg = sym_alg;
            protection.cipher_mode = cipher_mode;
            protection.s2k = StringToKey::new_iterated(
                rng,
                hash_alg,
                s2k::encode_iterations(iterations),
            );
        }

        let rewritten =
            self.write_key_to_rawpacket(seckey, format, Some(new_password), rng, g10)?;

        self.pkt = rewritten;
        self.pkt.forget_secret_material();
        self.format = format;
        Ok(())
    }

    /// Remove password protection: rewrite raw packet index 0 in cleartext
    /// and leave the key unprotected but locked.
    pub fn unprotect<R: CryptoRng + Rng>(
        &mut self,
        provider: &dyn PasswordProvider,
        rng: &mut R,
        g10: Option<&dyn SecretKeyCodec>,
    ) -> Result<()> {
        snafu::ensure!(
            self.is_secret(),
            BadParametersSnafu {
                message: "this is not a secret key".to_string(),
            }
        );

        if !self.is_protected() {
            return Ok(());
        }

        let mut decrypted = if self.pkt.has_secret_material() {
            self.pkt.clone()
        } else {
            self.decrypt_seckey(provider, KeyOp::Unprotect)?
        };
        decrypted.secret_mut().expect("secret key").protection.usage = S2kUsage::None;

        let format = self.format;
        let rewritten = self.write_key_to_rawpacket(decrypted, format, None, rng, g10)?;

        self.pkt = rewritten;
        self.pkt.forget_secret_material();
        Ok(())
    }

    /// Add a user id certified by a fresh positive self-signature.
    pub fn add_userid_certified<R: CryptoRng + Rng>(
        &mut self,
        signer_seckey: &KeyPacket,
        hash_alg: HashAlgorithm,
        cert: &CertInfo,
        rng: &mut R,
    ) -> Result<()> {
        snafu::ensure!(
            !cert.userid.is_empty(),
            BadParametersSnafu {
                message: "empty user id".to_string(),
            }
        );
        snafu::ensure!(
            self.is_primary(),
            BadParametersSnafu {
                message: "cannot add a userid to a subkey".to_string(),
            }
        );
        snafu::ensure!(
            !self.has_userid(&cert.userid),
            BadParametersSnafu {
                message: "key already has this userid".to_string(),
            }
        );
        snafu::ensure!(
            self.format != KeyStoreFormat::G10,
            BadParametersSnafu {
                message: "unsupported key store format".to_string(),
            }
        );
        snafu::ensure!(
            !matches!(
                self.pkt.version(),
                crate::types::KeyVersion::V2 | crate::types::KeyVersion::V3
            ),
            BadParametersSnafu {
                message: "adding a userid to a v2/v3 key is not supported".to_string(),
            }
        );
        snafu::ensure!(
            !(self.uid0.is_some() && cert.primary),
            BadParametersSnafu {
                message: "changing the primary userid is not supported".to_string(),
            }
        );

        let mut uid = TransferableUserId {
            uid: UserIdPacket::from_str(&cert.userid),
            signatures: Vec::new(),
        };
        let sig =
            crate::key::certify::certify_userid(&self.pkt, &uid.uid, signer_seckey, hash_alg, cert, rng)?;
        uid.signatures.push(sig);

        self.add_transferable_userid(&uid)
    }

    /// Emit the key's raw packets, unfiltered.
    pub fn write_packets<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        snafu::ensure!(
            !self.rawpackets.is_empty(),
            BadStateSnafu {
                message: "key has no raw packets".to_string(),
            }
        );
        for pkt in &self.rawpackets {
            writer.write_all(&pkt.data)?;
        }
        Ok(())
    }

    fn write_xfer_packets<W: io::Write>(
        &self,
        writer: &mut W,
        keyring: Option<&Keyring>,
        secret: bool,
    ) -> Result<()> {
        for pkt in &self.rawpackets {
            if !packet_matches(pkt.tag, secret) {
                debug!("skipping packet with tag {:?}", pkt.tag);
                continue;
            }
            writer.write_all(&pkt.data)?;
        }

        let Some(keyring) = keyring else {
            return Ok(());
        };

        for grip in &self.subkey_grips {
            let subkey = keyring.get_by_grip(grip).ok_or_else(|| Error::BadState {
                message: format!("subkey {} not present in keyring", grip),
            })?;
            subkey.write_xfer_packets(writer, None, secret)?;
        }

        Ok(())
    }

    /// Emit the transferable form of the key: raw packets filtered by the
    /// key's polarity, followed by each linked subkey when a keyring is
    /// supplied.
    pub fn write_xfer<W: io::Write>(&self, writer: &mut W, keyring: Option<&Keyring>) -> Result<()> {
        snafu::ensure!(
            !self.rawpackets.is_empty(),
            BadStateSnafu {
                message: "key has no raw packets".to_string(),
            }
        );
        self.write_xfer_packets(writer, keyring, self.is_secret())
    }
}

/// Which raw packets belong in a transferable key of the given polarity.
fn packet_matches(tag: Tag, secret: bool) -> bool {
    match tag {
        Tag::Signature | Tag::UserId | Tag::UserAttribute => true,
        Tag::PublicKey | Tag::PublicSubkey => !secret,
        Tag::SecretKey | Tag::SecretSubkey => secret,
        _ => false,
    }
}

/// Return `key` if it covers all bits of `desired_usage`, otherwise the
/// first of its subkeys (resolved through the provider) that does.
pub fn find_suitable_key<'a>(
    op: KeyOp,
    key: &'a Key,
    provider: &'a dyn KeyProvider,
    desired_usage: KeyFlags,
) -> Result<Option<&'a Key>> {
    snafu::ensure!(
        !desired_usage.is_empty(),
        BadParametersSnafu {
            message: "desired usage must not be empty".to_string(),
        }
    );

    if key.key_flags().intersects(desired_usage) {
        return Ok(Some(key));
    }

    for grip in key.subkey_grips() {
        let req = KeyRequest {
            op,
            secret: key.is_secret(),
            search: KeySearch::Grip(*grip),
        };
        if let Some(subkey) = provider.request(&req) {
            if subkey.key_flags().intersects(desired_usage) {
                return Ok(Some(subkey));
            }
        }
    }

    Ok(None)
}

fn get_subkey_binding(subkey: &Key) -> Option<&Signature> {
    subkey
        .subsigs()
        .iter()
        .map(|subsig| &subsig.sig)
        .find(|sig| sig.typ() == SignatureType::SubkeyBinding)
}

fn find_signer<'a>(
    sig: &Signature,
    store: Option<&'a Keyring>,
    provider: &'a dyn KeyProvider,
    secret: bool,
) -> Option<&'a Key> {
    // prefer the issuer fingerprint when available
    if let Some(fingerprint) = sig.issuer_fingerprint() {
        let search = KeySearch::Fingerprint(fingerprint);
        if let Some(key) = store.and_then(|s| s.search(&search)) {
            if key.is_secret() == secret {
                return Some(key);
            }
        }
        let req = KeyRequest {
            op: KeyOp::MergeInfo,
            secret,
            search,
        };
        if let Some(key) = provider.request(&req) {
            return Some(key);
        }
    }

    if let Some(keyid) = sig.issuer() {
        let search = KeySearch::KeyId(keyid);
        if let Some(key) = store.and_then(|s| s.search(&search)) {
            if key.is_secret() == secret {
                return Some(key);
            }
        }
        let req = KeyRequest {
            op: KeyOp::MergeInfo,
            secret,
            search,
        };
        if let Some(key) = provider.request(&req) {
            return Some(key);
        }
    }

    None
}

/// Locate the primary key for a subkey through the issuer information on
/// its binding signature, searching the store first and falling back to the
/// key provider.
pub fn primary_for<'a>(
    subkey: &Key,
    store: Option<&'a Keyring>,
    provider: &'a dyn KeyProvider,
) -> Option<&'a Key> {
    let Some(binding) = get_subkey_binding(subkey) else {
        warn!("missing subkey binding signature for key");
        return None;
    };

    if binding.issuer_fingerprint().is_none() && binding.issuer().is_none() {
        warn!("no issuer information in subkey binding signature");
        return None;
    }

    find_signer(binding, store, provider, subkey.is_secret())
}
