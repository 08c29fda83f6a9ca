use chrono::Utc;
use log::debug;

use crate::errors::{BadParametersSnafu, Result};
use crate::key::object::{Key, SubSig};
use crate::packet::SignatureType;

/// A self-signature: a certification on a primary key whose issuer
/// identifier matches the key itself, fingerprint preferred.
fn is_self_signature(key: &Key, subsig: &SubSig) -> bool {
    if key.is_subkey() || !subsig.sig.typ().is_certification() {
        return false;
    }

    if let Some(fingerprint) = subsig.sig.issuer_fingerprint() {
        return &fingerprint == key.fingerprint();
    }
    match subsig.sig.issuer() {
        Some(keyid) => &keyid == key.key_id(),
        None => false,
    }
}

fn is_key_revocation(key: &Key, subsig: &SubSig) -> bool {
    key.is_primary() && subsig.sig.typ() == SignatureType::KeyRevocation
}

fn is_subkey_binding(key: &Key, subsig: &SubSig) -> bool {
    key.is_subkey() && subsig.sig.typ() == SignatureType::SubkeyBinding
}

fn is_subkey_revocation(key: &Key, subsig: &SubSig) -> bool {
    key.is_subkey() && subsig.sig.typ() == SignatureType::SubkeyRevocation
}

impl Key {
    /// Validate a primary key: it is valid if it carries at least one
    /// verifying, unexpired self-certification (or is a secret key), unless
    /// a verifying revocation short-circuits first.
    pub fn validate_primary(&mut self) -> Result<()> {
        snafu::ensure!(
            self.is_primary(),
            BadParametersSnafu {
                message: "not a primary key".to_string(),
            }
        );

        self.valid = false;
        let now = Utc::now();
        let mut has_cert = false;

        for idx in 0..self.subsigs.len() {
            let subsig = &self.subsigs[idx];

            if is_self_signature(self, subsig) && !has_cert {
                let Some(uid) = subsig.uid.and_then(|uid| self.uids.get(uid)) else {
                    continue;
                };
                match subsig.sig.verify_certification(&self.pkt, &uid.pkt) {
                    Ok(()) => has_cert = !subsig.sig.is_expired(now),
                    Err(err) => debug!("certification did not verify: {}", err),
                }
                continue;
            }

            if is_key_revocation(self, subsig) {
                // revocation signatures cannot expire
                if subsig.sig.verify_direct(&self.pkt).is_ok() {
                    self.valid = true;
                    self.validated = true;
                    return Ok(());
                }
                debug!("key revocation did not verify");
            }
        }

        self.valid = has_cert || self.is_secret();
        self.validated = true;
        Ok(())
    }

    /// Validate a subkey against its (already validated, valid) primary: it
    /// is valid if it carries a verifying, unexpired binding signature (or
    /// both keys are secret), unless a verifying revocation short-circuits
    /// first.
    pub fn validate_subkey(&mut self, primary: &Key) -> Result<()> {
        snafu::ensure!(
            self.is_subkey(),
            BadParametersSnafu {
                message: "not a subkey".to_string(),
            }
        );

        self.valid = false;
        if !primary.is_valid() {
            return Ok(());
        }

        let now = Utc::now();
        let mut has_binding = false;

        for idx in 0..self.subsigs.len() {
            let subsig = &self.subsigs[idx];

            if is_subkey_binding(self, subsig) && !has_binding {
                match subsig.sig.verify_binding(primary.pkt(), &self.pkt) {
                    Ok(()) => has_binding = !subsig.sig.is_expired(now),
                    Err(err) => debug!("subkey binding did not verify: {}", err),
                }
                continue;
            }

            if is_subkey_revocation(self, subsig) {
                // revocation signatures cannot expire
                if subsig.sig.verify_binding(primary.pkt(), &self.pkt).is_ok() {
                    self.valid = true;
                    self.validated = true;
                    return Ok(());
                }
                debug!("subkey revocation did not verify");
            }
        }

        self.valid = has_binding || (self.is_secret() && primary.is_secret());
        self.validated = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::key::object::SubSig;
    use crate::key::object::UserPrefs;
    use crate::packet::{
        Signature, SignatureConfig, SignatureType, Subpacket, SubpacketData,
    };
    use crate::crypto::hash::HashAlgorithm;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::types::{KeyId, Mpi};

    fn dummy_subsig(typ: SignatureType, issuer: KeyId) -> SubSig {
        let mut config =
            SignatureConfig::v4(typ, PublicKeyAlgorithm::Rsa, HashAlgorithm::Sha256);
        config.unhashed_subpackets =
            vec![Subpacket::regular(SubpacketData::Issuer(issuer))];
        SubSig {
            uid: None,
            sig: Signature::from_config(config, [0, 0], vec![Mpi::from_slice(&[1])]),
            trust_level: 0,
            trust_amount: 0,
            key_flags: 0,
            prefs: UserPrefs::default(),
        }
    }

    #[test]
    fn test_classification_needs_matching_issuer() {
        use chrono::TimeZone;

        let pkt = crate::packet::KeyPacket::new(
            crate::types::Tag::PublicKey,
            crate::types::KeyVersion::V4,
            Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
            PublicKeyAlgorithm::Rsa,
            crate::packet::PublicParams::Rsa {
                n: Mpi::from_slice(&[0xAB; 128]),
                e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
            },
            None,
        )
        .unwrap();
        let key = Key::from_key_pkt(&pkt).unwrap();

        let own = dummy_subsig(SignatureType::CertPositive, *key.key_id());
        assert!(is_self_signature(&key, &own));

        let foreign = dummy_subsig(
            SignatureType::CertPositive,
            KeyId::from([9, 9, 9, 9, 9, 9, 9, 9]),
        );
        assert!(!is_self_signature(&key, &foreign));

        let revocation = dummy_subsig(SignatureType::KeyRevocation, *key.key_id());
        assert!(!is_self_signature(&key, &revocation));
        assert!(is_key_revocation(&key, &revocation));
    }
}
