use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::types::KeyFlags;

/// Available public key algorithms.
/// Ref: https://tools.ietf.org/html/rfc4880#section-9.1
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt and Sign)
    Rsa = 1,
    /// DEPRECATED: RSA (Encrypt-Only)
    RsaEncrypt = 2,
    /// DEPRECATED: RSA (Sign-Only)
    RsaSign = 3,
    /// Elgamal (Encrypt-Only)
    Elgamal = 16,
    /// DSA (Digital Signature Algorithm)
    Dsa = 17,
    /// Elliptic Curve: RFC 6637
    Ecdh = 18,
    /// ECDSA: RFC 6637
    Ecdsa = 19,
    /// DEPRECATED: Elgamal (Encrypt and Sign)
    ElgamalEncryptSign = 20,
    /// EdDSA over Curve25519
    EdDsa = 22,
    /// SM2 (Chinese national standard)
    Sm2 = 99,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl PublicKeyAlgorithm {
    pub fn is_rsa(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::Rsa | PublicKeyAlgorithm::RsaEncrypt | PublicKeyAlgorithm::RsaSign
        )
    }

    /// Default capability set of the algorithm, used to seed a key's flags
    /// before any self-signature has a say.
    pub fn capabilities(self) -> KeyFlags {
        let mut flags = KeyFlags::default();
        match self {
            PublicKeyAlgorithm::Rsa | PublicKeyAlgorithm::Sm2 => {
                flags.set_sign(true);
                flags.set_certify(true);
                flags.set_authentication(true);
                flags.set_encrypt_comms(true);
                flags.set_encrypt_storage(true);
            }
            // deprecated, but still usable
            PublicKeyAlgorithm::RsaSign => flags.set_sign(true),
            // deprecated, but still usable
            PublicKeyAlgorithm::RsaEncrypt => {
                flags.set_encrypt_comms(true);
                flags.set_encrypt_storage(true);
            }
            // no longer permitted per the RFC
            PublicKeyAlgorithm::ElgamalEncryptSign => {}
            PublicKeyAlgorithm::Dsa | PublicKeyAlgorithm::Ecdsa | PublicKeyAlgorithm::EdDsa => {
                flags.set_sign(true);
                flags.set_certify(true);
                flags.set_authentication(true);
            }
            PublicKeyAlgorithm::Ecdh | PublicKeyAlgorithm::Elgamal => {
                flags.set_encrypt_comms(true);
                flags.set_encrypt_storage(true);
            }
            PublicKeyAlgorithm::Unknown(alg) => {
                debug!("unknown pk alg: {}", alg);
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_capabilities() {
        assert_eq!(PublicKeyAlgorithm::Rsa.capabilities().bits(), 0x2F);
        assert_eq!(PublicKeyAlgorithm::RsaSign.capabilities().bits(), 0x02);
        assert_eq!(PublicKeyAlgorithm::RsaEncrypt.capabilities().bits(), 0x0C);
        assert_eq!(PublicKeyAlgorithm::Dsa.capabilities().bits(), 0x23);
        assert_eq!(PublicKeyAlgorithm::Ecdh.capabilities().bits(), 0x0C);
        assert_eq!(PublicKeyAlgorithm::Sm2.capabilities().bits(), 0x2F);
        assert!(PublicKeyAlgorithm::ElgamalEncryptSign
            .capabilities()
            .is_empty());
        assert!(PublicKeyAlgorithm::Unknown(111).capabilities().is_empty());
    }
}
