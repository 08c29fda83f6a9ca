use crate::crypto::hash::HashAlgorithm;

/// Named elliptic curves referenced by OID in key material.
/// Ref: https://tools.ietf.org/html/rfc6637#section-11
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum EccCurve {
    Curve25519,
    Ed25519,
    NistP256,
    NistP384,
    NistP521,
    Secp256k1,
    BrainpoolP256,
    BrainpoolP384,
    BrainpoolP512,
    Sm2P256,
    Unknown(Vec<u8>),
}

impl EccCurve {
    pub fn oid(&self) -> &[u8] {
        match self {
            EccCurve::Curve25519 => &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x05, 0x01],
            EccCurve::Ed25519 => &[0x2B, 0x06, 0x01, 0x04, 0x01, 0xDA, 0x47, 0x0F, 0x01],
            EccCurve::NistP256 => &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
            EccCurve::NistP384 => &[0x2B, 0x81, 0x04, 0x00, 0x22],
            EccCurve::NistP521 => &[0x2B, 0x81, 0x04, 0x00, 0x23],
            EccCurve::Secp256k1 => &[0x2B, 0x81, 0x04, 0x00, 0x0A],
            EccCurve::BrainpoolP256 => &[0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x07],
            EccCurve::BrainpoolP384 => &[0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0B],
            EccCurve::BrainpoolP512 => &[0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0D],
            EccCurve::Sm2P256 => &[0x2A, 0x81, 0x1C, 0xCF, 0x55, 0x01, 0x82, 0x2D],
            EccCurve::Unknown(oid) => oid,
        }
    }

    pub fn from_oid(oid: &[u8]) -> EccCurve {
        for curve in [
            EccCurve::Curve25519,
            EccCurve::Ed25519,
            EccCurve::NistP256,
            EccCurve::NistP384,
            EccCurve::NistP521,
            EccCurve::Secp256k1,
            EccCurve::BrainpoolP256,
            EccCurve::BrainpoolP384,
            EccCurve::BrainpoolP512,
            EccCurve::Sm2P256,
        ] {
            if curve.oid() == oid {
                return curve;
            }
        }
        EccCurve::Unknown(oid.to_vec())
    }

    /// Weakest hash acceptable for an ECDSA signature over this curve.
    pub fn min_hash(&self) -> HashAlgorithm {
        match self {
            EccCurve::NistP256
            | EccCurve::Secp256k1
            | EccCurve::BrainpoolP256
            | EccCurve::Sm2P256 => HashAlgorithm::Sha256,
            EccCurve::NistP384 | EccCurve::BrainpoolP384 => HashAlgorithm::Sha384,
            _ => HashAlgorithm::Sha512,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_oid_roundtrip() {
        for curve in [
            EccCurve::Curve25519,
            EccCurve::Ed25519,
            EccCurve::NistP256,
            EccCurve::NistP384,
            EccCurve::NistP521,
        ] {
            assert_eq!(EccCurve::from_oid(curve.oid()), curve);
        }
        assert_eq!(
            EccCurve::from_oid(&[0x01, 0x02]),
            EccCurve::Unknown(vec![0x01, 0x02])
        );
    }

    #[test]
    fn test_min_hash() {
        assert_eq!(EccCurve::NistP256.min_hash(), HashAlgorithm::Sha256);
        assert_eq!(EccCurve::NistP384.min_hash(), HashAlgorithm::Sha384);
        assert_eq!(EccCurve::NistP521.min_hash(), HashAlgorithm::Sha512);
    }
}
