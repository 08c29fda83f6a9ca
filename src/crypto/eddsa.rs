use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::errors::Result;
use crate::types::Mpi;

const POINT_SIZE: usize = 32;

fn left_pad(out: &mut [u8], value: &[u8]) -> Result<()> {
    ensure!(value.len() <= out.len(), "eddsa value too large");
    let start = out.len() - value.len();
    out[start..].copy_from_slice(value);
    Ok(())
}

/// Verify an EdDSA signature over Curve25519.
///
/// The public point carries the 0x40 native-encoding prefix, the signature
/// is split into its `r` and `s` halves as MPIs.
pub fn verify(point: &Mpi, digest: &[u8], r: &Mpi, s: &Mpi) -> Result<()> {
    let point = point.as_ref();
    ensure!(
        point.len() == POINT_SIZE + 1 && point[0] == 0x40,
        "invalid eddsa public point encoding"
    );

    let mut key_raw = [0u8; POINT_SIZE];
    key_raw.copy_from_slice(&point[1..]);
    let key = VerifyingKey::from_bytes(&key_raw)?;

    let mut sig_raw = [0u8; 2 * POINT_SIZE];
    left_pad(&mut sig_raw[..POINT_SIZE], r.as_ref())?;
    left_pad(&mut sig_raw[POINT_SIZE..], s.as_ref())?;

    key.verify(digest, &Signature::from_bytes(&sig_raw))?;

    Ok(())
}

/// Sign the digest with an EdDSA secret scalar.
pub fn sign(x: &Mpi, digest: &[u8]) -> Result<Vec<Mpi>> {
    let mut secret = [0u8; POINT_SIZE];
    left_pad(&mut secret, x.as_ref())?;

    let key = SigningKey::from_bytes(&secret);
    let sig = key.sign(digest).to_bytes();

    Ok(vec![
        Mpi::from_slice(&sig[..POINT_SIZE]),
        Mpi::from_slice(&sig[POINT_SIZE..]),
    ])
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_sign_verify() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let secret: [u8; 32] = rng.gen();
        let key = SigningKey::from_bytes(&secret);

        let mut point = vec![0x40];
        point.extend_from_slice(key.verifying_key().as_bytes());
        let point = Mpi::from_slice(&point);

        let digest = [0xabu8; 32];
        let sig = sign(&Mpi::from_slice(&secret), &digest).unwrap();
        assert_eq!(sig.len(), 2);

        verify(&point, &digest, &sig[0], &sig[1]).unwrap();
        assert!(verify(&point, &[0xacu8; 32], &sig[0], &sig[1]).is_err());
    }
}
