use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;
use crate::types::Mpi;

fn pkcs1v15(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    Ok(match hash {
        HashAlgorithm::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Ripemd160 => Pkcs1v15Sign::new::<ripemd::Ripemd160>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        _ => unsupported_err!("no PKCS1v15 prefix for hash {:?}", hash),
    })
}

/// Verify a RSA, PKCS1v15 padded signature.
pub fn verify(n: &Mpi, e: &Mpi, hash: HashAlgorithm, hashed: &[u8], sig: &Mpi) -> Result<()> {
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(n.as_ref()),
        BigUint::from_bytes_be(e.as_ref()),
    )?;

    // the signature MPI is stored without leading zeros, the crate wants
    // exactly modulus-sized input
    let sig_raw = sig.as_ref();
    ensure!(sig_raw.len() <= key.size(), "signature larger than modulus");
    let mut padded = vec![0u8; key.size()];
    padded[key.size() - sig_raw.len()..].copy_from_slice(sig_raw);

    key.verify(pkcs1v15(hash)?, hashed, &padded)?;

    Ok(())
}

/// Sign using RSA, with PKCS1v15 padding.
#[allow(clippy::many_single_char_names)]
pub fn sign(
    n: &Mpi,
    e: &Mpi,
    d: &Mpi,
    p: &Mpi,
    q: &Mpi,
    hash: HashAlgorithm,
    digest: &[u8],
) -> Result<Vec<Mpi>> {
    let key = RsaPrivateKey::from_components(
        BigUint::from_bytes_be(n.as_ref()),
        BigUint::from_bytes_be(e.as_ref()),
        BigUint::from_bytes_be(d.as_ref()),
        vec![
            BigUint::from_bytes_be(p.as_ref()),
            BigUint::from_bytes_be(q.as_ref()),
        ],
    )?;
    key.validate()?;

    let sig = key.sign(pkcs1v15(hash)?, digest)?;

    Ok(vec![Mpi::from_slice(&sig)])
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rsa::traits::PrivateKeyParts;

    use super::*;

    #[test]
    fn test_sign_verify() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();

        let n = Mpi::from_slice(&key.n().to_bytes_be());
        let e = Mpi::from_slice(&key.e().to_bytes_be());
        let d = Mpi::from_slice(&key.d().to_bytes_be());
        let p = Mpi::from_slice(&key.primes()[0].to_bytes_be());
        let q = Mpi::from_slice(&key.primes()[1].to_bytes_be());

        let digest = HashAlgorithm::Sha256.digest(b"hello").unwrap();
        let sig = sign(&n, &e, &d, &p, &q, HashAlgorithm::Sha256, &digest).unwrap();
        assert_eq!(sig.len(), 1);

        verify(&n, &e, HashAlgorithm::Sha256, &digest, &sig[0]).unwrap();

        let other = HashAlgorithm::Sha256.digest(b"tampered").unwrap();
        assert!(verify(&n, &e, HashAlgorithm::Sha256, &other, &sig[0]).is_err());
    }
}
