use sha1::{Digest, Sha1};

use crate::errors::{Error, Result};

pub const SHA1_TAIL_SIZE: usize = 20;

/// Two octet checksum: sum of all octets mod 65536.
#[inline]
pub fn calculate_simple(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u32, |acc, v| (acc + u32::from(*v)) & 0xffff) as u16
}

/// Verify the trailing two-octet checksum over `data`.
#[inline]
pub fn simple(actual: &[u8], data: &[u8]) -> Result<()> {
    let expected = calculate_simple(data);
    if actual[..2] != expected.to_be_bytes()[..] {
        return Err(Error::DecryptFailed);
    }

    Ok(())
}

/// SHA1 integrity tail over the secret key data, first 20 octets.
#[inline]
pub fn calculate_sha1(data: &[u8]) -> [u8; SHA1_TAIL_SIZE] {
    let mut digest = Sha1::new();
    digest.update(data);
    digest.finalize().into()
}

/// Verify the trailing SHA1 hash over `data`.
#[inline]
pub fn sha1(actual: &[u8], data: &[u8]) -> Result<()> {
    let expected = calculate_sha1(data);
    if actual[..SHA1_TAIL_SIZE] != expected[..] {
        return Err(Error::DecryptFailed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_simple_checksum() {
        assert_eq!(calculate_simple(&[]), 0);
        assert_eq!(calculate_simple(&[0x01, 0x02]), 3);
        // wraps mod 65536
        assert_eq!(calculate_simple(&[0xff; 258]), ((0xffu32 * 258) % 65536) as u16);

        let sum = calculate_simple(b"abc").to_be_bytes();
        assert!(simple(&sum, b"abc").is_ok());
        assert!(simple(&sum, b"abd").is_err());
    }

    #[test]
    fn test_sha1_tail() {
        let tail = calculate_sha1(b"secret mpis");
        assert!(sha1(&tail, b"secret mpis").is_ok());
        assert!(sha1(&tail, b"secret mpis!").is_err());
    }
}
