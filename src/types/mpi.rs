use std::{fmt, io};

use byteorder::{BigEndian, WriteBytesExt};
use zeroize::Zeroize;

use crate::errors::{BadFormatSnafu, Result};
use crate::parsing::ByteReader;
use crate::ser::Serialize;

/// Number of bits we accept when reading or writing MPIs.
/// The value is the same as gnupgs.
const MAX_EXTERN_MPI_BITS: u16 = 16384;

/// An owned multiprecision integer.
///
/// The inner value is stored without leading zero octets and is ready to be
/// serialized with its bit-length prefix.
///
/// Ref: <https://tools.ietf.org/html/rfc4880#section-3.2>
#[derive(Default, Clone, PartialEq, Eq, Zeroize)]
pub struct Mpi(Vec<u8>);

impl Mpi {
    /// Represent the data in `raw` as an Mpi, stripping leading zeros.
    /// `raw` is not expected to be length-prefixed.
    pub fn from_slice(raw: &[u8]) -> Self {
        Mpi(strip_leading_zeros(raw).to_vec())
    }

    /// Parses a length-prefixed MPI.
    pub fn try_from_reader(i: &mut ByteReader<'_>) -> Result<Self> {
        let len_bits = i.read_be_u16()?;
        snafu::ensure!(
            len_bits <= MAX_EXTERN_MPI_BITS,
            BadFormatSnafu {
                message: format!("mpi too large: {} bits", len_bits),
            }
        );

        let len_bytes = usize::from((len_bits + 7) >> 3);
        let n = i.take(len_bytes)?;

        Ok(Mpi(strip_leading_zeros(n).to_vec()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of significant bits.
    pub fn bits(&self) -> usize {
        bit_size(&self.0)
    }
}

/// Returns the bit length of a given slice, ignoring leading zeros.
#[inline]
fn bit_size(val: &[u8]) -> usize {
    if val.is_empty() {
        0
    } else {
        (val.len() * 8) - val[0].leading_zeros() as usize
    }
}

#[inline]
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|b| b != &0) {
        Some(offset) => &bytes[offset..],
        None => &[],
    }
}

impl AsRef<[u8]> for Mpi {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Mpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mpi({})", hex::encode(&self.0))
    }
}

impl Serialize for Mpi {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u16::<BigEndian>(bit_size(&self.0) as u16)?;
        w.write_all(&self.0)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.0.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use proptest::prelude::*;

    use super::*;

    impl Arbitrary for Mpi {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            proptest::collection::vec(0u8..255, 1..500)
                .prop_map(|v| Mpi::from_slice(&v))
                .boxed()
        }
    }

    #[test]
    fn test_mpi() {
        // Decode the number `511` (`0x1FF` in hex).
        assert_eq!(
            Mpi::try_from_reader(&mut ByteReader::new(&[0x00, 0x09, 0x01, 0xFF])).unwrap(),
            Mpi::from_slice(&[0x01, 0xFF])
        );

        // Leading zeros are dropped on read.
        assert_eq!(
            Mpi::try_from_reader(&mut ByteReader::new(&[0x00, 0x08, 0x7F])).unwrap(),
            Mpi::from_slice(&[0x00, 0x7F])
        );
    }

    #[test]
    fn test_strip_leading_zeros_with_all_zeros() {
        let buf = [0u8, 0u8, 0u8];
        assert!(strip_leading_zeros(&buf[..]).is_empty());
    }

    proptest! {
        #[test]
        fn mpi_write_len(m: Mpi) {
            let buf = m.to_bytes()?;
            prop_assert_eq!(m.write_len(), buf.len());
        }

        #[test]
        fn mpi_roundtrip(m: Mpi) {
            let buf = m.to_bytes()?;
            let back = Mpi::try_from_reader(&mut ByteReader::new(&buf))?;
            prop_assert_eq!(m, back);
        }
    }
}
