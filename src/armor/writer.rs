use std::hash::Hasher as _;
use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use crc24::Crc24Hasher;

use crate::armor::BlockType;
use crate::errors::Result;
use crate::ser::Serialize;

const LINE_LENGTH: usize = 64;

/// Armor the serialized form of `source` into `writer`, with a CRC24
/// checksum trailer.
pub fn write(source: &impl Serialize, typ: BlockType, writer: &mut impl Write) -> Result<()> {
    let body = source.to_bytes()?;

    writer.write_all(b"-----BEGIN ")?;
    writer.write_all(typ.as_str().as_bytes())?;
    writer.write_all(b"-----\n\n")?;

    let encoded = STANDARD.encode(&body);
    for chunk in encoded.as_bytes().chunks(LINE_LENGTH) {
        writer.write_all(chunk)?;
        writer.write_all(b"\n")?;
    }

    let mut crc_hasher = Crc24Hasher::new();
    crc_hasher.write(&body);
    let crc = crc_hasher.finish() as u32;
    let crc_buf = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];

    writer.write_all(b"=")?;
    writer.write_all(STANDARD.encode(crc_buf).as_bytes())?;
    writer.write_all(b"\n")?;

    writer.write_all(b"-----END ")?;
    writer.write_all(typ.as_str().as_bytes())?;
    writer.write_all(b"-----\n")?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    /// Plain bytes, so tests can armor arbitrary payloads.
    pub(crate) struct Raw(pub Vec<u8>);

    impl Serialize for Raw {
        fn to_writer<W: Write>(&self, writer: &mut W) -> Result<()> {
            writer.write_all(&self.0)?;
            Ok(())
        }

        fn write_len(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn test_line_wrapping() {
        let data = Raw(vec![0xAAu8; 100]);
        let mut out = Vec::new();
        write(&data, BlockType::PublicKey, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        for line in text.lines() {
            assert!(line.len() <= 64 + 1);
        }
        // 100 bytes encode to 136 base64 chars: three body lines
        let body_lines = text
            .lines()
            .filter(|l| !l.is_empty() && !l.starts_with('-') && !l.starts_with('='))
            .count();
        assert_eq!(body_lines, 3);
    }
}
