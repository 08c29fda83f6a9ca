use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::{BadFormatSnafu, Result};
use crate::parsing::ByteReader;
use crate::types::Tag;

/// Old (RFC 1991) or new style framing.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum PacketHeaderVersion {
    Old,
    #[default]
    New,
}

fn minimal_width(version: PacketHeaderVersion, len: usize) -> u8 {
    match version {
        PacketHeaderVersion::New => match len {
            0..=191 => 1,
            192..=8383 => 2,
            _ => 5,
        },
        PacketHeaderVersion::Old => match len {
            0..=0xFF => 1,
            0x100..=0xFFFF => 2,
            _ => 4,
        },
    }
}

/// A non-minimal wire encoding is remembered; the common minimal one is
/// recorded as 0, so a reparsed packet compares equal to a freshly built
/// one.
fn normalize_width(version: PacketHeaderVersion, len: usize, width: u8) -> u8 {
    if width == minimal_width(version, len) {
        0
    } else {
        width
    }
}

/// A parsed packet header.
///
/// The original length encoding is recorded so an unmodified packet
/// re-serializes to the exact input bytes. Packets built in memory use the
/// minimal new-style encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    version: PacketHeaderVersion,
    tag: Tag,
    len: usize,
    /// Octets the length field occupied on the wire; 0 picks the minimal
    /// encoding when writing.
    len_width: u8,
}

impl PacketHeader {
    pub fn new(tag: Tag, len: usize) -> Self {
        PacketHeader {
            version: PacketHeaderVersion::New,
            tag,
            len,
            len_width: 0,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn version(&self) -> PacketHeaderVersion {
        self.version
    }

    pub fn try_from_reader(i: &mut ByteReader<'_>) -> Result<Self> {
        let ctb = i.read_u8()?;
        snafu::ensure!(
            ctb & 0x80 != 0,
            BadFormatSnafu {
                message: format!("invalid packet tag byte 0x{ctb:02x}"),
            }
        );

        if ctb & 0x40 != 0 {
            // new style
            let tag = Tag::from(ctb & 0x3F);
            let o1 = i.read_u8()?;
            let (len, len_width) = match o1 {
                0..=191 => (usize::from(o1), 1),
                192..=223 => {
                    let o2 = i.read_u8()?;
                    ((usize::from(o1) - 192) * 256 + usize::from(o2) + 192, 2)
                }
                255 => (i.read_be_u32()? as usize, 5),
                _ => {
                    return BadFormatSnafu {
                        message: "partial packet lengths are not allowed for key material"
                            .to_string(),
                    }
                    .fail();
                }
            };

            Ok(PacketHeader {
                version: PacketHeaderVersion::New,
                tag,
                len,
                len_width: normalize_width(PacketHeaderVersion::New, len, len_width),
            })
        } else {
            // old style
            let tag = Tag::from((ctb >> 2) & 0x0F);
            let (len, len_width) = match ctb & 0x03 {
                0 => (usize::from(i.read_u8()?), 1),
                1 => (usize::from(i.read_be_u16()?), 2),
                2 => (i.read_be_u32()? as usize, 4),
                _ => {
                    return BadFormatSnafu {
                        message: "indeterminate packet length is not allowed for key material"
                            .to_string(),
                    }
                    .fail();
                }
            };

            Ok(PacketHeader {
                version: PacketHeaderVersion::Old,
                tag,
                len,
                len_width: normalize_width(PacketHeaderVersion::Old, len, len_width),
            })
        }
    }

    /// Octets the length field will occupy for `len`.
    fn width_for(&self, len: usize) -> u8 {
        // an unmodified packet reuses its wire encoding
        if len == self.len && self.len_width != 0 {
            return self.len_width;
        }

        minimal_width(self.version, len)
    }

    /// Write the header for a body of `len` octets.
    pub fn to_writer<W: io::Write>(&self, len: usize, writer: &mut W) -> Result<()> {
        let width = self.width_for(len);

        match self.version {
            PacketHeaderVersion::New => {
                writer.write_u8(0xC0 | u8::from(self.tag))?;
                match width {
                    1 => writer.write_u8(len as u8)?,
                    2 => {
                        let adjusted = len - 192;
                        writer.write_u8((adjusted / 256 + 192) as u8)?;
                        writer.write_u8((adjusted % 256) as u8)?;
                    }
                    _ => {
                        writer.write_u8(255)?;
                        writer.write_u32::<BigEndian>(len as u32)?;
                    }
                }
            }
            PacketHeaderVersion::Old => {
                let len_type: u8 = match width {
                    1 => 0,
                    2 => 1,
                    _ => 2,
                };
                writer.write_u8(0x80 | (u8::from(self.tag) << 2) | len_type)?;
                match width {
                    1 => writer.write_u8(len as u8)?,
                    2 => writer.write_u16::<BigEndian>(len as u16)?,
                    _ => writer.write_u32::<BigEndian>(len as u32)?,
                }
            }
        }

        Ok(())
    }

    /// Serialized header size for a body of `len` octets.
    pub fn header_len(&self, len: usize) -> usize {
        1 + usize::from(self.width_for(len))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn roundtrip(header: &PacketHeader, body_len: usize) -> PacketHeader {
        let mut buf = Vec::new();
        header.to_writer(body_len, &mut buf).unwrap();
        assert_eq!(buf.len(), header.header_len(body_len));
        PacketHeader::try_from_reader(&mut ByteReader::new(&buf)).unwrap()
    }

    #[test]
    fn test_new_style_lengths() {
        for len in [0usize, 191, 192, 8383, 8384, 70000] {
            let h = PacketHeader::new(Tag::Signature, len);
            let back = roundtrip(&h, len);
            assert_eq!(back.tag(), Tag::Signature);
            assert_eq!(back.len(), len);
        }
    }

    #[test]
    fn test_old_style_preserved() {
        // old style, 2 octet length for a small packet
        let wire = [0x89, 0x00, 0x05];
        let h = PacketHeader::try_from_reader(&mut ByteReader::new(&wire)).unwrap();
        assert_eq!(h.version(), PacketHeaderVersion::Old);
        assert_eq!(h.tag(), Tag::Signature);
        assert_eq!(h.len(), 5);

        let mut buf = Vec::new();
        h.to_writer(5, &mut buf).unwrap();
        assert_eq!(buf, wire);
    }

    #[test]
    fn test_partial_rejected() {
        // new style, first length octet in the partial range
        let wire = [0xC2, 0xE0];
        assert!(PacketHeader::try_from_reader(&mut ByteReader::new(&wire)).is_err());
    }
}
