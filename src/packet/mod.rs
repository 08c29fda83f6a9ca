mod header;
mod key;
mod signature;
mod trust;
mod user_id;

use std::io;

use crate::errors::{BadFormatSnafu, Result};
use crate::parsing::ByteReader;
use crate::ser::Serialize;
use crate::types::{RawPacket, Tag};

pub use self::header::{PacketHeader, PacketHeaderVersion};
pub use self::key::{KeyPacket, PublicParams, SecretMaterial, SecretParams, SecretProtection};
pub use self::signature::{
    verify_signature_mpis, RevocationCode, Signature, SignatureConfig, SignatureType,
    SignatureVersion, SignatureVersionSpecific, Subpacket, SubpacketData, SubpacketType,
};
pub use self::trust::TrustPacket;
pub use self::user_id::UserIdPacket;

/// Types that form a complete packet: a header plus a serializable body.
pub trait PacketTrait: Serialize {
    fn packet_header(&self) -> &PacketHeader;

    fn tag(&self) -> Tag {
        self.packet_header().tag()
    }
}

impl PacketTrait for KeyPacket {
    fn packet_header(&self) -> &PacketHeader {
        self.packet_header()
    }
}

impl PacketTrait for Signature {
    fn packet_header(&self) -> &PacketHeader {
        self.packet_header()
    }
}

impl PacketTrait for UserIdPacket {
    fn packet_header(&self) -> &PacketHeader {
        self.packet_header()
    }
}

impl PacketTrait for TrustPacket {
    fn packet_header(&self) -> &PacketHeader {
        self.packet_header()
    }
}

/// Write a complete packet, header included.
pub fn write_packet<W: io::Write>(writer: &mut W, packet: &impl PacketTrait) -> Result<()> {
    let len = packet.write_len();
    packet.packet_header().to_writer(len, writer)?;
    packet.to_writer(writer)
}

/// The wire bytes of a complete packet.
pub fn packet_to_raw(packet: &impl PacketTrait) -> Result<RawPacket> {
    let len = packet.write_len();
    let mut data = Vec::with_capacity(packet.packet_header().header_len(len) + len);
    write_packet(&mut data, packet)?;

    Ok(RawPacket {
        tag: packet.tag(),
        data,
    })
}

/// A parsed packet relevant to transferable keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Key(KeyPacket),
    Signature(Signature),
    UserId(UserIdPacket),
    Trust(TrustPacket),
}

impl Packet {
    pub fn tag(&self) -> Tag {
        match self {
            Packet::Key(p) => p.tag(),
            Packet::Signature(p) => p.tag(),
            Packet::UserId(p) => p.tag(),
            Packet::Trust(p) => p.tag(),
        }
    }

    fn from_parts(header: PacketHeader, body: &[u8]) -> Result<Packet> {
        match header.tag() {
            Tag::PublicKey | Tag::SecretKey | Tag::PublicSubkey | Tag::SecretSubkey => {
                Ok(Packet::Key(KeyPacket::try_from_reader(header, body)?))
            }
            Tag::Signature => Ok(Packet::Signature(Signature::try_from_reader(header, body)?)),
            Tag::UserId | Tag::UserAttribute => {
                Ok(Packet::UserId(UserIdPacket::try_from_reader(header, body)?))
            }
            Tag::Trust => Ok(Packet::Trust(TrustPacket::try_from_reader(header, body)?)),
            tag => BadFormatSnafu {
                message: format!("unexpected packet tag {:?}", tag),
            }
            .fail(),
        }
    }
}

/// Reads packets off a fully buffered byte source.
#[derive(Debug)]
pub struct PacketParser<'a> {
    reader: ByteReader<'a>,
}

impl<'a> PacketParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        PacketParser {
            reader: ByteReader::new(data),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    /// The tag of the next packet, without consuming it. `None` at the end
    /// of input or when no valid header follows.
    pub fn peek_tag(&self) -> Option<Tag> {
        let mut probe = self.reader.clone();
        PacketHeader::try_from_reader(&mut probe).ok().map(|h| h.tag())
    }

    /// Reads and parses the next packet. `Ok(None)` at the end of input.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        if self.reader.is_empty() {
            return Ok(None);
        }

        let header = PacketHeader::try_from_reader(&mut self.reader)?;
        let body = self.reader.take(header.len())?;

        Ok(Some(Packet::from_parts(header, body)?))
    }

    /// Reads the next packet without interpreting its body.
    pub fn skip_packet(&mut self) -> Result<()> {
        let header = PacketHeader::try_from_reader(&mut self.reader)?;
        self.reader.take(header.len())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_user_id_packet() {
        let uid = UserIdPacket::from_str("test <t@example.org>");
        let mut buf = Vec::new();
        write_packet(&mut buf, &uid).unwrap();

        let mut parser = PacketParser::new(&buf);
        assert_eq!(parser.peek_tag(), Some(Tag::UserId));
        let packet = parser.next_packet().unwrap().unwrap();
        assert_eq!(packet, Packet::UserId(uid));
        assert!(parser.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_unknown_tag_is_error() {
        // marker packet
        let buf = [0xCA, 0x03, b'P', b'G', b'P'];
        let mut parser = PacketParser::new(&buf);
        assert!(parser.next_packet().is_err());
    }
}
