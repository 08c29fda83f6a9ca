use std::fmt;
use std::io;

use crate::errors::{BadParametersSnafu, Result};
use crate::packet::header::PacketHeader;
use crate::ser::Serialize;
use crate::types::Tag;

/// A user identity attached to a primary key: either a textual User ID
/// packet or an opaque User Attribute packet.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.11
#[derive(Clone, PartialEq, Eq)]
pub struct UserIdPacket {
    packet_header: PacketHeader,
    data: Vec<u8>,
}

impl UserIdPacket {
    pub fn try_from_reader(packet_header: PacketHeader, body: &[u8]) -> Result<Self> {
        snafu::ensure!(
            matches!(packet_header.tag(), Tag::UserId | Tag::UserAttribute),
            BadParametersSnafu {
                message: format!("not a user id packet tag: {:?}", packet_header.tag()),
            }
        );
        Ok(UserIdPacket {
            packet_header,
            data: body.to_vec(),
        })
    }

    /// Create a textual user id packet.
    pub fn from_str(id: &str) -> Self {
        let data = id.as_bytes().to_vec();
        UserIdPacket {
            packet_header: PacketHeader::new(Tag::UserId, data.len()),
            data,
        }
    }

    pub fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }

    pub fn tag(&self) -> Tag {
        self.packet_header.tag()
    }

    /// The raw identity bytes. Should be UTF-8 for user id packets, but that
    /// is not guaranteed on the wire.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The denormalised textual form, `"(photo)"` for attribute packets.
    pub fn display_name(&self) -> String {
        match self.tag() {
            Tag::UserAttribute => "(photo)".to_string(),
            _ => String::from_utf8_lossy(&self.data).into_owned(),
        }
    }
}

impl fmt::Debug for UserIdPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserIdPacket({:?}, {:?})", self.tag(), self.display_name())
    }
}

impl Serialize for UserIdPacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_user_id() {
        let uid = UserIdPacket::from_str("Alice <alice@example.com>");
        assert_eq!(uid.tag(), Tag::UserId);
        assert_eq!(uid.display_name(), "Alice <alice@example.com>");

        let bytes = uid.to_bytes().unwrap();
        let back =
            UserIdPacket::try_from_reader(PacketHeader::new(Tag::UserId, bytes.len()), &bytes)
                .unwrap();
        assert_eq!(uid, back);
    }

    #[test]
    fn test_user_attribute_display() {
        let attr = UserIdPacket::try_from_reader(
            PacketHeader::new(Tag::UserAttribute, 4),
            &[0x01, 0x02, 0x03, 0x04],
        )
        .unwrap();
        assert_eq!(attr.display_name(), "(photo)");
    }
}
