use std::io;

use crate::errors::Result;
use crate::packet::header::PacketHeader;
use crate::ser::Serialize;

/// Trust packet. Keyring-local data written by other implementations; the
/// content is implementation defined, we only carry it so it can be skipped
/// wherever RFC 4880 allows it between key material packets.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.10
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPacket {
    packet_header: PacketHeader,
    data: Vec<u8>,
}

impl TrustPacket {
    pub fn try_from_reader(packet_header: PacketHeader, body: &[u8]) -> Result<Self> {
        Ok(TrustPacket {
            packet_header,
            data: body.to_vec(),
        })
    }

    pub fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

impl Serialize for TrustPacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}
