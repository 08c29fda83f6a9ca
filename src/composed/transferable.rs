use std::io;

use log::warn;

use crate::armor::{self, BlockType};
use crate::errors::{BadParametersSnafu, Result};
use crate::packet::{write_packet, KeyPacket, PacketTrait, Signature, UserIdPacket};
use crate::ser::Serialize;

fn full_packet_len(packet: &impl PacketTrait) -> usize {
    let body = packet.write_len();
    packet.packet_header().header_len(body) + body
}

fn signatures_len(sigs: &[Signature]) -> usize {
    sigs.iter().map(full_packet_len).sum()
}

fn write_signatures<W: io::Write>(sigs: &[Signature], writer: &mut W) -> Result<()> {
    for sig in sigs {
        write_packet(writer, sig)?;
    }
    Ok(())
}

/// Append the signatures from `src` that are not already present in `dst`,
/// deduplicating by packet-byte equality.
fn merge_signatures(dst: &mut Vec<Signature>, src: &[Signature]) {
    for sig in src {
        if !dst.iter().any(|have| have.pkt_eq(sig)) {
            dst.push(sig.clone());
        }
    }
}

/// A user identity with its certification signatures, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableUserId {
    pub uid: UserIdPacket,
    pub signatures: Vec<Signature>,
}

impl TransferableUserId {
    pub fn merge(&mut self, src: &TransferableUserId) {
        merge_signatures(&mut self.signatures, &src.signatures);
    }
}

/// A subkey with its binding and revocation signatures, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableSubkey {
    pub subkey: KeyPacket,
    pub signatures: Vec<Signature>,
}

impl TransferableSubkey {
    pub fn merge(&mut self, src: &TransferableSubkey) -> Result<()> {
        snafu::ensure!(
            self.subkey.public_eq(&src.subkey),
            BadParametersSnafu {
                message: "attempt to merge different subkeys".to_string(),
            }
        );
        merge_signatures(&mut self.signatures, &src.signatures);
        Ok(())
    }
}

impl Serialize for TransferableSubkey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        write_packet(writer, &self.subkey)?;
        write_signatures(&self.signatures, writer)
    }

    fn write_len(&self) -> usize {
        full_packet_len(&self.subkey) + signatures_len(&self.signatures)
    }
}

/// The in-memory mirror of one RFC 4880 §11.1 transferable key: primary key
/// packet, direct-key signatures, user ids with their signatures, subkeys
/// with theirs. Order is preserved from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableKey {
    pub key: KeyPacket,
    pub signatures: Vec<Signature>,
    pub userids: Vec<TransferableUserId>,
    pub subkeys: Vec<TransferableSubkey>,
}

impl TransferableKey {
    pub fn is_secret(&self) -> bool {
        self.key.is_secret()
    }

    pub fn userid_by_packet(&mut self, uid: &UserIdPacket) -> Option<&mut TransferableUserId> {
        self.userids
            .iter_mut()
            .find(|have| have.uid.tag() == uid.tag() && have.uid.data() == uid.data())
    }

    fn subkey_by_packet(&mut self, subkey: &KeyPacket) -> Option<&mut TransferableSubkey> {
        self.subkeys
            .iter_mut()
            .find(|have| have.subkey.public_eq(subkey))
    }

    /// Append a bare user id packet, without any certification.
    pub fn add_userid(&mut self, id: &str) -> &mut TransferableUserId {
        self.userids.push(TransferableUserId {
            uid: UserIdPacket::from_str(id),
            signatures: Vec::new(),
        });
        self.userids.last_mut().expect("just pushed")
    }

    /// Merge the packets of `src` into this key. The primaries must carry
    /// the same public material; signatures are deduplicated by packet
    /// bytes, user id lists are merged per identity, new subkeys appended.
    pub fn merge(&mut self, src: &TransferableKey) -> Result<()> {
        snafu::ensure!(
            self.key.public_eq(&src.key),
            BadParametersSnafu {
                message: "attempt to merge unrelated keys".to_string(),
            }
        );

        merge_signatures(&mut self.signatures, &src.signatures);

        for uid in &src.userids {
            match self.userid_by_packet(&uid.uid) {
                Some(have) => have.merge(uid),
                None => self.userids.push(uid.clone()),
            }
        }

        for subkey in &src.subkeys {
            match self.subkey_by_packet(&subkey.subkey) {
                Some(have) => have.merge(subkey)?,
                None => {
                    if self.key.is_secret() != subkey.subkey.is_secret() {
                        warn!("adding public/secret subkey to secret/public key");
                    }
                    self.subkeys.push(subkey.clone());
                }
            }
        }

        Ok(())
    }

    pub fn to_armored_writer(&self, writer: &mut impl io::Write) -> Result<()> {
        let typ = if self.is_secret() {
            BlockType::SecretKey
        } else {
            BlockType::PublicKey
        };
        armor::write(self, typ, writer)
    }

    pub fn to_armored_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf)?;
        Ok(buf)
    }
}

impl Serialize for TransferableKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        write_packet(writer, &self.key)?;
        write_signatures(&self.signatures, writer)?;

        for uid in &self.userids {
            write_packet(writer, &uid.uid)?;
            write_signatures(&uid.signatures, writer)?;
        }

        for subkey in &self.subkeys {
            subkey.to_writer(writer)?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        full_packet_len(&self.key)
            + signatures_len(&self.signatures)
            + self
                .userids
                .iter()
                .map(|uid| full_packet_len(&uid.uid) + signatures_len(&uid.signatures))
                .sum::<usize>()
            + self.subkeys.iter().map(Serialize::write_len).sum::<usize>()
    }
}

/// One or more transferable keys read from a single source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequence {
    pub keys: Vec<TransferableKey>,
}

impl KeySequence {
    /// The armor label is picked by the first key's tag.
    pub fn to_armored_writer(&self, writer: &mut impl io::Write) -> Result<()> {
        let typ = match self.keys.first() {
            Some(key) if key.is_secret() => BlockType::SecretKey,
            _ => BlockType::PublicKey,
        };
        armor::write(self, typ, writer)
    }
}

impl Serialize for KeySequence {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for key in &self.keys {
            key.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.keys.iter().map(Serialize::write_len).sum()
    }
}
