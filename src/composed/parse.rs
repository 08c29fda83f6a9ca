use log::warn;

use crate::armor::{is_armored, Dearmor};
use crate::composed::transferable::{
    KeySequence, TransferableKey, TransferableSubkey, TransferableUserId,
};
use crate::errors::{BadFormatSnafu, Result};
use crate::packet::{Packet, PacketParser, Signature};
use crate::types::Tag;

fn skip_trust_packets(parser: &mut PacketParser<'_>) -> Result<()> {
    while parser.peek_tag() == Some(Tag::Trust) {
        parser.skip_packet()?;
    }
    Ok(())
}

/// Signatures, each optionally followed by trust packets.
fn read_signatures(parser: &mut PacketParser<'_>) -> Result<Vec<Signature>> {
    let mut sigs = Vec::new();
    while parser.peek_tag() == Some(Tag::Signature) {
        match parser.next_packet()? {
            Some(Packet::Signature(sig)) => sigs.push(sig),
            _ => unreachable!("peeked signature"),
        }
        skip_trust_packets(parser)?;
    }
    Ok(sigs)
}

/// One transferable key, RFC 4880 §11.1: primary key packet, direct-key
/// signatures, user id groups, subkey groups. Trust packets are skipped
/// wherever they may appear.
fn read_transferable_key(parser: &mut PacketParser<'_>) -> Result<TransferableKey> {
    let tag = parser.peek_tag();
    snafu::ensure!(
        tag.is_some_and(Tag::is_primary_key),
        BadFormatSnafu {
            message: format!("expected a primary key packet, got {:?}", tag),
        }
    );

    let key = match parser.next_packet()? {
        Some(Packet::Key(key)) => key,
        _ => unreachable!("peeked key"),
    };

    skip_trust_packets(parser)?;
    let signatures = read_signatures(parser)?;

    let mut userids = Vec::new();
    while matches!(
        parser.peek_tag(),
        Some(Tag::UserId) | Some(Tag::UserAttribute)
    ) {
        let uid = match parser.next_packet()? {
            Some(Packet::UserId(uid)) => uid,
            _ => unreachable!("peeked user id"),
        };
        skip_trust_packets(parser)?;
        let signatures = read_signatures(parser)?;
        userids.push(TransferableUserId { uid, signatures });
    }

    let mut subkeys = Vec::new();
    while parser.peek_tag().is_some_and(Tag::is_subkey) {
        let subkey = match parser.next_packet()? {
            Some(Packet::Key(subkey)) => subkey,
            _ => unreachable!("peeked subkey"),
        };
        skip_trust_packets(parser)?;
        let signatures = read_signatures(parser)?;
        subkeys.push(TransferableSubkey { subkey, signatures });
    }

    Ok(TransferableKey {
        key,
        signatures,
        userids,
        subkeys,
    })
}

fn read_binary_keys(data: &[u8], keys: &mut Vec<TransferableKey>) -> Result<()> {
    let mut parser = PacketParser::new(data);
    while !parser.is_empty() {
        keys.push(read_transferable_key(&mut parser)?);
    }
    Ok(())
}

impl KeySequence {
    /// Read a sequence of transferable keys. Armor is autodetected; an
    /// armored source may contain several blocks back to back, each
    /// contributing its keys.
    pub fn from_bytes(data: &[u8]) -> Result<KeySequence> {
        let mut keys = Vec::new();

        if is_armored(data) {
            for block in Dearmor::new(data) {
                let (_, decoded) = block?;
                read_binary_keys(&decoded, &mut keys)?;
            }
        } else {
            read_binary_keys(data, &mut keys)?;
        }

        let has_secret = keys.iter().any(TransferableKey::is_secret);
        let has_public = keys.iter().any(|k| !k.is_secret());
        if has_secret && has_public {
            warn!("public keys are mixed together with secret ones");
        }

        Ok(KeySequence { keys })
    }
}

impl TransferableKey {
    /// Read exactly one transferable key from the source.
    pub fn from_bytes(data: &[u8]) -> Result<TransferableKey> {
        let seq = KeySequence::from_bytes(data)?;
        let mut keys = seq.keys;
        snafu::ensure!(
            keys.len() == 1,
            BadFormatSnafu {
                message: format!("expected a single key, got {}", keys.len()),
            }
        );
        Ok(keys.remove(0))
    }
}

impl TransferableSubkey {
    /// Read a bare subkey with its signatures, as key stores that persist
    /// subkeys separately hand them out.
    pub fn from_bytes(data: &[u8]) -> Result<TransferableSubkey> {
        let mut parser = PacketParser::new(data);

        let tag = parser.peek_tag();
        snafu::ensure!(
            tag.is_some_and(Tag::is_subkey),
            BadFormatSnafu {
                message: format!("expected a subkey packet, got {:?}", tag),
            }
        );

        let subkey = match parser.next_packet()? {
            Some(Packet::Key(subkey)) => subkey,
            _ => unreachable!("peeked subkey"),
        };
        skip_trust_packets(&mut parser)?;
        let signatures = read_signatures(&mut parser)?;

        snafu::ensure!(
            parser.is_empty(),
            BadFormatSnafu {
                message: "trailing packets after subkey".to_string(),
            }
        );

        Ok(TransferableSubkey { subkey, signatures })
    }
}
