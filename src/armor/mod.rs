mod reader;
mod writer;

pub use self::reader::{is_armored, Dearmor};
pub use self::writer::write;

use crate::errors::{Result, UnsupportedSnafu};

/// Armor block labels.
/// Ref: https://tools.ietf.org/html/rfc4880#section-6.2
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BlockType {
    PublicKey,
    SecretKey,
    Message,
    Signature,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::PublicKey => "PGP PUBLIC KEY BLOCK",
            BlockType::SecretKey => "PGP SECRET KEY BLOCK",
            BlockType::Message => "PGP MESSAGE",
            BlockType::Signature => "PGP SIGNATURE",
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        match label {
            "PGP PUBLIC KEY BLOCK" => Ok(BlockType::PublicKey),
            // both spellings circulate for secret key blocks
            "PGP SECRET KEY BLOCK" | "PGP PRIVATE KEY BLOCK" => Ok(BlockType::SecretKey),
            "PGP MESSAGE" => Ok(BlockType::Message),
            "PGP SIGNATURE" => Ok(BlockType::Signature),
            _ => UnsupportedSnafu {
                message: format!("unknown armor label {label:?}"),
            }
            .fail(),
        }
    }
}
