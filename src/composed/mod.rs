mod parse;
mod transferable;

pub use self::transferable::{
    KeySequence, TransferableKey, TransferableSubkey, TransferableUserId,
};
