//! OpenPGP key management: parse, validate, store, transform and serialize
//! RFC 4880 transferable keys.
//!
//! The crate is built around three layers:
//!
//! * [`composed`]: the wire-faithful transferable key tree (primary key,
//!   direct signatures, user ids, subkeys) with parsing, serialization,
//!   armoring and merge.
//! * [`key`]: the curated [`key::Key`] with its derived identifiers
//!   (key id, fingerprint, grip), ingested signatures, validation state
//!   machine, password based secret key protection, and the [`key::Keyring`]
//!   holding it all together.
//! * [`packet`], [`types`] and [`crypto`]: the packet codecs and primitives
//!   the upper layers are built from.

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::style,
    clippy::perf,
    clippy::complexity,
    clippy::correctness,
    clippy::unwrap_used,
    rust_2018_idioms
)]
#![allow(clippy::missing_const_for_fn, clippy::use_self)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
pub mod errors;
pub mod armor;
pub mod composed;
pub mod crypto;
pub mod key;
pub mod packet;
pub mod parsing;
pub mod ser;
pub mod types;

pub use self::composed::{KeySequence, TransferableKey, TransferableSubkey, TransferableUserId};
pub use self::key::{Key, Keyring};

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
