use std::io;

use log::debug;

use crate::composed::{KeySequence, TransferableKey, TransferableSubkey};
use crate::errors::{BadParametersSnafu, Result};
use crate::key::object::Key;
use crate::key::provider::{KeyProvider, KeyRequest, KeySearch};
use crate::types::KeyGrip;

/// An in-memory keyring: the exclusive owner of its keys, indexed by grip.
/// Primaries and subkeys reference each other by grip only; lookups go
/// through the ring.
#[derive(Debug, Default)]
pub struct Keyring {
    keys: Vec<Key>,
}

impl Keyring {
    pub fn new() -> Self {
        Keyring::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    /// Add a canonicalised key. The grip must not be present yet.
    pub fn add_key(&mut self, key: Key) -> Result<&mut Key> {
        snafu::ensure!(
            self.get_by_grip(key.grip()).is_none(),
            BadParametersSnafu {
                message: format!("key {} is already present in the keyring", key.grip()),
            }
        );
        self.keys.push(key);
        Ok(self.keys.last_mut().expect("just pushed"))
    }

    pub fn get_by_grip(&self, grip: &KeyGrip) -> Option<&Key> {
        self.keys.iter().find(|key| key.grip() == grip)
    }

    pub fn get_mut_by_grip(&mut self, grip: &KeyGrip) -> Option<&mut Key> {
        self.keys.iter_mut().find(|key| key.grip() == grip)
    }

    /// Remove a key; its secret material is scrubbed on drop.
    pub fn remove_by_grip(&mut self, grip: &KeyGrip) -> Option<Key> {
        let idx = self.keys.iter().position(|key| key.grip() == grip)?;
        Some(self.keys.remove(idx))
    }

    pub fn search(&self, search: &KeySearch) -> Option<&Key> {
        self.keys.iter().find(|key| match search {
            KeySearch::Grip(grip) => key.grip() == grip,
            KeySearch::Fingerprint(fingerprint) => key.fingerprint() == fingerprint,
            KeySearch::KeyId(keyid) => key.key_id() == keyid,
        })
    }

    /// Canonicalise and add a transferable key with all its subkeys.
    /// All keys are built and checked before anything is inserted, so a
    /// failure leaves the ring unchanged.
    pub fn add_transferable_key(&mut self, tkey: &TransferableKey) -> Result<KeyGrip> {
        let mut primary = Key::from_transferable(tkey)?;

        let mut subkeys = Vec::with_capacity(tkey.subkeys.len());
        for tsub in &tkey.subkeys {
            subkeys.push(Key::from_transferable_subkey(tsub, Some(&mut primary))?);
        }

        snafu::ensure!(
            self.get_by_grip(primary.grip()).is_none(),
            BadParametersSnafu {
                message: format!("key {} is already present in the keyring", primary.grip()),
            }
        );
        for subkey in &subkeys {
            snafu::ensure!(
                self.get_by_grip(subkey.grip()).is_none(),
                BadParametersSnafu {
                    message: format!(
                        "subkey {} is already present in the keyring",
                        subkey.grip()
                    ),
                }
            );
        }

        let grip = *primary.grip();
        self.keys.push(primary);
        self.keys.extend(subkeys);

        debug!("added transferable key {}", grip);
        Ok(grip)
    }

    /// Canonicalise and add a bare subkey under an already loaded primary.
    pub fn add_transferable_subkey(
        &mut self,
        tsub: &TransferableSubkey,
        primary_grip: &KeyGrip,
    ) -> Result<KeyGrip> {
        let subkey = {
            let primary = self.get_mut_by_grip(primary_grip).ok_or_else(|| {
                crate::errors::Error::BadParameters {
                    message: format!("primary {} not present in keyring", primary_grip),
                }
            })?;
            Key::from_transferable_subkey(tsub, Some(primary))?
        };

        let grip = *subkey.grip();
        self.add_key(subkey)?;
        Ok(grip)
    }

    /// Validate one key. A subkey requires its primary to be present (and
    /// already carries its validation result).
    pub fn validate_key(&mut self, grip: &KeyGrip) -> Result<()> {
        let idx = self
            .keys
            .iter()
            .position(|key| key.grip() == grip)
            .ok_or_else(|| crate::errors::Error::BadParameters {
                message: format!("key {} not present in keyring", grip),
            })?;

        if self.keys[idx].is_primary() {
            return self.keys[idx].validate_primary();
        }

        let primary_grip =
            self.keys[idx]
                .primary_grip()
                .copied()
                .ok_or_else(|| crate::errors::Error::BadParameters {
                    message: "subkey without primary grip".to_string(),
                })?;
        let primary = self
            .get_by_grip(&primary_grip)
            .ok_or_else(|| crate::errors::Error::BadParameters {
                message: format!("primary {} not present in keyring", primary_grip),
            })?
            .clone();

        self.keys[idx].validate_subkey(&primary)
    }

    /// Validate every key, primaries before their subkeys.
    pub fn validate_all(&mut self) -> Result<()> {
        let grips: Vec<KeyGrip> = self
            .keys
            .iter()
            .filter(|key| key.is_primary())
            .map(|key| *key.grip())
            .collect();
        for grip in grips {
            self.validate_key(&grip)?;
        }

        let grips: Vec<KeyGrip> = self
            .keys
            .iter()
            .filter(|key| key.is_subkey())
            .map(|key| *key.grip())
            .collect();
        for grip in grips {
            self.validate_key(&grip)?;
        }

        Ok(())
    }

    /// Load every transferable key from the byte source.
    pub fn read_from(&mut self, data: &[u8]) -> Result<()> {
        let seq = KeySequence::from_bytes(data)?;
        for tkey in &seq.keys {
            self.add_transferable_key(tkey)?;
        }
        Ok(())
    }

    /// Write all primaries (with their subkeys) of the given polarity.
    pub fn write_to<W: io::Write>(&self, writer: &mut W, secret: bool) -> Result<()> {
        for key in &self.keys {
            if key.is_subkey() || key.is_secret() != secret {
                continue;
            }
            key.write_xfer(writer, Some(self))?;
        }
        Ok(())
    }
}

impl KeyProvider for Keyring {
    fn request(&self, req: &KeyRequest) -> Option<&Key> {
        let key = self.search(&req.search)?;
        (key.is_secret() == req.secret).then_some(key)
    }
}
