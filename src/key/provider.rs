use crate::errors::Result;
use crate::key::object::Key;
use crate::packet::KeyPacket;
use crate::types::{Fingerprint, KeyGrip, KeyId, Password};

/// The operation a provider is being asked to serve.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum KeyOp {
    Unlock,
    Protect,
    Unprotect,
    MergeInfo,
    Sign,
    Encrypt,
    Verify,
}

/// Context handed to a password provider, so it can prompt meaningfully.
#[derive(Debug)]
pub struct PasswordCtx<'a> {
    pub op: KeyOp,
    pub key: &'a Key,
}

/// Asks the user (or a test fixture) for a password. Returning `Ok(None)`
/// means the request was cancelled.
pub trait PasswordProvider {
    fn get(&self, ctx: &PasswordCtx<'_>) -> Result<Option<Password>>;
}

/// A fixed password doubles as its own provider.
impl PasswordProvider for Password {
    fn get(&self, _ctx: &PasswordCtx<'_>) -> Result<Option<Password>> {
        Ok(Some(self.clone()))
    }
}

/// How a key is searched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySearch {
    Grip(KeyGrip),
    Fingerprint(Fingerprint),
    KeyId(KeyId),
}

#[derive(Debug, Clone)]
pub struct KeyRequest {
    pub op: KeyOp,
    pub secret: bool,
    pub search: KeySearch,
}

/// Resolves key lookups against an external store.
pub trait KeyProvider {
    fn request(&self, req: &KeyRequest) -> Option<&Key>;
}

/// A provider with nothing to offer.
pub struct NullKeyProvider;

impl KeyProvider for NullKeyProvider {
    fn request(&self, _req: &KeyRequest) -> Option<&Key> {
        None
    }
}

/// Codec for a foreign secret key serialization (the G10 format used by
/// gpg-agent). The core only round-trips such keys; the codec itself is
/// injected by the embedding key store.
pub trait SecretKeyCodec {
    /// Parse a foreign-format secret key blob into a key packet.
    fn parse_seckey(&self, data: &[u8]) -> Result<KeyPacket>;
    /// Serialize the secret key packet into the foreign format.
    fn write_seckey(&self, pkt: &KeyPacket, password: Option<&Password>) -> Result<Vec<u8>>;
}
