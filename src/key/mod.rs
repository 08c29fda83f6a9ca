mod certify;
mod object;
mod protect;
mod provider;
mod store;
mod validate;

pub use self::certify::{adjust_hash_to_key, bind_subkey, certify_userid, revoke_key};
pub use self::object::{
    find_suitable_key, primary_for, BindingInfo, CertInfo, Key, KeyUserId, ProtectionParams,
    Revocation, SubSig, UserPrefs,
};
pub use self::protect::{decrypt_secret_key, encrypt_secret_key};
pub use self::provider::{
    KeyOp, KeyProvider, KeyRequest, KeySearch, NullKeyProvider, PasswordCtx, PasswordProvider,
    SecretKeyCodec,
};
pub use self::store::Keyring;
