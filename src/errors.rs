use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy of the crate.
///
/// Kinds, not call sites: structural input errors are `BadFormat`, caller
/// contract violations are `BadParameters`, broken internal invariants or
/// misbehaving collaborators are `BadState`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("bad parameters: {message}"))]
    BadParameters { message: String },
    #[snafu(display("bad format: {message}"))]
    BadFormat { message: String },
    #[snafu(display("bad state: {message}"))]
    BadState { message: String },
    #[snafu(display("decryption failed"))]
    DecryptFailed,
    #[snafu(display("random number generation failed"))]
    Rng,
    #[snafu(display("IO error: {source}"), context(false))]
    Io { source: std::io::Error },
    #[snafu(transparent)]
    Rsa { source: rsa::errors::Error },
    #[snafu(transparent)]
    Signature { source: ed25519_dalek::SignatureError },
    /// Packet versions and parameters we don't support, but can safely skip.
    #[snafu(display("unsupported: {message}"))]
    Unsupported { message: String },
    #[snafu(display("{message}"))]
    Message { message: String },
}

#[macro_export]
macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Message { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Message { message: format!($fmt, $($arg)+) })
    };
}

#[macro_export]
macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::Message { message: $e.to_string() }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::Message { message: format!($fmt, $($arg)+) }
    };
}

#[macro_export]
macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

#[macro_export(local_inner_macros)]
macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            bail!($fmt, $($arg)+);
        }
    };
}

#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val, format_args!($($arg)+))
                }
            }
        }
    });
}
