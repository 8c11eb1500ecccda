//! Error types for the whole crate.

use snafu::Snafu;

use crate::types::Tag;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("io error: {source}"))]
    #[snafu(context(false))]
    Io { source: std::io::Error },

    #[snafu(display("unsupported key packet version {version}"))]
    UnsupportedVersion { version: u8 },

    #[snafu(display("unknown {what} code {code}"))]
    UnknownAlgorithm { what: &'static str, code: u8 },

    #[snafu(display("malformed parameters: {message}"))]
    MalformedParams { message: String },

    #[snafu(display("malformed secret parameters: {message}"))]
    MalformedSecret { message: String },

    #[snafu(display("secret key checksum mismatch"))]
    ChecksumMismatch,

    #[snafu(display("incorrect passphrase"))]
    IncorrectPassphrase,

    #[snafu(display("secret key is already encrypted"))]
    AlreadyEncrypted,

    #[snafu(display("secret key is already decrypted"))]
    AlreadyDecrypted,

    #[snafu(display("refusing insecure s2k protection (usage {usage})"))]
    InsecureS2k { usage: u8 },

    #[snafu(display("key validation failed: {message}"))]
    ValidationFailed { message: String },

    #[snafu(display("packet {tag:?} is not allowed here"))]
    DisallowedPacket { tag: Tag },

    #[snafu(display("one-pass signature has no trailing signature"))]
    MissingTrailingSignature,

    #[snafu(display("trailing signature does not match one-pass header: {message}"))]
    MismatchedTrailingSignature { message: String },

    #[snafu(display("packet is incomplete"))]
    PacketIncomplete,

    #[snafu(display("unsupported: {message}"))]
    Unsupported { message: String },

    #[snafu(display("invalid key length"))]
    #[snafu(context(false))]
    InvalidKeyLength { source: cipher::InvalidLength },

    #[snafu(display("elliptic curve error"))]
    #[snafu(context(false))]
    EllipticCurve { source: elliptic_curve::Error },

    #[snafu(display("signature error: {source}"))]
    #[snafu(context(false))]
    Signature { source: signature::Error },

    #[snafu(display("rsa error: {source}"))]
    #[snafu(context(false))]
    Rsa { source: rsa::Error },

    #[snafu(display("{message}"))]
    Message { message: String },
}

macro_rules! format_err {
    ($($arg:tt)*) => {
        $crate::errors::Error::Message {
            message: format!($($arg)*),
        }
    };
}

macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::errors::format_err!($($arg)*))
    };
}

macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::errors::bail!($($arg)*);
        }
    };
}

macro_rules! ensure_eq {
    ($a:expr, $b:expr, $($arg:tt)*) => {
        if $a != $b {
            $crate::errors::bail!($($arg)*);
        }
    };
}

macro_rules! unsupported_err {
    ($($arg:tt)*) => {
        return Err($crate::errors::Error::Unsupported {
            message: format!($($arg)*),
        })
    };
}

pub(crate) use {bail, ensure, ensure_eq, format_err, unsupported_err};
