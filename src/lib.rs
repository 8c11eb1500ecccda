//! The OpenPGP key-material packets (public/secret keys and subkeys), the
//! one-pass signature packet, and the packet-list codec that frames them,
//! including partial-length streamed bodies.
//!
//! Wire formats follow RFC 4880, the v5 key layout of
//! draft-ietf-openpgp-rfc4880bis-04, and RFC 6637 for the ECC encodings.
#![warn(clippy::unwrap_used)]

pub mod config;
pub mod crypto;
pub mod errors;
pub mod packet;
pub mod parsing;
pub mod ser;
pub mod types;

pub use crate::config::{Config, ConfigBuilder};
pub use crate::errors::{Error, Result};
pub use crate::packet::{
    LiteralData, OnePassSignature, Packet, PacketList, PacketParser, PacketStream, PublicKey,
    PublicSubkey, SecretKey, SecretSubkey, Signature,
};
