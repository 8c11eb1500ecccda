use std::io;

use bytes::Bytes;

use crate::errors::{unsupported_err, Result};
use crate::packet::{
    LiteralData, OnePassSignature, PacketTrait, PublicKey, PublicSubkey, SecretKey, SecretSubkey,
    Signature,
};
use crate::ser::Serialize;
use crate::types::{Tag, Version};

/// The closed set of typed packets this crate models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    OnePassSignature(OnePassSignature),
    SecretKey(SecretKey),
    PublicKey(PublicKey),
    SecretSubkey(SecretSubkey),
    PublicSubkey(PublicSubkey),
    Signature(Signature),
    LiteralData(LiteralData),
}

impl Packet {
    /// Dispatches a framed packet body to the parser for its tag.
    pub fn from_bytes(version: Version, tag: Tag, body: Bytes) -> Result<Packet> {
        let mut body = body;
        let packet = match tag {
            Tag::OnePassSignature => {
                OnePassSignature::from_buf(version, &mut body)?.into()
            }
            Tag::SecretKey => SecretKey::from_buf(version, &mut body)?.into(),
            Tag::PublicKey => PublicKey::from_buf(version, &mut body)?.into(),
            Tag::SecretSubkey => SecretSubkey::from_buf(version, &mut body)?.into(),
            Tag::PublicSubkey => PublicSubkey::from_buf(version, &mut body)?.into(),
            Tag::Signature => Signature::from_buf(version, &mut body)?.into(),
            Tag::LiteralData => LiteralData::from_buf(version, &mut body)?.into(),
            _ => unsupported_err!("unsupported packet type {:?}", tag),
        };
        Ok(packet)
    }
}

macro_rules! impl_from {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Packet {
                fn from(packet: $variant) -> Packet {
                    Packet::$variant(packet)
                }
            }
        )+
    };
}

impl_from!(
    OnePassSignature,
    SecretKey,
    PublicKey,
    SecretSubkey,
    PublicSubkey,
    Signature,
    LiteralData,
);

macro_rules! for_each_variant {
    ($self:ident, $inner:ident, $expr:expr) => {
        match $self {
            Packet::OnePassSignature($inner) => $expr,
            Packet::SecretKey($inner) => $expr,
            Packet::PublicKey($inner) => $expr,
            Packet::SecretSubkey($inner) => $expr,
            Packet::PublicSubkey($inner) => $expr,
            Packet::Signature($inner) => $expr,
            Packet::LiteralData($inner) => $expr,
        }
    };
}

impl Serialize for Packet {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for_each_variant!(self, packet, packet.to_writer(writer))
    }

    fn write_len(&self) -> usize {
        for_each_variant!(self, packet, packet.write_len())
    }
}

impl PacketTrait for Packet {
    fn packet_version(&self) -> Version {
        for_each_variant!(self, packet, packet.packet_version())
    }

    fn tag(&self) -> Tag {
        for_each_variant!(self, packet, packet.tag())
    }
}
