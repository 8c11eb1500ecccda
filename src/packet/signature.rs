use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, Utc};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::{ecdsa, eddsa, rsa};
use crate::errors::{bail, ensure, ensure_eq, unsupported_err, Error, Result};
use crate::packet::public_key::PubKeyInner;
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Mpi, PlainSecretParams, PublicParams, Tag, Version};

/// Signature type identifiers.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-5.2.1>
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    Binary = 0x00,
    Text = 0x01,
    Standalone = 0x02,
    CertGeneric = 0x10,
    CertPersona = 0x11,
    CertCasual = 0x12,
    CertPositive = 0x13,
    SubkeyBinding = 0x18,
    KeyBinding = 0x19,
    Key = 0x1F,
    KeyRevocation = 0x20,
    SubkeyRevocation = 0x28,
    CertRevocation = 0x30,
    Timestamp = 0x40,
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

const SUBPACKET_ISSUER: u8 = 16;

/// A version 4 signature packet.
///
/// Subpackets are carried opaquely; only the issuer key id is interpreted,
/// which is what the one-pass pairing needs.
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    packet_version: Version,
    typ: SignatureType,
    pub_alg: PublicKeyAlgorithm,
    hash_alg: HashAlgorithm,
    #[debug("{}", hex::encode(hashed_subpackets))]
    hashed_subpackets: Bytes,
    #[debug("{}", hex::encode(unhashed_subpackets))]
    unhashed_subpackets: Bytes,
    signed_hash_value: [u8; 2],
    sig: Vec<Mpi>,
}

impl Signature {
    /// Parses the packet body.
    /// Ref: <https://tools.ietf.org/html/rfc4880#section-5.2.3>
    pub fn from_buf<B: Buf>(packet_version: Version, mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 4 {
            return Err(Error::UnsupportedVersion { version });
        }

        let typ = SignatureType::from(i.read_u8()?);
        let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
        let hash_alg = HashAlgorithm::from_code(i.read_u8()?)?;

        let hashed_len = i.read_be_u16()? as usize;
        let hashed_subpackets = i.take_bytes(hashed_len)?;
        let unhashed_len = i.read_be_u16()? as usize;
        let unhashed_subpackets = i.take_bytes(unhashed_len)?;

        let signed_hash_value = i.read_array::<2>()?;

        let mut sig = Vec::new();
        while i.has_remaining() {
            sig.push(Mpi::from_buf(&mut i)?);
        }

        Ok(Signature {
            packet_version,
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets,
            unhashed_subpackets,
            signed_hash_value,
            sig,
        })
    }

    /// Signs `data` with the given key, producing a binary signature with a
    /// creation-time subpacket and the issuer in the unhashed area.
    pub fn sign(
        details: &PubKeyInner,
        secret: &PlainSecretParams,
        typ: SignatureType,
        hash_alg: HashAlgorithm,
        created_at: DateTime<Utc>,
        data: &[u8],
    ) -> Result<Signature> {
        // creation time, subpacket type 2
        let mut hashed = Vec::with_capacity(6);
        hashed.push(5);
        hashed.push(2);
        let timestamp: u32 = created_at.timestamp().try_into().map_err(|_| {
            Error::MalformedParams {
                message: "signature time outside the wire format range".to_string(),
            }
        })?;
        hashed.extend_from_slice(&timestamp.to_be_bytes());

        // issuer, subpacket type 16
        let mut unhashed = Vec::with_capacity(10);
        unhashed.push(9);
        unhashed.push(SUBPACKET_ISSUER);
        unhashed.extend_from_slice(details.key_id().as_bytes());

        let mut signature = Signature {
            packet_version: Default::default(),
            typ,
            pub_alg: details.algorithm(),
            hash_alg,
            hashed_subpackets: hashed.into(),
            unhashed_subpackets: unhashed.into(),
            signed_hash_value: [0; 2],
            sig: Vec::new(),
        };

        let digest = signature.compute_digest(data)?;
        signature.signed_hash_value = [digest[0], digest[1]];
        signature.sig = match (details.public_params(), secret) {
            (PublicParams::RSA { n, e }, PlainSecretParams::RSA { d, p, q, .. }) => {
                rsa::sign(n, e, d, p, q, hash_alg, &digest)?
            }
            (PublicParams::ECDSA(params), PlainSecretParams::ECDSA { d }) => {
                ecdsa::sign(params, d, &digest)?
            }
            (PublicParams::EdDSALegacy { .. }, PlainSecretParams::EdDSALegacy { d }) => {
                eddsa::sign(d, &digest)?
            }
            _ => unsupported_err!("signing with {:?}", details.algorithm()),
        };

        Ok(signature)
    }

    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    pub fn public_key_algorithm(&self) -> PublicKeyAlgorithm {
        self.pub_alg
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_alg
    }

    /// The issuer key id, if one of the subpacket areas carries it.
    pub fn issuer_key_id(&self) -> Option<KeyId> {
        find_issuer(&self.unhashed_subpackets).or_else(|| find_issuer(&self.hashed_subpackets))
    }

    /// The digest this signature stands for: `data`, then the hashed
    /// fields, then the v4 trailer.
    fn compute_digest(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = self.hash_alg.new_hasher()?;
        hasher.update(data);

        let mut fields = Vec::with_capacity(6 + self.hashed_subpackets.len());
        fields.push(4);
        fields.push(self.typ.into());
        fields.push(self.pub_alg.into());
        fields.push(self.hash_alg.into());
        fields.extend_from_slice(&(self.hashed_subpackets.len() as u16).to_be_bytes());
        fields.extend_from_slice(&self.hashed_subpackets);
        hasher.update(&fields);

        let mut trailer = [0u8; 6];
        trailer[0] = 4;
        trailer[1] = 0xFF;
        trailer[2..].copy_from_slice(&(fields.len() as u32).to_be_bytes());
        hasher.update(&trailer);

        Ok(hasher.finish())
    }

    /// Verifies this signature over `data` with the given public key.
    pub fn verify(&self, key: &PubKeyInner, data: &[u8]) -> Result<()> {
        let digest = self.compute_digest(data)?;
        ensure!(
            digest[..2] == self.signed_hash_value,
            "signed hash value does not match the data"
        );

        match key.public_params() {
            PublicParams::RSA { n, e } => {
                ensure_eq!(self.sig.len(), 1, "invalid rsa signature");
                rsa::verify(n, e, self.hash_alg, &digest, self.sig[0].as_ref())
            }
            PublicParams::ECDSA(params) => ecdsa::verify(params, &digest, &self.sig),
            PublicParams::EdDSALegacy { q, .. } => eddsa::verify(q, &digest, &self.sig),
            PublicParams::DSA { .. } | PublicParams::Elgamal { .. } => {
                unsupported_err!("verification with {:?}", key.algorithm())
            }
            PublicParams::ECDH(_) | PublicParams::Unknown { .. } => {
                bail!("{:?} can not be used to verify", key.algorithm())
            }
        }
    }
}

fn find_issuer(area: &[u8]) -> Option<KeyId> {
    let mut i = area;
    while !i.is_empty() {
        // subpacket length encoding mirrors the new style packet lengths
        let (len, consumed) = match i[0] {
            b0 @ 0..=191 => (b0 as usize, 1),
            b0 @ 192..=254 => {
                let b1 = *i.get(1)?;
                ((((b0 as usize) - 192) << 8) + (b1 as usize) + 192, 2)
            }
            255 => {
                let raw: [u8; 4] = i.get(1..5)?.try_into().ok()?;
                (u32::from_be_bytes(raw) as usize, 5)
            }
        };
        let body = i.get(consumed..consumed + len)?;
        if len > 0 {
            // high bit of the type octet is the critical flag
            let typ = body[0] & 0x7f;
            if typ == SUBPACKET_ISSUER && len == 9 {
                let raw: [u8; 8] = body[1..9].try_into().ok()?;
                return Some(raw.into());
            }
        }
        i = &i[consumed + len..];
    }
    None
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(4)?;
        writer.write_u8(self.typ.into())?;
        writer.write_u8(self.pub_alg.into())?;
        writer.write_u8(self.hash_alg.into())?;
        writer.write_u16::<BigEndian>(self.hashed_subpackets.len() as u16)?;
        writer.write_all(&self.hashed_subpackets)?;
        writer.write_u16::<BigEndian>(self.unhashed_subpackets.len() as u16)?;
        writer.write_all(&self.unhashed_subpackets)?;
        writer.write_all(&self.signed_hash_value)?;
        for mpi in &self.sig {
            mpi.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        4 + 2
            + self.hashed_subpackets.len()
            + 2
            + self.unhashed_subpackets.len()
            + 2
            + self.sig.iter().map(Serialize::write_len).sum::<usize>()
    }
}

impl PacketTrait for Signature {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::Signature
    }
}
