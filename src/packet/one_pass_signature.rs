use std::io;

use byteorder::WriteBytesExt;
use bytes::Buf;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{bail, Error, Result};
use crate::packet::public_key::PubKeyInner;
use crate::packet::signature::{Signature, SignatureType};
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Tag, Version};

/// One-Pass Signature packet: announces a trailing [`Signature`] so a
/// verifier can hash the message while it streams by.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-5.4>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnePassSignature {
    packet_version: Version,
    typ: SignatureType,
    hash_algorithm: HashAlgorithm,
    pub_algorithm: PublicKeyAlgorithm,
    key_id: KeyId,
    /// Zero when further one-pass signatures are nested ahead of this one.
    last: u8,
    /// The trailing signature, bound exactly once while verifying.
    corresponding_sig: Option<Signature>,
}

impl OnePassSignature {
    /// Parses the fixed 13-byte packet body.
    pub fn from_buf<B: Buf>(packet_version: Version, mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 3 {
            return Err(Error::UnsupportedVersion { version });
        }

        let typ = SignatureType::from(i.read_u8()?);
        let hash_algorithm = HashAlgorithm::from_code(i.read_u8()?)?;
        let pub_algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let key_id: KeyId = i.read_array::<8>()?.into();
        let last = i.read_u8()?;

        Ok(OnePassSignature {
            packet_version,
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last,
            corresponding_sig: None,
        })
    }

    /// The header a signature will announce itself with.
    pub fn from_details(
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        key_id: KeyId,
    ) -> Self {
        OnePassSignature {
            packet_version: Default::default(),
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last: 1,
            corresponding_sig: None,
        }
    }

    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn public_key_algorithm(&self) -> PublicKeyAlgorithm {
        self.pub_algorithm
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// `true` when no further one-pass signatures precede the data.
    pub fn is_last(&self) -> bool {
        self.last != 0
    }

    pub fn corresponding_sig(&self) -> Option<&Signature> {
        self.corresponding_sig.as_ref()
    }

    /// Binds the trailing signature. May only happen once.
    pub fn link_signature(&mut self, sig: Signature) -> Result<()> {
        if self.corresponding_sig.is_some() {
            bail!("one-pass signature is already linked to a signature");
        }
        self.corresponding_sig = Some(sig);
        Ok(())
    }

    /// Verifies the linked trailing signature over `data`.
    ///
    /// All four announced fields and the issuer have to match the trailing
    /// signature; verification itself is the signature's.
    pub fn verify(&self, key: &PubKeyInner, data: &[u8]) -> Result<()> {
        let sig = self
            .corresponding_sig
            .as_ref()
            .ok_or(Error::MissingTrailingSignature)?;

        if sig.typ() != self.typ {
            return Err(Error::MismatchedTrailingSignature {
                message: format!("signature type {:?} != {:?}", sig.typ(), self.typ),
            });
        }
        if sig.hash_algorithm() != self.hash_algorithm {
            return Err(Error::MismatchedTrailingSignature {
                message: format!(
                    "hash algorithm {:?} != {:?}",
                    sig.hash_algorithm(),
                    self.hash_algorithm
                ),
            });
        }
        if sig.public_key_algorithm() != self.pub_algorithm {
            return Err(Error::MismatchedTrailingSignature {
                message: format!(
                    "public key algorithm {:?} != {:?}",
                    sig.public_key_algorithm(),
                    self.pub_algorithm
                ),
            });
        }
        match sig.issuer_key_id() {
            Some(issuer) if issuer == self.key_id => {}
            Some(issuer) => {
                return Err(Error::MismatchedTrailingSignature {
                    message: format!("issuer {} != {}", issuer, self.key_id),
                });
            }
            None => {
                return Err(Error::MismatchedTrailingSignature {
                    message: "trailing signature carries no issuer".to_string(),
                });
            }
        }

        sig.verify(key, data)
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(3)?;
        writer.write_u8(self.typ.into())?;
        writer.write_u8(self.hash_algorithm.into())?;
        writer.write_u8(self.pub_algorithm.into())?;
        writer.write_all(self.key_id.as_bytes())?;
        writer.write_u8(self.last)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        13
    }
}

impl PacketTrait for OnePassSignature {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::OnePassSignature
    }
}
