use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use digest::Digest;
use sha1_checked::Sha1;
use sha2::Sha256;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{ensure_eq, Error, Result};
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, KeyVersion, PublicParams, Tag, Version};

/// The shared fields of public and secret key packets: everything the
/// fingerprint is computed over.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PubKeyInner {
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    public_params: PublicParams,
}

impl PubKeyInner {
    pub fn new(
        version: KeyVersion,
        algorithm: PublicKeyAlgorithm,
        created_at: DateTime<Utc>,
        public_params: PublicParams,
    ) -> Self {
        PubKeyInner {
            version,
            algorithm,
            // the wire format carries whole seconds
            created_at: created_at.trunc_subsecs(0),
            public_params,
        }
    }

    /// Parses the body of a public key packet.
    /// Ref: <https://tools.ietf.org/html/draft-ietf-openpgp-rfc4880bis-04#section-5.5.2>
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let version = KeyVersion::try_from_u8(i.read_u8()?)?;

        let created_at = i.read_be_u32()?;
        let created_at = Utc
            .timestamp_opt(i64::from(created_at), 0)
            .single()
            .ok_or_else(|| Error::MalformedParams {
                message: "invalid creation time".to_string(),
            })?;

        let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);

        // v5 keys frame the algorithm specific fields with an octet count,
        // which lets params of unknown algorithms be skipped
        let params_len = if version == KeyVersion::V5 {
            Some(i.read_be_u32()? as usize)
        } else {
            None
        };

        let before = i.remaining();
        let public_params = PublicParams::from_buf(algorithm, params_len, &mut i)?;
        if let Some(len) = params_len {
            ensure_eq!(
                before - i.remaining(),
                len,
                "inconsistent key material length"
            );
        }

        Ok(PubKeyInner {
            version,
            algorithm,
            created_at,
            public_params,
        })
    }

    pub fn version(&self) -> KeyVersion {
        self.version
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.public_params
    }

    /// Human readable algorithm description, e.g. `RSA 2048`.
    pub fn algorithm_info(&self) -> String {
        self.public_params.algorithm_details()
    }

    /// Frames the serialized key for fingerprint and signature hashing.
    ///
    /// v4 uses `0x99 || len16`, v5 uses `0x9A || len32`.
    pub fn write_for_hash<W: io::Write>(&self, version: KeyVersion, writer: &mut W) -> Result<()> {
        let body = self.to_bytes()?;
        match version {
            KeyVersion::V4 => {
                writer.write_u8(0x99)?;
                writer.write_u16::<BigEndian>(body.len().try_into().map_err(|_| {
                    Error::MalformedParams {
                        message: "key too large for v4 hash framing".to_string(),
                    }
                })?)?;
            }
            KeyVersion::V5 => {
                writer.write_u8(0x9A)?;
                writer.write_u32::<BigEndian>(body.len() as u32)?;
            }
        }
        writer.write_all(&body)?;
        Ok(())
    }

    /// The SHA-1 (v4) or SHA-256 (v5) fingerprint of this key.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut framed = Vec::with_capacity(self.write_len() + 5);
        self.write_for_hash(self.version, &mut framed)
            .expect("writing to a vec");

        match self.version {
            KeyVersion::V4 => {
                let digest: [u8; 20] = Sha1::digest(&framed).into();
                Fingerprint::V4(digest)
            }
            KeyVersion::V5 => {
                let digest: [u8; 32] = Sha256::digest(&framed).into();
                Fingerprint::V5(digest)
            }
        }
    }

    /// The 8-byte key id: the low 8 fingerprint bytes for v4 keys, the
    /// high 8 for v5 keys.
    pub fn key_id(&self) -> KeyId {
        let fingerprint = self.fingerprint();
        let raw: [u8; 8] = match &fingerprint {
            Fingerprint::V4(data) => data[12..20].try_into().expect("fixed size"),
            Fingerprint::V5(data) => data[0..8].try_into().expect("fixed size"),
        };
        raw.into()
    }

    /// Byte-wise comparison of the serialized key bodies, cheaper than
    /// hashing both sides.
    pub fn has_same_fingerprint_as(&self, other: &PubKeyInner) -> bool {
        match (self.to_bytes(), other.to_bytes()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for PubKeyInner {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version.into())?;
        writer.write_u32::<BigEndian>(self.created_at.timestamp().try_into().map_err(|_| {
            Error::MalformedParams {
                message: "creation time outside the wire format range".to_string(),
            }
        })?)?;
        writer.write_u8(self.algorithm.into())?;

        if self.version == KeyVersion::V5 {
            writer.write_u32::<BigEndian>(self.public_params.write_len() as u32)?;
        }

        self.public_params.to_writer(writer)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = 1 + 4 + 1;
        if self.version == KeyVersion::V5 {
            sum += 4;
        }
        sum += self.public_params.write_len();
        sum
    }
}

macro_rules! impl_public_key {
    ($name:ident, $tag:expr) => {
        #[derive(Debug, PartialEq, Eq, Clone)]
        pub struct $name {
            packet_version: Version,
            inner: PubKeyInner,
        }

        impl $name {
            pub fn from_inner(inner: PubKeyInner) -> Self {
                $name {
                    packet_version: Default::default(),
                    inner,
                }
            }

            /// Parses the packet body.
            pub fn from_buf<B: Buf>(packet_version: Version, input: B) -> Result<Self> {
                let inner = PubKeyInner::from_buf(input)?;
                Ok($name {
                    packet_version,
                    inner,
                })
            }

            pub fn version(&self) -> KeyVersion {
                self.inner.version()
            }

            pub fn algorithm(&self) -> PublicKeyAlgorithm {
                self.inner.algorithm()
            }

            pub fn created_at(&self) -> &DateTime<Utc> {
                self.inner.created_at()
            }

            pub fn public_params(&self) -> &PublicParams {
                self.inner.public_params()
            }

            pub fn algorithm_info(&self) -> String {
                self.inner.algorithm_info()
            }

            pub fn fingerprint(&self) -> Fingerprint {
                self.inner.fingerprint()
            }

            pub fn key_id(&self) -> KeyId {
                self.inner.key_id()
            }

            pub fn write_for_hash<W: io::Write>(
                &self,
                version: KeyVersion,
                writer: &mut W,
            ) -> Result<()> {
                self.inner.write_for_hash(version, writer)
            }

            pub fn has_same_fingerprint_as(&self, other: &$name) -> bool {
                self.inner.has_same_fingerprint_as(&other.inner)
            }

            pub fn as_inner(&self) -> &PubKeyInner {
                &self.inner
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.inner.to_writer(writer)
            }

            fn write_len(&self) -> usize {
                self.inner.write_len()
            }
        }

        impl PacketTrait for $name {
            fn packet_version(&self) -> Version {
                self.packet_version
            }

            fn tag(&self) -> Tag {
                $tag
            }
        }
    };
}

impl_public_key!(PublicKey, Tag::PublicKey);
impl_public_key!(PublicSubkey, Tag::PublicSubkey);
