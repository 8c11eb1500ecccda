use std::io;

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};

use crate::crypto::ecc_curve::{ecc_curve_from_oid, ECCCurve};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure_eq, Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{EcdsaPublicParams, Mpi};

/// The public parameters for the different algorithms.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PublicParams {
    RSA {
        n: Mpi,
        e: Mpi,
    },
    DSA {
        p: Mpi,
        q: Mpi,
        g: Mpi,
        y: Mpi,
    },
    Elgamal {
        p: Mpi,
        g: Mpi,
        y: Mpi,
    },
    ECDSA(EcdsaPublicParams),
    ECDH(EcdhPublicParams),
    EdDSALegacy {
        curve: ECCCurve,
        q: Mpi,
    },
    Unknown {
        data: Bytes,
    },
}

/// ECDH carries KDF parameters next to the curve point.
/// Ref: <https://tools.ietf.org/html/rfc6637#section-9>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EcdhPublicParams {
    pub curve: ECCCurve,
    pub p: Mpi,
    pub hash: HashAlgorithm,
    pub alg_sym: SymmetricKeyAlgorithm,
}

fn read_curve<B: Buf>(mut i: B) -> Result<ECCCurve> {
    // a one-octet size of the following field
    let oid_len = i.read_u8()?;
    // octets representing a curve OID
    let oid = i.take_bytes(oid_len as usize)?;
    ecc_curve_from_oid(&oid).ok_or_else(|| Error::Unsupported {
        message: format!("unknown curve oid {}", hex::encode(&oid)),
    })
}

impl PublicParams {
    /// Parses the algorithm specific fields of a key packet.
    ///
    /// `len`, when present, is the v5 octet count for these fields; it is
    /// required to delimit parameters of unknown algorithms.
    pub fn from_buf<B: Buf>(
        alg: PublicKeyAlgorithm,
        len: Option<usize>,
        mut i: B,
    ) -> Result<Self> {
        match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => {
                let n = Mpi::from_buf(&mut i)?;
                let e = Mpi::from_buf(&mut i)?;
                Ok(PublicParams::RSA { n, e })
            }
            PublicKeyAlgorithm::DSA => {
                let p = Mpi::from_buf(&mut i)?;
                let q = Mpi::from_buf(&mut i)?;
                let g = Mpi::from_buf(&mut i)?;
                let y = Mpi::from_buf(&mut i)?;
                Ok(PublicParams::DSA { p, q, g, y })
            }
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalSign => {
                let p = Mpi::from_buf(&mut i)?;
                let g = Mpi::from_buf(&mut i)?;
                let y = Mpi::from_buf(&mut i)?;
                Ok(PublicParams::Elgamal { p, g, y })
            }
            PublicKeyAlgorithm::ECDSA => {
                let curve = read_curve(&mut i)?;
                // MPI of an EC point representing a public key
                let p = Mpi::from_buf(&mut i)?;
                Ok(PublicParams::ECDSA(EcdsaPublicParams::try_from_mpi(
                    &p, curve,
                )?))
            }
            PublicKeyAlgorithm::ECDH => {
                let curve = read_curve(&mut i)?;
                // MPI of an EC point representing a public key
                let p = Mpi::from_buf(&mut i)?;
                // a one-octet size of the following fields
                let kdf_len = i.read_u8()?;
                ensure_eq!(kdf_len, 3, "invalid kdf parameter length {}", kdf_len);
                // a one-octet value 01, reserved for future extensions
                let reserved = i.read_u8()?;
                ensure_eq!(reserved, 1, "invalid kdf reserved octet {}", reserved);
                // a one-octet hash function ID used with a KDF
                let hash = HashAlgorithm::from_code(i.read_u8()?)?;
                // a one-octet algorithm ID for the symmetric algorithm used to
                // wrap the symmetric key for message encryption
                let alg_sym = SymmetricKeyAlgorithm::from_code(i.read_u8()?)?;

                Ok(PublicParams::ECDH(EcdhPublicParams {
                    curve,
                    p,
                    hash,
                    alg_sym,
                }))
            }
            PublicKeyAlgorithm::EdDSALegacy => {
                let curve = read_curve(&mut i)?;
                ensure_eq!(
                    curve,
                    ECCCurve::Ed25519,
                    "unsupported EdDSA curve {:?}",
                    curve
                );
                // MPI of an EC point representing a public key
                let q = Mpi::from_buf(&mut i)?;
                Ok(PublicParams::EdDSALegacy { curve, q })
            }
            PublicKeyAlgorithm::DiffieHellman | PublicKeyAlgorithm::Unknown(_) => match len {
                Some(len) => {
                    let data = i.take_bytes(len)?;
                    Ok(PublicParams::Unknown { data })
                }
                // without a length framing there is no way to know how many
                // octets belong to this key
                None => Ok(PublicParams::Unknown { data: i.rest() }),
            },
        }
    }

    pub fn algorithm_details(&self) -> String {
        match self {
            PublicParams::RSA { n, .. } => format!("RSA {}", n.len() * 8),
            PublicParams::DSA { p, .. } => format!("DSA {}", p.len() * 8),
            PublicParams::Elgamal { p, .. } => format!("Elgamal {}", p.len() * 8),
            PublicParams::ECDSA(params) => format!("ECDSA {:?}", params.curve()),
            PublicParams::ECDH(params) => format!("ECDH {:?}", params.curve),
            PublicParams::EdDSALegacy { curve, .. } => format!("EdDSA {curve:?}"),
            PublicParams::Unknown { .. } => "unknown".to_string(),
        }
    }
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::RSA { n, e } => {
                n.to_writer(writer)?;
                e.to_writer(writer)?;
            }
            PublicParams::DSA { p, q, g, y } => {
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::Elgamal { p, g, y } => {
                p.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::ECDSA(params) => {
                params.to_writer(writer)?;
            }
            PublicParams::ECDH(EcdhPublicParams {
                curve,
                p,
                hash,
                alg_sym,
            }) => {
                let oid = curve.oid();
                writer.write_u8(oid.len() as u8)?;
                writer.write_all(&oid)?;
                p.to_writer(writer)?;
                writer.write_u8(3)?;
                writer.write_u8(1)?;
                writer.write_u8((*hash).into())?;
                writer.write_u8((*alg_sym).into())?;
            }
            PublicParams::EdDSALegacy { curve, q } => {
                let oid = curve.oid();
                writer.write_u8(oid.len() as u8)?;
                writer.write_all(&oid)?;
                q.to_writer(writer)?;
            }
            PublicParams::Unknown { data } => {
                writer.write_all(data)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PublicParams::RSA { n, e } => n.write_len() + e.write_len(),
            PublicParams::DSA { p, q, g, y } => {
                p.write_len() + q.write_len() + g.write_len() + y.write_len()
            }
            PublicParams::Elgamal { p, g, y } => p.write_len() + g.write_len() + y.write_len(),
            PublicParams::ECDSA(params) => params.write_len(),
            PublicParams::ECDH(EcdhPublicParams { curve, p, .. }) => {
                1 + curve.oid().len() + p.write_len() + 4
            }
            PublicParams::EdDSALegacy { curve, q } => 1 + curve.oid().len() + q.write_len(),
            PublicParams::Unknown { data } => data.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(alg: PublicKeyAlgorithm, params: &PublicParams) {
        let bytes = params.to_bytes().unwrap();
        assert_eq!(bytes.len(), params.write_len());
        let back = PublicParams::from_buf(alg, None, &mut &bytes[..]).unwrap();
        assert_eq!(params, &back);
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn rsa_roundtrip() {
        let params = PublicParams::RSA {
            n: Mpi::from_slice(&[0xc1; 256]),
            e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
        };
        roundtrip(PublicKeyAlgorithm::RSA, &params);
    }

    #[test]
    fn dsa_roundtrip() {
        let params = PublicParams::DSA {
            p: Mpi::from_slice(&[0xaa; 128]),
            q: Mpi::from_slice(&[0xbb; 20]),
            g: Mpi::from_slice(&[0x02]),
            y: Mpi::from_slice(&[0xcc; 128]),
        };
        roundtrip(PublicKeyAlgorithm::DSA, &params);
    }

    #[test]
    fn ecdh_roundtrip() {
        let params = PublicParams::ECDH(EcdhPublicParams {
            curve: ECCCurve::Curve25519,
            p: Mpi::from_slice(&[0x40; 33]),
            hash: HashAlgorithm::Sha256,
            alg_sym: SymmetricKeyAlgorithm::Aes128,
        });
        roundtrip(PublicKeyAlgorithm::ECDH, &params);
    }

    #[test]
    fn short_input_is_malformed() {
        let res = PublicParams::from_buf(PublicKeyAlgorithm::RSA, None, &mut &[0x00, 0x11][..]);
        assert!(matches!(res, Err(Error::MalformedParams { .. })));
    }
}
