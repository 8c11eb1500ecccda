use std::io;

use byteorder::WriteBytesExt;
use elliptic_curve::sec1::ToEncodedPoint;

use crate::crypto::ecc_curve::ECCCurve;
use crate::errors::{ensure, Result};
use crate::ser::Serialize;
use crate::types::Mpi;

#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum EcdsaPublicParams {
    P256 {
        #[cfg_attr(test, proptest(strategy = "tests::p256_pub_gen()"))]
        key: p256::PublicKey,
    },
    P384 {
        #[cfg_attr(test, proptest(strategy = "tests::p384_pub_gen()"))]
        key: p384::PublicKey,
    },
    P521 {
        #[cfg_attr(test, proptest(strategy = "tests::p521_pub_gen()"))]
        key: p521::PublicKey,
    },
    Secp256k1 {
        #[cfg_attr(test, proptest(strategy = "tests::k256_pub_gen()"))]
        key: k256::PublicKey,
    },
    #[cfg_attr(test, proptest(skip))]
    Unsupported { curve: ECCCurve, p: Mpi },
}

impl EcdsaPublicParams {
    pub fn try_from_mpi(p: &Mpi, curve: ECCCurve) -> Result<Self> {
        match curve {
            ECCCurve::P256 => {
                ensure!(p.len() <= 65, "invalid public key length");
                let public = p256::PublicKey::from_sec1_bytes(p.as_ref())?;
                Ok(EcdsaPublicParams::P256 { key: public })
            }
            ECCCurve::P384 => {
                ensure!(p.len() <= 97, "invalid public key length");
                let public = p384::PublicKey::from_sec1_bytes(p.as_ref())?;
                Ok(EcdsaPublicParams::P384 { key: public })
            }
            ECCCurve::P521 => {
                ensure!(p.len() <= 133, "invalid public key length");
                let public = p521::PublicKey::from_sec1_bytes(p.as_ref())?;
                Ok(EcdsaPublicParams::P521 { key: public })
            }
            ECCCurve::Secp256k1 => {
                ensure!(p.len() <= 65, "invalid public key length");
                let public = k256::PublicKey::from_sec1_bytes(p.as_ref())?;
                Ok(EcdsaPublicParams::Secp256k1 { key: public })
            }
            _ => Ok(EcdsaPublicParams::Unsupported {
                curve,
                p: p.clone(),
            }),
        }
    }

    pub fn curve(&self) -> ECCCurve {
        match self {
            EcdsaPublicParams::P256 { .. } => ECCCurve::P256,
            EcdsaPublicParams::P384 { .. } => ECCCurve::P384,
            EcdsaPublicParams::P521 { .. } => ECCCurve::P521,
            EcdsaPublicParams::Secp256k1 { .. } => ECCCurve::Secp256k1,
            EcdsaPublicParams::Unsupported { curve, .. } => *curve,
        }
    }

    pub const fn secret_key_length(&self) -> Option<usize> {
        match self {
            EcdsaPublicParams::P256 { .. } => Some(32),
            EcdsaPublicParams::P384 { .. } => Some(48),
            EcdsaPublicParams::P521 { .. } => Some(66),
            EcdsaPublicParams::Secp256k1 { .. } => Some(32),
            EcdsaPublicParams::Unsupported { .. } => None,
        }
    }

    fn point_mpi(&self) -> Mpi {
        match self {
            EcdsaPublicParams::P256 { key } => {
                Mpi::from_slice(key.to_encoded_point(false).as_bytes())
            }
            EcdsaPublicParams::P384 { key } => {
                Mpi::from_slice(key.to_encoded_point(false).as_bytes())
            }
            EcdsaPublicParams::P521 { key } => {
                Mpi::from_slice(key.to_encoded_point(false).as_bytes())
            }
            EcdsaPublicParams::Secp256k1 { key } => {
                Mpi::from_slice(key.to_encoded_point(false).as_bytes())
            }
            EcdsaPublicParams::Unsupported { p, .. } => p.clone(),
        }
    }
}

impl Serialize for EcdsaPublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let oid = self.curve().oid();
        writer.write_u8(oid.len() as u8)?;
        writer.write_all(&oid)?;

        self.point_mpi().to_writer(writer)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        let mut sum = 1;
        sum += self.curve().oid().len();
        sum += self.point_mpi().write_len();
        sum
    }
}
