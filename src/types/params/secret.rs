use std::io;

use bytes::Buf;
use num_bigint::BigUint;
use rand::{CryptoRng, Rng};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::ecc_curve::ECCCurve;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{ecdsa, eddsa, rsa};
use crate::errors::{bail, ensure, ensure_eq, unsupported_err, Error, Result};
use crate::ser::Serialize;
use crate::types::{EcdhPublicParams, EcdsaPublicParams, Mpi, PublicParams, StringToKey};

/// The decrypted secret parameters for the different algorithms.
///
/// All variants are overwritten with zeros before their memory is released.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub enum PlainSecretParams {
    RSA { d: Mpi, p: Mpi, q: Mpi, u: Mpi },
    DSA { x: Mpi },
    Elgamal { x: Mpi },
    ECDSA { d: Mpi },
    ECDH { d: Mpi },
    EdDSALegacy { d: Mpi },
}

/// The values stay out of debug output.
impl std::fmt::Debug for PlainSecretParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlainSecretParams::RSA { .. } => "RSA",
            PlainSecretParams::DSA { .. } => "DSA",
            PlainSecretParams::Elgamal { .. } => "Elgamal",
            PlainSecretParams::ECDSA { .. } => "ECDSA",
            PlainSecretParams::ECDH { .. } => "ECDH",
            PlainSecretParams::EdDSALegacy { .. } => "EdDSALegacy",
        };
        write!(f, "PlainSecretParams::{name}(..)")
    }
}

impl PlainSecretParams {
    /// Parses the cleartext algorithm-specific secret fields.
    ///
    /// For ECC algorithms the secret scalar is checked against the range
    /// admitted by the curve.
    pub fn try_from_slice(
        data: &[u8],
        alg: PublicKeyAlgorithm,
        public_params: &PublicParams,
    ) -> Result<Self> {
        let mut i = data;
        let params = match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => {
                let d = Mpi::from_buf(&mut i)?;
                let p = Mpi::from_buf(&mut i)?;
                let q = Mpi::from_buf(&mut i)?;
                let u = Mpi::from_buf(&mut i)?;
                PlainSecretParams::RSA { d, p, q, u }
            }
            PublicKeyAlgorithm::DSA => PlainSecretParams::DSA {
                x: Mpi::from_buf(&mut i)?,
            },
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalSign => {
                PlainSecretParams::Elgamal {
                    x: Mpi::from_buf(&mut i)?,
                }
            }
            PublicKeyAlgorithm::ECDSA => {
                let d = Mpi::from_buf(&mut i)?;
                if let PublicParams::ECDSA(public) = public_params {
                    ensure_scalar_in_range(&d, public)?;
                }
                PlainSecretParams::ECDSA { d }
            }
            PublicKeyAlgorithm::ECDH => {
                let d = Mpi::from_buf(&mut i)?;
                if let PublicParams::ECDH(EcdhPublicParams { curve, .. }) = public_params {
                    ensure!(
                        d.len() <= curve.coordinate_len(),
                        "secret scalar too large for {:?}",
                        curve
                    );
                }
                PlainSecretParams::ECDH { d }
            }
            PublicKeyAlgorithm::EdDSALegacy => {
                let d = Mpi::from_buf(&mut i)?;
                ensure!(d.len() <= 32, "invalid EdDSA seed length {}", d.len());
                PlainSecretParams::EdDSALegacy { d }
            }
            PublicKeyAlgorithm::DiffieHellman | PublicKeyAlgorithm::Unknown(_) => {
                unsupported_err!("secret params for {:?}", alg);
            }
        };

        ensure_eq!(i.remaining(), 0, "trailing bytes after secret params");

        Ok(params)
    }

    /// Two-octet sum of the serialized parameters, mod 65536.
    pub fn checksum(&self) -> Result<[u8; 2]> {
        let bytes = self.to_bytes()?;
        Ok(checksum_simple(&bytes))
    }

    /// Algebraic consistency check against the public half.
    pub fn validate<R: CryptoRng + Rng>(
        &self,
        rng: R,
        public_params: &PublicParams,
    ) -> Result<()> {
        match (self, public_params) {
            (PlainSecretParams::RSA { d, p, q, u }, PublicParams::RSA { n, e }) => {
                rsa::validate(n, e, d, p, q, u)
            }
            (PlainSecretParams::DSA { x }, PublicParams::DSA { p, q: _, g, y }) => {
                validate_discrete_log(x, p, g, y)
            }
            (PlainSecretParams::Elgamal { x }, PublicParams::Elgamal { p, g, y }) => {
                validate_discrete_log(x, p, g, y)
            }
            (PlainSecretParams::ECDSA { d }, PublicParams::ECDSA(public)) => {
                ecdsa::validate(rng, public, d)
            }
            (PlainSecretParams::ECDH { d }, PublicParams::ECDH(public)) => {
                validate_ecdh(d, public)
            }
            (PlainSecretParams::EdDSALegacy { d }, PublicParams::EdDSALegacy { q, .. }) => {
                eddsa::validate(d, q)
            }
            _ => bail!("secret and public params are for different algorithms"),
        }
    }
}

impl Serialize for PlainSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PlainSecretParams::RSA { d, p, q, u } => {
                d.to_writer(writer)?;
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                u.to_writer(writer)?;
            }
            PlainSecretParams::DSA { x } | PlainSecretParams::Elgamal { x } => {
                x.to_writer(writer)?;
            }
            PlainSecretParams::ECDSA { d }
            | PlainSecretParams::ECDH { d }
            | PlainSecretParams::EdDSALegacy { d } => {
                d.to_writer(writer)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PlainSecretParams::RSA { d, p, q, u } => {
                d.write_len() + p.write_len() + q.write_len() + u.write_len()
            }
            PlainSecretParams::DSA { x } | PlainSecretParams::Elgamal { x } => x.write_len(),
            PlainSecretParams::ECDSA { d }
            | PlainSecretParams::ECDH { d }
            | PlainSecretParams::EdDSALegacy { d } => d.write_len(),
        }
    }
}

/// Sum of all bytes, mod 65536, big-endian.
pub fn checksum_simple(data: &[u8]) -> [u8; 2] {
    let mut sum = 0u16;
    for b in data {
        sum = sum.wrapping_add(u16::from(*b));
    }
    sum.to_be_bytes()
}

fn ensure_scalar_in_range(d: &Mpi, public: &EcdsaPublicParams) -> Result<()> {
    let res = match public {
        EcdsaPublicParams::P256 { .. } => {
            p256::SecretKey::from_slice(&d.to_padded(32)?).map(|_| ())
        }
        EcdsaPublicParams::P384 { .. } => {
            p384::SecretKey::from_slice(&d.to_padded(48)?).map(|_| ())
        }
        EcdsaPublicParams::P521 { .. } => {
            p521::SecretKey::from_slice(&d.to_padded(66)?).map(|_| ())
        }
        EcdsaPublicParams::Secp256k1 { .. } => {
            k256::SecretKey::from_slice(&d.to_padded(32)?).map(|_| ())
        }
        EcdsaPublicParams::Unsupported { .. } => return Ok(()),
    };
    res.map_err(|_| Error::MalformedSecret {
        message: "secret scalar out of range for the curve".to_string(),
    })
}

/// Checks `y == g^x mod p`, the shared relation of DSA and Elgamal keys.
fn validate_discrete_log(x: &Mpi, p: &Mpi, g: &Mpi, y: &Mpi) -> Result<()> {
    let p = BigUint::from_bytes_be(p.as_ref());
    let g = BigUint::from_bytes_be(g.as_ref());
    let y = BigUint::from_bytes_be(y.as_ref());
    let x = BigUint::from_bytes_be(x.as_ref());

    ensure!(
        g.modpow(&x, &p) == y,
        "public key does not match the secret exponent"
    );
    Ok(())
}

fn validate_ecdh(d: &Mpi, public: &EcdhPublicParams) -> Result<()> {
    match public.curve {
        ECCCurve::Curve25519 => {
            ensure!(d.len() <= 32, "invalid x25519 secret length");
            // OpenPGP stores the scalar big-endian, X25519 wants native order
            let mut secret = d.to_padded(32)?;
            secret.reverse();
            let secret = x25519_dalek::StaticSecret::from(
                <[u8; 32]>::try_from(&secret[..]).expect("fixed size"),
            );
            let derived = x25519_dalek::PublicKey::from(&secret);

            let mut q = vec![0x40];
            q.extend_from_slice(derived.as_bytes());
            ensure!(
                q == public.p.as_ref(),
                "public point does not match the secret scalar"
            );
            Ok(())
        }
        ECCCurve::P256 => {
            use elliptic_curve::sec1::ToEncodedPoint;

            let secret = p256::SecretKey::from_slice(&d.to_padded(32)?)?;
            let derived = secret.public_key().to_encoded_point(false);
            ensure!(
                derived.as_bytes() == public.p.as_ref(),
                "public point does not match the secret scalar"
            );
            Ok(())
        }
        _ => unsupported_err!("ECDH validation over {:?}", public.curve),
    }
}

/// How the secret material is (or is not) protected.
///
/// The iv/nonce buffers are scrubbed together with the ciphertext when the
/// protection state is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, derive_more::Debug)]
pub enum S2kParams {
    /// Usage octet is a bare symmetric algorithm code. Deprecated, read-only.
    LegacyCfb {
        #[zeroize(skip)]
        sym_alg: SymmetricKeyAlgorithm,
        #[debug("{}", hex::encode(iv))]
        iv: Vec<u8>,
    },
    /// Usage octet 254: CFB with a SHA-1 integrity tag inside the ciphertext.
    Cfb {
        #[zeroize(skip)]
        sym_alg: SymmetricKeyAlgorithm,
        #[zeroize(skip)]
        s2k: StringToKey,
        #[debug("{}", hex::encode(iv))]
        iv: Vec<u8>,
    },
    /// Usage octet 255: CFB with only the two-octet checksum. Deprecated,
    /// parsed but refused for decryption.
    MalleableCfb {
        #[zeroize(skip)]
        sym_alg: SymmetricKeyAlgorithm,
        #[zeroize(skip)]
        s2k: StringToKey,
        #[debug("{}", hex::encode(iv))]
        iv: Vec<u8>,
    },
    /// Usage octet 253: AEAD authenticates the secret material.
    Aead {
        #[zeroize(skip)]
        sym_alg: SymmetricKeyAlgorithm,
        #[zeroize(skip)]
        aead: AeadAlgorithm,
        #[zeroize(skip)]
        s2k: StringToKey,
        #[debug("{}", hex::encode(nonce))]
        nonce: Vec<u8>,
    },
}

impl S2kParams {
    pub fn usage(&self) -> u8 {
        match self {
            S2kParams::LegacyCfb { sym_alg, .. } => (*sym_alg).into(),
            S2kParams::Aead { .. } => 253,
            S2kParams::Cfb { .. } => 254,
            S2kParams::MalleableCfb { .. } => 255,
        }
    }

    pub fn sym_alg(&self) -> SymmetricKeyAlgorithm {
        match self {
            S2kParams::LegacyCfb { sym_alg, .. }
            | S2kParams::Cfb { sym_alg, .. }
            | S2kParams::MalleableCfb { sym_alg, .. }
            | S2kParams::Aead { sym_alg, .. } => *sym_alg,
        }
    }
}

/// Secret key material as carried by a secret key packet.
///
/// Zeroed before its memory is released, like the plain params it protects.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, derive_more::Debug)]
pub struct EncryptedSecretParams {
    /// The encrypted octets, including any trailing integrity tag.
    #[debug("{}", hex::encode(data))]
    pub data: Vec<u8>,
    pub s2k_params: S2kParams,
}

/// The lifecycle states of the secret half of a key packet.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SecretParams {
    /// Decrypted, parameters available.
    Plain(PlainSecretParams),
    /// Present but passphrase protected.
    Encrypted(EncryptedSecretParams),
    /// A gnu-dummy placeholder: no secret material at all.
    Dummy {
        sym_alg: SymmetricKeyAlgorithm,
        s2k: StringToKey,
    },
    /// Material was explicitly zeroized and dropped.
    Cleared,
}

impl SecretParams {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, SecretParams::Dummy { .. })
    }
}
