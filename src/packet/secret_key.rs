use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use chrono::{DateTime, Utc};
use digest::Digest;
use rand::{CryptoRng, Rng};
use sha1_checked::Sha1;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::ecc_curve::ECCCurve;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{ecdsa, eddsa, rsa};
use crate::errors::{bail, ensure, Error, Result};
use crate::packet::public_key::{PubKeyInner, PublicKey, PublicSubkey};
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{
    checksum_simple, EncryptedSecretParams, Fingerprint, KeyId, KeyVersion, PlainSecretParams,
    PublicParams, S2kParams, SecretParams, StringToKey, Tag, Version,
};

/// The kinds of keys `generate` can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// RSA with the given modulus size in bits.
    Rsa(usize),
    Ecdsa(ECCCurve),
    EdDsaLegacy,
}

/// Parses the body of a secret key packet.
/// Ref: <https://tools.ietf.org/html/draft-ietf-openpgp-rfc4880bis-04#section-5.5.3>
fn parse_secret<B: Buf>(mut i: B) -> Result<(PubKeyInner, SecretParams)> {
    let details = PubKeyInner::from_buf(&mut i)?;
    let version = details.version();

    let s2k_usage = i.read_u8()?;

    if version == KeyVersion::V5 {
        // octet count of the conditional fields up to the key material;
        // purely a framing aid, the fields below delimit themselves
        let _opt_len = i.read_u8()?;
    }

    let s2k_params = match s2k_usage {
        0 => None,
        253..=255 => {
            let sym_alg = SymmetricKeyAlgorithm::from_code(i.read_u8()?)?;
            let aead = if s2k_usage == 253 {
                Some(AeadAlgorithm::from_code(i.read_u8()?)?)
            } else {
                None
            };
            let s2k = StringToKey::from_buf(&mut i)?;

            if s2k.is_dummy() {
                // a stubbed out key carries no iv and no material
                return Ok((details, SecretParams::Dummy { sym_alg, s2k }));
            }

            let iv_len = match aead {
                Some(aead) => aead.nonce_size(),
                None => sym_alg.block_size(),
            };
            let iv = i.take_bytes(iv_len)?.to_vec();

            Some(match s2k_usage {
                253 => S2kParams::Aead {
                    sym_alg,
                    aead: aead.expect("usage 253"),
                    s2k,
                    nonce: iv,
                },
                254 => S2kParams::Cfb { sym_alg, s2k, iv },
                _ => S2kParams::MalleableCfb { sym_alg, s2k, iv },
            })
        }
        code => {
            // the usage octet is itself a symmetric algorithm code
            let sym_alg = SymmetricKeyAlgorithm::from_code(code)?;
            let iv = i.take_bytes(sym_alg.block_size())?.to_vec();
            Some(S2kParams::LegacyCfb { sym_alg, iv })
        }
    };

    let material = if version == KeyVersion::V5 {
        let len = i.read_be_u32()? as usize;
        i.take_bytes(len)?
    } else {
        i.rest()
    };

    match s2k_params {
        None => {
            ensure!(material.len() >= 2, "secret key material too short");
            let (cleartext, checksum) = material.split_at(material.len() - 2);
            if checksum != &checksum_simple(cleartext)[..] {
                return Err(Error::ChecksumMismatch);
            }

            let params = PlainSecretParams::try_from_slice(
                cleartext,
                details.algorithm(),
                details.public_params(),
            )
            .map_err(|err| Error::MalformedSecret {
                message: err.to_string(),
            })?;
            Ok((details, SecretParams::Plain(params)))
        }
        Some(s2k_params) => Ok((
            details,
            SecretParams::Encrypted(EncryptedSecretParams {
                data: material.to_vec(),
                s2k_params,
            }),
        )),
    }
}

/// Octet count of the conditional fields between the usage octet and the
/// key material, as framed by v5 packets.
fn optional_fields_len(secret_params: &SecretParams) -> usize {
    match secret_params {
        SecretParams::Plain(_) | SecretParams::Cleared => 0,
        SecretParams::Dummy { s2k, .. } => 1 + s2k.write_len(),
        SecretParams::Encrypted(EncryptedSecretParams { s2k_params, .. }) => match s2k_params {
            S2kParams::LegacyCfb { iv, .. } => iv.len(),
            S2kParams::Cfb { s2k, iv, .. } | S2kParams::MalleableCfb { s2k, iv, .. } => {
                1 + s2k.write_len() + iv.len()
            }
            S2kParams::Aead { s2k, nonce, .. } => 2 + s2k.write_len() + nonce.len(),
        },
    }
}

fn write_secret<W: io::Write>(
    details: &PubKeyInner,
    secret_params: &SecretParams,
    writer: &mut W,
) -> Result<()> {
    details.to_writer(writer)?;
    let v5 = details.version() == KeyVersion::V5;

    match secret_params {
        SecretParams::Cleared => bail!("cleared secret key can not be serialized"),
        SecretParams::Plain(params) => {
            writer.write_u8(0)?;
            let cleartext = Zeroizing::new(params.to_bytes()?);
            if v5 {
                writer.write_u8(0)?;
                writer.write_u32::<BigEndian>((cleartext.len() + 2) as u32)?;
            }
            writer.write_all(&cleartext)?;
            writer.write_all(&checksum_simple(&cleartext))?;
        }
        SecretParams::Dummy { sym_alg, s2k } => {
            writer.write_u8(254)?;
            if v5 {
                writer.write_u8(optional_fields_len(secret_params) as u8)?;
            }
            writer.write_u8((*sym_alg).into())?;
            s2k.to_writer(writer)?;
            if v5 {
                writer.write_u32::<BigEndian>(0)?;
            }
        }
        SecretParams::Encrypted(EncryptedSecretParams { data, s2k_params }) => {
            writer.write_u8(s2k_params.usage())?;
            if v5 {
                writer.write_u8(optional_fields_len(secret_params) as u8)?;
            }
            match s2k_params {
                S2kParams::LegacyCfb { iv, .. } => {
                    writer.write_all(iv)?;
                }
                S2kParams::Cfb { sym_alg, s2k, iv }
                | S2kParams::MalleableCfb { sym_alg, s2k, iv } => {
                    writer.write_u8((*sym_alg).into())?;
                    s2k.to_writer(writer)?;
                    writer.write_all(iv)?;
                }
                S2kParams::Aead {
                    sym_alg,
                    aead,
                    s2k,
                    nonce,
                } => {
                    writer.write_u8((*sym_alg).into())?;
                    writer.write_u8((*aead).into())?;
                    s2k.to_writer(writer)?;
                    writer.write_all(nonce)?;
                }
            }
            if v5 {
                writer.write_u32::<BigEndian>(data.len() as u32)?;
            }
            writer.write_all(data)?;
        }
    }
    Ok(())
}

fn secret_write_len(details: &PubKeyInner, secret_params: &SecretParams) -> usize {
    let mut sum = details.write_len();
    // usage octet
    sum += 1;
    if details.version() == KeyVersion::V5 {
        // optional-fields count octet
        sum += 1;
    }
    sum += optional_fields_len(secret_params);
    match secret_params {
        SecretParams::Cleared => {}
        SecretParams::Plain(params) => {
            if details.version() == KeyVersion::V5 {
                sum += 4;
            }
            sum += params.write_len() + 2;
        }
        SecretParams::Dummy { .. } => {
            if details.version() == KeyVersion::V5 {
                sum += 4;
            }
        }
        SecretParams::Encrypted(EncryptedSecretParams { data, .. }) => {
            if details.version() == KeyVersion::V5 {
                sum += 4;
            }
            sum += data.len();
        }
    }
    sum
}

fn encrypt_in_place<R: Rng + CryptoRng>(
    secret_params: &mut SecretParams,
    mut rng: R,
    passphrase: &str,
    config: &Config,
) -> Result<()> {
    let new_params = match &*secret_params {
        SecretParams::Dummy { .. } => return Ok(()),
        SecretParams::Encrypted(_) => return Err(Error::AlreadyEncrypted),
        SecretParams::Cleared => bail!("no secret material left to encrypt"),
        SecretParams::Plain(_) if passphrase.is_empty() => {
            // an empty passphrase strips protection, which a plain key
            // already has
            return Ok(());
        }
        SecretParams::Plain(plain) => {
            let sym_alg = SymmetricKeyAlgorithm::Aes256;
            let s2k = StringToKey::new_iterated(
                &mut rng,
                HashAlgorithm::Sha256,
                config.s2k_iteration_count_byte,
            );
            let key = s2k.produce_key(passphrase, sym_alg.key_size())?;
            let cleartext = Zeroizing::new(plain.to_bytes()?);

            if config.aead_protect {
                let aead = AeadAlgorithm::Eax;
                let mut nonce = vec![0u8; aead.nonce_size()];
                rng.fill(&mut nonce[..]);

                let data = aead.encrypt(sym_alg, &key, &nonce, &[], &cleartext)?;
                EncryptedSecretParams {
                    data,
                    s2k_params: S2kParams::Aead {
                        sym_alg,
                        aead,
                        s2k,
                        nonce,
                    },
                }
            } else {
                let mut iv = vec![0u8; sym_alg.block_size()];
                rng.fill(&mut iv[..]);

                // the SHA-1 integrity tag is encrypted along with the params
                let mut data = Vec::with_capacity(cleartext.len() + 20);
                data.extend_from_slice(&cleartext);
                data.extend_from_slice(&Sha1::digest(&cleartext));
                sym_alg.encrypt_cfb(&key, &iv, &mut data)?;

                EncryptedSecretParams {
                    data,
                    s2k_params: S2kParams::Cfb { sym_alg, s2k, iv },
                }
            }
        }
    };

    // dropping the plain params zeroizes them
    *secret_params = SecretParams::Encrypted(new_params);
    Ok(())
}

fn decrypt_in_place(
    details: &PubKeyInner,
    secret_params: &mut SecretParams,
    passphrase: &str,
) -> Result<bool> {
    let cleartext: Zeroizing<Vec<u8>> = match &*secret_params {
        SecretParams::Dummy { .. } => return Ok(false),
        SecretParams::Plain(_) => return Err(Error::AlreadyDecrypted),
        SecretParams::Cleared => bail!("no secret material left to decrypt"),
        SecretParams::Encrypted(EncryptedSecretParams { data, s2k_params }) => match s2k_params {
            S2kParams::LegacyCfb { .. } | S2kParams::MalleableCfb { .. } => {
                return Err(Error::InsecureS2k {
                    usage: s2k_params.usage(),
                })
            }
            S2kParams::Aead {
                sym_alg,
                aead,
                s2k,
                nonce,
            } => {
                let key = s2k.produce_key(passphrase, sym_alg.key_size())?;
                let plaintext = aead
                    .decrypt(*sym_alg, &key, nonce, &[], data)
                    .map_err(|_| Error::IncorrectPassphrase)?;
                Zeroizing::new(plaintext)
            }
            S2kParams::Cfb { sym_alg, s2k, iv } => {
                let key = s2k.produce_key(passphrase, sym_alg.key_size())?;
                let mut buf = Zeroizing::new(data.to_vec());
                sym_alg.decrypt_cfb(&key, iv, &mut buf)?;

                if buf.len() < 20 {
                    return Err(Error::IncorrectPassphrase);
                }
                let (params, hash) = buf.split_at(buf.len() - 20);
                if hash != &Sha1::digest(params)[..] {
                    return Err(Error::IncorrectPassphrase);
                }
                Zeroizing::new(params.to_vec())
            }
        },
    };

    let params =
        PlainSecretParams::try_from_slice(&cleartext, details.algorithm(), details.public_params())
            .map_err(|err| Error::MalformedSecret {
                message: err.to_string(),
            })?;

    *secret_params = SecretParams::Plain(params);
    Ok(true)
}

fn validate_in_place<R: Rng + CryptoRng>(
    details: &PubKeyInner,
    secret_params: &SecretParams,
    rng: R,
) -> Result<()> {
    match secret_params {
        SecretParams::Dummy { .. } => Ok(()),
        SecretParams::Encrypted(_) | SecretParams::Cleared => {
            bail!("secret key must be decrypted before validation")
        }
        SecretParams::Plain(params) => {
            params
                .validate(rng, details.public_params())
                .map_err(|err| match err {
                    err @ Error::ValidationFailed { .. } => err,
                    other => Error::ValidationFailed {
                        message: other.to_string(),
                    },
                })
        }
    }
}

fn generate_params<R: Rng + CryptoRng>(
    mut rng: R,
    key_type: KeyType,
    created_at: DateTime<Utc>,
    config: &Config,
) -> Result<(PubKeyInner, SecretParams)> {
    let version = if config.v5_keys {
        KeyVersion::V5
    } else {
        KeyVersion::V4
    };

    let (algorithm, public_params, plain) = match key_type {
        KeyType::Rsa(bits) => {
            let (public, secret) = rsa::generate_key(&mut rng, bits)?;
            (PublicKeyAlgorithm::RSA, public, secret)
        }
        KeyType::Ecdsa(curve) => {
            let (public, d) = ecdsa::generate_key(&mut rng, &curve)?;
            (
                PublicKeyAlgorithm::ECDSA,
                PublicParams::ECDSA(public),
                PlainSecretParams::ECDSA { d },
            )
        }
        KeyType::EdDsaLegacy => {
            let (q, d) = eddsa::generate_key(&mut rng);
            (
                PublicKeyAlgorithm::EdDSALegacy,
                PublicParams::EdDSALegacy {
                    curve: ECCCurve::Ed25519,
                    q,
                },
                PlainSecretParams::EdDSALegacy { d },
            )
        }
    };

    Ok((
        PubKeyInner::new(version, algorithm, created_at, public_params),
        SecretParams::Plain(plain),
    ))
}

macro_rules! impl_secret_key {
    ($name:ident, $tag:expr, $public:ident) => {
        #[derive(Debug, PartialEq, Eq, Clone)]
        pub struct $name {
            packet_version: Version,
            details: PubKeyInner,
            secret_params: SecretParams,
        }

        impl $name {
            /// Parses the packet body.
            pub fn from_buf<B: Buf>(packet_version: Version, input: B) -> Result<Self> {
                let (details, secret_params) = parse_secret(input)?;
                Ok($name {
                    packet_version,
                    details,
                    secret_params,
                })
            }

            /// Generates a fresh, unprotected key.
            pub fn generate<R: Rng + CryptoRng>(
                rng: R,
                key_type: KeyType,
                created_at: DateTime<Utc>,
                config: &Config,
            ) -> Result<Self> {
                let (details, secret_params) = generate_params(rng, key_type, created_at, config)?;
                Ok($name {
                    packet_version: Default::default(),
                    details,
                    secret_params,
                })
            }

            /// Protects the secret params with a passphrase. An empty
            /// passphrase strips protection instead.
            pub fn encrypt<R: Rng + CryptoRng>(
                &mut self,
                rng: R,
                passphrase: &str,
                config: &Config,
            ) -> Result<()> {
                encrypt_in_place(&mut self.secret_params, rng, passphrase, config)
            }

            /// Unlocks the secret params. Returns `false` for dummy keys,
            /// which have nothing to unlock.
            pub fn decrypt(&mut self, passphrase: &str) -> Result<bool> {
                decrypt_in_place(&self.details, &mut self.secret_params, passphrase)
            }

            /// Checks the secret params against the public ones.
            pub fn validate<R: Rng + CryptoRng>(&self, rng: R) -> Result<()> {
                validate_in_place(&self.details, &self.secret_params, rng)
            }

            /// Zeroizes and drops the secret material.
            pub fn clear_private_params(&mut self) {
                self.secret_params = SecretParams::Cleared;
            }

            /// Irreversibly replaces the secret material with a gnu-dummy
            /// marker.
            pub fn make_dummy(&mut self) {
                self.secret_params = SecretParams::Dummy {
                    sym_alg: SymmetricKeyAlgorithm::Aes256,
                    s2k: StringToKey::GnuDummy {
                        hash: HashAlgorithm::None,
                    },
                };
            }

            pub fn is_dummy(&self) -> bool {
                self.secret_params.is_dummy()
            }

            pub fn is_decrypted(&self) -> bool {
                matches!(self.secret_params, SecretParams::Plain(_))
            }

            pub fn secret_params(&self) -> &SecretParams {
                &self.secret_params
            }

            /// The public half as its own packet.
            pub fn public_portion(&self) -> $public {
                $public::from_inner(self.details.clone())
            }

            pub fn version(&self) -> KeyVersion {
                self.details.version()
            }

            pub fn algorithm(&self) -> PublicKeyAlgorithm {
                self.details.algorithm()
            }

            pub fn created_at(&self) -> &DateTime<Utc> {
                self.details.created_at()
            }

            pub fn public_params(&self) -> &PublicParams {
                self.details.public_params()
            }

            pub fn algorithm_info(&self) -> String {
                self.details.algorithm_info()
            }

            pub fn fingerprint(&self) -> Fingerprint {
                self.details.fingerprint()
            }

            pub fn key_id(&self) -> KeyId {
                self.details.key_id()
            }

            pub fn has_same_fingerprint_as(&self, other: &$name) -> bool {
                self.details.has_same_fingerprint_as(&other.details)
            }

            pub fn as_inner(&self) -> &PubKeyInner {
                &self.details
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                write_secret(&self.details, &self.secret_params, writer)
            }

            fn write_len(&self) -> usize {
                secret_write_len(&self.details, &self.secret_params)
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

impl_secret_key!(SecretKey, Tag::SecretKey, PublicKey);
impl_secret_key!(SecretSubkey, Tag::SecretSubkey, PublicSubkey);

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::config::ConfigBuilder;

    fn test_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000, 0).single().unwrap()
    }

    fn generate(config: &Config) -> SecretKey {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        SecretKey::generate(&mut rng, KeyType::EdDsaLegacy, test_time(), config).unwrap()
    }

    #[test]
    fn unprotected_roundtrip_v4_and_v5() {
        for config in [
            Config::default(),
            ConfigBuilder::default().v5_keys(true).build().unwrap(),
        ] {
            let key = generate(&config);
            let bytes = key.to_bytes().unwrap();
            assert_eq!(bytes.len(), key.write_len());

            let back = SecretKey::from_buf(Default::default(), &mut &bytes[..]).unwrap();
            assert_eq!(key, back);
            assert_eq!(back.to_bytes().unwrap(), bytes);
        }
    }

    #[test]
    fn checksum_mismatch_is_detected() {
        let key = generate(&Config::default());
        let mut bytes = key.to_bytes().unwrap();
        let len = bytes.len();
        bytes[len - 1] ^= 1;

        assert!(matches!(
            SecretKey::from_buf(Default::default(), &mut &bytes[..]),
            Err(Error::ChecksumMismatch)
        ));
    }

    #[test]
    fn encrypt_decrypt_inverse_cfb() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = Config::default();
        let mut key = generate(&config);
        let original = key.secret_params().clone();

        key.encrypt(&mut rng, "passphrase", &config).unwrap();
        assert!(!key.is_decrypted());

        // encrypting twice is a lifecycle violation
        assert!(matches!(
            key.encrypt(&mut rng, "other", &config),
            Err(Error::AlreadyEncrypted)
        ));

        let bytes = key.to_bytes().unwrap();
        assert_eq!(bytes.len(), key.write_len());
        let mut back = SecretKey::from_buf(Default::default(), &mut &bytes[..]).unwrap();

        // a wrong passphrase must fail without touching the state
        assert!(matches!(
            back.decrypt("not the passphrase"),
            Err(Error::IncorrectPassphrase)
        ));
        assert!(!back.is_decrypted());

        assert!(back.decrypt("passphrase").unwrap());
        assert_eq!(back.secret_params(), &original);
        assert!(matches!(back.decrypt("passphrase"), Err(Error::AlreadyDecrypted)));
    }

    // S4: aead protect, write, read, decrypt
    #[test]
    fn encrypt_decrypt_inverse_aead() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let config = ConfigBuilder::default().aead_protect(true).build().unwrap();
        let mut key = generate(&config);
        let original = key.secret_params().clone();

        key.encrypt(&mut rng, "passphrase", &config).unwrap();
        let SecretParams::Encrypted(params) = key.secret_params() else {
            panic!("must be encrypted");
        };
        assert_eq!(params.s2k_params.usage(), 253);

        let bytes = key.to_bytes().unwrap();
        let mut back = SecretKey::from_buf(Default::default(), &mut &bytes[..]).unwrap();

        assert!(matches!(
            back.decrypt("wrong"),
            Err(Error::IncorrectPassphrase)
        ));
        assert!(!back.is_decrypted());

        assert!(back.decrypt("passphrase").unwrap());
        assert_eq!(back.secret_params(), &original);
    }

    #[test]
    fn empty_passphrase_strips_protection() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let config = Config::default();
        let mut key = generate(&config);

        key.encrypt(&mut rng, "", &config).unwrap();
        assert!(key.is_decrypted());

        let bytes = key.to_bytes().unwrap();
        // usage octet right after the public portion is zero
        assert_eq!(bytes[key.as_inner().write_len()], 0);
    }

    #[test]
    fn dummy_keys_do_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let config = Config::default();
        let mut key = generate(&config);
        key.make_dummy();

        assert!(key.is_dummy());
        assert!(!key.decrypt("passphrase").unwrap());
        key.validate(&mut rng).unwrap();
        key.encrypt(&mut rng, "passphrase", &config).unwrap();
        assert!(key.is_dummy());

        // stable serialization
        let bytes = key.to_bytes().unwrap();
        assert_eq!(bytes.len(), key.write_len());
        let back = SecretKey::from_buf(Default::default(), &mut &bytes[..]).unwrap();
        assert_eq!(key, back);
        assert_eq!(back.to_bytes().unwrap(), bytes);
        assert!(back.is_dummy());
    }

    #[test]
    fn cleared_keys_hold_no_secrets() {
        let mut key = generate(&Config::default());
        key.clear_private_params();

        assert!(!key.is_decrypted());
        assert_eq!(key.secret_params(), &SecretParams::Cleared);
        assert!(key.to_bytes().is_err());
    }

    #[test]
    fn validate_generated_keys() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let config = Config::default();

        for key_type in [
            KeyType::EdDsaLegacy,
            KeyType::Ecdsa(ECCCurve::P256),
            KeyType::Rsa(1024),
        ] {
            let key =
                SecretKey::generate(&mut rng, key_type, test_time(), &config).unwrap();
            key.validate(&mut rng).unwrap();

            let public = key.public_portion();
            assert_eq!(public.fingerprint(), key.fingerprint());
        }
    }

    #[test]
    fn insecure_s2k_is_refused() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let config = Config::default();
        let mut key = generate(&config);
        key.encrypt(&mut rng, "passphrase", &config).unwrap();

        // rewrite the packet as usage 255 (maybe produced by ancient
        // implementations); decrypt has to refuse it
        let mut bytes = key.to_bytes().unwrap();
        let usage_offset = key.as_inner().write_len();
        assert_eq!(bytes[usage_offset], 254);
        bytes[usage_offset] = 255;

        let mut back = SecretKey::from_buf(Default::default(), &mut &bytes[..]).unwrap();
        assert!(matches!(
            back.decrypt("passphrase"),
            Err(Error::InsecureS2k { usage: 255 })
        ));
    }
}
