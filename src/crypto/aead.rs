use aead::{Aead, KeyInit, Payload};
use aes::{Aes128, Aes192, Aes256};
use generic_array::typenum::{U12, U15};
use generic_array::GenericArray;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure_eq, unsupported_err, Error, Result};

/// AEAD modes for secret-key protection.
/// Ref: <https://tools.ietf.org/html/draft-ietf-openpgp-rfc4880bis-04#section-9.6>
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum AeadAlgorithm {
    Eax = 1,
    Ocb = 2,
    Gcm = 3,
}

impl AeadAlgorithm {
    pub fn from_code(code: u8) -> Result<Self> {
        Self::try_from(code).map_err(|_| Error::UnknownAlgorithm {
            what: "aead algorithm",
            code,
        })
    }

    /// Nonce size in bytes.
    pub fn nonce_size(self) -> usize {
        match self {
            AeadAlgorithm::Eax => 16,
            AeadAlgorithm::Ocb => 15,
            AeadAlgorithm::Gcm => 12,
        }
    }

    /// Authentication tag size in bytes.
    pub fn tag_size(self) -> usize {
        16
    }

    /// Encrypts, returning the ciphertext with the trailing authentication tag.
    pub fn encrypt(
        self,
        sym_alg: SymmetricKeyAlgorithm,
        key: &[u8],
        nonce: &[u8],
        ad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        self.run(sym_alg, key, nonce, ad, plaintext, true)
    }

    /// Decrypts `ciphertext || tag`. Fails when the tag does not authenticate.
    pub fn decrypt(
        self,
        sym_alg: SymmetricKeyAlgorithm,
        key: &[u8],
        nonce: &[u8],
        ad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        self.run(sym_alg, key, nonce, ad, ciphertext, false)
    }

    fn run(
        self,
        sym_alg: SymmetricKeyAlgorithm,
        key: &[u8],
        nonce: &[u8],
        ad: &[u8],
        data: &[u8],
        encrypt: bool,
    ) -> Result<Vec<u8>> {
        ensure_eq!(
            nonce.len(),
            self.nonce_size(),
            "invalid nonce size {} for {:?}",
            nonce.len(),
            self
        );

        macro_rules! run_cipher {
            ($cipher:ty) => {{
                let cipher = <$cipher>::new_from_slice(key)?;
                let nonce = GenericArray::from_slice(nonce);
                let payload = Payload { msg: data, aad: ad };
                if encrypt {
                    cipher
                        .encrypt(nonce, payload)
                        .map_err(|_| Error::Message {
                            message: format!("{:?} encryption failed", self),
                        })
                } else {
                    cipher
                        .decrypt(nonce, payload)
                        .map_err(|_| Error::Message {
                            message: format!("{:?} authentication failed", self),
                        })
                }
            }};
        }

        match (self, sym_alg) {
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::Aes128) => run_cipher!(eax::Eax<Aes128>),
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::Aes192) => run_cipher!(eax::Eax<Aes192>),
            (AeadAlgorithm::Eax, SymmetricKeyAlgorithm::Aes256) => run_cipher!(eax::Eax<Aes256>),
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::Aes128) => {
                run_cipher!(ocb3::Ocb3<Aes128, U15>)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::Aes192) => {
                run_cipher!(ocb3::Ocb3<Aes192, U15>)
            }
            (AeadAlgorithm::Ocb, SymmetricKeyAlgorithm::Aes256) => {
                run_cipher!(ocb3::Ocb3<Aes256, U15>)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::Aes128) => {
                run_cipher!(aes_gcm::AesGcm<Aes128, U12>)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::Aes192) => {
                run_cipher!(aes_gcm::AesGcm<Aes192, U12>)
            }
            (AeadAlgorithm::Gcm, SymmetricKeyAlgorithm::Aes256) => {
                run_cipher!(aes_gcm::AesGcm<Aes256, U12>)
            }
            _ => unsupported_err!("{:?} is not available for {:?}", self, sym_alg),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn aead_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        for sym_alg in [
            SymmetricKeyAlgorithm::Aes128,
            SymmetricKeyAlgorithm::Aes192,
            SymmetricKeyAlgorithm::Aes256,
        ] {
            for aead in [AeadAlgorithm::Eax, AeadAlgorithm::Ocb, AeadAlgorithm::Gcm] {
                let mut key = vec![0u8; sym_alg.key_size()];
                let mut nonce = vec![0u8; aead.nonce_size()];
                rng.fill_bytes(&mut key);
                rng.fill_bytes(&mut nonce);

                let plaintext = b"never spoken aloud";
                let ct = aead
                    .encrypt(sym_alg, &key, &nonce, b"ad", plaintext)
                    .unwrap();
                assert_eq!(ct.len(), plaintext.len() + aead.tag_size());

                let pt = aead.decrypt(sym_alg, &key, &nonce, b"ad", &ct).unwrap();
                assert_eq!(pt, plaintext);

                // flipping any ciphertext bit must fail authentication
                let mut broken = ct.clone();
                broken[3] ^= 1;
                assert!(aead.decrypt(sym_alg, &key, &nonce, b"ad", &broken).is_err());

                // so must a different additional data string
                assert!(aead.decrypt(sym_alg, &key, &nonce, b"other", &ct).is_err());
            }
        }
    }
}
