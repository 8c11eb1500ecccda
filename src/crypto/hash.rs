use digest::Digest;
use md5::Md5;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use ripemd::Ripemd160;
use sha1_checked::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_256, Sha3_512};

use crate::errors::{Error, Result};

/// Available hash algorithms.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-9.4>
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum HashAlgorithm {
    None = 0,
    Md5 = 1,
    Sha1 = 2,
    Ripemd160 = 3,
    Sha256 = 8,
    Sha384 = 9,
    Sha512 = 10,
    Sha224 = 11,
    Sha3_256 = 12,
    Sha3_512 = 14,
}

impl HashAlgorithm {
    pub fn from_code(code: u8) -> Result<Self> {
        Self::try_from(code).map_err(|_| Error::UnknownAlgorithm {
            what: "hash algorithm",
            code,
        })
    }

    /// Digest size in bytes.
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::None => 0,
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Ripemd160 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha3_256 => 32,
            HashAlgorithm::Sha3_512 => 64,
        }
    }

    pub fn new_hasher(self) -> Result<Hasher> {
        match self {
            HashAlgorithm::None => Err(Error::UnknownAlgorithm {
                what: "hash algorithm",
                code: 0,
            }),
            HashAlgorithm::Md5 => Ok(Hasher::Md5(Md5::new())),
            HashAlgorithm::Sha1 => Ok(Hasher::Sha1(Sha1::new())),
            HashAlgorithm::Ripemd160 => Ok(Hasher::Ripemd160(Ripemd160::new())),
            HashAlgorithm::Sha256 => Ok(Hasher::Sha256(Sha256::new())),
            HashAlgorithm::Sha384 => Ok(Hasher::Sha384(Sha384::new())),
            HashAlgorithm::Sha512 => Ok(Hasher::Sha512(Sha512::new())),
            HashAlgorithm::Sha224 => Ok(Hasher::Sha224(Sha224::new())),
            HashAlgorithm::Sha3_256 => Ok(Hasher::Sha3_256(Sha3_256::new())),
            HashAlgorithm::Sha3_512 => Ok(Hasher::Sha3_512(Sha3_512::new())),
        }
    }

    /// One-shot digest.
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = self.new_hasher()?;
        hasher.update(data);
        Ok(hasher.finish())
    }
}

macro_rules! impl_hasher {
    ($($name:ident => $ty:ty),+ $(,)?) => {
        /// An allocated, incremental hashing context.
        #[derive(Clone)]
        pub enum Hasher {
            $($name($ty),)+
        }

        impl Hasher {
            pub fn update(&mut self, data: &[u8]) {
                match self {
                    $(Hasher::$name(h) => Digest::update(h, data),)+
                }
            }

            pub fn finish(self) -> Vec<u8> {
                match self {
                    $(Hasher::$name(h) => h.finalize().to_vec(),)+
                }
            }
        }
    };
}

impl_hasher!(
    Md5 => Md5,
    Sha1 => Sha1,
    Ripemd160 => Ripemd160,
    Sha256 => Sha256,
    Sha384 => Sha384,
    Sha512 => Sha512,
    Sha224 => Sha224,
    Sha3_256 => Sha3_256,
    Sha3_512 => Sha3_512,
);
