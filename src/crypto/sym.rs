use cfb_mode::{Decryptor, Encryptor};
use cipher::{AsyncStreamCipher, KeyIvInit};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::errors::{bail, Error, Result};

/// Available symmetric key algorithms.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-9.2>
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    Plaintext = 0,
    Idea = 1,
    /// TripleDES (DES-EDE, 168 bit key derived from 192)
    TripleDes = 2,
    /// CAST5 (128 bit key, as per RFC2144)
    Cast5 = 3,
    /// Blowfish (128 bit key, 16 rounds)
    Blowfish = 4,
    Aes128 = 7,
    Aes192 = 8,
    Aes256 = 9,
    /// Twofish (256 bit key)
    Twofish = 10,
    Camellia128 = 11,
    Camellia192 = 12,
    Camellia256 = 13,
}

impl SymmetricKeyAlgorithm {
    pub fn from_code(code: u8) -> Result<Self> {
        Self::try_from(code).map_err(|_| Error::UnknownAlgorithm {
            what: "symmetric algorithm",
            code,
        })
    }

    /// The size of a single block, in bytes.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::Idea
            | SymmetricKeyAlgorithm::TripleDes
            | SymmetricKeyAlgorithm::Cast5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::Aes128
            | SymmetricKeyAlgorithm::Aes192
            | SymmetricKeyAlgorithm::Aes256
            | SymmetricKeyAlgorithm::Twofish
            | SymmetricKeyAlgorithm::Camellia128
            | SymmetricKeyAlgorithm::Camellia192
            | SymmetricKeyAlgorithm::Camellia256 => 16,
        }
    }

    /// The size of a key, in bytes.
    pub fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::Idea
            | SymmetricKeyAlgorithm::Cast5
            | SymmetricKeyAlgorithm::Blowfish
            | SymmetricKeyAlgorithm::Aes128
            | SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::TripleDes
            | SymmetricKeyAlgorithm::Aes192
            | SymmetricKeyAlgorithm::Camellia192 => 24,
            SymmetricKeyAlgorithm::Aes256
            | SymmetricKeyAlgorithm::Twofish
            | SymmetricKeyAlgorithm::Camellia256 => 32,
        }
    }
}

macro_rules! cfb_run {
    ($cipher:ty, encrypt, $key:expr, $iv:expr, $data:expr) => {
        Encryptor::<$cipher>::new_from_slices($key, $iv)?.encrypt($data)
    };
    ($cipher:ty, decrypt, $key:expr, $iv:expr, $data:expr) => {
        Decryptor::<$cipher>::new_from_slices($key, $iv)?.decrypt($data)
    };
}

macro_rules! cfb_dispatch {
    ($alg:expr, $mode:ident, $key:expr, $iv:expr, $data:expr) => {
        match $alg {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a symmetric cipher")
            }
            SymmetricKeyAlgorithm::Idea => cfb_run!(idea::Idea, $mode, $key, $iv, $data),
            SymmetricKeyAlgorithm::TripleDes => cfb_run!(des::TdesEde3, $mode, $key, $iv, $data),
            SymmetricKeyAlgorithm::Cast5 => cfb_run!(cast5::Cast5, $mode, $key, $iv, $data),
            SymmetricKeyAlgorithm::Blowfish => {
                cfb_run!(blowfish::Blowfish, $mode, $key, $iv, $data)
            }
            SymmetricKeyAlgorithm::Aes128 => cfb_run!(aes::Aes128, $mode, $key, $iv, $data),
            SymmetricKeyAlgorithm::Aes192 => cfb_run!(aes::Aes192, $mode, $key, $iv, $data),
            SymmetricKeyAlgorithm::Aes256 => cfb_run!(aes::Aes256, $mode, $key, $iv, $data),
            SymmetricKeyAlgorithm::Twofish => cfb_run!(twofish::Twofish, $mode, $key, $iv, $data),
            SymmetricKeyAlgorithm::Camellia128 => {
                cfb_run!(camellia::Camellia128, $mode, $key, $iv, $data)
            }
            SymmetricKeyAlgorithm::Camellia192 => {
                cfb_run!(camellia::Camellia192, $mode, $key, $iv, $data)
            }
            SymmetricKeyAlgorithm::Camellia256 => {
                cfb_run!(camellia::Camellia256, $mode, $key, $iv, $data)
            }
        }
    };
}

impl SymmetricKeyAlgorithm {
    /// CFB-mode encrypt `data` in place.
    pub fn encrypt_cfb(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        cfb_dispatch!(self, encrypt, key, iv, data);
        Ok(())
    }

    /// CFB-mode decrypt `data` in place.
    pub fn decrypt_cfb(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        cfb_dispatch!(self, decrypt, key, iv, data);
        Ok(())
    }
}
