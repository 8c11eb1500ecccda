/// A cryptographic fingerprint of a public key packet.
#[derive(Clone, PartialEq, Eq)]
pub enum Fingerprint {
    V4([u8; 20]),
    V5([u8; 32]),
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fingerprint::V4(raw) => write!(f, "V4({})", hex::encode(raw)),
            Fingerprint::V5(raw) => write!(f, "V5({})", hex::encode(raw)),
        }
    }
}

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Fingerprint::V4(raw) => raw,
            Fingerprint::V5(raw) => raw,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

/// The 8-byte identifier derived from a fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, derive_more::Debug)]
#[debug("KeyId({})", hex::encode(_0))]
pub struct KeyId([u8; 8]);

impl KeyId {
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl From<[u8; 8]> for KeyId {
    fn from(raw: [u8; 8]) -> Self {
        KeyId(raw)
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
