use num_enum::{FromPrimitive, IntoPrimitive};

/// Public-key algorithm identifiers.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-9.1>
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt or Sign)
    RSA = 1,
    /// RSA Encrypt-Only (deprecated)
    RSAEncrypt = 2,
    /// RSA Sign-Only (deprecated)
    RSASign = 3,
    /// Elgamal (Encrypt-Only)
    Elgamal = 16,
    /// DSA (Digital Signature Algorithm)
    DSA = 17,
    /// Elliptic Curve Diffie-Hellman
    ECDH = 18,
    /// Elliptic Curve Digital Signature Algorithm
    ECDSA = 19,
    /// Elgamal (Encrypt and Sign, deprecated)
    ElgamalSign = 20,
    /// Reserved for Diffie-Hellman (X9.42)
    DiffieHellman = 21,
    /// EdDSA over the legacy curve OID encoding
    EdDSALegacy = 22,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl PublicKeyAlgorithm {
    /// Can this algorithm produce signatures?
    pub fn is_signing(&self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA
                | PublicKeyAlgorithm::RSASign
                | PublicKeyAlgorithm::DSA
                | PublicKeyAlgorithm::ECDSA
                | PublicKeyAlgorithm::EdDSALegacy
        )
    }
}
