/// The ECC curves the crate knows about, identified by their curve OID
/// on the wire.
/// Ref: <https://tools.ietf.org/html/rfc6637#section-11>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ECCCurve {
    Curve25519,
    Ed25519,
    P256,
    P384,
    P521,
    Secp256k1,
    BrainpoolP256r1,
    BrainpoolP384r1,
    BrainpoolP512r1,
}

impl ECCCurve {
    /// ASN.1 OID, without the tag and length prefix.
    pub fn oid(&self) -> Vec<u8> {
        match self {
            // 1.3.6.1.4.1.3029.1.5.1
            ECCCurve::Curve25519 => vec![0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x05, 0x01],
            // 1.3.6.1.4.1.11591.15.1
            ECCCurve::Ed25519 => vec![0x2B, 0x06, 0x01, 0x04, 0x01, 0xDA, 0x47, 0x0F, 0x01],
            // 1.2.840.10045.3.1.7
            ECCCurve::P256 => vec![0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
            // 1.3.132.0.34
            ECCCurve::P384 => vec![0x2B, 0x81, 0x04, 0x00, 0x22],
            // 1.3.132.0.35
            ECCCurve::P521 => vec![0x2B, 0x81, 0x04, 0x00, 0x23],
            // 1.3.132.0.10
            ECCCurve::Secp256k1 => vec![0x2B, 0x81, 0x04, 0x00, 0x0A],
            // 1.3.36.3.3.2.8.1.1.7
            ECCCurve::BrainpoolP256r1 => vec![0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x07],
            // 1.3.36.3.3.2.8.1.1.11
            ECCCurve::BrainpoolP384r1 => vec![0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0B],
            // 1.3.36.3.3.2.8.1.1.13
            ECCCurve::BrainpoolP512r1 => vec![0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0D],
        }
    }

    /// Field size in bytes, the fixed width of a signature half.
    pub fn coordinate_len(&self) -> usize {
        match self {
            ECCCurve::Curve25519 | ECCCurve::Ed25519 => 32,
            ECCCurve::P256 | ECCCurve::Secp256k1 | ECCCurve::BrainpoolP256r1 => 32,
            ECCCurve::P384 | ECCCurve::BrainpoolP384r1 => 48,
            ECCCurve::BrainpoolP512r1 => 64,
            ECCCurve::P521 => 66,
        }
    }
}

/// Lookup a curve by its OID bytes.
pub fn ecc_curve_from_oid(oid: &[u8]) -> Option<ECCCurve> {
    [
        ECCCurve::Curve25519,
        ECCCurve::Ed25519,
        ECCCurve::P256,
        ECCCurve::P384,
        ECCCurve::P521,
        ECCCurve::Secp256k1,
        ECCCurve::BrainpoolP256r1,
        ECCCurve::BrainpoolP384r1,
        ECCCurve::BrainpoolP512r1,
    ]
    .into_iter()
    .find(|curve| curve.oid() == oid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_roundtrip() {
        for curve in [
            ECCCurve::Curve25519,
            ECCCurve::Ed25519,
            ECCCurve::P256,
            ECCCurve::P384,
            ECCCurve::P521,
            ECCCurve::Secp256k1,
            ECCCurve::BrainpoolP256r1,
            ECCCurve::BrainpoolP384r1,
            ECCCurve::BrainpoolP512r1,
        ] {
            assert_eq!(ecc_curve_from_oid(&curve.oid()), Some(curve));
        }
        assert_eq!(ecc_curve_from_oid(&[0x2B, 0x06]), None);
    }
}
