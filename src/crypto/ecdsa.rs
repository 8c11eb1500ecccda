use generic_array::GenericArray;
use rand::{CryptoRng, Rng};
use signature::hazmat::{PrehashSigner, PrehashVerifier};

use crate::crypto::ecc_curve::ECCCurve;
use crate::crypto::hash::HashAlgorithm;
use crate::errors::{ensure_eq, unsupported_err, Error, Result};
use crate::types::{EcdsaPublicParams, Mpi};

/// Generate an ECDSA key pair over the given curve.
pub fn generate_key<R: Rng + CryptoRng>(
    mut rng: R,
    curve: &ECCCurve,
) -> Result<(EcdsaPublicParams, Mpi)> {
    match curve {
        ECCCurve::P256 => {
            let secret = p256::SecretKey::random(&mut rng);
            Ok((
                EcdsaPublicParams::P256 {
                    key: secret.public_key(),
                },
                Mpi::from_slice(&secret.to_bytes()),
            ))
        }
        ECCCurve::P384 => {
            let secret = p384::SecretKey::random(&mut rng);
            Ok((
                EcdsaPublicParams::P384 {
                    key: secret.public_key(),
                },
                Mpi::from_slice(&secret.to_bytes()),
            ))
        }
        ECCCurve::P521 => {
            let secret = p521::SecretKey::random(&mut rng);
            Ok((
                EcdsaPublicParams::P521 {
                    key: secret.public_key(),
                },
                Mpi::from_slice(&secret.to_bytes()),
            ))
        }
        ECCCurve::Secp256k1 => {
            let secret = k256::SecretKey::random(&mut rng);
            Ok((
                EcdsaPublicParams::Secp256k1 {
                    key: secret.public_key(),
                },
                Mpi::from_slice(&secret.to_bytes()),
            ))
        }
        _ => unsupported_err!("ECDSA over {:?}", curve),
    }
}

/// Sign a pre-computed digest, producing the `(r, s)` pair.
///
/// Streamed and contiguous messages both arrive here as their digest: the
/// software tier works prehash-only.
pub fn sign(params: &EcdsaPublicParams, d: &Mpi, digest: &[u8]) -> Result<Vec<Mpi>> {
    let (r, s) = match params {
        EcdsaPublicParams::P256 { .. } => {
            let secret = p256::SecretKey::from_slice(&d.to_padded(32)?)?;
            let signing = p256::ecdsa::SigningKey::from(secret);
            let sig: p256::ecdsa::Signature = signing.sign_prehash(digest)?;
            let (r, s) = sig.split_bytes();
            (r.to_vec(), s.to_vec())
        }
        EcdsaPublicParams::P384 { .. } => {
            let secret = p384::SecretKey::from_slice(&d.to_padded(48)?)?;
            let signing = p384::ecdsa::SigningKey::from(secret);
            let sig: p384::ecdsa::Signature = signing.sign_prehash(digest)?;
            let (r, s) = sig.split_bytes();
            (r.to_vec(), s.to_vec())
        }
        EcdsaPublicParams::P521 { .. } => {
            let secret = p521::SecretKey::from_slice(&d.to_padded(66)?)?;
            let signing = p521::ecdsa::SigningKey::from_slice(&secret.to_bytes())?;
            let sig: p521::ecdsa::Signature = signing.sign_prehash(digest)?;
            let (r, s) = sig.split_bytes();
            (r.to_vec(), s.to_vec())
        }
        EcdsaPublicParams::Secp256k1 { .. } => {
            let secret = k256::SecretKey::from_slice(&d.to_padded(32)?)?;
            let signing = k256::ecdsa::SigningKey::from(secret);
            let sig: k256::ecdsa::Signature = signing.sign_prehash(digest)?;
            let sig = sig.normalize_s().unwrap_or(sig);
            let (r, s) = sig.split_bytes();
            (r.to_vec(), s.to_vec())
        }
        EcdsaPublicParams::Unsupported { curve, .. } => {
            unsupported_err!("ECDSA over {:?}", curve)
        }
    };

    Ok(vec![Mpi::from_slice(&r), Mpi::from_slice(&s)])
}

/// Verify an `(r, s)` signature over a pre-computed digest.
pub fn verify(params: &EcdsaPublicParams, digest: &[u8], sig: &[Mpi]) -> Result<()> {
    ensure_eq!(sig.len(), 2, "ecdsa signature must be the pair (r, s)");

    match params {
        EcdsaPublicParams::P256 { key } => {
            let sig = p256::ecdsa::Signature::from_scalars(
                GenericArray::clone_from_slice(&sig[0].to_padded(32)?),
                GenericArray::clone_from_slice(&sig[1].to_padded(32)?),
            )?;
            p256::ecdsa::VerifyingKey::from(key).verify_prehash(digest, &sig)?;
        }
        EcdsaPublicParams::P384 { key } => {
            let sig = p384::ecdsa::Signature::from_scalars(
                GenericArray::clone_from_slice(&sig[0].to_padded(48)?),
                GenericArray::clone_from_slice(&sig[1].to_padded(48)?),
            )?;
            p384::ecdsa::VerifyingKey::from(key).verify_prehash(digest, &sig)?;
        }
        EcdsaPublicParams::P521 { key } => {
            let sig = p521::ecdsa::Signature::from_scalars(
                GenericArray::clone_from_slice(&sig[0].to_padded(66)?),
                GenericArray::clone_from_slice(&sig[1].to_padded(66)?),
            )?;
            p521::ecdsa::VerifyingKey::from_affine(*key.as_affine())?
                .verify_prehash(digest, &sig)?;
        }
        EcdsaPublicParams::Secp256k1 { key } => {
            let sig = k256::ecdsa::Signature::from_scalars(
                GenericArray::clone_from_slice(&sig[0].to_padded(32)?),
                GenericArray::clone_from_slice(&sig[1].to_padded(32)?),
            )?;
            let sig = sig.normalize_s().unwrap_or(sig);
            k256::ecdsa::VerifyingKey::from(key).verify_prehash(digest, &sig)?;
        }
        EcdsaPublicParams::Unsupported { curve, .. } => {
            unsupported_err!("ECDSA over {:?}", curve)
        }
    }
    Ok(())
}

/// Self-test of a keypair: sign and verify a fresh 8-byte random message
/// under SHA-256.
pub fn validate<R: Rng + CryptoRng>(
    mut rng: R,
    params: &EcdsaPublicParams,
    d: &Mpi,
) -> Result<()> {
    let mut message = [0u8; 8];
    rng.fill(&mut message[..]);
    let digest = HashAlgorithm::Sha256.digest(&message)?;

    let check = sign(params, d, &digest).and_then(|sig| verify(params, &digest, &sig));
    check.map_err(|err| Error::ValidationFailed {
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for curve in [
            ECCCurve::P256,
            ECCCurve::P384,
            ECCCurve::P521,
            ECCCurve::Secp256k1,
        ] {
            let (params, d) = generate_key(&mut rng, &curve).unwrap();
            let digest = HashAlgorithm::Sha256.digest(b"streamed or not").unwrap();

            let sig = sign(&params, &d, &digest).unwrap();
            assert_eq!(sig.len(), 2);
            verify(&params, &digest, &sig).unwrap();

            let other = HashAlgorithm::Sha256.digest(b"tampered").unwrap();
            assert!(verify(&params, &other, &sig).is_err(), "{curve:?}");
        }
    }

    #[test]
    fn validate_self_test() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let (params, d) = generate_key(&mut rng, &ECCCurve::P256).unwrap();
        validate(&mut rng, &params, &d).unwrap();

        // a mismatched scalar must fail the self test
        let (_, other_d) = generate_key(&mut rng, &ECCCurve::P256).unwrap();
        assert!(matches!(
            validate(&mut rng, &params, &other_d),
            Err(Error::ValidationFailed { .. })
        ));
    }
}
