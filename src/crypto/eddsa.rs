use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::{CryptoRng, Rng};

use crate::errors::{ensure, ensure_eq, Error, Result};
use crate::types::Mpi;

/// Generate an Ed25519 key pair in the legacy encoding:
/// the public point is `0x40 || compressed`.
pub fn generate_key<R: Rng + CryptoRng>(mut rng: R) -> (Mpi, Mpi) {
    let signing = SigningKey::generate(&mut rng);
    let public = signing.verifying_key();

    let mut q = Vec::with_capacity(33);
    q.push(0x40);
    q.extend_from_slice(public.as_bytes());

    (Mpi::from_slice(&q), Mpi::from_slice(&signing.to_bytes()))
}

fn signing_key(d: &Mpi) -> Result<SigningKey> {
    let seed: [u8; 32] = d
        .to_padded(32)?
        .try_into()
        .expect("padded to fixed size");
    Ok(SigningKey::from_bytes(&seed))
}

/// Sign a pre-computed digest.
pub fn sign(d: &Mpi, digest: &[u8]) -> Result<Vec<Mpi>> {
    let key = signing_key(d)?;
    let sig = key.sign(digest).to_bytes();

    Ok(vec![Mpi::from_slice(&sig[..32]), Mpi::from_slice(&sig[32..])])
}

/// Verify an `(r, s)` signature over a pre-computed digest.
pub fn verify(q: &Mpi, digest: &[u8], sig: &[Mpi]) -> Result<()> {
    ensure_eq!(sig.len(), 2, "eddsa signature must be the pair (r, s)");

    let q = q.as_ref();
    ensure!(
        q.len() == 33 && q[0] == 0x40,
        "invalid ed25519 public point encoding"
    );
    let key = VerifyingKey::from_bytes(q[1..].try_into().expect("fixed size"))?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&sig[0].to_padded(32)?);
    sig_bytes[32..].copy_from_slice(&sig[1].to_padded(32)?);

    key.verify_strict(digest, &ed25519_dalek::Signature::from_bytes(&sig_bytes))?;
    Ok(())
}

/// Check that the public point matches the secret seed.
pub fn validate(d: &Mpi, q: &Mpi) -> Result<()> {
    let derived = signing_key(d)?.verifying_key();

    let mut expected = Vec::with_capacity(33);
    expected.push(0x40);
    expected.extend_from_slice(derived.as_bytes());

    if expected != q.as_ref() {
        return Err(Error::ValidationFailed {
            message: "public point does not match the secret seed".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;

    #[test]
    fn sign_verify_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (q, d) = generate_key(&mut rng);

        let digest = HashAlgorithm::Sha512.digest(b"legacy but present").unwrap();
        let sig = sign(&d, &digest).unwrap();
        verify(&q, &digest, &sig).unwrap();

        let other = HashAlgorithm::Sha512.digest(b"flipped").unwrap();
        assert!(verify(&q, &other, &sig).is_err());
    }

    #[test]
    fn validate_detects_mismatch() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let (q, d) = generate_key(&mut rng);
        validate(&d, &q).unwrap();

        let (other_q, _) = generate_key(&mut rng);
        assert!(validate(&d, &other_q).is_err());
    }
}
