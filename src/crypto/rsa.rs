use num_bigint::ModInverse;
use rand::{CryptoRng, Rng};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{bail, ensure, Result};
use crate::types::{Mpi, PlainSecretParams, PublicParams};

fn to_uint(mpi: &Mpi) -> BigUint {
    BigUint::from_bytes_be(mpi.as_ref())
}

/// PKCS#1 v1.5 padding carrying the digest OID of `hash`.
fn padding_scheme(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    let padding = match hash {
        HashAlgorithm::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Ripemd160 => Pkcs1v15Sign::new::<ripemd::Ripemd160>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        HashAlgorithm::Sha3_256 => Pkcs1v15Sign::new::<sha3::Sha3_256>(),
        HashAlgorithm::Sha3_512 => Pkcs1v15Sign::new::<sha3::Sha3_512>(),
        HashAlgorithm::None => bail!("rsa signatures require a hash algorithm"),
    };
    Ok(padding)
}

fn private_key(n: &Mpi, e: &Mpi, d: &Mpi, p: &Mpi, q: &Mpi) -> Result<RsaPrivateKey> {
    let key = RsaPrivateKey::from_components(
        to_uint(n),
        to_uint(e),
        to_uint(d),
        vec![to_uint(p), to_uint(q)],
    )?;
    Ok(key)
}

/// Sign a pre-computed digest.
pub fn sign(
    n: &Mpi,
    e: &Mpi,
    d: &Mpi,
    p: &Mpi,
    q: &Mpi,
    hash: HashAlgorithm,
    digest: &[u8],
) -> Result<Vec<Mpi>> {
    let key = private_key(n, e, d, p, q)?;
    let sig = key.sign(padding_scheme(hash)?, digest)?;
    Ok(vec![Mpi::from_slice(&sig)])
}

/// Verify a signature over a pre-computed digest.
pub fn verify(n: &Mpi, e: &Mpi, hash: HashAlgorithm, digest: &[u8], sig: &[u8]) -> Result<()> {
    let key = RsaPublicKey::new(to_uint(n), to_uint(e))?;
    key.verify(padding_scheme(hash)?, digest, sig)?;
    Ok(())
}

/// Check the private key against its public half.
pub fn validate(n: &Mpi, e: &Mpi, d: &Mpi, p: &Mpi, q: &Mpi, u: &Mpi) -> Result<()> {
    let pb = to_uint(p);
    let qb = to_uint(q);
    ensure!(&pb * &qb == to_uint(n), "primes do not produce the modulus");

    let key = private_key(n, e, d, p, q)?;
    key.validate()?;

    let inv = (&pb)
        .mod_inverse(&qb)
        .and_then(|inv| inv.to_biguint())
        .ok_or_else(|| crate::errors::format_err!("p is not invertible mod q"))?;
    ensure!(inv == to_uint(u), "u is not the inverse of p mod q");

    Ok(())
}

/// Generate a fresh RSA key of the given size.
pub fn generate_key<R: Rng + CryptoRng>(
    mut rng: R,
    bits: usize,
) -> Result<(PublicParams, PlainSecretParams)> {
    let key = RsaPrivateKey::new(&mut rng, bits)?;

    let p = &key.primes()[0];
    let q = &key.primes()[1];
    let u = p
        .mod_inverse(q)
        .and_then(|inv| inv.to_biguint())
        .ok_or_else(|| crate::errors::format_err!("p is not invertible mod q"))?;

    Ok((
        PublicParams::RSA {
            n: Mpi::from_slice(&key.n().to_bytes_be()),
            e: Mpi::from_slice(&key.e().to_bytes_be()),
        },
        PlainSecretParams::RSA {
            d: Mpi::from_slice(&key.d().to_bytes_be()),
            p: Mpi::from_slice(&p.to_bytes_be()),
            q: Mpi::from_slice(&q.to_bytes_be()),
            u: Mpi::from_slice(&u.to_bytes_be()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let (public, secret) = generate_key(&mut rng, 1024).unwrap();

        let (PublicParams::RSA { n, e }, PlainSecretParams::RSA { d, p, q, u }) =
            (&public, &secret)
        else {
            panic!("rsa generation produced the wrong params");
        };

        validate(n, e, d, p, q, u).unwrap();

        let digest = HashAlgorithm::Sha256.digest(b"signed data").unwrap();
        let sig = sign(n, e, d, p, q, HashAlgorithm::Sha256, &digest).unwrap();
        verify(n, e, HashAlgorithm::Sha256, &digest, sig[0].as_ref()).unwrap();

        let other = HashAlgorithm::Sha256.digest(b"not that data").unwrap();
        assert!(verify(n, e, HashAlgorithm::Sha256, &other, sig[0].as_ref()).is_err());
    }
}
