use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use pgp_packets::config::{Config, ConfigBuilder};
use pgp_packets::crypto::ecc_curve::ECCCurve;
use pgp_packets::crypto::hash::HashAlgorithm;
use pgp_packets::errors::Error;
use pgp_packets::packet::{KeyType, PacketTrait, SignatureType};
use pgp_packets::ser::Serialize;
use pgp_packets::types::{KeyVersion, SecretParams, Tag};
use pgp_packets::{LiteralData, OnePassSignature, Packet, PacketList, SecretKey, Signature};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const ALL_TAGS: &[Tag] = &[
    Tag::PublicKey,
    Tag::PublicSubkey,
    Tag::SecretKey,
    Tag::SecretSubkey,
    Tag::OnePassSignature,
    Tag::Signature,
    Tag::LiteralData,
];

fn created() -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_600_000_000, 0).single().unwrap()
}

fn generate(seed: u64, key_type: KeyType, config: &Config) -> SecretKey {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    SecretKey::generate(&mut rng, key_type, created(), config).unwrap()
}

#[test]
fn keyring_roundtrip_over_the_wire() {
    let config = Config::default();
    let ecdsa = generate(1, KeyType::Ecdsa(ECCCurve::P256), &config);
    let eddsa = generate(2, KeyType::EdDsaLegacy, &config);

    let mut list = PacketList::new();
    list.push(ecdsa.clone());
    list.push(ecdsa.public_portion());
    list.push(eddsa.clone());

    let bytes = list.to_bytes().unwrap();
    let back = PacketList::from_bytes(&bytes, ALL_TAGS, &config).unwrap();
    assert_eq!(back, list);

    // the public portion travels with the same fingerprint
    let Packet::SecretKey(ref secret) = back[0] else {
        panic!("wrong packet order");
    };
    let Packet::PublicKey(ref public) = back[1] else {
        panic!("wrong packet order");
    };
    assert_eq!(secret.fingerprint(), public.fingerprint());
    assert_eq!(secret.key_id(), public.key_id());
    assert_eq!(public.version(), KeyVersion::V4);
}

#[test]
fn v5_keys_use_sha256_fingerprints() {
    let config = ConfigBuilder::default().v5_keys(true).build().unwrap();
    let key = generate(3, KeyType::EdDsaLegacy, &config);

    assert_eq!(key.version(), KeyVersion::V5);
    let fingerprint = key.fingerprint();
    assert_eq!(fingerprint.len(), 32);
    // v5 key ids are the high eight bytes
    assert_eq!(key.key_id().as_bytes(), &fingerprint.as_bytes()[..8]);

    let bytes = key.to_bytes().unwrap();
    let back = SecretKey::from_buf(Default::default(), &mut &bytes[..]).unwrap();
    assert_eq!(back.fingerprint(), fingerprint);
}

#[test]
fn protect_write_read_unlock() {
    for (seed, aead) in [(4, false), (5, true)] {
        let config = ConfigBuilder::default().aead_protect(aead).build().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed + 100);

        let mut key = generate(seed, KeyType::Ecdsa(ECCCurve::P256), &config);
        let original = key.secret_params().clone();
        key.encrypt(&mut rng, "chasing waterfalls", &config).unwrap();

        let mut list = PacketList::new();
        list.push(key);
        let bytes = list.to_bytes().unwrap();

        let back = PacketList::from_bytes(&bytes, ALL_TAGS, &config).unwrap();
        let Packet::SecretKey(mut key) = back.into_iter().next().unwrap() else {
            panic!("wrong packet type");
        };

        assert!(matches!(
            key.decrypt("chasing watermills"),
            Err(Error::IncorrectPassphrase)
        ));
        assert!(key.decrypt("chasing waterfalls").unwrap());
        assert_eq!(key.secret_params(), &original);

        key.validate(&mut rng).unwrap();
    }
}

#[test]
fn one_pass_signed_message() {
    let config = Config::default();
    let key = generate(6, KeyType::Ecdsa(ECCCurve::P256), &config);
    let data = b"one-pass signed payload";

    let SecretParams::Plain(secret) = key.secret_params() else {
        panic!("generated keys are plain");
    };
    let sig = Signature::sign(
        key.as_inner(),
        secret,
        SignatureType::Binary,
        HashAlgorithm::Sha256,
        created(),
        data,
    )
    .unwrap();

    // emit the message the way a writer would: OPS, literal data, signature
    let mut list = PacketList::new();
    list.push(OnePassSignature::from_details(
        SignatureType::Binary,
        HashAlgorithm::Sha256,
        key.algorithm(),
        key.key_id(),
    ));
    list.push(LiteralData::new(&b"msg"[..], created(), &data[..]));
    list.push(sig);

    let bytes = list.to_bytes().unwrap();
    let mut back = PacketList::from_bytes(&bytes, ALL_TAGS, &config).unwrap();

    // the read materializes through the literal data; the trailing
    // signature waits behind the tail stream until pulled
    assert_eq!(back.len(), 2);
    assert!(back.stream().is_some());
    back.read_to_end().unwrap();
    assert_eq!(back.len(), 3);
    assert_eq!(back.index_of_tag(&[Tag::OnePassSignature]), vec![0]);

    let mut packets = back.into_iter();
    let Some(Packet::OnePassSignature(mut ops)) = packets.next() else {
        panic!("missing one-pass packet");
    };
    let Some(Packet::LiteralData(literal)) = packets.next() else {
        panic!("missing literal packet");
    };
    let Some(Packet::Signature(sig)) = packets.next() else {
        panic!("missing trailing signature");
    };

    // unpaired verification fails
    assert!(matches!(
        ops.verify(key.as_inner(), literal.data()),
        Err(Error::MissingTrailingSignature)
    ));

    ops.link_signature(sig).unwrap();
    ops.verify(key.as_inner(), literal.data()).unwrap();

    // the pairing is rejected for a different announcement
    let mut mismatched = OnePassSignature::from_details(
        SignatureType::Text,
        HashAlgorithm::Sha256,
        key.algorithm(),
        key.key_id(),
    );
    mismatched
        .link_signature(ops.corresponding_sig().unwrap().clone())
        .unwrap();
    assert!(matches!(
        mismatched.verify(key.as_inner(), literal.data()),
        Err(Error::MismatchedTrailingSignature { .. })
    ));
}

#[test]
fn signed_key_packets_survive_protection() {
    // sign with a key, protect it, ship everything, unlock, verify again
    let config = Config::default();
    let mut rng = ChaCha8Rng::seed_from_u64(777);
    let mut key = generate(7, KeyType::EdDsaLegacy, &config);

    let SecretParams::Plain(secret) = key.secret_params() else {
        panic!("generated keys are plain");
    };
    let sig = Signature::sign(
        key.as_inner(),
        secret,
        SignatureType::Binary,
        HashAlgorithm::Sha512,
        created(),
        b"attested",
    )
    .unwrap();

    key.encrypt(&mut rng, "passphrase", &config).unwrap();

    let mut list = PacketList::new();
    list.push(key);
    list.push(sig);
    let bytes = list.to_bytes().unwrap();

    let back = PacketList::from_bytes(&bytes, ALL_TAGS, &config).unwrap();
    let mut packets = back.into_iter();
    let Some(Packet::SecretKey(mut key)) = packets.next() else {
        panic!("missing secret key");
    };
    let Some(Packet::Signature(sig)) = packets.next() else {
        panic!("missing signature");
    };

    assert!(key.decrypt("passphrase").unwrap());
    sig.verify(key.as_inner(), b"attested").unwrap();
    assert_eq!(sig.issuer_key_id(), Some(key.key_id()));
}

#[test]
fn dummy_and_cleared_keys_expose_no_material() {
    let config = Config::default();
    let mut rng = ChaCha8Rng::seed_from_u64(8);

    let mut dummy = generate(8, KeyType::EdDsaLegacy, &config);
    dummy.make_dummy();
    assert!(dummy.is_dummy());
    assert!(!dummy.decrypt("anything").unwrap());
    dummy.validate(&mut rng).unwrap();

    // the dummy round-trips through the wire and stays inert
    let bytes = dummy.to_bytes().unwrap();
    let back = SecretKey::from_buf(Default::default(), &mut &bytes[..]).unwrap();
    assert!(back.is_dummy());
    assert_eq!(back.to_bytes().unwrap(), bytes);

    let mut cleared = generate(9, KeyType::EdDsaLegacy, &config);
    cleared.clear_private_params();
    assert_eq!(cleared.secret_params(), &SecretParams::Cleared);
    assert!(cleared.to_bytes().is_err());
    assert!(cleared.validate(&mut rng).is_err());
}

#[test]
fn packet_list_rejects_unknown_tags() {
    let config = Config::default();
    let key = generate(10, KeyType::EdDsaLegacy, &config);

    let mut list = PacketList::new();
    list.push(key.public_portion());
    let bytes = list.to_bytes().unwrap();

    let res = PacketList::from_bytes(&bytes, &[Tag::LiteralData], &config);
    assert!(matches!(
        res,
        Err(Error::DisallowedPacket { tag: Tag::PublicKey })
    ));
}

#[test]
fn streamed_literal_data_roundtrip() {
    let config = Config::default();
    let payload: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();

    let mut list = PacketList::new();
    list.push(LiteralData::new(&b"big"[..], created(), payload.clone()));
    let bytes = list.to_bytes().unwrap();

    // the body must be re-framed into partial length segments
    assert_eq!(bytes[1] & 0xe0, 0xe0, "expected a partial length header");

    let back = PacketList::from_bytes(&bytes, &[Tag::LiteralData], &config).unwrap();
    let Packet::LiteralData(ref literal) = back[0] else {
        panic!("wrong packet type");
    };
    assert_eq!(&literal.data()[..], &payload[..]);
    assert_eq!(literal.tag(), Tag::LiteralData);
}
