use std::io::{Read, Write};
use std::ops::Deref;

use log::debug;

use crate::config::Config;
use crate::errors::{ensure, Error, Result};
use crate::packet::packet_sum::Packet;
use crate::packet::parser::PacketParser;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{write_new_length, write_partial_length, Tag};

/// A body of at least this size gets partial-length framing when its tag
/// allows streaming.
pub const PARTIAL_CHUNK_THRESHOLD: usize = 512;

/// The not-yet-materialized tail of a packet stream.
///
/// Yields the packets following the first streaming-capable packet of a
/// [`PacketList`], applying the same allow-list and tolerance rules as the
/// eager part of the read.
pub struct PacketStream<'a> {
    parser: PacketParser<Box<dyn Read + 'a>>,
    allowed: Vec<Tag>,
    config: Config,
    failed: bool,
}

impl<'a> PacketStream<'a> {
    fn new<R: Read + 'a>(reader: R, allowed: &[Tag], config: &Config) -> Self {
        PacketStream {
            parser: PacketParser::new(Box::new(reader)),
            allowed: allowed.to_vec(),
            config: config.clone(),
            failed: false,
        }
    }
}

impl Iterator for PacketStream<'_> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            // framing errors always abort: the stream offset is lost
            let raw = match self.parser.next()? {
                Ok(raw) => raw,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            };

            if !self.allowed.contains(&raw.tag) {
                self.failed = true;
                return Some(Err(Error::DisallowedPacket { tag: raw.tag }));
            }

            match Packet::from_bytes(raw.version, raw.tag, raw.body) {
                Ok(packet) => return Some(Ok(packet)),
                Err(err) if raw.tag.is_streaming_capable() || !self.config.tolerant => {
                    self.failed = true;
                    return Some(Err(err));
                }
                Err(err) => {
                    debug!("skipping invalid {:?} packet: {:?}", raw.tag, err);
                }
            }
        }
    }
}

impl std::fmt::Debug for PacketStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketStream")
            .field("allowed", &self.allowed)
            .finish_non_exhaustive()
    }
}

/// An ordered sequence of typed packets, plus the optional tail stream
/// delivering packets that were not yet materialized.
#[derive(Debug, Default)]
pub struct PacketList<'a> {
    packets: Vec<Packet>,
    stream: Option<PacketStream<'a>>,
}

impl PartialEq for PacketList<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.packets == other.packets
    }
}

impl Eq for PacketList<'_> {}

impl<'a> PacketList<'a> {
    pub fn new() -> Self {
        PacketList::default()
    }

    pub fn from_packets(packets: Vec<Packet>) -> Self {
        PacketList {
            packets,
            stream: None,
        }
    }

    /// Reads a stream of framed packets.
    ///
    /// Every tag must be in `allowed`. A packet that fails to parse aborts
    /// the list when its tag is streaming capable or `config.tolerant` is
    /// off; otherwise it is logged and skipped.
    ///
    /// Packets are materialized eagerly up to and including the first
    /// streaming-capable packet; everything after it stays behind
    /// [`PacketList::stream`], to be pulled lazily.
    pub fn from_reader<R: Read + 'a>(reader: R, allowed: &[Tag], config: &Config) -> Result<Self> {
        let mut stream = PacketStream::new(reader, allowed, config);
        let mut packets = Vec::new();

        loop {
            let Some(packet) = stream.next() else {
                return Ok(PacketList {
                    packets,
                    stream: None,
                });
            };
            let packet = packet?;
            let streaming = packet.tag().is_streaming_capable();
            packets.push(packet);
            if streaming {
                return Ok(PacketList {
                    packets,
                    stream: Some(stream),
                });
            }
        }
    }

    pub fn from_bytes(bytes: &'a [u8], allowed: &[Tag], config: &Config) -> Result<Self> {
        Self::from_reader(bytes, allowed, config)
    }

    /// The not-yet-materialized remainder of the input, if any.
    pub fn stream(&mut self) -> Option<&mut PacketStream<'a>> {
        self.stream.as_mut()
    }

    /// Detaches the tail stream from the list.
    pub fn take_stream(&mut self) -> Option<PacketStream<'a>> {
        self.stream.take()
    }

    /// Pulls the whole tail stream into the in-memory list.
    pub fn read_to_end(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            for packet in stream {
                self.packets.push(packet?);
            }
        }
        Ok(())
    }

    /// Serializes the materialized packets with their headers.
    ///
    /// Large bodies of streaming capable packets are re-framed into
    /// partial-length segments.
    pub fn to_writer<W: Write>(&self, writer: &mut W) -> Result<()> {
        for packet in &self.packets {
            let tag = packet.tag();
            let body = packet.to_bytes()?;

            if tag.is_streaming_capable() && body.len() >= PARTIAL_CHUNK_THRESHOLD {
                write_streamed(writer, tag, &body[..])?;
            } else {
                packet.packet_version().write_header(writer, tag, body.len())?;
                writer.write_all(&body)?;
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.to_writer(&mut buf)?;
        Ok(buf)
    }

    pub fn push(&mut self, packet: impl Into<Packet>) {
        self.packets.push(packet.into());
    }

    /// All materialized packets whose tag is in `tags`, in their original
    /// order.
    pub fn filter_by_tag(&self, tags: &[Tag]) -> PacketList<'static> {
        PacketList {
            packets: self
                .packets
                .iter()
                .filter(|p| tags.contains(&p.tag()))
                .cloned()
                .collect(),
            stream: None,
        }
    }

    /// The first packet with the given tag.
    pub fn find_packet(&self, tag: Tag) -> Option<&Packet> {
        self.packets.iter().find(|p| p.tag() == tag)
    }

    /// The indices of all packets whose tag is in `tags`.
    pub fn index_of_tag(&self, tags: &[Tag]) -> Vec<usize> {
        self.packets
            .iter()
            .enumerate()
            .filter(|(_, p)| tags.contains(&p.tag()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Appends the other list's materialized packets; a tail stream is
    /// carried over when this list has none of its own.
    pub fn concat(mut self, other: PacketList<'a>) -> PacketList<'a> {
        self.packets.extend(other.packets);
        if self.stream.is_none() {
            self.stream = other.stream;
        }
        self
    }
}

impl Deref for PacketList<'_> {
    type Target = [Packet];

    fn deref(&self) -> &Self::Target {
        &self.packets
    }
}

impl IntoIterator for PacketList<'_> {
    type Item = Packet;
    type IntoIter = std::vec::IntoIter<Packet>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.into_iter()
    }
}

impl From<Vec<Packet>> for PacketList<'_> {
    fn from(packets: Vec<Packet>) -> Self {
        PacketList {
            packets,
            stream: None,
        }
    }
}

/// Frames a body of unknown length: new style tag byte, then power-of-two
/// partial segments, then a simple length header for the final residue.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-4.2.2.4>
pub fn write_streamed<W: Write, R: Read>(writer: &mut W, tag: Tag, mut body: R) -> Result<()> {
    ensure!(
        tag.is_streaming_capable(),
        "packet {:?} may not use partial lengths",
        tag
    );

    writer.write_all(&[0b1100_0000 | tag.encode()])?;

    let mut buffer: Vec<u8> = Vec::with_capacity(2 * PARTIAL_CHUNK_THRESHOLD);
    let mut chunk = [0u8; 8192];
    let mut eof = false;

    loop {
        while !eof && buffer.len() < PARTIAL_CHUNK_THRESHOLD {
            let n = body.read(&mut chunk)?;
            if n == 0 {
                eof = true;
            } else {
                buffer.extend_from_slice(&chunk[..n]);
            }
        }

        if buffer.len() >= PARTIAL_CHUNK_THRESHOLD {
            // the largest power of two that fits, capped at 2^30
            let power = (usize::BITS - 1 - buffer.len().leading_zeros()).min(30);
            let len = 1usize << power;

            write_partial_length(writer, power as u8)?;
            writer.write_all(&buffer[..len])?;
            buffer.drain(..len);
        } else if eof {
            write_new_length(writer, buffer.len())?;
            writer.write_all(&buffer)?;
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::packet::parser::PacketParser;
    use crate::packet::{KeyType, LiteralData, OnePassSignature, SecretKey};
    use crate::types::Version;

    const KEY_TAGS: &[Tag] = &[
        Tag::PublicKey,
        Tag::PublicSubkey,
        Tag::SecretKey,
        Tag::SecretSubkey,
    ];

    fn literal(data: &[u8]) -> LiteralData {
        LiteralData::new(
            &b"f"[..],
            Utc.timestamp_opt(1_600_000_000, 0).single().unwrap(),
            data.to_vec(),
        )
    }

    fn sample_keys() -> (SecretKey, SecretKey) {
        let mut rng = ChaCha8Rng::seed_from_u64(51);
        let config = Config::default();
        let created = Utc.timestamp_opt(1_600_000_000, 0).single().unwrap();
        let a = SecretKey::generate(&mut rng, KeyType::EdDsaLegacy, created, &config).unwrap();
        let b = SecretKey::generate(&mut rng, KeyType::EdDsaLegacy, created, &config).unwrap();
        (a, b)
    }

    #[test]
    fn ordering_is_preserved() {
        let (a, b) = sample_keys();
        let mut list = PacketList::new();
        list.push(a.public_portion());
        list.push(b.clone());
        list.push(a.clone());

        let bytes = list.to_bytes().unwrap();
        let back = PacketList::from_bytes(&bytes, KEY_TAGS, &Config::default()).unwrap();

        assert_eq!(back.len(), 3);
        assert_eq!(back[0].tag(), Tag::PublicKey);
        assert_eq!(back[1].tag(), Tag::SecretKey);
        assert_eq!(back[2].tag(), Tag::SecretKey);
        assert_eq!(back, list);
    }

    #[test]
    fn disallowed_packets_abort() {
        let (a, _) = sample_keys();
        let mut list = PacketList::new();
        list.push(a);

        let bytes = list.to_bytes().unwrap();
        let res = PacketList::from_bytes(&bytes, &[Tag::PublicKey], &Config::default());
        assert!(matches!(
            res,
            Err(Error::DisallowedPacket {
                tag: Tag::SecretKey
            })
        ));
    }

    #[test]
    fn helpers_filter_and_find() {
        let (a, b) = sample_keys();
        let mut list = PacketList::new();
        list.push(a.public_portion());
        list.push(b.clone());
        list.push(a.public_portion());

        assert_eq!(list.filter_by_tag(&[Tag::PublicKey]).len(), 2);
        assert_eq!(list.index_of_tag(&[Tag::SecretKey]), vec![1]);
        assert!(list.find_packet(Tag::SecretKey).is_some());
        assert!(list.find_packet(Tag::OnePassSignature).is_none());

        let other = PacketList::from_packets(vec![b.into()]);
        let combined = list.concat(other);
        assert_eq!(combined.len(), 4);
        assert_eq!(combined[3].tag(), Tag::SecretKey);
    }

    // S5: 4096 byte streaming body
    #[test]
    fn partial_length_write() {
        let body = vec![0x5a; 4096];
        let mut wire = Vec::new();
        write_streamed(&mut wire, Tag::LiteralData, &body[..]).unwrap();

        // tag byte, one 4096-byte partial segment, zero length terminator
        assert_eq!(wire[0], 0xcb);
        assert_eq!(wire[1], 224 | 12);
        assert_eq!(&wire[2..2 + 4096], &body[..]);
        assert_eq!(&wire[2 + 4096..], &[0]);

        let packets: Vec<_> = PacketParser::new(&wire[..])
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(&packets[0].body[..], &body[..]);
    }

    #[test]
    fn partial_length_chunks_are_powers_of_two() {
        for total in [512usize, 600, 1023, 4096, 10_000] {
            let body: Vec<u8> = (0..total).map(|i| i as u8).collect();
            let mut wire = Vec::new();
            write_streamed(&mut wire, Tag::LiteralData, &body[..]).unwrap();

            // walk the emitted frames by hand
            let mut i = 1;
            let mut assembled = Vec::new();
            loop {
                let olen = wire[i] as usize;
                i += 1;
                match olen {
                    224..=254 => {
                        let len: usize = 1 << (olen & 0x1f);
                        assert!(len.is_power_of_two() && len >= 2, "chunk of {len}");
                        assembled.extend_from_slice(&wire[i..i + len]);
                        i += len;
                    }
                    0..=191 => {
                        assembled.extend_from_slice(&wire[i..i + olen]);
                        i += olen;
                        break;
                    }
                    192..=223 => {
                        let len = ((olen - 192) << 8) + 192 + wire[i] as usize;
                        i += 1;
                        assembled.extend_from_slice(&wire[i..i + len]);
                        i += len;
                        break;
                    }
                    _ => panic!("unexpected five-octet final length"),
                }
            }
            assert_eq!(i, wire.len());
            assert_eq!(assembled, body, "total {total}");
        }
    }

    #[test]
    fn streamed_bodies_roundtrip_through_the_list() {
        let packet = literal(&vec![0x11; 5000]);
        let mut list = PacketList::new();
        list.push(packet.clone());

        let bytes = list.to_bytes().unwrap();
        let mut back =
            PacketList::from_bytes(&bytes, &[Tag::LiteralData], &Config::default()).unwrap();
        assert_eq!(back.len(), 1);
        let Packet::LiteralData(ref parsed) = back[0] else {
            panic!("wrong packet type");
        };
        assert_eq!(parsed, &packet);

        // the read stopped right after the streaming-capable packet
        assert!(back.stream().expect("tail stream").next().is_none());
    }

    #[test]
    fn read_stops_at_the_first_streaming_packet() {
        let (a, _) = sample_keys();
        let mut list = PacketList::new();
        list.push(literal(b"streamed"));
        list.push(a.public_portion());
        let bytes = list.to_bytes().unwrap();

        let allowed = &[Tag::LiteralData, Tag::PublicKey];
        let mut back = PacketList::from_bytes(&bytes, allowed, &Config::default()).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].tag(), Tag::LiteralData);

        // the rest only materializes when pulled off the tail stream
        let stream = back.stream().expect("tail stream");
        let next = stream.next().expect("one more packet").unwrap();
        assert_eq!(next.tag(), Tag::PublicKey);
        assert!(stream.next().is_none());
    }

    #[test]
    fn read_to_end_materializes_the_tail() {
        let (a, b) = sample_keys();
        let mut list = PacketList::new();
        list.push(literal(b"streamed"));
        list.push(a.public_portion());
        list.push(b.public_portion());
        let bytes = list.to_bytes().unwrap();

        let allowed = &[Tag::LiteralData, Tag::PublicKey];
        let mut back = PacketList::from_bytes(&bytes, allowed, &Config::default()).unwrap();
        assert_eq!(back.len(), 1);

        back.read_to_end().unwrap();
        assert!(back.stream().is_none());
        assert_eq!(back.len(), 3);
        assert_eq!(back, list);

        // keys before the literal stay eager, nothing is streamed
        let mut eager = PacketList::new();
        eager.push(a.public_portion());
        eager.push(b.public_portion());
        let bytes = eager.to_bytes().unwrap();
        let mut back = PacketList::from_bytes(&bytes, allowed, &Config::default()).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.stream().is_none());
    }

    #[test]
    fn tail_stream_enforces_the_allow_list() {
        let (a, _) = sample_keys();
        let mut list = PacketList::new();
        list.push(literal(b"streamed"));
        list.push(a.clone());
        let bytes = list.to_bytes().unwrap();

        // the secret key is only encountered lazily, and still rejected
        let mut back =
            PacketList::from_bytes(&bytes, &[Tag::LiteralData], &Config::default()).unwrap();
        assert_eq!(back.len(), 1);
        assert!(matches!(
            back.read_to_end(),
            Err(Error::DisallowedPacket {
                tag: Tag::SecretKey
            })
        ));
    }

    #[test]
    fn small_streaming_bodies_use_simple_lengths() {
        let mut list = PacketList::new();
        list.push(literal(b"tiny"));

        let bytes = list.to_bytes().unwrap();
        // 0xcb tag, simple one-octet length
        assert_eq!(bytes[0], 0xcb);
        assert_eq!(bytes[1] as usize, bytes.len() - 2);
    }

    // S6: middle packet has a bad body
    #[test]
    fn tolerant_read_skips_bad_packets() {
        let _ = pretty_env_logger::try_init();

        let (a, b) = sample_keys();
        let mut wire = Vec::new();

        let good_a = a.public_portion().to_bytes().unwrap();
        Version::default()
            .write_header(&mut wire, Tag::PublicKey, good_a.len())
            .unwrap();
        wire.extend_from_slice(&good_a);

        // a public key whose MPI announces more bits than there are bytes
        let bad = [4u8, 0, 0, 0, 0, 1, 0xff, 0xff, 0x01];
        Version::default()
            .write_header(&mut wire, Tag::PublicKey, bad.len())
            .unwrap();
        wire.extend_from_slice(&bad);

        let good_b = b.public_portion().to_bytes().unwrap();
        Version::default()
            .write_header(&mut wire, Tag::PublicKey, good_b.len())
            .unwrap();
        wire.extend_from_slice(&good_b);

        let allowed = &[Tag::PublicKey];
        let tolerant = PacketList::from_bytes(&wire, allowed, &Config::default()).unwrap();
        assert_eq!(tolerant.len(), 2);

        let strict_config = crate::config::ConfigBuilder::default()
            .tolerant(false)
            .build()
            .unwrap();
        assert!(PacketList::from_bytes(&wire, allowed, &strict_config).is_err());
    }

    #[test]
    fn one_pass_signature_list_roundtrip() {
        let (a, _) = sample_keys();
        let ops = OnePassSignature::from_details(
            crate::packet::SignatureType::Binary,
            crate::crypto::hash::HashAlgorithm::Sha512,
            a.algorithm(),
            a.key_id(),
        );

        let mut list = PacketList::new();
        list.push(ops);
        list.push(literal(b"signed data"));

        let bytes = list.to_bytes().unwrap();
        let back = PacketList::from_bytes(
            &bytes,
            &[Tag::OnePassSignature, Tag::LiteralData, Tag::Signature],
            &Config::default(),
        )
        .unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back, list);
    }
}
