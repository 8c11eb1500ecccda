use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::{ensure, Result};

/// Packet type identifiers.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-4.3>
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Tag {
    /// Public-Key Encrypted Session Key Packet
    PublicKeyEncryptedSessionKey = 1,
    /// Signature Packet
    Signature = 2,
    /// Symmetric-Key Encrypted Session Key Packet
    SymKeyEncryptedSessionKey = 3,
    /// One-Pass Signature Packet
    OnePassSignature = 4,
    /// Secret-Key Packet
    SecretKey = 5,
    /// Public-Key Packet
    PublicKey = 6,
    /// Secret-Subkey Packet
    SecretSubkey = 7,
    /// Compressed Data Packet
    CompressedData = 8,
    /// Symmetrically Encrypted Data Packet
    SymEncryptedData = 9,
    /// Marker Packet
    Marker = 10,
    /// Literal Data Packet
    LiteralData = 11,
    /// Trust Packet
    Trust = 12,
    /// User ID Packet
    UserId = 13,
    /// Public-Subkey Packet
    PublicSubkey = 14,
    /// User Attribute Packet
    UserAttribute = 17,
    /// Sym. Encrypted and Integrity Protected Data Packet
    SymEncryptedProtectedData = 18,
    /// Modification Detection Code Packet
    ModDetectionCode = 19,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Tag {
    pub fn encode(self) -> u8 {
        self.into()
    }

    /// Tags carrying bulk user data; only these may use partial-length
    /// body framing.
    pub fn is_streaming_capable(self) -> bool {
        matches!(
            self,
            Tag::CompressedData
                | Tag::SymEncryptedData
                | Tag::LiteralData
                | Tag::SymEncryptedProtectedData
        )
    }
}

/// A packet body length on the wire.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketLength {
    Fixed(usize),
    /// One segment of a partial-length body.
    Partial(usize),
    Indeterminated,
}

impl From<usize> for PacketLength {
    fn from(val: usize) -> PacketLength {
        PacketLength::Fixed(val)
    }
}

/// Old or new style framing of the packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[repr(u8)]
pub enum Version {
    /// Old Packet Format
    Old,
    /// New Packet Format
    #[default]
    New,
}

impl Version {
    /// Writes the header for a packet with a known body length.
    pub fn write_header(self, writer: &mut impl io::Write, tag: Tag, len: usize) -> Result<()> {
        let tag = tag.encode();
        match self {
            Version::Old => {
                ensure!(tag < 16, "tag {} does not fit into an old style header", tag);
                if len < 256 {
                    writer.write_all(&[0b1000_0000 | tag << 2, len as u8])?;
                } else if len < 65536 {
                    writer.write_all(&[0b1000_0001 | tag << 2])?;
                    writer.write_u16::<BigEndian>(len as u16)?;
                } else {
                    writer.write_all(&[0b1000_0010 | tag << 2])?;
                    writer.write_u32::<BigEndian>(len as u32)?;
                }
            }
            Version::New => {
                writer.write_all(&[0b1100_0000 | tag])?;
                write_new_length(writer, len)?;
            }
        }

        Ok(())
    }

    pub fn header_len(self, len: usize) -> usize {
        match self {
            Version::Old => {
                if len < 256 {
                    2
                } else if len < 65536 {
                    3
                } else {
                    5
                }
            }
            Version::New => {
                1 + if len < 192 {
                    1
                } else if len < 8384 {
                    2
                } else {
                    5
                }
            }
        }
    }
}

/// New style length encoding without the tag byte.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-4.2.2>
pub(crate) fn write_new_length(writer: &mut impl io::Write, len: usize) -> Result<()> {
    if len < 192 {
        writer.write_all(&[len as u8])?;
    } else if len < 8384 {
        writer.write_all(&[((len - 192) / 256 + 192) as u8, ((len - 192) % 256) as u8])?;
    } else {
        writer.write_all(&[255])?;
        writer.write_u32::<BigEndian>(len as u32)?;
    }
    Ok(())
}

/// A partial body length header announcing a `1 << power` byte segment.
pub(crate) fn write_partial_length(writer: &mut impl io::Write, power: u8) -> Result<()> {
    ensure!(
        (1..=30).contains(&power),
        "invalid partial length power {}",
        power
    );
    writer.write_all(&[224 | power])?;
    Ok(())
}

/// Key packet versions supported by this crate. Versions 2 and 3 are
/// deliberately rejected during parsing.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum KeyVersion {
    V4 = 4,
    V5 = 5,
}

impl KeyVersion {
    pub fn try_from_u8(version: u8) -> Result<Self> {
        match version {
            4 => Ok(KeyVersion::V4),
            5 => Ok(KeyVersion::V5),
            _ => Err(crate::errors::Error::UnsupportedVersion { version }),
        }
    }
}

impl From<KeyVersion> for u8 {
    fn from(version: KeyVersion) -> u8 {
        version as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: Version, tag: Tag, len: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        version.write_header(&mut buf, tag, len).unwrap();
        buf
    }

    #[test]
    fn new_style_header_lengths() {
        assert_eq!(header(Version::New, Tag::LiteralData, 100), vec![0xcb, 100]);
        assert_eq!(
            header(Version::New, Tag::LiteralData, 1723),
            vec![0xcb, 197, 251]
        );
        assert_eq!(
            header(Version::New, Tag::LiteralData, 100_000),
            vec![0xcb, 255, 0x00, 0x01, 0x86, 0xa0]
        );
    }

    #[test]
    fn old_style_header_lengths() {
        assert_eq!(header(Version::Old, Tag::PublicKey, 100), vec![0x98, 100]);
        assert_eq!(
            header(Version::Old, Tag::PublicKey, 1000),
            vec![0x99, 0x03, 0xe8]
        );
    }

    #[test]
    fn header_len_matches() {
        for len in [0, 191, 192, 8383, 8384, 1 << 20] {
            for version in [Version::Old, Version::New] {
                assert_eq!(
                    header(version, Tag::LiteralData, len).len(),
                    version.header_len(len),
                    "{version:?} {len}"
                );
            }
        }
    }

    #[test]
    fn unsupported_key_versions() {
        assert!(KeyVersion::try_from_u8(4).is_ok());
        assert!(KeyVersion::try_from_u8(5).is_ok());
        for v in [2, 3, 6] {
            assert!(matches!(
                KeyVersion::try_from_u8(v),
                Err(crate::errors::Error::UnsupportedVersion { version }) if version == v
            ));
        }
    }

    #[test]
    fn streaming_capable_tags() {
        assert!(Tag::LiteralData.is_streaming_capable());
        assert!(Tag::CompressedData.is_streaming_capable());
        assert!(!Tag::PublicKey.is_streaming_capable());
        assert!(!Tag::OnePassSignature.is_streaming_capable());
    }
}
