use std::io::{self, Read};

use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;

use crate::errors::{Error, Result};
use crate::types::{PacketLength, Tag, Version};

/// A framed packet straight off the wire, body fully assembled but not yet
/// interpreted.
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub version: Version,
    pub tag: Tag,
    #[debug("{} bytes", body.len())]
    pub body: Bytes,
}

/// Pulls framed packets out of a byte stream, lazily and strictly in wire
/// order. This is the raw layer under [`crate::packet::PacketStream`],
/// which adds typed dispatch on top.
pub struct PacketParser<R: Read> {
    reader: R,
    failed: bool,
}

impl<R: Read> PacketParser<R> {
    pub fn new(reader: R) -> Self {
        PacketParser {
            reader,
            failed: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_next(&mut self) -> Result<Option<RawPacket>> {
        // EOF before a header byte is the clean end of the stream
        let first = match self.reader.read_u8() {
            Ok(b) => b,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if first & 0x80 == 0 {
            return Err(Error::MalformedParams {
                message: format!("invalid packet header byte {first:#04x}"),
            });
        }

        let (version, tag, length) = if first & 0x40 != 0 {
            // new format: tag in the low six bits
            // Ref: https://tools.ietf.org/html/rfc4880#section-4.2.2
            let tag = Tag::from(first & 0x3f);
            let length = read_new_length(&mut self.reader)?;
            (Version::New, tag, length)
        } else {
            // old format: tag in bits 2..6, length type in the low two
            // Ref: https://tools.ietf.org/html/rfc4880#section-4.2.1
            let tag = Tag::from((first >> 2) & 0x0f);
            let length = match first & 0b11 {
                0 => PacketLength::Fixed(self.reader.read_u8()? as usize),
                1 => PacketLength::Fixed(self.reader.read_u16::<BigEndian>()? as usize),
                2 => PacketLength::Fixed(self.reader.read_u32::<BigEndian>()? as usize),
                _ => PacketLength::Indeterminated,
            };
            (Version::Old, tag, length)
        };

        let body = match length {
            PacketLength::Fixed(len) => read_exact(&mut self.reader, len)?,
            PacketLength::Indeterminated => {
                let mut body = Vec::new();
                self.reader.read_to_end(&mut body)?;
                body
            }
            PacketLength::Partial(len) => self.read_partial_body(len)?,
        };

        Ok(Some(RawPacket {
            version,
            tag,
            body: body.into(),
        }))
    }

    /// Drains the chunks of a partial-length body until the final simple
    /// length.
    fn read_partial_body(&mut self, first_len: usize) -> Result<Vec<u8>> {
        let mut body = read_exact(&mut self.reader, first_len)?;

        loop {
            match read_new_length(&mut self.reader)? {
                PacketLength::Partial(len) => {
                    body.extend_from_slice(&read_exact(&mut self.reader, len)?);
                }
                PacketLength::Fixed(len) => {
                    body.extend_from_slice(&read_exact(&mut self.reader, len)?);
                    return Ok(body);
                }
                PacketLength::Indeterminated => {
                    return Err(Error::MalformedParams {
                        message: "invalid length inside a partial body".to_string(),
                    });
                }
            }
        }
    }
}

fn read_new_length<R: Read>(reader: &mut R) -> Result<PacketLength> {
    let olen = map_eof(reader.read_u8())?;
    let length = match olen {
        // One-Octet Lengths
        0..=191 => PacketLength::Fixed(olen as usize),
        // Two-Octet Lengths
        192..=223 => {
            let second = map_eof(reader.read_u8())?;
            PacketLength::Fixed(((olen as usize - 192) << 8) + 192 + second as usize)
        }
        // Partial Body Lengths
        224..=254 => PacketLength::Partial(1 << (olen as usize & 0x1f)),
        // Five-Octet Lengths
        255 => PacketLength::Fixed(map_eof(reader.read_u32::<BigEndian>())? as usize),
    };
    Ok(length)
}

fn read_exact<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    map_eof(reader.read_exact(&mut buf))?;
    Ok(buf)
}

/// Running out of input inside a packet is a framing error, not a clean end.
fn map_eof<T>(res: io::Result<T>) -> Result<T> {
    res.map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::PacketIncomplete
        } else {
            err.into()
        }
    })
}

impl<R: Read> Iterator for PacketParser<R> {
    type Item = Result<RawPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_next() {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
