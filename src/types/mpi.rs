use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use zeroize::Zeroize;

use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;

/// A multi-precision integer: a big-endian number prefixed by its length
/// in bits, with no leading zero octets.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-3.2>
#[derive(Clone, PartialEq, Eq, Zeroize, derive_more::Debug)]
#[debug("Mpi({})", hex::encode(_0))]
pub struct Mpi(Vec<u8>);

impl Mpi {
    /// Strips any leading zero octets.
    pub fn from_slice(raw: &[u8]) -> Self {
        let offset = raw.iter().position(|b| *b != 0).unwrap_or(raw.len());
        Mpi(raw[offset..].to_vec())
    }

    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let bits = i.read_be_u16()? as usize;
        let len = (bits + 7) / 8;
        let raw = i.take_bytes(len)?;

        // normalize, so a sloppily encoded input still round-trips through us
        Ok(Mpi::from_slice(&raw))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_ref(&self) -> &[u8] {
        &self.0
    }

    /// The value left-padded with zeros to `len` bytes.
    pub fn to_padded(&self, len: usize) -> Result<Vec<u8>> {
        crate::errors::ensure!(
            self.0.len() <= len,
            "mpi of {} bytes does not fit into {}",
            self.0.len(),
            len
        );
        let mut out = vec![0u8; len];
        out[len - self.0.len()..].copy_from_slice(&self.0);
        Ok(out)
    }

    fn bit_len(&self) -> usize {
        match self.0.first() {
            Some(first) => (self.0.len() - 1) * 8 + (8 - first.leading_zeros() as usize),
            None => 0,
        }
    }
}

impl AsRef<[u8]> for Mpi {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Mpi {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(self.bit_len() as u16)?;
        writer.write_all(&self.0)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.0.len()
    }
}
