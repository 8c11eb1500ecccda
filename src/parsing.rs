use bytes::{Buf, Bytes};

use crate::errors::{Error, Result};

/// Checked reads on top of [`bytes::Buf`], used by all packet body parsers.
pub trait BufParsing: Buf + Sized {
    fn read_u8(&mut self) -> Result<u8> {
        ensure_remaining(self, 1)?;
        Ok(self.get_u8())
    }

    fn read_be_u16(&mut self) -> Result<u16> {
        ensure_remaining(self, 2)?;
        Ok(self.get_u16())
    }

    fn read_be_u32(&mut self) -> Result<u32> {
        ensure_remaining(self, 4)?;
        Ok(self.get_u32())
    }

    fn read_array<const C: usize>(&mut self) -> Result<[u8; C]> {
        ensure_remaining(self, C)?;
        let mut arr = [0u8; C];
        self.copy_to_slice(&mut arr);
        Ok(arr)
    }

    fn take_bytes(&mut self, size: usize) -> Result<Bytes> {
        ensure_remaining(self, size)?;
        Ok(self.copy_to_bytes(size))
    }

    /// All remaining bytes.
    fn rest(&mut self) -> Bytes {
        self.copy_to_bytes(self.remaining())
    }
}

impl<B: Buf> BufParsing for B {}

fn ensure_remaining<B: Buf>(buf: &B, size: usize) -> Result<()> {
    if buf.remaining() < size {
        return Err(Error::MalformedParams {
            message: format!(
                "need {} more bytes, only {} available",
                size,
                buf.remaining()
            ),
        });
    }
    Ok(())
}
