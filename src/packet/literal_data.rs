use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::errors::{Error, Result};
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{Tag, Version};

/// Literal Data packet: the raw user payload of a message. This is the
/// packet whose body is typically streamed with partial lengths.
/// Ref: <https://tools.ietf.org/html/rfc4880#section-5.9>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct LiteralData {
    packet_version: Version,
    mode: DataMode,
    file_name: Bytes,
    created: DateTime<Utc>,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',
    Mime = b'm',
}

impl LiteralData {
    /// Parses the packet body.
    pub fn from_buf<B: Buf>(packet_version: Version, mut i: B) -> Result<Self> {
        let mode = i.read_u8()?;
        let mode = DataMode::try_from(mode).map_err(|_| Error::MalformedParams {
            message: format!("invalid literal data mode {mode}"),
        })?;
        let name_len = i.read_u8()?;
        let file_name = i.take_bytes(name_len as usize)?;
        let created = i.read_be_u32()?;
        let created = Utc
            .timestamp_opt(i64::from(created), 0)
            .single()
            .ok_or_else(|| Error::MalformedParams {
                message: "invalid literal data date".to_string(),
            })?;
        let data = i.rest();

        Ok(LiteralData {
            packet_version,
            mode,
            file_name,
            created,
            data,
        })
    }

    /// A binary literal packet around `data`.
    pub fn new(file_name: impl Into<Bytes>, created: DateTime<Utc>, data: impl Into<Bytes>) -> Self {
        LiteralData {
            packet_version: Default::default(),
            mode: DataMode::Binary,
            file_name: file_name.into(),
            created: created.trunc_subsecs(0),
            data: data.into(),
        }
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn file_name(&self) -> &Bytes {
        &self.file_name
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.mode.into())?;
        writer.write_u8(self.file_name.len() as u8)?;
        writer.write_all(&self.file_name)?;
        writer.write_u32::<BigEndian>(self.created.timestamp() as u32)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.file_name.len() + 4 + self.data.len()
    }
}

impl PacketTrait for LiteralData {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::LiteralData
    }
}
