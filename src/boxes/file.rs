//! File-level and opaque boxes: ftyp/styp, free, generic full boxes, and
//! the unknown-box fallbacks used by the registry.

use std::io::{Read, Seek, Write};

use crate::error::{Error, Result};
use crate::io;

use super::FourCc;

/// `ftyp` and `styp`: major brand, minor version, compatible brands.
#[derive(Debug, Clone)]
pub struct FileTypeBox {
    pub major: FourCc,
    pub minor: u32,
    pub compat: Vec<FourCc>,
}

impl FileTypeBox {
    pub fn new(major: &[u8; 4], minor: u32, compat: &[&[u8; 4]]) -> Self {
        Self {
            major: FourCc(*major),
            minor,
            compat: compat.iter().map(|b| FourCc(**b)).collect(),
        }
    }

    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        if body_len < 8 {
            return Err(Error::Truncated("ftyp body"));
        }
        let major = FourCc(io::read_tag(r)?);
        let minor = io::read_u32(r)?;
        let count = (body_len - 8) / 4;
        let mut compat = Vec::with_capacity(count as usize);
        for _ in 0..count {
            compat.push(FourCc(io::read_tag(r)?));
        }
        Ok(Self {
            major,
            minor,
            compat,
        })
    }

    pub(crate) fn body_len(&self) -> u64 {
        8 + 4 * self.compat.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        io::write_bytes(w, self.major.as_bytes())?;
        io::write_u32(w, self.minor)?;
        for brand in &self.compat {
            io::write_bytes(w, brand.as_bytes())?;
        }
        Ok(())
    }
}

/// `free`: padding, body kept verbatim.
#[derive(Debug, Clone)]
pub struct FreeBox {
    pub data: Vec<u8>,
}

impl FreeBox {
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0u8; len],
        }
    }

    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        let mut data = vec![0u8; body_len as usize];
        io::read_exact(r, &mut data, "free body")?;
        Ok(Self { data })
    }

    pub(crate) fn body_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        io::write_bytes(w, &self.data)
    }
}

/// A full box kept opaque: version + flags, body bytes verbatim. Used for
/// authoring boxes the registry has no typed variant for.
#[derive(Debug, Clone)]
pub struct FullBox {
    pub version: u8,
    pub flags: u32,
    pub data: Vec<u8>,
}

impl FullBox {
    pub fn new(version: u8, flags: u32, data: Vec<u8>) -> Self {
        Self {
            version,
            flags,
            data,
        }
    }

    pub(crate) fn body_len(&self) -> u64 {
        4 + self.data.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        io::write_u8(w, self.version)?;
        io::write_u24(w, self.flags)?;
        io::write_bytes(w, &self.data)
    }
}

/// Unrecognized tag, body held in memory and round-tripped byte-for-byte.
#[derive(Debug, Clone)]
pub struct UnknownBox {
    pub data: Vec<u8>,
}

impl UnknownBox {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        let mut data = vec![0u8; body_len as usize];
        io::read_exact(r, &mut data, "unknown box body")?;
        Ok(Self { data })
    }

    pub(crate) fn body_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        io::write_bytes(w, &self.data)
    }
}

/// A box whose body exceeded the read limit: only the source offset and
/// body length are recorded. Serializing it requires the source stream.
#[derive(Debug, Clone)]
pub struct UnknownBoxRef {
    /// Absolute file offset of the body (just past the header).
    pub offset: u64,
    /// Body length in bytes.
    pub body_len: u64,
}

impl UnknownBoxRef {
    pub(crate) fn parse<R: Read + Seek>(r: &mut R, body_len: u64) -> Result<Self> {
        let offset = io::position(r)?;
        r.seek(std::io::SeekFrom::Current(body_len as i64))?;
        Ok(Self { offset, body_len })
    }

    /// Serialized size including the header, which grows to 16 bytes when
    /// the body does not fit a compact 32-bit size.
    pub(crate) fn total_size(&self) -> u64 {
        self.header_len() + self.body_len
    }

    fn header_len(&self) -> u64 {
        if self.body_len + 8 > u32::MAX as u64 {
            16
        } else {
            8
        }
    }

    /// Re-emit header and body, copying the body out of the source.
    pub(crate) fn copy_out<W: Write, R: Read + Seek>(
        &self,
        tag: &FourCc,
        out: &mut W,
        src: &mut R,
    ) -> Result<()> {
        if self.header_len() == 16 {
            io::write_u32(out, 1)?;
            io::write_bytes(out, tag.as_bytes())?;
            io::write_u64(out, 16 + self.body_len)?;
        } else {
            io::write_u32(out, (8 + self.body_len) as u32)?;
            io::write_bytes(out, tag.as_bytes())?;
        }
        io::seek_to(src, self.offset)?;
        let copied = std::io::copy(&mut src.take(self.body_len), out)?;
        if copied != self.body_len {
            return Err(Error::Truncated("referenced box body"));
        }
        Ok(())
    }
}
