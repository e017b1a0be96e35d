//! Big-endian byte-stream primitives.
//!
//! All multi-byte integers in ISOBMFF are big-endian. Reads past EOF and
//! partial reads surface as [`Error::Truncated`]; nothing is silently
//! truncated.

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

fn read_array<R: Read, const N: usize>(r: &mut R, what: &'static str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    match r.read_exact(&mut buf) {
        Ok(()) => Ok(buf),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::Truncated(what)),
        Err(e) => Err(Error::Io(e)),
    }
}

pub fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    Ok(read_array::<_, 1>(r, "u8")?[0])
}

pub fn read_u16<R: Read>(r: &mut R) -> Result<u16> {
    Ok(u16::from_be_bytes(read_array(r, "u16")?))
}

/// Three bytes packed into the low bits of a u32.
pub fn read_u24<R: Read>(r: &mut R) -> Result<u32> {
    let b = read_array::<_, 3>(r, "u24")?;
    Ok(((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32)
}

pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    Ok(u32::from_be_bytes(read_array(r, "u32")?))
}

pub fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    Ok(u64::from_be_bytes(read_array(r, "u64")?))
}

/// Read an exact 4-byte tag.
pub fn read_tag<R: Read>(r: &mut R) -> Result<[u8; 4]> {
    read_array(r, "tag")
}

/// Fill `buf` completely or fail with `Truncated`.
pub fn read_exact<R: Read>(r: &mut R, buf: &mut [u8], what: &'static str) -> Result<()> {
    match r.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::Truncated(what)),
        Err(e) => Err(Error::Io(e)),
    }
}

pub fn position<S: Seek>(s: &mut S) -> Result<u64> {
    Ok(s.stream_position()?)
}

pub fn seek_to<S: Seek>(s: &mut S, pos: u64) -> Result<u64> {
    Ok(s.seek(SeekFrom::Start(pos))?)
}

pub fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    Ok(w.write_all(&[v])?)
}

pub fn write_u16<W: Write>(w: &mut W, v: u16) -> Result<()> {
    Ok(w.write_all(&v.to_be_bytes())?)
}

pub fn write_u24<W: Write>(w: &mut W, v: u32) -> Result<()> {
    Ok(w.write_all(&[(v >> 16) as u8, (v >> 8) as u8, v as u8])?)
}

pub fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    Ok(w.write_all(&v.to_be_bytes())?)
}

pub fn write_u64<W: Write>(w: &mut W, v: u64) -> Result<()> {
    Ok(w.write_all(&v.to_be_bytes())?)
}

pub fn write_bytes<W: Write>(w: &mut W, v: &[u8]) -> Result<()> {
    Ok(w.write_all(v)?)
}
