//! Sample table boxes: stsc, stsz, stco, stts, ctts, stss.
//!
//! The run-length query algorithms live on the box types themselves;
//! `crate::sample` composes them into per-sample lookups.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::io;

use super::{read_version_flags, write_version_flags};

/// Verify a declared entry count fits the box body.
fn check_table(tag: &str, declared: u32, entry_size: u64, body_len: u64) -> Result<()> {
    // The fixed part is version/flags plus the count field itself.
    let needed = 8 + declared as u64 * entry_size;
    if needed > body_len {
        return Err(Error::malformed(format!(
            "{tag} declares {declared} entries but has only {body_len} body bytes"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// stsc
// ---------------------------------------------------------------------------

/// One `stsc` run: every chunk from `first_chunk` (1-based) up to the next
/// entry's first chunk holds `samples_per_chunk` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// `stsc`: sample-to-chunk mapping.
#[derive(Debug, Clone)]
pub struct StscBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<StscEntry>,
}

impl StscBox {
    /// Empty table, as used in fragmented init segments.
    pub fn new_empty() -> Self {
        Self {
            version: 0,
            flags: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let count = io::read_u32(r)?;
        check_table("stsc", count, 12, body_len)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(StscEntry {
                first_chunk: io::read_u32(r)?,
                samples_per_chunk: io::read_u32(r)?,
                sample_description_index: io::read_u32(r)?,
            });
        }
        Ok(Self {
            version,
            flags,
            entries,
        })
    }

    /// Map a 0-based sample index to a 0-based chunk index by walking the
    /// run-length entries. On a run boundary the entry whose first chunk
    /// is at or below the sample's chunk takes effect.
    pub fn sample_to_chunk(&self, n: u32) -> u32 {
        let mut covered = 0u64; // samples accounted for by completed runs
        let mut chunk = 1u32;
        let mut prev_first = 1u32;
        let mut prev_spc = 1u64;
        for e in &self.entries {
            covered += (e.first_chunk.saturating_sub(prev_first)) as u64 * prev_spc;
            if (n as u64) < covered {
                break;
            }
            let spc = e.samples_per_chunk.max(1) as u64;
            chunk = e.first_chunk + ((n as u64 - covered) / spc) as u32;
            prev_first = e.first_chunk;
            prev_spc = spc;
        }
        chunk - 1
    }

    pub(crate) fn body_len(&self) -> u64 {
        8 + 12 * self.entries.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_u32(w, self.entries.len() as u32)?;
        for e in &self.entries {
            io::write_u32(w, e.first_chunk)?;
            io::write_u32(w, e.samples_per_chunk)?;
            io::write_u32(w, e.sample_description_index)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// stsz
// ---------------------------------------------------------------------------

/// `stsz`: sample sizes, either one constant or one entry per sample.
#[derive(Debug, Clone)]
pub struct StszBox {
    pub version: u8,
    pub flags: u32,
    /// Non-zero means every sample has this size and `sizes` is empty.
    pub constant: u32,
    pub sample_count: u32,
    pub sizes: Vec<u32>,
}

impl StszBox {
    pub fn new_empty() -> Self {
        Self {
            version: 0,
            flags: 0,
            constant: 0,
            sample_count: 0,
            sizes: Vec::new(),
        }
    }

    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let constant = io::read_u32(r)?;
        let sample_count = io::read_u32(r)?;
        let mut sizes = Vec::new();
        if constant == 0 {
            if 12 + sample_count as u64 * 4 > body_len {
                return Err(Error::malformed(format!(
                    "stsz declares {sample_count} samples but has only {body_len} body bytes"
                )));
            }
            sizes.reserve(sample_count as usize);
            for _ in 0..sample_count {
                sizes.push(io::read_u32(r)?);
            }
        }
        Ok(Self {
            version,
            flags,
            constant,
            sample_count,
            sizes,
        })
    }

    /// Size of sample `n` (0-based).
    pub fn size_of(&self, n: u32) -> Result<u32> {
        if n >= self.sample_count {
            return Err(Error::malformed(format!(
                "sample {n} outside stsz coverage of {}",
                self.sample_count
            )));
        }
        if self.constant != 0 {
            Ok(self.constant)
        } else {
            self.sizes
                .get(n as usize)
                .copied()
                .ok_or_else(|| Error::malformed(format!("sample {n} missing from stsz")))
        }
    }

    pub(crate) fn body_len(&self) -> u64 {
        8 + 4 + if self.constant == 0 {
            4 * self.sizes.len() as u64
        } else {
            0
        }
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_u32(w, self.constant)?;
        io::write_u32(w, self.sample_count)?;
        if self.constant == 0 {
            for s in &self.sizes {
                io::write_u32(w, *s)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// stco
// ---------------------------------------------------------------------------

/// `stco`: 32-bit chunk file offsets.
#[derive(Debug, Clone)]
pub struct StcoBox {
    pub version: u8,
    pub flags: u32,
    pub offsets: Vec<u32>,
}

impl StcoBox {
    pub fn new_empty() -> Self {
        Self {
            version: 0,
            flags: 0,
            offsets: Vec::new(),
        }
    }

    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let count = io::read_u32(r)?;
        check_table("stco", count, 4, body_len)?;
        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            offsets.push(io::read_u32(r)?);
        }
        Ok(Self {
            version,
            flags,
            offsets,
        })
    }

    pub fn chunk_count(&self) -> u32 {
        self.offsets.len() as u32
    }

    /// File offset of chunk `c` (0-based).
    pub fn offset(&self, c: u32) -> Result<u64> {
        self.offsets
            .get(c as usize)
            .map(|&o| o as u64)
            .ok_or_else(|| Error::malformed(format!("chunk {c} outside stco coverage")))
    }

    /// Rebase every chunk offset by `delta`, e.g. after boxes before the
    /// `mdat` change size.
    pub fn shift_all(&mut self, delta: i64) {
        for o in &mut self.offsets {
            *o = (*o as i64 + delta) as u32;
        }
    }

    pub(crate) fn body_len(&self) -> u64 {
        8 + 4 * self.offsets.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_u32(w, self.offsets.len() as u32)?;
        for o in &self.offsets {
            io::write_u32(w, *o)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// stts
// ---------------------------------------------------------------------------

/// `stts`: run-length (sample count, decode delta) table.
#[derive(Debug, Clone)]
pub struct SttsBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<(u32, u32)>,
}

impl SttsBox {
    pub fn new_empty() -> Self {
        Self {
            version: 0,
            flags: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let count = io::read_u32(r)?;
        check_table("stts", count, 8, body_len)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push((io::read_u32(r)?, io::read_u32(r)?));
        }
        Ok(Self {
            version,
            flags,
            entries,
        })
    }

    /// Decode timestamp of sample `n`. Indices at or past the table's
    /// coverage yield the total duration, so `sample_to_time(count)` is
    /// the track's end time.
    pub fn sample_to_time(&self, n: u32) -> u64 {
        let mut rem = n as u64;
        let mut t = 0u64;
        for &(count, delta) in &self.entries {
            if rem < count as u64 {
                return t + rem * delta as u64;
            }
            rem -= count as u64;
            t += count as u64 * delta as u64;
        }
        t
    }

    /// Total samples covered by the table.
    pub fn total_samples(&self) -> u64 {
        self.entries.iter().map(|&(c, _)| c as u64).sum()
    }

    pub(crate) fn body_len(&self) -> u64 {
        8 + 8 * self.entries.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_u32(w, self.entries.len() as u32)?;
        for &(count, delta) in &self.entries {
            io::write_u32(w, count)?;
            io::write_u32(w, delta)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ctts
// ---------------------------------------------------------------------------

/// `ctts`: run-length composition offsets. Version 1 offsets are signed;
/// version 0 values are stored through the same signed field bit-for-bit.
#[derive(Debug, Clone)]
pub struct CttsBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<(u32, i32)>,
}

impl CttsBox {
    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let count = io::read_u32(r)?;
        check_table("ctts", count, 8, body_len)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push((io::read_u32(r)?, io::read_u32(r)? as i32));
        }
        Ok(Self {
            version,
            flags,
            entries,
        })
    }

    /// Composition offset of sample `n`; samples past the table's
    /// coverage inherit the last run's offset.
    pub fn sample_to_offset(&self, n: u32) -> i32 {
        let mut covered = 0u64;
        let mut offset = 0i32;
        for &(count, run_offset) in &self.entries {
            offset = run_offset;
            covered += count as u64;
            if (n as u64) < covered {
                break;
            }
        }
        offset
    }

    /// Total samples covered by the table.
    pub fn total_samples(&self) -> u64 {
        self.entries.iter().map(|&(c, _)| c as u64).sum()
    }

    pub(crate) fn body_len(&self) -> u64 {
        8 + 8 * self.entries.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_u32(w, self.entries.len() as u32)?;
        for &(count, offset) in &self.entries {
            io::write_u32(w, count)?;
            io::write_u32(w, offset as u32)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// stss
// ---------------------------------------------------------------------------

/// `stss`: sorted 1-based sync sample numbers. An absent box means every
/// sample is a sync point.
#[derive(Debug, Clone)]
pub struct StssBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<u32>,
}

impl StssBox {
    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let count = io::read_u32(r)?;
        check_table("stss", count, 4, body_len)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(io::read_u32(r)?);
        }
        Ok(Self {
            version,
            flags,
            entries,
        })
    }

    /// Whether the 1-based sample number is listed as a sync sample.
    pub fn contains(&self, sample: u32) -> bool {
        self.entries.binary_search(&sample).is_ok()
    }

    pub(crate) fn body_len(&self) -> u64 {
        8 + 4 * self.entries.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_u32(w, self.entries.len() as u32)?;
        for s in &self.entries {
            io::write_u32(w, *s)?;
        }
        Ok(())
    }
}
