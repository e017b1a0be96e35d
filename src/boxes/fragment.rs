//! Fragmented-MP4 boxes: sidx, mfhd, tfhd, tfdt, trun, trex, pssh.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::io;

use super::{read_version_flags, write_version_flags};

/// Sample flags marking a non-sync sample in `trun`/`tfhd`.
pub const SAMPLE_FLAGS_NO_SYNC: u32 = 0x0101_0000;
/// Sample flags marking a sync sample in `trun`/`tfhd`.
pub const SAMPLE_FLAGS_SYNC: u32 = 0x0200_0000;

// ---------------------------------------------------------------------------
// sidx
// ---------------------------------------------------------------------------

/// One `sidx` reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidxReference {
    /// Referenced size in bytes (top bit: reference type).
    pub reference: u32,
    /// Subsegment duration in `timescale` units.
    pub duration: u32,
    /// SAP flags; the top bit marks SAP-at-start.
    pub sap_flags: u32,
}

impl SidxReference {
    pub fn starts_with_sap(&self) -> bool {
        self.sap_flags & 0x8000_0000 != 0
    }
}

/// `sidx`: segment index. Written as version 1 (64-bit times) with the
/// standard reserved/reference_count pair before the references.
#[derive(Debug, Clone)]
pub struct SidxBox {
    pub version: u8,
    pub flags: u32,
    pub reference_id: u32,
    pub timescale: u32,
    pub earliest_pts: u64,
    pub first_offset: u64,
    pub references: Vec<SidxReference>,
}

impl SidxBox {
    pub fn new(reference_id: u32, timescale: u32) -> Self {
        Self {
            version: 1,
            flags: 0,
            reference_id,
            timescale,
            earliest_pts: 0,
            first_offset: 0,
            references: Vec::new(),
        }
    }

    /// Append a reference entry.
    pub fn add(&mut self, reference: u32, duration: u32, sap_flags: u32) {
        self.references.push(SidxReference {
            reference,
            duration,
            sap_flags,
        });
    }

    pub(crate) fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let reference_id = io::read_u32(r)?;
        let timescale = io::read_u32(r)?;
        let (earliest_pts, first_offset) = match version {
            0 => (io::read_u32(r)? as u64, io::read_u32(r)? as u64),
            1 => (io::read_u64(r)?, io::read_u64(r)?),
            v => {
                return Err(Error::UnsupportedVersion {
                    box_type: "sidx".into(),
                    version: v,
                })
            }
        };
        io::read_u16(r)?; // reserved
        let count = io::read_u16(r)?;
        let mut references = Vec::with_capacity(count as usize);
        for _ in 0..count {
            references.push(SidxReference {
                reference: io::read_u32(r)?,
                duration: io::read_u32(r)?,
                sap_flags: io::read_u32(r)?,
            });
        }
        Ok(Self {
            version,
            flags,
            reference_id,
            timescale,
            earliest_pts,
            first_offset,
            references,
        })
    }

    pub(crate) fn body_len(&self) -> u64 {
        // 40 + 12 * count total for version 1.
        let times = if self.version == 1 { 16 } else { 8 };
        4 + 8 + times + 4 + 12 * self.references.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_u32(w, self.reference_id)?;
        io::write_u32(w, self.timescale)?;
        if self.version == 1 {
            io::write_u64(w, self.earliest_pts)?;
            io::write_u64(w, self.first_offset)?;
        } else {
            io::write_u32(w, self.earliest_pts as u32)?;
            io::write_u32(w, self.first_offset as u32)?;
        }
        io::write_u16(w, 0)?;
        io::write_u16(w, self.references.len() as u16)?;
        for e in &self.references {
            io::write_u32(w, e.reference)?;
            io::write_u32(w, e.duration)?;
            io::write_u32(w, e.sap_flags)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// mfhd
// ---------------------------------------------------------------------------

/// `mfhd`: movie fragment header holding the 1-based sequence number.
#[derive(Debug, Clone)]
pub struct MfhdBox {
    pub version: u8,
    pub flags: u32,
    pub sequence: u32,
}

impl MfhdBox {
    pub fn new(sequence: u32) -> Self {
        Self {
            version: 0,
            flags: 0,
            sequence,
        }
    }

    pub(crate) fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let sequence = io::read_u32(r)?;
        Ok(Self {
            version,
            flags,
            sequence,
        })
    }

    pub(crate) fn body_len(&self) -> u64 {
        8
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_u32(w, self.sequence)
    }
}

// ---------------------------------------------------------------------------
// tfhd
// ---------------------------------------------------------------------------

/// `tfhd`: track fragment header. Optional fields are present exactly when
/// the matching flag bit is set; parse and write are symmetric.
#[derive(Debug, Clone, Default)]
pub struct TfhdBox {
    pub version: u8,
    /// Non-field flag bits (`DURATION_IS_EMPTY`, `DEFAULT_BASE_IS_MOOF`);
    /// field-presence bits are derived from the optional fields below.
    pub flags: u32,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}

impl TfhdBox {
    pub const FLAG_BASE_DATA_OFFSET: u32 = 0x01;
    pub const FLAG_SAMPLE_DESCRIPTION_INDEX: u32 = 0x02;
    pub const FLAG_DEFAULT_DURATION: u32 = 0x08;
    pub const FLAG_DEFAULT_SIZE: u32 = 0x10;
    pub const FLAG_DEFAULT_FLAGS: u32 = 0x20;
    pub const FLAG_DURATION_IS_EMPTY: u32 = 0x01_0000;
    pub const FLAG_DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

    pub fn new(track_id: u32) -> Self {
        Self {
            track_id,
            ..Self::default()
        }
    }

    /// Flags as serialized: stored non-field bits plus presence bits.
    pub fn effective_flags(&self) -> u32 {
        let mut f = self.flags
            & (Self::FLAG_DURATION_IS_EMPTY | Self::FLAG_DEFAULT_BASE_IS_MOOF);
        if self.base_data_offset.is_some() {
            f |= Self::FLAG_BASE_DATA_OFFSET;
        }
        if self.sample_description_index.is_some() {
            f |= Self::FLAG_SAMPLE_DESCRIPTION_INDEX;
        }
        if self.default_sample_duration.is_some() {
            f |= Self::FLAG_DEFAULT_DURATION;
        }
        if self.default_sample_size.is_some() {
            f |= Self::FLAG_DEFAULT_SIZE;
        }
        if self.default_sample_flags.is_some() {
            f |= Self::FLAG_DEFAULT_FLAGS;
        }
        f
    }

    pub(crate) fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let track_id = io::read_u32(r)?;
        let base_data_offset = if flags & Self::FLAG_BASE_DATA_OFFSET != 0 {
            Some(io::read_u64(r)?)
        } else {
            None
        };
        let sample_description_index = if flags & Self::FLAG_SAMPLE_DESCRIPTION_INDEX != 0 {
            Some(io::read_u32(r)?)
        } else {
            None
        };
        let default_sample_duration = if flags & Self::FLAG_DEFAULT_DURATION != 0 {
            Some(io::read_u32(r)?)
        } else {
            None
        };
        let default_sample_size = if flags & Self::FLAG_DEFAULT_SIZE != 0 {
            Some(io::read_u32(r)?)
        } else {
            None
        };
        let default_sample_flags = if flags & Self::FLAG_DEFAULT_FLAGS != 0 {
            Some(io::read_u32(r)?)
        } else {
            None
        };
        Ok(Self {
            version,
            flags,
            track_id,
            base_data_offset,
            sample_description_index,
            default_sample_duration,
            default_sample_size,
            default_sample_flags,
        })
    }

    pub(crate) fn body_len(&self) -> u64 {
        let mut len = 4 + 4;
        if self.base_data_offset.is_some() {
            len += 8;
        }
        for present in [
            self.sample_description_index.is_some(),
            self.default_sample_duration.is_some(),
            self.default_sample_size.is_some(),
            self.default_sample_flags.is_some(),
        ] {
            if present {
                len += 4;
            }
        }
        len
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.effective_flags())?;
        io::write_u32(w, self.track_id)?;
        if let Some(v) = self.base_data_offset {
            io::write_u64(w, v)?;
        }
        if let Some(v) = self.sample_description_index {
            io::write_u32(w, v)?;
        }
        if let Some(v) = self.default_sample_duration {
            io::write_u32(w, v)?;
        }
        if let Some(v) = self.default_sample_size {
            io::write_u32(w, v)?;
        }
        if let Some(v) = self.default_sample_flags {
            io::write_u32(w, v)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// tfdt
// ---------------------------------------------------------------------------

/// `tfdt`: track fragment base decode time. Always written as version 1
/// (64-bit); version 0 is accepted on parse.
#[derive(Debug, Clone)]
pub struct TfdtBox {
    pub base_media_decode_time: u64,
}

impl TfdtBox {
    pub fn new(base_media_decode_time: u64) -> Self {
        Self {
            base_media_decode_time,
        }
    }

    pub(crate) fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let (version, _flags) = read_version_flags(r)?;
        let base_media_decode_time = match version {
            0 => io::read_u32(r)? as u64,
            1 => io::read_u64(r)?,
            v => {
                return Err(Error::UnsupportedVersion {
                    box_type: "tfdt".into(),
                    version: v,
                })
            }
        };
        Ok(Self {
            base_media_decode_time,
        })
    }

    pub(crate) fn body_len(&self) -> u64 {
        12
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, 1, 0)?;
        io::write_u64(w, self.base_media_decode_time)
    }
}

// ---------------------------------------------------------------------------
// trun
// ---------------------------------------------------------------------------

/// `trun`: track run. Per-sample rows hold exactly the u32 fields selected
/// by the flags, flattened in wire order (duration, size, flags,
/// composition offset).
#[derive(Debug, Clone)]
pub struct TrunBox {
    pub version: u8,
    pub flags: u32,
    pub sample_count: u32,
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    /// `sample_count * field_count()` values.
    pub rows: Vec<u32>,
}

impl TrunBox {
    pub const FLAG_DATA_OFFSET: u32 = 0x01;
    pub const FLAG_FIRST_SAMPLE_FLAGS: u32 = 0x04;
    pub const FLAG_SAMPLE_DURATION: u32 = 0x0100;
    pub const FLAG_SAMPLE_SIZE: u32 = 0x0200;
    pub const FLAG_SAMPLE_FLAGS: u32 = 0x0400;
    pub const FLAG_SAMPLE_CTS: u32 = 0x0800;

    /// Empty run with the given per-sample field selection.
    pub fn new(flags: u32) -> Self {
        Self {
            version: 0,
            flags,
            sample_count: 0,
            data_offset: None,
            first_sample_flags: None,
            rows: Vec::new(),
        }
    }

    /// Number of u32 fields per sample row.
    pub fn field_count(&self) -> u32 {
        [
            Self::FLAG_SAMPLE_DURATION,
            Self::FLAG_SAMPLE_SIZE,
            Self::FLAG_SAMPLE_FLAGS,
            Self::FLAG_SAMPLE_CTS,
        ]
        .iter()
        .filter(|&&f| self.flags & f != 0)
        .count() as u32
    }

    /// Append one sample row; `values` must carry exactly the selected
    /// fields in wire order.
    pub fn push_row(&mut self, values: &[u32]) {
        debug_assert_eq!(values.len() as u32, self.field_count());
        self.rows.extend_from_slice(values);
        self.sample_count += 1;
    }

    pub(crate) fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        let sample_count = io::read_u32(r)?;
        let data_offset = if flags & Self::FLAG_DATA_OFFSET != 0 {
            Some(io::read_u32(r)? as i32)
        } else {
            None
        };
        let first_sample_flags = if flags & Self::FLAG_FIRST_SAMPLE_FLAGS != 0 {
            Some(io::read_u32(r)?)
        } else {
            None
        };
        let mut trun = Self {
            version,
            flags,
            sample_count,
            data_offset,
            first_sample_flags,
            rows: Vec::new(),
        };
        let n = sample_count as u64 * trun.field_count() as u64;
        trun.rows.reserve(n as usize);
        for _ in 0..n {
            trun.rows.push(io::read_u32(r)?);
        }
        Ok(trun)
    }

    /// Flags as serialized: field selection plus presence bits for the
    /// optional header fields.
    fn effective_flags(&self) -> u32 {
        let mut f = self.flags
            & (Self::FLAG_SAMPLE_DURATION
                | Self::FLAG_SAMPLE_SIZE
                | Self::FLAG_SAMPLE_FLAGS
                | Self::FLAG_SAMPLE_CTS);
        if self.data_offset.is_some() {
            f |= Self::FLAG_DATA_OFFSET;
        }
        if self.first_sample_flags.is_some() {
            f |= Self::FLAG_FIRST_SAMPLE_FLAGS;
        }
        f
    }

    pub(crate) fn body_len(&self) -> u64 {
        let mut len = 4 + 4;
        if self.data_offset.is_some() {
            len += 4;
        }
        if self.first_sample_flags.is_some() {
            len += 4;
        }
        len + 4 * self.rows.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.effective_flags())?;
        io::write_u32(w, self.sample_count)?;
        if let Some(v) = self.data_offset {
            io::write_u32(w, v as u32)?;
        }
        if let Some(v) = self.first_sample_flags {
            io::write_u32(w, v)?;
        }
        for v in &self.rows {
            io::write_u32(w, *v)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// trex
// ---------------------------------------------------------------------------

/// `trex`: per-track fragment defaults inside `mvex`.
#[derive(Debug, Clone)]
pub struct TrexBox {
    pub version: u8,
    pub flags: u32,
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

impl TrexBox {
    pub fn new(track_id: u32) -> Self {
        Self {
            version: 0,
            flags: 0,
            track_id,
            default_sample_description_index: 1,
            default_sample_duration: 0,
            default_sample_size: 0,
            default_sample_flags: 0,
        }
    }

    pub(crate) fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let (version, flags) = read_version_flags(r)?;
        Ok(Self {
            version,
            flags,
            track_id: io::read_u32(r)?,
            default_sample_description_index: io::read_u32(r)?,
            default_sample_duration: io::read_u32(r)?,
            default_sample_size: io::read_u32(r)?,
            default_sample_flags: io::read_u32(r)?,
        })
    }

    pub(crate) fn body_len(&self) -> u64 {
        24
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_u32(w, self.track_id)?;
        io::write_u32(w, self.default_sample_description_index)?;
        io::write_u32(w, self.default_sample_duration)?;
        io::write_u32(w, self.default_sample_size)?;
        io::write_u32(w, self.default_sample_flags)
    }
}

// ---------------------------------------------------------------------------
// pssh
// ---------------------------------------------------------------------------

/// `pssh`: protection system header. Parsed structurally only; no
/// cryptographic interpretation. Trailing payload bytes are kept so the
/// box round-trips.
#[derive(Debug, Clone)]
pub struct PsshBox {
    pub version: u8,
    pub flags: u32,
    pub system_id: [u8; 16],
    pub kids: Vec<[u8; 16]>,
    pub data: Vec<u8>,
}

impl PsshBox {
    pub(crate) fn parse<R: Read>(r: &mut R, body_len: u64) -> Result<Self> {
        if body_len < 24 {
            return Err(Error::Truncated("pssh body"));
        }
        let (version, flags) = read_version_flags(r)?;
        let mut system_id = [0u8; 16];
        io::read_exact(r, &mut system_id, "pssh system id")?;
        let kid_count = io::read_u32(r)?;
        let remaining = body_len - 24;
        if kid_count as u64 * 16 > remaining {
            return Err(Error::malformed(format!(
                "pssh declares {kid_count} key ids but has only {remaining} bytes left"
            )));
        }
        let mut kids = Vec::with_capacity(kid_count as usize);
        for _ in 0..kid_count {
            let mut kid = [0u8; 16];
            io::read_exact(r, &mut kid, "pssh key id")?;
            kids.push(kid);
        }
        let mut data = vec![0u8; (remaining - kid_count as u64 * 16) as usize];
        io::read_exact(r, &mut data, "pssh data")?;
        Ok(Self {
            version,
            flags,
            system_id,
            kids,
            data,
        })
    }

    pub(crate) fn body_len(&self) -> u64 {
        4 + 16 + 4 + 16 * self.kids.len() as u64 + self.data.len() as u64
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        write_version_flags(w, self.version, self.flags)?;
        io::write_bytes(w, &self.system_id)?;
        io::write_u32(w, self.kids.len() as u32)?;
        for kid in &self.kids {
            io::write_bytes(w, kid)?;
        }
        io::write_bytes(w, &self.data)
    }
}
