//! Per-sample queries over a track's sample tables, and a sequential
//! reader that pulls payload bytes from the source stream.
//!
//! The indexer never materializes a per-sample array; every query is a
//! run-length walk over the parsed tables, so memory stays proportional
//! to the tables themselves.

use std::io::{Read, Seek};

use tracing::trace;

use crate::boxes::{BoxBody, CttsBox, Mp4Box, StcoBox, StscBox, StssBox, StszBox, SttsBox};
use crate::error::{Error, Result};
use crate::io;

/// One decoded sample: timing, sync flag, and payload bytes.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Decode timestamp in `timescale` units.
    pub dts: u64,
    /// Media timescale (ticks per second).
    pub timescale: u32,
    /// Composition offset (CTS - DTS); zero when the track has no ctts.
    pub composition_offset: i32,
    /// Whether the track carries a ctts at all.
    pub has_composition_offset: bool,
    /// Whether this sample is a sync point.
    pub is_sync: bool,
    /// Raw sample bytes copied from the source.
    pub payload: Vec<u8>,
}

/// Sample-table lookups for one `trak`.
///
/// Borrows the parsed boxes; requires `stsc`, `stsz`, `stco`, and `stts`,
/// with `ctts` and `stss` optional.
pub struct SampleIndex<'a> {
    stsc: &'a StscBox,
    stsz: &'a StszBox,
    stco: &'a StcoBox,
    stts: &'a SttsBox,
    ctts: Option<&'a CttsBox>,
    stss: Option<&'a StssBox>,
    timescale: u32,
}

impl<'a> SampleIndex<'a> {
    /// Locate the sample tables under a `trak`.
    pub fn from_trak(trak: &'a Mp4Box) -> Result<Self> {
        let timescale = match trak.find(b"mdhd").map(|b| &b.body) {
            Some(BoxBody::Mdhd(m)) => m.timescale,
            _ => return Err(Error::MissingBox("mdhd")),
        };
        let stsc = match trak.find(b"stsc").map(|b| &b.body) {
            Some(BoxBody::Stsc(b)) => b,
            _ => return Err(Error::MissingBox("stsc")),
        };
        let stsz = match trak.find(b"stsz").map(|b| &b.body) {
            Some(BoxBody::Stsz(b)) => b,
            _ => return Err(Error::MissingBox("stsz")),
        };
        let stco = match trak.find(b"stco").map(|b| &b.body) {
            Some(BoxBody::Stco(b)) => b,
            _ => return Err(Error::MissingBox("stco")),
        };
        let stts = match trak.find(b"stts").map(|b| &b.body) {
            Some(BoxBody::Stts(b)) => b,
            _ => return Err(Error::MissingBox("stts")),
        };
        let ctts = match trak.find(b"ctts").map(|b| &b.body) {
            Some(BoxBody::Ctts(b)) => Some(b),
            _ => None,
        };
        let stss = match trak.find(b"stss").map(|b| &b.body) {
            Some(BoxBody::Stss(b)) => Some(b),
            _ => None,
        };
        Ok(Self {
            stsc,
            stsz,
            stco,
            stts,
            ctts,
            stss,
            timescale,
        })
    }

    /// Number of samples in the track.
    pub fn sample_count(&self) -> u32 {
        self.stsz.sample_count
    }

    /// Media timescale in ticks per second.
    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    /// 0-based chunk holding sample `n`.
    pub fn sample_to_chunk(&self, n: u32) -> Result<u32> {
        if n >= self.sample_count() {
            return Err(Error::malformed(format!(
                "sample {n} outside track of {} samples",
                self.sample_count()
            )));
        }
        let chunk = self.stsc.sample_to_chunk(n);
        if chunk >= self.stco.chunk_count() {
            return Err(Error::malformed(format!(
                "sample {n} maps to chunk {chunk} beyond stco coverage of {}",
                self.stco.chunk_count()
            )));
        }
        Ok(chunk)
    }

    /// Decode timestamp of sample `n`; `n == sample_count` yields the
    /// track's total duration.
    pub fn sample_to_time(&self, n: u32) -> u64 {
        self.stts.sample_to_time(n)
    }

    /// Composition offset of sample `n` (zero without a ctts).
    pub fn sample_to_offset(&self, n: u32) -> i32 {
        self.ctts.map(|c| c.sample_to_offset(n)).unwrap_or(0)
    }

    /// Whether the track carries composition offsets.
    pub fn has_composition_offsets(&self) -> bool {
        self.ctts.is_some()
    }

    /// Whether sample `n` is a sync point. Without an stss every sample
    /// is one.
    pub fn is_sync_point(&self, n: u32) -> bool {
        match self.stss {
            Some(stss) => stss.contains(n + 1),
            None => true,
        }
    }

    /// Size of sample `n` in bytes.
    pub fn sample_size(&self, n: u32) -> Result<u32> {
        self.stsz.size_of(n)
    }

    /// Absolute file offset of sample `n`: the chunk's base offset plus
    /// the sizes of the samples preceding `n` in the same chunk.
    pub fn file_offset(&self, n: u32) -> Result<u64> {
        let chunk = self.sample_to_chunk(n)?;
        Ok(self.stco.offset(chunk)? + self.offset_in_chunk(n, chunk)?)
    }

    fn offset_in_chunk(&self, n: u32, chunk: u32) -> Result<u64> {
        let mut off = 0u64;
        let mut m = n;
        while m > 0 && self.stsc.sample_to_chunk(m - 1) == chunk {
            m -= 1;
            off += self.stsz.size_of(m)? as u64;
        }
        Ok(off)
    }
}

/// Sequential sample reader: yields [`Sample`] records in track order,
/// keeping a running within-chunk offset so consecutive reads are cheap.
pub struct SampleReader<'a> {
    index: SampleIndex<'a>,
    pos: u32,
    current_chunk: Option<u32>,
    offset_in_chunk: u64,
}

impl<'a> SampleReader<'a> {
    pub fn new(index: SampleIndex<'a>) -> Self {
        Self {
            index,
            pos: 0,
            current_chunk: None,
            offset_in_chunk: 0,
        }
    }

    /// Locate the sample tables under a `trak` and start at sample 0.
    pub fn from_trak(trak: &'a Mp4Box) -> Result<Self> {
        Ok(Self::new(SampleIndex::from_trak(trak)?))
    }

    pub fn index(&self) -> &SampleIndex<'a> {
        &self.index
    }

    /// Next sample to be read.
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Whether every sample has been read.
    pub fn is_eos(&self) -> bool {
        self.pos >= self.index.sample_count()
    }

    /// Reposition to sample `s`, recomputing the within-chunk offset from
    /// scratch. `s == sample_count` positions the reader at end of
    /// stream.
    pub fn seek(&mut self, s: u32) -> Result<()> {
        if s > self.index.sample_count() {
            return Err(Error::malformed(format!(
                "seek to sample {s} outside track of {} samples",
                self.index.sample_count()
            )));
        }
        trace!(sample = s, "sample reader seek");
        self.pos = s;
        if s == self.index.sample_count() {
            self.current_chunk = None;
            self.offset_in_chunk = 0;
            return Ok(());
        }
        let chunk = self.index.sample_to_chunk(s)?;
        self.current_chunk = Some(chunk);
        self.offset_in_chunk = self.index.offset_in_chunk(s, chunk)?;
        Ok(())
    }

    /// Read the sample at the current position and advance. Reading past
    /// the last sample is a truncation error.
    pub fn read<R: Read + Seek>(&mut self, input: &mut R) -> Result<Sample> {
        if self.is_eos() {
            return Err(Error::Truncated("sample stream"));
        }
        let n = self.pos;
        let chunk = self.index.sample_to_chunk(n)?;
        if self.current_chunk != Some(chunk) {
            self.current_chunk = Some(chunk);
            self.offset_in_chunk = 0;
        }
        let size = self.index.sample_size(n)?;
        let file_offset = self.index.stco.offset(chunk)? + self.offset_in_chunk;

        let mut payload = vec![0u8; size as usize];
        io::seek_to(input, file_offset)?;
        io::read_exact(input, &mut payload, "sample payload")?;

        let sample = Sample {
            dts: self.index.sample_to_time(n),
            timescale: self.index.timescale(),
            composition_offset: self.index.sample_to_offset(n),
            has_composition_offset: self.index.has_composition_offsets(),
            is_sync: self.index.is_sync_point(n),
            payload,
        };

        self.offset_in_chunk += size as u64;
        self.pos += 1;
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{Mp4Box, StscEntry};
    use std::io::Cursor;

    /// Two chunks: samples 0-1 at offset 100, samples 2-4 at offset 1000.
    fn test_trak() -> Mp4Box {
        let stbl = Mp4Box::container_with(
            b"stbl",
            vec![
                Mp4Box::new(
                    b"stsc",
                    BoxBody::Stsc(StscBox {
                        version: 0,
                        flags: 0,
                        entries: vec![
                            StscEntry {
                                first_chunk: 1,
                                samples_per_chunk: 2,
                                sample_description_index: 1,
                            },
                            StscEntry {
                                first_chunk: 2,
                                samples_per_chunk: 3,
                                sample_description_index: 1,
                            },
                        ],
                    }),
                ),
                Mp4Box::new(
                    b"stsz",
                    BoxBody::Stsz(StszBox {
                        version: 0,
                        flags: 0,
                        constant: 0,
                        sample_count: 5,
                        sizes: vec![10, 20, 30, 40, 50],
                    }),
                ),
                Mp4Box::new(
                    b"stco",
                    BoxBody::Stco(StcoBox {
                        version: 0,
                        flags: 0,
                        offsets: vec![100, 1000],
                    }),
                ),
                Mp4Box::new(
                    b"stts",
                    BoxBody::Stts(SttsBox {
                        version: 0,
                        flags: 0,
                        entries: vec![(5, 100)],
                    }),
                ),
                Mp4Box::new(
                    b"ctts",
                    BoxBody::Ctts(CttsBox {
                        version: 1,
                        flags: 0,
                        entries: vec![(2, 10), (3, 0)],
                    }),
                ),
                Mp4Box::new(
                    b"stss",
                    BoxBody::Stss(StssBox {
                        version: 0,
                        flags: 0,
                        entries: vec![1, 3],
                    }),
                ),
            ],
        );
        let mdhd = Mp4Box::new(b"mdhd", BoxBody::Mdhd(crate::boxes::MdhdBox::new(1000)));
        let minf = Mp4Box::container_with(b"minf", vec![stbl]);
        let mdia = Mp4Box::container_with(b"mdia", vec![mdhd, minf]);
        Mp4Box::container_with(b"trak", vec![mdia])
    }

    fn test_input() -> Cursor<Vec<u8>> {
        let mut data = vec![0u8; 2048];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        Cursor::new(data)
    }

    #[test]
    fn test_missing_table_is_reported() {
        let trak = Mp4Box::container_with(
            b"trak",
            vec![Mp4Box::new(
                b"mdhd",
                BoxBody::Mdhd(crate::boxes::MdhdBox::new(1000)),
            )],
        );
        assert!(matches!(
            SampleIndex::from_trak(&trak),
            Err(Error::MissingBox("stsc"))
        ));
    }

    #[test]
    fn test_file_offsets_across_chunks() {
        let trak = test_trak();
        let index = SampleIndex::from_trak(&trak).unwrap();
        assert_eq!(index.sample_count(), 5);
        assert_eq!(index.file_offset(0).unwrap(), 100);
        assert_eq!(index.file_offset(1).unwrap(), 110);
        assert_eq!(index.file_offset(2).unwrap(), 1000);
        assert_eq!(index.file_offset(3).unwrap(), 1030);
        assert_eq!(index.file_offset(4).unwrap(), 1070);
    }

    #[test]
    fn test_offset_plus_size_stays_within_chunk() {
        let trak = test_trak();
        let index = SampleIndex::from_trak(&trak).unwrap();
        for n in 0..index.sample_count() - 1 {
            let same_chunk =
                index.sample_to_chunk(n).unwrap() == index.sample_to_chunk(n + 1).unwrap();
            if same_chunk {
                assert!(
                    index.file_offset(n).unwrap() + index.sample_size(n).unwrap() as u64
                        <= index.file_offset(n + 1).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_query_outside_coverage() {
        let trak = test_trak();
        let index = SampleIndex::from_trak(&trak).unwrap();
        assert!(matches!(
            index.sample_to_chunk(5),
            Err(Error::MalformedTable(_))
        ));
        assert!(index.sample_size(5).is_err());
    }

    #[test]
    fn test_sync_points() {
        let trak = test_trak();
        let index = SampleIndex::from_trak(&trak).unwrap();
        assert!(index.is_sync_point(0));
        assert!(!index.is_sync_point(1));
        assert!(index.is_sync_point(2));
        assert!(!index.is_sync_point(4));
    }

    #[test]
    fn test_sequential_read() {
        let trak = test_trak();
        let mut reader = SampleReader::from_trak(&trak).unwrap();
        let mut input = test_input();

        let s0 = reader.read(&mut input).unwrap();
        assert_eq!(s0.dts, 0);
        assert_eq!(s0.payload.len(), 10);
        assert_eq!(s0.payload[0], 100); // byte at file offset 100
        assert_eq!(s0.composition_offset, 10);
        assert!(s0.has_composition_offset);
        assert!(s0.is_sync);

        let s1 = reader.read(&mut input).unwrap();
        assert_eq!(s1.dts, 100);
        assert_eq!(s1.payload[0], 110);
        assert!(!s1.is_sync);

        // Chunk boundary: next payload starts at offset 1000.
        let s2 = reader.read(&mut input).unwrap();
        assert_eq!(s2.dts, 200);
        assert_eq!(s2.payload[0], (1000u32 % 256) as u8);
        assert_eq!(s2.composition_offset, 0);

        reader.read(&mut input).unwrap();
        reader.read(&mut input).unwrap();
        assert!(reader.is_eos());
        assert!(matches!(reader.read(&mut input), Err(Error::Truncated(_))));
    }

    #[test]
    fn test_seek_recomputes_chunk_offset() {
        let trak = test_trak();
        let mut reader = SampleReader::from_trak(&trak).unwrap();
        let mut input = test_input();

        reader.seek(3).unwrap();
        let s3 = reader.read(&mut input).unwrap();
        assert_eq!(s3.dts, 300);
        assert_eq!(s3.payload.len(), 40);
        assert_eq!(s3.payload[0], (1030u32 % 256) as u8);

        // Sequential continuation after a seek stays consistent.
        let s4 = reader.read(&mut input).unwrap();
        assert_eq!(s4.dts, 400);
        assert_eq!(s4.payload[0], (1070u32 % 256) as u8);

        assert!(reader.seek(6).is_err());
        reader.seek(5).unwrap();
        assert!(reader.is_eos());
    }
}
