//! The fragment loop: cut sync-aligned runs of samples and emit
//! `styp`/`sidx`/`moof`/`mdat` segments.

use std::io::{Read, Seek};

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::boxes::{
    BoxBody, FileTypeBox, MfhdBox, Mp4Box, SidxBox, TfdtBox, TfhdBox, TrunBox, UnknownBox,
    SAMPLE_FLAGS_NO_SYNC, SAMPLE_FLAGS_SYNC,
};
use crate::error::{Error, Result};
use crate::sample::SampleReader;

use super::{init, DashConfig};

/// One emitted media segment.
#[derive(Debug, Clone)]
pub struct MediaSegment {
    /// 1-based fragment number.
    pub number: u32,
    /// Samples carried by this fragment.
    pub sample_count: u32,
    /// Fragment duration in the output timescale.
    pub duration: u64,
    /// Serialized `styp` + `sidx` + `moof` + `mdat`.
    pub data: Vec<u8>,
}

/// Segments one track of a parsed MP4 into DASH media segments.
///
/// Fragments close at the first sync sample past the target duration, so
/// every fragment after the first opens on a sync point and players can
/// join at any segment boundary.
pub struct DashSegmenter<'a> {
    trak: &'a Mp4Box,
    reader: SampleReader<'a>,
    media_timescale: u32,
    timescale: u32,
    /// Target fragment duration in media-timescale ticks.
    seg_duration: u64,
    fragment: u32,
    prev_default_duration: u32,
}

impl<'a> DashSegmenter<'a> {
    pub fn new(trak: &'a Mp4Box, config: &DashConfig) -> Result<Self> {
        let reader = SampleReader::from_trak(trak)?;
        let media_timescale = reader.index().timescale();
        if media_timescale == 0 {
            return Err(Error::malformed("track timescale is zero"));
        }
        let timescale = if config.timescale == 0 {
            media_timescale
        } else {
            config.timescale
        };
        Ok(Self {
            trak,
            reader,
            media_timescale,
            timescale,
            seg_duration: config.segment_seconds as u64 * media_timescale as u64,
            fragment: 1,
            prev_default_duration: 0,
        })
    }

    /// Output timescale (the media timescale unless overridden).
    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    /// Serialize the `ftyp` + `moov` init segment for this track.
    pub fn init_segment(&self) -> Result<Vec<u8>> {
        let mut tree = init::build_init_tree(self.trak, self.timescale)?;
        tree.calc_size();
        let mut out = Vec::new();
        tree.write_to(&mut out)?;
        Ok(out)
    }

    fn scale(&self, t: u64) -> u64 {
        if self.timescale == self.media_timescale {
            t
        } else {
            t * self.timescale as u64 / self.media_timescale as u64
        }
    }

    fn scale_offset(&self, v: i32) -> i32 {
        if self.timescale == self.media_timescale {
            v
        } else {
            (v as i64 * self.timescale as i64 / self.media_timescale as i64) as i32
        }
    }

    /// Cut and serialize the next fragment, copying sample payloads out
    /// of `input`. Returns `None` once every sample has been emitted.
    pub fn next_segment<R: Read + Seek>(&mut self, input: &mut R) -> Result<Option<MediaSegment>> {
        if self.reader.is_eos() {
            return Ok(None);
        }

        let number = self.fragment;
        let index = self.reader.index();
        let first_dts = index.sample_to_time(self.reader.position());

        let mut trun = TrunBox::new(
            TrunBox::FLAG_SAMPLE_SIZE | TrunBox::FLAG_SAMPLE_FLAGS | TrunBox::FLAG_SAMPLE_CTS,
        );
        trun.data_offset = Some(0); // patched after moof sizes settle
        let mut payload = BytesMut::new();
        let mut first_sample_size = 0u32;

        // A fragment closes when the next candidate is a sync point past
        // the target boundary; the last fragment closes on EOS.
        loop {
            if self.reader.is_eos() {
                break;
            }
            let candidate = self.reader.position();
            let dts = self.reader.index().sample_to_time(candidate);
            if trun.sample_count > 0
                && self.reader.index().is_sync_point(candidate)
                && dts > self.seg_duration * number as u64
            {
                break;
            }
            let sample = self.reader.read(input)?;
            if trun.sample_count == 0 {
                first_sample_size = sample.payload.len() as u32;
            }
            let flags = if sample.is_sync {
                SAMPLE_FLAGS_SYNC
            } else {
                SAMPLE_FLAGS_NO_SYNC
            };
            trun.push_row(&[
                sample.payload.len() as u32,
                flags,
                self.scale_offset(sample.composition_offset) as u32,
            ]);
            payload.put_slice(&sample.payload);
        }

        let sample_count = trun.sample_count;
        let end_pos = self.reader.position();
        let index = self.reader.index();
        let last_dts = index.sample_to_time(end_pos - 1);
        let end_dts = index.sample_to_time(end_pos);
        let duration = self.scale(end_dts) - self.scale(first_dts);

        // Per-fragment duration estimate; a single-sample fragment keeps
        // the previous fragment's value.
        let default_duration = if sample_count > 1 {
            ((self.scale(last_dts) - self.scale(first_dts)) / (sample_count as u64 - 1)) as u32
        } else {
            self.prev_default_duration
        };
        self.prev_default_duration = default_duration;

        let mut styp = Mp4Box::new(
            b"styp",
            BoxBody::Styp(FileTypeBox::new(b"msdh", 0, &[b"msdh", b"msix"])),
        );

        let mut tfhd = TfhdBox::new(1);
        tfhd.flags = TfhdBox::FLAG_DEFAULT_BASE_IS_MOOF;
        tfhd.default_sample_duration = Some(default_duration);
        tfhd.default_sample_size = Some(first_sample_size);
        tfhd.default_sample_flags = Some(SAMPLE_FLAGS_NO_SYNC);

        let traf = Mp4Box::container_with(
            b"traf",
            vec![
                Mp4Box::new(b"tfhd", BoxBody::Tfhd(tfhd)),
                Mp4Box::new(
                    b"tfdt",
                    BoxBody::Tfdt(TfdtBox::new(self.scale(first_dts))),
                ),
                Mp4Box::new(b"trun", BoxBody::Trun(trun)),
            ],
        );
        let mut moof = Mp4Box::container_with(
            b"moof",
            vec![Mp4Box::new(b"mfhd", BoxBody::Mfhd(MfhdBox::new(number))), traf],
        );
        let mut mdat = Mp4Box::new(b"mdat", BoxBody::Unknown(UnknownBox::new(payload.to_vec())));

        let moof_size = moof.calc_size();
        let mdat_size = mdat.calc_size();

        // First payload byte sits just past the mdat header, relative to
        // the start of moof.
        if let Some(b) = moof.find_mut(b"trun") {
            if let BoxBody::Trun(trun) = &mut b.body {
                trun.data_offset = Some((moof_size + 8) as i32);
            }
        }

        let mut sidx_body = SidxBox::new(1, self.timescale);
        sidx_body.earliest_pts = self.scale(first_dts);
        sidx_body.add((moof_size + mdat_size) as u32, duration as u32, 1 << 31);
        let mut sidx = Mp4Box::new(b"sidx", BoxBody::Sidx(sidx_body));

        styp.calc_size();
        sidx.calc_size();

        let mut data = Vec::with_capacity((styp.size + sidx.size + moof_size + mdat_size) as usize);
        styp.write_to(&mut data)?;
        sidx.write_to(&mut data)?;
        moof.write_to(&mut data)?;
        mdat.write_to(&mut data)?;

        debug!(
            fragment = number,
            samples = sample_count,
            duration,
            bytes = data.len(),
            "closed fragment"
        );

        self.fragment += 1;
        Ok(Some(MediaSegment {
            number,
            sample_count,
            duration,
            data,
        }))
    }
}
