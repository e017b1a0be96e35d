//! CMAF init segment construction.
//!
//! The init tree is authored fresh except for the pieces that must carry
//! over from the source track: the cloned `stsd` (codec configuration),
//! the cloned `hdlr`, and the source track's dimensions and volume.
//! Splicing is clone-based so the source tree stays untouched.

use crate::boxes::{
    BoxBody, FileTypeBox, HdlrBox, Mp4Box, Mp4Root, MvhdBox, StcoBox, StscBox, StsdBox, StszBox,
    SttsBox, TkhdBox, TrexBox,
};
use crate::error::{Error, Result};

fn find_tkhd(trak: &Mp4Box) -> Result<&TkhdBox> {
    match trak.find(b"tkhd").map(|b| &b.body) {
        Some(BoxBody::Tkhd(b)) => Ok(b),
        _ => Err(Error::MissingBox("tkhd")),
    }
}

fn find_hdlr(trak: &Mp4Box) -> Result<&HdlrBox> {
    match trak.find(b"hdlr").map(|b| &b.body) {
        Some(BoxBody::Hdlr(b)) => Ok(b),
        _ => Err(Error::MissingBox("hdlr")),
    }
}

fn find_stsd(trak: &Mp4Box) -> Result<&StsdBox> {
    match trak.find(b"stsd").map(|b| &b.body) {
        Some(BoxBody::Stsd(b)) => Ok(b),
        _ => Err(Error::MissingBox("stsd")),
    }
}

/// Build the `ftyp` + `moov` tree for one track. Sizes are not yet
/// established; the caller runs `calc_size` before writing.
pub(crate) fn build_init_tree(trak: &Mp4Box, timescale: u32) -> Result<Mp4Root> {
    let src_tkhd = find_tkhd(trak)?;
    let src_hdlr = find_hdlr(trak)?;
    let src_stsd = find_stsd(trak)?;

    let ftyp = Mp4Box::new(
        b"ftyp",
        BoxBody::Ftyp(FileTypeBox::new(b"iso5", 512, &[b"iso6", b"mp41"])),
    );

    let mut mvhd = MvhdBox::new(timescale);
    mvhd.next_track_id = 3;

    let mut tkhd = src_tkhd.clone();
    tkhd.flags = 3; // enabled | in_movie
    tkhd.track_id = 1;
    tkhd.duration = 0;

    let mut hdlr = src_hdlr.clone();
    if hdlr.is_audio() {
        hdlr.set_name("SoundHandler");
    } else if hdlr.is_video() {
        hdlr.set_name("VideoHandler");
    }

    let stbl = Mp4Box::container_with(
        b"stbl",
        vec![
            Mp4Box::new(b"stsd", BoxBody::Stsd(src_stsd.clone())),
            Mp4Box::new(b"stts", BoxBody::Stts(SttsBox::new_empty())),
            Mp4Box::new(b"stsc", BoxBody::Stsc(StscBox::new_empty())),
            Mp4Box::new(b"stsz", BoxBody::Stsz(StszBox::new_empty())),
            Mp4Box::new(b"stco", BoxBody::Stco(StcoBox::new_empty())),
        ],
    );

    let minf = Mp4Box::container_with(b"minf", vec![stbl]);
    let mdia = Mp4Box::container_with(
        b"mdia",
        vec![
            Mp4Box::new(
                b"mdhd",
                BoxBody::Mdhd(crate::boxes::MdhdBox::new(timescale)),
            ),
            Mp4Box::new(b"hdlr", BoxBody::Hdlr(hdlr)),
            minf,
        ],
    );
    let out_trak = Mp4Box::container_with(
        b"trak",
        vec![Mp4Box::new(b"tkhd", BoxBody::Tkhd(tkhd)), mdia],
    );

    let mvex = Mp4Box::container_with(
        b"mvex",
        vec![Mp4Box::new(b"trex", BoxBody::Trex(TrexBox::new(1)))],
    );

    let moov = Mp4Box::container_with(
        b"moov",
        vec![Mp4Box::new(b"mvhd", BoxBody::Mvhd(mvhd)), out_trak, mvex],
    );

    let mut root = Mp4Root::new();
    root.push(ftyp);
    root.push(moov);
    Ok(root)
}
