//! Shared helpers for integration tests: authoring small synthetic MP4s.

use isoforge::boxes::{
    FileTypeBox, HdlrBox, MdhdBox, MvhdBox, StcoBox, StscBox, StscEntry, StsdBox, StssBox,
    StszBox, SttsBox, TkhdBox, UnknownBox, IDENTITY_MATRIX,
};
use isoforge::{BoxBody, Mp4Box, Mp4Root};

/// Author a single-track MP4 with one chunk, uniform 1000-tick sample
/// deltas at a 1000 Hz timescale, and sync samples at 1, 4, 7 (1-based).
/// Sample `i`'s payload is `sample_sizes[i]` bytes of `0x40 + i`.
pub fn build_synthetic_mp4(handler: &[u8; 4], sample_sizes: &[u32]) -> Vec<u8> {
    let total: usize = sample_sizes.iter().map(|&s| s as usize).sum();
    let mut payload = Vec::with_capacity(total);
    for (i, &size) in sample_sizes.iter().enumerate() {
        payload.extend(std::iter::repeat(0x40 + i as u8).take(size as usize));
    }

    let stsd = StsdBox {
        version: 0,
        flags: 0,
        entry_count: 1,
        entries: {
            let mut e = Vec::new();
            e.extend_from_slice(&16u32.to_be_bytes());
            e.extend_from_slice(if handler == b"soun" { b"mp4a" } else { b"avc1" });
            e.extend_from_slice(b"confbyte");
            e
        },
    };

    let stbl = Mp4Box::container_with(
        b"stbl",
        vec![
            Mp4Box::new(b"stsd", BoxBody::Stsd(stsd)),
            Mp4Box::new(
                b"stts",
                BoxBody::Stts(SttsBox {
                    version: 0,
                    flags: 0,
                    entries: vec![(sample_sizes.len() as u32, 1000)],
                }),
            ),
            Mp4Box::new(
                b"stsc",
                BoxBody::Stsc(StscBox {
                    version: 0,
                    flags: 0,
                    entries: vec![StscEntry {
                        first_chunk: 1,
                        samples_per_chunk: sample_sizes.len() as u32,
                        sample_description_index: 1,
                    }],
                }),
            ),
            Mp4Box::new(
                b"stsz",
                BoxBody::Stsz(StszBox {
                    version: 0,
                    flags: 0,
                    constant: 0,
                    sample_count: sample_sizes.len() as u32,
                    sizes: sample_sizes.to_vec(),
                }),
            ),
            Mp4Box::new(
                b"stco",
                BoxBody::Stco(StcoBox {
                    version: 0,
                    flags: 0,
                    offsets: vec![0], // patched below
                }),
            ),
            Mp4Box::new(
                b"stss",
                BoxBody::Stss(StssBox {
                    version: 0,
                    flags: 0,
                    entries: vec![1, 4, 7],
                }),
            ),
        ],
    );

    let handler_name = if handler == b"soun" { "Sound" } else { "Video" };
    let mdia = Mp4Box::container_with(
        b"mdia",
        vec![
            Mp4Box::new(b"mdhd", BoxBody::Mdhd(MdhdBox::new(1000))),
            Mp4Box::new(b"hdlr", BoxBody::Hdlr(HdlrBox::new(handler, handler_name))),
            Mp4Box::container_with(b"minf", vec![stbl]),
        ],
    );

    let tkhd = TkhdBox {
        version: 0,
        flags: 3,
        created: 0,
        modified: 0,
        track_id: 1,
        duration: sample_sizes.len() as u64 * 1000,
        layer: 0,
        alternate_group: 0,
        volume: if handler == b"soun" { 0x0100 } else { 0 },
        matrix: IDENTITY_MATRIX,
        width: 640 << 16,
        height: 480 << 16,
    };
    let trak = Mp4Box::container_with(
        b"trak",
        vec![Mp4Box::new(b"tkhd", BoxBody::Tkhd(tkhd)), mdia],
    );

    let mut mvhd = MvhdBox::new(1000);
    mvhd.duration = sample_sizes.len() as u64 * 1000;
    mvhd.next_track_id = 2;
    let moov = Mp4Box::container_with(
        b"moov",
        vec![Mp4Box::new(b"mvhd", BoxBody::Mvhd(mvhd)), trak],
    );

    let mut root = Mp4Root::new();
    root.push(Mp4Box::new(
        b"ftyp",
        BoxBody::Ftyp(FileTypeBox::new(b"isom", 512, &[b"isom", b"mp41"])),
    ));
    root.push(moov);
    root.push(Mp4Box::new(
        b"mdat",
        BoxBody::Unknown(UnknownBox::new(payload)),
    ));
    root.calc_size();

    // Point the single chunk at the mdat body now that sizes are known.
    let mdat_offset: u64 = root.children()[0].size + root.children()[1].size + 8;
    if let Some(b) = root.find_mut(b"stco") {
        if let BoxBody::Stco(stco) = &mut b.body {
            stco.offsets = vec![mdat_offset as u32];
        }
    }

    let mut out = Vec::new();
    root.write_to(&mut out).unwrap();
    out
}
