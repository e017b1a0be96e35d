//! isoforge: ISOBMFF container parsing, editing, and DASH segmentation
//!
//! This crate reads, inspects, modifies, and rewrites ISO Base Media File
//! Format (MP4 / fragmented-MP4) containers, and remuxes their elementary
//! streams into DASH media segments.
//!
//! # Modules
//!
//! - `io` - big-endian primitives over seekable input / append-only output
//! - `boxes` - the typed box tree (parse, locate, mutate, serialize)
//! - `sample` - sample-index queries and the sequential `SampleReader`
//! - `dash` - CMAF init segment plus sync-aligned `moof`/`mdat` fragments
//!
//! # Architecture
//!
//! A source file is parsed once into a typed box tree. Oversized boxes
//! (`mdat` in particular) are never loaded; they are recorded by file
//! offset so memory stays bounded by metadata size. Sample queries walk
//! the `stbl` run-length tables lazily, and the segmenter copies payload
//! bytes straight from the source stream into each fragment's `mdat`:
//!
//! 1. Parse `moov` and locate the track's sample tables
//! 2. Resolve sample index -> (chunk, file offset, dts, cts, sync)
//! 3. Cut fragments at sync points near the target duration
//! 4. Emit `styp`/`sidx`/`moof`/`mdat` with patched data offsets

pub mod boxes;
pub mod dash;
pub mod error;
pub mod io;
pub mod sample;

pub use boxes::{BoxBody, FourCc, Mp4Box, Mp4Root, BOX_READ_SIZE_LIMIT};
pub use dash::{DashConfig, DashSegmenter, MediaSegment};
pub use error::{Error, Result};
pub use sample::{Sample, SampleIndex, SampleReader};
