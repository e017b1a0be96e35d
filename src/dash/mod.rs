//! DASH segmentation: a CMAF init segment plus numbered media segments
//! cut at sync-point boundaries.

mod init;
mod segmenter;

pub use segmenter::{DashSegmenter, MediaSegment};

use serde::{Deserialize, Serialize};

/// Runtime configuration for the segmenter. Every field defaults sensibly
/// so `DashConfig::default()` is a working setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    /// Target fragment duration in seconds.
    pub segment_seconds: u32,
    /// Output timescale for fragment timing; 0 inherits the track's
    /// media timescale.
    pub timescale: u32,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            segment_seconds: 5,
            timescale: 0,
        }
    }
}

/// Conventional file name for a track's init segment.
pub fn init_file_name(track_idx: u32) -> String {
    format!("init-stream{track_idx}.m4s")
}

/// Conventional file name for one media segment.
pub fn segment_file_name(track_idx: u32, fragment: u32) -> String {
    format!("chunk-stream{track_idx}-{fragment:05}.m4s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_naming() {
        assert_eq!(init_file_name(0), "init-stream0.m4s");
        assert_eq!(segment_file_name(0, 1), "chunk-stream0-00001.m4s");
        assert_eq!(segment_file_name(1, 123), "chunk-stream1-00123.m4s");
    }

    #[test]
    fn test_config_defaults() {
        let config = DashConfig::default();
        assert_eq!(config.segment_seconds, 5);
        assert_eq!(config.timescale, 0);
    }

    #[test]
    fn test_config_deserializes_from_empty_object() {
        let config: DashConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.segment_seconds, 5);
        let config: DashConfig = serde_json::from_str(r#"{"segment_seconds": 2}"#).unwrap();
        assert_eq!(config.segment_seconds, 2);
    }
}
