//! Track model: one elementary stream plus the minimal set of fields a
//! decoder needs. Descriptor construction is an allow-list — fields not
//! named here are never copied from the source container.

#[cfg(feature = "json_dump")]
use serde::Serialize;

/// Media-type-specific decode parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json_dump", derive(Serialize))]
pub enum TrackKind {
    Video { width: u16, height: u16 },
    Audio { sample_rate: u32, channels: u16 },
}

/// A codec-configuration child box carried verbatim (e.g. `avcC`, `esds`).
/// These bytes are decoder initialization data, not descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InitBox {
    pub box_type: [u8; 4],
    pub body: Vec<u8>,
}

/// Exactly the codec-essential parameters of one stream, and nothing else.
#[derive(Debug, Clone)]
pub struct TrackDescriptor {
    pub kind: TrackKind,
    /// Sample entry fourcc, e.g. `avc1`, `hvc1`, `mp4a`.
    pub codec: [u8; 4],
    /// Units per second for this track's timestamps.
    pub timescale: u32,
    /// Average bitrate in bits per second, when the source declares or the
    /// demuxer can derive one.
    pub bitrate: Option<u32>,
    /// Mean frame rate derived from sample timing (video tracks).
    pub frame_rate: Option<f64>,
    pub(crate) init_boxes: Vec<InitBox>,
}

impl TrackDescriptor {
    pub fn is_video(&self) -> bool {
        matches!(self.kind, TrackKind::Video { .. })
    }

    pub fn codec_str(&self) -> String {
        self.codec.iter().map(|b| *b as char).collect()
    }
}

/// One compressed frame/packet. The payload stays in the source buffer;
/// only its coordinates travel through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Sample {
    /// Absolute offset of the payload in the source file.
    pub offset: u64,
    pub size: u32,
    /// Duration in track timescale units; decode timestamps are the
    /// running sum.
    pub delta: u32,
    /// Composition-time offset, when the source carries one.
    pub cts_offset: i32,
    pub keyframe: bool,
}

/// A demuxed elementary stream.
#[derive(Debug, Clone)]
pub(crate) struct Track {
    pub descriptor: TrackDescriptor,
    pub samples: Vec<Sample>,
    pub has_cts_offsets: bool,
}

impl Track {
    /// Total duration in track timescale units.
    pub(crate) fn duration(&self) -> u64 {
        self.samples.iter().map(|s| s.delta as u64).sum()
    }

    pub(crate) fn duration_ms(&self) -> u64 {
        if self.descriptor.timescale == 0 {
            return 0;
        }
        self.duration() * 1000 / self.descriptor.timescale as u64
    }

    /// Mean frame rate derived from sample timing; `None` for empty or
    /// timeless tracks.
    pub(crate) fn average_rate(&self) -> Option<f64> {
        let duration = self.duration();
        if duration == 0 || self.samples.is_empty() {
            return None;
        }
        Some(self.samples.len() as f64 * self.descriptor.timescale as f64 / duration as f64)
    }

    /// Payload bytes across all samples.
    pub(crate) fn payload_len(&self) -> u64 {
        self.samples.iter().map(|s| s.size as u64).sum()
    }

    /// Declared bitrate, or one derived from payload size and duration.
    pub(crate) fn effective_bitrate(&self) -> Option<u32> {
        if let Some(declared) = self.descriptor.bitrate {
            return Some(declared);
        }
        let ms = self.duration_ms();
        if ms == 0 {
            return None;
        }
        u32::try_from(self.payload_len() * 8 * 1000 / ms).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with(deltas: &[u32], timescale: u32) -> Track {
        Track {
            descriptor: TrackDescriptor {
                kind: TrackKind::Video {
                    width: 320,
                    height: 240,
                },
                codec: *b"avc1",
                timescale,
                bitrate: None,
                frame_rate: None,
                init_boxes: vec![],
            },
            samples: deltas
                .iter()
                .map(|d| Sample {
                    offset: 0,
                    size: 100,
                    delta: *d,
                    cts_offset: 0,
                    keyframe: true,
                })
                .collect(),
            has_cts_offsets: false,
        }
    }

    #[test]
    fn duration_and_rate() {
        let t = track_with(&[512, 512, 512, 512], 15360); // 30 fps
        assert_eq!(t.duration(), 2048);
        let rate = t.average_rate().unwrap();
        assert!((rate - 30.0).abs() < 1e-6);
    }

    #[test]
    fn derived_bitrate() {
        let t = track_with(&[1000, 1000], 1000); // 2 s, 200 bytes
        assert_eq!(t.effective_bitrate(), Some(800));
    }

    #[test]
    fn empty_track_has_no_rate() {
        let t = track_with(&[], 1000);
        assert!(t.average_rate().is_none());
        assert!(t.effective_bitrate().is_none());
    }
}
