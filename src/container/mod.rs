//! Video path: demux, allow-list track reconstruction, remux. Sources the
//! demuxer cannot handle degrade to a raw byte copy — availability over
//! completeness, always signaled via [`StripMode`].

pub(crate) mod bbox;
mod demux;
mod track;
mod writer;

pub use track::{TrackDescriptor, TrackKind};

pub(crate) use demux::demux;

use crate::asset::MediaAsset;
use crate::{Error, StripMode};

#[derive(Debug)]
pub(crate) struct VideoOutput {
    pub bytes: Vec<u8>,
    pub mode: StripMode,
    /// Minimal descriptors of the rebuilt tracks; empty on the raw-copy
    /// path.
    pub descriptors: Vec<TrackDescriptor>,
}

/// Rebuild the container with only codec-essential track data, or fall
/// back to a flagged raw copy when the source cannot be demuxed.
///
/// A well-formed container without a video track is a hard error
/// ([`Error::NoVideoTrack`]), not a fallback: the source is understood,
/// it is just not a video.
pub(crate) fn strip_video(asset: &MediaAsset) -> crate::Result<VideoOutput> {
    if !asset.mime.supports_remux() {
        let reason = format!("{} cannot be rebuilt, copied verbatim", asset.mime());
        tracing::warn!(reason, "container-aware strip unavailable");
        return Ok(raw_copy(asset, reason));
    }

    let movie = match demux(asset.bytes()) {
        Ok(movie) => movie,
        Err(e) => {
            let reason = format!("demux failed: {e}");
            tracing::warn!(reason, "falling back to raw copy");
            return Ok(raw_copy(asset, reason));
        }
    };

    if !movie.has_video() {
        return Err(Error::NoVideoTrack);
    }

    match writer::remux(&movie, asset.bytes()) {
        Ok(bytes) => Ok(VideoOutput {
            bytes,
            mode: StripMode::Rebuilt,
            descriptors: movie
                .tracks
                .iter()
                .map(|t| {
                    let mut d = t.descriptor.clone();
                    d.bitrate = t.effective_bitrate();
                    if d.is_video() {
                        d.frame_rate = t.average_rate();
                    }
                    d
                })
                .collect(),
        }),
        Err(e) => {
            let reason = format!("remux failed: {e}");
            tracing::warn!(reason, "falling back to raw copy");
            Ok(raw_copy(asset, reason))
        }
    }
}

fn raw_copy(asset: &MediaAsset, reason: String) -> VideoOutput {
    VideoOutput {
        bytes: asset.bytes().to_vec(),
        mode: StripMode::RawCopy { reason },
        descriptors: Vec::new(),
    }
}
