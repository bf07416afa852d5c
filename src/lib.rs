//! mediascrub is a metadata stripping and rewriting engine for photo and
//! video files, written in pure Rust with
//! [nom](https://github.com/rust-bakery/nom). Visual content and
//! playback-essential attributes survive; identifying metadata does not.
//!
//! ## How stripping works
//!
//! - Images (jpeg/png/tiff): all tag entries are parsed and classified
//!   against a compiled allow-list ([`classify`]); the raster is decoded
//!   (with a bounded working size) and re-encoded with zero tags, then the
//!   preserved subset — in practice only `Orientation` — is written back.
//!   Re-encoding is what discards unknown and stripped tags; nothing is
//!   deleted in place.
//!
//! - Video (mp4/mov/3gp): the container is demuxed into elementary tracks,
//!   each reduced to a minimal codec-essential descriptor
//!   ([`TrackDescriptor`]), and remuxed into a fresh container with
//!   byte-exact sample payloads, original timestamps and key-frame flags,
//!   zeroed header times, and no `udta`/`meta`/vendor boxes. Sources the
//!   demuxer cannot handle (webm/mkv, corrupt containers) degrade to a raw
//!   byte copy, always flagged via [`StripMode::RawCopy`].
//!
//! Every output is re-opened and checked for residual identifying fields
//! ([`verify`]); findings are reported as data, never thrown. Intermediate
//! files are overwritten with random data and deleted on every exit path.
//!
//! ## Usage
//!
//! ```no_run
//! use mediascrub::*;
//!
//! fn main() -> Result<()> {
//!     let mut scrubber = Scrubber::new(ScrubConfig::default());
//!     let sink = CollectionSink::new("/media/collection");
//!
//!     let artifact = scrubber.strip_file(
//!         std::path::Path::new("holiday.jpg"),
//!         &sink,
//!         Progress::none(),
//!     )?;
//!
//!     assert!(artifact.verification.passed);
//!     println!("clean copy at {}", artifact.location.path().display());
//!     Ok(())
//! }
//! ```
//!
//! With progress reporting and an ephemeral destination for a one-shot
//! hand-off:
//!
//! ```no_run
//! use mediascrub::*;
//!
//! fn main() -> Result<()> {
//!     let mut scrubber = Scrubber::new(ScrubConfig::default());
//!     let sink = EphemeralSink::new();
//!
//!     let source = std::fs::read("clip.mp4")?;
//!     let asset = MediaAsset::from_bytes(source, Some("video/mp4"), Some("clip.mp4"))?;
//!
//!     let mut on_step = |step: u32, total: u32, message: &str| {
//!         eprintln!("[{step}/{total}] {message}");
//!     };
//!     let artifact = scrubber.strip(&asset, &sink, Progress::with(&mut on_step))?;
//!
//!     if let StripMode::RawCopy { reason } = &artifact.mode {
//!         eprintln!("container was copied verbatim: {reason}");
//!     }
//!     Ok(())
//! }
//! ```

pub use asset::{MediaAsset, MediaKind};
pub use config::ScrubConfig;
pub use container::{TrackDescriptor, TrackKind};
pub use eraser::{EraseOutcome, SecureFileEraser};
pub use exif::PreservedAttributeSet;
pub use geo::{decode as decode_coordinate, encode as encode_coordinate, Axis};
pub use pipeline::{InspectedTag, MetadataSummary, ProcessedArtifact, Scrubber, StripMode};
pub use progress::Progress;
pub use sink::{
    ArtifactLocation, CollectionSink, EphemeralHandle, EphemeralSink, OutputSink, SinkEntry,
    SinkRequest,
};
pub use tags::{classify, ExifTag, GpsTag, Orientation, TagPolicy};
pub use values::{EntryValue, IRational, URational};
pub use verify::{verify, VerificationReport};

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

mod asset;
mod cache;
mod config;
mod container;
mod eraser;
mod error;
mod exif;
mod geo;
mod image;
mod jpeg;
mod pipeline;
mod png;
mod progress;
mod sink;
mod tags;
mod values;
mod verify;

#[cfg(test)]
mod testkit;
