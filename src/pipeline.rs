//! The engine façade: sniff the source, run the matching strip path, and
//! guarantee cleanup of every intermediate regardless of outcome.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::asset::{MediaAsset, MediaKind, MimeImage};
use crate::cache::SizeCache;
use crate::config::ScrubConfig;
use crate::container;
use crate::eraser::SecureFileEraser;
use crate::error::write_failed;
use crate::exif::TagEntry;
use crate::geo;
use crate::image;
use crate::progress::Progress;
use crate::sink::{ArtifactLocation, OutputSink, SinkEntry, SinkRequest};
use crate::tags::{tag_name, GpsTag, IfdKind, TagPolicy};
use crate::verify::{self, VerificationReport};
use crate::Error;

#[cfg(feature = "json_dump")]
use serde::Serialize;

/// How the artifact was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json_dump", derive(Serialize))]
pub enum StripMode {
    /// The container was rebuilt from scratch; only allow-listed data was
    /// carried over.
    Rebuilt,
    /// The bytes were copied verbatim because the container-aware path was
    /// unavailable. Residual container metadata may remain; the reason
    /// says why.
    RawCopy { reason: String },
}

/// A completed output. Created only after verification ran (or, for video,
/// after the advisory check); an artifact that failed verification is
/// still returned, flagged, never silently repaired.
#[derive(Debug)]
pub struct ProcessedArtifact {
    pub location: ArtifactLocation,
    pub len: u64,
    pub verification: VerificationReport,
    pub mode: StripMode,
}

/// One classified tag from the inspection read path.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "json_dump", derive(Serialize))]
pub struct InspectedTag {
    pub name: String,
    pub value: Option<String>,
    pub policy: TagPolicy,
}

/// Inspection result: every tag found in a source, classified, plus the
/// decoded GPS position when the source carries one.
#[derive(Debug, Clone)]
pub struct MetadataSummary {
    pub kind: MediaKind,
    pub tags: Vec<InspectedTag>,
    /// Signed decimal degrees, `(latitude, longitude)`.
    pub position: Option<(f64, f64)>,
}

/// The metadata stripping engine. Operations are independent and
/// synchronous; no state beyond the size cache survives a call, and the
/// cache is never authoritative.
pub struct Scrubber {
    config: ScrubConfig,
    eraser: SecureFileEraser,
    sizes: SizeCache,
}

impl Scrubber {
    pub fn new(config: ScrubConfig) -> Self {
        let eraser = SecureFileEraser::new(
            config.secure_erase_passes,
            config.secure_erase_buffer_bytes,
        );
        let sizes = SizeCache::new(config.size_cache_entries);
        Self {
            config,
            eraser,
            sizes,
        }
    }

    pub fn config(&self) -> &ScrubConfig {
        &self.config
    }

    /// Strip a file from disk. The size ceiling is checked against file
    /// metadata before any bytes are read.
    pub fn strip_file(
        &mut self,
        path: &Path,
        sink: &dyn OutputSink,
        progress: Progress,
    ) -> crate::Result<ProcessedArtifact> {
        let size = self
            .sizes
            .measure(path)
            .map_err(|e| Error::UnreadableSource(e.into()))?;
        self.check_ceiling(size)?;

        let bytes = std::fs::read(path).map_err(|e| Error::UnreadableSource(e.into()))?;
        let file_name = path.file_name().and_then(|n| n.to_str());
        let asset = MediaAsset::from_bytes(bytes, None, file_name)?;
        self.strip(&asset, sink, progress)
    }

    /// Strip an in-memory asset into `sink`.
    pub fn strip(
        &mut self,
        asset: &MediaAsset,
        sink: &dyn OutputSink,
        mut progress: Progress,
    ) -> crate::Result<ProcessedArtifact> {
        self.check_ceiling(asset.len())?;
        match asset.kind() {
            MediaKind::Image => self.strip_image(asset, sink, &mut progress),
            MediaKind::Video => self.strip_video(asset, sink, &mut progress),
        }
    }

    /// Read path: list and classify everything the source carries, without
    /// producing an artifact.
    pub fn inspect(&self, asset: &MediaAsset) -> crate::Result<MetadataSummary> {
        match asset.kind() {
            MediaKind::Image => {
                let (entries, _) = image::read_tags(asset);
                let tags = entries
                    .iter()
                    .map(|e| InspectedTag {
                        name: tag_name(e.code, e.ifd),
                        value: e.value.as_ref().map(|v| v.to_string()),
                        policy: e.policy(),
                    })
                    .collect();
                let position = gps_position(&entries);
                Ok(MetadataSummary {
                    kind: MediaKind::Image,
                    tags,
                    position,
                })
            }
            MediaKind::Video => {
                let tags = verify::residual_video_fields(asset.bytes())
                    .into_iter()
                    .map(|name| InspectedTag {
                        name,
                        value: None,
                        policy: TagPolicy::Strip,
                    })
                    .collect();
                Ok(MetadataSummary {
                    kind: MediaKind::Video,
                    tags,
                    position: None,
                })
            }
        }
    }

    fn check_ceiling(&self, size: u64) -> crate::Result<()> {
        let limit = self.config.max_file_size_bytes();
        if size > limit {
            return Err(Error::FileTooLarge { size, limit });
        }
        Ok(())
    }

    fn strip_image(
        &self,
        asset: &MediaAsset,
        sink: &dyn OutputSink,
        progress: &mut Progress,
    ) -> crate::Result<ProcessedArtifact> {
        progress.report(1);
        let (_, preserved) = image::read_tags(asset);
        tracing::debug!(preserved = preserved.len(), "read pass done");

        progress.report(2);
        let (clean, out_mime) = image::reencode(asset, &self.config)?;

        progress.report(3);
        let mut temp_guard = TempGuard::new(&self.eraser);
        let staging = self.stage(&clean, &mut temp_guard)?;
        // Re-open the staged output; the preserved set is the only
        // metadata that goes back in.
        let staged = std::fs::read(&staging).map_err(|e| Error::UnreadableSource(e.into()))?;
        let final_bytes = image::apply_preserved(&staged, out_mime, &preserved)?;

        let extension = match out_mime {
            MimeImage::Png => "png",
            _ => "jpg",
        };
        let mime_str = match out_mime {
            MimeImage::Png => "image/png",
            _ => "image/jpeg",
        };
        let entry = sink.create(&SinkRequest {
            extension,
            mime: mime_str,
            logical_dir: &self.config.logical_dir,
        })?;
        let location = write_entry(entry, &final_bytes)?;

        progress.report(4);
        let verification = verify::verify(&final_bytes, MediaKind::Image);

        Ok(ProcessedArtifact {
            location,
            len: final_bytes.len() as u64,
            verification,
            mode: StripMode::Rebuilt,
        })
    }

    fn strip_video(
        &self,
        asset: &MediaAsset,
        sink: &dyn OutputSink,
        progress: &mut Progress,
    ) -> crate::Result<ProcessedArtifact> {
        progress.report(1);
        progress.report(2);
        let output = container::strip_video(asset)?;

        progress.report(3);
        let mut temp_guard = TempGuard::new(&self.eraser);
        let final_bytes = match &output.mode {
            StripMode::Rebuilt => {
                let staging = self.stage(&output.bytes, &mut temp_guard)?;
                std::fs::read(&staging).map_err(|e| Error::UnreadableSource(e.into()))?
            }
            // A verbatim copy has no intermediate to stage.
            StripMode::RawCopy { .. } => output.bytes,
        };

        let entry = sink.create(&SinkRequest {
            extension: &asset.output_extension(),
            mime: asset.mime(),
            logical_dir: &self.config.logical_dir,
        })?;
        let location = write_entry(entry, &final_bytes)?;

        progress.report(4);
        // Advisory for video: findings are logged and carried, the
        // artifact is not rejected.
        let verification = verify::verify(&final_bytes, MediaKind::Video);

        Ok(ProcessedArtifact {
            location,
            len: final_bytes.len() as u64,
            verification,
            mode: output.mode,
        })
    }

    /// Write bytes to an operation-scoped staging file, registered with the
    /// guard *before* the first write so every exit path erases it.
    fn stage(&self, bytes: &[u8], guard: &mut TempGuard) -> crate::Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("scrub-stage-");
        let file = match &self.config.staging_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| Error::WriteFailed(e.into()))?;
        let (mut file, path) = file.keep().map_err(|e| Error::WriteFailed(e.into()))?;
        guard.register(path.clone());

        file.write_all(bytes).map_err(write_failed)?;
        file.sync_all().map_err(write_failed)?;
        Ok(path)
    }
}

fn write_entry(mut entry: SinkEntry, bytes: &[u8]) -> crate::Result<ArtifactLocation> {
    if let Err(e) = entry.write_all(bytes) {
        entry.discard();
        return Err(e);
    }
    entry.finalize()
}

fn gps_position(entries: &[TagEntry]) -> Option<(f64, f64)> {
    let value = |code: u16| {
        entries
            .iter()
            .find(|e| e.ifd == IfdKind::Gps && e.code == code)
            .and_then(|e| e.value.as_ref())
    };
    let hemisphere = |code: u16| value(code)?.as_str()?.chars().next();

    let latitude = geo::from_rationals(
        value(GpsTag::GPSLatitude.code())?.as_urational_array()?,
        hemisphere(GpsTag::GPSLatitudeRef.code())?,
    )
    .ok()?;
    let longitude = geo::from_rationals(
        value(GpsTag::GPSLongitude.code())?.as_urational_array()?,
        hemisphere(GpsTag::GPSLongitudeRef.code())?,
    )
    .ok()?;
    Some((latitude, longitude))
}

/// Erases registered paths when the operation ends, however it ends.
struct TempGuard<'a> {
    eraser: &'a SecureFileEraser,
    paths: Vec<PathBuf>,
}

impl<'a> TempGuard<'a> {
    fn new(eraser: &'a SecureFileEraser) -> Self {
        Self {
            eraser,
            paths: Vec::new(),
        }
    }

    fn register(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for TempGuard<'_> {
    fn drop(&mut self) {
        for path in &self.paths {
            let outcome = self.eraser.erase(path);
            tracing::debug!(path = %path.display(), ?outcome, "intermediate erased");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::parse_tag_entries;
    use crate::sink::{CollectionSink, EphemeralSink};
    use crate::tags::ExifTag;
    use crate::testkit::{encode_test_jpeg, jpeg_with_exif, SyntheticMovie};
    use crate::{container, jpeg};

    fn scrubber() -> Scrubber {
        Scrubber::new(ScrubConfig::default())
    }

    fn entries_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn strips_gps_and_device_tags_but_keeps_orientation() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let source = jpeg_with_exif(64, 64);
        let asset = MediaAsset::from_bytes(source, Some("image/jpeg"), Some("photo.jpg")).unwrap();
        let root = tempfile::tempdir().unwrap();
        let sink = CollectionSink::new(root.path());

        let artifact = scrubber().strip(&asset, &sink, Progress::none()).unwrap();

        assert_eq!(artifact.mode, StripMode::Rebuilt);
        assert!(artifact.verification.passed, "{:?}", artifact.verification);

        let produced = std::fs::read(artifact.location.path()).unwrap();
        assert_eq!(produced.len() as u64, artifact.len);

        let payload = jpeg::extract_exif_payload(&produced).unwrap().unwrap();
        let entries = parse_tag_entries(payload).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, ExifTag::Orientation.code());
        assert_eq!(entries[0].value.as_ref().unwrap().as_u16(), Some(6));
    }

    #[test]
    fn oversized_source_is_rejected_before_decode() {
        let root = tempfile::tempdir().unwrap();
        let sink = CollectionSink::new(root.path());
        let mut scrubber = Scrubber::new(ScrubConfig {
            max_file_size_mb: 1,
            ..ScrubConfig::default()
        });

        // Valid JPEG leader, padded past the ceiling. Decoding it would
        // fail loudly; rejection must come first.
        let mut source = encode_test_jpeg(16, 16);
        source.resize(1024 * 1024 + 1, 0);
        let asset = MediaAsset::from_bytes(source, None, None).unwrap();

        let err = scrubber.strip(&asset, &sink, Progress::none()).unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { .. }), "{err:?}");

        // No partial artifact anywhere under the sink root.
        let produced: Vec<_> = walk(root.path());
        assert!(produced.is_empty(), "{produced:?}");
    }

    #[test]
    fn oversized_file_is_rejected_from_metadata_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.jpg");
        std::fs::write(&path, vec![0u8; 2 * 1024 * 1024]).unwrap();

        let mut scrubber = Scrubber::new(ScrubConfig {
            max_file_size_mb: 1,
            ..ScrubConfig::default()
        });
        let sink = EphemeralSink::new();
        let err = scrubber
            .strip_file(&path, &sink, Progress::none())
            .unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { .. }), "{err:?}");
    }

    #[test]
    fn no_staging_file_survives_success_or_failure() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let sink = CollectionSink::new(root.path());
        let mut scrubber = Scrubber::new(ScrubConfig {
            staging_dir: Some(staging.path().to_owned()),
            ..ScrubConfig::default()
        });

        // Success path.
        let asset = MediaAsset::from_bytes(jpeg_with_exif(32, 32), None, None).unwrap();
        scrubber.strip(&asset, &sink, Progress::none()).unwrap();
        assert_eq!(entries_in(staging.path()), 0);

        // Induced failure at the sink step: staging exists by then and
        // must still be erased on the error path.
        let broken = CollectionSink::new("/proc/not-writable");
        let asset = MediaAsset::from_bytes(jpeg_with_exif(32, 32), None, None).unwrap();
        scrubber.strip(&asset, &broken, Progress::none()).unwrap_err();
        assert_eq!(entries_in(staging.path()), 0);

        // Video path, success.
        let clip = SyntheticMovie::two_track().build();
        let asset = MediaAsset::from_bytes(clip, None, Some("clip.mp4")).unwrap();
        scrubber.strip(&asset, &sink, Progress::none()).unwrap();
        assert_eq!(entries_in(staging.path()), 0);
    }

    #[test]
    fn restrip_is_verification_equivalent() {
        let source = jpeg_with_exif(64, 64);
        let asset = MediaAsset::from_bytes(source, None, None).unwrap();
        let root = tempfile::tempdir().unwrap();
        let sink = CollectionSink::new(root.path());
        let mut scrubber = scrubber();

        let first = scrubber.strip(&asset, &sink, Progress::none()).unwrap();
        let first_bytes = std::fs::read(first.location.path()).unwrap();

        let again = MediaAsset::from_bytes(first_bytes, None, None).unwrap();
        let second = scrubber.strip(&again, &sink, Progress::none()).unwrap();
        let second_bytes = std::fs::read(second.location.path()).unwrap();

        assert!(second.verification.passed);
        let payload = jpeg::extract_exif_payload(&second_bytes).unwrap().unwrap();
        let entries = parse_tag_entries(payload).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value.as_ref().unwrap().as_u16(), Some(6));
    }

    #[test]
    fn progress_milestones_fire_in_order() {
        let source = jpeg_with_exif(32, 32);
        let asset = MediaAsset::from_bytes(source, None, None).unwrap();
        let sink = EphemeralSink::new();

        let mut seen = Vec::new();
        let mut on_step = |cur: u32, total: u32, msg: &str| {
            seen.push((cur, total, msg.to_owned()));
        };
        scrubber()
            .strip(&asset, &sink, Progress::with(&mut on_step))
            .unwrap();

        let messages: Vec<&str> = seen.iter().map(|(_, _, m)| m.as_str()).collect();
        assert_eq!(
            messages,
            ["reading", "removing metadata", "saving", "verifying"]
        );
        assert!(seen.iter().all(|(_, total, _)| *total == 4));
    }

    #[test]
    fn video_strip_rebuilds_and_keeps_sample_fidelity() {
        let file = SyntheticMovie::two_track().with_udta().build();
        let source_movie = container::demux(&file).unwrap();

        let asset = MediaAsset::from_bytes(file, None, Some("clip.mp4")).unwrap();
        let sink = EphemeralSink::new();
        let artifact = scrubber().strip(&asset, &sink, Progress::none()).unwrap();

        assert_eq!(artifact.mode, StripMode::Rebuilt);
        assert!(artifact.verification.advisory);
        assert!(
            artifact.verification.passed,
            "{:?}",
            artifact.verification.residual_fields
        );

        let produced = std::fs::read(artifact.location.path()).unwrap();
        let rebuilt_movie = container::demux(&produced).unwrap();
        assert_eq!(source_movie.tracks.len(), rebuilt_movie.tracks.len());
        for (a, b) in source_movie.tracks.iter().zip(&rebuilt_movie.tracks) {
            assert_eq!(a.samples.len(), b.samples.len());
            for (sa, sb) in a.samples.iter().zip(&b.samples) {
                assert_eq!(sa.delta, sb.delta);
                assert_eq!(sa.keyframe, sb.keyframe);
                assert_eq!(sa.size, sb.size);
            }
        }
    }

    #[test]
    fn matroska_source_raw_copies_with_flag() {
        let mut source = vec![0x1a, 0x45, 0xdf, 0xa3];
        source.extend_from_slice(b"\x01\x00\x00\x00\x00\x00\x00\x20webm-doctype-padding");
        source.extend_from_slice(&[0u8; 64]);

        let asset = MediaAsset::from_bytes(source.clone(), None, Some("clip.webm")).unwrap();
        let sink = EphemeralSink::new();
        let artifact = scrubber().strip(&asset, &sink, Progress::none()).unwrap();

        assert!(matches!(artifact.mode, StripMode::RawCopy { .. }));
        let produced = std::fs::read(artifact.location.path()).unwrap();
        assert_eq!(produced, source);
        assert!(artifact
            .location
            .path()
            .extension()
            .is_some_and(|e| e == "webm"));
    }

    #[test]
    fn inspect_lists_classified_tags_and_position() {
        let source = jpeg_with_exif(48, 48);
        let asset = MediaAsset::from_bytes(source, None, None).unwrap();
        let summary = scrubber().inspect(&asset).unwrap();

        assert_eq!(summary.kind, MediaKind::Image);
        let orientation = summary
            .tags
            .iter()
            .find(|t| t.name == "Orientation")
            .unwrap();
        assert_eq!(orientation.policy, TagPolicy::Preserve);
        let make = summary.tags.iter().find(|t| t.name == "Make").unwrap();
        assert_eq!(make.policy, TagPolicy::Strip);
        assert_eq!(make.value.as_deref(), Some("Acme"));

        let (latitude, longitude) = summary.position.unwrap();
        assert!((latitude - (39.0 + 39.0 / 60.0 + 33.8 / 3600.0)).abs() < 1e-9);
        assert!((longitude - (116.0 + 23.0 / 60.0 + 27.0 / 3600.0)).abs() < 1e-9);
    }

    #[test]
    fn scenario_gps_make_orientation_jpeg() {
        // Input: JPEG with GPSLatitude 39/1,39/1,3380/100 N, Make "Acme",
        // Orientation 6. Expected: output carries Orientation=6 only and
        // verification passes.
        let source = jpeg_with_exif(120, 80);
        let asset = MediaAsset::from_bytes(source, Some("image/jpeg"), Some("dscf0001.jpg")).unwrap();
        let root = tempfile::tempdir().unwrap();
        let sink = CollectionSink::new(root.path());

        let artifact = scrubber().strip(&asset, &sink, Progress::none()).unwrap();
        assert!(artifact.verification.passed);
        assert!(artifact.verification.residual_fields.is_empty());

        let produced = std::fs::read(artifact.location.path()).unwrap();
        let payload = jpeg::extract_exif_payload(&produced).unwrap().unwrap();
        let entries = parse_tag_entries(payload).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, ExifTag::Orientation.code());

        let report = crate::verify::verify(&produced, MediaKind::Image);
        assert!(report.passed);
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if let Ok(read) = std::fs::read_dir(dir) {
            for entry in read.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.is_dir() {
                    out.extend(walk(&path));
                } else {
                    out.push(path);
                }
            }
        }
        out
    }
}
