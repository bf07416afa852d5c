//! Post-write integrity verification: re-open the produced artifact and
//! look for identifying fields that should not have survived.
//!
//! Findings are data, not errors. For images the result gates the
//! artifact's `passed` flag; for video the check is advisory, since
//! container metadata cannot be enumerated exhaustively.

use crate::asset::{MediaKind, Mime, MimeImage};
use crate::container::bbox::{full_box_body, iter_boxes};
use crate::exif::parse_tag_entries;
use crate::tags::{tag_name, ExifTag, IfdKind};
use crate::{jpeg, png};

#[cfg(feature = "json_dump")]
use serde::Serialize;

/// Outcome of verifying one artifact.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "json_dump", derive(Serialize))]
pub struct VerificationReport {
    pub passed: bool,
    /// Names of identifying fields still present in the artifact.
    pub residual_fields: Vec<String>,
    /// True when findings are informational rather than gating (the video
    /// path).
    pub advisory: bool,
}

impl VerificationReport {
    fn from_findings(residual_fields: Vec<String>, advisory: bool) -> Self {
        Self {
            passed: residual_fields.is_empty(),
            residual_fields,
            advisory,
        }
    }
}

/// Verify a finished artifact of the given kind.
pub fn verify(bytes: &[u8], kind: MediaKind) -> VerificationReport {
    let report = match kind {
        MediaKind::Image => verify_image(bytes),
        MediaKind::Video => verify_video(bytes),
    };
    if !report.passed {
        tracing::warn!(
            advisory = report.advisory,
            residual = ?report.residual_fields,
            "residual metadata detected in artifact"
        );
    }
    report
}

fn verify_image(bytes: &[u8]) -> VerificationReport {
    let mut residual: Vec<String> = Vec::new();

    let mime = match Mime::try_from(bytes) {
        Ok(Mime::Image(m)) => m,
        _ => {
            // An artifact we cannot even re-parse fails closed.
            return VerificationReport::from_findings(vec!["UnverifiableArtifact".into()], false);
        }
    };

    // Secondary check first: raw block signatures that the tag structure
    // does not expose.
    match mime {
        MimeImage::Jpeg => {
            for name in jpeg::scan_metadata_signatures(bytes) {
                push_unique(&mut residual, name.to_owned());
            }
        }
        MimeImage::Png => {
            for name in png::metadata_chunk_names(bytes) {
                // The eXIf chunk itself is allowed to exist; its *contents*
                // are judged by the tag check below.
                if name != "PngExifChunk" {
                    push_unique(&mut residual, name.to_owned());
                }
            }
        }
        MimeImage::Tiff => {}
    }

    // Primary check: re-parse the tag structure and assert the high-risk
    // subset is absent.
    let payload: Option<&[u8]> = match mime {
        MimeImage::Jpeg => jpeg::extract_exif_payload(bytes).ok().flatten(),
        MimeImage::Png => png::exif_chunk(bytes),
        MimeImage::Tiff => Some(bytes),
    };
    if let Some(payload) = payload {
        match parse_tag_entries(payload) {
            Ok(entries) => {
                for entry in &entries {
                    match entry.ifd {
                        IfdKind::Gps => {
                            push_unique(&mut residual, tag_name(entry.code, IfdKind::Gps));
                        }
                        IfdKind::Thumbnail => {
                            push_unique(&mut residual, "ThumbnailDirectory".to_owned());
                        }
                        IfdKind::Primary | IfdKind::Exif => {
                            if ExifTag::try_from(entry.code).is_ok_and(|t| t.high_risk()) {
                                push_unique(&mut residual, tag_name(entry.code, entry.ifd));
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("artifact tag structure unparseable: {e}");
                push_unique(&mut residual, "UnparseableTagStructure".to_owned());
            }
        }
    }

    VerificationReport::from_findings(residual, false)
}

/// Boxes that exist to carry descriptive metadata. Their presence is a
/// finding; their contents are not inspected.
const RESIDUAL_BOXES: &[&[u8; 4]] = &[b"udta", b"meta", b"ilst", b"uuid", b"keys"];

/// Containers worth descending into.
const CONTAINER_BOXES: &[&[u8; 4]] = &[b"moov", b"trak", b"mdia", b"minf", b"stbl", b"edts"];

fn verify_video(bytes: &[u8]) -> VerificationReport {
    let mut residual = Vec::new();
    walk_residual_boxes(bytes, &mut residual);
    VerificationReport::from_findings(residual, true)
}

/// Names of descriptive boxes and nonzero header times found in a
/// container; also backs the inspection read path.
pub(crate) fn residual_video_fields(bytes: &[u8]) -> Vec<String> {
    let mut residual = Vec::new();
    walk_residual_boxes(bytes, &mut residual);
    residual
}

fn walk_residual_boxes(data: &[u8], residual: &mut Vec<String>) {
    for child in iter_boxes(data) {
        let Ok(child) = child else { break };

        if RESIDUAL_BOXES.contains(&&child.box_type) || child.box_type[0] == 0xa9 {
            push_unique(residual, child.type_str());
            continue;
        }
        match &child.box_type {
            b"mvhd" | b"tkhd" | b"mdhd" => {
                if header_times_nonzero(child.body) {
                    push_unique(residual, format!("{}.creation_time", child.type_str()));
                }
            }
            _ if CONTAINER_BOXES.contains(&&child.box_type) => {
                walk_residual_boxes(child.body, residual);
            }
            _ => {}
        }
    }
}

fn header_times_nonzero(body: &[u8]) -> bool {
    let Ok((version, _, rest)) = full_box_body(body) else {
        return false;
    };
    let width = if version == 1 { 8 } else { 4 };
    let Some(times) = rest.get(..width * 2) else {
        return false;
    };
    times.iter().any(|b| *b != 0)
}

fn push_unique(fields: &mut Vec<String>, name: String) {
    if !fields.contains(&name) {
        fields.push(name);
    }
}
