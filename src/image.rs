//! Image path: read-only tag pass, bounded decode, clean re-encode, and
//! the minimal preserved-tag write-back.
//!
//! Stripping works by reconstruction, not deletion: decoding to a raster
//! buffer and re-encoding it with zero tags discards everything the
//! allow-list did not keep, including tags no parser recognizes.

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, ImageReader};
use bytes::Bytes;
use img_parts::{jpeg::Jpeg as JpegParts, png::Png as PngParts, ImageEXIF};

use crate::asset::{MediaAsset, Mime, MimeImage};
use crate::config::ScrubConfig;
use crate::exif::{collect_preserved, parse_tag_entries, PreservedAttributeSet, TagEntry};
use crate::{jpeg, png, Error};

/// Borrow the TIFF-structured tag payload out of an image source, if the
/// source carries one. Never mutates the source.
pub(crate) fn extract_tiff_payload<'a>(
    bytes: &'a [u8],
    mime: MimeImage,
) -> crate::Result<Option<&'a [u8]>> {
    match mime {
        MimeImage::Jpeg => jpeg::extract_exif_payload(bytes),
        MimeImage::Png => Ok(png::exif_chunk(bytes)),
        MimeImage::Tiff => Ok(Some(bytes)),
    }
}

/// The read-only tag pass: parse, classify, keep the preserve subset.
/// Sources with no tags at all, and sources whose tag block is corrupt,
/// both yield an empty set; the re-encode guarantees a clean baseline
/// either way.
pub(crate) fn read_tags(asset: &MediaAsset) -> (Vec<TagEntry>, PreservedAttributeSet) {
    let Mime::Image(mime) = asset.mime else {
        return (Vec::new(), PreservedAttributeSet::default());
    };

    let entries = match extract_tiff_payload(asset.bytes(), mime) {
        Ok(Some(payload)) => match parse_tag_entries(payload) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("tag structure unreadable, treating source as tagless: {e}");
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("container walk failed, treating source as tagless: {e}");
            Vec::new()
        }
    };

    let preserved = collect_preserved(&entries);
    (entries, preserved)
}

/// Decode the raster and re-encode it with zero tags attached.
///
/// Dimensions are probed first, without materializing pixels; sources
/// exceeding the working ceiling are downsampled by a power of two, and the
/// delivered output keeps that size — the documented lossy-but-bounded
/// policy for oversized input.
pub(crate) fn reencode(asset: &MediaAsset, config: &ScrubConfig) -> crate::Result<(Vec<u8>, MimeImage)> {
    let Mime::Image(mime) = asset.mime else {
        return Err("not an image source".into());
    };

    let (width, height) = ImageReader::new(Cursor::new(asset.bytes()))
        .with_guessed_format()
        .map_err(|e| Error::DecodeFailed(e.into()))?
        .into_dimensions()?;

    let factor = downsample_factor(width.max(height), config.max_working_dimension_px);

    let decoded = ImageReader::new(Cursor::new(asset.bytes()))
        .with_guessed_format()
        .map_err(|e| Error::DecodeFailed(e.into()))?
        .decode()?;

    let raster = if factor > 1 {
        tracing::debug!(width, height, factor, "downsampling oversized raster");
        decoded.resize_exact(
            (width / factor).max(1),
            (height / factor).max(1),
            image::imageops::FilterType::Triangle,
        )
    } else {
        decoded
    };

    // TIFF sources re-encode as JPEG; their tag-heavy container has no
    // place in the output.
    let out_mime = match mime {
        MimeImage::Png => MimeImage::Png,
        MimeImage::Jpeg | MimeImage::Tiff => MimeImage::Jpeg,
    };

    let bytes = encode_clean(&raster, out_mime, config.jpeg_quality)?;
    Ok((bytes, out_mime))
}

fn downsample_factor(largest_dimension: u32, ceiling: u32) -> u32 {
    let ceiling = ceiling.max(1);
    let mut factor = 1u32;
    while largest_dimension.div_ceil(factor) > ceiling {
        factor *= 2;
    }
    factor
}

fn encode_clean(raster: &DynamicImage, mime: MimeImage, quality: u8) -> crate::Result<Vec<u8>> {
    let mut out = Vec::new();
    match mime {
        MimeImage::Jpeg => {
            // JPEG has no alpha; flatten before encoding.
            let rgb = raster.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
            encoder.encode_image(&rgb)?;
        }
        MimeImage::Png => {
            raster.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        }
        MimeImage::Tiff => unreachable!("tiff is never an output format"),
    }
    Ok(out)
}

/// Apply the preserved set to an already-encoded artifact. With an empty
/// set the bytes pass through untouched — the output then carries no tag
/// block at all.
pub(crate) fn apply_preserved(
    bytes: &[u8],
    mime: MimeImage,
    preserved: &PreservedAttributeSet,
) -> crate::Result<Vec<u8>> {
    let Some(tiff) = preserved.to_tiff() else {
        return Ok(bytes.to_vec());
    };

    match mime {
        MimeImage::Jpeg => {
            let mut parts = JpegParts::from_bytes(Bytes::copy_from_slice(bytes))
                .map_err(|e| Error::WriteFailed(e.into()))?;
            parts.set_exif(Some(Bytes::from(tiff)));
            Ok(parts.encoder().bytes().to_vec())
        }
        MimeImage::Png => {
            let mut parts = PngParts::from_bytes(Bytes::copy_from_slice(bytes))
                .map_err(|e| Error::WriteFailed(e.into()))?;
            parts.set_exif(Some(Bytes::from(tiff)));
            Ok(parts.encoder().bytes().to_vec())
        }
        MimeImage::Tiff => unreachable!("tiff is never an output format"),
    }
}
