//! JPEG segment walking: locating the Exif payload for the read-only tag
//! pass, and scanning header segments for metadata-block signatures that the
//! tag API does not expose (XMP packets, Photoshop/IPTC resources, comments).

use nom::{bytes::complete, combinator::fail, number, sequence::tuple, IResult};

pub(crate) const EXIF_HEADER: &[u8] = b"Exif\x00\x00";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\x00";
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\x00";

/// A marker code is the byte following 0xFF that names the segment kind.
enum MarkerCode {
    // Start of Image
    Soi = 0xD8,

    // APP1 marker (Exif or XMP)
    App1 = 0xE1,

    // APP13 marker (Photoshop resources, IPTC)
    App13 = 0xED,

    // Free-text comment
    Com = 0xFE,

    // Start of Scan
    Sos = 0xDA,
}

impl MarkerCode {
    fn code(self) -> u8 {
        self as u8
    }
}

struct Segment<'a> {
    marker_code: u8,
    payload: &'a [u8],
}

/// Quick structural check: SOI marker followed by another marker byte.
pub(crate) fn check_jpeg(input: &[u8]) -> crate::Result<()> {
    let (_, (_, code)) = tuple((complete::tag([0xFF]), number::complete::u8))(input)?;
    if code != MarkerCode::Soi.code() {
        return Err("invalid JPEG file; SOI marker not found".into());
    }
    let (_, (_, _)) = tuple((complete::tag([0xFF]), number::complete::u8))(input)?;
    Ok(())
}

/// Extract the TIFF bytes of the first Exif APP1 segment, if any. This is a
/// read-only borrow of the source; nothing is mutated.
pub(crate) fn extract_exif_payload(input: &[u8]) -> crate::Result<Option<&[u8]>> {
    let mut found = None;
    walk_segments(input, |segment| {
        if segment.marker_code == MarkerCode::App1.code()
            && segment.payload.starts_with(EXIF_HEADER)
        {
            found = Some(&segment.payload[EXIF_HEADER.len()..]);
            true
        } else {
            false
        }
    })?;
    Ok(found)
}

/// Scan header segments (everything before SOS) for metadata blocks that
/// live outside the Exif tag structure. Returns the names of what was
/// found; an empty list means the header is clean.
///
/// Restricting the scan to the pre-scan segment area keeps entropy-coded
/// pixel data from producing false positives.
pub(crate) fn scan_metadata_signatures(input: &[u8]) -> Vec<&'static str> {
    let mut found = Vec::new();
    let res = walk_segments(input, |segment| {
        if segment.marker_code == MarkerCode::App1.code()
            && segment.payload.starts_with(XMP_HEADER)
        {
            found.push("XmpPacket");
        } else if segment.marker_code == MarkerCode::App13.code()
            && segment.payload.starts_with(PHOTOSHOP_HEADER)
        {
            found.push("PhotoshopResources");
        } else if segment.marker_code == MarkerCode::Com.code() && !segment.payload.is_empty() {
            found.push("JpegComment");
        }
        false
    });
    if let Err(e) = res {
        tracing::debug!("signature scan stopped early: {e}");
    }
    found
}

/// Walk marker segments from SOI until the predicate matches or SOS is
/// reached.
fn walk_segments<'a, F>(input: &'a [u8], mut predicate: F) -> crate::Result<()>
where
    F: FnMut(&Segment<'a>) -> bool,
{
    let mut remain = input;
    loop {
        let (rem, (_, code)) =
            tuple((complete::tag([0xFF]), number::complete::u8))(remain)
                .map_err(|e| crate::error::convert_parse_error(e, "bad segment marker"))?;
        let (rem, segment) = parse_segment(code, rem)
            .map_err(|e| crate::error::convert_parse_error(e, "bad segment"))?;
        // Sanity check
        debug_assert!(rem.len() < remain.len());
        remain = rem;
        tracing::trace!("got segment: 0x{:02x}", segment.marker_code);

        if predicate(&segment) || segment.marker_code == MarkerCode::Sos.code() {
            return Ok(());
        }
    }
}

fn parse_segment(marker_code: u8, input: &[u8]) -> IResult<&[u8], Segment<'_>> {
    // SOI has no payload
    if marker_code == MarkerCode::Soi.code() {
        return Ok((
            input,
            Segment {
                marker_code,
                payload: b"",
            },
        ));
    }

    let (remain, size) = number::complete::be_u16(input)?;
    if size < 2 {
        return fail(remain);
    }
    // size covers its own two bytes
    let (remain, payload) = complete::take(size - 2)(remain)?;
    Ok((
        remain,
        Segment {
            marker_code,
            payload,
        },
    ))
}
