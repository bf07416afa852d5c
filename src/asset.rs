//! Source asset model and byte-signature media sniffing.
//!
//! The declared MIME type of an asset is advisory: detection works on the
//! leading bytes, the way the rest of the engine expects (a mislabeled file
//! must not pick the wrong strip path).

use bytes::Bytes;
use nom::FindSubstring;

use crate::jpeg;

// The usual MP4 brands, plus the 3GPP family recorded separately so the
// output extension can follow the source.
const MP4_BRAND_NAMES: &[&str] = &[
    "avc1", "mp41", "mp42", "iso2", "iso4", "iso5", "iso6", "isom", "M4V ", "vfj1",
];

const MP4_3GP_BRAND_NAMES: &[&str] = &[
    "3g2a", "3g2b", "3g2c", "3ge6", "3ge7", "3gg6", "3gp4", "3gp5", "3gp6", "3gs7",
];

const QT_BRAND_NAMES: &[&str] = &["qt  ", "mqt "];

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
const EBML_MAGIC: &[u8] = &[0x1a, 0x45, 0xdf, 0xa3];

/// Coarse media discriminant used for pipeline dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub(crate) enum Mime {
    Image(MimeImage),
    Video(MimeVideo),
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub(crate) enum MimeImage {
    Jpeg,
    Png,
    Tiff,
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub(crate) enum MimeVideo {
    Mp4,
    QuickTime,
    _3gpp,
    Webm,
    Matroska,
}

impl Mime {
    pub(crate) fn kind(&self) -> MediaKind {
        match self {
            Mime::Image(_) => MediaKind::Image,
            Mime::Video(_) => MediaKind::Video,
        }
    }

    pub(crate) fn mime_str(&self) -> &'static str {
        match self {
            Mime::Image(MimeImage::Jpeg) => "image/jpeg",
            Mime::Image(MimeImage::Png) => "image/png",
            Mime::Image(MimeImage::Tiff) => "image/tiff",
            Mime::Video(MimeVideo::Mp4) => "video/mp4",
            Mime::Video(MimeVideo::QuickTime) => "video/quicktime",
            Mime::Video(MimeVideo::_3gpp) => "video/3gpp",
            Mime::Video(MimeVideo::Webm) => "video/webm",
            Mime::Video(MimeVideo::Matroska) => "video/x-matroska",
        }
    }

    /// Extension used when the original filename supplies none. Image
    /// sources re-encode, so their extension follows the *output* codec
    /// (TIFF re-encodes as JPEG).
    pub(crate) fn output_extension(&self) -> &'static str {
        match self {
            Mime::Image(MimeImage::Png) => "png",
            Mime::Image(_) => "jpg",
            Mime::Video(MimeVideo::Webm) => "webm",
            Mime::Video(MimeVideo::Matroska) => "mkv",
            Mime::Video(MimeVideo::QuickTime) => "mov",
            Mime::Video(_) => "mp4",
        }
    }

    /// Whether the container-aware video strip path supports this source.
    /// Matroska-family sources fall back to a raw copy.
    pub(crate) fn supports_remux(&self) -> bool {
        matches!(
            self,
            Mime::Video(MimeVideo::Mp4) | Mime::Video(MimeVideo::QuickTime) | Mime::Video(MimeVideo::_3gpp)
        )
    }
}

impl TryFrom<&[u8]> for Mime {
    type Error = crate::Error;
    fn try_from(input: &[u8]) -> Result<Self, Self::Error> {
        if input.starts_with(PNG_SIGNATURE) {
            return Ok(Mime::Image(MimeImage::Png));
        }
        if matches!(input.get(..4), Some(b"II\x2a\x00") | Some(b"MM\x00\x2a")) {
            return Ok(Mime::Image(MimeImage::Tiff));
        }
        if jpeg::check_jpeg(input).is_ok() {
            return Ok(Mime::Image(MimeImage::Jpeg));
        }
        if let Some(mime) = sniff_bmff(input) {
            return Ok(Mime::Video(mime));
        }
        if input.starts_with(EBML_MAGIC) {
            // The doctype string sits inside the EBML header, within the
            // first few dozen bytes in practice.
            let head = &input[..input.len().min(128)];
            let mime = if head.find_substring(&b"webm"[..]).is_some() {
                MimeVideo::Webm
            } else {
                MimeVideo::Matroska
            };
            return Ok(Mime::Video(mime));
        }
        Err(crate::Error::UnrecognizedFileFormat)
    }
}

/// Recognize an ISO base media file by its `ftyp` box and brand tables.
fn sniff_bmff(input: &[u8]) -> Option<MimeVideo> {
    if input.len() < 12 || &input[4..8] != b"ftyp" {
        return None;
    }
    let box_size = u32::from_be_bytes(input[..4].try_into().unwrap()) as usize;
    if !(16..=256).contains(&box_size) || box_size % 4 != 0 {
        return None;
    }

    let classify = |brand: &[u8]| -> Option<MimeVideo> {
        let brand = std::str::from_utf8(brand).ok()?;
        if MP4_3GP_BRAND_NAMES.contains(&brand) {
            Some(MimeVideo::_3gpp)
        } else if QT_BRAND_NAMES.contains(&brand) {
            Some(MimeVideo::QuickTime)
        } else if MP4_BRAND_NAMES.contains(&brand) {
            Some(MimeVideo::Mp4)
        } else {
            None
        }
    };

    if let Some(mime) = classify(&input[8..12]) {
        return Some(mime);
    }

    // Fall back to the compatible-brands list.
    let end = box_size.min(input.len());
    input
        .get(16..end)
        .into_iter()
        .flat_map(|brands| brands.chunks_exact(4))
        .find_map(classify)
}

/// An opaque byte stream plus its sniffed kind and declared name.
///
/// Owned exclusively by one strip operation; nothing about it is retained
/// across operations.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub(crate) bytes: Bytes,
    pub(crate) mime: Mime,
    file_name: Option<String>,
}

impl MediaAsset {
    /// Build an asset from in-memory bytes. The declared MIME type is
    /// advisory; sniffing the leading bytes decides the strip path, and a
    /// mismatch is only logged.
    pub fn from_bytes(
        bytes: impl Into<Bytes>,
        declared_mime: Option<&str>,
        file_name: Option<&str>,
    ) -> crate::Result<Self> {
        let bytes = bytes.into();
        let mime = Mime::try_from(&bytes[..])?;
        if let Some(declared) = declared_mime {
            if declared != mime.mime_str() {
                tracing::debug!(declared, detected = mime.mime_str(), "declared MIME mismatch");
            }
        }
        Ok(Self {
            bytes,
            mime,
            file_name: file_name.map(|s| s.to_owned()),
        })
    }

    pub fn kind(&self) -> MediaKind {
        self.mime.kind()
    }

    pub fn mime(&self) -> &'static str {
        self.mime.mime_str()
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Extension for the output artifact: taken from the original filename
    /// when it has one, otherwise derived from the detected format
    /// (`jpg` for images, `mp4` for video, by default).
    pub(crate) fn output_extension(&self) -> String {
        match self.mime {
            // Image outputs are re-encoded, so the detected format wins
            // over whatever the filename claims.
            Mime::Image(_) => self.mime.output_extension().to_owned(),
            Mime::Video(_) => self
                .file_name
                .as_deref()
                .and_then(|n| n.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
                .filter(|ext| !ext.is_empty() && ext.len() <= 4)
                .unwrap_or_else(|| self.mime.output_extension().to_owned()),
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
