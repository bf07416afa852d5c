use std::io;
use thiserror::Error;

type FallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by the stripping engine.
///
/// Verification findings are *not* errors: they are carried in
/// [`VerificationReport`](crate::VerificationReport) so that callers can
/// decide whether to accept a best-effort artifact. Likewise, a degraded
/// remux is reported via [`StripMode`](crate::StripMode), not here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("file too large; {size} bytes exceeds the {limit} bytes ceiling")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("source unreadable; {0}")]
    UnreadableSource(FallbackError),

    #[error("decode failed; {0}")]
    DecodeFailed(FallbackError),

    #[error("container has no video track")]
    NoVideoTrack,

    #[error("sink creation failed; {0}")]
    SinkCreationFailed(FallbackError),

    #[error("write failed; {0}")]
    WriteFailed(FallbackError),

    #[error("parse failed; {0}")]
    ParseFailed(FallbackError),

    /// A rational coordinate string is not three `numerator/denominator`
    /// pairs.
    #[error("malformed coordinate; {0}")]
    Format(String),

    /// A rational coordinate part has a zero denominator.
    #[error("coordinate arithmetic failed; {0}")]
    Arithmetic(String),

    #[error("unrecognized file format")]
    UnrecognizedFileFormat,
}

use Error::*;

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        UnreadableSource(value.into())
    }
}

impl From<String> for Error {
    fn from(src: String) -> Error {
        ParseFailed(src.into())
    }
}

impl From<&str> for Error {
    fn from(src: &str) -> Error {
        src.to_string().into()
    }
}

impl From<image::ImageError> for Error {
    fn from(value: image::ImageError) -> Self {
        DecodeFailed(value.into())
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for crate::Error {
    fn from(e: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        convert_parse_error(e, "")
    }
}

pub(crate) fn convert_parse_error(e: nom::Err<nom::error::Error<&[u8]>>, message: &str) -> Error {
    let s = match e {
        nom::Err::Incomplete(_) => format!("{e}; {message}"),
        nom::Err::Error(e) => format!("{}; {message}", e.code.description()),
        nom::Err::Failure(e) => format!("{}; {message}", e.code.description()),
    };

    s.into()
}

/// Shorthand used at write sites, where an `io::Error` means the output
/// could not be produced rather than the input could not be read.
pub(crate) fn write_failed(e: io::Error) -> Error {
    WriteFailed(e.into())
}
