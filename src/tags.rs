//! Compiled tag dictionary: every known image tag mapped to a retention
//! policy. The preserve set is an allow-list; anything unrecognized is
//! stripped.

use std::fmt::Display;

#[cfg(feature = "json_dump")]
use serde::{Deserialize, Serialize};

/// Retention policy for a single tag.
#[cfg_attr(feature = "json_dump", derive(Serialize, Deserialize))]
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum TagPolicy {
    /// Playback-essential, written back into the output.
    Preserve,
    /// Dropped. Unknown tags always land here.
    Strip,
}

/// Which directory a tag was read from. Low GPS tag codes overlap the
/// primary numbering, so resolution needs the directory context.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub(crate) enum IfdKind {
    Primary,
    Exif,
    Gps,
    Thumbnail,
}

/// Recognized image tags, compiled from the Exif 2.32 field listing.
///
/// The table exists so the allow-list can be audited as pure data; parsing
/// does not depend on a tag being listed here.
#[cfg_attr(feature = "json_dump", derive(Serialize, Deserialize))]
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy)]
pub enum ExifTag {
    ImageWidth = 0x0000_0100,
    ImageHeight = 0x0000_0101,
    BitsPerSample = 0x0000_0102,
    Compression = 0x0000_0103,
    PhotometricInterpretation = 0x0000_0106,
    ImageDescription = 0x0000_010e,
    Make = 0x0000_010f,
    Model = 0x0000_0110,
    Orientation = 0x0000_0112,
    SamplesPerPixel = 0x0000_0115,
    XResolution = 0x0000_011a,
    YResolution = 0x0000_011b,
    ResolutionUnit = 0x0000_0128,
    Software = 0x0000_0131,
    ModifyDate = 0x0000_0132,
    Artist = 0x0000_013b,
    HostComputer = 0x0000_013c,
    WhitePoint = 0x0000_013e,
    ThumbnailOffset = 0x0000_0201,
    ThumbnailLength = 0x0000_0202,
    YCbCrCoefficients = 0x0000_0211,
    YCbCrPositioning = 0x0000_0213,
    ReferenceBlackWhite = 0x0000_0214,
    Copyright = 0x0000_8298,
    ExposureTime = 0x0000_829a,
    FNumber = 0x0000_829d,
    ExifOffset = 0x0000_8769,
    ExposureProgram = 0x0000_8822,
    GpsInfo = 0x0000_8825,
    ISOSpeedRatings = 0x0000_8827,
    SensitivityType = 0x0000_8830,
    ExifVersion = 0x0000_9000,
    DateTimeOriginal = 0x0000_9003,
    CreateDate = 0x0000_9004,
    OffsetTime = 0x0000_9010,
    OffsetTimeOriginal = 0x0000_9011,
    OffsetTimeDigitized = 0x0000_9012,
    ComponentsConfiguration = 0x0000_9101,
    ShutterSpeedValue = 0x0000_9201,
    ApertureValue = 0x0000_9202,
    BrightnessValue = 0x0000_9203,
    ExposureBiasValue = 0x0000_9204,
    MaxApertureValue = 0x0000_9205,
    SubjectDistance = 0x0000_9206,
    MeteringMode = 0x0000_9207,
    LightSource = 0x0000_9208,
    Flash = 0x0000_9209,
    FocalLength = 0x0000_920a,
    SubjectArea = 0x0000_9214,
    MakerNote = 0x0000_927c,
    UserComment = 0x0000_9286,
    SubSecTime = 0x0000_9290,
    SubSecTimeOriginal = 0x0000_9291,
    SubSecTimeDigitized = 0x0000_9292,
    FlashPixVersion = 0x0000_a000,
    ColorSpace = 0x0000_a001,
    ExifImageWidth = 0x0000_a002,
    ExifImageHeight = 0x0000_a003,
    InteropOffset = 0x0000_a005,
    FocalPlaneXResolution = 0x0000_a20e,
    FocalPlaneYResolution = 0x0000_a20f,
    FocalPlaneResolutionUnit = 0x0000_a210,
    SensingMethod = 0x0000_a217,
    FileSource = 0x0000_a300,
    SceneType = 0x0000_a301,
    CustomRendered = 0x0000_a401,
    ExposureMode = 0x0000_a402,
    WhiteBalanceMode = 0x0000_a403,
    DigitalZoomRatio = 0x0000_a404,
    FocalLengthIn35mmFilm = 0x0000_a405,
    SceneCaptureType = 0x0000_a406,
    GainControl = 0x0000_a407,
    Contrast = 0x0000_a408,
    Saturation = 0x0000_a409,
    Sharpness = 0x0000_a40a,
    SubjectDistanceRange = 0x0000_a40c,
    ImageUniqueID = 0x0000_a420,
    OwnerName = 0x0000_a430,
    SerialNumber = 0x0000_a431,
    LensSpecification = 0x0000_a432,
    LensMake = 0x0000_a433,
    LensModel = 0x0000_a434,
    LensSerialNumber = 0x0000_a435,
    Gamma = 0x0000_a500,
}

/// GPS directory tags. These share low numeric codes with nothing in the
/// primary directory that this engine cares about, but they are kept as a
/// separate enum so resolution is always directory-aware.
#[cfg_attr(feature = "json_dump", derive(Serialize, Deserialize))]
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy)]
pub enum GpsTag {
    GPSVersionID = 0x0000,
    GPSLatitudeRef = 0x0001,
    GPSLatitude = 0x0002,
    GPSLongitudeRef = 0x0003,
    GPSLongitude = 0x0004,
    GPSAltitudeRef = 0x0005,
    GPSAltitude = 0x0006,
    GPSTimeStamp = 0x0007,
    GPSSatellites = 0x0008,
    GPSStatus = 0x0009,
    GPSMeasureMode = 0x000a,
    GPSDOP = 0x000b,
    GPSSpeedRef = 0x000c,
    GPSSpeed = 0x000d,
    GPSTrackRef = 0x000e,
    GPSTrack = 0x000f,
    GPSImgDirectionRef = 0x0010,
    GPSImgDirection = 0x0011,
    GPSMapDatum = 0x0012,
    GPSDestLatitudeRef = 0x0013,
    GPSDestLatitude = 0x0014,
    GPSDestLongitudeRef = 0x0015,
    GPSDestLongitude = 0x0016,
    GPSDestBearingRef = 0x0017,
    GPSDestBearing = 0x0018,
    GPSDestDistanceRef = 0x0019,
    GPSDestDistance = 0x001a,
    GPSProcessingMethod = 0x001b,
    GPSAreaInformation = 0x001c,
    GPSDateStamp = 0x001d,
    GPSDifferential = 0x001e,
    GPSHPositioningError = 0x001f,
}

impl ExifTag {
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// The allow-list. Only `Orientation` survives: the re-encoded pixel
    /// buffer already carries true dimensions, so dimensional, resolution
    /// and color-space tags are droppable without breaking rendering.
    pub const fn policy(self) -> TagPolicy {
        match self {
            ExifTag::Orientation => TagPolicy::Preserve,
            _ => TagPolicy::Strip,
        }
    }

    /// Tags whose presence in an output artifact fails verification:
    /// calendar time, device identity, authorship, free text, and the
    /// embedded thumbnail (which can carry all of the above).
    pub(crate) const fn high_risk(self) -> bool {
        matches!(
            self,
            ExifTag::DateTimeOriginal
                | ExifTag::CreateDate
                | ExifTag::ModifyDate
                | ExifTag::OffsetTime
                | ExifTag::OffsetTimeOriginal
                | ExifTag::OffsetTimeDigitized
                | ExifTag::SubSecTime
                | ExifTag::SubSecTimeOriginal
                | ExifTag::SubSecTimeDigitized
                | ExifTag::Make
                | ExifTag::Model
                | ExifTag::Software
                | ExifTag::HostComputer
                | ExifTag::Artist
                | ExifTag::Copyright
                | ExifTag::ImageDescription
                | ExifTag::UserComment
                | ExifTag::MakerNote
                | ExifTag::OwnerName
                | ExifTag::SerialNumber
                | ExifTag::LensSerialNumber
                | ExifTag::ImageUniqueID
                | ExifTag::GpsInfo
                | ExifTag::ThumbnailOffset
                | ExifTag::ThumbnailLength
        )
    }
}

impl GpsTag {
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// Classify a tag identifier from the primary/Exif numbering.
///
/// Pure function over the compiled table. Unrecognized identifiers are
/// `Strip`, never an error: unknown data is the most dangerous to retain.
pub fn classify(code: u16) -> TagPolicy {
    match ExifTag::try_from(code) {
        Ok(tag) => tag.policy(),
        Err(_) => TagPolicy::Strip,
    }
}

impl Display for ExifTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: &str = (*self).into();
        s.fmt(f)
    }
}

impl Display for GpsTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: &str = (*self).into();
        s.fmt(f)
    }
}

impl From<ExifTag> for &str {
    fn from(value: ExifTag) -> Self {
        match value {
            ExifTag::ImageWidth => "ImageWidth",
            ExifTag::ImageHeight => "ImageHeight",
            ExifTag::BitsPerSample => "BitsPerSample",
            ExifTag::Compression => "Compression",
            ExifTag::PhotometricInterpretation => "PhotometricInterpretation",
            ExifTag::ImageDescription => "ImageDescription",
            ExifTag::Make => "Make",
            ExifTag::Model => "Model",
            ExifTag::Orientation => "Orientation",
            ExifTag::SamplesPerPixel => "SamplesPerPixel",
            ExifTag::XResolution => "XResolution",
            ExifTag::YResolution => "YResolution",
            ExifTag::ResolutionUnit => "ResolutionUnit",
            ExifTag::Software => "Software",
            ExifTag::ModifyDate => "ModifyDate",
            ExifTag::Artist => "Artist",
            ExifTag::HostComputer => "HostComputer",
            ExifTag::WhitePoint => "WhitePoint",
            ExifTag::ThumbnailOffset => "ThumbnailOffset",
            ExifTag::ThumbnailLength => "ThumbnailLength",
            ExifTag::YCbCrCoefficients => "YCbCrCoefficients",
            ExifTag::YCbCrPositioning => "YCbCrPositioning",
            ExifTag::ReferenceBlackWhite => "ReferenceBlackWhite",
            ExifTag::Copyright => "Copyright",
            ExifTag::ExposureTime => "ExposureTime",
            ExifTag::FNumber => "FNumber",
            ExifTag::ExifOffset => "ExifOffset",
            ExifTag::ExposureProgram => "ExposureProgram",
            ExifTag::GpsInfo => "GPSInfo",
            ExifTag::ISOSpeedRatings => "ISOSpeedRatings",
            ExifTag::SensitivityType => "SensitivityType",
            ExifTag::ExifVersion => "ExifVersion",
            ExifTag::DateTimeOriginal => "DateTimeOriginal",
            ExifTag::CreateDate => "CreateDate",
            ExifTag::OffsetTime => "OffsetTime",
            ExifTag::OffsetTimeOriginal => "OffsetTimeOriginal",
            ExifTag::OffsetTimeDigitized => "OffsetTimeDigitized",
            ExifTag::ComponentsConfiguration => "ComponentsConfiguration",
            ExifTag::ShutterSpeedValue => "ShutterSpeedValue",
            ExifTag::ApertureValue => "ApertureValue",
            ExifTag::BrightnessValue => "BrightnessValue",
            ExifTag::ExposureBiasValue => "ExposureBiasValue",
            ExifTag::MaxApertureValue => "MaxApertureValue",
            ExifTag::SubjectDistance => "SubjectDistance",
            ExifTag::MeteringMode => "MeteringMode",
            ExifTag::LightSource => "LightSource",
            ExifTag::Flash => "Flash",
            ExifTag::FocalLength => "FocalLength",
            ExifTag::SubjectArea => "SubjectArea",
            ExifTag::MakerNote => "MakerNote",
            ExifTag::UserComment => "UserComment",
            ExifTag::SubSecTime => "SubSecTime",
            ExifTag::SubSecTimeOriginal => "SubSecTimeOriginal",
            ExifTag::SubSecTimeDigitized => "SubSecTimeDigitized",
            ExifTag::FlashPixVersion => "FlashPixVersion",
            ExifTag::ColorSpace => "ColorSpace",
            ExifTag::ExifImageWidth => "ExifImageWidth",
            ExifTag::ExifImageHeight => "ExifImageHeight",
            ExifTag::InteropOffset => "InteropOffset",
            ExifTag::FocalPlaneXResolution => "FocalPlaneXResolution",
            ExifTag::FocalPlaneYResolution => "FocalPlaneYResolution",
            ExifTag::FocalPlaneResolutionUnit => "FocalPlaneResolutionUnit",
            ExifTag::SensingMethod => "SensingMethod",
            ExifTag::FileSource => "FileSource",
            ExifTag::SceneType => "SceneType",
            ExifTag::CustomRendered => "CustomRendered",
            ExifTag::ExposureMode => "ExposureMode",
            ExifTag::WhiteBalanceMode => "WhiteBalanceMode",
            ExifTag::DigitalZoomRatio => "DigitalZoomRatio",
            ExifTag::FocalLengthIn35mmFilm => "FocalLengthIn35mmFilm",
            ExifTag::SceneCaptureType => "SceneCaptureType",
            ExifTag::GainControl => "GainControl",
            ExifTag::Contrast => "Contrast",
            ExifTag::Saturation => "Saturation",
            ExifTag::Sharpness => "Sharpness",
            ExifTag::SubjectDistanceRange => "SubjectDistanceRange",
            ExifTag::ImageUniqueID => "ImageUniqueID",
            ExifTag::OwnerName => "OwnerName",
            ExifTag::SerialNumber => "SerialNumber",
            ExifTag::LensSpecification => "LensSpecification",
            ExifTag::LensMake => "LensMake",
            ExifTag::LensModel => "LensModel",
            ExifTag::LensSerialNumber => "LensSerialNumber",
            ExifTag::Gamma => "Gamma",
        }
    }
}

impl From<GpsTag> for &str {
    fn from(value: GpsTag) -> Self {
        match value {
            GpsTag::GPSVersionID => "GPSVersionID",
            GpsTag::GPSLatitudeRef => "GPSLatitudeRef",
            GpsTag::GPSLatitude => "GPSLatitude",
            GpsTag::GPSLongitudeRef => "GPSLongitudeRef",
            GpsTag::GPSLongitude => "GPSLongitude",
            GpsTag::GPSAltitudeRef => "GPSAltitudeRef",
            GpsTag::GPSAltitude => "GPSAltitude",
            GpsTag::GPSTimeStamp => "GPSTimeStamp",
            GpsTag::GPSSatellites => "GPSSatellites",
            GpsTag::GPSStatus => "GPSStatus",
            GpsTag::GPSMeasureMode => "GPSMeasureMode",
            GpsTag::GPSDOP => "GPSDOP",
            GpsTag::GPSSpeedRef => "GPSSpeedRef",
            GpsTag::GPSSpeed => "GPSSpeed",
            GpsTag::GPSTrackRef => "GPSTrackRef",
            GpsTag::GPSTrack => "GPSTrack",
            GpsTag::GPSImgDirectionRef => "GPSImgDirectionRef",
            GpsTag::GPSImgDirection => "GPSImgDirection",
            GpsTag::GPSMapDatum => "GPSMapDatum",
            GpsTag::GPSDestLatitudeRef => "GPSDestLatitudeRef",
            GpsTag::GPSDestLatitude => "GPSDestLatitude",
            GpsTag::GPSDestLongitudeRef => "GPSDestLongitudeRef",
            GpsTag::GPSDestLongitude => "GPSDestLongitude",
            GpsTag::GPSDestBearingRef => "GPSDestBearingRef",
            GpsTag::GPSDestBearing => "GPSDestBearing",
            GpsTag::GPSDestDistanceRef => "GPSDestDistanceRef",
            GpsTag::GPSDestDistance => "GPSDestDistance",
            GpsTag::GPSProcessingMethod => "GPSProcessingMethod",
            GpsTag::GPSAreaInformation => "GPSAreaInformation",
            GpsTag::GPSDateStamp => "GPSDateStamp",
            GpsTag::GPSDifferential => "GPSDifferential",
            GpsTag::GPSHPositioningError => "GPSHPositioningError",
        }
    }
}

impl TryFrom<u16> for ExifTag {
    type Error = crate::Error;
    fn try_from(v: u16) -> Result<Self, Self::Error> {
        ALL_TAGS
            .iter()
            .find(|t| t.code() == v)
            .copied()
            .ok_or_else(|| format!("unrecognized tag 0x{v:04x}").into())
    }
}

impl TryFrom<u16> for GpsTag {
    type Error = crate::Error;
    fn try_from(v: u16) -> Result<Self, Self::Error> {
        ALL_GPS_TAGS
            .iter()
            .find(|t| t.code() == v)
            .copied()
            .ok_or_else(|| format!("unrecognized GPS tag 0x{v:04x}").into())
    }
}

/// Display transform encoded by the orientation tag, the one value the
/// engine writes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal = 1,
    MirrorHorizontal = 2,
    Rotate180 = 3,
    MirrorVertical = 4,
    MirrorHorizontalRotate270 = 5,
    Rotate90 = 6,
    MirrorHorizontalRotate90 = 7,
    Rotate270 = 8,
}

impl Orientation {
    pub const fn value(self) -> u16 {
        self as u16
    }

    /// Clockwise rotation the viewer must apply.
    pub const fn degrees(self) -> u16 {
        match self {
            Orientation::Horizontal | Orientation::MirrorHorizontal => 0,
            Orientation::Rotate180 | Orientation::MirrorVertical => 180,
            Orientation::Rotate90 | Orientation::MirrorHorizontalRotate90 => 90,
            Orientation::Rotate270 | Orientation::MirrorHorizontalRotate270 => 270,
        }
    }

    pub const fn mirrored(self) -> bool {
        matches!(
            self,
            Orientation::MirrorHorizontal
                | Orientation::MirrorVertical
                | Orientation::MirrorHorizontalRotate270
                | Orientation::MirrorHorizontalRotate90
        )
    }
}

impl TryFrom<u16> for Orientation {
    type Error = crate::Error;
    fn try_from(v: u16) -> Result<Self, Self::Error> {
        let o = match v {
            1 => Orientation::Horizontal,
            2 => Orientation::MirrorHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::MirrorVertical,
            5 => Orientation::MirrorHorizontalRotate270,
            6 => Orientation::Rotate90,
            7 => Orientation::MirrorHorizontalRotate90,
            8 => Orientation::Rotate270,
            o => return Err(format!("orientation value {o} out of range").into()),
        };
        Ok(o)
    }
}

/// Render a tag code as a display name, directory-aware.
pub(crate) fn tag_name(code: u16, ifd: IfdKind) -> String {
    match ifd {
        IfdKind::Gps => match GpsTag::try_from(code) {
            Ok(t) => t.to_string(),
            Err(_) => format!("Unrecognized(GPS:0x{code:04x})"),
        },
        _ => match ExifTag::try_from(code) {
            Ok(t) => t.to_string(),
            Err(_) => format!("Unrecognized(0x{code:04x})"),
        },
    }
}

pub(crate) const ALL_TAGS: &[ExifTag] = &[
    ExifTag::ImageWidth,
    ExifTag::ImageHeight,
    ExifTag::BitsPerSample,
    ExifTag::Compression,
    ExifTag::PhotometricInterpretation,
    ExifTag::ImageDescription,
    ExifTag::Make,
    ExifTag::Model,
    ExifTag::Orientation,
    ExifTag::SamplesPerPixel,
    ExifTag::XResolution,
    ExifTag::YResolution,
    ExifTag::ResolutionUnit,
    ExifTag::Software,
    ExifTag::ModifyDate,
    ExifTag::Artist,
    ExifTag::HostComputer,
    ExifTag::WhitePoint,
    ExifTag::ThumbnailOffset,
    ExifTag::ThumbnailLength,
    ExifTag::YCbCrCoefficients,
    ExifTag::YCbCrPositioning,
    ExifTag::ReferenceBlackWhite,
    ExifTag::Copyright,
    ExifTag::ExposureTime,
    ExifTag::FNumber,
    ExifTag::ExifOffset,
    ExifTag::ExposureProgram,
    ExifTag::GpsInfo,
    ExifTag::ISOSpeedRatings,
    ExifTag::SensitivityType,
    ExifTag::ExifVersion,
    ExifTag::DateTimeOriginal,
    ExifTag::CreateDate,
    ExifTag::OffsetTime,
    ExifTag::OffsetTimeOriginal,
    ExifTag::OffsetTimeDigitized,
    ExifTag::ComponentsConfiguration,
    ExifTag::ShutterSpeedValue,
    ExifTag::ApertureValue,
    ExifTag::BrightnessValue,
    ExifTag::ExposureBiasValue,
    ExifTag::MaxApertureValue,
    ExifTag::SubjectDistance,
    ExifTag::MeteringMode,
    ExifTag::LightSource,
    ExifTag::Flash,
    ExifTag::FocalLength,
    ExifTag::SubjectArea,
    ExifTag::MakerNote,
    ExifTag::UserComment,
    ExifTag::SubSecTime,
    ExifTag::SubSecTimeOriginal,
    ExifTag::SubSecTimeDigitized,
    ExifTag::FlashPixVersion,
    ExifTag::ColorSpace,
    ExifTag::ExifImageWidth,
    ExifTag::ExifImageHeight,
    ExifTag::InteropOffset,
    ExifTag::FocalPlaneXResolution,
    ExifTag::FocalPlaneYResolution,
    ExifTag::FocalPlaneResolutionUnit,
    ExifTag::SensingMethod,
    ExifTag::FileSource,
    ExifTag::SceneType,
    ExifTag::CustomRendered,
    ExifTag::ExposureMode,
    ExifTag::WhiteBalanceMode,
    ExifTag::DigitalZoomRatio,
    ExifTag::FocalLengthIn35mmFilm,
    ExifTag::SceneCaptureType,
    ExifTag::GainControl,
    ExifTag::Contrast,
    ExifTag::Saturation,
    ExifTag::Sharpness,
    ExifTag::SubjectDistanceRange,
    ExifTag::ImageUniqueID,
    ExifTag::OwnerName,
    ExifTag::SerialNumber,
    ExifTag::LensSpecification,
    ExifTag::LensMake,
    ExifTag::LensModel,
    ExifTag::LensSerialNumber,
    ExifTag::Gamma,
];

pub(crate) const ALL_GPS_TAGS: &[GpsTag] = &[
    GpsTag::GPSVersionID,
    GpsTag::GPSLatitudeRef,
    GpsTag::GPSLatitude,
    GpsTag::GPSLongitudeRef,
    GpsTag::GPSLongitude,
    GpsTag::GPSAltitudeRef,
    GpsTag::GPSAltitude,
    GpsTag::GPSTimeStamp,
    GpsTag::GPSSatellites,
    GpsTag::GPSStatus,
    GpsTag::GPSMeasureMode,
    GpsTag::GPSDOP,
    GpsTag::GPSSpeedRef,
    GpsTag::GPSSpeed,
    GpsTag::GPSTrackRef,
    GpsTag::GPSTrack,
    GpsTag::GPSImgDirectionRef,
    GpsTag::GPSImgDirection,
    GpsTag::GPSMapDatum,
    GpsTag::GPSDestLatitudeRef,
    GpsTag::GPSDestLatitude,
    GpsTag::GPSDestLongitudeRef,
    GpsTag::GPSDestLongitude,
    GpsTag::GPSDestBearingRef,
    GpsTag::GPSDestBearing,
    GpsTag::GPSDestDistanceRef,
    GpsTag::GPSDestDistance,
    GpsTag::GPSProcessingMethod,
    GpsTag::GPSAreaInformation,
    GpsTag::GPSDateStamp,
    GpsTag::GPSDifferential,
    GpsTag::GPSHPositioningError,
];
