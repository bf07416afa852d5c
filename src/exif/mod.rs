//! Tag-level reading and minimal write-back for TIFF-structured metadata
//! (JPEG APP1 payloads, PNG `eXIf` chunks, bare TIFF files).

mod tiff;
mod writer;

use std::collections::BTreeMap;

use crate::tags::{classify, IfdKind, TagPolicy};
use crate::values::EntryValue;

pub(crate) use tiff::{parse_tag_entries, TiffHeader};

/// One tag read from a source, with the directory it came from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TagEntry {
    pub ifd: IfdKind,
    pub code: u16,
    /// `None` when the raw value was malformed; presence still counts for
    /// classification and verification.
    pub value: Option<EntryValue>,
}

impl TagEntry {
    /// Directory-aware policy: only primary-directory tags can ever be
    /// preserved. GPS and thumbnail directories are stripped wholesale.
    pub(crate) fn policy(&self) -> TagPolicy {
        match self.ifd {
            IfdKind::Primary | IfdKind::Exif => classify(self.code),
            IfdKind::Gps | IfdKind::Thumbnail => TagPolicy::Strip,
        }
    }
}

/// The tags carried from the read phase to the write phase of a single
/// operation. Returned by value and threaded explicitly; nothing is shared
/// across operations.
#[derive(Debug, Default)]
pub struct PreservedAttributeSet {
    entries: BTreeMap<u16, EntryValue>,
}

impl PreservedAttributeSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn orientation(&self) -> Option<u16> {
        self.entries
            .get(&crate::ExifTag::Orientation.code())
            .and_then(|v| v.as_u16())
    }

    pub(crate) fn insert(&mut self, code: u16, value: EntryValue) {
        self.entries.insert(code, value);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&u16, &EntryValue)> {
        self.entries.iter()
    }

    /// Serialize as a standalone little-endian TIFF block, or `None` when
    /// there is nothing to write (a valid state: the output then carries no
    /// metadata at all).
    pub(crate) fn to_tiff(&self) -> Option<Vec<u8>> {
        writer::build_tiff(self)
    }
}

/// Run the allow-list over parsed entries. This is the whole of the "keep"
/// decision: everything not collected here is discarded by re-encoding.
/// A preserved value that does not validate for its tag is dropped, not
/// carried — the write side only ever gets well-formed values.
pub(crate) fn collect_preserved(entries: &[TagEntry]) -> PreservedAttributeSet {
    let mut set = PreservedAttributeSet::default();
    for entry in entries {
        if entry.policy() != TagPolicy::Preserve {
            continue;
        }
        let Some(value) = &entry.value else {
            tracing::warn!(code = entry.code, "preserved tag has unreadable value, dropping");
            continue;
        };
        if entry.code == crate::ExifTag::Orientation.code() {
            let valid = value
                .as_u16()
                .and_then(|v| crate::Orientation::try_from(v).ok());
            if valid.is_none() {
                tracing::warn!(%value, "orientation value out of range, dropping");
                continue;
            }
        }
        set.insert(entry.code, value.clone());
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::ExifTag;

    #[test]
    fn preserved_set_keeps_orientation_only() {
        let entries = vec![
            TagEntry {
                ifd: IfdKind::Primary,
                code: ExifTag::Orientation.code(),
                value: Some(6u16.into()),
            },
            TagEntry {
                ifd: IfdKind::Primary,
                code: ExifTag::Make.code(),
                value: Some("Acme".into()),
            },
            TagEntry {
                ifd: IfdKind::Gps,
                code: crate::tags::GpsTag::GPSLatitude.code(),
                value: None,
            },
        ];

        let set = collect_preserved(&entries);
        assert_eq!(set.len(), 1);
        assert_eq!(set.orientation(), Some(6));
    }

    #[test]
    fn out_of_range_orientation_is_dropped() {
        let entries = vec![TagEntry {
            ifd: IfdKind::Primary,
            code: ExifTag::Orientation.code(),
            value: Some(9u16.into()),
        }];
        assert!(collect_preserved(&entries).is_empty());
    }

    #[test]
    fn empty_set_is_valid_and_writes_nothing() {
        let set = collect_preserved(&[]);
        assert!(set.is_empty());
        assert!(set.to_tiff().is_none());
    }

    #[test]
    fn gps_directory_never_preserves() {
        // Code 0x0002 is GPSLatitude in the GPS directory; make sure the
        // directory context forces Strip even for low codes.
        let entry = TagEntry {
            ifd: IfdKind::Gps,
            code: 0x0002,
            value: Some((39u32, 1u32).into()),
        };
        assert_eq!(entry.policy(), TagPolicy::Strip);
    }
}
