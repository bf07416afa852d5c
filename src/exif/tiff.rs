//! TIFF header and IFD walking. Read-only: the engine never edits tag data
//! in place, it reads entries and rebuilds outputs from scratch.

use std::collections::HashSet;

use nom::number::{complete, Endianness};
use nom::sequence::tuple;

use crate::tags::{ExifTag, IfdKind};
use crate::values::{get_cstr, read_u16, read_u32, EntryValue, Rational};

use super::TagEntry;

/// Bytes of an entry kept when the value kind is opaque. Enough for display
/// and signature checks; huge blobs (maker notes) are not worth copying.
const MAX_OPAQUE_BYTES: usize = 64;

const ENTRY_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TiffHeader {
    pub endian: Endianness,
    pub ifd0_offset: u32,
}

impl TiffHeader {
    pub(crate) fn parse(input: &[u8]) -> crate::Result<TiffHeader> {
        let (remain, endian) = TiffHeader::parse_endian(input)?;
        let (_, (magic, offset)) = match endian {
            Endianness::Big => tuple((complete::be_u16, complete::be_u32))(remain)?,
            Endianness::Little => tuple((complete::le_u16, complete::le_u32))(remain)?,
            Endianness::Native => unreachable!(),
        };

        if magic != 0x2a {
            return Err("invalid TIFF header magic".into());
        }
        Ok(TiffHeader {
            endian,
            ifd0_offset: offset,
        })
    }

    fn parse_endian(input: &[u8]) -> crate::Result<(&[u8], Endianness)> {
        match input.get(..2) {
            Some(b"MM") => Ok((&input[2..], Endianness::Big)),
            Some(b"II") => Ok((&input[2..], Endianness::Little)),
            _ => Err("unrecognized TIFF byte order".into()),
        }
    }
}

/// Parse every tag entry reachable from a TIFF payload: IFD0, the Exif and
/// GPS sub-directories, and IFD1 (the thumbnail directory).
///
/// Hardened for hostile input: all offsets are bounds-checked against the
/// payload, directory offsets are cycle-checked, and a malformed entry
/// degrades to a value-less [`TagEntry`] instead of aborting the walk.
pub(crate) fn parse_tag_entries(payload: &[u8]) -> crate::Result<Vec<TagEntry>> {
    let header = TiffHeader::parse(payload)?;
    let mut entries = Vec::new();
    let mut visited = HashSet::new();

    let next = walk_ifd(
        payload,
        header.ifd0_offset,
        header.endian,
        IfdKind::Primary,
        &mut entries,
        &mut visited,
    )?;

    // Sub-directories are located by pointer tags in IFD0/Exif.
    let sub_dirs: Vec<(u16, IfdKind)> = vec![
        (ExifTag::ExifOffset.code(), IfdKind::Exif),
        (ExifTag::GpsInfo.code(), IfdKind::Gps),
    ];
    for (pointer_code, kind) in sub_dirs {
        let offset = entries
            .iter()
            .find(|e| e.code == pointer_code && matches!(e.ifd, IfdKind::Primary | IfdKind::Exif))
            .and_then(|e| e.value.as_ref())
            .and_then(|v| match v {
                EntryValue::U32(o) => Some(*o),
                EntryValue::U16(o) => Some(*o as u32),
                _ => None,
            });
        if let Some(offset) = offset {
            // A broken sub-directory shouldn't hide the rest of the tags.
            if let Err(e) = walk_ifd(payload, offset, header.endian, kind, &mut entries, &mut visited)
            {
                tracing::warn!(?kind, "sub-directory walk failed: {e}");
            }
        }
    }

    if let Some(ifd1_offset) = next {
        if ifd1_offset != 0 {
            if let Err(e) = walk_ifd(
                payload,
                ifd1_offset,
                header.endian,
                IfdKind::Thumbnail,
                &mut entries,
                &mut visited,
            ) {
                tracing::warn!("thumbnail directory walk failed: {e}");
            }
        }
    }

    Ok(entries)
}

/// Walk a single IFD, appending entries. Returns the next-IFD offset when
/// the directory carries one.
fn walk_ifd(
    payload: &[u8],
    offset: u32,
    endian: Endianness,
    kind: IfdKind,
    entries: &mut Vec<TagEntry>,
    visited: &mut HashSet<u32>,
) -> crate::Result<Option<u32>> {
    if !visited.insert(offset) {
        return Err("directory offset cycle".into());
    }

    let offset = offset as usize;
    let count =
        read_u16(payload.get(offset..).ok_or("directory offset out of range")?, endian)
            .ok_or("directory entry count out of range")? as usize;

    let body = payload
        .get(offset + 2..)
        .ok_or("directory body out of range")?;
    if body.len() < count * ENTRY_SIZE {
        return Err("directory is truncated".into());
    }

    tracing::debug!(?kind, count, "walking directory");

    for i in 0..count {
        let raw = &body[i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE];
        let code = read_u16(raw, endian).unwrap();
        let format = read_u16(&raw[2..], endian).unwrap();
        let components = read_u32(&raw[4..], endian).unwrap();
        let value = parse_value(payload, endian, format, components, &raw[8..12]);
        if value.is_none() {
            tracing::debug!(code, format, components, "entry value unreadable");
        }
        entries.push(TagEntry { ifd: kind, code, value });
    }

    let next = read_u32(&body[count * ENTRY_SIZE..], endian);
    Ok(next)
}

fn component_size(format: u16) -> Option<usize> {
    match format {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

/// Decode one entry value. The inline field holds the value itself when it
/// fits in four bytes, otherwise an offset into the payload.
fn parse_value(
    payload: &[u8],
    endian: Endianness,
    format: u16,
    components: u32,
    inline: &[u8],
) -> Option<EntryValue> {
    let size = component_size(format)?.checked_mul(components as usize)?;
    if size == 0 || size > payload.len() {
        return None;
    }

    let data: &[u8] = if size <= 4 {
        &inline[..size]
    } else {
        let offset = read_u32(inline, endian)? as usize;
        payload.get(offset..offset.checked_add(size)?)?
    };

    let value = match format {
        1 => EntryValue::U8(data[0]),
        2 => EntryValue::Text(get_cstr(data)),
        3 if components == 1 => EntryValue::U16(read_u16(data, endian)?),
        4 if components == 1 => EntryValue::U32(read_u32(data, endian)?),
        5 => {
            let mut rationals = Vec::with_capacity(components as usize);
            for chunk in data.chunks_exact(8) {
                rationals.push(Rational(
                    read_u32(chunk, endian)?,
                    read_u32(&chunk[4..], endian)?,
                ));
            }
            if rationals.len() == 1 {
                EntryValue::URational(rationals[0])
            } else {
                EntryValue::URationalArray(rationals)
            }
        }
        10 if components == 1 => EntryValue::IRational(Rational(
            read_u32(data, endian)? as i32,
            read_u32(&data[4..], endian)? as i32,
        )),
        _ => EntryValue::Undefined(data.iter().copied().take(MAX_OPAQUE_BYTES).collect()),
    };
    Some(value)
}
