//! Minimal TIFF serialization for the preserved set.
//!
//! The output is a single little-endian IFD whose values all fit inline,
//! which holds for every tag the allow-list can produce. There is no
//! support for offset-addressed values on purpose: the write side should
//! never grow the ability to carry blobs.

use crate::values::EntryValue;

use super::PreservedAttributeSet;

const ENTRY_SIZE: usize = 12;

/// Serialize the preserved set, or `None` when it is empty.
pub(super) fn build_tiff(set: &PreservedAttributeSet) -> Option<Vec<u8>> {
    let writable: Vec<(u16, u16, [u8; 4])> = set
        .iter()
        .filter_map(|(code, value)| encode_inline(value).map(|(fmt, raw)| (*code, fmt, raw)))
        .collect();

    if writable.is_empty() {
        return None;
    }

    let mut out = Vec::with_capacity(8 + 2 + writable.len() * ENTRY_SIZE + 4);
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes()); // IFD0 directly after header

    out.extend_from_slice(&(writable.len() as u16).to_le_bytes());
    for (code, format, raw) in &writable {
        out.extend_from_slice(&code.to_le_bytes());
        out.extend_from_slice(&format.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(raw);
    }
    out.extend_from_slice(&0u32.to_le_bytes()); // no next IFD

    Some(out)
}

fn encode_inline(value: &EntryValue) -> Option<(u16, [u8; 4])> {
    match value {
        EntryValue::U8(v) => Some((1, [*v, 0, 0, 0])),
        EntryValue::U16(v) => {
            let b = v.to_le_bytes();
            Some((3, [b[0], b[1], 0, 0]))
        }
        EntryValue::U32(v) => Some((4, v.to_le_bytes())),
        other => {
            tracing::warn!(%other, "preserved value kind is not inline-serializable, dropping");
            None
        }
    }
}
