//! PNG chunk walking, just enough to find metadata chunks. Pixel chunks
//! are never touched.

const SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Chunk types that carry descriptive metadata rather than pixels.
const METADATA_CHUNKS: &[(&[u8; 4], &str)] = &[
    (b"tEXt", "PngTextChunk"),
    (b"zTXt", "PngCompressedTextChunk"),
    (b"iTXt", "PngInternationalTextChunk"),
    (b"tIME", "PngTimestampChunk"),
    (b"eXIf", "PngExifChunk"),
];

fn iter_chunks(bytes: &[u8]) -> impl Iterator<Item = ([u8; 4], &[u8])> {
    let mut pos = SIGNATURE.len();
    let valid = bytes.starts_with(SIGNATURE);
    std::iter::from_fn(move || {
        if !valid {
            return None;
        }
        let len_raw = bytes.get(pos..pos + 4)?;
        let len = u32::from_be_bytes(len_raw.try_into().unwrap()) as usize;
        let chunk_type: [u8; 4] = bytes.get(pos + 4..pos + 8)?.try_into().unwrap();
        let data = bytes.get(pos + 8..pos + 8 + len)?;
        // data + crc
        pos += 12 + len;
        Some((chunk_type, data))
    })
}

/// TIFF bytes of the `eXIf` chunk, when one is present.
pub(crate) fn exif_chunk(bytes: &[u8]) -> Option<&[u8]> {
    iter_chunks(bytes)
        .find(|(t, _)| t == b"eXIf")
        .map(|(_, data)| data)
}

/// Names of metadata chunks present in the file.
pub(crate) fn metadata_chunk_names(bytes: &[u8]) -> Vec<&'static str> {
    let mut names = Vec::new();
    for (chunk_type, _) in iter_chunks(bytes) {
        if let Some((_, name)) = METADATA_CHUNKS.iter().find(|(t, _)| **t == chunk_type) {
            if !names.contains(name) {
                names.push(*name);
            }
        }
    }
    names
}
