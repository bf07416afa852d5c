//! ISO base media demuxer: turns a container into elementary tracks with
//! flattened sample tables. Everything descriptive (creation times, user
//! data, vendor boxes) is simply never read.

use super::bbox::{find_box, full_box_body, iter_boxes, ChildBox};
use super::track::{InitBox, Sample, Track, TrackDescriptor, TrackKind};

/// Codec-configuration children copied verbatim from a visual sample entry.
const VIDEO_INIT_BOXES: &[&[u8; 4]] = &[
    b"avcC", b"hvcC", b"vpcC", b"av1C", b"esds", b"colr", b"pasp", b"btrt",
];

/// Codec-configuration children copied verbatim from an audio sample entry.
const AUDIO_INIT_BOXES: &[&[u8; 4]] = &[b"esds", b"dOps", b"dac3", b"dec3", b"alac", b"btrt"];

#[derive(Debug)]
pub(crate) struct Movie {
    pub tracks: Vec<Track>,
}

impl Movie {
    pub(crate) fn has_video(&self) -> bool {
        self.tracks.iter().any(|t| t.descriptor.is_video())
    }
}

/// Demux a whole in-memory container. Offsets in the returned sample
/// tables are validated against `data`, so the remuxer can slice payloads
/// without further checks.
#[tracing::instrument(skip_all)]
pub(crate) fn demux(data: &[u8]) -> crate::Result<Movie> {
    let mut moov = None;
    for child in iter_boxes(data) {
        let child = child?;
        if &child.box_type == b"moov" {
            moov = Some(child);
            break;
        }
    }
    let moov = moov.ok_or("container has no moov box")?;

    let mut tracks = Vec::new();
    for child in iter_boxes(moov.body) {
        let child = child?;
        if &child.box_type != b"trak" {
            continue;
        }
        match parse_trak(child, data) {
            Ok(Some(track)) => {
                tracing::debug!(
                    codec = track.descriptor.codec_str(),
                    samples = track.samples.len(),
                    "demuxed track"
                );
                tracks.push(track);
            }
            // Non-media tracks (hint, text, metadata) are dropped.
            Ok(None) => {}
            Err(e) => return Err(e),
        }
    }

    if tracks.is_empty() {
        return Err("container has no usable media tracks".into());
    }
    Ok(Movie { tracks })
}

/// Parse one `trak`. Returns `None` for track kinds the engine does not
/// carry over.
fn parse_trak(trak: ChildBox, file: &[u8]) -> crate::Result<Option<Track>> {
    let mdia = find_box(trak.body, b"mdia").ok_or("trak has no mdia")?;
    let mdhd = find_box(mdia.body, b"mdhd").ok_or("mdia has no mdhd")?;
    let hdlr = find_box(mdia.body, b"hdlr").ok_or("mdia has no hdlr")?;
    let minf = find_box(mdia.body, b"minf").ok_or("mdia has no minf")?;
    let stbl = find_box(minf.body, b"stbl").ok_or("minf has no stbl")?;

    let timescale = parse_mdhd_timescale(mdhd.body)?;
    let handler = parse_hdlr_type(hdlr.body)?;

    let is_video = match &handler {
        b"vide" => true,
        b"soun" => false,
        _ => return Ok(None),
    };

    let stsd = find_box(stbl.body, b"stsd").ok_or("stbl has no stsd")?;
    let (codec, kind, init_boxes, bitrate) = parse_stsd(stsd.body, is_video)?;

    let samples = flatten_sample_tables(stbl.body, file.len() as u64)?;
    let has_cts_offsets = samples.iter().any(|s| s.cts_offset != 0);

    let descriptor = TrackDescriptor {
        kind,
        codec,
        timescale,
        bitrate,
        frame_rate: None,
        init_boxes,
    };

    Ok(Some(Track {
        descriptor,
        samples,
        has_cts_offsets,
    }))
}

fn parse_mdhd_timescale(body: &[u8]) -> crate::Result<u32> {
    let (version, _, rest) = full_box_body(body)?;
    // creation/modification times precede the timescale; their width
    // depends on the box version. They are read past, never kept.
    let offset = match version {
        0 => 8,
        1 => 16,
        v => return Err(format!("unsupported mdhd version {v}").into()),
    };
    let raw = rest
        .get(offset..offset + 4)
        .ok_or("mdhd is truncated")?;
    let timescale = u32::from_be_bytes(raw.try_into().unwrap());
    if timescale == 0 {
        return Err("mdhd timescale is zero".into());
    }
    Ok(timescale)
}

fn parse_hdlr_type(body: &[u8]) -> crate::Result<[u8; 4]> {
    let (_, _, rest) = full_box_body(body)?;
    let raw = rest.get(4..8).ok_or("hdlr is truncated")?;
    Ok(raw.try_into().unwrap())
}

type StsdOut = ([u8; 4], TrackKind, Vec<InitBox>, Option<u32>);

/// Read the first sample entry of an stsd and rebuild its essence: codec
/// fourcc, decode parameters, and allow-listed configuration children.
fn parse_stsd(body: &[u8], is_video: bool) -> crate::Result<StsdOut> {
    let (_, _, rest) = full_box_body(body)?;
    let entry_count = u32::from_be_bytes(
        rest.get(..4).ok_or("stsd is truncated")?.try_into().unwrap(),
    );
    if entry_count == 0 {
        return Err("stsd has no entries".into());
    }
    let entry = iter_boxes(&rest[4..])
        .next()
        .ok_or("stsd entry missing")??;

    if is_video {
        // VisualSampleEntry: 6 reserved + data-ref index, 16 bytes of
        // pre-defined/reserved, dimensions, resolutions, frame count,
        // compressor name, depth, pre-defined. Children follow.
        const CHILDREN_AT: usize = 78;
        let body = entry.body;
        if body.len() < CHILDREN_AT {
            return Err("visual sample entry is truncated".into());
        }
        let width = u16::from_be_bytes(body[24..26].try_into().unwrap());
        let height = u16::from_be_bytes(body[26..28].try_into().unwrap());
        let (init_boxes, bitrate) = collect_init_boxes(&body[CHILDREN_AT..], VIDEO_INIT_BOXES);
        Ok((
            entry.box_type,
            TrackKind::Video { width, height },
            init_boxes,
            bitrate,
        ))
    } else {
        // AudioSampleEntry: 6 reserved + data-ref index, then the QT
        // version word decides how much legacy padding precedes children.
        let body = entry.body;
        if body.len() < 28 {
            return Err("audio sample entry is truncated".into());
        }
        let qt_version = u16::from_be_bytes(body[8..10].try_into().unwrap());
        let channels = u16::from_be_bytes(body[16..18].try_into().unwrap());
        let sample_rate = u32::from_be_bytes(body[24..28].try_into().unwrap()) >> 16;
        let children_at = match qt_version {
            0 => 28,
            1 => 28 + 16,
            v => return Err(format!("unsupported audio sample entry version {v}").into()),
        };
        if body.len() < children_at {
            return Err("audio sample entry is truncated".into());
        }
        let (init_boxes, bitrate) = collect_init_boxes(&body[children_at..], AUDIO_INIT_BOXES);
        Ok((
            entry.box_type,
            TrackKind::Audio {
                sample_rate,
                channels,
            },
            init_boxes,
            bitrate,
        ))
    }
}

/// Copy allow-listed children; everything else in the entry is dropped.
/// A declared average bitrate is lifted out of `btrt` when present.
fn collect_init_boxes(data: &[u8], allowed: &[&[u8; 4]]) -> (Vec<InitBox>, Option<u32>) {
    let mut init_boxes = Vec::new();
    let mut bitrate = None;
    for child in iter_boxes(data) {
        let Ok(child) = child else {
            // Trailing junk after the known children is not fatal.
            break;
        };
        if !allowed.contains(&&child.box_type) {
            tracing::debug!(box_type = child.type_str(), "dropping sample entry child");
            continue;
        }
        if &child.box_type == b"btrt" && child.body.len() >= 12 {
            bitrate = Some(u32::from_be_bytes(child.body[8..12].try_into().unwrap()))
                .filter(|b| *b > 0);
        }
        init_boxes.push(InitBox {
            box_type: child.box_type,
            body: child.body.to_vec(),
        });
    }
    (init_boxes, bitrate)
}

/// Join stts/ctts/stss/stsz/stsc/stco into one flat, validated sample list.
fn flatten_sample_tables(stbl: &[u8], file_len: u64) -> crate::Result<Vec<Sample>> {
    let stsz = find_box(stbl, b"stsz").ok_or("stbl has no stsz")?;
    let sizes = parse_stsz(stsz.body)?;
    let count = sizes.len();

    let stts = find_box(stbl, b"stts").ok_or("stbl has no stts")?;
    let deltas = parse_stts(stts.body, count)?;

    let cts_offsets = match find_box(stbl, b"ctts") {
        Some(ctts) => Some(parse_ctts(ctts.body, count)?),
        None => None,
    };

    let sync_samples = match find_box(stbl, b"stss") {
        Some(stss) => Some(parse_stss(stss.body)?),
        None => None,
    };

    let stsc = find_box(stbl, b"stsc").ok_or("stbl has no stsc")?;
    let chunk_runs = parse_stsc(stsc.body)?;

    let chunk_offsets = match find_box(stbl, b"stco") {
        Some(stco) => parse_stco(stco.body)?,
        None => {
            let co64 = find_box(stbl, b"co64").ok_or("stbl has no stco/co64")?;
            parse_co64(co64.body)?
        }
    };

    // Walk chunks, assigning consecutive samples and accumulating payload
    // offsets within each chunk.
    let mut samples = Vec::with_capacity(count);
    let mut run_index = 0usize;
    let mut sample_index = 0usize;

    'chunks: for (chunk_number, chunk_offset) in (1u32..).zip(chunk_offsets.iter()) {
        while run_index + 1 < chunk_runs.len() && chunk_runs[run_index + 1].0 <= chunk_number {
            run_index += 1;
        }
        let per_chunk = chunk_runs
            .get(run_index)
            .map(|r| r.1)
            .ok_or("stsc is empty")?;

        let mut cursor = *chunk_offset;
        for _ in 0..per_chunk {
            if sample_index >= count {
                break 'chunks;
            }
            let size = sizes[sample_index];
            match cursor.checked_add(size as u64) {
                Some(end) if end <= file_len => {}
                _ => return Err("sample payload out of file range".into()),
            }
            samples.push(Sample {
                offset: cursor,
                size,
                delta: deltas[sample_index],
                cts_offset: cts_offsets.as_ref().map_or(0, |c| c[sample_index]),
                keyframe: sync_samples
                    .as_ref()
                    .map_or(true, |s| s.contains(&((sample_index + 1) as u32))),
            });
            cursor += size as u64;
            sample_index += 1;
        }
    }

    if sample_index < count {
        return Err("chunk tables cover fewer samples than stsz declares".into());
    }
    Ok(samples)
}

fn table_head(body: &[u8]) -> crate::Result<(u32, &[u8])> {
    let (_, _, rest) = full_box_body(body)?;
    let count = u32::from_be_bytes(
        rest.get(..4).ok_or("table is truncated")?.try_into().unwrap(),
    );
    Ok((count, &rest[4..]))
}

fn parse_stsz(body: &[u8]) -> crate::Result<Vec<u32>> {
    let (_, _, rest) = full_box_body(body)?;
    if rest.len() < 8 {
        return Err("stsz is truncated".into());
    }
    let uniform = u32::from_be_bytes(rest[..4].try_into().unwrap());
    let count = u32::from_be_bytes(rest[4..8].try_into().unwrap()) as usize;

    if uniform != 0 {
        return Ok(vec![uniform; count]);
    }
    let table = rest
        .get(8..8 + count * 4)
        .ok_or("stsz table is truncated")?;
    Ok(table
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes(c.try_into().unwrap()))
        .collect())
}

/// Expand run-length (count, delta) pairs to one delta per sample.
fn parse_stts(body: &[u8], sample_count: usize) -> crate::Result<Vec<u32>> {
    let (entry_count, rest) = table_head(body)?;
    let table = rest
        .get(..entry_count as usize * 8)
        .ok_or("stts table is truncated")?;

    let mut deltas = Vec::with_capacity(sample_count);
    for entry in table.chunks_exact(8) {
        let run = u32::from_be_bytes(entry[..4].try_into().unwrap()) as usize;
        let delta = u32::from_be_bytes(entry[4..8].try_into().unwrap());
        let take = run.min(sample_count - deltas.len());
        deltas.extend(std::iter::repeat(delta).take(take));
        if deltas.len() == sample_count {
            break;
        }
    }
    if deltas.len() < sample_count {
        return Err("stts covers fewer samples than stsz".into());
    }
    Ok(deltas)
}

fn parse_ctts(body: &[u8], sample_count: usize) -> crate::Result<Vec<i32>> {
    let (version, _, rest) = full_box_body(body)?;
    let entry_count = u32::from_be_bytes(
        rest.get(..4).ok_or("ctts is truncated")?.try_into().unwrap(),
    );
    let table = rest
        .get(4..4 + entry_count as usize * 8)
        .ok_or("ctts table is truncated")?;

    let mut offsets = Vec::with_capacity(sample_count);
    for entry in table.chunks_exact(8) {
        let run = u32::from_be_bytes(entry[..4].try_into().unwrap()) as usize;
        let raw = u32::from_be_bytes(entry[4..8].try_into().unwrap());
        // Version 0 stores unsigned offsets, version 1 signed.
        let offset = if version == 0 {
            i32::try_from(raw).map_err(|_| "ctts offset overflows")?
        } else {
            raw as i32
        };
        let take = run.min(sample_count - offsets.len());
        offsets.extend(std::iter::repeat(offset).take(take));
        if offsets.len() == sample_count {
            break;
        }
    }
    if offsets.len() < sample_count {
        return Err("ctts covers fewer samples than stsz".into());
    }
    Ok(offsets)
}

fn parse_stss(body: &[u8]) -> crate::Result<Vec<u32>> {
    let (entry_count, rest) = table_head(body)?;
    let table = rest
        .get(..entry_count as usize * 4)
        .ok_or("stss table is truncated")?;
    Ok(table
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes(c.try_into().unwrap()))
        .collect())
}

/// (first_chunk, samples_per_chunk) runs; the descriptor index is dropped
/// because the rebuilt container always has exactly one sample entry.
fn parse_stsc(body: &[u8]) -> crate::Result<Vec<(u32, u32)>> {
    let (entry_count, rest) = table_head(body)?;
    let table = rest
        .get(..entry_count as usize * 12)
        .ok_or("stsc table is truncated")?;
    let runs: Vec<(u32, u32)> = table
        .chunks_exact(12)
        .map(|c| {
            (
                u32::from_be_bytes(c[..4].try_into().unwrap()),
                u32::from_be_bytes(c[4..8].try_into().unwrap()),
            )
        })
        .collect();
    if runs.is_empty() {
        return Err("stsc is empty".into());
    }
    Ok(runs)
}

fn parse_stco(body: &[u8]) -> crate::Result<Vec<u64>> {
    let (entry_count, rest) = table_head(body)?;
    let table = rest
        .get(..entry_count as usize * 4)
        .ok_or("stco table is truncated")?;
    Ok(table
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes(c.try_into().unwrap()) as u64)
        .collect())
}

fn parse_co64(body: &[u8]) -> crate::Result<Vec<u64>> {
    let (entry_count, rest) = table_head(body)?;
    let table = rest
        .get(..entry_count as usize * 8)
        .ok_or("co64 table is truncated")?;
    Ok(table
        .chunks_exact(8)
        .map(|c| u64::from_be_bytes(c.try_into().unwrap()))
        .collect())
}
