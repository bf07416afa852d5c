//! Container rebuild: a fresh ISO base media file from demuxed tracks.
//!
//! Every box written here is constructed from scratch. Creation and
//! modification times are zero, there is no `udta`/`meta`, and the only
//! bytes copied from the source are sample payloads and codec
//! configuration children.

use super::demux::Movie;
use super::track::{Sample, Track, TrackKind};

const MOVIE_TIMESCALE: u32 = 1000;

/// Rebuild `movie` into a new container, copying sample payloads from
/// `source` byte-exact and in original decode order.
#[tracing::instrument(skip_all)]
pub(crate) fn remux(movie: &Movie, source: &[u8]) -> crate::Result<Vec<u8>> {
    let ftyp = build_ftyp();

    // One chunk per track, payloads laid out back to back in mdat.
    let mdat_payload: u64 = movie.tracks.iter().map(|t| t.payload_len()).sum();
    let mut chunk_offsets = Vec::with_capacity(movie.tracks.len());
    let mut cursor = ftyp.len() as u64 + 8;
    for track in &movie.tracks {
        chunk_offsets.push(cursor);
        cursor += track.payload_len();
    }

    let mut mdat_body = Vec::with_capacity(mdat_payload as usize);
    for track in &movie.tracks {
        for sample in &track.samples {
            let start = sample.offset as usize;
            let end = start + sample.size as usize;
            // Demux validated the ranges against the source length.
            mdat_body.extend_from_slice(&source[start..end]);
        }
    }
    let mdat = make_box(b"mdat", mdat_body);

    let moov = build_moov(movie, &chunk_offsets)?;

    let mut out = Vec::with_capacity(ftyp.len() + mdat.len() + moov.len());
    out.extend_from_slice(&ftyp);
    out.extend_from_slice(&mdat);
    out.extend_from_slice(&moov);
    tracing::debug!(bytes = out.len(), tracks = movie.tracks.len(), "container rebuilt");
    Ok(out)
}

fn build_ftyp() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"isom");
    push_u32(&mut body, 0x200);
    for brand in [b"isom", b"iso2", b"avc1", b"mp41"] {
        body.extend_from_slice(brand);
    }
    make_box(b"ftyp", body)
}

fn build_moov(movie: &Movie, chunk_offsets: &[u64]) -> crate::Result<Vec<u8>> {
    let duration_ms = movie.tracks.iter().map(|t| t.duration_ms()).max().unwrap_or(0);

    let mut body = build_mvhd(duration_ms, movie.tracks.len() as u32 + 1);
    for (index, (track, chunk_offset)) in movie.tracks.iter().zip(chunk_offsets).enumerate() {
        body.extend_from_slice(&build_trak(track, index as u32 + 1, *chunk_offset)?);
    }
    Ok(make_box(b"moov", body))
}

fn build_mvhd(duration_ms: u64, next_track_id: u32) -> Vec<u8> {
    let mut body = Vec::new();
    push_u32(&mut body, 0); // creation time: intentionally zero
    push_u32(&mut body, 0); // modification time: intentionally zero
    push_u32(&mut body, MOVIE_TIMESCALE);
    push_u32(&mut body, clamp_u32(duration_ms));
    push_u32(&mut body, 0x0001_0000); // rate 1.0
    push_u16(&mut body, 0x0100); // volume 1.0
    push_u16(&mut body, 0);
    push_u32(&mut body, 0);
    push_u32(&mut body, 0);
    push_matrix(&mut body);
    for _ in 0..6 {
        push_u32(&mut body, 0); // pre_defined
    }
    push_u32(&mut body, next_track_id);
    make_full_box(b"mvhd", 0, 0, body)
}

fn build_trak(track: &Track, track_id: u32, chunk_offset: u64) -> crate::Result<Vec<u8>> {
    let mut body = build_tkhd(track, track_id);
    body.extend_from_slice(&build_mdia(track, chunk_offset)?);
    Ok(make_box(b"trak", body))
}

fn build_tkhd(track: &Track, track_id: u32) -> Vec<u8> {
    let mut body = Vec::new();
    push_u32(&mut body, 0); // creation time
    push_u32(&mut body, 0); // modification time
    push_u32(&mut body, track_id);
    push_u32(&mut body, 0);
    push_u32(&mut body, clamp_u32(track.duration_ms()));
    push_u32(&mut body, 0);
    push_u32(&mut body, 0);
    push_u16(&mut body, 0); // layer
    push_u16(&mut body, 0); // alternate group
    match track.descriptor.kind {
        TrackKind::Audio { .. } => push_u16(&mut body, 0x0100),
        TrackKind::Video { .. } => push_u16(&mut body, 0),
    }
    push_u16(&mut body, 0);
    push_matrix(&mut body);
    match track.descriptor.kind {
        TrackKind::Video { width, height } => {
            push_u32(&mut body, (width as u32) << 16);
            push_u32(&mut body, (height as u32) << 16);
        }
        TrackKind::Audio { .. } => {
            push_u32(&mut body, 0);
            push_u32(&mut body, 0);
        }
    }
    // flags: enabled + in movie + in preview
    make_full_box(b"tkhd", 0, 0x7, body)
}

fn build_mdia(track: &Track, chunk_offset: u64) -> crate::Result<Vec<u8>> {
    let mut body = build_mdhd(track);
    body.extend_from_slice(&build_hdlr(track));
    body.extend_from_slice(&build_minf(track, chunk_offset)?);
    Ok(make_box(b"mdia", body))
}

fn build_mdhd(track: &Track) -> Vec<u8> {
    let mut body = Vec::new();
    push_u32(&mut body, 0); // creation time
    push_u32(&mut body, 0); // modification time
    push_u32(&mut body, track.descriptor.timescale);
    push_u32(&mut body, clamp_u32(track.duration()));
    push_u16(&mut body, 0x55c4); // language: und
    push_u16(&mut body, 0);
    make_full_box(b"mdhd", 0, 0, body)
}

fn build_hdlr(track: &Track) -> Vec<u8> {
    let (handler, name): (&[u8; 4], &[u8]) = match track.descriptor.kind {
        TrackKind::Video { .. } => (b"vide", b"VideoHandler\x00"),
        TrackKind::Audio { .. } => (b"soun", b"SoundHandler\x00"),
    };
    let mut body = Vec::new();
    push_u32(&mut body, 0); // pre_defined
    body.extend_from_slice(handler);
    for _ in 0..3 {
        push_u32(&mut body, 0);
    }
    body.extend_from_slice(name);
    make_full_box(b"hdlr", 0, 0, body)
}

fn build_minf(track: &Track, chunk_offset: u64) -> crate::Result<Vec<u8>> {
    let mut body = match track.descriptor.kind {
        TrackKind::Video { .. } => {
            let mut vmhd = Vec::new();
            push_u16(&mut vmhd, 0); // graphicsmode: copy
            for _ in 0..3 {
                push_u16(&mut vmhd, 0); // opcolor
            }
            make_full_box(b"vmhd", 0, 1, vmhd)
        }
        TrackKind::Audio { .. } => {
            let mut smhd = Vec::new();
            push_u16(&mut smhd, 0); // balance: center
            push_u16(&mut smhd, 0);
            make_full_box(b"smhd", 0, 0, smhd)
        }
    };
    body.extend_from_slice(&build_dinf());
    body.extend_from_slice(&build_stbl(track, chunk_offset)?);
    Ok(make_box(b"minf", body))
}

fn build_dinf() -> Vec<u8> {
    // Self-contained data reference.
    let url = make_full_box(b"url ", 0, 1, Vec::new());
    let mut dref = Vec::new();
    push_u32(&mut dref, 1);
    dref.extend_from_slice(&url);
    make_box(b"dinf", make_full_box(b"dref", 0, 0, dref))
}

fn build_stbl(track: &Track, chunk_offset: u64) -> crate::Result<Vec<u8>> {
    let mut body = build_stsd(track);
    body.extend_from_slice(&build_stts(&track.samples));
    if track.has_cts_offsets {
        body.extend_from_slice(&build_ctts(&track.samples));
    }
    if let Some(stss) = build_stss(&track.samples) {
        body.extend_from_slice(&stss);
    }
    body.extend_from_slice(&build_stsc(track.samples.len() as u32));
    body.extend_from_slice(&build_stsz(&track.samples));
    body.extend_from_slice(&build_stco(chunk_offset)?);
    Ok(make_box(b"stbl", body))
}

/// Rebuild the sample entry from the descriptor: a clean standard layout
/// plus the allow-listed configuration children, nothing else.
fn build_stsd(track: &Track) -> Vec<u8> {
    let descriptor = &track.descriptor;
    let mut entry = Vec::new();
    for _ in 0..6 {
        entry.push(0); // reserved
    }
    push_u16(&mut entry, 1); // data reference index

    match descriptor.kind {
        TrackKind::Video { width, height } => {
            push_u16(&mut entry, 0); // pre_defined
            push_u16(&mut entry, 0); // reserved
            for _ in 0..3 {
                push_u32(&mut entry, 0); // pre_defined
            }
            push_u16(&mut entry, width);
            push_u16(&mut entry, height);
            push_u32(&mut entry, 0x0048_0000); // 72 dpi
            push_u32(&mut entry, 0x0048_0000);
            push_u32(&mut entry, 0); // reserved
            push_u16(&mut entry, 1); // frame count
            entry.extend_from_slice(&[0u8; 32]); // compressor name: none
            push_u16(&mut entry, 24); // depth
            push_u16(&mut entry, 0xffff); // pre_defined
        }
        TrackKind::Audio {
            sample_rate,
            channels,
        } => {
            push_u16(&mut entry, 0); // version
            push_u16(&mut entry, 0); // revision
            push_u32(&mut entry, 0); // vendor
            push_u16(&mut entry, channels);
            push_u16(&mut entry, 16); // sample size
            push_u16(&mut entry, 0); // compression id
            push_u16(&mut entry, 0); // packet size
            push_u32(&mut entry, (sample_rate & 0xffff) << 16);
        }
    }

    for init in &descriptor.init_boxes {
        entry.extend_from_slice(&make_box(&init.box_type, init.body.clone()));
    }

    let mut body = Vec::new();
    push_u32(&mut body, 1); // entry count
    body.extend_from_slice(&make_box(&descriptor.codec, entry));
    make_full_box(b"stsd", 0, 0, body)
}

fn build_stts(samples: &[Sample]) -> Vec<u8> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for sample in samples {
        match runs.last_mut() {
            Some((count, delta)) if *delta == sample.delta => *count += 1,
            _ => runs.push((1, sample.delta)),
        }
    }
    let mut body = Vec::new();
    push_u32(&mut body, runs.len() as u32);
    for (count, delta) in runs {
        push_u32(&mut body, count);
        push_u32(&mut body, delta);
    }
    make_full_box(b"stts", 0, 0, body)
}

fn build_ctts(samples: &[Sample]) -> Vec<u8> {
    let mut runs: Vec<(u32, i32)> = Vec::new();
    for sample in samples {
        match runs.last_mut() {
            Some((count, offset)) if *offset == sample.cts_offset => *count += 1,
            _ => runs.push((1, sample.cts_offset)),
        }
    }
    let version = if runs.iter().any(|(_, offset)| *offset < 0) {
        1
    } else {
        0
    };
    let mut body = Vec::new();
    push_u32(&mut body, runs.len() as u32);
    for (count, offset) in runs {
        push_u32(&mut body, count);
        push_u32(&mut body, offset as u32);
    }
    make_full_box(b"ctts", version, 0, body)
}

/// `None` when every sample is a sync sample (the table would be
/// redundant, and its absence means exactly that).
fn build_stss(samples: &[Sample]) -> Option<Vec<u8>> {
    if samples.iter().all(|s| s.keyframe) {
        return None;
    }
    let sync: Vec<u32> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.keyframe)
        .map(|(i, _)| i as u32 + 1)
        .collect();
    let mut body = Vec::new();
    push_u32(&mut body, sync.len() as u32);
    for number in sync {
        push_u32(&mut body, number);
    }
    Some(make_full_box(b"stss", 0, 0, body))
}

fn build_stsc(sample_count: u32) -> Vec<u8> {
    let mut body = Vec::new();
    push_u32(&mut body, 1);
    push_u32(&mut body, 1); // first chunk
    push_u32(&mut body, sample_count); // samples per chunk
    push_u32(&mut body, 1); // sample description index
    make_full_box(b"stsc", 0, 0, body)
}

fn build_stsz(samples: &[Sample]) -> Vec<u8> {
    let mut body = Vec::new();
    push_u32(&mut body, 0); // no uniform size
    push_u32(&mut body, samples.len() as u32);
    for sample in samples {
        push_u32(&mut body, sample.size);
    }
    make_full_box(b"stsz", 0, 0, body)
}

fn build_stco(chunk_offset: u64) -> crate::Result<Vec<u8>> {
    let offset =
        u32::try_from(chunk_offset).map_err(|_| crate::Error::from("chunk offset overflows stco"))?;
    let mut body = Vec::new();
    push_u32(&mut body, 1);
    push_u32(&mut body, offset);
    Ok(make_full_box(b"stco", 0, 0, body))
}

fn make_box(box_type: &[u8; 4], body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
    push_u32(&mut out, (8 + body.len()) as u32);
    out.extend_from_slice(box_type);
    out.extend_from_slice(&body);
    out
}

fn make_full_box(box_type: &[u8; 4], version: u8, flags: u32, body: Vec<u8>) -> Vec<u8> {
    let mut full = Vec::with_capacity(4 + body.len());
    full.push(version);
    full.extend_from_slice(&flags.to_be_bytes()[1..]);
    full.extend_from_slice(&body);
    make_box(box_type, full)
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_matrix(out: &mut Vec<u8>) {
    // Identity transform.
    for v in [
        0x0001_0000u32,
        0,
        0,
        0,
        0x0001_0000,
        0,
        0,
        0,
        0x4000_0000,
    ] {
        push_u32(out, v);
    }
}

fn clamp_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}
