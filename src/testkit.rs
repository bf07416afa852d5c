//! Shared test fixtures: hand-built TIFF payloads, spliced JPEGs, and a
//! synthetic two-track container with known sample tables.

use image::{Rgb, RgbImage};

/// Little-endian TIFF payload with a primary directory (Make, Orientation,
/// sub-directory pointers), an Exif directory (DateTimeOriginal) and a GPS
/// directory (latitude ref + rational triplet).
pub(crate) fn sample_tiff() -> Vec<u8> {
    let mut out = Vec::new();
    let w16 = |out: &mut Vec<u8>, v: u16| out.extend_from_slice(&v.to_le_bytes());
    let w32 = |out: &mut Vec<u8>, v: u32| out.extend_from_slice(&v.to_le_bytes());

    // Layout, offsets relative to the TIFF start:
    //   8 IFD0 (4 entries)            62 Make string (+pad)
    //  68 Exif IFD (1 entry)          86 DateTimeOriginal string
    // 106 GPS IFD (4 entries)        160 latitude / 184 longitude rationals
    const MAKE_AT: u32 = 62;
    const EXIF_IFD_AT: u32 = 68;
    const DTO_AT: u32 = 86;
    const GPS_IFD_AT: u32 = 106;
    const LAT_AT: u32 = 160;
    const LON_AT: u32 = 184;

    out.extend_from_slice(b"II");
    w16(&mut out, 42);
    w32(&mut out, 8);

    // IFD0
    w16(&mut out, 4);
    w16(&mut out, 0x010f); // Make
    w16(&mut out, 2);
    w32(&mut out, 5);
    w32(&mut out, MAKE_AT);
    w16(&mut out, 0x0112); // Orientation
    w16(&mut out, 3);
    w32(&mut out, 1);
    w32(&mut out, 6);
    w16(&mut out, 0x8769); // Exif sub-directory
    w16(&mut out, 4);
    w32(&mut out, 1);
    w32(&mut out, EXIF_IFD_AT);
    w16(&mut out, 0x8825); // GPS sub-directory
    w16(&mut out, 4);
    w32(&mut out, 1);
    w32(&mut out, GPS_IFD_AT);
    w32(&mut out, 0); // no IFD1

    debug_assert_eq!(out.len(), MAKE_AT as usize);
    out.extend_from_slice(b"Acme\x00\x00"); // string + pad

    // Exif IFD
    debug_assert_eq!(out.len(), EXIF_IFD_AT as usize);
    w16(&mut out, 1);
    w16(&mut out, 0x9003); // DateTimeOriginal
    w16(&mut out, 2);
    w32(&mut out, 20);
    w32(&mut out, DTO_AT);
    w32(&mut out, 0);

    debug_assert_eq!(out.len(), DTO_AT as usize);
    out.extend_from_slice(b"2023:08:01 12:00:00\x00");

    // GPS IFD
    debug_assert_eq!(out.len(), GPS_IFD_AT as usize);
    w16(&mut out, 4);
    w16(&mut out, 0x0001); // GPSLatitudeRef
    w16(&mut out, 2);
    w32(&mut out, 2);
    out.extend_from_slice(b"N\x00\x00\x00");
    w16(&mut out, 0x0002); // GPSLatitude
    w16(&mut out, 5);
    w32(&mut out, 3);
    w32(&mut out, LAT_AT);
    w16(&mut out, 0x0003); // GPSLongitudeRef
    w16(&mut out, 2);
    w32(&mut out, 2);
    out.extend_from_slice(b"E\x00\x00\x00");
    w16(&mut out, 0x0004); // GPSLongitude
    w16(&mut out, 5);
    w32(&mut out, 3);
    w32(&mut out, LON_AT);
    w32(&mut out, 0);

    debug_assert_eq!(out.len(), LAT_AT as usize);
    for (num, den) in [(39u32, 1u32), (39, 1), (3380, 100)] {
        w32(&mut out, num);
        w32(&mut out, den);
    }
    debug_assert_eq!(out.len(), LON_AT as usize);
    for (num, den) in [(116u32, 1u32), (23, 1), (27, 1)] {
        w32(&mut out, num);
        w32(&mut out, den);
    }

    out
}

/// A structurally valid JPEG: SOI, the given `(marker, payload)` segments,
/// then a minimal SOS with a little entropy data and EOI.
pub(crate) fn jpeg_with_segments(segments: &[(u8, &[u8])]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    for (marker, payload) in segments {
        out.push(0xFF);
        out.push(*marker);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
    }
    // SOS header, then entropy-coded bytes, then EOI.
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x04, 0x01, 0x00]);
    out.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// A real decodable JPEG produced by the raster encoder.
pub(crate) fn encode_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let raster = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90);
    encoder.encode_image(&raster).unwrap();
    out
}

/// A decodable JPEG with the sample Exif block spliced in after SOI.
pub(crate) fn jpeg_with_exif(width: u32, height: u32) -> Vec<u8> {
    let plain = encode_test_jpeg(width, height);
    let tiff = sample_tiff();

    let mut app1 = Vec::new();
    app1.extend_from_slice(b"Exif\x00\x00");
    app1.extend_from_slice(&tiff);

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&app1);
    out.extend_from_slice(&plain[2..]);
    out
}

/// A two-track ISO base media file with known sample tables. Creation and
/// modification times are deliberately nonzero so tests can observe the
/// rebuilt container zeroing them.
pub(crate) struct SyntheticMovie {
    pub video_samples: Vec<Vec<u8>>,
    pub audio_samples: Vec<Vec<u8>>,
    with_video: bool,
    with_udta: bool,
}

const VIDEO_TIMESCALE: u32 = 15360;
const AUDIO_TIMESCALE: u32 = 48000;
const VIDEO_DELTA: u32 = 512;
const AUDIO_DELTA: u32 = 1024;
/// Sync samples of the video track, 1-based.
const VIDEO_SYNC: [u32; 2] = [1, 3];
const FAKE_TIME: u32 = 0xD00D_F00D;

impl SyntheticMovie {
    pub fn two_track() -> Self {
        Self {
            video_samples: vec![
                vec![0x10; 9],
                vec![0x21; 7],
                vec![0x32; 8],
                vec![0x43; 6],
            ],
            audio_samples: vec![vec![0xA0; 5], vec![0xB1; 4], vec![0xC2; 6]],
            with_video: true,
            with_udta: false,
        }
    }

    pub fn audio_only() -> Self {
        Self {
            with_video: false,
            ..Self::two_track()
        }
    }

    pub fn with_udta(mut self) -> Self {
        self.with_udta = true;
        self
    }

    fn ftyp(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"isom");
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(b"isom");
        mk_box(b"ftyp", body)
    }

    pub fn build(&self) -> Vec<u8> {
        let ftyp = self.ftyp();
        let video_len: usize = self.video_samples.iter().map(|s| s.len()).sum();

        let mut mdat_body = Vec::new();
        if self.with_video {
            for s in &self.video_samples {
                mdat_body.extend_from_slice(s);
            }
        }
        for s in &self.audio_samples {
            mdat_body.extend_from_slice(s);
        }

        let payload_start = ftyp.len() + 8;
        let video_chunk = payload_start as u32;
        let audio_chunk = if self.with_video {
            (payload_start + video_len) as u32
        } else {
            payload_start as u32
        };

        let mut moov_body = self.mvhd();
        if self.with_video {
            moov_body.extend_from_slice(&self.video_trak(video_chunk));
        }
        moov_body.extend_from_slice(&self.audio_trak(audio_chunk));
        if self.with_udta {
            let mut udta_body = mk_box(b"\xa9xyz", b"+27.1281+100.2508/".to_vec());
            udta_body.extend_from_slice(&mk_full_box(b"meta", 0, 0, Vec::new()));
            moov_body.extend_from_slice(&mk_box(b"udta", udta_body));
        }

        let mut out = ftyp;
        out.extend_from_slice(&mk_box(b"mdat", mdat_body));
        out.extend_from_slice(&mk_box(b"moov", moov_body));
        out
    }

    fn mvhd(&self) -> Vec<u8> {
        let mut body = Vec::new();
        be32(&mut body, FAKE_TIME); // creation
        be32(&mut body, FAKE_TIME); // modification
        be32(&mut body, 1000);
        be32(&mut body, 200);
        be32(&mut body, 0x0001_0000);
        be16(&mut body, 0x0100);
        be16(&mut body, 0);
        be32(&mut body, 0);
        be32(&mut body, 0);
        identity_matrix(&mut body);
        for _ in 0..6 {
            be32(&mut body, 0);
        }
        be32(&mut body, 3);
        mk_full_box(b"mvhd", 0, 0, body)
    }

    fn video_trak(&self, chunk_offset: u32) -> Vec<u8> {
        let sizes: Vec<u32> = self.video_samples.iter().map(|s| s.len() as u32).collect();

        let mut entry = visual_entry_prefix(640, 360);
        entry.extend_from_slice(&mk_box(b"avcC", vec![1, 0x64, 0x00, 0x1f, 0xff, 0xe1]));
        // A vendor child that must not survive the rebuild.
        entry.extend_from_slice(&mk_box(b"vndr", b"CameraCo".to_vec()));
        let stsd_entry = mk_box(b"avc1", entry);

        let mut stbl = mk_stsd(stsd_entry);
        stbl.extend_from_slice(&mk_stts(sizes.len() as u32, VIDEO_DELTA));
        stbl.extend_from_slice(&mk_ctts(&[0, VIDEO_DELTA, 0, VIDEO_DELTA]));
        stbl.extend_from_slice(&mk_stss(&VIDEO_SYNC));
        stbl.extend_from_slice(&mk_stsc(sizes.len() as u32));
        stbl.extend_from_slice(&mk_stsz(&sizes));
        stbl.extend_from_slice(&mk_stco(chunk_offset));

        self.trak(1, VIDEO_TIMESCALE, b"vide", mk_box(b"stbl", stbl), true)
    }

    fn audio_trak(&self, chunk_offset: u32) -> Vec<u8> {
        let sizes: Vec<u32> = self.audio_samples.iter().map(|s| s.len() as u32).collect();

        let mut entry = audio_entry_prefix(48000, 2);
        entry.extend_from_slice(&mk_box(b"esds", vec![0, 0, 0, 0, 0x03, 0x19]));
        let stsd_entry = mk_box(b"mp4a", entry);

        let mut stbl = mk_stsd(stsd_entry);
        stbl.extend_from_slice(&mk_stts(sizes.len() as u32, AUDIO_DELTA));
        stbl.extend_from_slice(&mk_stsc(sizes.len() as u32));
        stbl.extend_from_slice(&mk_stsz(&sizes));
        stbl.extend_from_slice(&mk_stco(chunk_offset));

        self.trak(2, AUDIO_TIMESCALE, b"soun", mk_box(b"stbl", stbl), false)
    }

    fn trak(
        &self,
        track_id: u32,
        timescale: u32,
        handler: &[u8; 4],
        stbl: Vec<u8>,
        video: bool,
    ) -> Vec<u8> {
        let mut tkhd = Vec::new();
        be32(&mut tkhd, FAKE_TIME);
        be32(&mut tkhd, FAKE_TIME);
        be32(&mut tkhd, track_id);
        be32(&mut tkhd, 0);
        be32(&mut tkhd, 200);
        be32(&mut tkhd, 0);
        be32(&mut tkhd, 0);
        be16(&mut tkhd, 0);
        be16(&mut tkhd, 0);
        be16(&mut tkhd, if video { 0 } else { 0x0100 });
        be16(&mut tkhd, 0);
        identity_matrix(&mut tkhd);
        be32(&mut tkhd, if video { 640 << 16 } else { 0 });
        be32(&mut tkhd, if video { 360 << 16 } else { 0 });

        let mut mdhd = Vec::new();
        be32(&mut mdhd, FAKE_TIME);
        be32(&mut mdhd, FAKE_TIME);
        be32(&mut mdhd, timescale);
        be32(&mut mdhd, 2048);
        be16(&mut mdhd, 0x55c4);
        be16(&mut mdhd, 0);

        let mut hdlr = Vec::new();
        be32(&mut hdlr, 0);
        hdlr.extend_from_slice(handler);
        for _ in 0..3 {
            be32(&mut hdlr, 0);
        }
        hdlr.extend_from_slice(b"handler\x00");

        let mut minf = if video {
            let mut vmhd = Vec::new();
            be16(&mut vmhd, 0);
            for _ in 0..3 {
                be16(&mut vmhd, 0);
            }
            mk_full_box(b"vmhd", 0, 1, vmhd)
        } else {
            mk_full_box(b"smhd", 0, 0, vec![0, 0, 0, 0])
        };
        let url = mk_full_box(b"url ", 0, 1, Vec::new());
        let mut dref = Vec::new();
        be32(&mut dref, 1);
        dref.extend_from_slice(&url);
        minf.extend_from_slice(&mk_box(b"dinf", mk_full_box(b"dref", 0, 0, dref)));
        minf.extend_from_slice(&stbl);

        let mut mdia = mk_full_box(b"mdhd", 0, 0, mdhd);
        mdia.extend_from_slice(&mk_full_box(b"hdlr", 0, 0, hdlr));
        mdia.extend_from_slice(&mk_box(b"minf", minf));

        let mut trak = mk_full_box(b"tkhd", 0, 7, tkhd);
        trak.extend_from_slice(&mk_box(b"mdia", mdia));
        mk_box(b"trak", trak)
    }
}

fn visual_entry_prefix(width: u16, height: u16) -> Vec<u8> {
    let mut entry = vec![0u8; 6];
    be16(&mut entry, 1); // data reference index
    be16(&mut entry, 0);
    be16(&mut entry, 0);
    for _ in 0..3 {
        be32(&mut entry, 0);
    }
    be16(&mut entry, width);
    be16(&mut entry, height);
    be32(&mut entry, 0x0048_0000);
    be32(&mut entry, 0x0048_0000);
    be32(&mut entry, 0);
    be16(&mut entry, 1);
    entry.extend_from_slice(&[0u8; 32]);
    be16(&mut entry, 24);
    be16(&mut entry, 0xffff);
    entry
}

fn audio_entry_prefix(sample_rate: u32, channels: u16) -> Vec<u8> {
    let mut entry = vec![0u8; 6];
    be16(&mut entry, 1); // data reference index
    be16(&mut entry, 0); // version
    be16(&mut entry, 0); // revision
    be32(&mut entry, 0); // vendor
    be16(&mut entry, channels);
    be16(&mut entry, 16);
    be16(&mut entry, 0);
    be16(&mut entry, 0);
    be32(&mut entry, sample_rate << 16);
    entry
}

fn mk_stsd(entry: Vec<u8>) -> Vec<u8> {
    let mut body = Vec::new();
    be32(&mut body, 1);
    body.extend_from_slice(&entry);
    mk_full_box(b"stsd", 0, 0, body)
}

fn mk_stts(count: u32, delta: u32) -> Vec<u8> {
    let mut body = Vec::new();
    be32(&mut body, 1);
    be32(&mut body, count);
    be32(&mut body, delta);
    mk_full_box(b"stts", 0, 0, body)
}

fn mk_ctts(offsets: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    be32(&mut body, offsets.len() as u32);
    for offset in offsets {
        be32(&mut body, 1);
        be32(&mut body, *offset);
    }
    mk_full_box(b"ctts", 0, 0, body)
}

fn mk_stss(sync: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    be32(&mut body, sync.len() as u32);
    for s in sync {
        be32(&mut body, *s);
    }
    mk_full_box(b"stss", 0, 0, body)
}

fn mk_stsc(samples_per_chunk: u32) -> Vec<u8> {
    let mut body = Vec::new();
    be32(&mut body, 1);
    be32(&mut body, 1);
    be32(&mut body, samples_per_chunk);
    be32(&mut body, 1);
    mk_full_box(b"stsc", 0, 0, body)
}

fn mk_stsz(sizes: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    be32(&mut body, 0);
    be32(&mut body, sizes.len() as u32);
    for size in sizes {
        be32(&mut body, *size);
    }
    mk_full_box(b"stsz", 0, 0, body)
}

fn mk_stco(offset: u32) -> Vec<u8> {
    let mut body = Vec::new();
    be32(&mut body, 1);
    be32(&mut body, offset);
    mk_full_box(b"stco", 0, 0, body)
}

fn mk_box(box_type: &[u8; 4], body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
    be32(&mut out, (8 + body.len()) as u32);
    out.extend_from_slice(box_type);
    out.extend_from_slice(&body);
    out
}

fn mk_full_box(box_type: &[u8; 4], version: u8, flags: u32, body: Vec<u8>) -> Vec<u8> {
    let mut full = Vec::with_capacity(4 + body.len());
    full.push(version);
    full.extend_from_slice(&flags.to_be_bytes()[1..]);
    full.extend_from_slice(&body);
    mk_box(box_type, full)
}

fn be16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn identity_matrix(out: &mut Vec<u8>) {
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
        be32(out, v);
    }
}
