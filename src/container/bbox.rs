//! ISO base media file format box reading.
//!
//! Only the structure needed to demux tracks and audit residual metadata is
//! understood here; box semantics live in the demuxer.

use nom::{
    bytes::complete::take,
    combinator::{fail, map_res},
    number::complete::{be_u32, be_u64},
    IResult,
};

/// An ISO base media file format box header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BoxHeader {
    pub box_type: [u8; 4],
    pub box_size: u64,
    pub header_size: usize, // covers size + type (+ largesize)
}

impl BoxHeader {
    pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], BoxHeader> {
        let (remain, size) = be_u32(input)?;
        let (remain, box_type) = map_res(
            take(4_usize),
            |res: &[u8]| -> Result<[u8; 4], std::array::TryFromSliceError> { res.try_into() },
        )(remain)?;

        let (remain, box_size) = if size == 1 {
            be_u64(remain)?
        } else if size == 0 {
            // box extends to the end of the enclosing scope
            (remain, input.len() as u64)
        } else if size < 8 {
            return fail(remain);
        } else {
            (remain, size as u64)
        };

        let header_size = input.len() - remain.len();
        debug_assert!(header_size == 8 || header_size == 16);

        if box_size < header_size as u64 {
            return fail(remain);
        }

        Ok((
            remain,
            BoxHeader {
                box_type,
                box_size,
                header_size,
            },
        ))
    }
}

/// A box located inside a parent scope, with its body borrowed from the
/// source buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChildBox<'a> {
    pub box_type: [u8; 4],
    pub body: &'a [u8],
}

impl ChildBox<'_> {
    pub(crate) fn type_str(&self) -> String {
        self.box_type
            .iter()
            .map(|b| {
                let c = *b as char;
                if c.is_ascii_graphic() {
                    c
                } else {
                    '*'
                }
            })
            .collect()
    }
}

/// Iterate the boxes laid out back to back in `data`. Malformed trailing
/// bytes end the iteration with an error item.
pub(crate) fn iter_boxes(data: &[u8]) -> BoxIter<'_> {
    BoxIter { data, pos: 0 }
}

pub(crate) struct BoxIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for BoxIter<'a> {
    type Item = crate::Result<ChildBox<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let remain = &self.data[self.pos..];
        let header = match BoxHeader::parse(remain) {
            Ok((_, h)) => h,
            Err(e) => {
                self.pos = self.data.len();
                return Some(Err(crate::error::convert_parse_error(e, "bad box header")));
            }
        };
        if header.box_size > remain.len() as u64 {
            self.pos = self.data.len();
            return Some(Err("box runs past the end of its scope".into()));
        }

        let body_start = self.pos + header.header_size;
        let body_end = self.pos + header.box_size as usize;
        let child = ChildBox {
            box_type: header.box_type,
            body: &self.data[body_start..body_end],
        };
        self.pos = body_end;
        Some(Ok(child))
    }
}

/// First child of `data` with the given type.
pub(crate) fn find_box<'a>(data: &'a [u8], box_type: &[u8; 4]) -> Option<ChildBox<'a>> {
    iter_boxes(data)
        .filter_map(|b| b.ok())
        .find(|b| &b.box_type == box_type)
}

/// Split a full box body into (version, flags, rest).
pub(crate) fn full_box_body(body: &[u8]) -> crate::Result<(u8, u32, &[u8])> {
    if body.len() < 4 {
        return Err("full box body is truncated".into());
    }
    let version = body[0];
    let flags = u32::from_be_bytes([0, body[1], body[2], body[3]]);
    Ok((version, flags, &body[4..]))
}
