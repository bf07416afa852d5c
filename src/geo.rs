//! Conversion between the rational degrees/minutes/seconds encoding used by
//! image GPS tags and signed decimal degrees.
//!
//! This is a display/inspection path: coordinates are always on the strip
//! list, so nothing here ever feeds the write side of an artifact.

use std::sync::LazyLock;

use regex::Regex;

use crate::values::{Rational, URational};
use crate::Error;

/// Which axis a hemisphere reference describes. Determines the reference
/// letters used by [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

static TRIPLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)/(\d+)\s*,\s*(\d+)/(\d+)\s*,\s*(\d+)/(\d+)\s*$").unwrap()
});

/// Decode a `D/Dd,M/Md,S/Sd` triplet into signed decimal degrees.
///
/// The hemisphere reference supplies the sign: `S` and `W` are negative.
/// Fails with [`Error::Format`] when the string is not three two-field
/// fractions, and with [`Error::Arithmetic`] when a denominator is zero.
pub fn decode(triplet: &str, hemisphere: char) -> crate::Result<f64> {
    let caps = TRIPLET
        .captures(triplet)
        .ok_or_else(|| Error::Format(format!("expected D/Dd,M/Md,S/Sd, got {triplet:?}")))?;

    let mut parts = [URational::default(); 3];
    for (i, part) in parts.iter_mut().enumerate() {
        // Captures are digit-only, so the only parse failure mode is range.
        let num: u32 = caps[1 + i * 2]
            .parse()
            .map_err(|_| Error::Format(format!("numerator out of range in {triplet:?}")))?;
        let den: u32 = caps[2 + i * 2]
            .parse()
            .map_err(|_| Error::Format(format!("denominator out of range in {triplet:?}")))?;
        *part = Rational(num, den);
    }

    from_rationals(&parts, hemisphere)
}

/// Decode an already-parsed rational triplet, applying the hemisphere sign.
pub(crate) fn from_rationals(parts: &[URational], hemisphere: char) -> crate::Result<f64> {
    if parts.len() < 3 {
        return Err(Error::Format(format!(
            "expected 3 rational parts, got {}",
            parts.len()
        )));
    }
    for part in &parts[..3] {
        if part.1 == 0 {
            return Err(Error::Arithmetic(format!(
                "zero denominator in {}/{}",
                part.0, part.1
            )));
        }
    }

    let degrees =
        parts[0].as_float() + parts[1].as_float() / 60.0 + parts[2].as_float() / 3600.0;

    match hemisphere.to_ascii_uppercase() {
        'N' | 'E' => Ok(degrees),
        'S' | 'W' => Ok(-degrees),
        other => Err(Error::Format(format!(
            "unknown hemisphere reference {other:?}"
        ))),
    }
}

/// Encode signed decimal degrees as a rational triplet plus hemisphere
/// reference. Seconds carry two decimal places (`S*100/100`).
pub fn encode(decimal_degrees: f64, axis: Axis) -> (String, char) {
    let hemisphere = match axis {
        Axis::Latitude if decimal_degrees < 0.0 => 'S',
        Axis::Latitude => 'N',
        Axis::Longitude if decimal_degrees < 0.0 => 'W',
        Axis::Longitude => 'E',
    };

    let abs = decimal_degrees.abs();
    let degrees = abs.trunc() as u32;
    let minutes_f = (abs - degrees as f64) * 60.0;
    let minutes = minutes_f.trunc() as u32;
    let seconds_centi = ((minutes_f - minutes as f64) * 60.0 * 100.0).round() as u32;

    (
        format!("{degrees}/1,{minutes}/1,{seconds_centi}/100"),
        hemisphere,
    )
}
