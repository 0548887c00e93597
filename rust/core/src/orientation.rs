// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Strike/dip notation parsing and apparent dip
//!
//! Field data records orientations either as plain numbers or in compass
//! notation. Strike accepts quadrant bearings (`N 30 E`, `S15W`); dip accepts
//! an angle optionally followed by a cardinal dip direction (`45 NE`).
//! Parsers return `None` for anything they do not understand so callers can
//! skip the feature instead of failing the batch.

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit0, digit1, one_of, space0},
    combinator::{all_consuming, map_res, opt, recognize, value},
    sequence::{pair, terminated, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

/// Below this, `sin(strike - azimuth)` is treated as exactly zero
const PARALLEL_EPSILON: f64 = 1e-12;

/// Parsed dip value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DipReading {
    /// Dip angle in degrees
    pub angle: f64,
    /// Dip direction azimuth in degrees, when given in cardinal notation
    pub direction: Option<f64>,
}

/// Unsigned decimal: 30, 30., 30.5 (optionally followed by a degree sign)
fn angle(input: &str) -> IResult<&str, f64> {
    terminated(
        map_res(
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            |s: &str| s.parse::<f64>(),
        ),
        opt(char('°')),
    )(input)
}

/// Signed decimal for bare values
fn signed_angle(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((opt(one_of("+-")), digit1, opt(pair(char('.'), digit0))))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

fn bare_value(input: &str) -> IResult<&str, f64> {
    terminated(signed_angle, opt(char('°')))(input)
}

/// Quadrant bearing: `[N|S] <angle> [E|W]`
fn quadrant_bearing(input: &str) -> IResult<&str, f64> {
    let (rest, (from, _, deg, _, toward)) =
        tuple((one_of("NSns"), space0, angle, space0, one_of("EWew")))(input)?;

    let bearing = match (from.to_ascii_uppercase(), toward.to_ascii_uppercase()) {
        ('N', 'E') => deg,
        ('N', _) => 360.0 - deg,
        ('S', 'E') => 180.0 - deg,
        _ => 180.0 + deg,
    };
    Ok((rest, bearing.rem_euclid(360.0)))
}

/// Cardinal or intercardinal direction as an azimuth
fn cardinal(input: &str) -> IResult<&str, f64> {
    // Two-letter directions first so "NE" is not read as "N"
    alt((
        value(45.0, tag_no_case("NE")),
        value(315.0, tag_no_case("NW")),
        value(135.0, tag_no_case("SE")),
        value(225.0, tag_no_case("SW")),
        value(0.0, tag_no_case("N")),
        value(90.0, tag_no_case("E")),
        value(180.0, tag_no_case("S")),
        value(270.0, tag_no_case("W")),
    ))(input)
}

fn dip_with_direction(input: &str) -> IResult<&str, DipReading> {
    let (rest, (deg, _, direction)) = tuple((angle, space0, opt(cardinal)))(input)?;
    Ok((
        rest,
        DipReading {
            angle: deg,
            direction,
        },
    ))
}

/// Parses a strike value: a bare number or a quadrant bearing.
///
/// Bare numbers are returned as written; range checking is left to the
/// caller. Quadrant bearings are normalised into [0, 360).
pub fn parse_strike(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok((_, v)) = all_consuming(bare_value)(t) {
        return Some(v);
    }
    all_consuming(quadrant_bearing)(t).ok().map(|(_, v)| v)
}

/// Parses a dip value: a bare number or `<angle> <cardinal>`
pub fn parse_dip(text: &str) -> Option<DipReading> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok((_, v)) = all_consuming(bare_value)(t) {
        return Some(DipReading {
            angle: v,
            direction: None,
        });
    }
    all_consuming(dip_with_direction)(t).ok().map(|(_, d)| d)
}

/// Strike is valid in [0, 360)
#[inline]
pub fn is_valid_strike(strike: f64) -> bool {
    strike.is_finite() && (0.0..360.0).contains(&strike)
}

/// Dip is valid in [0, 90]
#[inline]
pub fn is_valid_dip(dip: f64) -> bool {
    dip.is_finite() && (0.0..=90.0).contains(&dip)
}

/// Normalises an azimuth into [0, 360)
#[inline]
pub fn normalize_azimuth(azimuth: f64) -> f64 {
    let a = azimuth.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

/// Right-hand-rule strike for a dip direction
#[inline]
pub fn strike_from_dip_direction(dip_direction: f64) -> f64 {
    normalize_azimuth(dip_direction - 90.0)
}

/// Apparent dip of a plane cut by a section of the given azimuth.
///
/// `atan(tan(dip) * sin(strike - azimuth))`, evaluated as
/// `atan2(sin(dip) * sin(β), cos(dip))` so vertical planes stay finite.
/// All angles in degrees; the result is signed and `|result| <= dip`.
pub fn apparent_dip(strike: f64, true_dip: f64, section_azimuth: f64) -> f64 {
    let beta = (strike - section_azimuth).to_radians();
    let mut s = beta.sin();
    if s.abs() < PARALLEL_EPSILON {
        s = 0.0;
    }
    let dip = true_dip.to_radians();
    (dip.sin() * s).atan2(dip.cos()).to_degrees()
}
