// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line/polygon intersection
//!
//! Clips the section line against outcrop polygons with `geo`'s sweep-line
//! boolean operations. The inside pieces are then measured along the section
//! line and pieces that touch end to end are joined, so a polygon yields
//! zero, one or several disjoint pieces in line order.

use geo::{BooleanOps, MultiLineString, MultiPolygon, Polygon};
use nalgebra::Point2;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::line::SectionLine;

/// Relative gap below which two pieces are joined
const JOIN_EPSILON: f64 = 1e-9;

/// Pieces are usually few; keep them on the stack
pub type Pieces = SmallVec<[LinePiece; 2]>;

/// One continuous piece of the section line inside a polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePiece {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    /// Measured distance of `start` from the line start
    pub start_distance: f64,
    /// Measured distance of `end` from the line start
    pub end_distance: f64,
}

impl LinePiece {
    #[inline]
    pub fn length(&self) -> f64 {
        self.end_distance - self.start_distance
    }
}

/// Intersects the section line with a polygon
pub fn clip_line_by_polygon(line: &SectionLine, polygon: &Polygon<f64>) -> Result<Pieces> {
    validate_polygon(polygon)?;
    let clipped = polygon.clip(&MultiLineString::new(vec![line.to_line_string()]), false);
    Ok(measure_pieces(line, &clipped))
}

/// Intersects the section line with every part of a multipolygon.
///
/// Pieces are sorted by start distance.
pub fn clip_line_by_multipolygon(line: &SectionLine, polygons: &MultiPolygon<f64>) -> Result<Pieces> {
    let mut pieces = Pieces::new();
    for polygon in polygons.iter() {
        pieces.extend(clip_line_by_polygon(line, polygon)?);
    }
    pieces.sort_by(|a, b| a.start_distance.total_cmp(&b.start_distance));
    Ok(pieces)
}

/// Turns clipped line strings into ordered pieces measured along `line`
fn measure_pieces(line: &SectionLine, clipped: &MultiLineString<f64>) -> Pieces {
    let mut pieces: Pieces = clipped
        .iter()
        .filter_map(|ls| {
            let first = ls.0.first()?;
            let last = ls.0.last()?;
            let a = Point2::new(first.x, first.y);
            let b = Point2::new(last.x, last.y);
            let (da, db) = (line.locate(&a), line.locate(&b));
            // Output orientation follows the sweep, not the section line
            Some(if da <= db {
                LinePiece { start: a, end: b, start_distance: da, end_distance: db }
            } else {
                LinePiece { start: b, end: a, start_distance: db, end_distance: da }
            })
        })
        .collect();
    pieces.sort_by(|a, b| a.start_distance.total_cmp(&b.start_distance));

    let tolerance = JOIN_EPSILON * line.length().max(1.0);
    let mut joined = Pieces::new();
    for piece in pieces {
        match joined.last_mut() {
            Some(last) if piece.start_distance - last.end_distance <= tolerance => {
                if piece.end_distance > last.end_distance {
                    last.end = piece.end;
                    last.end_distance = piece.end_distance;
                }
            }
            _ => joined.push(piece),
        }
    }
    joined.retain(|piece| piece.length() > 0.0);
    joined
}

fn validate_polygon(polygon: &Polygon<f64>) -> Result<()> {
    let finite = std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .flat_map(|ring| ring.coords())
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if !finite {
        return Err(Error::Operation(
            "polygon has non-finite coordinates".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]
    }

    #[test]
    fn line_crossing_square() {
        let line = SectionLine::from_coords(&[(0.0, 0.0), (100.0, 0.0)]).unwrap();
        let pieces = clip_line_by_polygon(&line, &square(20.0, -10.0, 40.0, 10.0)).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_relative_eq!(pieces[0].start_distance, 20.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[0].end_distance, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn westward_line_is_measured_from_its_start() {
        let line = SectionLine::from_coords(&[(100.0, 0.0), (0.0, 0.0)]).unwrap();
        let pieces = clip_line_by_polygon(&line, &square(20.0, -10.0, 40.0, 10.0)).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_relative_eq!(pieces[0].start_distance, 60.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[0].end_distance, 80.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[0].start.x, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn line_missing_polygon() {
        let line = SectionLine::from_coords(&[(0.0, 0.0), (100.0, 0.0)]).unwrap();
        let pieces = clip_line_by_polygon(&line, &square(20.0, 5.0, 40.0, 10.0)).unwrap();
        assert!(pieces.is_empty());
    }

    #[test]
    fn line_starting_inside() {
        let line = SectionLine::from_coords(&[(0.0, 0.0), (100.0, 0.0)]).unwrap();
        let pieces = clip_line_by_polygon(&line, &square(-5.0, -5.0, 30.0, 5.0)).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_relative_eq!(pieces[0].start_distance, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[0].end_distance, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn concave_polygon_yields_two_pieces() {
        // U shape open to the north, the line crosses both arms
        let u = polygon![
            (x: 10.0, y: -10.0),
            (x: 50.0, y: -10.0),
            (x: 50.0, y: 10.0),
            (x: 40.0, y: 10.0),
            (x: 40.0, y: -5.0),
            (x: 20.0, y: -5.0),
            (x: 20.0, y: 10.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: -10.0),
        ];
        let line = SectionLine::from_coords(&[(0.0, 0.0), (100.0, 0.0)]).unwrap();
        let pieces = clip_line_by_polygon(&line, &u).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_relative_eq!(pieces[0].start_distance, 10.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[0].end_distance, 20.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[1].start_distance, 40.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[1].end_distance, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn polygon_hole_splits_piece() {
        let outer = square(0.0, -10.0, 60.0, 10.0);
        let hole = square(20.0, -5.0, 30.0, 5.0);
        let with_hole = Polygon::new(outer.exterior().clone(), vec![hole.exterior().clone()]);
        let line = SectionLine::from_coords(&[(-10.0, 0.0), (100.0, 0.0)]).unwrap();
        let pieces = clip_line_by_polygon(&line, &with_hole).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_relative_eq!(pieces[0].start_distance, 10.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[0].end_distance, 30.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[1].start_distance, 40.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[1].end_distance, 70.0, epsilon = 1e-9);
    }

    #[test]
    fn piece_continues_across_vertex() {
        let line = SectionLine::from_coords(&[(0.0, 0.0), (30.0, 0.0), (30.0, 30.0)]).unwrap();
        let pieces = clip_line_by_polygon(&line, &square(20.0, -10.0, 40.0, 20.0)).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_relative_eq!(pieces[0].start_distance, 20.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[0].end_distance, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn multipolygon_pieces_sorted() {
        let line = SectionLine::from_coords(&[(0.0, 0.0), (100.0, 0.0)]).unwrap();
        let mp = MultiPolygon::new(vec![
            square(60.0, -1.0, 70.0, 1.0),
            square(10.0, -1.0, 15.0, 1.0),
        ]);
        let pieces = clip_line_by_multipolygon(&line, &mp).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_relative_eq!(pieces[0].start_distance, 10.0, epsilon = 1e-9);
        assert_relative_eq!(pieces[1].start_distance, 60.0, epsilon = 1e-9);
    }

    #[test]
    fn non_finite_polygon_fails() {
        let line = SectionLine::from_coords(&[(0.0, 0.0), (100.0, 0.0)]).unwrap();
        let bad = square(f64::NAN, 0.0, 1.0, 1.0);
        assert!(matches!(
            clip_line_by_polygon(&line, &bad),
            Err(Error::Operation(_))
        ));
    }
}
