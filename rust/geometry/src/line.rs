// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Section line: an immutable polyline with measured chainage
//!
//! Geometric operations (nearest point, clipping, buffering) run in map
//! coordinates. Distances along the line ("chainage") are measured with the
//! line's [`DistanceMeasurer`], so a geographic section reports metres while
//! its geometry stays in degrees.

use geo::{Coord, LineString, Rect};
use nalgebra::{Point2, Vector2};

use crate::distance::DistanceMeasurer;
use crate::error::{Error, Result};

/// Upper bound on vertices produced by a single densification
const MAX_DENSIFIED_VERTICES: usize = 10_000_000;

/// Relative tolerance used to drop zero-length steps
const STEP_EPSILON: f64 = 1e-9;

/// Result of projecting a point onto the section line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineProjection {
    /// Nearest point on the line
    pub point: Point2<f64>,
    /// Index of the segment holding the nearest point
    pub segment: usize,
    /// Position within that segment, [0, 1]
    pub t: f64,
    /// Measured distance from the line start to `point`
    pub distance: f64,
    /// Planar distance from the projected point to the original point
    pub offset: f64,
}

/// A vertex of a densified line with its measured distance from the start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensifiedVertex {
    pub point: Point2<f64>,
    pub distance: f64,
}

/// Immutable section polyline
#[derive(Debug, Clone, PartialEq)]
pub struct SectionLine {
    vertices: Vec<Point2<f64>>,
    /// Measured distance at each vertex, starting at 0
    chainage: Vec<f64>,
    measurer: DistanceMeasurer,
}

impl SectionLine {
    /// Create a planar section line
    pub fn new(vertices: Vec<Point2<f64>>) -> Result<Self> {
        Self::with_measurer(vertices, DistanceMeasurer::planar())
    }

    /// Create a section line measured with the given measurer
    ///
    /// Consecutive duplicate vertices are removed. Fails if the line has no
    /// vertices, non-finite coordinates, or no length.
    pub fn with_measurer(vertices: Vec<Point2<f64>>, measurer: DistanceMeasurer) -> Result<Self> {
        if vertices.is_empty() {
            return Err(Error::EmptyGeometry("section line has no vertices".to_string()));
        }
        if vertices.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(Error::NonFinite("section line vertex".to_string()));
        }

        let mut cleaned: Vec<Point2<f64>> = Vec::with_capacity(vertices.len());
        for p in vertices {
            if cleaned.last().map_or(true, |last| *last != p) {
                cleaned.push(p);
            }
        }
        if cleaned.len() < 2 {
            return Err(Error::Degenerate(
                "section line needs at least two distinct vertices".to_string(),
            ));
        }

        let measurer = measurer.checked_for(&cleaned);
        let mut chainage = Vec::with_capacity(cleaned.len());
        let mut total = 0.0;
        chainage.push(0.0);
        for w in cleaned.windows(2) {
            total += measurer.measure(&w[0], &w[1]);
            chainage.push(total);
        }
        if total <= 0.0 || !total.is_finite() {
            return Err(Error::Degenerate("section line has zero length".to_string()));
        }

        Ok(Self {
            vertices: cleaned,
            chainage,
            measurer,
        })
    }

    /// Create a planar section line from coordinate pairs
    pub fn from_coords(coords: &[(f64, f64)]) -> Result<Self> {
        Self::new(coords.iter().map(|&(x, y)| Point2::new(x, y)).collect())
    }

    /// Create a section line from a geo line string
    pub fn from_line_string(line: &LineString<f64>, measurer: DistanceMeasurer) -> Result<Self> {
        Self::with_measurer(
            line.coords().map(|c| Point2::new(c.x, c.y)).collect(),
            measurer,
        )
    }

    #[inline]
    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    /// Measured distance of every vertex from the start
    #[inline]
    pub fn chainage(&self) -> &[f64] {
        &self.chainage
    }

    #[inline]
    pub fn measurer(&self) -> &DistanceMeasurer {
        &self.measurer
    }

    #[inline]
    pub fn start(&self) -> Point2<f64> {
        self.vertices[0]
    }

    #[inline]
    pub fn end(&self) -> Point2<f64> {
        self.vertices[self.vertices.len() - 1]
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// Measured length of the line
    #[inline]
    pub fn length(&self) -> f64 {
        self.chainage[self.chainage.len() - 1]
    }

    /// Length in map units
    pub fn planar_length(&self) -> f64 {
        self.vertices
            .windows(2)
            .map(|w| nalgebra::distance(&w[0], &w[1]))
            .sum()
    }

    /// Bearing from the first to the last vertex, degrees clockwise from north
    pub fn azimuth(&self) -> f64 {
        bearing(&self.start(), &self.end())
    }

    /// Bearing of one segment, degrees clockwise from north
    pub fn segment_azimuth(&self, segment: usize) -> f64 {
        let i = segment.min(self.segment_count() - 1);
        bearing(&self.vertices[i], &self.vertices[i + 1])
    }

    pub fn bounding_rect(&self) -> Rect<f64> {
        let mut min = Coord {
            x: f64::INFINITY,
            y: f64::INFINITY,
        };
        let mut max = Coord {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        };
        for p in &self.vertices {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Rect::new(min, max)
    }

    pub fn to_line_string(&self) -> LineString<f64> {
        LineString::from(
            self.vertices
                .iter()
                .map(|p| (p.x, p.y))
                .collect::<Vec<_>>(),
        )
    }

    /// Point on the segment `segment` at parameter `t`
    #[inline]
    pub fn point_on_segment(&self, segment: usize, t: f64) -> Point2<f64> {
        let a = self.vertices[segment];
        let b = self.vertices[segment + 1];
        a + (b - a) * t
    }

    /// Measured distance from the line start to a point on a segment
    pub fn distance_on_segment(&self, segment: usize, t: f64) -> f64 {
        if t <= 0.0 {
            return self.chainage[segment];
        }
        if t >= 1.0 {
            return self.chainage[segment + 1];
        }
        let p = self.point_on_segment(segment, t);
        (self.chainage[segment] + self.measurer.measure(&self.vertices[segment], &p))
            .min(self.chainage[segment + 1])
    }

    /// Nearest point on the line to `point`
    ///
    /// Ties between segments resolve to the earliest segment.
    pub fn project(&self, point: &Point2<f64>) -> LineProjection {
        let mut best_segment = 0;
        let mut best_t = 0.0;
        let mut best_dist_sq = f64::INFINITY;

        for (i, w) in self.vertices.windows(2).enumerate() {
            let (t, dist_sq) = closest_on_segment(&w[0], &w[1], point);
            if dist_sq < best_dist_sq {
                best_dist_sq = dist_sq;
                best_segment = i;
                best_t = t;
            }
        }

        let projected = self.point_on_segment(best_segment, best_t);
        LineProjection {
            point: projected,
            segment: best_segment,
            t: best_t,
            distance: self.distance_on_segment(best_segment, best_t),
            offset: best_dist_sq.sqrt(),
        }
    }

    /// Measured distance along the line of the nearest point to `point`
    pub fn locate(&self, point: &Point2<f64>) -> f64 {
        self.project(point).distance
    }

    /// Point at a measured distance from the start (clamped to the line)
    pub fn interpolate(&self, distance: f64) -> Point2<f64> {
        if distance <= 0.0 {
            return self.start();
        }
        if distance >= self.length() {
            return self.end();
        }
        // First vertex whose chainage exceeds the distance
        let upper = self.chainage.partition_point(|&c| c <= distance);
        let segment = upper.saturating_sub(1).min(self.segment_count() - 1);
        let span = self.chainage[segment + 1] - self.chainage[segment];
        let t = if span > 0.0 {
            (distance - self.chainage[segment]) / span
        } else {
            0.0
        };
        self.point_on_segment(segment, t)
    }

    /// Densifies the line so consecutive vertices are at most `interval` apart.
    ///
    /// Original vertices are kept. Inside each segment, vertices are placed
    /// every `interval` map units from the segment start, so the last step of
    /// a segment may be shorter. Distances are the running sum of measured
    /// distances between consecutive vertices.
    pub fn densify(&self, interval: f64) -> Result<Vec<DensifiedVertex>> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "densification interval must be a positive number, got {}",
                interval
            )));
        }

        let expected = (self.planar_length() / interval).ceil() + self.vertices.len() as f64;
        if expected > MAX_DENSIFIED_VERTICES as f64 {
            return Err(Error::Operation(format!(
                "densifying a line of length {:.3} at interval {} would produce {} vertices",
                self.planar_length(),
                interval,
                expected
            )));
        }

        let mut out = Vec::with_capacity(expected as usize);
        let mut distance = 0.0;
        let mut prev = self.start();
        out.push(DensifiedVertex {
            point: prev,
            distance,
        });

        for w in self.vertices.windows(2) {
            let (a, b) = (w[0], w[1]);
            let seg_len = nalgebra::distance(&a, &b);
            let direction = (b - a) / seg_len;
            let tolerance = seg_len * STEP_EPSILON;

            let mut k = 1usize;
            loop {
                let along = k as f64 * interval;
                if along >= seg_len - tolerance {
                    break;
                }
                let p = a + direction * along;
                distance += self.measurer.measure(&prev, &p);
                out.push(DensifiedVertex { point: p, distance });
                prev = p;
                k += 1;
            }

            distance += self.measurer.measure(&prev, &b);
            out.push(DensifiedVertex { point: b, distance });
            prev = b;
        }

        Ok(out)
    }
}

/// Bearing from `a` to `b` in degrees clockwise from north, [0, 360)
pub fn bearing(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let d = *b - *a;
    xsection_core::normalize_azimuth(d.x.atan2(d.y).to_degrees())
}

/// Parameter and squared distance of the closest point on segment `ab` to `p`
#[inline]
pub(crate) fn closest_on_segment(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> (f64, f64) {
    let ab: Vector2<f64> = *b - *a;
    let len_sq = ab.norm_squared();
    let t = if len_sq > 0.0 {
        ((*p - *a).dot(&ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = *a + ab * t;
    (t, (*p - closest).norm_squared())
}
