// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Section buffer
//!
//! The buffer around the section line is kept analytic: a point lies in the
//! buffer when its planar distance to the polyline is within the buffer
//! distance. This is the exact round-capped buffer, so no polygon outline is
//! needed for the intersects test. Its bounding rectangle drives the coarse
//! spatial-index query.

use geo::{Coord, Rect};
use nalgebra::Point2;

use crate::error::{Error, Result};
use crate::line::{closest_on_segment, LineProjection, SectionLine};

/// Absolute slack on the containment test to absorb rounding
const CONTAINS_EPSILON: f64 = 1e-9;

/// Round-capped buffer around a section line
#[derive(Debug, Clone, Copy)]
pub struct SectionBuffer<'a> {
    line: &'a SectionLine,
    distance: f64,
}

impl<'a> SectionBuffer<'a> {
    /// Build a buffer of `distance` map units around `line`
    pub fn new(line: &'a SectionLine, distance: f64) -> Result<Self> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "buffer distance must be a finite number >= 0, got {}",
                distance
            )));
        }
        Ok(Self { line, distance })
    }

    #[inline]
    pub fn line(&self) -> &'a SectionLine {
        self.line
    }

    #[inline]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Bounding rectangle of the buffer
    pub fn bounding_rect(&self) -> Rect<f64> {
        let rect = self.line.bounding_rect();
        let (min, max) = (rect.min(), rect.max());
        Rect::new(
            Coord {
                x: min.x - self.distance,
                y: min.y - self.distance,
            },
            Coord {
                x: max.x + self.distance,
                y: max.y + self.distance,
            },
        )
    }

    /// Exact containment test
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        let limit = self.distance + CONTAINS_EPSILON;
        let limit_sq = limit * limit;
        self.line
            .vertices()
            .windows(2)
            .any(|w| closest_on_segment(&w[0], &w[1], point).1 <= limit_sq)
    }

    /// Projects `point` onto the line if it lies in the buffer
    pub fn project_within(&self, point: &Point2<f64>) -> Option<LineProjection> {
        let projection = self.line.project(point);
        (projection.offset <= self.distance + CONTAINS_EPSILON).then_some(projection)
    }
}
