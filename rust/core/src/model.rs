// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Profile data model
//!
//! Every type here is created fresh per engine call and owned by the caller.
//! Distances are measured along the section line from its start.

use serde::{Deserialize, Serialize};

use crate::attributes::Attributes;

/// A sample of the section: distance along the line and elevation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub distance: f64,
    pub elevation: f64,
}

impl ProfilePoint {
    #[inline]
    pub fn new(distance: f64, elevation: f64) -> Self {
        Self {
            distance,
            elevation,
        }
    }
}

/// Checks that a sequence of profile points is ordered by distance
pub fn is_distance_sorted(points: &[ProfilePoint]) -> bool {
    points.windows(2).all(|w| w[0].distance <= w[1].distance)
}

/// One continuous intersection of a geological unit with the section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeologySegment {
    pub unit_name: String,
    pub attributes: Attributes,
    /// Ordered by distance
    pub points: Vec<ProfilePoint>,
}

impl GeologySegment {
    pub fn start_distance(&self) -> Option<f64> {
        self.points.first().map(|p| p.distance)
    }

    pub fn end_distance(&self) -> Option<f64> {
        self.points.last().map(|p| p.distance)
    }

    /// Length of the segment along the section
    pub fn length(&self) -> f64 {
        match (self.start_distance(), self.end_distance()) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }
}

/// A structural measurement projected onto the section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureMeasurement {
    pub distance: f64,
    pub elevation: f64,
    /// Signed apparent dip in degrees; magnitude never exceeds `original_dip`
    pub apparent_dip: f64,
    /// True dip in degrees, [0, 90]
    pub original_dip: f64,
    /// Strike azimuth in degrees, [0, 360)
    pub original_strike: f64,
    pub attributes: Attributes,
}

/// Drillhole collar resolved from a collar layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillholeCollar {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub elevation: f64,
    pub total_depth: f64,
}

/// Directional survey station; depth is strictly increasing within a hole
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurveyStation {
    pub depth: f64,
    /// Degrees clockwise from north, [0, 360)
    pub azimuth: f64,
    /// Degrees; -90 is straight down, 0 is horizontal
    pub inclination: f64,
}

impl SurveyStation {
    pub fn new(depth: f64, azimuth: f64, inclination: f64) -> Self {
        Self {
            depth,
            azimuth,
            inclination,
        }
    }

    /// Station assumed for a hole without survey data
    pub fn vertical() -> Self {
        Self::new(0.0, 0.0, -90.0)
    }
}

/// A reconstructed trajectory point together with its section projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub depth: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub distance_along_section: f64,
    pub offset_from_section: f64,
}

impl TrajectoryPoint {
    /// Position of the point in the section's 2D frame
    #[inline]
    pub fn to_profile_point(&self) -> ProfilePoint {
        ProfilePoint::new(self.distance_along_section, self.z)
    }
}

/// A down-hole interval (e.g. lithology) restricted to the section buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalSegment {
    pub hole_id: String,
    /// Interval attribute value, e.g. the lithology code
    pub attribute: String,
    pub from_depth: f64,
    pub to_depth: f64,
    pub attributes: Attributes,
    /// Never empty: intervals without qualifying points are dropped
    pub points: Vec<TrajectoryPoint>,
}

impl IntervalSegment {
    /// Section-frame representation, shared with outcrop geology
    pub fn to_geology_segment(&self) -> GeologySegment {
        GeologySegment {
            unit_name: self.attribute.clone(),
            attributes: self.attributes.clone(),
            points: self.points.iter().map(TrajectoryPoint::to_profile_point).collect(),
        }
    }
}

/// A drillhole projected onto the section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillholeTrace {
    pub hole_id: String,
    pub collar: DrillholeCollar,
    /// Full densified trajectory, collar first, ordered by depth
    pub trajectory: Vec<TrajectoryPoint>,
    pub intervals: Vec<IntervalSegment>,
    /// Buffer the trace was projected with
    pub buffer_distance: f64,
}

impl DrillholeTrace {
    /// The part of the trajectory inside the section buffer
    pub fn profile(&self) -> Vec<ProfilePoint> {
        self.trajectory
            .iter()
            .filter(|p| p.offset_from_section <= self.buffer_distance)
            .map(TrajectoryPoint::to_profile_point)
            .collect()
    }

    pub fn max_depth(&self) -> f64 {
        self.trajectory.last().map(|p| p.depth).unwrap_or(0.0)
    }
}
