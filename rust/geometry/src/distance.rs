// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CRS-aware distance measurement
//!
//! Projected coordinate systems are measured in the plane. Geographic
//! coordinate systems (longitude/latitude in degrees) are measured on the
//! WGS84 ellipsoid. A missing or invalid CRS falls back to planar Euclidean
//! distance and records a warning instead of failing.

use geo::{GeodesicDistance, Point};
use nalgebra::Point2;

const OUT_OF_RANGE_WARNING: &str =
    "coordinates outside longitude/latitude range; distances measured as planar Euclidean";

/// Kind of coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Planar map units (e.g. UTM metres)
    Projected,
    /// Longitude/latitude in degrees
    Geographic,
}

/// Coordinate reference system of the section data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs {
    /// Authority identifier, e.g. "EPSG:32719"
    pub authid: String,
    pub kind: CrsKind,
}

impl Crs {
    pub fn projected(authid: impl Into<String>) -> Self {
        Self {
            authid: authid.into(),
            kind: CrsKind::Projected,
        }
    }

    pub fn geographic(authid: impl Into<String>) -> Self {
        Self {
            authid: authid.into(),
            kind: CrsKind::Geographic,
        }
    }

    /// A CRS without an authority identifier cannot be trusted
    pub fn is_valid(&self) -> bool {
        !self.authid.trim().is_empty()
    }
}

/// How distances are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMode {
    Planar,
    Geodesic,
}

/// Measures distances between two points according to the active CRS
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMeasurer {
    mode: DistanceMode,
    authid: Option<String>,
    warning: Option<String>,
}

impl DistanceMeasurer {
    /// Planar measurement chosen explicitly by the caller
    pub fn planar() -> Self {
        Self {
            mode: DistanceMode::Planar,
            authid: None,
            warning: None,
        }
    }

    /// Measurer for the given CRS; falls back to planar when it is missing or invalid
    pub fn for_crs(crs: Option<&Crs>) -> Self {
        match crs {
            Some(crs) if crs.is_valid() => Self {
                mode: match crs.kind {
                    CrsKind::Projected => DistanceMode::Planar,
                    CrsKind::Geographic => DistanceMode::Geodesic,
                },
                authid: Some(crs.authid.clone()),
                warning: None,
            },
            Some(_) => Self::fallback("invalid CRS; distances measured as planar Euclidean"),
            None => Self::fallback("no CRS set; distances measured as planar Euclidean"),
        }
    }

    /// Falls back to planar measurement when a geodesic measurer meets
    /// coordinates that are not longitude/latitude degrees
    pub fn checked_for(self, vertices: &[Point2<f64>]) -> Self {
        if self.mode == DistanceMode::Geodesic && !vertices.iter().all(is_lon_lat) {
            return Self::fallback(OUT_OF_RANGE_WARNING);
        }
        self
    }

    fn fallback(warning: &str) -> Self {
        tracing::warn!(warning, "Falling back to planar distance measurement");
        Self {
            mode: DistanceMode::Planar,
            authid: None,
            warning: Some(warning.to_string()),
        }
    }

    #[inline]
    pub fn mode(&self) -> DistanceMode {
        self.mode
    }

    pub fn authid(&self) -> Option<&str> {
        self.authid.as_deref()
    }

    /// Warning recorded when the measurer fell back to planar distance
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Distance between two points
    pub fn measure(&self, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
        match self.mode {
            DistanceMode::Planar => nalgebra::distance(a, b),
            DistanceMode::Geodesic => {
                if !is_lon_lat(a) || !is_lon_lat(b) {
                    tracing::warn!(
                        a = ?(a.x, a.y),
                        b = ?(b.x, b.y),
                        "{}",
                        OUT_OF_RANGE_WARNING
                    );
                    return nalgebra::distance(a, b);
                }
                Point::new(a.x, a.y).geodesic_distance(&Point::new(b.x, b.y))
            }
        }
    }

    /// Length of a polyline through the given vertices
    pub fn measure_path(&self, vertices: &[Point2<f64>]) -> f64 {
        vertices
            .windows(2)
            .map(|w| self.measure(&w[0], &w[1]))
            .sum()
    }
}

impl Default for DistanceMeasurer {
    fn default() -> Self {
        Self::planar()
    }
}

#[inline]
fn is_lon_lat(p: &Point2<f64>) -> bool {
    (-180.0..=180.0).contains(&p.x) && (-90.0..=90.0).contains(&p.y)
}
