// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topographic profile sampling
//!
//! Densifies the section line at a fixed interval and samples the elevation
//! surface at every vertex. The resulting [`MasterProfile`] also serves as the
//! elevation lookup for geology boundaries.

use xsection_core::{Error, ProfilePoint, Result};
use xsection_geometry::{Point2, RasterSampler, SectionLine};

/// One sampled vertex of the densified section line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSample {
    pub distance: f64,
    /// Map position; absent for profiles rebuilt from plain points
    pub point: Option<Point2<f64>>,
    pub elevation: f64,
    /// False when the surface had no value and the elevation was set to 0.0
    pub sampled: bool,
}

/// The topographic profile together with its per-vertex lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct MasterProfile {
    samples: Vec<ProfileSample>,
}

impl MasterProfile {
    pub fn new(samples: Vec<ProfileSample>) -> Self {
        Self { samples }
    }

    /// Profile without map positions, e.g. from a previous run
    pub fn from_points(points: Vec<ProfilePoint>) -> Self {
        Self {
            samples: points
                .into_iter()
                .map(|p| ProfileSample {
                    distance: p.distance,
                    point: None,
                    elevation: p.elevation,
                    sampled: true,
                })
                .collect(),
        }
    }

    pub fn samples(&self) -> &[ProfileSample] {
        &self.samples
    }

    pub fn points(&self) -> Vec<ProfilePoint> {
        self.samples
            .iter()
            .map(|s| ProfilePoint::new(s.distance, s.elevation))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of vertices where the surface had no value
    pub fn missing_samples(&self) -> usize {
        self.samples.iter().filter(|s| !s.sampled).count()
    }

    /// Distance of the last sample
    pub fn length(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.distance)
    }

    /// Linearly interpolated elevation at `distance`, clamped to the ends
    pub fn elevation_at(&self, distance: f64) -> f64 {
        let (Some(first), Some(last)) = (self.samples.first(), self.samples.last()) else {
            return 0.0;
        };
        if distance <= first.distance {
            return first.elevation;
        }
        if distance >= last.distance {
            return last.elevation;
        }

        let upper = self.samples.partition_point(|s| s.distance <= distance);
        let (a, b) = (&self.samples[upper - 1], &self.samples[upper]);
        let span = b.distance - a.distance;
        if span <= 0.0 {
            return a.elevation;
        }
        let t = (distance - a.distance) / span;
        a.elevation + (b.elevation - a.elevation) * t
    }

    /// Samples strictly between `start` and `end`, ignoring those within
    /// `epsilon` of either bound
    pub fn points_between(&self, start: f64, end: f64, epsilon: f64) -> impl Iterator<Item = ProfilePoint> + '_ {
        let from = self.samples.partition_point(|s| s.distance <= start + epsilon);
        self.samples[from..]
            .iter()
            .take_while(move |s| s.distance < end - epsilon)
            .map(|s| ProfilePoint::new(s.distance, s.elevation))
    }
}

/// Checks a 1-based band index against the raster
pub fn validate_band(raster: &dyn RasterSampler, band: usize) -> Result<()> {
    if band < 1 {
        return Err(Error::Validation(format!(
            "band index must be >= 1, got {}",
            band
        )));
    }
    if band > raster.band_count() {
        return Err(Error::Validation(format!(
            "band {} requested but raster '{}' has {} band(s)",
            band,
            raster.source_id(),
            raster.band_count()
        )));
    }
    Ok(())
}

/// Resolves the sampling interval: explicit, else the raster's resolution
pub fn resolve_interval(raster: &dyn RasterSampler, interval: Option<f64>) -> Result<f64> {
    match interval {
        Some(i) if i.is_finite() && i > 0.0 => Ok(i),
        Some(i) => Err(Error::Validation(format!(
            "sampling interval must be a positive number, got {}",
            i
        ))),
        None => {
            let res = raster.resolution_x();
            if res.is_finite() && res > 0.0 {
                Ok(res)
            } else {
                Err(Error::Validation(format!(
                    "raster '{}' has no usable resolution ({})",
                    raster.source_id(),
                    res
                )))
            }
        }
    }
}

/// Elevation at `point`; a missing sample is 0.0
#[inline]
pub fn sample_elevation(raster: &dyn RasterSampler, point: &Point2<f64>, band: usize) -> f64 {
    raster.sample(point, band).unwrap_or(0.0)
}

/// Samples the master profile along the line
pub fn sample_profile(
    line: &SectionLine,
    raster: &dyn RasterSampler,
    band: usize,
    interval: Option<f64>,
) -> Result<MasterProfile> {
    validate_band(raster, band)?;
    let interval = resolve_interval(raster, interval)?;

    let vertices = line.densify(interval)?;
    let samples: Vec<ProfileSample> = vertices
        .into_iter()
        .map(|v| {
            let value = raster.sample(&v.point, band);
            ProfileSample {
                distance: v.distance,
                point: Some(v.point),
                elevation: value.unwrap_or(0.0),
                sampled: value.is_some(),
            }
        })
        .collect();

    let profile = MasterProfile::new(samples);
    tracing::debug!(
        raster = raster.source_id(),
        band,
        interval,
        samples = profile.len(),
        missing = profile.missing_samples(),
        "Sampled topographic profile"
    );
    Ok(profile)
}

/// Topographic profile of the section line
pub fn generate_profile(
    line: &SectionLine,
    raster: &dyn RasterSampler,
    band: usize,
    interval: Option<f64>,
) -> Result<Vec<ProfilePoint>> {
    Ok(sample_profile(line, raster, band, interval)?.points())
}
