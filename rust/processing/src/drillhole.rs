// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drillhole projection
//!
//! Each hole goes through three phases:
//!
//! 1. **Collar**: resolve id, position, elevation and total depth, project
//!    the collar onto the section and drop holes outside the buffer.
//! 2. **Trajectory**: rebuild the 3D path from the survey stations with the
//!    tangential method, densified at a fixed step. Holes drilled past their
//!    last station continue in a straight line with the last orientation;
//!    holes without surveys are vertical.
//! 3. **Intervals**: project every trajectory point onto the section and
//!    attach to each down-hole interval the points inside it and inside the
//!    buffer. Intervals that collect no point are dropped.

use geo::Geometry;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use xsection_core::{
    normalize_azimuth, Advisories, Attributes, DrillholeCollar, DrillholeTrace, Error,
    GeologySegment, IntervalSegment, Result, SurveyStation, TrajectoryPoint,
};
use xsection_geometry::{FeatureSource, Point2, RasterSampler, SectionLine};

use crate::config::DEFAULT_TRAJECTORY_STEP;
use crate::geology::UNKNOWN_UNIT;
use crate::profile::{sample_elevation, validate_band};
use crate::structure::validate_buffer_distance;

const ADVISORY_SOURCE: &str = "drillholes";

/// Upper bound on trajectory points generated for one hole
const MAX_TRAJECTORY_POINTS: f64 = 1_000_000.0;

/// Field names of the collar, survey and interval tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillholeFieldMapping {
    pub collar_id: String,
    /// Collar X/Y fields; the feature geometry is used when unset
    pub collar_x: Option<String>,
    pub collar_y: Option<String>,
    /// Collar elevation; the surface is sampled when unset or zero
    pub collar_z: Option<String>,
    pub collar_depth: Option<String>,

    pub survey_id: String,
    pub survey_depth: String,
    pub survey_azimuth: String,
    pub survey_inclination: String,

    pub interval_id: String,
    pub interval_from: String,
    pub interval_to: String,
    pub interval_lithology: String,
}

impl Default for DrillholeFieldMapping {
    fn default() -> Self {
        Self {
            collar_id: "hole_id".to_string(),
            collar_x: None,
            collar_y: None,
            collar_z: None,
            collar_depth: Some("depth".to_string()),
            survey_id: "hole_id".to_string(),
            survey_depth: "depth".to_string(),
            survey_azimuth: "azimuth".to_string(),
            survey_inclination: "inclination".to_string(),
            interval_id: "hole_id".to_string(),
            interval_from: "from".to_string(),
            interval_to: "to".to_string(),
            interval_lithology: "lithology".to_string(),
        }
    }
}

impl DrillholeFieldMapping {
    fn validate(&self, surveys: bool, intervals: bool) -> Result<()> {
        let mut required = vec![("collar id", &self.collar_id)];
        if surveys {
            required.extend([
                ("survey id", &self.survey_id),
                ("survey depth", &self.survey_depth),
                ("survey azimuth", &self.survey_azimuth),
                ("survey inclination", &self.survey_inclination),
            ]);
        }
        if intervals {
            required.extend([
                ("interval id", &self.interval_id),
                ("interval from", &self.interval_from),
                ("interval to", &self.interval_to),
                ("interval lithology", &self.interval_lithology),
            ]);
        }
        match required.iter().find(|(_, field)| field.trim().is_empty()) {
            Some((name, _)) => Err(Error::Validation(format!("{} field must not be empty", name))),
            None => Ok(()),
        }
    }
}

/// Projected drillholes: interval segments in section coordinates, the full
/// traces, and the anomalies met on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrillholeProjection {
    pub segments: Vec<GeologySegment>,
    pub traces: Vec<DrillholeTrace>,
    pub advisories: Advisories,
}

/// A down-hole interval read from the interval table
#[derive(Debug, Clone, PartialEq)]
struct Interval {
    from: f64,
    to: f64,
    lithology: String,
    attributes: Attributes,
}

/// Projects drillholes onto a section line
pub struct DrillholeProjector<'a> {
    line: &'a SectionLine,
    mapping: &'a DrillholeFieldMapping,
    buffer_distance: f64,
    step: f64,
    elevation: Option<(&'a dyn RasterSampler, usize)>,
}

impl<'a> DrillholeProjector<'a> {
    pub fn new(line: &'a SectionLine, mapping: &'a DrillholeFieldMapping, buffer_distance: f64) -> Result<Self> {
        validate_buffer_distance(buffer_distance)?;
        Ok(Self {
            line,
            mapping,
            buffer_distance,
            step: DEFAULT_TRAJECTORY_STEP,
            elevation: None,
        })
    }

    /// Spacing of densified trajectory points
    pub fn with_step(mut self, step: f64) -> Result<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(Error::Validation(format!(
                "trajectory step must be a positive number, got {}",
                step
            )));
        }
        self.step = step;
        Ok(self)
    }

    /// Surface sampled for collars without an elevation
    pub fn with_elevation(mut self, raster: &'a dyn RasterSampler, band: usize) -> Result<Self> {
        validate_band(raster, band)?;
        self.elevation = Some((raster, band));
        Ok(self)
    }

    pub fn project(
        &self,
        collars: &dyn FeatureSource,
        surveys: Option<&dyn FeatureSource>,
        intervals: Option<&dyn FeatureSource>,
    ) -> Result<DrillholeProjection> {
        self.mapping.validate(surveys.is_some(), intervals.is_some())?;

        let mut advisories = Advisories::new();
        let surveys_by_hole = match surveys {
            Some(source) => self.read_surveys(source, &mut advisories),
            None => FxHashMap::default(),
        };
        let intervals_by_hole = match intervals {
            Some(source) => self.read_intervals(source, &mut advisories),
            None => FxHashMap::default(),
        };

        let mut traces: Vec<DrillholeTrace> = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();

        for feature in collars.features() {
            let Some(collar) = self.resolve_collar(&feature.attributes, feature.geometry.as_ref(), &mut advisories)
            else {
                continue;
            };
            if !seen.insert(collar.id.clone()) {
                advisories.push(ADVISORY_SOURCE, "duplicate collar id; first kept");
                continue;
            }

            let projection = self.line.project(&Point2::new(collar.x, collar.y));
            if projection.offset > self.buffer_distance {
                tracing::debug!(hole = %collar.id, offset = projection.offset, "Collar outside section buffer");
                continue;
            }

            let stations = surveys_by_hole
                .get(&collar.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let path = match reconstruct_trajectory(&collar, stations, self.step) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(hole = %collar.id, error = %e, "Trajectory reconstruction failed");
                    advisories.push(ADVISORY_SOURCE, format!("hole {} skipped: {}", collar.id, e));
                    continue;
                }
            };
            let trajectory = self.project_trajectory(&path);

            let hole_intervals = intervals_by_hole
                .get(&collar.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let interval_segments = self.attach_intervals(&collar.id, &trajectory, hole_intervals);

            traces.push(DrillholeTrace {
                hole_id: collar.id.clone(),
                collar,
                trajectory,
                intervals: interval_segments,
                buffer_distance: self.buffer_distance,
            });
        }

        let segments = traces
            .iter()
            .flat_map(|t| t.intervals.iter().map(IntervalSegment::to_geology_segment))
            .collect();

        tracing::debug!(
            collars = collars.source_id(),
            holes = traces.len(),
            buffer = self.buffer_distance,
            "Projected drillholes"
        );
        Ok(DrillholeProjection {
            segments,
            traces,
            advisories,
        })
    }

    /// Phase A. Returns `None` for holes that cannot be placed.
    fn resolve_collar(
        &self,
        attributes: &Attributes,
        geometry: Option<&Geometry<f64>>,
        advisories: &mut Advisories,
    ) -> Option<DrillholeCollar> {
        let id = match attributes.text(&self.mapping.collar_id) {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => {
                advisories.push(ADVISORY_SOURCE, "collar without id skipped");
                return None;
            }
        };

        let from_fields = match (&self.mapping.collar_x, &self.mapping.collar_y) {
            (Some(fx), Some(fy)) => attributes
                .number(fx)
                .zip(attributes.number(fy))
                .filter(|(x, y)| x.is_finite() && y.is_finite()),
            _ => None,
        };
        let from_geometry = || match geometry {
            Some(Geometry::Point(p)) if p.x().is_finite() && p.y().is_finite() => Some((p.x(), p.y())),
            _ => None,
        };
        let Some((x, y)) = from_fields.or_else(from_geometry) else {
            advisories.push(ADVISORY_SOURCE, "collar without valid position skipped");
            return None;
        };

        let z = self
            .mapping
            .collar_z
            .as_deref()
            .and_then(|f| attributes.number(f))
            .filter(|z| z.is_finite() && *z != 0.0);
        let elevation = match (z, self.elevation) {
            (Some(z), _) => z,
            (None, Some((raster, band))) => sample_elevation(raster, &Point2::new(x, y), band),
            (None, None) => 0.0,
        };

        let total_depth = match self.mapping.collar_depth.as_deref().and_then(|f| attributes.number(f)) {
            Some(d) if d.is_finite() && d >= 0.0 => d,
            Some(_) => {
                advisories.push(ADVISORY_SOURCE, "invalid total depth treated as 0");
                0.0
            }
            None => 0.0,
        };

        Some(DrillholeCollar {
            id,
            x,
            y,
            elevation,
            total_depth,
        })
    }

    /// Groups survey stations by hole, sorted by depth
    fn read_surveys(
        &self,
        source: &dyn FeatureSource,
        advisories: &mut Advisories,
    ) -> FxHashMap<String, Vec<SurveyStation>> {
        let m = self.mapping;
        let mut by_hole: FxHashMap<String, Vec<SurveyStation>> = FxHashMap::default();

        for feature in source.features() {
            let a = &feature.attributes;
            let Some(id) = a.text(&m.survey_id).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
            else {
                advisories.push(ADVISORY_SOURCE, "survey station without hole id skipped");
                continue;
            };
            let (Some(depth), Some(azimuth), Some(inclination)) = (
                a.number(&m.survey_depth),
                a.number(&m.survey_azimuth),
                a.number(&m.survey_inclination),
            ) else {
                advisories.push(ADVISORY_SOURCE, "survey station with non-numeric values skipped");
                continue;
            };
            if !depth.is_finite() || depth < 0.0 || !azimuth.is_finite() {
                advisories.push(ADVISORY_SOURCE, "survey station with invalid depth or azimuth skipped");
                continue;
            }
            if !(-90.0..=90.0).contains(&inclination) {
                advisories.push(ADVISORY_SOURCE, "survey station with inclination outside [-90, 90] skipped");
                continue;
            }
            by_hole
                .entry(id)
                .or_default()
                .push(SurveyStation::new(depth, normalize_azimuth(azimuth), inclination));
        }

        for stations in by_hole.values_mut() {
            // Stable: the first station of a repeated depth stays in front
            stations.sort_by(|a, b| a.depth.total_cmp(&b.depth));
            let before = stations.len();
            stations.dedup_by(|later, first| later.depth == first.depth);
            for _ in stations.len()..before {
                advisories.push(ADVISORY_SOURCE, "duplicate survey depth; first station kept");
            }
        }
        by_hole
    }

    /// Groups intervals by hole, sorted by top depth
    fn read_intervals(&self, source: &dyn FeatureSource, advisories: &mut Advisories) -> FxHashMap<String, Vec<Interval>> {
        let m = self.mapping;
        let mut by_hole: FxHashMap<String, Vec<Interval>> = FxHashMap::default();

        for feature in source.features() {
            let a = &feature.attributes;
            let Some(id) = a.text(&m.interval_id).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
            else {
                advisories.push(ADVISORY_SOURCE, "interval without hole id skipped");
                continue;
            };
            let (Some(mut from), Some(mut to)) = (a.number(&m.interval_from), a.number(&m.interval_to)) else {
                advisories.push(ADVISORY_SOURCE, "interval with non-numeric depths skipped");
                continue;
            };
            if !from.is_finite() || !to.is_finite() {
                advisories.push(ADVISORY_SOURCE, "interval with non-numeric depths skipped");
                continue;
            }
            if from > to {
                std::mem::swap(&mut from, &mut to);
                advisories.push(ADVISORY_SOURCE, "reversed interval depths swapped");
            }
            let lithology = a
                .text(&m.interval_lithology)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_UNIT.to_string());

            by_hole.entry(id).or_default().push(Interval {
                from,
                to,
                lithology,
                attributes: a.clone(),
            });
        }

        for intervals in by_hole.values_mut() {
            intervals.sort_by(|a, b| a.from.total_cmp(&b.from));
        }
        by_hole
    }

    /// Phase C, first half: section coordinates of every trajectory point
    fn project_trajectory(&self, path: &[PathPoint]) -> Vec<TrajectoryPoint> {
        path.iter()
            .map(|p| {
                let projection = self.line.project(&Point2::new(p.x, p.y));
                TrajectoryPoint {
                    depth: p.depth,
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    distance_along_section: projection.distance,
                    offset_from_section: projection.offset,
                }
            })
            .collect()
    }

    /// Phase C, second half: trajectory points of each interval inside the buffer
    fn attach_intervals(&self, hole_id: &str, trajectory: &[TrajectoryPoint], intervals: &[Interval]) -> Vec<IntervalSegment> {
        intervals
            .iter()
            .filter_map(|interval| {
                let points: Vec<TrajectoryPoint> = trajectory
                    .iter()
                    .filter(|p| {
                        p.depth >= interval.from
                            && p.depth <= interval.to
                            && p.offset_from_section <= self.buffer_distance
                    })
                    .copied()
                    .collect();
                if points.is_empty() {
                    tracing::debug!(
                        hole = hole_id,
                        from = interval.from,
                        to = interval.to,
                        "Interval has no trajectory points in the buffer"
                    );
                    return None;
                }
                Some(IntervalSegment {
                    hole_id: hole_id.to_string(),
                    attribute: interval.lithology.clone(),
                    from_depth: interval.from,
                    to_depth: interval.to,
                    attributes: interval.attributes.clone(),
                    points,
                })
            })
            .collect()
    }
}

/// A reconstructed 3D trajectory point before projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub depth: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Rebuilds a hole path with the tangential method (phase B).
///
/// The interval ending at each station is drilled with that station's
/// orientation. Inclination -90 is straight down, 0 horizontal. Past the
/// last station the hole continues with the last orientation down to the
/// collar's total depth. Without stations a hole with depth is vertical.
pub fn reconstruct_trajectory(
    collar: &DrillholeCollar,
    stations: &[SurveyStation],
    step: f64,
) -> Result<Vec<PathPoint>> {
    if !step.is_finite() || step <= 0.0 {
        return Err(Error::Validation(format!(
            "trajectory step must be a positive number, got {}",
            step
        )));
    }

    let vertical = [SurveyStation::vertical()];
    let stations: &[SurveyStation] = if stations.is_empty() && collar.total_depth > 0.0 {
        &vertical
    } else {
        stations
    };

    let last_depth = stations.last().map_or(0.0, |s| s.depth);
    let deepest = last_depth.max(collar.total_depth);
    if deepest / step > MAX_TRAJECTORY_POINTS {
        return Err(Error::Processing(format!(
            "hole depth {} at step {} exceeds the trajectory point limit",
            deepest, step
        )));
    }

    let mut path = vec![PathPoint {
        depth: 0.0,
        x: collar.x,
        y: collar.y,
        z: collar.elevation,
    }];

    for station in stations {
        drill(&mut path, station.depth, station, step);
    }
    if let Some(last) = stations.last() {
        if collar.total_depth > last.depth {
            drill(&mut path, collar.total_depth, last, step);
        }
    }
    Ok(path)
}

/// Extends `path` down to `to_depth` along the orientation of `station`
fn drill(path: &mut Vec<PathPoint>, to_depth: f64, station: &SurveyStation, step: f64) {
    let Some(&start) = path.last() else {
        return;
    };
    let length = to_depth - start.depth;
    if length <= 0.0 {
        return;
    }

    // Angle down from vertical
    let from_vertical = (90.0 + station.inclination).to_radians();
    let azimuth = station.azimuth.to_radians();
    let dx = length * from_vertical.sin() * azimuth.sin();
    let dy = length * from_vertical.sin() * azimuth.cos();
    let dz = -length * from_vertical.cos();

    let steps = (length / step).ceil().max(1.0) as usize;
    for k in 1..=steps {
        let along = (k as f64 * step).min(length);
        let f = along / length;
        path.push(PathPoint {
            depth: start.depth + along,
            x: start.x + dx * f,
            y: start.y + dy * f,
            z: start.z + dz * f,
        });
    }
}

/// Projects drillholes onto the section
///
/// `raster` supplies collar elevations when the mapping has none.
#[allow(clippy::too_many_arguments)]
pub fn project_drillholes(
    line: &SectionLine,
    raster: Option<&dyn RasterSampler>,
    band: usize,
    collars: &dyn FeatureSource,
    surveys: Option<&dyn FeatureSource>,
    intervals: Option<&dyn FeatureSource>,
    mapping: &DrillholeFieldMapping,
    buffer_distance: f64,
) -> Result<DrillholeProjection> {
    let mut projector = DrillholeProjector::new(line, mapping, buffer_distance)?;
    if let Some(raster) = raster {
        projector = projector.with_elevation(raster, band)?;
    }
    projector.project(collars, surveys, intervals)
}
