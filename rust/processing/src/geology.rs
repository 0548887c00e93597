// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geology projection
//!
//! Intersects the section line with outcrop polygons. Every continuous piece
//! of line inside a polygon becomes one [`GeologySegment`]: the two boundary
//! points take their elevation from the master profile by linear
//! interpolation, and the master-profile vertices strictly between them fill
//! the inside.

use geo::Geometry;
use rustc_hash::FxHashSet;
use xsection_core::{Advisories, Error, GeologySegment, ProfilePoint, Result};
use xsection_geometry::{
    clip_line_by_multipolygon, clip_line_by_polygon, FeatureId, FeatureSource, RasterSampler,
    SectionLine,
};

use crate::config::DEFAULT_BOUNDARY_EPSILON;
use crate::profile::{sample_profile, MasterProfile};

/// Unit name used when a feature has no value in the unit field
pub const UNKNOWN_UNIT: &str = "Unknown";

const ADVISORY_SOURCE: &str = "geology";

/// Geology segments and the anomalies met while building them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeologyProjection {
    pub segments: Vec<GeologySegment>,
    pub advisories: Advisories,
}

/// Samples the master profile, then projects the outcrops onto the section
pub fn generate_geology(
    line: &SectionLine,
    raster: &dyn RasterSampler,
    outcrops: &dyn FeatureSource,
    unit_name_field: &str,
    band: usize,
) -> Result<GeologyProjection> {
    validate_unit_field(unit_name_field)?;
    let master = sample_profile(line, raster, band, None)?;
    project_geology(line, &master, outcrops, unit_name_field, DEFAULT_BOUNDARY_EPSILON)
}

pub(crate) fn validate_unit_field(unit_name_field: &str) -> Result<()> {
    if unit_name_field.trim().is_empty() {
        return Err(Error::Validation(
            "unit name field must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Projects outcrop polygons onto the section using an existing master profile.
///
/// Segments are ordered by start distance; segments starting at the same
/// distance keep the feature iteration order.
pub fn project_geology(
    line: &SectionLine,
    master: &MasterProfile,
    outcrops: &dyn FeatureSource,
    unit_name_field: &str,
    epsilon: f64,
) -> Result<GeologyProjection> {
    validate_unit_field(unit_name_field)?;

    let index = outcrops.build_index();
    let candidates: FxHashSet<FeatureId> = index
        .candidates(&line.bounding_rect())
        .into_iter()
        .collect();

    let mut advisories = Advisories::new();
    let mut segments: Vec<GeologySegment> = Vec::new();

    for feature in outcrops.features() {
        let pieces = match &feature.geometry {
            None => {
                advisories.push(ADVISORY_SOURCE, "outcrop feature without geometry skipped");
                continue;
            }
            // Non-finite outlines never reach the index; clipping reports them
            Some(_) if !candidates.contains(&feature.id) && !feature.has_non_finite_geometry() => {
                continue
            }
            Some(Geometry::Polygon(polygon)) => clip_line_by_polygon(line, polygon)?,
            Some(Geometry::MultiPolygon(polygons)) => clip_line_by_multipolygon(line, polygons)?,
            Some(_) => {
                advisories.push(ADVISORY_SOURCE, "non-polygon outcrop feature skipped");
                continue;
            }
        };
        if pieces.is_empty() {
            continue;
        }

        let unit_name = match feature.attributes.text(unit_name_field) {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                advisories.push(
                    ADVISORY_SOURCE,
                    format!("outcrop without '{}' value labelled {}", unit_name_field, UNKNOWN_UNIT),
                );
                UNKNOWN_UNIT.to_string()
            }
        };

        for piece in &pieces {
            let (start, end) = if piece.start_distance <= piece.end_distance {
                (piece.start_distance, piece.end_distance)
            } else {
                (piece.end_distance, piece.start_distance)
            };

            let mut points = Vec::with_capacity(2);
            points.push(ProfilePoint::new(start, master.elevation_at(start)));
            points.extend(master.points_between(start, end, epsilon));
            points.push(ProfilePoint::new(end, master.elevation_at(end)));

            segments.push(GeologySegment {
                unit_name: unit_name.clone(),
                attributes: feature.attributes.clone(),
                points,
            });
        }
    }

    // Stable: equal starts keep feature order
    segments.sort_by(|a, b| {
        let sa = a.start_distance().unwrap_or(0.0);
        let sb = b.start_distance().unwrap_or(0.0);
        sa.total_cmp(&sb)
    });

    tracing::debug!(
        source = outcrops.source_id(),
        candidates = candidates.len(),
        segments = segments.len(),
        "Projected geology"
    );
    Ok(GeologyProjection {
        segments,
        advisories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, MultiPolygon, Polygon};
    use xsection_core::{is_distance_sorted, Attributes};
    use xsection_geometry::{Feature, GridRaster, MemoryFeatureSource};

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
        ]
    }

    fn unit(name: &str) -> Attributes {
        Attributes::new().with("unit", name).with("age", "Jurassic")
    }

    /// Elevation rising 1 unit per 10 units east
    fn ramp() -> GridRaster {
        let cols = 12;
        let values: Vec<f64> = (0..cols).map(|c| c as f64).collect();
        GridRaster::new("ramp", (-5.0, 5.0), (10.0, 10.0), cols, 1, values).unwrap()
    }

    fn line() -> SectionLine {
        SectionLine::from_coords(&[(0.0, 0.0), (100.0, 0.0)]).unwrap()
    }

    #[test]
    fn segments_follow_master_profile() {
        let outcrops = MemoryFeatureSource::new("outcrops")
            .with_feature(Feature::new(1, square(22.0, -5.0, 48.0, 5.0), unit("Limestone")));

        let result = generate_geology(&line(), &ramp(), &outcrops, "unit", 1).unwrap();
        assert_eq!(result.segments.len(), 1);
        let seg = &result.segments[0];
        assert_eq!(seg.unit_name, "Limestone");
        assert_eq!(seg.attributes.text("age").as_deref(), Some("Jurassic"));

        assert_eq!(seg.points.len(), 4);
        for (p, expected) in seg.points.iter().zip([22.0, 30.0, 40.0, 48.0]) {
            assert_relative_eq!(p.distance, expected, epsilon = 1e-9);
        }
        assert!(is_distance_sorted(&seg.points));
        // Boundary elevations interpolated between master vertices at 20 and 30
        assert_relative_eq!(seg.points[0].elevation, 2.2, epsilon = 1e-9);
        assert_relative_eq!(seg.points[3].elevation, 4.8, epsilon = 1e-9);
        assert_relative_eq!(seg.points[1].elevation, 3.0);
        assert!(result.advisories.is_empty());
    }

    #[test]
    fn boundary_on_master_vertex_is_not_duplicated() {
        let outcrops = MemoryFeatureSource::new("outcrops")
            .with_feature(Feature::new(1, square(20.0, -5.0, 40.0, 5.0), unit("Shale")));
        let result = generate_geology(&line(), &ramp(), &outcrops, "unit", 1).unwrap();
        let points = &result.segments[0].points;
        assert_eq!(points.len(), 3);
        for (p, expected) in points.iter().zip([20.0, 30.0, 40.0]) {
            assert_relative_eq!(p.distance, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn ordered_by_start_then_feature_order() {
        let outcrops = MemoryFeatureSource::new("outcrops")
            .with_feature(Feature::new(1, square(60.0, -5.0, 70.0, 5.0), unit("C")))
            .with_feature(Feature::new(2, square(10.0, -5.0, 20.0, 5.0), unit("A")))
            .with_feature(Feature::new(3, square(10.0, -1.0, 15.0, 1.0), unit("B")));

        let result = generate_geology(&line(), &ramp(), &outcrops, "unit", 1).unwrap();
        let names: Vec<&str> = result.segments.iter().map(|s| s.unit_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn multipolygon_yields_one_segment_per_piece() {
        let mp = MultiPolygon::new(vec![square(70.0, -5.0, 80.0, 5.0), square(5.0, -5.0, 15.0, 5.0)]);
        let outcrops = MemoryFeatureSource::new("outcrops").with_feature(Feature::new(1, mp, unit("Basalt")));
        let result = generate_geology(&line(), &ramp(), &outcrops, "unit", 1).unwrap();
        assert_eq!(result.segments.len(), 2);
        assert_relative_eq!(result.segments[0].start_distance().unwrap(), 5.0);
        assert_relative_eq!(result.segments[1].start_distance().unwrap(), 70.0);
    }

    #[test]
    fn no_intersection_is_empty_not_error() {
        let outcrops = MemoryFeatureSource::new("outcrops")
            .with_feature(Feature::new(1, square(10.0, 20.0, 20.0, 30.0), unit("Far")));
        let result = generate_geology(&line(), &ramp(), &outcrops, "unit", 1).unwrap();
        assert!(result.segments.is_empty());
    }

    #[test]
    fn missing_unit_name_falls_back() {
        let outcrops = MemoryFeatureSource::new("outcrops")
            .with_feature(Feature::new(1, square(10.0, -5.0, 20.0, 5.0), Attributes::new()))
            .with_feature(Feature::attributes_only(2, unit("Ghost")));
        let result = generate_geology(&line(), &ramp(), &outcrops, "unit", 1).unwrap();
        assert_eq!(result.segments[0].unit_name, UNKNOWN_UNIT);
        assert!(result.advisories.mentions("geology", "labelled Unknown"));
        assert!(result.advisories.mentions("geology", "without geometry"));
    }

    #[test]
    fn non_finite_outcrop_is_processing_error() {
        let bad = polygon![(x: 10.0, y: -5.0), (x: 20.0, y: -5.0), (x: 20.0, y: f64::INFINITY)];
        let outcrops = MemoryFeatureSource::new("outcrops")
            .with_feature(Feature::new(1, square(40.0, -5.0, 50.0, 5.0), unit("Tuff")))
            .with_feature(Feature::new(2, bad, unit("Broken")));
        let err = generate_geology(&line(), &ramp(), &outcrops, "unit", 1).unwrap_err();
        assert_eq!(err.code(), "PROCESSING_ERROR");
    }

    #[test]
    fn blank_unit_field_is_validation_error() {
        let outcrops = MemoryFeatureSource::new("outcrops");
        assert!(matches!(
            generate_geology(&line(), &ramp(), &outcrops, " ", 1),
            Err(Error::Validation(_))
        ));
    }
}
