// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural measurement projection
//!
//! Point measurements (bedding, foliation, faults) inside the section buffer
//! are projected onto the line and their true dip is converted into the
//! apparent dip seen in the section plane.

use geo::Geometry;
use rustc_hash::FxHashSet;
use xsection_core::{
    apparent_dip, is_valid_dip, is_valid_strike, parse_dip, parse_strike,
    strike_from_dip_direction, Advisories, AttributeValue, Attributes, DipReading, Error,
    Result, StructureMeasurement,
};
use xsection_geometry::{FeatureId, FeatureSource, Point2, RasterSampler, SectionBuffer, SectionLine};

use crate::profile::{sample_elevation, validate_band};

const ADVISORY_SOURCE: &str = "structures";

/// Projected measurements and the anomalies met while building them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureProjection {
    pub measurements: Vec<StructureMeasurement>,
    pub advisories: Advisories,
}

/// Field names of a structural point layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureFields {
    pub dip: String,
    /// May be empty when dips carry a dip direction
    pub strike: String,
}

impl StructureFields {
    pub fn new(dip: impl Into<String>, strike: impl Into<String>) -> Self {
        Self {
            dip: dip.into(),
            strike: strike.into(),
        }
    }
}

pub(crate) fn validate_buffer_distance(buffer_distance: f64) -> Result<()> {
    if !buffer_distance.is_finite() || buffer_distance < 0.0 {
        return Err(Error::Validation(format!(
            "buffer distance must be a finite number >= 0, got {}",
            buffer_distance
        )));
    }
    Ok(())
}

pub(crate) fn validate_structure_fields(fields: &StructureFields) -> Result<()> {
    if fields.dip.trim().is_empty() {
        return Err(Error::Validation("dip field must not be empty".to_string()));
    }
    Ok(())
}

/// Projects structural point measurements onto the section
pub fn project_structures(
    line: &SectionLine,
    raster: &dyn RasterSampler,
    points: &dyn FeatureSource,
    buffer_distance: f64,
    dip_field: &str,
    strike_field: &str,
    band: usize,
) -> Result<StructureProjection> {
    let fields = StructureFields::new(dip_field, strike_field);
    validate_buffer_distance(buffer_distance)?;
    validate_structure_fields(&fields)?;
    validate_band(raster, band)?;

    let buffer = SectionBuffer::new(line, buffer_distance)?;
    let index = points.build_index();
    let candidates: FxHashSet<FeatureId> = index
        .candidates(&buffer.bounding_rect())
        .into_iter()
        .collect();

    let mut advisories = Advisories::new();
    let mut measurements = Vec::new();

    for feature in points.features() {
        let location = match &feature.geometry {
            None => {
                advisories.push(ADVISORY_SOURCE, "measurement without geometry skipped");
                continue;
            }
            Some(_) if feature.has_non_finite_geometry() => {
                advisories.push(ADVISORY_SOURCE, "measurement with non-finite coordinates skipped");
                continue;
            }
            Some(_) if !candidates.contains(&feature.id) => continue,
            Some(Geometry::Point(p)) => Point2::new(p.x(), p.y()),
            Some(Geometry::MultiPoint(mp)) => match mp.0.first() {
                Some(p) => Point2::new(p.x(), p.y()),
                None => continue,
            },
            Some(_) => {
                advisories.push(ADVISORY_SOURCE, "non-point measurement feature skipped");
                continue;
            }
        };

        if !buffer.contains(&location) {
            continue;
        }
        let Some(projection) = buffer.project_within(&location) else {
            continue;
        };

        let Some((strike, dip)) = read_orientation(&feature.attributes, &fields, &mut advisories) else {
            tracing::debug!(feature = %feature.id, "Skipping measurement without usable strike/dip");
            continue;
        };

        let azimuth = line.segment_azimuth(projection.segment);
        measurements.push(StructureMeasurement {
            distance: projection.distance,
            elevation: sample_elevation(raster, &projection.point, band),
            apparent_dip: apparent_dip(strike, dip, azimuth),
            original_dip: dip,
            original_strike: strike,
            attributes: feature.attributes.clone(),
        });
    }

    measurements.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    tracing::debug!(
        source = points.source_id(),
        buffer = buffer_distance,
        measurements = measurements.len(),
        "Projected structures"
    );
    Ok(StructureProjection {
        measurements,
        advisories,
    })
}

/// Reads `(strike, dip)` in degrees; `None` skips the feature
fn read_orientation(
    attributes: &Attributes,
    fields: &StructureFields,
    advisories: &mut Advisories,
) -> Option<(f64, f64)> {
    let Some(dip) = read_dip(attributes.get(&fields.dip)) else {
        advisories.push(ADVISORY_SOURCE, format!("missing or unparseable '{}' value", fields.dip));
        return None;
    };

    let strike = if fields.strike.trim().is_empty() {
        None
    } else {
        read_strike(attributes.get(&fields.strike))
    };
    let strike = match (strike, dip.direction) {
        (Some(strike), _) => strike,
        (None, Some(direction)) => strike_from_dip_direction(direction),
        (None, None) => {
            advisories.push(
                ADVISORY_SOURCE,
                format!("missing or unparseable '{}' value", fields.strike),
            );
            return None;
        }
    };

    if !is_valid_strike(strike) || !is_valid_dip(dip.angle) {
        advisories.push(ADVISORY_SOURCE, "strike or dip outside valid range");
        return None;
    }
    Some((strike, dip.angle))
}

fn read_dip(value: Option<&AttributeValue>) -> Option<DipReading> {
    match value? {
        AttributeValue::Text(text) => parse_dip(text),
        other => other.as_f64().map(|angle| DipReading {
            angle,
            direction: None,
        }),
    }
}

fn read_strike(value: Option<&AttributeValue>) -> Option<f64> {
    match value? {
        AttributeValue::Text(text) => parse_strike(text),
        other => other.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::point;
    use xsection_geometry::{Feature, GridRaster, MemoryFeatureSource};

    fn surface() -> GridRaster {
        GridRaster::constant("dem", (-50.0, -50.0), (150.0, 50.0), 5.0, 120.0).unwrap()
    }

    fn north_line() -> SectionLine {
        SectionLine::from_coords(&[(0.0, 0.0), (0.0, 100.0)]).unwrap()
    }

    fn measurement(id: u64, x: f64, y: f64, dip: &str, strike: &str) -> Feature {
        Feature::new(
            id,
            point!(x: x, y: y),
            Attributes::from_raw([("dip", dip), ("strike", strike)]),
        )
    }

    #[test]
    fn apparent_dip_on_perpendicular_section() {
        let points = MemoryFeatureSource::new("structures").with_feature(measurement(1, 3.0, 40.0, "45", "90"));
        let result = project_structures(&north_line(), &surface(), &points, 10.0, "dip", "strike", 1).unwrap();

        assert_eq!(result.measurements.len(), 1);
        let m = &result.measurements[0];
        assert_relative_eq!(m.distance, 40.0);
        assert_relative_eq!(m.elevation, 120.0);
        assert_relative_eq!(m.apparent_dip.abs(), 45.0, epsilon = 1e-9);
        assert_eq!(m.original_strike, 90.0);
    }

    #[test]
    fn parallel_section_shows_zero_dip() {
        let line = SectionLine::from_coords(&[(0.0, 0.0), (100.0, 0.0)]).unwrap();
        let points = MemoryFeatureSource::new("structures").with_feature(measurement(1, 50.0, 2.0, "45", "90"));
        let result = project_structures(&line, &surface(), &points, 10.0, "dip", "strike", 1).unwrap();
        assert_relative_eq!(result.measurements[0].apparent_dip, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn textual_notation_and_sorting() {
        let points = MemoryFeatureSource::new("structures")
            .with_feature(measurement(1, 1.0, 80.0, "30 SE", "N 30 E"))
            .with_feature(measurement(2, -1.0, 20.0, "60", "S 15 W"))
            .with_feature(measurement(3, 0.5, 50.0, "45 NE", ""));
        let result = project_structures(&north_line(), &surface(), &points, 5.0, "dip", "strike", 1).unwrap();

        let strikes: Vec<f64> = result.measurements.iter().map(|m| m.original_strike).collect();
        // Third strike derived from the dip direction
        assert_eq!(strikes, vec![195.0, 315.0, 30.0]);
        for m in &result.measurements {
            assert!(m.apparent_dip.abs() <= m.original_dip + 1e-9);
        }
    }

    #[test]
    fn buffer_and_parse_filtering() {
        let points = MemoryFeatureSource::new("structures")
            .with_feature(measurement(1, 20.0, 50.0, "45", "90"))
            .with_feature(measurement(2, 1.0, 50.0, "steep", "90"))
            .with_feature(measurement(3, 1.0, 60.0, "95", "90"))
            .with_feature(measurement(4, 1.0, 70.0, "40", "400"))
            .with_feature(measurement(5, 1.0, 30.0, "40", "10"));
        let result = project_structures(&north_line(), &surface(), &points, 5.0, "dip", "strike", 1).unwrap();

        assert_eq!(result.measurements.len(), 1);
        assert_relative_eq!(result.measurements[0].distance, 30.0);
        assert!(result.advisories.mentions("structures", "unparseable 'dip'"));
        assert_eq!(
            result
                .advisories
                .iter()
                .find(|a| a.message.contains("outside valid range"))
                .map(|a| a.count),
            Some(2)
        );
    }

    #[test]
    fn non_finite_measurement_is_reported() {
        let points = MemoryFeatureSource::new("structures")
            .with_feature(measurement(1, f64::NAN, 40.0, "45", "90"))
            .with_feature(measurement(2, 1.0, 60.0, "45", "90"));
        let result = project_structures(&north_line(), &surface(), &points, 5.0, "dip", "strike", 1).unwrap();
        assert_eq!(result.measurements.len(), 1);
        assert!(result.advisories.mentions("structures", "non-finite coordinates"));
    }

    #[test]
    fn huge_buffer_keeps_every_point() {
        let points = MemoryFeatureSource::new("structures")
            .with_feature(measurement(1, 3.0, 40.0, "45", "90"))
            .with_feature(measurement(2, 5000.0, 20.0, "30", "90"));
        let result = project_structures(&north_line(), &surface(), &points, 1e300, "dip", "strike", 1).unwrap();
        assert_eq!(result.measurements.len(), 2);
        assert_relative_eq!(result.measurements[0].distance, 20.0);
    }

    #[test]
    fn validation_happens_first() {
        let points = MemoryFeatureSource::new("structures");
        assert!(matches!(
            project_structures(&north_line(), &surface(), &points, -1.0, "dip", "strike", 1),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            project_structures(&north_line(), &surface(), &points, 1.0, "", "strike", 1),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            project_structures(&north_line(), &surface(), &points, 1.0, "dip", "strike", 0),
            Err(Error::Validation(_))
        ));
    }
}
