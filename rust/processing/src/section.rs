// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Section line resolution from a line layer.

use geo::{Geometry, LineString};
use xsection_core::{Error, Result};
use xsection_geometry::{Crs, DistanceMeasurer, FeatureSource, SectionLine};

/// Builds the section line from the first feature of a line layer.
///
/// A layer without features is `DataMissing`; a null, empty, non-line or
/// degenerate geometry is `Geometry`. Multi-line geometries use their first
/// part.
pub fn section_line_from_source(source: &dyn FeatureSource, crs: Option<&Crs>) -> Result<SectionLine> {
    let feature = source.features().next().ok_or_else(|| {
        Error::DataMissing(format!(
            "section layer '{}' has no features",
            source.source_id()
        ))
    })?;

    let line: LineString<f64> = match &feature.geometry {
        None => {
            return Err(Error::Geometry(format!(
                "section feature {} has no geometry",
                feature.id
            )))
        }
        Some(Geometry::LineString(ls)) => ls.clone(),
        Some(Geometry::Line(l)) => LineString::from(vec![l.start, l.end]),
        Some(Geometry::MultiLineString(mls)) => mls.0.first().cloned().ok_or_else(|| {
            Error::Geometry(format!("section feature {} has no parts", feature.id))
        })?,
        Some(_) => {
            return Err(Error::Geometry(format!(
                "section feature {} is not a line",
                feature.id
            )))
        }
    };

    if line.0.is_empty() {
        return Err(Error::Geometry(format!(
            "section feature {} has an empty line",
            feature.id
        )));
    }

    let measurer = DistanceMeasurer::for_crs(crs);
    SectionLine::from_line_string(&line, measurer).map_err(|e| Error::Geometry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, MultiLineString};
    use xsection_core::Attributes;
    use xsection_geometry::{Feature, MemoryFeatureSource};

    fn layer(geometry: impl Into<Geometry<f64>>) -> MemoryFeatureSource {
        MemoryFeatureSource::new("sections").with_feature(Feature::new(1, geometry, Attributes::new()))
    }

    #[test]
    fn reads_first_line() {
        let source = layer(line_string![(x: 0.0, y: 0.0), (x: 30.0, y: 40.0)]);
        let line = section_line_from_source(&source, Some(&Crs::projected("EPSG:32719"))).unwrap();
        assert_eq!(line.length(), 50.0);
        assert!(line.measurer().warning().is_none());
    }

    #[test]
    fn multi_line_uses_first_part() {
        let mls = MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)],
            line_string![(x: 100.0, y: 0.0), (x: 200.0, y: 0.0)],
        ]);
        let line = section_line_from_source(&layer(mls), None).unwrap();
        assert_eq!(line.length(), 10.0);
        assert!(line.measurer().warning().is_some());
    }

    #[test]
    fn empty_layer_is_data_missing() {
        let source = MemoryFeatureSource::new("sections");
        assert!(matches!(
            section_line_from_source(&source, None),
            Err(Error::DataMissing(_))
        ));
    }

    #[test]
    fn bad_geometry_is_geometry_error() {
        let null = MemoryFeatureSource::new("sections")
            .with_feature(Feature::attributes_only(1, Attributes::new()));
        assert!(matches!(section_line_from_source(&null, None), Err(Error::Geometry(_))));

        let pt = layer(point!(x: 1.0, y: 1.0));
        assert!(matches!(section_line_from_source(&pt, None), Err(Error::Geometry(_))));

        let degenerate = layer(line_string![(x: 5.0, y: 5.0), (x: 5.0, y: 5.0)]);
        assert!(matches!(
            section_line_from_source(&degenerate, None),
            Err(Error::Geometry(_))
        ));
    }
}
