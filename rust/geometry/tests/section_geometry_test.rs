// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use geo::{point, polygon};
use xsection_core::Attributes;
use xsection_geometry::{
    clip_line_by_polygon, Crs, DistanceMeasurer, Feature, FeatureId, FeatureSource, Geometry,
    MemoryFeatureSource, Point2, SectionBuffer, SectionLine,
};

fn layer() -> MemoryFeatureSource {
    MemoryFeatureSource::new("points")
        .with_feature(Feature::new(1, point!(x: 10.0, y: 1.0), Attributes::new()))
        .with_feature(Feature::new(2, point!(x: 50.0, y: 30.0), Attributes::new()))
        .with_feature(Feature::new(3, point!(x: 90.0, y: -2.0), Attributes::new()))
        .with_feature(Feature::new(4, point!(x: 103.0, y: 0.0), Attributes::new()))
}

/// Bounding-box query followed by the exact buffer test
#[test]
fn buffer_filter_keeps_only_nearby_points() {
    let line = SectionLine::from_coords(&[(0.0, 0.0), (100.0, 0.0)]).unwrap();
    let buffer = SectionBuffer::new(&line, 5.0).unwrap();
    let source = layer();
    let index = source.build_index();

    let candidates = index.candidates(&buffer.bounding_rect());
    assert!(!candidates.contains(&FeatureId(2)));

    let kept: Vec<FeatureId> = source
        .features()
        .filter(|f| candidates.contains(&f.id))
        .filter(|f| match &f.geometry {
            Some(Geometry::Point(p)) => buffer.contains(&Point2::new(p.x(), p.y())),
            _ => false,
        })
        .map(|f| f.id)
        .collect();
    assert_eq!(kept, vec![FeatureId(1), FeatureId(3), FeatureId(4)]);
}

#[test]
fn clipped_pieces_follow_measured_chainage() {
    let line = SectionLine::with_measurer(
        vec![Point2::new(0.0, 0.0), Point2::new(60.0, 0.0), Point2::new(60.0, 40.0)],
        DistanceMeasurer::for_crs(Some(&Crs::projected("EPSG:32719"))),
    )
    .unwrap();
    let outcrop = polygon![
        (x: 50.0, y: -5.0),
        (x: 70.0, y: -5.0),
        (x: 70.0, y: 10.0),
        (x: 50.0, y: 10.0),
    ];

    let pieces = clip_line_by_polygon(&line, &outcrop).unwrap();
    assert_eq!(pieces.len(), 1);
    assert_relative_eq!(pieces[0].start_distance, 50.0, epsilon = 1e-9);
    assert_relative_eq!(pieces[0].end_distance, 70.0, epsilon = 1e-9);
    assert_relative_eq!(line.interpolate(pieces[0].end_distance).y, 10.0, epsilon = 1e-9);
}

#[test]
fn projection_locates_points_on_bent_line() {
    let line = SectionLine::from_coords(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]).unwrap();
    let p = line.project(&Point2::new(12.0, 4.0));
    assert_eq!(p.segment, 1);
    assert_relative_eq!(p.distance, 14.0);
    assert_relative_eq!(p.offset, 2.0);
    assert_relative_eq!(line.azimuth(), 45.0);
    assert_relative_eq!(line.segment_azimuth(1), 0.0);
}
