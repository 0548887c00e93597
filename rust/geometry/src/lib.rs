// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! XSection Geometry
//!
//! Planar geometry kernel for cross-section work, built on nalgebra points
//! and the `geo` crate's vector types.
//!
//! - [`SectionLine`]: measured polyline with projection, interpolation and
//!   densification
//! - [`clip_line_by_polygon`]: line/polygon intersection into ordered pieces
//! - [`SectionBuffer`]: exact round-capped buffer around the section line
//! - [`DistanceMeasurer`]: planar or geodesic distance depending on the CRS
//! - [`SpatialIndex`]: grid hash for bounding-box candidate retrieval
//! - [`FeatureSource`] / [`RasterSampler`]: read interfaces to opened layers

pub mod buffer;
pub mod clip;
pub mod distance;
pub mod error;
pub mod index;
pub mod line;
pub mod raster;
pub mod source;

// Re-export nalgebra and geo types for convenience
pub use geo::{Geometry, LineString, MultiLineString, MultiPolygon, Polygon, Rect};
pub use nalgebra::{Point2, Vector2};

pub use buffer::SectionBuffer;
pub use clip::{clip_line_by_multipolygon, clip_line_by_polygon, LinePiece, Pieces};
pub use distance::{Crs, CrsKind, DistanceMeasurer, DistanceMode};
pub use error::{Error, Result};
pub use index::SpatialIndex;
pub use line::{bearing, DensifiedVertex, LineProjection, SectionLine};
pub use raster::{GridRaster, RasterSampler};
pub use source::{Feature, FeatureId, FeatureSource, MemoryFeatureSource};
