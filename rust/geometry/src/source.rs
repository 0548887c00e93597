// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feature sources
//!
//! A feature source is an already-opened vector layer: an identifier, a
//! revision counter that changes whenever the data changes, and a list of
//! features with optional geometry and typed attributes.

use std::fmt;

use geo::{BoundingRect, CoordsIter, Geometry, Rect};
use serde::{Deserialize, Serialize};
use xsection_core::Attributes;

use crate::index::SpatialIndex;

/// Stable identifier of a feature within its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A vector feature: geometry (possibly null) and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Option<Geometry<f64>>,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(id: u64, geometry: impl Into<Geometry<f64>>, attributes: Attributes) -> Self {
        Self {
            id: FeatureId(id),
            geometry: Some(geometry.into()),
            attributes,
        }
    }

    /// Feature without geometry, e.g. a row of a survey table
    pub fn attributes_only(id: u64, attributes: Attributes) -> Self {
        Self {
            id: FeatureId(id),
            geometry: None,
            attributes,
        }
    }

    #[inline]
    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    /// True when the feature has geometry with a NaN or infinite coordinate.
    /// Such features never enter a spatial index.
    pub fn has_non_finite_geometry(&self) -> bool {
        self.geometry
            .as_ref()
            .is_some_and(|g| g.coords_iter().any(|c| !c.x.is_finite() || !c.y.is_finite()))
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.as_ref().and_then(|g| g.bounding_rect())
    }
}

/// Read access to an opened vector layer
pub trait FeatureSource: Send + Sync {
    /// Stable identifier of the layer, used in cache keys
    fn source_id(&self) -> &str;

    /// Changes whenever the layer's data changes
    fn revision(&self) -> u64 {
        0
    }

    /// Features in layer order
    fn features(&self) -> Box<dyn Iterator<Item = &Feature> + '_>;

    fn feature_count(&self) -> usize {
        self.features().count()
    }

    /// Builds a fresh spatial index over the features that have geometry
    fn build_index(&self) -> SpatialIndex {
        SpatialIndex::build(
            self.features()
                .filter_map(|f| f.bounding_rect().map(|r| (f.id, r))),
        )
    }
}

/// Feature source held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryFeatureSource {
    id: String,
    revision: u64,
    features: Vec<Feature>,
}

impl MemoryFeatureSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: 0,
            features: Vec::new(),
        }
    }

    pub fn from_features(id: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            id: id.into(),
            revision: 0,
            features,
        }
    }

    /// Appends a feature and bumps the revision
    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
        self.revision += 1;
    }

    /// Builder form of [`push`](Self::push)
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.push(feature);
        self
    }

    /// Drops every feature and bumps the revision
    pub fn clear(&mut self) {
        self.features.clear();
        self.revision += 1;
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }
}

impl FeatureSource for MemoryFeatureSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn features(&self) -> Box<dyn Iterator<Item = &Feature> + '_> {
        Box::new(self.features.iter())
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }
}
