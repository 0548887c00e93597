// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial index for bounding-box candidate retrieval.
//!
//! Uses a uniform grid hash over feature bounding rectangles. Queries are
//! approximate: they return every feature whose bounding rectangle touches
//! the query rectangle, and callers must follow with an exact geometric test.
//! Candidates come back in insertion order so feature iteration order is
//! preserved downstream.
//!
//! An index is built per invocation from the current feature set and never
//! shared or mutated across invocations.

use geo::{Intersects, Rect};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::source::FeatureId;

/// Rectangles spanning more cells than this are kept in an overflow list
const MAX_CELLS_PER_ENTRY: i128 = 4096;

#[derive(Debug, Clone)]
struct Entry {
    id: FeatureId,
    rect: Rect<f64>,
}

/// Grid-hash spatial index over feature bounding rectangles
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    entries: Vec<Entry>,
    grid: FxHashMap<(i64, i64), SmallVec<[u32; 4]>>,
    /// Entries too large to register cell by cell
    oversized: Vec<u32>,
}

impl SpatialIndex {
    /// Creates an empty index with the given cell size
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            entries: Vec::new(),
            grid: FxHashMap::default(),
            oversized: Vec::new(),
        }
    }

    /// Builds an index, choosing the cell size from the data extent
    pub fn build<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (FeatureId, Rect<f64>)>,
    {
        let items: Vec<(FeatureId, Rect<f64>)> = items
            .into_iter()
            .filter(|(_, r)| is_finite_rect(r))
            .collect();

        let mut index = Self::new(auto_cell_size(&items));
        for (id, rect) in items {
            index.insert(id, rect);
        }
        index
    }

    /// Registers a feature's bounding rectangle
    pub fn insert(&mut self, id: FeatureId, rect: Rect<f64>) {
        if !is_finite_rect(&rect) {
            return;
        }
        let slot = self.entries.len() as u32;
        self.entries.push(Entry { id, rect });

        let (x0, y0, x1, y1) = self.cell_range(&rect);
        if cell_count(x0, y0, x1, y1) > MAX_CELLS_PER_ENTRY {
            self.oversized.push(slot);
            return;
        }
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.grid.entry((cx, cy)).or_default().push(slot);
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Features whose bounding rectangle intersects `query`, in insertion order
    pub fn candidates(&self, query: &Rect<f64>) -> Vec<FeatureId> {
        // Infinite query bounds are fine: they saturate into a full scan
        let (min, max) = (query.min(), query.max());
        if [min.x, min.y, max.x, max.y].iter().any(|v| v.is_nan()) || self.entries.is_empty() {
            return Vec::new();
        }

        let (x0, y0, x1, y1) = self.cell_range(query);
        let mut slots: Vec<u32> = if cell_count(x0, y0, x1, y1) > self.grid.len() as i128 {
            // Query covers more cells than are populated: scan entries instead
            (0..self.entries.len() as u32).collect()
        } else {
            let mut slots = self.oversized.clone();
            for cx in x0..=x1 {
                for cy in y0..=y1 {
                    if let Some(cell) = self.grid.get(&(cx, cy)) {
                        slots.extend_from_slice(cell);
                    }
                }
            }
            slots
        };

        slots.sort_unstable();
        slots.dedup();
        slots
            .into_iter()
            .map(|slot| &self.entries[slot as usize])
            .filter(|entry| entry.rect.intersects(query))
            .map(|entry| entry.id)
            .collect()
    }

    fn cell_range(&self, rect: &Rect<f64>) -> (i64, i64, i64, i64) {
        let (min, max) = (rect.min(), rect.max());
        (
            (min.x / self.cell_size).floor() as i64,
            (min.y / self.cell_size).floor() as i64,
            (max.x / self.cell_size).floor() as i64,
            (max.y / self.cell_size).floor() as i64,
        )
    }
}

/// Cells in an inclusive cell range. Ranges from saturated casts span the
/// whole `i64` domain, so the count is taken in `i128`.
fn cell_count(x0: i64, y0: i64, x1: i64, y1: i64) -> i128 {
    let width = i128::from(x1) - i128::from(x0) + 1;
    let height = i128::from(y1) - i128::from(y0) + 1;
    width.saturating_mul(height)
}

fn is_finite_rect(rect: &Rect<f64>) -> bool {
    let (min, max) = (rect.min(), rect.max());
    min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite()
}

/// Cell size of roughly one cell per feature over the data extent, never
/// smaller than the average feature size
fn auto_cell_size(items: &[(FeatureId, Rect<f64>)]) -> f64 {
    if items.is_empty() {
        return 1.0;
    }
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut size_sum = 0.0;
    for (_, r) in items {
        min_x = min_x.min(r.min().x);
        min_y = min_y.min(r.min().y);
        max_x = max_x.max(r.max().x);
        max_y = max_y.max(r.max().y);
        size_sum += r.width().max(r.height());
    }
    let extent = (max_x - min_x).max(max_y - min_y);
    let per_feature = extent / (items.len() as f64).sqrt();
    let average = size_sum / items.len() as f64;
    let size = per_feature.max(average);
    if size.is_finite() && size > 0.0 {
        size
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect<f64> {
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }

    #[test]
    fn candidates_by_bbox() {
        let index = SpatialIndex::build(vec![
            (FeatureId(1), rect(0.0, 0.0, 1.0, 1.0)),
            (FeatureId(2), rect(10.0, 10.0, 11.0, 11.0)),
            (FeatureId(3), rect(0.5, 0.5, 20.0, 0.6)),
        ]);
        assert_eq!(index.len(), 3);

        let hits = index.candidates(&rect(0.0, 0.0, 2.0, 2.0));
        assert_eq!(hits, vec![FeatureId(1), FeatureId(3)]);

        let hits = index.candidates(&rect(10.5, 10.5, 12.0, 12.0));
        assert_eq!(hits, vec![FeatureId(2)]);

        assert!(index.candidates(&rect(50.0, 50.0, 60.0, 60.0)).is_empty());
    }

    #[test]
    fn candidates_keep_insertion_order() {
        let index = SpatialIndex::build((0..50).rev().map(|i| {
            let x = i as f64;
            (FeatureId(i), rect(x, 0.0, x + 0.5, 0.5))
        }));
        let hits = index.candidates(&rect(-1.0, -1.0, 100.0, 1.0));
        let expected: Vec<FeatureId> = (0..50).rev().map(FeatureId).collect();
        assert_eq!(hits, expected);
    }

    #[test]
    fn oversized_entries_are_always_considered() {
        let mut index = SpatialIndex::new(0.001);
        index.insert(FeatureId(7), rect(-1000.0, -1000.0, 1000.0, 1000.0));
        index.insert(FeatureId(8), rect(0.0, 0.0, 0.0005, 0.0005));
        let hits = index.candidates(&rect(0.0001, 0.0001, 0.0002, 0.0002));
        assert_eq!(hits, vec![FeatureId(7), FeatureId(8)]);
    }

    #[test]
    fn huge_rects_do_not_overflow_the_grid() {
        let mut index = SpatialIndex::new(1.0);
        index.insert(FeatureId(1), rect(0.0, 0.0, 1.0, 1.0));
        index.insert(FeatureId(2), rect(-1e300, -1e300, 1e300, 1e300));
        assert_eq!(index.len(), 2);

        let hits = index.candidates(&rect(-1e300, -1e300, 1e300, 1e300));
        assert_eq!(hits, vec![FeatureId(1), FeatureId(2)]);
        let hits = index.candidates(&rect(0.2, 0.2, 0.4, 0.4));
        assert_eq!(hits, vec![FeatureId(1), FeatureId(2)]);
        let everything = rect(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::INFINITY);
        assert_eq!(index.candidates(&everything).len(), 2);
    }

    #[test]
    fn non_finite_rects_are_ignored() {
        let index = SpatialIndex::build(vec![(FeatureId(1), rect(f64::NAN, 0.0, 1.0, 1.0))]);
        assert!(index.is_empty());
    }
}
