// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Elevation surfaces
//!
//! [`RasterSampler`] is the read interface the engine samples elevations
//! through. [`GridRaster`] is a north-up, multi-band grid held in memory.

use nalgebra::Point2;

use crate::error::{Error, Result};

/// Read access to an opened raster
pub trait RasterSampler: Send + Sync {
    /// Stable identifier of the raster, used in cache keys
    fn source_id(&self) -> &str;

    /// Changes whenever the raster's data changes
    fn revision(&self) -> u64 {
        0
    }

    fn band_count(&self) -> usize;

    /// Native cell width in map units
    fn resolution_x(&self) -> f64;

    /// Value at `point` in the 1-based `band`; `None` outside the raster,
    /// on nodata, or for an unknown band
    fn sample(&self, point: &Point2<f64>, band: usize) -> Option<f64>;
}

/// North-up grid raster
///
/// Cell `(row, col)` covers `[origin_x + col*res_x, origin_x + (col+1)*res_x)`
/// horizontally and `(origin_y - (row+1)*res_y, origin_y - row*res_y]`
/// vertically; `origin` is the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRaster {
    id: String,
    revision: u64,
    origin_x: f64,
    origin_y: f64,
    res_x: f64,
    res_y: f64,
    cols: usize,
    rows: usize,
    nodata: Option<f64>,
    /// One row-major buffer per band
    bands: Vec<Vec<f64>>,
}

impl GridRaster {
    /// Creates a single-band raster from row-major values
    pub fn new(
        id: impl Into<String>,
        origin: (f64, f64),
        resolution: (f64, f64),
        cols: usize,
        rows: usize,
        values: Vec<f64>,
    ) -> Result<Self> {
        let (res_x, res_y) = resolution;
        if !(res_x.is_finite() && res_y.is_finite()) || res_x <= 0.0 || res_y <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "raster resolution must be positive, got ({}, {})",
                res_x, res_y
            )));
        }
        if !(origin.0.is_finite() && origin.1.is_finite()) {
            return Err(Error::NonFinite("raster origin".to_string()));
        }
        if cols == 0 || rows == 0 {
            return Err(Error::EmptyGeometry("raster has no cells".to_string()));
        }
        let raster = Self {
            id: id.into(),
            revision: 0,
            origin_x: origin.0,
            origin_y: origin.1,
            res_x,
            res_y,
            cols,
            rows,
            nodata: None,
            bands: Vec::new(),
        };
        raster.with_band(values)
    }

    /// A raster with one value everywhere over the given extent
    pub fn constant(
        id: impl Into<String>,
        min: (f64, f64),
        max: (f64, f64),
        resolution: f64,
        value: f64,
    ) -> Result<Self> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "raster resolution must be positive, got {}",
                resolution
            )));
        }
        // One extra cell so the max edge itself samples inside the grid
        let cols = ((max.0 - min.0).max(0.0) / resolution).floor() as usize + 1;
        let rows = ((max.1 - min.1).max(0.0) / resolution).floor() as usize + 1;
        Self::new(
            id,
            (min.0, max.1),
            (resolution, resolution),
            cols,
            rows,
            vec![value; cols * rows],
        )
    }

    /// Appends another band of row-major values
    pub fn with_band(mut self, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.cols * self.rows {
            return Err(Error::InvalidParameter(format!(
                "band has {} values, expected {}",
                values.len(),
                self.cols * self.rows
            )));
        }
        self.bands.push(values);
        Ok(self)
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Overwrites one cell and bumps the revision
    pub fn set(&mut self, band: usize, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(Error::InvalidParameter(format!(
                "cell ({}, {}) outside {}x{} raster",
                row, col, self.rows, self.cols
            )));
        }
        let cols = self.cols;
        let values = band
            .checked_sub(1)
            .and_then(|b| self.bands.get_mut(b))
            .ok_or_else(|| Error::InvalidParameter(format!("no band {}", band)))?;
        values[row * cols + col] = value;
        self.revision += 1;
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.cols
    }

    pub fn height(&self) -> usize {
        self.rows
    }

    fn cell_of(&self, point: &Point2<f64>) -> Option<(usize, usize)> {
        let col = ((point.x - self.origin_x) / self.res_x).floor();
        let row = ((self.origin_y - point.y) / self.res_y).floor();
        if !(col.is_finite() && row.is_finite()) || col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        (col < self.cols && row < self.rows).then_some((row, col))
    }
}

impl RasterSampler for GridRaster {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn resolution_x(&self) -> f64 {
        self.res_x
    }

    fn sample(&self, point: &Point2<f64>, band: usize) -> Option<f64> {
        let values = self.bands.get(band.checked_sub(1)?)?;
        let (row, col) = self.cell_of(point)?;
        let value = values[row * self.cols + col];
        if !value.is_finite() || self.nodata.is_some_and(|nd| nd == value) {
            return None;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> GridRaster {
        // 3x2 cells of 10 units, top-left at (0, 20)
        GridRaster::new(
            "dem",
            (0.0, 20.0),
            (10.0, 10.0),
            3,
            2,
            vec![1.0, 2.0, 3.0, 4.0, -9999.0, 6.0],
        )
        .unwrap()
        .with_nodata(-9999.0)
    }

    #[test]
    fn nearest_cell_sampling() {
        let r = ramp();
        assert_eq!(r.sample(&Point2::new(5.0, 15.0), 1), Some(1.0));
        assert_eq!(r.sample(&Point2::new(25.0, 15.0), 1), Some(3.0));
        assert_eq!(r.sample(&Point2::new(25.0, 5.0), 1), Some(6.0));
        assert_eq!(r.resolution_x(), 10.0);
    }

    #[test]
    fn nodata_and_outside_are_none() {
        let r = ramp();
        assert_eq!(r.sample(&Point2::new(15.0, 5.0), 1), None);
        assert_eq!(r.sample(&Point2::new(-1.0, 5.0), 1), None);
        assert_eq!(r.sample(&Point2::new(5.0, 25.0), 1), None);
        assert_eq!(r.sample(&Point2::new(5.0, 15.0), 2), None);
        assert_eq!(r.sample(&Point2::new(5.0, 15.0), 0), None);
    }

    #[test]
    fn extra_bands() {
        let r = ramp().with_band(vec![0.5; 6]).unwrap();
        assert_eq!(r.band_count(), 2);
        assert_eq!(r.sample(&Point2::new(5.0, 15.0), 2), Some(0.5));
        assert!(ramp().with_band(vec![0.0; 5]).is_err());
    }

    #[test]
    fn constant_surface_covers_extent() {
        let r = GridRaster::constant("flat", (0.0, -5.0), (100.0, 5.0), 1.0, 50.0).unwrap();
        assert_eq!(r.width(), 101);
        assert_eq!(r.height(), 11);
        assert_eq!(r.sample(&Point2::new(0.0, 0.0), 1), Some(50.0));
        assert_eq!(r.sample(&Point2::new(100.0, 5.0), 1), Some(50.0));
        assert_eq!(r.sample(&Point2::new(100.0, -5.0), 1), Some(50.0));
    }

    #[test]
    fn set_bumps_revision() {
        let mut r = ramp();
        r.set(1, 0, 0, 7.0).unwrap();
        assert_eq!(r.revision(), 1);
        assert_eq!(r.sample(&Point2::new(5.0, 15.0), 1), Some(7.0));
        assert!(r.set(3, 0, 0, 1.0).is_err());
    }
}
