// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for cross-section operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a cross-section
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A required layer or feature is absent (e.g. the section layer has no features)
    #[error("Data missing: {0}")]
    DataMissing(String),

    /// Null, degenerate or unprojectable geometry
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// A geometric operation (intersection, buffering, densification) failed
    #[error("Processing error: {0}")]
    Processing(String),

    /// A caller-supplied parameter violates its documented constraint
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Short machine-readable code for the error class
    pub fn code(&self) -> &'static str {
        match self {
            Error::DataMissing(_) => "DATA_MISSING",
            Error::Geometry(_) => "GEOMETRY_ERROR",
            Error::Processing(_) => "PROCESSING_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Validation errors are raised before any computation and never retried
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
