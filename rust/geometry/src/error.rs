// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the geometry kernel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Empty geometry: {0}")]
    EmptyGeometry(String),

    #[error("Degenerate geometry: {0}")]
    Degenerate(String),

    #[error("Non-finite coordinates: {0}")]
    NonFinite(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Geometry operation failed: {0}")]
    Operation(String),
}

impl From<Error> for xsection_core::Error {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::EmptyGeometry(_) => xsection_core::Error::DataMissing(message),
            Error::Degenerate(_) | Error::NonFinite(_) => xsection_core::Error::Geometry(message),
            Error::InvalidParameter(_) => xsection_core::Error::Validation(message),
            Error::Operation(_) => xsection_core::Error::Processing(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_onto_core_taxonomy() {
        let core: xsection_core::Error = Error::EmptyGeometry("section".into()).into();
        assert_eq!(core.code(), "DATA_MISSING");
        let core: xsection_core::Error = Error::Degenerate("zero length".into()).into();
        assert_eq!(core.code(), "GEOMETRY_ERROR");
        let core: xsection_core::Error = Error::InvalidParameter("interval".into()).into();
        assert_eq!(core.code(), "VALIDATION_ERROR");
        let core: xsection_core::Error = Error::Operation("clip".into()).into();
        assert_eq!(core.code(), "PROCESSING_ERROR");
    }
}
