// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # XSection Core
//!
//! Shared vocabulary for the cross-section engine:
//!
//! - **Error taxonomy**: `DataMissing`, `Geometry`, `Processing`, `Validation`
//! - **Typed attributes**: feature fields classified once at ingestion
//! - **Profile data model**: profile points, geology segments, structural
//!   measurements, drillhole collars, surveys, trajectories and intervals
//! - **Orientation**: strike/dip notation parsing and apparent dip

pub mod advisory;
pub mod attributes;
pub mod error;
pub mod model;
pub mod orientation;

pub use advisory::{Advisories, Advisory};
pub use attributes::{AttributeValue, Attributes};
pub use error::{Error, Result};
pub use model::{
    is_distance_sorted, DrillholeCollar, DrillholeTrace, GeologySegment, IntervalSegment,
    ProfilePoint, StructureMeasurement, SurveyStation, TrajectoryPoint,
};
pub use orientation::{
    apparent_dip, is_valid_dip, is_valid_strike, normalize_azimuth, parse_dip, parse_strike,
    strike_from_dip_direction, DipReading,
};
