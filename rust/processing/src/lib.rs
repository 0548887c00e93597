// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # XSection Processing
//!
//! Producers that turn a section line and its source layers into
//! cross-section data, plus the cache and orchestration around them.
//!
//! ```text
//! SectionRequest ─► Orchestrator ─► topography ─► geology ─► structures ─► drillholes
//!                        │
//!                        └─► ProjectionCache (bucket, key) ─► CachedData
//! ```
//!
//! Producers can also be called directly:
//!
//! - [`generate_profile`]: elevation profile along the line
//! - [`generate_geology`] / [`project_geology`]: outcrop segments
//! - [`project_structures`]: apparent dips of point measurements
//! - [`project_drillholes`]: desurveyed traces and interval segments

pub mod cache;
pub mod config;
pub mod drillhole;
pub mod geology;
pub mod orchestrator;
pub mod profile;
pub mod section;
pub mod structure;

pub use cache::{
    CacheEntry, CacheParams, CacheStats, CachedData, Clock, EntryMetadata, ManualClock,
    ProjectionCache, SystemClock,
};
pub use config::{
    EngineConfig, DEFAULT_BOUNDARY_EPSILON, DEFAULT_CACHE_TTL_SECS, DEFAULT_TRAJECTORY_STEP,
    MAX_CACHE_TTL_SECS,
};
pub use drillhole::{
    project_drillholes, reconstruct_trajectory, DrillholeFieldMapping, DrillholeProjection,
    DrillholeProjector, PathPoint,
};
pub use geology::{generate_geology, project_geology, GeologyProjection, UNKNOWN_UNIT};
pub use orchestrator::{
    DrillholeInput, GeologyInput, Orchestrator, Producer, SectionRequest, SectionResult,
    StructureInput,
};
pub use profile::{generate_profile, sample_profile, MasterProfile, ProfileSample};
pub use section::section_line_from_source;
pub use structure::{project_structures, StructureFields, StructureProjection};
