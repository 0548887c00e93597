// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Section orchestration
//!
//! Runs the producers in the order topography, geology, structures,
//! drillholes. Every producer first checks the cache under a key built from
//! its own parameters. Topography is mandatory; the other producers degrade
//! to an empty output plus an advisory when their input is incomplete or
//! their computation fails.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;
use xsection_core::{
    Advisories, DrillholeTrace, Error, GeologySegment, ProfilePoint, Result, StructureMeasurement,
};
use xsection_geometry::{FeatureSource, RasterSampler, SectionLine};

use crate::cache::{CacheParams, CachedData, ProjectionCache};
use crate::config::EngineConfig;
use crate::drillhole::{DrillholeFieldMapping, DrillholeProjection, DrillholeProjector};
use crate::geology::{project_geology, GeologyProjection};
use crate::profile::{resolve_interval, sample_profile, validate_band, MasterProfile};
use crate::structure::{project_structures, validate_buffer_distance, StructureProjection};

/// The four producers, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Producer {
    Topography,
    Geology,
    Structures,
    Drillholes,
}

impl Producer {
    /// Cache bucket and advisory source of the producer
    pub fn bucket(&self) -> &'static str {
        match self {
            Producer::Topography => "topography",
            Producer::Geology => "geology",
            Producer::Structures => "structures",
            Producer::Drillholes => "drillholes",
        }
    }
}

/// Outcrop polygons and the field naming their unit
pub struct GeologyInput<'a> {
    pub outcrops: &'a dyn FeatureSource,
    pub unit_name_field: Option<String>,
}

/// Structural point measurements
pub struct StructureInput<'a> {
    pub points: &'a dyn FeatureSource,
    pub dip_field: Option<String>,
    pub strike_field: Option<String>,
    pub buffer_distance: f64,
}

/// Drillhole tables
pub struct DrillholeInput<'a> {
    pub collars: &'a dyn FeatureSource,
    pub surveys: Option<&'a dyn FeatureSource>,
    pub intervals: Option<&'a dyn FeatureSource>,
    pub mapping: DrillholeFieldMapping,
    pub buffer_distance: f64,
}

/// Everything needed to build one cross-section
pub struct SectionRequest<'a> {
    /// Stable identifier of the section line
    pub section_id: String,
    pub line: &'a SectionLine,
    pub raster: Option<&'a dyn RasterSampler>,
    /// 1-based raster band
    pub band: usize,
    /// Profile sampling interval; the raster resolution when unset
    pub interval: Option<f64>,
    pub geology: Option<GeologyInput<'a>>,
    pub structures: Option<StructureInput<'a>>,
    pub drillholes: Option<DrillholeInput<'a>>,
}

impl<'a> SectionRequest<'a> {
    pub fn new(section_id: impl Into<String>, line: &'a SectionLine) -> Self {
        Self {
            section_id: section_id.into(),
            line,
            raster: None,
            band: 1,
            interval: None,
            geology: None,
            structures: None,
            drillholes: None,
        }
    }

    pub fn with_topography(mut self, raster: &'a dyn RasterSampler, band: usize) -> Self {
        self.raster = Some(raster);
        self.band = band;
        self
    }

    pub fn with_interval(mut self, interval: f64) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_geology(mut self, outcrops: &'a dyn FeatureSource, unit_name_field: Option<&str>) -> Self {
        self.geology = Some(GeologyInput {
            outcrops,
            unit_name_field: unit_name_field.map(str::to_string),
        });
        self
    }

    pub fn with_structures(
        mut self,
        points: &'a dyn FeatureSource,
        dip_field: Option<&str>,
        strike_field: Option<&str>,
        buffer_distance: f64,
    ) -> Self {
        self.structures = Some(StructureInput {
            points,
            dip_field: dip_field.map(str::to_string),
            strike_field: strike_field.map(str::to_string),
            buffer_distance,
        });
        self
    }

    pub fn with_drillholes(mut self, input: DrillholeInput<'a>) -> Self {
        self.drillholes = Some(input);
        self
    }
}

/// All outputs of one section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionResult {
    pub section_id: String,
    pub topography: Vec<ProfilePoint>,
    pub geology: Vec<GeologySegment>,
    pub structures: Vec<StructureMeasurement>,
    /// Drillhole intervals in section coordinates
    pub drillhole_segments: Vec<GeologySegment>,
    pub drillholes: Vec<DrillholeTrace>,
    pub advisories: Advisories,
    /// Producers served from the cache
    pub cache_hits: Vec<Producer>,
}

/// Producer outputs that can live in the cache
trait Cached: Sized {
    const PRODUCER: Producer;
    fn wrap(value: Arc<Self>) -> CachedData;
    fn unwrap(data: CachedData) -> Option<Arc<Self>>;
}

macro_rules! impl_cached {
    ($ty:ty, $producer:ident, $variant:ident) => {
        impl Cached for $ty {
            const PRODUCER: Producer = Producer::$producer;

            fn wrap(value: Arc<Self>) -> CachedData {
                CachedData::$variant(value)
            }

            fn unwrap(data: CachedData) -> Option<Arc<Self>> {
                match data {
                    CachedData::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

impl_cached!(MasterProfile, Topography, Topography);
impl_cached!(GeologyProjection, Geology, Geology);
impl_cached!(StructureProjection, Structures, Structures);
impl_cached!(DrillholeProjection, Drillholes, Drillholes);

/// Runs section requests against a shared cache
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: EngineConfig,
    cache: Arc<ProjectionCache>,
    /// Batch worker pool; `None` falls back to rayon's global pool
    pool: Option<Arc<ThreadPool>>,
}

impl Orchestrator {
    pub fn new(config: EngineConfig, cache: Arc<ProjectionCache>) -> Self {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .build()
        {
            Ok(pool) => Some(Arc::new(pool)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build worker pool, using the global pool");
                None
            }
        };
        Self { config, cache, pool }
    }

    /// Orchestrator with a private cache configured from `config`
    pub fn with_config(config: EngineConfig) -> Self {
        let cache = Arc::new(ProjectionCache::from_config(&config));
        Self::new(config, cache)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ProjectionCache> {
        &self.cache
    }

    /// Threads available to `run_batch`
    pub fn worker_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, |pool| pool.current_num_threads())
    }

    /// Builds every requested output of one section
    pub fn run(&self, request: &SectionRequest<'_>) -> Result<SectionResult> {
        let started = Instant::now();
        let interval = self.validate(request)?;

        let Some(raster) = request.raster else {
            return Err(Error::Processing(format!(
                "section '{}': topography requires an elevation raster",
                request.section_id
            )));
        };

        let mut result = SectionResult {
            section_id: request.section_id.clone(),
            ..SectionResult::default()
        };
        if let Some(warning) = request.line.measurer().warning() {
            result.advisories.push("crs", warning);
        }

        // Topography: mandatory, errors propagate unchanged
        let base = section_params(request);
        let params = base
            .clone()
            .source("raster", raster.source_id(), raster.revision())
            .param("band", request.band as u64)
            .param("interval", interval);
        let master = self.cached(&params, &mut result, || {
            sample_profile(request.line, raster, request.band, Some(interval))
        })?;
        if master.missing_samples() > 0 {
            result.advisories.push(
                Producer::Topography.bucket(),
                format!("{} elevation sample(s) missing, set to 0.0", master.missing_samples()),
            );
        }
        result.topography = master.points();

        if let Some(input) = &request.geology {
            if let Some(geology) = self.geology(request, input, &params, &master, &mut result) {
                result.geology = geology.segments.clone();
                result.advisories.extend(geology.advisories.clone());
            }
        }

        if let Some(input) = &request.structures {
            if let Some(structures) = self.structures(request, raster, input, &base, &mut result) {
                result.structures = structures.measurements.clone();
                result.advisories.extend(structures.advisories.clone());
            }
        }

        if let Some(input) = &request.drillholes {
            if let Some(drillholes) = self.drillholes(request, raster, input, &base, &mut result) {
                result.drillhole_segments = drillholes.segments.clone();
                result.drillholes = drillholes.traces.clone();
                result.advisories.extend(drillholes.advisories.clone());
            }
        }

        tracing::info!(
            section = %request.section_id,
            profile_points = result.topography.len(),
            geology = result.geology.len(),
            structures = result.structures.len(),
            drillholes = result.drillholes.len(),
            advisories = result.advisories.len(),
            cache_hits = result.cache_hits.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Section generated"
        );
        Ok(result)
    }

    /// Runs independent requests in parallel; only the cache is shared
    pub fn run_batch(&self, requests: &[SectionRequest<'_>]) -> Vec<Result<SectionResult>> {
        let run = || -> Vec<Result<SectionResult>> {
            requests.par_iter().map(|r| self.run(r)).collect()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    /// Parameter checks, all before any computation. Returns the sampling interval.
    fn validate(&self, request: &SectionRequest<'_>) -> Result<f64> {
        if request.band < 1 {
            return Err(Error::Validation(format!(
                "band index must be >= 1, got {}",
                request.band
            )));
        }
        if let Some(input) = &request.structures {
            validate_buffer_distance(input.buffer_distance)?;
        }
        if let Some(input) = &request.drillholes {
            validate_buffer_distance(input.buffer_distance)?;
        }
        match request.raster {
            Some(raster) => {
                validate_band(raster, request.band)?;
                resolve_interval(raster, request.interval)
            }
            None => match request.interval {
                Some(i) if !(i.is_finite() && i > 0.0) => Err(Error::Validation(format!(
                    "sampling interval must be a positive number, got {}",
                    i
                ))),
                _ => Ok(0.0),
            },
        }
    }

    fn geology(
        &self,
        request: &SectionRequest<'_>,
        input: &GeologyInput<'_>,
        topography: &CacheParams,
        master: &MasterProfile,
        result: &mut SectionResult,
    ) -> Option<Arc<GeologyProjection>> {
        let Some(field) = non_blank(input.unit_name_field.as_deref()) else {
            degrade(result, Producer::Geology, "outcrop layer given but no unit name field configured");
            return None;
        };

        let params = topography
            .clone()
            .source("outcrops", input.outcrops.source_id(), input.outcrops.revision())
            .param("unit_name_field", field)
            .param("epsilon", self.config.boundary_epsilon);
        let outcome = self.cached(&params, result, || {
            project_geology(
                request.line,
                master,
                input.outcrops,
                field,
                self.config.boundary_epsilon,
            )
        });
        self.optional(outcome, Producer::Geology, result)
    }

    fn structures(
        &self,
        request: &SectionRequest<'_>,
        raster: &dyn RasterSampler,
        input: &StructureInput<'_>,
        base: &CacheParams,
        result: &mut SectionResult,
    ) -> Option<Arc<StructureProjection>> {
        let Some(dip_field) = non_blank(input.dip_field.as_deref()) else {
            degrade(result, Producer::Structures, "structure layer given but no dip field configured");
            return None;
        };
        let strike_field = input.strike_field.as_deref().unwrap_or("");

        let params = base
            .clone()
            .source("raster", raster.source_id(), raster.revision())
            .param("band", request.band as u64)
            .source("points", input.points.source_id(), input.points.revision())
            .param("buffer_distance", input.buffer_distance)
            .param("dip_field", dip_field)
            .param("strike_field", strike_field);
        let outcome = self.cached(&params, result, || {
            project_structures(
                request.line,
                raster,
                input.points,
                input.buffer_distance,
                dip_field,
                strike_field,
                request.band,
            )
        });
        self.optional(outcome, Producer::Structures, result)
    }

    fn drillholes(
        &self,
        request: &SectionRequest<'_>,
        raster: &dyn RasterSampler,
        input: &DrillholeInput<'_>,
        base: &CacheParams,
        result: &mut SectionResult,
    ) -> Option<Arc<DrillholeProjection>> {
        let mut params = base
            .clone()
            .source("raster", raster.source_id(), raster.revision())
            .param("band", request.band as u64)
            .source("collars", input.collars.source_id(), input.collars.revision())
            .serialized("mapping", &input.mapping)
            .param("buffer_distance", input.buffer_distance)
            .param("step", self.config.trajectory_step);
        if let Some(surveys) = input.surveys {
            params = params.source("surveys", surveys.source_id(), surveys.revision());
        }
        if let Some(intervals) = input.intervals {
            params = params.source("intervals", intervals.source_id(), intervals.revision());
        }

        let outcome = self.cached(&params, result, || {
            DrillholeProjector::new(request.line, &input.mapping, input.buffer_distance)?
                .with_step(self.config.trajectory_step)?
                .with_elevation(raster, request.band)?
                .project(input.collars, input.surveys, input.intervals)
        });
        self.optional(outcome, Producer::Drillholes, result)
    }

    /// Serves `T` from the cache or computes and stores it
    fn cached<T, F>(&self, params: &CacheParams, result: &mut SectionResult, compute: F) -> Result<Arc<T>>
    where
        T: Cached,
        F: FnOnce() -> Result<T>,
    {
        let bucket = T::PRODUCER.bucket();
        let key = params.key();

        if let Some(value) = self.cache.get(bucket, &key).and_then(T::unwrap) {
            result.cache_hits.push(T::PRODUCER);
            return Ok(value);
        }

        let started = Instant::now();
        let value = Arc::new(compute()?);
        tracing::debug!(
            producer = bucket,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Producer computed"
        );
        self.cache.set_with_sources(
            bucket,
            &key,
            T::wrap(value.clone()),
            Some(self.config.cache_ttl()),
            params.sources().to_vec(),
        );
        Ok(value)
    }

    /// Turns an optional producer failure into an advisory
    fn optional<T>(&self, outcome: Result<Arc<T>>, producer: Producer, result: &mut SectionResult) -> Option<Arc<T>> {
        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                degrade(result, producer, &format!("skipped: {}", e));
                None
            }
        }
    }
}

fn degrade(result: &mut SectionResult, producer: Producer, message: &str) {
    tracing::warn!(section = %result.section_id, producer = producer.bucket(), message, "Optional output degraded");
    result.advisories.push(producer.bucket(), message);
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Key parameters identifying the section line
fn section_params(request: &SectionRequest<'_>) -> CacheParams {
    let vertices: Vec<[f64; 2]> = request.line.vertices().iter().map(|p| [p.x, p.y]).collect();
    CacheParams::new()
        .source("section", &request.section_id, 0)
        .serialized("line", &vertices)
        .serialized("crs", &request.line.measurer().authid())
}
