// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::advect;
use crate::compose;
use crate::config::{Direction, Settings};
use crate::core::{GridSpec, PositionField};
use crate::error::{FtleError, Result};
use crate::ftle;
use crate::io::{self, StepMapStore};
use crate::sampler::SnapshotCache;

/// Directory layout of a run, all under one project directory.
pub struct ProjectPaths {
    /// Velocity snapshot files.
    pub data: PathBuf,
    /// Step flow map files.
    pub step_maps: PathBuf,
    /// FTLE output files.
    pub ftle: PathBuf,
}

impl ProjectPaths {
    /// The conventional layout: `data`, `step_flow_maps` and
    /// `results/ftle` under the project directory.
    pub fn under(project_dir: &Path) -> Self {
        ProjectPaths {
            data: project_dir.join("data"),
            step_maps: project_dir.join("step_flow_maps"),
            ftle: project_dir.join("results").join("ftle"),
        }
    }
}

/// Which of the two run phases a progress report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Phase A: advecting the uniform grid one output step at a time.
    StepMaps,
    /// Phase B: composing step maps and emitting FTLE fields.
    Composition,
}

/// Progress information passed to the optional callback, once per output
/// step in each phase.
pub struct ProgressInfo {
    /// The phase being reported.
    pub phase: RunPhase,
    /// Zero-based step index within the phase.
    pub step: usize,
    /// Total steps in the phase.
    pub total: usize,
    /// Start time of the work this report covers.
    pub t_from: f64,
    /// End time of the work this report covers.
    pub t_to: f64,
    /// Elapsed time since the run started.
    pub elapsed: Duration,
}

/// The batch FTLE computation over a stack of velocity snapshots.
///
/// Phase A advects a fresh uniform particle grid by one output step at a
/// time, persisting each end-position field as a step flow map. Phase B
/// rebuilds the flow map from every output time to the final time by
/// resampling those step maps in sequence, and derives one FTLE field per
/// output time. Total work is linear in the number of output times
/// instead of quadratic, which is the point of the scheme.
pub struct FtleSolver {
    settings: Settings,
    paths: ProjectPaths,
    output_grid: GridSpec,
    data_grid: GridSpec,
    precision: usize,
    num_threads: Option<usize>,
}

impl FtleSolver {
    /// Create a solver, validating the settings before any compute.
    ///
    /// # Errors
    /// Returns the first configuration domain error found.
    pub fn new(settings: Settings, paths: ProjectPaths) -> Result<Self> {
        settings.validate()?;
        let output_grid = settings.output_grid()?;
        let data_grid = settings.data_grid()?;
        let precision = io::precision(settings.data_delta_t);
        Ok(FtleSolver {
            settings,
            paths,
            output_grid,
            data_grid,
            precision,
            num_threads: None,
        })
    }

    /// Set the number of worker threads (builder method).
    /// If not specified, defaults to the number of available CPU cores.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// The worker thread count the run will use.
    pub fn worker_count(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// The settings this solver was built from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn t_initial(&self) -> f64 {
        match self.settings.direction {
            Direction::Forward => self.settings.t_min,
            Direction::Backward => self.settings.t_max,
        }
    }

    fn signed_delta_t(&self) -> f64 {
        self.settings.direction.signed(self.settings.delta_t())
    }

    /// Time after `k` signed output steps from the initial time. All
    /// filename times derive from this, so writers and readers format
    /// identical strings.
    fn time_at(&self, k: usize) -> f64 {
        self.t_initial() + k as f64 * self.signed_delta_t()
    }

    fn t_final(&self) -> f64 {
        if self.settings.steps == 0 {
            match self.settings.direction {
                Direction::Forward => self.settings.t_max,
                Direction::Backward => self.settings.t_min,
            }
        } else {
            self.time_at(self.settings.steps)
        }
    }

    fn ftle_output_path(&self, t_origin: f64, t_final: f64) -> PathBuf {
        let (t_a, t_b) = match self.settings.direction {
            Direction::Forward => (t_origin, t_final),
            Direction::Backward => (t_final, t_origin),
        };
        io::ftle_path(
            &self.paths.ftle,
            &self.settings.file_prefix,
            self.settings.direction.sign_prefix(),
            t_a,
            t_b,
            self.precision,
        )
    }

    /// Run both phases to completion.
    ///
    /// # Errors
    /// Returns the first I/O or format error; there is no partial-result
    /// recovery. Out-of-bounds particles are not errors, they surface as
    /// sentinel cells in the output.
    pub fn run(&self, progress: Option<&(dyn Fn(ProgressInfo) + Sync)>) -> Result<()> {
        let start = Instant::now();
        let steps = self.settings.steps;
        let signed_dt = self.signed_delta_t();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count())
            .build()
            .map_err(|e| FtleError::Other(e.to_string()))?;

        let store = StepMapStore::new(
            self.paths.step_maps.clone(),
            self.settings.file_prefix.clone(),
            self.settings.direction.sign_prefix(),
            self.precision,
        );
        let mut cache = SnapshotCache::new(
            self.paths.data.clone(),
            self.settings.file_prefix.clone(),
            self.precision,
            self.data_grid,
            self.settings.t_min,
            self.settings.data_delta_t,
            self.settings.snapshot_count(),
        );

        let emit = |phase: RunPhase, step: usize, t_from: f64, t_to: f64| {
            if let Some(cb) = progress {
                cb(ProgressInfo {
                    phase,
                    step,
                    total: steps,
                    t_from,
                    t_to,
                    elapsed: start.elapsed(),
                });
            }
        };

        // Phase A: one step map per output step, each integrated from a
        // fresh uniform grid. The identity map at the initial time keeps
        // the file sequence contiguous; composition never reads it.
        store.write(&PositionField::uniform(self.output_grid, self.t_initial()))?;

        let substeps = advect::substep_count(signed_dt, self.settings.data_delta_t);
        for s in 0..steps {
            let t_from = self.time_at(s);
            let t_to = self.time_at(s + 1);
            emit(RunPhase::StepMaps, s, t_from, t_to);

            let mut positions = PositionField::uniform(self.output_grid, t_from);
            let h = signed_dt / substeps as f64;
            for sub in 0..substeps {
                let t0 = t_from + sub as f64 * h;
                let sampler = cache.window(t0.min(t0 + h), t0.max(t0 + h))?;
                pool.install(|| advect::advect_substep(&mut positions, &sampler, t0, h));
            }
            positions.t = t_to;
            store.write(&positions)?;
        }

        // Phase B: slide the origin back from the final time, composing
        // one more step map each iteration.
        let t_final = self.t_final();
        if steps == 0 {
            let identity = PositionField::uniform(self.output_grid, t_final);
            let field = ftle::ftle_field(&identity, t_final, t_final);
            return io::write_ftle(&self.ftle_output_path(t_final, t_final), &field);
        }
        for i in 0..steps {
            let t_origin = self.time_at(steps - (i + 1));
            emit(RunPhase::Composition, i, t_origin, t_final);

            let end_times: Vec<f64> = (steps - i..=steps).map(|k| self.time_at(k)).collect();
            let psi = pool.install(|| {
                compose::compose_flow_map(&self.output_grid, &store, &end_times, t_origin)
            })?;
            let field = pool.install(|| ftle::ftle_field(&psi, t_origin, t_final));
            io::write_ftle(&self.ftle_output_path(t_origin, t_final), &field)?;
        }

        Ok(())
    }
}
