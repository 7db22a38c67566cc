// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use serde::Deserialize;

use crate::core::GridSpec;
use crate::error::{FtleError, Result};

/// Relative tolerance for "divides integrally" checks on the time axis.
const CADENCE_TOLERANCE: f64 = 1e-9;

/// Integration direction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Integrate from `t_min` toward `t_max`.
    Forward,
    /// Integrate from `t_max` toward `t_min`.
    Backward,
}

impl Direction {
    /// The signed output step for this direction.
    pub fn signed(&self, delta_t: f64) -> f64 {
        match self {
            Direction::Forward => delta_t,
            Direction::Backward => -delta_t,
        }
    }

    /// Filename prefix encoding the direction.
    pub fn sign_prefix(&self) -> &'static str {
        match self {
            Direction::Forward => "positive_",
            Direction::Backward => "negative_",
        }
    }
}

/// Run settings, deserialized from the JSON configuration document.
///
/// Every key is required and unknown keys are rejected, so a configuration
/// typo fails before any compute starts.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Lower x extent of the domain.
    pub x_min: f64,
    /// Upper x extent of the domain.
    pub x_max: f64,
    /// Lower y extent of the domain.
    pub y_min: f64,
    /// Upper y extent of the domain.
    pub y_max: f64,
    /// Output-grid node count along x.
    pub nx: usize,
    /// Output-grid node count along y.
    pub ny: usize,
    /// Data-grid node count along x.
    pub data_nx: usize,
    /// Data-grid node count along y.
    pub data_ny: usize,
    /// Start of the temporal window.
    pub t_min: f64,
    /// End of the temporal window.
    pub t_max: f64,
    /// Snapshot cadence; must divide `t_max - t_min` integrally.
    pub data_delta_t: f64,
    /// Number of output timesteps.
    pub steps: usize,
    /// Prefix used in all generated filenames.
    pub file_prefix: String,
    /// Integration direction.
    pub direction: Direction,
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened and a
    /// configuration error if it does not deserialize (missing keys,
    /// unknown keys, wrong types, bad direction).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|source| FtleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| FtleError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Validate every setting the run depends on.
    ///
    /// # Errors
    /// Returns the first domain error found: invalid grid shape or extent,
    /// empty time window, non-positive cadence, or a cadence that does not
    /// divide the window.
    pub fn validate(&self) -> Result<()> {
        self.output_grid()?;
        self.data_grid()?;
        if !self.t_min.is_finite() || !self.t_max.is_finite() || self.t_max <= self.t_min {
            return Err(FtleError::InvalidTimeWindow {
                t_min: self.t_min,
                t_max: self.t_max,
            });
        }
        if !self.data_delta_t.is_finite() || self.data_delta_t <= 0.0 {
            return Err(FtleError::InvalidDataCadence(self.data_delta_t));
        }
        let span = self.t_max - self.t_min;
        let ratio = span / self.data_delta_t;
        if (ratio - ratio.round()).abs() > CADENCE_TOLERANCE * ratio.max(1.0) {
            return Err(FtleError::CadenceMismatch {
                span,
                data_delta_t: self.data_delta_t,
            });
        }
        Ok(())
    }

    /// The output grid described by these settings.
    pub fn output_grid(&self) -> Result<GridSpec> {
        GridSpec::new(
            self.nx,
            self.ny,
            self.x_min,
            self.x_max,
            self.y_min,
            self.y_max,
        )
    }

    /// The data grid described by these settings. It shares the output
    /// grid's extent.
    pub fn data_grid(&self) -> Result<GridSpec> {
        GridSpec::new(
            self.data_nx,
            self.data_ny,
            self.x_min,
            self.x_max,
            self.y_min,
            self.y_max,
        )
    }

    /// The unsigned output step `(t_max - t_min) / steps`, or zero for a
    /// zero-step run.
    pub fn delta_t(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            (self.t_max - self.t_min) / self.steps as f64
        }
    }

    /// Number of snapshots covering the window, endpoints included.
    pub fn snapshot_count(&self) -> usize {
        ((self.t_max - self.t_min) / self.data_delta_t).round() as usize + 1
    }
}
