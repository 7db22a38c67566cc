// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur during FTLE run setup, I/O, or execution.
#[derive(Debug)]
pub enum FtleError {
    /// Grid shape is invalid (node count too small).
    InvalidGridShape {
        /// The axis ('x' or 'y').
        axis: char,
        /// The node count provided.
        size: usize,
    },
    /// Domain extent is empty or non-finite.
    InvalidDomain {
        /// The axis ('x' or 'y').
        axis: char,
        /// The lower extent provided.
        min: f64,
        /// The upper extent provided.
        max: f64,
    },
    /// Temporal window is empty or non-finite.
    InvalidTimeWindow {
        /// The window start.
        t_min: f64,
        /// The window end.
        t_max: f64,
    },
    /// Snapshot cadence is not positive and finite.
    InvalidDataCadence(f64),
    /// Snapshot cadence does not divide the temporal window.
    CadenceMismatch {
        /// The window length.
        span: f64,
        /// The cadence provided.
        data_delta_t: f64,
    },
    /// Configuration document could not be parsed (missing, unknown, or
    /// malformed keys).
    Config(String),
    /// Snapshot file header shape does not match the configured data grid.
    SnapshotShapeMismatch {
        /// The offending file.
        path: PathBuf,
        /// The expected (nx, ny).
        expected: (usize, usize),
        /// The (nx, ny) found in the header.
        got: (usize, usize),
    },
    /// Snapshot file time stamp does not match the expected cadence slot.
    SnapshotTimeMismatch {
        /// The offending file.
        path: PathBuf,
        /// The expected time.
        expected: f64,
        /// The time found in the header.
        got: f64,
    },
    /// Snapshot file is truncated or contains an unparseable value.
    MalformedSnapshot {
        /// The offending file.
        path: PathBuf,
        /// 1-based line of the failure.
        line: usize,
        /// What went wrong.
        reason: String,
    },
    /// Step-map file header shape does not match the output grid.
    StepMapShapeMismatch {
        /// The offending file.
        path: PathBuf,
        /// The expected (nx, ny).
        expected: (usize, usize),
        /// The (nx, ny) found in the header.
        got: (usize, usize),
    },
    /// Step-map file end time does not match the requested step.
    StepMapTimeMismatch {
        /// The offending file.
        path: PathBuf,
        /// The expected end time.
        expected: f64,
        /// The end time found in the header.
        got: f64,
    },
    /// Step-map file is shorter than its header promises.
    StepMapTruncated {
        /// The offending file.
        path: PathBuf,
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        got: usize,
    },
    /// I/O error on a named file or directory.
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// Other error with a descriptive message.
    Other(String),
}

impl fmt::Display for FtleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtleError::InvalidGridShape { axis, size } => {
                write!(
                    f,
                    "invalid grid shape: axis {} has {} nodes (must be >= 2)",
                    axis, size
                )
            }
            FtleError::InvalidDomain { axis, min, max } => {
                write!(
                    f,
                    "invalid domain: axis {} extent [{}, {}] is empty or non-finite",
                    axis, min, max
                )
            }
            FtleError::InvalidTimeWindow { t_min, t_max } => {
                write!(
                    f,
                    "invalid time window: [{}, {}] is empty or non-finite",
                    t_min, t_max
                )
            }
            FtleError::InvalidDataCadence(dt) => {
                write!(
                    f,
                    "invalid data cadence: {} (must be positive and finite)",
                    dt
                )
            }
            FtleError::CadenceMismatch { span, data_delta_t } => {
                write!(
                    f,
                    "data cadence {} does not divide the time window length {}",
                    data_delta_t, span
                )
            }
            FtleError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            FtleError::SnapshotShapeMismatch {
                path,
                expected,
                got,
            } => {
                write!(
                    f,
                    "snapshot '{}': grid is {}x{}, expected {}x{}",
                    path.display(),
                    got.0,
                    got.1,
                    expected.0,
                    expected.1
                )
            }
            FtleError::SnapshotTimeMismatch {
                path,
                expected,
                got,
            } => {
                write!(
                    f,
                    "snapshot '{}': time stamp {} does not match expected {}",
                    path.display(),
                    got,
                    expected
                )
            }
            FtleError::MalformedSnapshot { path, line, reason } => {
                write!(
                    f,
                    "snapshot '{}' line {}: {}",
                    path.display(),
                    line,
                    reason
                )
            }
            FtleError::StepMapShapeMismatch {
                path,
                expected,
                got,
            } => {
                write!(
                    f,
                    "step map '{}': grid is {}x{}, expected {}x{}",
                    path.display(),
                    got.0,
                    got.1,
                    expected.0,
                    expected.1
                )
            }
            FtleError::StepMapTimeMismatch {
                path,
                expected,
                got,
            } => {
                write!(
                    f,
                    "step map '{}': end time {} does not match expected {}",
                    path.display(),
                    got,
                    expected
                )
            }
            FtleError::StepMapTruncated {
                path,
                expected,
                got,
            } => {
                write!(
                    f,
                    "step map '{}': file is {} bytes, expected {}",
                    path.display(),
                    got,
                    expected
                )
            }
            FtleError::Io { path, source } => {
                write!(f, "cannot access '{}': {}", path.display(), source)
            }
            FtleError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FtleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FtleError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for Results with FtleError.
pub type Result<T> = std::result::Result<T, FtleError>;
