// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::{bilinear_sample, GridSpec, Vec2, VelocityField, VelocitySnapshot};
use crate::error::Result;
use crate::io;

/// Lazy, bounded ownership of velocity snapshots.
///
/// Snapshots are read from their text files on demand; `window` makes the
/// frames bracketing a time span resident, evicts everything outside it,
/// and hands out a read-only sampler over the resident frames. During an
/// integration the window slides along the data cadence, so at most a
/// handful of frames are ever held.
pub struct SnapshotCache {
    dir: PathBuf,
    file_prefix: String,
    precision: usize,
    grid: GridSpec,
    t_min: f64,
    data_delta_t: f64,
    frame_count: usize,
    frames: BTreeMap<usize, VelocitySnapshot>,
}

impl SnapshotCache {
    /// Create an empty cache over `frame_count` snapshots starting at
    /// `t_min` with cadence `data_delta_t`, stored under `dir`.
    pub fn new(
        dir: PathBuf,
        file_prefix: String,
        precision: usize,
        grid: GridSpec,
        t_min: f64,
        data_delta_t: f64,
        frame_count: usize,
    ) -> Self {
        SnapshotCache {
            dir,
            file_prefix,
            precision,
            grid,
            t_min,
            data_delta_t,
            frame_count,
            frames: BTreeMap::new(),
        }
    }

    /// Time of snapshot `k`.
    pub fn frame_time(&self, k: usize) -> f64 {
        self.t_min + k as f64 * self.data_delta_t
    }

    /// Number of snapshots currently resident.
    pub fn resident_frames(&self) -> usize {
        self.frames.len()
    }

    /// Frame indices bracketing `[t_lo, t_hi]`, padded by one frame above
    /// so floating-point edge hits never leave the window.
    fn bracket(&self, t_lo: f64, t_hi: f64) -> (usize, usize) {
        let last = self.frame_count - 1;
        let lo_raw = ((t_lo - self.t_min) / self.data_delta_t).floor().max(0.0) as usize;
        let hi_raw = ((t_hi - self.t_min) / self.data_delta_t).floor().max(0.0) as usize + 1;
        let lo = lo_raw.min(last - 1);
        let hi = hi_raw.clamp(lo + 1, last);
        (lo, hi)
    }

    /// Make the snapshots covering `[t_lo, t_hi]` resident and return a
    /// sampler over them. Frames outside the span are dropped.
    ///
    /// # Errors
    /// Returns an I/O or format error if a required snapshot file cannot
    /// be read or fails header validation.
    pub fn window(&mut self, t_lo: f64, t_hi: f64) -> Result<VelocitySampler<'_>> {
        let (lo, hi) = self.bracket(t_lo, t_hi);
        self.frames.retain(|k, _| *k >= lo && *k <= hi);
        for k in lo..=hi {
            if !self.frames.contains_key(&k) {
                let t = self.frame_time(k);
                let path = io::snapshot_path(&self.dir, &self.file_prefix, t, self.precision);
                let snapshot = io::read_snapshot(&path, &self.grid, t)?;
                self.frames.insert(k, snapshot);
            }
        }
        let frames: Vec<&VelocitySnapshot> = self.frames.range(lo..=hi).map(|(_, s)| s).collect();
        Ok(VelocitySampler {
            frames,
            first: lo,
            t_min: self.t_min,
            data_delta_t: self.data_delta_t,
            grid: self.grid,
        })
    }
}

/// Read-only velocity sampler over a contiguous window of snapshots.
///
/// Serves `v(x, y, t)` by bilinear interpolation on the data grid and
/// linear interpolation between the two snapshots bracketing `t`. An
/// exact time hit returns that snapshot's interpolant verbatim; positions
/// outside the domain are clamped to the boundary.
pub struct VelocitySampler<'a> {
    frames: Vec<&'a VelocitySnapshot>,
    first: usize,
    t_min: f64,
    data_delta_t: f64,
    grid: GridSpec,
}

impl VelocityField for VelocitySampler<'_> {
    fn velocity(&self, x: f64, y: f64, t: f64) -> Vec2 {
        let last = self.first + self.frames.len() - 1;
        let raw = ((t - self.t_min) / self.data_delta_t).floor().max(0.0) as usize;
        let k = raw.clamp(self.first, last - 1);
        let lower = self.frames[k - self.first];
        let alpha = ((t - self.frame_time(k)) / self.data_delta_t).clamp(0.0, 1.0);

        let a = bilinear_sample(&self.grid, x, y, |i, j| lower.samples[[i, j]]);
        if alpha == 0.0 {
            return a;
        }
        let upper = self.frames[k + 1 - self.first];
        let b = bilinear_sample(&self.grid, x, y, |i, j| upper.samples[[i, j]]);
        Vec2 {
            x: (1.0 - alpha) * a.x + alpha * b.x,
            y: (1.0 - alpha) * a.y + alpha * b.y,
        }
    }
}

impl VelocitySampler<'_> {
    fn frame_time(&self, k: usize) -> f64 {
        self.t_min + k as f64 * self.data_delta_t
    }
}
