// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use ndarray::Array2;

use crate::error::{FtleError, Result};

/// A 2-D vector value, used for velocities and particle positions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2 {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// Geometry of a uniform rectangular grid.
///
/// Node `(i, j)` with `0 <= i < nx`, `0 <= j < ny` sits at physical
/// coordinates `(x_min + i*dx, y_min + j*dy)`. All fields over the same
/// grid share this metadata; storage is row-major with `i` outer and `j`
/// inner, matching the order of every file format in this crate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Number of nodes along x.
    pub nx: usize,
    /// Number of nodes along y.
    pub ny: usize,
    /// Lower x extent.
    pub x_min: f64,
    /// Upper x extent.
    pub x_max: f64,
    /// Lower y extent.
    pub y_min: f64,
    /// Upper y extent.
    pub y_max: f64,
}

impl GridSpec {
    /// Create a grid, validating shape and extents.
    ///
    /// # Errors
    /// Returns an error if either node count is below 2 or an extent is
    /// empty or non-finite.
    pub fn new(
        nx: usize,
        ny: usize,
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    ) -> Result<Self> {
        if nx < 2 {
            return Err(FtleError::InvalidGridShape { axis: 'x', size: nx });
        }
        if ny < 2 {
            return Err(FtleError::InvalidGridShape { axis: 'y', size: ny });
        }
        if !x_min.is_finite() || !x_max.is_finite() || x_max <= x_min {
            return Err(FtleError::InvalidDomain {
                axis: 'x',
                min: x_min,
                max: x_max,
            });
        }
        if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
            return Err(FtleError::InvalidDomain {
                axis: 'y',
                min: y_min,
                max: y_max,
            });
        }
        Ok(GridSpec {
            nx,
            ny,
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    /// Node spacing along x.
    pub fn dx(&self) -> f64 {
        (self.x_max - self.x_min) / (self.nx - 1) as f64
    }

    /// Node spacing along y.
    pub fn dy(&self) -> f64 {
        (self.y_max - self.y_min) / (self.ny - 1) as f64
    }

    /// x coordinate of column `i`.
    pub fn x_at(&self, i: usize) -> f64 {
        self.x_min + i as f64 * self.dx()
    }

    /// y coordinate of row `j`.
    pub fn y_at(&self, j: usize) -> f64 {
        self.y_min + j as f64 * self.dy()
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    /// True if the grid has no nodes (never true for a validated grid).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `(x, y)` lies inside the closed domain rectangle.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    /// Clamp a point to the domain rectangle.
    pub fn clamp_point(&self, p: Vec2) -> Vec2 {
        Vec2 {
            x: p.x.clamp(self.x_min, self.x_max),
            y: p.y.clamp(self.y_min, self.y_max),
        }
    }
}

/// A velocity source `v(x, y, t)`.
///
/// Implemented by the discrete sampler over snapshot data and by analytic
/// models used to synthesize test data, so integration kernels work
/// against either.
pub trait VelocityField {
    /// Velocity at position `(x, y)` and time `t`.
    fn velocity(&self, x: f64, y: f64, t: f64) -> Vec2;
}

/// Bilinearly interpolate a grid of `Vec2` values at physical `(x, y)`.
///
/// Fractional cell coordinates are clamped to the grid, so out-of-domain
/// queries sample the boundary. A position exactly on a grid line resolves
/// to the lower-indexed cell, and sampling at a node returns that node's
/// value exactly.
pub fn bilinear_sample<F>(grid: &GridSpec, x: f64, y: f64, value: F) -> Vec2
where
    F: Fn(usize, usize) -> Vec2,
{
    let fx = ((x - grid.x_min) / grid.dx()).clamp(0.0, (grid.nx - 1) as f64);
    let fy = ((y - grid.y_min) / grid.dy()).clamp(0.0, (grid.ny - 1) as f64);

    let i0 = fx.floor() as usize;
    let j0 = fy.floor() as usize;
    let i1 = (i0 + 1).min(grid.nx - 1);
    let j1 = (j0 + 1).min(grid.ny - 1);
    let wx = fx - i0 as f64;
    let wy = fy - j0 as f64;

    let v00 = value(i0, j0);
    let v10 = value(i1, j0);
    let v01 = value(i0, j1);
    let v11 = value(i1, j1);

    let w00 = (1.0 - wx) * (1.0 - wy);
    let w10 = wx * (1.0 - wy);
    let w01 = (1.0 - wx) * wy;
    let w11 = wx * wy;

    Vec2 {
        x: w00 * v00.x + w10 * v10.x + w01 * v01.x + w11 * v11.x,
        y: w00 * v00.y + w10 * v10.y + w01 * v01.y + w11 * v11.y,
    }
}

/// Particle positions over the output grid.
///
/// Cell `(i, j)` holds the current location of the particle seeded at node
/// `(i, j)` at `t_origin`. Once a particle leaves the domain its position
/// is pinned to the boundary and its out-of-bounds flag stays set; such
/// cells surface in FTLE output as the degraded sentinel.
pub struct PositionField {
    /// Grid the particles were seeded on.
    pub grid: GridSpec,
    /// Current particle positions.
    pub points: Array2<Vec2>,
    /// Sticky per-cell flag set when a particle has left the domain.
    pub out_of_bounds: Array2<bool>,
    /// Time at which the field was the uniform node lattice.
    pub t_origin: f64,
    /// Current time along the integration.
    pub t: f64,
}

impl PositionField {
    /// A uniform field: every particle at its seed node, both time stamps
    /// at `t`, no cell out of bounds.
    pub fn uniform(grid: GridSpec, t: f64) -> Self {
        let points = Array2::from_shape_fn((grid.nx, grid.ny), |(i, j)| Vec2 {
            x: grid.x_at(i),
            y: grid.y_at(j),
        });
        PositionField {
            grid,
            points,
            out_of_bounds: Array2::from_elem((grid.nx, grid.ny), false),
            t_origin: t,
            t,
        }
    }

    /// Number of cells currently flagged out of bounds.
    pub fn degraded_cells(&self) -> usize {
        self.out_of_bounds.iter().filter(|&&b| b).count()
    }
}

/// A scalar field over the output grid with its integration time stamps.
pub struct ScalarField {
    /// Grid the values live on.
    pub grid: GridSpec,
    /// Per-node values.
    pub values: Array2<f64>,
    /// Origin time of the underlying flow map.
    pub t_origin: f64,
    /// Final time of the underlying flow map.
    pub t_final: f64,
}

/// One velocity snapshot on the data grid.
pub struct VelocitySnapshot {
    /// Data grid the samples live on.
    pub grid: GridSpec,
    /// Per-node velocity samples.
    pub samples: Array2<Vec2>,
    /// Snapshot time.
    pub t: f64,
}

impl VelocitySnapshot {
    /// Sample an analytic velocity field onto the data grid at time `t`.
    pub fn sample<V: VelocityField>(grid: GridSpec, field: &V, t: f64) -> Self {
        let samples = Array2::from_shape_fn((grid.nx, grid.ny), |(i, j)| {
            field.velocity(grid.x_at(i), grid.y_at(j), t)
        });
        VelocitySnapshot { grid, samples, t }
    }
}
