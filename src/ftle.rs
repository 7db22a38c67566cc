// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use ndarray::{Array2, Zip};

use crate::core::{PositionField, ScalarField};

/// Value emitted for cells whose finite-difference stencil touches an
/// out-of-bounds particle. Printed as `NaN` in the text output.
pub const DEGRADED_SENTINEL: f64 = f64::NAN;

/// Stencil along one axis: the two sample indices and the distance
/// between them. Centered in the interior, one-sided on the boundary.
fn axis_stencil(i: usize, n: usize, spacing: f64) -> (usize, usize, f64) {
    if i == 0 {
        (0, 1, spacing)
    } else if i == n - 1 {
        (n - 2, n - 1, spacing)
    } else {
        (i - 1, i + 1, 2.0 * spacing)
    }
}

/// Largest eigenvalue of the Cauchy-Green tensor of a 2x2 deformation
/// gradient, from trace and determinant in closed form.
pub fn max_stretch_eigenvalue(d: [[f64; 2]; 2]) -> f64 {
    let c11 = d[0][0] * d[0][0] + d[1][0] * d[1][0];
    let c22 = d[0][1] * d[0][1] + d[1][1] * d[1][1];
    let c12 = d[0][0] * d[0][1] + d[1][0] * d[1][1];
    let trace = c11 + c22;
    let det = c11 * c22 - c12 * c12;
    let disc = (trace * trace - 4.0 * det).max(0.0);
    0.5 * (trace + disc.sqrt())
}

/// Compute the FTLE field of a composed flow map.
///
/// The deformation gradient is formed by centered differences on the
/// output grid (one-sided at boundaries); the FTLE value is
/// `ln(lambda_max) / (4 T)` with `T = |t_final - t_origin|`. Cells whose
/// stencil touches a degraded particle get [`DEGRADED_SENTINEL`]; a
/// zero-length horizon yields exactly 0.0 everywhere else.
pub fn ftle_field(positions: &PositionField, t_origin: f64, t_final: f64) -> ScalarField {
    let grid = positions.grid;
    let horizon = (t_final - t_origin).abs();
    let mut values = Array2::zeros((grid.nx, grid.ny));

    Zip::indexed(&mut values).par_for_each(|(i, j), out| {
        let (il, ir, wx) = axis_stencil(i, grid.nx, grid.dx());
        let (jl, jr, wy) = axis_stencil(j, grid.ny, grid.dy());

        let mask = &positions.out_of_bounds;
        if mask[[i, j]] || mask[[il, j]] || mask[[ir, j]] || mask[[i, jl]] || mask[[i, jr]] {
            *out = DEGRADED_SENTINEL;
            return;
        }
        if horizon == 0.0 {
            *out = 0.0;
            return;
        }

        let left = positions.points[[il, j]];
        let right = positions.points[[ir, j]];
        let bottom = positions.points[[i, jl]];
        let top = positions.points[[i, jr]];
        let d = [
            [(right.x - left.x) / wx, (top.x - bottom.x) / wy],
            [(right.y - left.y) / wx, (top.y - bottom.y) / wy],
        ];
        *out = 0.5 * max_stretch_eigenvalue(d).ln() / (2.0 * horizon);
    });

    ScalarField {
        grid,
        values,
        t_origin,
        t_final,
    }
}
