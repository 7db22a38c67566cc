// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use ndarray::Zip;

use crate::core::{PositionField, Vec2, VelocityField};

/// Number of RK4 substeps for one signed output step.
///
/// The substep size is the data cadence when the output step is coarser,
/// and the full output step otherwise, so stage times stay aligned with
/// the snapshots the sampler interpolates between. Integral ratios are
/// snapped before rounding up so an exact multiple never gains a substep
/// to floating-point noise.
pub fn substep_count(step: f64, data_delta_t: f64) -> usize {
    let ratio = (step / data_delta_t).abs();
    let snapped = ratio.round();
    let n = if (ratio - snapped).abs() <= 1e-9 * snapped.max(1.0) {
        snapped
    } else {
        ratio.ceil()
    };
    (n as usize).max(1)
}

/// One classic Runge-Kutta-4 step of a single particle.
///
/// `h` may be negative for backward integration. The velocity source is
/// responsible for clamping positions outside its domain.
pub fn rk4_step<V: VelocityField + ?Sized>(field: &V, p: Vec2, t: f64, h: f64) -> Vec2 {
    let k1 = field.velocity(p.x, p.y, t);
    let m1 = p + k1 * (0.5 * h);
    let k2 = field.velocity(m1.x, m1.y, t + 0.5 * h);
    let m2 = p + k2 * (0.5 * h);
    let k3 = field.velocity(m2.x, m2.y, t + 0.5 * h);
    let m3 = p + k3 * h;
    let k4 = field.velocity(m3.x, m3.y, t + h);
    p + (k1 + (k2 + k3) * 2.0 + k4) * (h / 6.0)
}

/// Advance every particle of a position field by one RK4 substep from
/// time `t`, in parallel over cells.
///
/// Cells already flagged out of bounds stay pinned. A particle that
/// leaves the domain during the substep is clamped to the boundary and
/// flagged. Each cell reads only shared immutable inputs and writes only
/// itself, so results are bitwise identical for any thread count.
pub fn advect_substep<V: VelocityField + Sync>(
    positions: &mut PositionField,
    field: &V,
    t: f64,
    h: f64,
) {
    let grid = positions.grid;
    Zip::from(&mut positions.points)
        .and(&mut positions.out_of_bounds)
        .par_for_each(|p, degraded| {
            if *degraded {
                return;
            }
            let q = rk4_step(field, *p, t, h);
            if grid.contains(q.x, q.y) {
                *p = q;
            } else {
                *p = grid.clamp_point(q);
                *degraded = true;
            }
        });
}

/// Advance a position field by a full signed step using `substeps` equal
/// RK4 substeps, updating the field's current time.
///
/// Used with fully resident velocity sources (analytic fields, or a
/// sampler whose window already covers the whole step). The solver drives
/// `advect_substep` directly when the snapshot window must slide between
/// substeps.
pub fn advect_one_step<V: VelocityField + Sync>(
    positions: &mut PositionField,
    field: &V,
    dt_step: f64,
    substeps: usize,
) {
    let h = dt_step / substeps as f64;
    for s in 0..substeps {
        let t = positions.t + s as f64 * h;
        advect_substep(positions, field, t, h);
    }
    positions.t += dt_step;
}
