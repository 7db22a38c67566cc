// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use ndarray::Zip;

use crate::core::{bilinear_sample, GridSpec, PositionField};
use crate::error::Result;
use crate::io::{StepMap, StepMapStore};

/// Push a position field through one step flow map.
///
/// The map holds, on the uniform output grid, the one-step end position of
/// a particle seeded at each node. Resampling it bilinearly at the current
/// particle positions advances every particle by that step without
/// re-integrating through the velocity field. Positions on a grid line
/// resolve to the lower-indexed cell; a resampled position outside the
/// domain is clamped and its cell permanently flagged.
pub fn resample_step(positions: &mut PositionField, map: &StepMap) {
    let grid = positions.grid;
    Zip::from(&mut positions.points)
        .and(&mut positions.out_of_bounds)
        .par_for_each(|p, degraded| {
            if *degraded {
                return;
            }
            let q = bilinear_sample(&grid, p.x, p.y, |i, j| map.get(i, j));
            if grid.contains(q.x, q.y) {
                *p = q;
            } else {
                *p = grid.clamp_point(q);
                *degraded = true;
            }
        });
}

/// Rebuild the flow map from `t_origin` to the last of `end_times` by
/// chaining step flow maps.
///
/// `end_times` lists, in integration order, the end time of every step map
/// to apply; the first entry is one signed output step past `t_origin`.
/// Each map is loaded from the store, validated against the output grid,
/// and applied by bilinear resampling.
///
/// # Errors
/// Returns an I/O or format error if a step-map file is missing or its
/// header disagrees with the requested step.
pub fn compose_flow_map(
    grid: &GridSpec,
    store: &StepMapStore,
    end_times: &[f64],
    t_origin: f64,
) -> Result<PositionField> {
    let mut positions = PositionField::uniform(*grid, t_origin);
    for &t_end in end_times {
        let map = store.open(t_end, grid)?;
        resample_step(&mut positions, &map);
        positions.t = t_end;
    }
    Ok(positions)
}
