// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::f64::consts::PI;
use std::path::Path;

use crate::core::{GridSpec, Vec2, VelocityField, VelocitySnapshot};
use crate::error::Result;
use crate::io;

/// The double-gyre model flow: two counter-rotating cells on
/// `[0, 2] x [0, 1]` whose separatrix oscillates with period `2 pi / omega`.
///
/// With `f(x, t) = eps sin(omega t) x^2 + (1 - 2 eps sin(omega t)) x`:
///
/// ```text
/// u = -pi A sin(pi f) cos(pi y)
/// v =  pi A cos(pi f) sin(pi y) df/dx
/// ```
///
/// Setting `epsilon = 0` gives the steady, autonomous limit.
#[derive(Debug, Clone, Copy)]
pub struct DoubleGyre {
    /// Velocity amplitude `A`.
    pub amplitude: f64,
    /// Oscillation strength `eps`.
    pub epsilon: f64,
    /// Angular frequency `omega`.
    pub omega: f64,
}

impl Default for DoubleGyre {
    fn default() -> Self {
        DoubleGyre {
            amplitude: 0.1,
            epsilon: 0.25,
            omega: 2.0 * PI / 10.0,
        }
    }
}

impl DoubleGyre {
    /// The autonomous limit: `epsilon = 0` with the given amplitude.
    pub fn steady(amplitude: f64) -> Self {
        DoubleGyre {
            amplitude,
            epsilon: 0.0,
            ..DoubleGyre::default()
        }
    }
}

impl VelocityField for DoubleGyre {
    fn velocity(&self, x: f64, y: f64, t: f64) -> Vec2 {
        let s = self.epsilon * (self.omega * t).sin();
        let f = s * x * x + (1.0 - 2.0 * s) * x;
        let dfdx = 2.0 * s * x + 1.0 - 2.0 * s;
        Vec2 {
            x: -PI * self.amplitude * (PI * f).sin() * (PI * y).cos(),
            y: PI * self.amplitude * (PI * f).cos() * (PI * y).sin() * dfdx,
        }
    }
}

/// Sample a velocity field onto the data grid at every cadence slot of
/// `[t_min, t_max]` and write one snapshot file per slot.
///
/// Returns the number of snapshots written. The end point is included
/// with a small tolerance so accumulated cadence arithmetic cannot drop
/// the final slot.
pub fn write_snapshots<V: VelocityField>(
    field: &V,
    grid: &GridSpec,
    t_min: f64,
    t_max: f64,
    data_delta_t: f64,
    dir: &Path,
    file_prefix: &str,
) -> Result<usize> {
    let precision = io::precision(data_delta_t);
    let mut count = 0;
    loop {
        let t = t_min + count as f64 * data_delta_t;
        if t_max - t < -1e-12 {
            break;
        }
        let snapshot = VelocitySnapshot::sample(*grid, field, t);
        io::write_snapshot(&io::snapshot_path(dir, file_prefix, t, precision), &snapshot)?;
        count += 1;
    }
    Ok(count)
}
