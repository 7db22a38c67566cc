// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};

use lcs_ftle::advect;
use lcs_ftle::analytic::{self, DoubleGyre};
use lcs_ftle::compose;
use lcs_ftle::config::{Direction, Settings};
use lcs_ftle::core::{PositionField, Vec2, VelocityField};
use lcs_ftle::io::{self, StepMapStore};
use lcs_ftle::sampler::SnapshotCache;
use lcs_ftle::solver::{FtleSolver, ProjectPaths};

fn settings(nx: usize, ny: usize, steps: usize, direction: Direction) -> Settings {
    Settings {
        x_min: 0.0,
        x_max: 2.0,
        y_min: 0.0,
        y_max: 1.0,
        nx,
        ny,
        data_nx: 2 * nx,
        data_ny: 2 * ny,
        t_min: 0.0,
        t_max: 1.0,
        data_delta_t: 0.25,
        steps,
        file_prefix: "gyre_".to_string(),
        direction,
    }
}

/// Create a project directory, seed it with snapshots of `field`, run the
/// solver, and return the paths.
fn run_project<V: VelocityField>(tag: &str, settings: &Settings, field: &V) -> ProjectPaths {
    let dir = std::env::temp_dir().join(format!("lcsftle_verification_{}", tag));
    std::fs::remove_dir_all(&dir).ok();
    let paths = ProjectPaths::under(&dir);
    std::fs::create_dir_all(&paths.data).unwrap();
    std::fs::create_dir_all(&paths.step_maps).unwrap();
    std::fs::create_dir_all(&paths.ftle).unwrap();
    analytic::write_snapshots(
        field,
        &settings.data_grid().unwrap(),
        settings.t_min,
        settings.t_max,
        settings.data_delta_t,
        &paths.data,
        &settings.file_prefix,
    )
    .unwrap();
    let solver = FtleSolver::new(settings.clone(), ProjectPaths::under(&dir))
        .unwrap()
        .with_threads(4);
    solver.run(None).unwrap();
    paths
}

/// Parse an FTLE text file: header (nx, ny, t_origin, t_final) and values.
fn read_ftle(path: &Path) -> (usize, usize, f64, f64, Vec<f64>) {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    let mut lines = text.lines();
    let nx: usize = lines.next().unwrap().parse().unwrap();
    let ny: usize = lines.next().unwrap().parse().unwrap();
    let t_origin: f64 = lines.next().unwrap().parse().unwrap();
    let t_final: f64 = lines.next().unwrap().parse().unwrap();
    let values: Vec<f64> = lines.map(|l| l.parse().unwrap()).collect();
    assert_eq!(values.len(), nx * ny);
    (nx, ny, t_origin, t_final, values)
}

/// Test 1: RK4 order verification on the double gyre.
/// Halving the step with twice the substeps must shrink the trajectory
/// error by the fourth-order factor of 16, asserted with the slack any
/// finite-h convergence measurement needs.
#[test]
fn rk4_fourth_order_convergence() {
    let gyre = DoubleGyre::default();
    let horizon = 2.0;
    let seeds = [
        Vec2 { x: 0.65, y: 0.35 },
        Vec2 { x: 1.3, y: 0.6 },
        Vec2 { x: 0.4, y: 0.75 },
    ];

    let advance = |start: Vec2, substeps: usize| -> Vec2 {
        let h = horizon / substeps as f64;
        let mut p = start;
        for s in 0..substeps {
            p = advect::rk4_step(&gyre, p, s as f64 * h, h);
        }
        p
    };

    let mut err_coarse = 0.0_f64;
    let mut err_fine = 0.0_f64;
    for seed in seeds {
        let reference = advance(seed, 1024);
        let coarse = advance(seed, 8);
        let fine = advance(seed, 16);
        let ec = ((coarse.x - reference.x).powi(2) + (coarse.y - reference.y).powi(2)).sqrt();
        let ef = ((fine.x - reference.x).powi(2) + (fine.y - reference.y).powi(2)).sqrt();
        err_coarse = err_coarse.max(ec);
        err_fine = err_fine.max(ef);
    }

    assert!(err_coarse > 1e-12, "coarse error too small to measure");
    let ratio = err_coarse / err_fine;
    assert!(
        ratio > 11.0 && ratio < 22.0,
        "convergence ratio = {} (expected ~16, errors: {} vs {})",
        ratio,
        err_coarse,
        err_fine
    );
}

/// Test 2: advecting forward then backward over the same horizon returns
/// every interior particle to its seed within RK4 truncation (1e-5 for
/// 8 substeps over a unit horizon).
#[test]
fn forward_backward_round_trip() {
    let gyre = DoubleGyre::default();
    let grid = lcs_ftle::GridSpec::new(8, 6, 0.0, 2.0, 0.0, 1.0).unwrap();
    let mut field = PositionField::uniform(grid, 0.0);
    advect::advect_one_step(&mut field, &gyre, 1.0, 8);
    advect::advect_one_step(&mut field, &gyre, -1.0, 8);
    assert_eq!(field.t, 0.0);

    for i in 1..grid.nx - 1 {
        for j in 1..grid.ny - 1 {
            assert!(!field.out_of_bounds[[i, j]], "interior cell ({}, {}) exited", i, j);
            let p = field.points[[i, j]];
            let dx = p.x - grid.x_at(i);
            let dy = p.y - grid.y_at(j);
            let err = (dx * dx + dy * dy).sqrt();
            assert!(err < 1e-5, "cell ({}, {}) returned {} away", i, j, err);
        }
    }
}

/// Test 3: the persisted single-step flow map matches a reference RK4
/// advection computed through the same public sampling pipeline.
#[test]
fn single_step_map_matches_reference_advection() {
    let settings = settings(16, 8, 2, Direction::Forward);
    let paths = run_project("singlestep", &settings, &DoubleGyre::default());

    let grid = settings.output_grid().unwrap();
    let precision = io::precision(settings.data_delta_t);
    let store = StepMapStore::new(
        paths.step_maps.clone(),
        settings.file_prefix.clone(),
        "positive_",
        precision,
    );
    let map = store.open(0.5, &grid).unwrap();
    assert_eq!(map.t_origin(), 0.0);

    // Reference: the same substep sequence the solver runs for step one.
    let mut cache = SnapshotCache::new(
        paths.data.clone(),
        settings.file_prefix.clone(),
        precision,
        settings.data_grid().unwrap(),
        settings.t_min,
        settings.data_delta_t,
        settings.snapshot_count(),
    );
    let mut reference = PositionField::uniform(grid, 0.0);
    let substeps = advect::substep_count(0.5, settings.data_delta_t);
    let h = 0.5 / substeps as f64;
    for sub in 0..substeps {
        let t0 = sub as f64 * h;
        let sampler = cache.window(t0, t0 + h).unwrap();
        advect::advect_substep(&mut reference, &sampler, t0, h);
    }

    // A 5-point stencil of probe cells.
    for (i, j) in [(8, 4), (7, 4), (9, 4), (8, 3), (8, 5)] {
        let got = map.get(i, j);
        let want = reference.points[[i, j]];
        assert!(
            (got.x - want.x).abs() < 1e-9 && (got.y - want.y).abs() < 1e-9,
            "cell ({}, {}): ({}, {}) vs ({}, {})",
            i,
            j,
            got.x,
            got.y,
            want.x,
            want.y
        );
    }
}

/// Test 4: composition law. Chaining step maps agrees with one long
/// uninterrupted advection of the same data to within the bilinear
/// resampling bound on this grid (well under 1e-2 here).
#[test]
fn composition_matches_long_advection() {
    let settings = settings(32, 16, 4, Direction::Forward);
    let paths = run_project("composelaw", &settings, &DoubleGyre::default());

    let grid = settings.output_grid().unwrap();
    let precision = io::precision(settings.data_delta_t);
    let store = StepMapStore::new(
        paths.step_maps.clone(),
        settings.file_prefix.clone(),
        "positive_",
        precision,
    );
    let end_times: Vec<f64> = (1..=4).map(|k| k as f64 * 0.25).collect();
    let composed = compose::compose_flow_map(&grid, &store, &end_times, 0.0).unwrap();
    assert_eq!(composed.t, 1.0);

    // Direct advection of the same particles with no per-step resets.
    let mut cache = SnapshotCache::new(
        paths.data.clone(),
        settings.file_prefix.clone(),
        precision,
        settings.data_grid().unwrap(),
        settings.t_min,
        settings.data_delta_t,
        settings.snapshot_count(),
    );
    let mut direct = PositionField::uniform(grid, 0.0);
    for sub in 0..4 {
        let t0 = sub as f64 * 0.25;
        let sampler = cache.window(t0, t0 + 0.25).unwrap();
        advect::advect_substep(&mut direct, &sampler, t0, 0.25);
    }

    let mut max_diff = 0.0_f64;
    let mut compared = 0;
    for i in 1..grid.nx - 1 {
        for j in 1..grid.ny - 1 {
            if composed.out_of_bounds[[i, j]] || direct.out_of_bounds[[i, j]] {
                continue;
            }
            let a = composed.points[[i, j]];
            let b = direct.points[[i, j]];
            let diff = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
            max_diff = max_diff.max(diff);
            compared += 1;
        }
    }
    assert!(compared > 300, "not enough comparable cells: {}", compared);
    assert!(
        max_diff < 1e-2,
        "composition deviates from direct advection by {}",
        max_diff
    );
}

/// Test 5: forward full run on the steady gyre. The field is finite over
/// the interior, nonconstant, and its maximum sits on the separatrix
/// band around x = 1 where the hyperbolic points live.
#[test]
fn forward_run_resolves_separatrix_ridge() {
    let settings = settings(48, 24, 4, Direction::Forward);
    let paths = run_project("ridge", &settings, &DoubleGyre::steady(0.1));

    let out = paths.ftle.join("gyre_positive_0.00-1.00.txt");
    let (nx, ny, t_origin, t_final, values) = read_ftle(&out);
    assert_eq!((nx, ny), (48, 24));
    assert_eq!(t_origin, 0.0);
    assert_eq!(t_final, 1.0);

    let grid = settings.output_grid().unwrap();
    let mut best = f64::NEG_INFINITY;
    let mut best_x = 0.0;
    let mut finite = 0;
    for i in 0..nx {
        for j in 0..ny {
            let v = values[i * ny + j];
            if v.is_nan() {
                continue;
            }
            finite += 1;
            if v > best {
                best = v;
                best_x = grid.x_at(i);
            }
        }
    }
    assert!(finite > nx * ny / 2, "too few finite cells: {}", finite);
    assert!(best > 0.0, "no positive stretching found");
    assert!(
        (best_x - 1.0).abs() < 0.5,
        "ridge at x = {} instead of the separatrix",
        best_x
    );
}

/// Test 6: backward symmetry in the autonomous limit. The backward FTLE
/// field is the x-reflection of the forward field, within numerical
/// tolerance, because reversing the steady gyre conjugates the flow by
/// the reflection about x = 1.
#[test]
fn backward_mirrors_forward_for_steady_gyre() {
    let forward_settings = settings(24, 12, 4, Direction::Forward);
    let backward_settings = settings(24, 12, 4, Direction::Backward);
    let gyre = DoubleGyre::steady(0.1);
    let fwd = run_project("mirror_fwd", &forward_settings, &gyre);
    let bwd = run_project("mirror_bwd", &backward_settings, &gyre);

    let (nx, ny, _, _, forward) = read_ftle(&fwd.ftle.join("gyre_positive_0.00-1.00.txt"));
    let (_, _, _, _, backward) = read_ftle(&bwd.ftle.join("gyre_negative_0.00-1.00.txt"));

    let mut compared = 0;
    for i in 1..nx - 1 {
        for j in 1..ny - 1 {
            let f = forward[(nx - 1 - i) * ny + j];
            let b = backward[i * ny + j];
            if f.is_nan() || b.is_nan() {
                continue;
            }
            assert!(
                (f - b).abs() < 1e-6,
                "cell ({}, {}): forward {} vs backward {}",
                i,
                j,
                f,
                b
            );
            compared += 1;
        }
    }
    // Wall-adjacent stencils may be degraded on either side; the bulk of
    // the interior must still compare.
    assert!(
        compared >= (nx - 2) * (ny - 2) * 7 / 10,
        "only {} comparable cells",
        compared
    );
}

/// Test 7: determinism. Two runs with identical inputs produce
/// byte-identical step maps and FTLE fields.
#[test]
fn identical_runs_are_bitwise_identical() {
    let config = settings(16, 8, 3, Direction::Forward);
    let a = run_project("det_a", &config, &DoubleGyre::default());
    let b = run_project("det_b", &config, &DoubleGyre::default());

    let compare_dir = |da: &PathBuf, db: &PathBuf| {
        let mut names: Vec<String> = std::fs::read_dir(da)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert!(!names.is_empty());
        for name in names {
            let bytes_a = std::fs::read(da.join(&name)).unwrap();
            let bytes_b = std::fs::read(db.join(&name)).unwrap();
            assert_eq!(bytes_a, bytes_b, "{} differs between runs", name);
        }
    };
    compare_dir(&a.step_maps, &b.step_maps);
    compare_dir(&a.ftle, &b.ftle);
}

/// Test 8: out-of-bounds handling. On a domain cut out of the gyre's
/// interior, particles cross the boundary; the run still completes and
/// the affected cells carry the NaN sentinel.
#[test]
fn shrunken_domain_marks_exits_with_sentinel() {
    let mut config = settings(24, 12, 4, Direction::Forward);
    config.x_min = 0.25;
    config.x_max = 1.75;
    config.y_min = 0.2;
    config.y_max = 0.8;
    let paths = run_project("oob", &config, &DoubleGyre::default());

    let (nx, ny, _, _, values) = read_ftle(&paths.ftle.join("gyre_positive_0.00-1.00.txt"));
    let nan_count = values.iter().filter(|v| v.is_nan()).count();
    let finite_count = values.iter().filter(|v| v.is_finite()).count();
    assert!(nan_count > 0, "no degraded cells despite open boundaries");
    assert!(finite_count > 0, "every cell degraded");

    // The sentinel shows up on the boundary ring, where exits happen first.
    let ring_nan = (0..nx)
        .flat_map(|i| [(i, 0), (i, ny - 1)])
        .chain((0..ny).flat_map(|j| [(0, j), (nx - 1, j)]))
        .filter(|&(i, j)| values[i * ny + j].is_nan())
        .count();
    assert!(ring_nan > 0, "boundary ring has no sentinel cells");
}
