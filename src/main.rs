// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use lcs_ftle::analytic::{self, DoubleGyre};
use lcs_ftle::config::{Direction, Settings};
use lcs_ftle::solver::{FtleSolver, ProgressInfo, ProjectPaths, RunPhase};

#[derive(Parser)]
#[command(
    name = "lcs-ftle",
    about = "Fast FTLE fields from discrete velocity data via flow-map composition"
)]
struct Cli {
    /// Project directory holding sim_params.json, data/, step_flow_maps/
    /// and results/ftle/
    #[arg(long, default_value = "fast_computation")]
    project_dir: PathBuf,

    /// Number of worker threads (defaults to all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Synthesize double-gyre snapshot files from the config, then exit
    #[arg(long)]
    generate_data: bool,
}

fn print_settings(settings: &Settings) {
    println!("*** Settings ***");
    println!("x_min = {}", settings.x_min);
    println!("x_max = {}", settings.x_max);
    println!("y_min = {}", settings.y_min);
    println!("y_max = {}", settings.y_max);
    println!("nx = {}", settings.nx);
    println!("ny = {}", settings.ny);
    println!("data_nx = {}", settings.data_nx);
    println!("data_ny = {}", settings.data_ny);
    println!("t_min = {}", settings.t_min);
    println!("t_max = {}", settings.t_max);
    println!("data_delta_t = {}", settings.data_delta_t);
    println!("steps = {}", settings.steps);
    println!("file_prefix = {}", settings.file_prefix);
    println!(
        "direction = {}",
        match settings.direction {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    );
    println!();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let total_clock = Instant::now();

    let config_path = cli.project_dir.join("sim_params.json");
    let settings = Settings::from_json_file(&config_path)?;
    print_settings(&settings);

    let paths = ProjectPaths::under(&cli.project_dir);
    for dir in [&paths.data, &paths.step_maps, &paths.ftle] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create directory '{}'", dir.display()))?;
    }

    if cli.generate_data {
        let grid = settings.data_grid()?;
        let count = analytic::write_snapshots(
            &DoubleGyre::default(),
            &grid,
            settings.t_min,
            settings.t_max,
            settings.data_delta_t,
            &paths.data,
            &settings.file_prefix,
        )?;
        println!(
            "{} snapshots written to {}",
            count,
            paths.data.display()
        );
        return Ok(());
    }

    let mut solver = FtleSolver::new(settings.clone(), paths)?;
    if let Some(threads) = cli.threads {
        solver = solver.with_threads(threads);
    }
    println!("Number of threads: {}", solver.worker_count());
    match settings.direction {
        Direction::Forward => println!("*** FORWARD FTLE CALCULATION BEGINS ***\n"),
        Direction::Backward => println!("*** BACKWARD FTLE CALCULATION BEGINS ***\n"),
    }

    let precision = lcs_ftle::io::precision(settings.data_delta_t);
    let phase_a_ms = AtomicU64::new(0);
    let progress = |info: ProgressInfo| match info.phase {
        RunPhase::StepMaps => {
            println!(
                "[{}/{}] Calculate step flow map from t = {:.p$} to t = {:.p$}",
                info.step + 1,
                info.total,
                info.t_from,
                info.t_to,
                p = precision
            );
        }
        RunPhase::Composition => {
            if phase_a_ms.load(Ordering::Relaxed) == 0 {
                phase_a_ms.store(info.elapsed.as_millis() as u64, Ordering::Relaxed);
            }
            println!(
                "[{}/{}] Fast calculation with interpolation from t = {:.p$} to t = {:.p$}",
                info.step + 1,
                info.total,
                info.t_from,
                info.t_to,
                p = precision
            );
            println!("Calculate FTLE field at t = {:.p$}", info.t_from, p = precision);
        }
    };
    solver.run(Some(&progress))?;

    let total = total_clock.elapsed().as_secs_f64();
    let phase_a = phase_a_ms.load(Ordering::Relaxed) as f64 / 1000.0;
    println!();
    println!(
        "Calculation time for {} step flow maps: {:.4} s",
        settings.steps, phase_a
    );
    println!(
        "Calculation time for {} compositions: {:.4} s",
        settings.steps,
        total - phase_a
    );
    println!("TOTAL CALCULATION TIME: {:.4} s", total);

    Ok(())
}
