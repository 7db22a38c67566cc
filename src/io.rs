// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use ndarray::Array2;

use crate::core::{GridSpec, PositionField, ScalarField, Vec2, VelocitySnapshot};
use crate::error::{FtleError, Result};

/// Byte length of the step-map header: nx, ny as u64 and the two time
/// stamps as f64, all little-endian.
const HEADER_LEN: usize = 32;

/// Relative tolerance when matching file time stamps against expected
/// cadence slots.
const TIME_TOLERANCE: f64 = 1e-9;

/// Number of decimal places needed to print multiples of `delta` exactly.
///
/// The smallest non-negative `P` such that `delta * 10^P` is integral,
/// capped at 12 for cadences with no finite decimal expansion.
pub fn precision(delta: f64) -> usize {
    let mut p = 0;
    let mut v = delta;
    // Absolute tolerance: scaling it with v would let a repeating decimal
    // look integral once v grows large.
    while p < 12 && (v - v.round()).abs() > 1e-9 {
        v *= 10.0;
        p += 1;
    }
    p
}

/// Format a time stamp for use in a filename at the given precision.
/// Negative zero is normalized so producers and consumers agree.
pub fn format_time(t: f64, precision: usize) -> String {
    format!("{:.*}", precision, t + 0.0)
}

/// Path of the velocity snapshot at time `t`.
pub fn snapshot_path(dir: &Path, file_prefix: &str, t: f64, precision: usize) -> PathBuf {
    dir.join(format!("{}{}.txt", file_prefix, format_time(t, precision)))
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> FtleError + '_ {
    move |source| FtleError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write a velocity snapshot as text: `nx`, `ny`, `t`, then `u`/`v` pairs
/// in `(i, j)` order, one value per line.
///
/// Floats are printed with shortest round-trip formatting, so reading the
/// file back reproduces the samples exactly.
pub fn write_snapshot(path: &Path, snapshot: &VelocitySnapshot) -> Result<()> {
    let file = std::fs::File::create(path).map_err(io_err(path))?;
    let mut w = std::io::BufWriter::new(file);
    let write = |w: &mut std::io::BufWriter<std::fs::File>, v: f64| -> Result<()> {
        writeln!(w, "{}", v).map_err(io_err(path))
    };
    writeln!(w, "{}", snapshot.grid.nx).map_err(io_err(path))?;
    writeln!(w, "{}", snapshot.grid.ny).map_err(io_err(path))?;
    write(&mut w, snapshot.t)?;
    for i in 0..snapshot.grid.nx {
        for j in 0..snapshot.grid.ny {
            let v = snapshot.samples[[i, j]];
            write(&mut w, v.x)?;
            write(&mut w, v.y)?;
        }
    }
    w.flush().map_err(io_err(path))
}

/// Read a velocity snapshot, validating its header against the configured
/// data grid and the expected cadence slot.
///
/// # Errors
/// Returns a format error if the header shape or time disagrees with the
/// expectation, or if any line is missing or unparseable.
pub fn read_snapshot(path: &Path, grid: &GridSpec, expected_t: f64) -> Result<VelocitySnapshot> {
    let text = std::fs::read_to_string(path).map_err(io_err(path))?;
    let lines: Vec<&str> = text.lines().collect();
    let mut cursor = 0usize;

    let nx = next_value::<usize>(&lines, &mut cursor, path, "nx")?;
    let ny = next_value::<usize>(&lines, &mut cursor, path, "ny")?;
    if nx != grid.nx || ny != grid.ny {
        return Err(FtleError::SnapshotShapeMismatch {
            path: path.to_path_buf(),
            expected: (grid.nx, grid.ny),
            got: (nx, ny),
        });
    }
    let t = next_value::<f64>(&lines, &mut cursor, path, "t")?;
    if (t - expected_t).abs() > TIME_TOLERANCE * expected_t.abs().max(1.0) {
        return Err(FtleError::SnapshotTimeMismatch {
            path: path.to_path_buf(),
            expected: expected_t,
            got: t,
        });
    }

    let mut samples = Array2::from_elem((nx, ny), Vec2::default());
    for i in 0..nx {
        for j in 0..ny {
            let u = next_value::<f64>(&lines, &mut cursor, path, "u")?;
            let v = next_value::<f64>(&lines, &mut cursor, path, "v")?;
            samples[[i, j]] = Vec2 { x: u, y: v };
        }
    }

    Ok(VelocitySnapshot {
        grid: *grid,
        samples,
        t,
    })
}

/// Parse the next line of a snapshot file, reporting the 1-based line on
/// failure.
fn next_value<T: std::str::FromStr>(
    lines: &[&str],
    cursor: &mut usize,
    path: &Path,
    what: &str,
) -> Result<T> {
    if *cursor >= lines.len() {
        return Err(FtleError::MalformedSnapshot {
            path: path.to_path_buf(),
            line: lines.len() + 1,
            reason: format!("unexpected end of file, expected {}", what),
        });
    }
    let raw = lines[*cursor].trim();
    *cursor += 1;
    raw.parse().map_err(|_| FtleError::MalformedSnapshot {
        path: path.to_path_buf(),
        line: *cursor,
        reason: format!("'{}' is not a valid {}", raw, what),
    })
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}

/// A step flow map backed by a memory-mapped file.
///
/// The map is the end-position field of one output step; values are read
/// straight from the mapping without a userspace copy.
pub struct StepMap {
    mmap: Mmap,
    nx: usize,
    ny: usize,
    t_origin: f64,
    t: f64,
}

impl StepMap {
    /// Grid shape of the map.
    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Start time of the step this map encodes.
    pub fn t_origin(&self) -> f64 {
        self.t_origin
    }

    /// End time of the step this map encodes.
    pub fn t(&self) -> f64 {
        self.t
    }

    /// End position of the particle seeded at node `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> Vec2 {
        let offset = HEADER_LEN + (i * self.ny + j) * 16;
        Vec2 {
            x: read_f64(&self.mmap, offset),
            y: read_f64(&self.mmap, offset + 8),
        }
    }
}

/// Persistent store of step flow maps, one binary file per output step,
/// content-addressed by the step's end time.
pub struct StepMapStore {
    dir: PathBuf,
    file_prefix: String,
    sign_prefix: &'static str,
    precision: usize,
}

impl StepMapStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: PathBuf, file_prefix: String, sign_prefix: &'static str, precision: usize) -> Self {
        StepMapStore {
            dir,
            file_prefix,
            sign_prefix,
            precision,
        }
    }

    /// Path of the step map ending at time `t`.
    pub fn path_for(&self, t: f64) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}.bin",
            self.file_prefix,
            self.sign_prefix,
            format_time(t, self.precision)
        ))
    }

    /// Persist a position field as the step map ending at `field.t`.
    ///
    /// Layout: a 32-byte header (`nx`, `ny` as little-endian u64, then
    /// `t_origin` and `t` as little-endian f64) followed by `nx * ny`
    /// little-endian `(x, y)` f64 pairs in `(i, j)` order.
    pub fn write(&self, field: &PositionField) -> Result<PathBuf> {
        let path = self.path_for(field.t);
        let file = std::fs::File::create(&path).map_err(io_err(&path))?;
        let mut w = std::io::BufWriter::new(file);
        let mut put = |bytes: [u8; 8]| -> Result<()> {
            w.write_all(&bytes).map_err(io_err(&path))
        };
        put((field.grid.nx as u64).to_le_bytes())?;
        put((field.grid.ny as u64).to_le_bytes())?;
        put(field.t_origin.to_le_bytes())?;
        put(field.t.to_le_bytes())?;
        for i in 0..field.grid.nx {
            for j in 0..field.grid.ny {
                let p = field.points[[i, j]];
                put(p.x.to_le_bytes())?;
                put(p.y.to_le_bytes())?;
            }
        }
        w.flush().map_err(io_err(&path))?;
        Ok(path)
    }

    /// Memory-map the step map ending at time `t_end`, validating its
    /// header against the output grid and the requested step.
    pub fn open(&self, t_end: f64, grid: &GridSpec) -> Result<StepMap> {
        let path = self.path_for(t_end);
        let file = std::fs::File::open(&path).map_err(io_err(&path))?;
        // SAFETY: the file is opened read-only and step-map files are
        // written once per run before any read; the mapping never outlives
        // the run that created the file.
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_err(&path))?;

        if mmap.len() < HEADER_LEN {
            return Err(FtleError::StepMapTruncated {
                path,
                expected: HEADER_LEN,
                got: mmap.len(),
            });
        }
        let nx = read_u64(&mmap, 0) as usize;
        let ny = read_u64(&mmap, 8) as usize;
        let t_origin = read_f64(&mmap, 16);
        let t = read_f64(&mmap, 24);

        if nx != grid.nx || ny != grid.ny {
            return Err(FtleError::StepMapShapeMismatch {
                path,
                expected: (grid.nx, grid.ny),
                got: (nx, ny),
            });
        }
        if (t - t_end).abs() > TIME_TOLERANCE * t_end.abs().max(1.0) {
            return Err(FtleError::StepMapTimeMismatch {
                path,
                expected: t_end,
                got: t,
            });
        }
        let expected_len = HEADER_LEN + nx * ny * 16;
        if mmap.len() != expected_len {
            return Err(FtleError::StepMapTruncated {
                path,
                expected: expected_len,
                got: mmap.len(),
            });
        }

        Ok(StepMap {
            mmap,
            nx,
            ny,
            t_origin,
            t,
        })
    }
}

/// Path of the FTLE output spanning times `t_a` and `t_b`.
pub fn ftle_path(
    dir: &Path,
    file_prefix: &str,
    sign_prefix: &str,
    t_a: f64,
    t_b: f64,
    precision: usize,
) -> PathBuf {
    dir.join(format!(
        "{}{}{}-{}.txt",
        file_prefix,
        sign_prefix,
        format_time(t_a, precision),
        format_time(t_b, precision)
    ))
}

/// Write an FTLE field as text: `nx`, `ny`, `t_origin`, `t_final`, then
/// one value per line in `(i, j)` order. Degraded cells print as `NaN`.
pub fn write_ftle(path: &Path, field: &ScalarField) -> Result<()> {
    let file = std::fs::File::create(path).map_err(io_err(path))?;
    let mut w = std::io::BufWriter::new(file);
    writeln!(w, "{}", field.grid.nx).map_err(io_err(path))?;
    writeln!(w, "{}", field.grid.ny).map_err(io_err(path))?;
    writeln!(w, "{}", field.t_origin).map_err(io_err(path))?;
    writeln!(w, "{}", field.t_final).map_err(io_err(path))?;
    for i in 0..field.grid.nx {
        for j in 0..field.grid.ny {
            writeln!(w, "{}", field.values[[i, j]]).map_err(io_err(path))?;
        }
    }
    w.flush().map_err(io_err(path))
}
