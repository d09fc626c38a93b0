/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines shared helpers for random sample generation, evaluation grids, and CSV sample I/O.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use csv::{ReaderBuilder, Writer};
use faer::{Mat, MatRef};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::f64::consts::PI;
use std::fs::File;

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Generate a matrix of random 3D points in the unit cube.
///
/// # Parameters
/// - `n`: Number of points to generate (rows in the output matrix).
/// - `seed`: Optional random seed.
///   - If `Some(seed)` is provided, the same sequence of points will be generated
///     deterministically across runs and platforms (useful for reproducible tests).
///   - If `None`, the generator is seeded from the operating system's randomness source.
///
/// # Returns
/// A `Mat<f64>` of shape `(n, 3)` where each element lies in `[0.0, 1.0)`.
///
/// # Example
/// ```
/// use dfi_rbf::generate_random_points;
///
/// let pts = generate_random_points(100, Some(42));
/// assert_eq!(pts.ncols(), 3);
/// ```
pub fn generate_random_points(n: usize, seed: Option<u64>) -> Mat<f64> {
    let mut rng = seeded_rng(seed);

    Mat::from_fn(n, 3, |_, _| rng.random_range(0.0..1.0))
}

/// Generate random 3D points distributed uniformly by volume inside the
/// spherical shell `inner_radius <= |p| <= outer_radius`, centred on the origin.
///
/// Useful for sampling fields such as a dipole that are singular at the
/// origin.
///
/// # Panics
/// If `inner_radius` is negative or larger than `outer_radius`.
pub fn generate_shell_points(
    n: usize,
    inner_radius: f64,
    outer_radius: f64,
    seed: Option<u64>,
) -> Mat<f64> {
    assert!(
        inner_radius >= 0.0 && inner_radius <= outer_radius,
        "invalid shell radii [{}, {}]",
        inner_radius,
        outer_radius
    );

    let mut rng = seeded_rng(seed);
    let (r3_min, r3_max) = (inner_radius.powi(3), outer_radius.powi(3));

    let mut points = Mat::<f64>::zeros(n, 3);

    for i in 0..n {
        let cos_theta: f64 = rng.random_range(-1.0..=1.0);
        let phi: f64 = rng.random_range(0.0..2.0 * PI);
        let r = match r3_max > r3_min {
            true => rng.random_range(r3_min..r3_max).cbrt(),
            false => outer_radius,
        };

        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        points[(i, 0)] = r * sin_theta * phi.cos();
        points[(i, 1)] = r * sin_theta * phi.sin();
        points[(i, 2)] = r * cos_theta;
    }

    points
}

/// Create a regular 3D evaluation grid from per-axis ranges and sample counts.
///
/// The x index varies fastest, then y, then z.
///
/// # Arguments
/// * `ranges` - Inclusive `(min, max)` range for each axis.
/// * `counts` - Number of grid samples along each axis. An axis with a count
///   of one is sampled at its `min`.
///
/// # Returns
/// A `Mat<f64>` with one row per grid point and three columns.
pub fn create_evaluation_grid(ranges: &[(f64, f64); 3], counts: &[usize; 3]) -> Mat<f64> {
    let total_points: usize = counts.iter().product();

    Mat::from_fn(total_points, 3, |row_idx, col_idx| {
        let dim_points = counts[col_idx];
        let (start, end) = ranges[col_idx];
        let step = match dim_points > 1 {
            true => (end - start) / (dim_points as f64 - 1.0),
            false => 0.0,
        };

        let stride: usize = counts[..col_idx].iter().product();

        let index_in_dim = (row_idx / stride) % dim_points;
        start + step * index_in_dim as f64
    })
}

/// Load a CSV file of vector field samples into position and field matrices.
///
/// Each record must hold six columns: `x, y, z, bx, by, bz`.
///
/// # Arguments
/// * `file_path` - Path to the CSV file.
/// * `has_headers` - Whether the file has a single header row to skip.
///
/// # Returns
/// On success, returns `(points, fields)`, both of shape `(n_rows, 3)`.
pub fn csv_to_sample_arrays(
    file_path: &str,
    has_headers: bool,
) -> Result<(Mat<f64>, Mat<f64>), Box<dyn Error>> {
    let file = File::open(file_path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(has_headers)
        .from_reader(file);

    let mut positions = Vec::new();
    let mut fields = Vec::new();
    let mut num_rows = 0;

    for result in reader.records() {
        let record = result?;
        if record.len() != 6 {
            return Err(format!(
                "expected 6 columns (x, y, z, bx, by, bz) in record {}, found {}",
                num_rows,
                record.len()
            )
            .into());
        }

        for (i, value) in record.iter().enumerate() {
            let parsed_value: f64 = value.trim().parse()?;
            match i < 3 {
                true => positions.push(parsed_value),
                false => fields.push(parsed_value),
            }
        }

        num_rows += 1;
    }

    let points = MatRef::from_row_major_slice(positions.as_slice(), num_rows, 3).to_owned();
    let fields = MatRef::from_row_major_slice(fields.as_slice(), num_rows, 3).to_owned();

    Ok((points, fields))
}

/// Write sample positions and their field vectors to a CSV file with the
/// headers `x, y, z, bx, by, bz`.
///
/// # Errors
/// Returns an error if the matrices do not both have three columns and the
/// same number of rows, or if writing to disk fails.
pub fn sample_arrays_to_csv(
    points: &Mat<f64>,
    fields: &Mat<f64>,
    filename: &str,
) -> Result<(), Box<dyn Error>> {
    if points.ncols() != 3 || fields.ncols() != 3 {
        return Err("points and fields must both have 3 columns".into());
    }
    if points.nrows() != fields.nrows() {
        return Err(format!(
            "got {} points but {} field vectors",
            points.nrows(),
            fields.nrows()
        )
        .into());
    }

    let mut wtr = Writer::from_path(filename)?;
    wtr.write_record(["x", "y", "z", "bx", "by", "bz"])?;

    for i in 0..points.nrows() {
        let record: Vec<String> = points
            .row(i)
            .iter()
            .chain(fields.row(i).iter())
            .map(|c| c.to_string())
            .collect();
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
