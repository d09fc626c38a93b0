/////////////////////////////////////////////////////////////////////////////////////////////
//
// Supplies matrix helpers, 3-vector helpers, and block system assembly for matrix-valued kernels.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::MatrixKernelFunction;
use faer::{Mat, RowRef};
use rayon::prelude::*;

/// A dense 3x3 kernel block, indexed `[row][col]`.
pub type Block3 = [[f64; 3]; 3];

/// Computes the axis aligned bounding box (AABB) extents of a matrix of points.
///
/// Returns a flat vector containing the minimum and maximum values along each column (dimension)
/// of the input matrix. The result is arranged as:
///
/// `[min_0, min_1, ..., min_n, max_0, max_1, ..., max_n]`
///
/// where `n` is the number of columns in the matrix.
///
/// # Examples
///
/// ```
/// use faer::mat;
/// use dfi_rbf_utils::get_pointarray_extents;
///
/// let points = mat![
///     [1.0, 2.0, 0.0],
///     [3.0, -1.0, 1.0],
///     [0.5, 4.0, -2.0f64]
/// ];
/// let extents = get_pointarray_extents(&points);
/// assert_eq!(extents, vec![0.5, -1.0, -2.0, 3.0, 4.0, 1.0]);
/// ```
#[inline(always)]
pub fn get_pointarray_extents<T>(points: &Mat<T>) -> Vec<T>
where
    T: PartialOrd + Clone,
{
    let ncols = points.ncols();

    // First half stores mins, second half stores maxs.
    let mut extents: Vec<T> = (0..2 * ncols)
        .map(|k| points.get(0, k % ncols).clone())
        .collect();

    for row in points.row_iter() {
        for (col, item) in row.iter().enumerate() {
            if item < &extents[col] {
                extents[col] = item.clone();
            }
            if item > &extents[col + ncols] {
                extents[col + ncols] = item.clone();
            }
        }
    }

    extents
}

/// Displacement `target - source` between two 3D points stored as rows.
#[inline(always)]
pub fn row_difference(target: RowRef<f64>, source: RowRef<f64>) -> [f64; 3] {
    let mut d = [0.0; 3];
    for (k, (t, s)) in target.iter().zip(source.iter()).take(3).enumerate() {
        d[k] = t - s;
    }
    d
}

/// Copies the first three entries of a row into a fixed size vector.
#[inline(always)]
pub fn row_to_vec3(row: RowRef<f64>) -> [f64; 3] {
    let mut v = [0.0; 3];
    for (k, x) in row.iter().take(3).enumerate() {
        v[k] = *x;
    }
    v
}

/// Returns `m * v` for a 3x3 block.
#[inline(always)]
pub fn mat3_vec3_mul(m: &Block3, v: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Flattens an `(n x 3)` matrix of vectors into a `(3n x 1)` column,
/// `[v0x, v0y, v0z, v1x, ...]`, matching the block layout of the system matrix.
///
/// # Examples
///
/// ```
/// use faer::mat;
/// use dfi_rbf_utils::stack_vector_rows;
///
/// let fields = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0f64]];
/// let d = stack_vector_rows(&fields);
///
/// assert_eq!(d.nrows(), 6);
/// assert_eq!(d[(4, 0)], 5.0);
/// ```
#[inline(always)]
pub fn stack_vector_rows(values: &Mat<f64>) -> Mat<f64> {
    Mat::from_fn(3 * values.nrows(), 1, |k, _| values[(k / 3, k % 3)])
}

/// Inverse of [`stack_vector_rows`]: reshapes a `(3n x 1)` column into `(n x 3)`.
#[inline(always)]
pub fn unstack_vector_rows(stacked: &Mat<f64>) -> Mat<f64> {
    Mat::from_fn(stacked.nrows() / 3, 3, |i, j| stacked[(3 * i + j, 0)])
}

/// Builds the dense `(3m x 3n)` block matrix whose `(i, j)` block is the
/// kernel evaluated between `target_points[i]` and `source_points[j]`.
#[inline(always)]
pub fn get_block_matrix<K>(
    target_points: &Mat<f64>,
    source_points: &Mat<f64>,
    kernel_function: &K,
) -> Mat<f64>
where
    K: MatrixKernelFunction,
{
    let m = target_points.nrows();
    let n = source_points.nrows();

    let mut a_matrix = Mat::<f64>::zeros(3 * m, 3 * n);

    for j in 0..n {
        let source = source_points.row(j);

        for i in 0..m {
            let block = kernel_function.evaluate(target_points.row(i), source);

            for p in 0..3 {
                for q in 0..3 {
                    a_matrix[(3 * i + p, 3 * j + q)] = block[p][q];
                }
            }
        }
    }

    a_matrix
}

/// Builds the symmetric `(3n x 3n)` interpolation matrix for a set of points,
/// adding `nugget` to the diagonal.
///
/// Only the blocks on and below the block diagonal are evaluated; each is
/// mirrored into the upper triangle. When `parallel` is set the block columns
/// are evaluated on the rayon thread pool.
pub fn get_block_matrix_symmetric_solver<K>(
    points: &Mat<f64>,
    kernel_function: &K,
    nugget: f64,
    parallel: bool,
) -> Mat<f64>
where
    K: MatrixKernelFunction + Sync,
{
    let n = points.nrows();

    let block_column = |j: usize| -> Vec<Block3> {
        let source = points.row(j);
        (j..n)
            .map(|i| kernel_function.evaluate(points.row(i), source))
            .collect()
    };

    let lower_blocks: Vec<Vec<Block3>> = match parallel {
        true => (0..n).into_par_iter().map(|j| block_column(j)).collect(),
        false => (0..n).map(|j| block_column(j)).collect(),
    };

    let mut a_matrix = Mat::<f64>::zeros(3 * n, 3 * n);

    for (j, column) in lower_blocks.iter().enumerate() {
        for (offset, block) in column.iter().enumerate() {
            let i = j + offset;

            for p in 0..3 {
                for q in 0..3 {
                    let mut k_val = block[p][q];

                    if i == j && p == q {
                        k_val += nugget;
                    }

                    a_matrix[(3 * i + p, 3 * j + q)] = k_val;
                    a_matrix[(3 * j + q, 3 * i + p)] = k_val;
                }
            }
        }
    }

    a_matrix
}
