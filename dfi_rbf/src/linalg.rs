/////////////////////////////////////////////////////////////////////////////////////////////
//
// Adds the dense Cholesky factorisation and solve used to fit divergence-free interpolants.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # linalg
//!
//! Helper linear algebra functionality.
//!
//! The interpolation system is dense, symmetric and positive definite for
//! distinct sample positions, so it is factorised with faer's LLT. faer only
//! rejects a factorisation when a pivot is non-positive, which lets nearly
//! singular systems through with weights dominated by rounding error. The
//! [`CholeskySolver`] additionally compares the smallest squared pivot with
//! the largest diagonal entry of the input and rejects the factorisation when
//! that ratio is below a caller supplied tolerance.

use faer::{linalg::solvers::Llt, prelude::*, Mat, MatRef, Side};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FactorizationError {
    /// LLT failed (matrix not SPD or numerically indefinite).
    #[error("matrix is not positive definite")]
    NotSpd,

    /// LLT succeeded but the relative pivot fell below tolerance.
    #[error("matrix is numerically singular (relative pivot {ratio:e} below {tolerance:e})")]
    IllConditioned { ratio: f64, tolerance: f64 },
}

/// Dense Cholesky factorisation `A = L L^T` of a symmetric positive
/// definite matrix, stored as the lower triangle.
pub struct CholeskySolver {
    llt: Llt<f64>,
    min_pivot_ratio: f64,
}

impl CholeskySolver {
    /// Factorises the lower triangle of `a`.
    ///
    /// Returns an error if faer's LLT fails, or if
    /// `min(L_ii^2) / max(A_ii)` is below `pivot_tolerance`.
    pub fn try_new(a: MatRef<f64>, pivot_tolerance: f64) -> Result<Self, FactorizationError> {
        assert!(a.nrows() == a.ncols());

        let llt = a
            .llt(Side::Lower)
            .map_err(|_| FactorizationError::NotSpd)?;

        let min_pivot_ratio = relative_min_pivot(a, llt.L());

        if !(min_pivot_ratio >= pivot_tolerance) {
            return Err(FactorizationError::IllConditioned {
                ratio: min_pivot_ratio,
                tolerance: pivot_tolerance,
            });
        }

        Ok(Self {
            llt,
            min_pivot_ratio,
        })
    }

    /// Solves `A X = B` using the stored factorisation.
    pub fn solve(&self, rhs: &Mat<f64>) -> Mat<f64> {
        self.llt.solve(rhs)
    }

    /// Ratio `min(L_ii^2) / max(A_ii)` measured during factorisation.
    pub fn min_pivot_ratio(&self) -> f64 {
        self.min_pivot_ratio
    }
}

/// `min(L_ii^2) / max(A_ii)`, or `1.0` for an empty matrix.
#[allow(non_snake_case)]
fn relative_min_pivot(A: MatRef<f64>, L: MatRef<f64>) -> f64 {
    let n = A.nrows();
    if n == 0 {
        return 1.0;
    }

    let mut max_diag = 0.0f64;
    let mut min_pivot = f64::INFINITY;

    for i in 0..n {
        max_diag = max_diag.max(A[(i, i)].abs());
        let l_ii = L[(i, i)];
        min_pivot = min_pivot.min(l_ii * l_ii);
    }

    if max_diag == 0.0 {
        return 0.0;
    }

    min_pivot / max_diag
}
