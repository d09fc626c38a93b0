/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides divergence-free benchmark fields for validating and demonstrating interpolation quality.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Analytic vector fields with zero divergence, for generating test samples.
//!
//! Every function takes an `(n x 3)` matrix of positions and returns the
//! `(n x 3)` matrix of field vectors at those positions.
use faer::Mat;

/// Struct that implements divergence-free 3D vector fields to generate
/// samples for testing divergence-free interpolation.
pub struct FieldTestFunctions;

impl FieldTestFunctions {
    /// Constant field `B(p) = b0`.
    pub fn uniform(points: &Mat<f64>, b0: [f64; 3]) -> Mat<f64> {
        assert_eq!(points.ncols(), 3);
        Mat::from_fn(points.nrows(), 3, |_, j| b0[j])
    }

    /// Point dipole at the origin with moment `m`:
    ///
    /// ```text
    /// B(p) = (3 (m . p) p / |p|^2 - m) / |p|^3
    /// ```
    ///
    /// Singular at the origin; sample it away from there (for example with
    /// [`generate_shell_points`](crate::generate_shell_points)).
    pub fn dipole(points: &Mat<f64>, moment: [f64; 3]) -> Mat<f64> {
        assert_eq!(points.ncols(), 3);
        let mut values = Mat::<f64>::zeros(points.nrows(), 3);

        for i in 0..points.nrows() {
            let p = [points[(i, 0)], points[(i, 1)], points[(i, 2)]];
            let r2 = p[0] * p[0] + p[1] * p[1] + p[2] * p[2];
            let r3 = r2 * r2.sqrt();
            let m_dot_p = moment[0] * p[0] + moment[1] * p[1] + moment[2] * p[2];

            for j in 0..3 {
                values[(i, j)] = (3.0 * m_dot_p * p[j] / r2 - moment[j]) / r3;
            }
        }

        values
    }

    /// Arnold-Beltrami-Childress flow:
    ///
    /// ```text
    /// Bx = a sin z + c cos y
    /// By = b sin x + a cos z
    /// Bz = c sin y + b cos x
    /// ```
    ///
    /// Smooth everywhere, and each component is independent of its own
    /// coordinate, so the divergence vanishes identically.
    pub fn abc_flow(points: &Mat<f64>, a: f64, b: f64, c: f64) -> Mat<f64> {
        assert_eq!(points.ncols(), 3);

        Mat::from_fn(points.nrows(), 3, |i, j| {
            let (x, y, z) = (points[(i, 0)], points[(i, 1)], points[(i, 2)]);
            match j {
                0 => a * z.sin() + c * y.cos(),
                1 => b * x.sin() + a * z.cos(),
                _ => c * y.sin() + b * x.cos(),
            }
        })
    }
}
