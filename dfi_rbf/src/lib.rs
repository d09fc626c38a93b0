/////////////////////////////////////////////////////////////////////////////////////////////
//
// Exposes the public API and high-level documentation for divergence-free RBF interpolation.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Divergence-free Radial Basis Function (RBF) interpolation.
//!
//! Reconstructs a 3D vector field from scattered samples so that the result
//! has zero divergence everywhere, as a magnetic field must. The interpolant
//! is a sum of matrix-valued kernels
//!
//! ```text
//! Phi = (grad grad^T - laplacian I) psi,    psi(r) = exp(-epsilon r^2)
//! ```
//!
//! centred on the samples (following `1` and `2`). Each column of `Phi` is
//! divergence free, so any weighted sum of them is too. The weights come
//! from a dense `3n x 3n` symmetric positive definite system, which is
//! assembled in parallel and solved with a Cholesky factorisation.
//!
//! The dense solve costs **O(n²)** memory and **O(n³)** operations, which
//! suits problems of up to a few thousand samples.
//!
//! Check out the examples directory in the repository for more examples of usage.
//!
//! # Features
//! - Exact interpolation of vector samples, or smoothing through an optional nugget
//! - Explicit errors for invalid input, coincident samples and numerically
//!   singular systems; a failed fit never returns an interpolator
//! - Point and parallel batch evaluation, plus analytic Jacobian, divergence and curl
//! - Versioned JSON model files
//! - Built on [`faer`](https://docs.rs/faer/latest/faer/) for linear algebra, avoiding complex build dependencies
//!
//! # Examples
//!
//! ```
//! use dfi_rbf::{
//!     DfiInterpolator,
//!     interpolant_config::InterpolantSettings,
//!     generate_shell_points,
//!     FieldTestFunctions,
//! };
//!
//! // Sample a dipole field between radius 2 and 4
//! let source_points = generate_shell_points(40, 2.0, 4.0, Some(42));
//! let source_fields = FieldTestFunctions::dipole(&source_points, [0.0, 0.0, 1.0]);
//!
//! // Create an InterpolantSettings instance
//! let interpolant_settings = InterpolantSettings::builder(1.0).build();
//!
//! // Fit the interpolant
//! let dfi = DfiInterpolator::builder(source_points, source_fields, interpolant_settings)
//!     .build()?;
//!
//! // The fitted field reproduces the samples and has no divergence
//! assert!(dfi.max_fit_residual() < 1e-6);
//! assert!(dfi.divergence([3.0, 0.0, 0.0]).abs() < 1e-6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # References
//! 1.  F. J. Narcowich and J. D. Ward. Generalized Hermite interpolation via
//!     matrix-valued conditionally positive definite functions. Math. Comp.,
//!     63(208):661–687, 1994.
//! 2.  S. McNally. Divergence-free interpolation of vector fields from point
//!     values: exact del.B = 0 in numerical simulations. MNRAS Letters,
//!     413(1):L76–L80, 2011.
pub mod interpolant_config;

mod common;

mod rbf;

mod rtree;

mod linalg;

pub mod progress;

pub mod config;

mod field_test_functions;

pub use {
    common::{
        create_evaluation_grid, csv_to_sample_arrays, generate_random_points,
        generate_shell_points, sample_arrays_to_csv,
    },
    config::Params,
    field_test_functions::FieldTestFunctions,
    interpolant_config::InterpolantSettings,
    rbf::{DfiError, DfiInterpolator, DfiInterpolatorBuilder, ModelIOError},
};
