/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares solver options for input validation, factorisation checks, and system assembly.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Declares solver options for input validation, factorisation checks, and system assembly.
use serde::{Deserialize, Serialize};

/// Solver and validation parameters used while fitting a
/// [`DfiInterpolator`](crate::DfiInterpolator).
///
/// Unlike [`InterpolantSettings`](crate::interpolant_config::InterpolantSettings),
/// none of these values change the fitted model. They only control how
/// strictly the inputs and the factorised system are checked.
///
/// ### Default Values
/// - `test_unique`: `true`
/// - `duplicate_tolerance`: `1e-10`
/// - `pivot_tolerance`: `1e-13`
/// - `parallel_assembly`: `true`
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Params {
    /// Whether to check the sample positions for duplicates before
    /// assembling the system.
    pub test_unique: bool,

    /// Separation, relative to the largest extent of the sample cloud,
    /// below which two sample positions are reported as duplicates.
    pub duplicate_tolerance: f64,

    /// Smallest accepted ratio `min(L_ii^2) / max(A_ii)` between the
    /// squared Cholesky pivots and the largest diagonal entry of the system.
    pub pivot_tolerance: f64,

    /// Whether to assemble the system matrix on the rayon thread pool.
    pub parallel_assembly: bool,
}

impl Default for Params {
    fn default() -> Self {
        Params::builder().build()
    }
}

impl Params {
    /// Returns a new [`ParamsBuilder`] populated with the default values.
    pub fn builder() -> ParamsBuilder {
        ParamsBuilder::new()
    }
}

/// A convenience builder for constructing a [`Params`] instance.
///
/// The builder should be called via the [`Params::builder`] method.
///
/// See [`Params`] for details on each field.
#[derive(Debug, Clone)]
pub struct ParamsBuilder {
    pub test_unique: bool,
    pub duplicate_tolerance: f64,
    pub pivot_tolerance: f64,
    pub parallel_assembly: bool,
}

impl ParamsBuilder {
    fn new() -> Self {
        Self {
            test_unique: true,
            duplicate_tolerance: 1e-10,
            pivot_tolerance: 1e-13,
            parallel_assembly: true,
        }
    }

    /// Enables or disables duplicate point checks.
    pub fn test_unique(mut self, test_unique: bool) -> Self {
        self.test_unique = test_unique;
        self
    }

    /// Sets the relative duplicate separation tolerance.
    pub fn duplicate_tolerance(mut self, duplicate_tolerance: f64) -> Self {
        self.duplicate_tolerance = duplicate_tolerance;
        self
    }

    /// Sets the relative Cholesky pivot tolerance.
    pub fn pivot_tolerance(mut self, pivot_tolerance: f64) -> Self {
        self.pivot_tolerance = pivot_tolerance;
        self
    }

    /// Enables or disables parallel assembly of the system matrix.
    pub fn parallel_assembly(mut self, parallel_assembly: bool) -> Self {
        self.parallel_assembly = parallel_assembly;
        self
    }

    /// Builds and returns a [`Params`] instance.
    pub fn build(self) -> Params {
        Params {
            test_unique: self.test_unique,
            duplicate_tolerance: self.duplicate_tolerance,
            pivot_tolerance: self.pivot_tolerance,
            parallel_assembly: self.parallel_assembly,
        }
    }
}
