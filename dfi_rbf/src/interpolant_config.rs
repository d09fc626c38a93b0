/////////////////////////////////////////////////////////////////////////////////////////////
//
// Specifies the kernel shape and smoothing options for configuring divergence-free interpolants.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Specifies the kernel shape and smoothing options for configuring divergence-free interpolants.
use dfi_rbf_utils::KernelParams;
use serde::{Deserialize, Serialize};

/// A convenience builder for constructing an [`InterpolantSettings`] instance.
///
/// The builder should be called via the [`InterpolantSettings::builder`] method.
///
/// See [`InterpolantSettings`] for details on each field.
#[derive(Debug, Clone, Copy)]
pub struct InterpolantSettingsBuilder {
    pub epsilon: f64,
    pub nugget: f64,
}

impl InterpolantSettingsBuilder {
    /// Creates a new instance of the [`InterpolantSettingsBuilder`].
    fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            nugget: 0.0,
        }
    }

    /// Sets the nugget (smoothing) value.
    pub fn nugget(mut self, nugget: f64) -> Self {
        self.nugget = nugget;
        self
    }

    /// Builds and returns an instance of [`InterpolantSettings`] from the values
    /// defined in the builder.
    ///
    /// The values are validated when the interpolator is fitted, so an
    /// invalid `epsilon` surfaces as an error from the fit rather than a panic here.
    pub fn build(self) -> InterpolantSettings {
        InterpolantSettings {
            epsilon: self.epsilon,
            nugget: self.nugget,
        }
    }
}

/// Settings that define a fitted divergence-free interpolant.
///
/// These values are part of the model: they are stored with the fitted
/// weights and are required to evaluate it again after loading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterpolantSettings {
    /// Shape parameter of the scalar Gaussian `psi(r) = exp(-epsilon r^2)`
    /// underlying the matrix-valued kernel. Larger values produce more localised
    /// interpolation. Must be finite and strictly positive.
    ///
    /// Typically chosen so that `epsilon * h^2` is of order one, where `h`
    /// is the typical spacing between samples.
    pub epsilon: f64,

    /// Optional smoothing parameter added to the diagonal of the system. A
    /// value of `0.0` (default) enforces an exact fit to all input samples.
    /// Larger values soften the fit, which can help with noisy or closely
    /// spaced data.
    pub nugget: f64,
}

impl InterpolantSettings {
    /// Returns a new [`InterpolantSettingsBuilder`] for the given shape parameter.
    pub fn builder(epsilon: f64) -> InterpolantSettingsBuilder {
        InterpolantSettingsBuilder::new(epsilon)
    }
}

impl From<InterpolantSettings> for KernelParams {
    /// Converts an [`InterpolantSettings`] instance into a
    /// [`dfi_rbf_utils::KernelParams`].
    ///
    /// This allows `.into()` or `KernelParams::from(...)` to be used
    /// directly when passing settings into lower-level utility functions.
    fn from(v: InterpolantSettings) -> Self {
        KernelParams { epsilon: v.epsilon }
    }
}
