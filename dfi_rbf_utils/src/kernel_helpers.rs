/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides parameter and builder types for configuring divergence-free kernels.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};

/// Parameters shared by the Gaussian based kernels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    /// Shape parameter of the scalar Gaussian `psi(r) = exp(-epsilon r^2)`.
    ///
    /// Larger values make each sample's influence more local. Must be
    /// strictly positive.
    pub epsilon: f64,
}

impl KernelParams {
    /// Begins building a [`KernelParams`] instance.
    pub fn builder() -> KernelParamsBuilder {
        KernelParamsBuilder { epsilon: 1.0 }
    }
}

/// Builder for [`KernelParams`].
#[derive(Debug, Clone, Copy)]
pub struct KernelParamsBuilder {
    epsilon: f64,
}

impl KernelParamsBuilder {
    /// Sets the `epsilon` parameter on the builder.
    pub fn epsilon(mut self, v: f64) -> Self {
        self.epsilon = v;
        self
    }

    /// Finalises the builder into a [`KernelParams`] value.
    ///
    /// # Panics
    /// If `epsilon` is not a finite, strictly positive number.
    pub fn build(self) -> KernelParams {
        assert!(
            self.epsilon.is_finite() && self.epsilon > 0.0,
            "epsilon must be finite and positive, got {}",
            self.epsilon
        );
        KernelParams {
            epsilon: self.epsilon,
        }
    }
}
