/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares the traits shared by matrix-valued kernels and their parameter sets.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{kernel_helpers::KernelParams, utils::Block3};
use faer::RowRef;

/// Converts a shared [`KernelParams`] configuration into a concrete kernel type.
pub trait KernelFromParams: Sized {
    /// Constructs `Self` from a set of uniform kernel parameters.
    fn from_params(p: &KernelParams) -> Self;
}

/// Evaluates a 3x3 matrix-valued kernel between a target and a source point.
///
/// Implementors only need to provide [`MatrixKernelFunction::block`], which
/// works on the displacement `target - source`. The row based entry point is
/// what the block system assembly uses, since sample positions are stored as
/// the rows of a `(n x 3)` [`faer::Mat`].
pub trait MatrixKernelFunction {
    /// Kernel block for the displacement `d = target - source`.
    fn block(&self, d: &[f64; 3]) -> Block3;

    /// Kernel block between two 3D points stored as matrix rows.
    #[inline(always)]
    fn evaluate(&self, target: RowRef<f64>, source: RowRef<f64>) -> Block3 {
        let d = crate::utils::row_difference(target, source);
        self.block(&d)
    }
}
