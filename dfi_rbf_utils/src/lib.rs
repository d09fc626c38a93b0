/////////////////////////////////////////////////////////////////////////////////////////////
//
// Re-exports kernel utilities and block system helpers used across the dfi_rbf crates.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Utilities for the [`dfi_rbf`] crate
//!
//! Matrix-valued, divergence-free radial basis function kernels and the
//! helpers that assemble them into dense block systems. Points and vector
//! values are stored as the rows of `(n x 3)` [`faer::Mat`]s; assembled
//! systems use the `3n` interleaved layout `[x0, y0, z0, x1, ...]`.
//!
//! [`dfi_rbf`]: https://docs.rs/dfi_rbf
mod kernel_helpers;
mod rbf_kernels;
mod traits;
mod utils;

/// Implemented kernels.
pub mod kernels {
    pub use super::rbf_kernels::*;
}

pub use {
    kernel_helpers::{KernelParams, KernelParamsBuilder},
    traits::{KernelFromParams, MatrixKernelFunction},
    utils::{
        Block3, get_block_matrix, get_block_matrix_symmetric_solver, get_pointarray_extents,
        mat3_vec3_mul, row_difference, row_to_vec3, stack_vector_rows, unstack_vector_rows,
    },
};
