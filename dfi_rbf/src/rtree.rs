/////////////////////////////////////////////////////////////////////////////////////////////
//
// Wraps the `rstar` crate to find coincident sample positions before fitting.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # rtree
//!
//! Wrapper module for the rstar crate.
//!
//! Bulk loads the sample positions into an R-tree and queries each one for
//! neighbours within a small radius, which is how coincident samples are
//! found without an `O(n^2)` pairwise scan.

use dfi_rbf_utils::get_pointarray_extents;
use faer::Mat;
use rstar::primitives::GeomWithData;
use rstar::RTree;

/// A 3D point tagged with its row index in the sample matrix.
type IndexedPoint = GeomWithData<[f64; 3], usize>;

fn bulk_load_indexed_points(points: &Mat<f64>) -> RTree<IndexedPoint> {
    let items = (0..points.nrows())
        .map(|i| GeomWithData::new([points[(i, 0)], points[(i, 1)], points[(i, 2)]], i))
        .collect::<Vec<_>>();
    RTree::bulk_load(items)
}

/// Largest axis extent of the point cloud, or `0.0` when there are no points.
pub(crate) fn largest_extent(points: &Mat<f64>) -> f64 {
    if points.nrows() == 0 {
        return 0.0;
    }
    let extents = get_pointarray_extents(points);
    let ncols = points.ncols();
    (0..ncols)
        .map(|k| extents[k + ncols] - extents[k])
        .fold(0.0, f64::max)
}

/// Returns the first pair `(i, j)` with `i < j` whose positions are no
/// further apart than `tolerance` (absolute distance), or `None`.
///
/// Pairs are reported in order of the lower index, then the higher one.
pub fn find_duplicate_pair(points: &Mat<f64>, tolerance: f64) -> Option<(usize, usize)> {
    if points.nrows() < 2 {
        return None;
    }

    let tree = bulk_load_indexed_points(points);
    // rstar measures squared distance.
    let radius_2 = tolerance * tolerance;

    (0..points.nrows()).find_map(|i| {
        let query = [points[(i, 0)], points[(i, 1)], points[(i, 2)]];
        tree.locate_within_distance(query, radius_2)
            .map(|item| item.data)
            .filter(|&j| j > i)
            .min()
            .map(|j| (i, j))
    })
}
