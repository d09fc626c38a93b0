/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the divergence-free interpolator: fitting, evaluation, field derivatives, and model I/O.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    config::Params,
    interpolant_config::InterpolantSettings,
    linalg::{CholeskySolver, FactorizationError},
    progress::{ProgressMsg, ProgressSink},
    rtree,
};

use dfi_rbf_utils::{
    self, kernels::DivFreeGaussianKernel, Block3, KernelFromParams, KernelParams,
    MatrixKernelFunction,
};
use faer::Mat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors returned when fitting a [`DfiInterpolator`].
///
/// A failed fit never produces an interpolator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DfiError {
    /// No samples were supplied.
    #[error("at least one sample is required")]
    EmptySamples,

    /// Positions and field vectors have different sample counts.
    #[error("got {points} sample positions but {fields} field vectors")]
    LengthMismatch { points: usize, fields: usize },

    /// An input matrix does not have exactly three columns.
    #[error("{name} must have exactly 3 columns, found {found}")]
    DimensionMismatch { name: &'static str, found: usize },

    /// The kernel shape parameter is zero, negative or not finite.
    #[error("epsilon must be finite and positive, got {0}")]
    InvalidEpsilon(f64),

    /// The nugget is negative or not finite.
    #[error("nugget must be finite and non-negative, got {0}")]
    InvalidNugget(f64),

    /// A position or field value is NaN or infinite.
    #[error("non-finite value in {name} at row {row}")]
    NonFiniteInput { name: &'static str, row: usize },

    /// Two sample positions coincide to within the duplicate tolerance.
    #[error("sample positions {first} and {second} coincide")]
    DuplicatePoints { first: usize, second: usize },

    /// The interpolation matrix could not be factorised. `pivot` is the
    /// relative pivot `min(L_ii^2) / max(A_ii)`, or `0.0` if the
    /// factorisation broke down.
    #[error(
        "interpolation matrix is not positive definite (relative pivot {pivot:e}); \
         check for coincident samples or reduce epsilon"
    )]
    NotPositiveDefinite { pivot: f64 },
}

impl From<FactorizationError> for DfiError {
    fn from(err: FactorizationError) -> Self {
        match err {
            FactorizationError::NotSpd => DfiError::NotPositiveDefinite { pivot: 0.0 },
            FactorizationError::IllConditioned { ratio, .. } => {
                DfiError::NotPositiveDefinite { pivot: ratio }
            }
        }
    }
}

/// Convenience builder for constructing a [`DfiInterpolator`].
///
/// The builder should be called via the [`DfiInterpolator::builder`] method.
///
/// See [`DfiInterpolator`] for details on each field.
pub struct DfiInterpolatorBuilder {
    points: Mat<f64>,
    fields: Mat<f64>,
    interpolant_settings: InterpolantSettings,
    params: Params,
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl DfiInterpolatorBuilder {
    /// Creates a new builder with the required inputs:
    /// - `points`: `(n x 3)` sample positions.
    /// - `fields`: `(n x 3)` field vectors at each position.
    /// - `interpolant_settings`: kernel shape and nugget.
    ///
    /// Default [`Params`] are used unless overridden.
    fn new(points: Mat<f64>, fields: Mat<f64>, interpolant_settings: InterpolantSettings) -> Self {
        Self {
            points,
            fields,
            interpolant_settings,
            params: Params::default(),
            progress_callback: None,
        }
    }

    /// Sets custom solver and validation parameters.
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Optional callback for reporting fitting progress.
    ///
    /// Not persisted by [`DfiInterpolator::save_model`].
    pub fn progress_callback(mut self, progress_callback: Arc<dyn ProgressSink>) -> Self {
        self.progress_callback = Some(progress_callback);
        self
    }

    /// Fits the interpolator.
    ///
    /// Validates the inputs, assembles the `3n x 3n` system, factorises it and
    /// solves for the weights.
    pub fn build(self) -> Result<DfiInterpolator, DfiError> {
        DfiInterpolator::new(
            self.points,
            self.fields,
            self.interpolant_settings,
            self.params,
            self.progress_callback,
        )
    }
}

/// A fitted divergence-free RBF interpolant of a 3D vector field.
///
/// The interpolant is
///
/// ```text
/// s(p) = sum_j Phi(p - p_j) c_j
/// ```
///
/// where `Phi` is the matrix-valued kernel of [`DivFreeGaussianKernel`] and the
/// weights `c_j` are found by requiring `s(p_i) = B_i` at every sample. Every
/// column of `Phi` has zero divergence, so `s` is divergence free everywhere.
///
/// The fitted state never changes: all evaluation methods take `&self`, so one
/// interpolator can be shared between threads. Refitting means building a new
/// instance. Dropping the value releases its storage.
///
/// ### Example
/// ```
/// use dfi_rbf::{DfiInterpolator, FieldTestFunctions, InterpolantSettings};
/// use faer::mat;
///
/// let points = mat![
///     [0.0, 0.0, 0.0],
///     [1.0, 0.0, 0.0],
///     [0.0, 1.0, 0.0],
///     [0.0, 0.0, 1.0f64],
/// ];
/// let fields = FieldTestFunctions::uniform(&points, [0.0, 0.0, 1.0]);
///
/// let settings = InterpolantSettings::builder(2.0).build();
/// let dfi = DfiInterpolator::builder(points, fields, settings).build()?;
///
/// let b = dfi.evaluate_point([0.0, 0.0, 0.0]);
/// assert!((b[2] - 1.0).abs() < 1e-10);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct DfiInterpolator {
    /// Copies of the `(n x 3)` sample positions.
    points: Mat<f64>,

    /// The `(n x 3)` field vectors the interpolant was fitted to.
    fields: Mat<f64>,

    /// One `(1 x 3)` weight row per sample.
    weights: Mat<f64>,

    /// Kernel settings used to fit the interpolant.
    interpolant_settings: InterpolantSettings,

    /// Solver and validation parameters used during the fit.
    params: Params,

    kernel: DivFreeGaussianKernel,

    /// Optional callback for reporting progress.
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl DfiInterpolator {
    /// Creates a new [`DfiInterpolatorBuilder`] for the given samples and
    /// kernel settings.
    ///
    /// This is the way to construct an interpolator with non-default
    /// parameters or a progress callback.
    pub fn builder(
        points: Mat<f64>,
        fields: Mat<f64>,
        interpolant_settings: InterpolantSettings,
    ) -> DfiInterpolatorBuilder {
        DfiInterpolatorBuilder::new(points, fields, interpolant_settings)
    }

    /// Fits an exact interpolant (no nugget, default [`Params`]) to copies of
    /// `points` and `fields` using the shape parameter `epsilon`.
    pub fn fit(points: &Mat<f64>, fields: &Mat<f64>, epsilon: f64) -> Result<Self, DfiError> {
        Self::builder(
            points.clone(),
            fields.clone(),
            InterpolantSettings::builder(epsilon).build(),
        )
        .build()
    }

    fn new(
        points: Mat<f64>,
        fields: Mat<f64>,
        interpolant_settings: InterpolantSettings,
        params: Params,
        progress_callback: Option<Arc<dyn ProgressSink>>,
    ) -> Result<Self, DfiError> {
        let solver_start = Instant::now();

        validate_samples(&points, &fields, &interpolant_settings)?;

        let num_points = points.nrows();

        if params.test_unique {
            let tolerance = params.duplicate_tolerance * rtree::largest_extent(&points);
            if let Some((first, second)) = rtree::find_duplicate_pair(&points, tolerance) {
                warn!(first, second, "duplicate sample positions");
                return Err(DfiError::DuplicatePoints { first, second });
            }
        }

        let kernel = DivFreeGaussianKernel::from_params(&KernelParams::from(interpolant_settings));

        let weights = solve_weights(
            &points,
            &fields,
            &kernel,
            &interpolant_settings,
            &params,
            progress_callback.as_ref(),
        )
        .inspect_err(|err| warn!(num_points, %err, "fit failed"))?;

        let solver_duration = solver_start.elapsed();

        info!(
            num_points,
            epsilon = interpolant_settings.epsilon,
            nugget = interpolant_settings.nugget,
            elapsed = ?solver_duration,
            "fitted divergence-free interpolant"
        );

        if let Some(sink) = &progress_callback {
            let msg = format!(
                "Took {:?} to fit divergence-free RBF for {} points using the following settings:\n\
                Epsilon: {}, Nugget: {}",
                solver_duration,
                num_points,
                interpolant_settings.epsilon,
                interpolant_settings.nugget,
            );

            sink.emit(ProgressMsg::Message { message: msg });
        }

        Ok(Self {
            points,
            fields,
            weights,
            interpolant_settings,
            params,
            kernel,
            progress_callback,
        })
    }

    /// Number of samples the interpolant was fitted to.
    pub fn num_points(&self) -> usize {
        self.points.nrows()
    }

    /// Shape parameter of the kernel.
    pub fn epsilon(&self) -> f64 {
        self.interpolant_settings.epsilon
    }

    /// The `(n x 3)` sample positions.
    pub fn points(&self) -> &Mat<f64> {
        &self.points
    }

    /// The `(n x 3)` field vectors the interpolant was fitted to.
    pub fn fields(&self) -> &Mat<f64> {
        &self.fields
    }

    /// The `(n x 3)` weights, one vector per sample.
    pub fn weights(&self) -> &Mat<f64> {
        &self.weights
    }

    pub fn interpolant_settings(&self) -> &InterpolantSettings {
        &self.interpolant_settings
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The progress sink attached at fit or load time, if any.
    pub fn progress_callback(&self) -> Option<&Arc<dyn ProgressSink>> {
        self.progress_callback.as_ref()
    }

    /// Evaluate the interpolated field at a single position.
    ///
    /// Sums `Phi(p - p_j) c_j` over all samples. Costs `O(n)` and never
    /// changes the interpolator.
    pub fn evaluate_point(&self, p: [f64; 3]) -> [f64; 3] {
        let mut sum = [0.0; 3];

        for (j, w) in self.weights.row_iter().enumerate() {
            let block = self.kernel.block(&self.displacement(&p, j));
            let c = dfi_rbf_utils::row_to_vec3(w);
            let contribution = dfi_rbf_utils::mat3_vec3_mul(&block, &c);
            for k in 0..3 {
                sum[k] += contribution[k];
            }
        }

        sum
    }

    /// Evaluate the interpolant at every row of `target_points`.
    ///
    /// Targets are evaluated in parallel on the rayon thread pool.
    ///
    /// ### Returns
    /// A `(n_targets x 3)` matrix of field vectors.
    ///
    /// ### Panics
    /// If `target_points` does not have three columns.
    pub fn evaluate(&self, target_points: &Mat<f64>) -> Mat<f64> {
        assert_eq!(
            target_points.ncols(),
            3,
            "target points must have 3 columns, found {}",
            target_points.ncols()
        );

        let values: Vec<[f64; 3]> = (0..target_points.nrows())
            .into_par_iter()
            .map(|i| self.evaluate_point(dfi_rbf_utils::row_to_vec3(target_points.row(i))))
            .collect();

        Mat::from_fn(values.len(), 3, |i, j| values[i][j])
    }

    /// Evaluate the interpolant at the original sample positions.
    ///
    /// With a zero nugget this reproduces the input fields to rounding error,
    /// which makes it useful for checking a fit.
    pub fn evaluate_at_source(&self) -> Mat<f64> {
        self.evaluate(&self.points)
    }

    /// Largest Euclidean distance between an input field vector and the
    /// interpolated value at the same position.
    pub fn max_fit_residual(&self) -> f64 {
        let fitted = self.evaluate_at_source();

        fitted
            .row_iter()
            .zip(self.fields.row_iter())
            .map(|(a, b)| {
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f64>()
                    .sqrt()
            })
            .fold(0.0, f64::max)
    }

    /// Jacobian of the interpolated field, `J[i][k] = d s_i / d x_k`, at `p`.
    ///
    /// Computed analytically from the kernel derivatives.
    pub fn jacobian(&self, p: [f64; 3]) -> Block3 {
        let mut jac = [[0.0; 3]; 3];

        for (j, w) in self.weights.row_iter().enumerate() {
            let c = dfi_rbf_utils::row_to_vec3(w);
            let block = self.kernel.jacobian_times(&self.displacement(&p, j), &c);
            for a in 0..3 {
                for b in 0..3 {
                    jac[a][b] += block[a][b];
                }
            }
        }

        jac
    }

    /// Divergence of the interpolated field at `p`. Zero up to rounding.
    pub fn divergence(&self, p: [f64; 3]) -> f64 {
        let jac = self.jacobian(p);
        jac[0][0] + jac[1][1] + jac[2][2]
    }

    /// Curl of the interpolated field at `p`.
    ///
    /// For a magnetic field this is proportional to the current density.
    pub fn curl(&self, p: [f64; 3]) -> [f64; 3] {
        let jac = self.jacobian(p);
        [
            jac[2][1] - jac[1][2],
            jac[0][2] - jac[2][0],
            jac[1][0] - jac[0][1],
        ]
    }

    #[inline(always)]
    fn displacement(&self, p: &[f64; 3], j: usize) -> [f64; 3] {
        [
            p[0] - self.points[(j, 0)],
            p[1] - self.points[(j, 1)],
            p[2] - self.points[(j, 2)],
        ]
    }

    /// Save this interpolator to a **JSON envelope** `{ format, version, ... }`.
    ///
    /// The on-disk format is versioned via `JSON_FORMAT_NAME` and `JSON_VERSION`.
    /// Files produced here are intended to be read back with [`DfiInterpolator::load_model`].
    ///
    /// ### Errors
    /// - Returns `ModelIOError::{Create, Serialize, Flush}` on I/O or serialization
    ///   failures.
    ///
    /// ### Example
    /// ```no_run
    /// # use dfi_rbf::DfiInterpolator;
    /// # let dfi: DfiInterpolator = unimplemented!();
    /// dfi.save_model("dfi_model.json")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> ModelIOResult<()> {
        let path_ref = path.as_ref();
        let file = File::create(path_ref).map_err(|e| ModelIOError::Create {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        let mut w = BufWriter::new(file);

        let snapshot = ModelSnapshot::from(self);
        let env = JsonEnvelopeRef {
            format: JSON_FORMAT_NAME,
            version: JSON_VERSION,
            model: &snapshot,
        };

        serde_json::to_writer_pretty(&mut w, &env).map_err(|e| ModelIOError::Serialize {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        w.flush().map_err(|e| ModelIOError::Flush {
            path: path_ref.to_path_buf(),
            source: e,
        })?;

        debug!(path = %path_ref.display(), "saved model");
        Ok(())
    }

    /// Load an interpolator from a versioned **JSON envelope**, validating
    /// format, version and the stored model.
    ///
    /// If `progress` is `Some`, the sink is attached to the returned model.
    ///
    /// ### Validation
    /// - Fails if `format != JSON_FORMAT_NAME` or `version != JSON_VERSION`.
    /// - Fails with `ModelIOError::Inconsistent` if the stored samples, settings
    ///   or weights could not have come from a successful fit.
    ///
    /// ### Example
    /// ```no_run
    /// # use dfi_rbf::DfiInterpolator;
    /// let dfi = DfiInterpolator::load_model("dfi_model.json", None)?;
    /// let b = dfi.evaluate_point([1.0, 2.0, 3.0]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_model<P: AsRef<Path>>(
        path: P,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> ModelIOResult<Self> {
        let path_ref = path.as_ref();

        let file = File::open(path_ref).map_err(|e| ModelIOError::Open {
            path: path_ref.to_path_buf(),
            source: e,
        })?;
        let reader = BufReader::new(file);

        let env: JsonEnvelopeOwned<ModelSnapshot> =
            serde_json::from_reader(reader).map_err(|e| ModelIOError::Parse {
                path: path_ref.to_path_buf(),
                source: e,
            })?;

        // Validate envelope
        if env.format != JSON_FORMAT_NAME {
            return Err(ModelIOError::FormatMismatch {
                path: path_ref.to_path_buf(),
                found: env.format,
                expected: JSON_FORMAT_NAME,
            });
        }

        if env.version != JSON_VERSION {
            return Err(ModelIOError::VersionMismatch {
                path: path_ref.to_path_buf(),
                found: env.version,
                expected: JSON_VERSION,
            });
        }

        let mut model = env
            .model
            .into_interpolator()
            .map_err(|reason| ModelIOError::Inconsistent {
                path: path_ref.to_path_buf(),
                reason,
            })?;

        model.progress_callback = progress;

        debug!(path = %path_ref.display(), num_points = model.num_points(), "loaded model");
        Ok(model)
    }
}

/// Checks the fit preconditions on the raw inputs.
fn validate_samples(
    points: &Mat<f64>,
    fields: &Mat<f64>,
    interpolant_settings: &InterpolantSettings,
) -> Result<(), DfiError> {
    for (name, mat) in [("points", points), ("fields", fields)] {
        if mat.ncols() != 3 {
            return Err(DfiError::DimensionMismatch {
                name,
                found: mat.ncols(),
            });
        }
    }

    if points.nrows() == 0 {
        return Err(DfiError::EmptySamples);
    }

    if points.nrows() != fields.nrows() {
        return Err(DfiError::LengthMismatch {
            points: points.nrows(),
            fields: fields.nrows(),
        });
    }

    let epsilon = interpolant_settings.epsilon;
    if !(epsilon.is_finite() && epsilon > 0.0) {
        return Err(DfiError::InvalidEpsilon(epsilon));
    }

    let nugget = interpolant_settings.nugget;
    if !(nugget.is_finite() && nugget >= 0.0) {
        return Err(DfiError::InvalidNugget(nugget));
    }

    for (name, mat) in [("points", points), ("fields", fields)] {
        if let Some(row) = first_non_finite_row(mat) {
            return Err(DfiError::NonFiniteInput { name, row });
        }
    }

    Ok(())
}

fn first_non_finite_row(mat: &Mat<f64>) -> Option<usize> {
    mat.row_iter()
        .position(|row| row.iter().any(|v| !v.is_finite()))
}

/// Assembles and solves `A c = d`, returning the weights as `(n x 3)`.
fn solve_weights(
    points: &Mat<f64>,
    fields: &Mat<f64>,
    kernel: &DivFreeGaussianKernel,
    interpolant_settings: &InterpolantSettings,
    params: &Params,
    progress_callback: Option<&Arc<dyn ProgressSink>>,
) -> Result<Mat<f64>, DfiError> {
    let num_points = points.nrows();
    let assembly_start = Instant::now();

    let a_matrix = dfi_rbf_utils::get_block_matrix_symmetric_solver(
        points,
        kernel,
        interpolant_settings.nugget,
        params.parallel_assembly,
    );
    let rhs = dfi_rbf_utils::stack_vector_rows(fields);

    let assembly_secs = assembly_start.elapsed().as_secs_f64();
    debug!(
        num_points,
        size = a_matrix.nrows(),
        elapsed_secs = assembly_secs,
        "assembled system"
    );
    if let Some(sink) = progress_callback {
        sink.emit(ProgressMsg::SystemAssembled {
            num_points,
            elapsed_secs: assembly_secs,
        });
    }

    let factor_start = Instant::now();
    let solver = CholeskySolver::try_new(a_matrix.as_ref(), params.pivot_tolerance)?;
    let factor_secs = factor_start.elapsed().as_secs_f64();

    debug!(
        min_pivot_ratio = solver.min_pivot_ratio(),
        elapsed_secs = factor_secs,
        "factorised system"
    );
    if let Some(sink) = progress_callback {
        sink.emit(ProgressMsg::Factorised {
            min_pivot_ratio: solver.min_pivot_ratio(),
            elapsed_secs: factor_secs,
        });
    }

    let coefficients = solver.solve(&rhs);

    Ok(dfi_rbf_utils::unstack_vector_rows(&coefficients))
}

fn mat_to_vec3_rows(mat: &Mat<f64>) -> Vec<[f64; 3]> {
    mat.row_iter().map(dfi_rbf_utils::row_to_vec3).collect()
}

fn vec3_rows_to_mat(rows: &[[f64; 3]]) -> Mat<f64> {
    Mat::from_fn(rows.len(), 3, |i, j| rows[i][j])
}

/// Serialised form of a fitted [`DfiInterpolator`].
#[derive(Serialize, Deserialize)]
struct ModelSnapshot {
    interpolant_settings: InterpolantSettings,
    params: Params,
    points: Vec<[f64; 3]>,
    fields: Vec<[f64; 3]>,
    weights: Vec<[f64; 3]>,
}

impl From<&DfiInterpolator> for ModelSnapshot {
    fn from(model: &DfiInterpolator) -> Self {
        Self {
            interpolant_settings: model.interpolant_settings,
            params: model.params,
            points: mat_to_vec3_rows(&model.points),
            fields: mat_to_vec3_rows(&model.fields),
            weights: mat_to_vec3_rows(&model.weights),
        }
    }
}

impl ModelSnapshot {
    fn into_interpolator(self) -> Result<DfiInterpolator, String> {
        let points = vec3_rows_to_mat(&self.points);
        let fields = vec3_rows_to_mat(&self.fields);
        let weights = vec3_rows_to_mat(&self.weights);

        validate_samples(&points, &fields, &self.interpolant_settings).map_err(|e| e.to_string())?;

        if weights.nrows() != points.nrows() {
            return Err(format!(
                "expected {} weight vectors, found {}",
                points.nrows(),
                weights.nrows()
            ));
        }

        if let Some(row) = first_non_finite_row(&weights) {
            return Err(format!("non-finite weight at row {}", row));
        }

        Ok(DfiInterpolator {
            points,
            fields,
            weights,
            kernel: DivFreeGaussianKernel::from_params(&KernelParams::from(
                self.interpolant_settings,
            )),
            interpolant_settings: self.interpolant_settings,
            params: self.params,
            progress_callback: None,
        })
    }
}

const JSON_FORMAT_NAME: &str = "dfi_rbf.json";
const JSON_VERSION: u32 = 1;

/// Borrowing envelope for SAVE (no clone of the model).
#[derive(Serialize)]
struct JsonEnvelopeRef<'a, T: ?Sized> {
    format: &'static str,
    version: u32,
    #[serde(flatten)]
    model: &'a T,
}

/// Owning envelope for LOAD (generic over the concrete model).
#[derive(Serialize, Deserialize)]
struct JsonEnvelopeOwned<T> {
    format: String,
    version: u32,
    #[serde(flatten)]
    model: T,
}

type ModelIOResult<T> = std::result::Result<T, ModelIOError>;

/// Errors that can occur when saving or loading a [`DfiInterpolator`] model.
///
/// This is the error type returned by [`DfiInterpolator::save_model`] and
/// [`DfiInterpolator::load_model`], wrapping lower-level I/O and JSON
/// serialization issues as well as format/version/consistency failures.
#[derive(Debug, Error)]
pub enum ModelIOError {
    /// Failed to create the target file before writing a model.
    #[error("creating {}: {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },

    /// Failed to open an existing model file for reading.
    #[error("opening {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    /// Failed to flush buffered output when finishing a write.
    #[error("flushing {}: {source}", .path.display())]
    Flush { path: PathBuf, source: io::Error },

    /// Error serializing the in-memory model to JSON.
    #[error("serializing JSON to {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Error parsing JSON when reading a model from disk.
    #[error("parsing JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The JSON `format` field does not match the expected model format.
    #[error("{}: unexpected model format '{found}' (expected '{expected}')", .path.display())]
    FormatMismatch {
        path: PathBuf,
        found: String,
        expected: &'static str,
    },

    /// The JSON `version` field does not match the supported version.
    #[error("{}: unsupported model version {found} (expected {expected})", .path.display())]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    /// The stored model could not have come from a successful fit.
    #[error("{}: inconsistent model: {reason}", .path.display())]
    Inconsistent { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field_test_functions::FieldTestFunctions, progress::closure_sink};
    use faer::mat;
    use std::sync::Mutex;

    /// Unit cube corners plus two interior/offset points.
    fn ten_points() -> Mat<f64> {
        mat![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.5, 0.5, 0.5],
            [0.5, 0.5, 1.5f64],
        ]
    }

    /// Vertices of an icosahedron scaled to `radius`.
    fn icosahedron(radius: f64) -> Mat<f64> {
        let phi = (1.0 + 5.0f64.sqrt()) / 2.0;
        let raw = [
            [-1.0, phi, 0.0],
            [1.0, phi, 0.0],
            [-1.0, -phi, 0.0],
            [1.0, -phi, 0.0],
            [0.0, -1.0, phi],
            [0.0, 1.0, phi],
            [0.0, -1.0, -phi],
            [0.0, 1.0, -phi],
            [phi, 0.0, -1.0],
            [phi, 0.0, 1.0],
            [-phi, 0.0, -1.0],
            [-phi, 0.0, 1.0],
        ];
        let scale = radius / (1.0 + phi * phi).sqrt();
        Mat::from_fn(12, 3, |i, j| raw[i][j] * scale)
    }

    fn abc_interpolator() -> DfiInterpolator {
        let points = ten_points();
        let fields = FieldTestFunctions::abc_flow(&points, 1.0, 0.7, 0.4);
        DfiInterpolator::fit(&points, &fields, 2.0).unwrap()
    }

    fn assert_vec3_close(a: [f64; 3], b: [f64; 3], tol: f64) {
        for k in 0..3 {
            assert!((a[k] - b[k]).abs() <= tol, "component {k}: {} vs {}", a[k], b[k]);
        }
    }

    #[test]
    fn single_sample_reproduces_field_and_decays() {
        let points = mat![[0.0, 0.0, 0.0f64]];
        let fields = mat![[1.0, 0.0, 0.0f64]];

        let dfi = DfiInterpolator::fit(&points, &fields, 1.0).unwrap();

        // A = 4 epsilon I, so the single weight is field / 4.
        assert_eq!(dfi.weights(), &mat![[0.25, 0.0, 0.0f64]]);
        assert_eq!(dfi.evaluate_point([0.0, 0.0, 0.0]), [1.0, 0.0, 0.0]);

        let far = dfi.evaluate_point([10.0, 0.0, 0.0]);
        assert!(far.iter().all(|v| v.abs() < 1e-40));
    }

    #[test]
    fn far_field_evaluation_is_zero_not_nan() {
        let points = mat![[0.0, 0.0, 0.0f64]];
        let fields = mat![[1.0, 0.0, 0.0f64]];

        let dfi = DfiInterpolator::fit(&points, &fields, 1.0).unwrap();

        let p = [1e155, 0.0, 0.0];
        assert_eq!(dfi.evaluate_point(p), [0.0, 0.0, 0.0]);
        assert_eq!(dfi.jacobian(p), [[0.0; 3]; 3]);
        assert_eq!(dfi.divergence(p), 0.0);
    }

    #[test]
    fn widely_separated_samples_decouple() {
        let points = mat![[0.0, 0.0, 0.0], [1e155, 1e155, 0.0f64]];
        let fields = mat![[1.0, 0.0, 0.0], [0.0, 2.0, -1.0f64]];

        let dfi = DfiInterpolator::fit(&points, &fields, 1.0).unwrap();

        // The system is block diagonal 4 epsilon I.
        assert_eq!(dfi.weights(), &mat![[0.25, 0.0, 0.0], [0.0, 0.5, -0.25f64]]);
        assert_eq!(dfi.evaluate_point([0.0, 0.0, 0.0]), [1.0, 0.0, 0.0]);
        assert_eq!(dfi.evaluate_point([1e155, 1e155, 0.0]), [0.0, 2.0, -1.0]);
    }

    #[test]
    fn uniform_field_is_reproduced_at_samples() {
        let points = ten_points();
        let fields = FieldTestFunctions::uniform(&points, [0.3, -1.2, 2.0]);

        let dfi = DfiInterpolator::fit(&points, &fields, 2.0).unwrap();

        assert!(dfi.max_fit_residual() < 1e-8);
    }

    #[test]
    fn ten_samples_are_interpolated_exactly() {
        let dfi = abc_interpolator();
        let fitted = dfi.evaluate_at_source();

        for i in 0..dfi.num_points() {
            for k in 0..3 {
                assert!((fitted[(i, k)] - dfi.fields()[(i, k)]).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn dipole_on_a_sphere_is_interpolated_exactly() {
        let points = icosahedron(3.0);
        let fields = FieldTestFunctions::dipole(&points, [0.0, 0.0, 1.0]);

        let dfi = DfiInterpolator::fit(&points, &fields, 0.2).unwrap();

        // |B| ~ 1 / 27 on this sphere.
        assert!(dfi.max_fit_residual() < 1e-10);
    }

    #[test]
    fn two_samples_are_interpolated_exactly() {
        let points = mat![[0.0, 0.0, 0.0], [0.6, 0.2, -0.3f64]];
        let fields = mat![[1.0, 0.5, -0.25], [0.0, 2.0, 1.0f64]];

        let dfi = DfiInterpolator::fit(&points, &fields, 1.5).unwrap();

        assert!(dfi.max_fit_residual() < 1e-10);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let dfi = abc_interpolator();
        let p = [0.25, 0.8, 0.4];

        let first = dfi.evaluate_point(p);
        let second = dfi.evaluate_point(p);

        assert_eq!(first, second);
    }

    #[test]
    fn batch_evaluation_matches_point_evaluation() {
        let dfi = abc_interpolator();
        let targets = mat![[0.1, 0.2, 0.3], [0.9, -0.4, 1.2], [2.0, 2.0, 2.0f64]];

        let batch = dfi.evaluate(&targets);

        for i in 0..targets.nrows() {
            let single = dfi.evaluate_point([targets[(i, 0)], targets[(i, 1)], targets[(i, 2)]]);
            for k in 0..3 {
                assert_eq!(batch[(i, k)], single[k]);
            }
        }
    }

    #[test]
    fn duplicate_points_are_reported() {
        let points = mat![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0f64]];
        let fields = mat![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0f64]];

        let result = DfiInterpolator::fit(&points, &fields, 1.0);

        assert_eq!(
            result.err(),
            Some(DfiError::DuplicatePoints {
                first: 0,
                second: 2
            })
        );
    }

    #[test]
    fn duplicate_points_fail_factorisation_without_unique_test() {
        let points = mat![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0f64]];
        let fields = mat![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0f64]];
        let settings = InterpolantSettings::builder(1.0).build();

        let result = DfiInterpolator::builder(points, fields, settings)
            .params(Params::builder().test_unique(false).build())
            .build();

        assert!(matches!(result, Err(DfiError::NotPositiveDefinite { .. })));
    }

    #[test]
    fn nugget_regularises_duplicate_points() {
        let points = mat![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0f64]];
        let fields = mat![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0f64]];
        let settings = InterpolantSettings::builder(1.0).nugget(1e-3).build();

        let dfi = DfiInterpolator::builder(points, fields, settings)
            .params(Params::builder().test_unique(false).build())
            .build()
            .unwrap();

        let residual = dfi.max_fit_residual();
        assert!(residual > 0.0 && residual < 1e-2);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let points = ten_points();
        let fields = FieldTestFunctions::uniform(&points, [1.0, 0.0, 0.0]);

        assert_eq!(
            DfiInterpolator::fit(&Mat::zeros(0, 3), &Mat::zeros(0, 3), 1.0).err(),
            Some(DfiError::EmptySamples)
        );
        assert_eq!(
            DfiInterpolator::fit(&points, &Mat::zeros(9, 3), 1.0).err(),
            Some(DfiError::LengthMismatch {
                points: 10,
                fields: 9
            })
        );
        assert_eq!(
            DfiInterpolator::fit(&Mat::zeros(10, 2), &fields, 1.0).err(),
            Some(DfiError::DimensionMismatch {
                name: "points",
                found: 2
            })
        );
        assert_eq!(
            DfiInterpolator::fit(&points, &fields, 0.0).err(),
            Some(DfiError::InvalidEpsilon(0.0))
        );
        assert_eq!(
            DfiInterpolator::fit(&points, &fields, -1.0).err(),
            Some(DfiError::InvalidEpsilon(-1.0))
        );

        let negative_nugget = InterpolantSettings::builder(1.0).nugget(-1e-6).build();
        assert_eq!(
            DfiInterpolator::builder(points.clone(), fields.clone(), negative_nugget)
                .build()
                .err(),
            Some(DfiError::InvalidNugget(-1e-6))
        );

        let mut bad_fields = fields.clone();
        bad_fields[(4, 1)] = f64::NAN;
        assert_eq!(
            DfiInterpolator::fit(&points, &bad_fields, 1.0).err(),
            Some(DfiError::NonFiniteInput {
                name: "fields",
                row: 4
            })
        );
    }

    #[test]
    fn divergence_vanishes_away_from_samples() {
        let dfi = abc_interpolator();

        for p in [[0.3, 0.3, 0.3], [1.4, -0.2, 0.9], [0.5, 0.5, 2.5]] {
            assert!(dfi.divergence(p).abs() < 1e-9, "divergence at {p:?}");
        }
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let dfi = abc_interpolator();
        let p = [0.35, 0.6, 0.75];
        let h = 1e-6;

        let jac = dfi.jacobian(p);

        for k in 0..3 {
            let mut plus = p;
            let mut minus = p;
            plus[k] += h;
            minus[k] -= h;
            let sp = dfi.evaluate_point(plus);
            let sm = dfi.evaluate_point(minus);
            for i in 0..3 {
                let fd = (sp[i] - sm[i]) / (2.0 * h);
                assert!((jac[i][k] - fd).abs() < 1e-5, "J[{i}][{k}]: {} vs {fd}", jac[i][k]);
            }
        }
    }

    #[test]
    fn curl_uses_antisymmetric_part_of_jacobian() {
        let dfi = abc_interpolator();
        let p = [0.2, 0.4, 0.6];

        let jac = dfi.jacobian(p);
        let curl = dfi.curl(p);

        assert_vec3_close(
            curl,
            [
                jac[2][1] - jac[1][2],
                jac[0][2] - jac[2][0],
                jac[1][0] - jac[0][1],
            ],
            0.0,
        );
    }

    #[test]
    fn interpolator_is_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DfiInterpolator>();

        let dfi = abc_interpolator();
        let queries = [[0.1, 0.2, 0.3], [0.7, 0.7, 0.1], [1.5, 0.5, -0.5], [0.0, 0.9, 0.4]];
        let expected: Vec<[f64; 3]> = queries.iter().map(|q| dfi.evaluate_point(*q)).collect();

        let shared = &dfi;
        std::thread::scope(|scope| {
            let handles: Vec<_> = queries
                .iter()
                .map(|q| scope.spawn(move || shared.evaluate_point(*q)))
                .collect();

            for (handle, want) in handles.into_iter().zip(expected.iter()) {
                assert_eq!(handle.join().unwrap(), *want);
            }
        });
    }

    #[test]
    fn progress_events_are_emitted_during_fit() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&received);

        let (sink, handle) = closure_sink(16, move |msg| store.lock().unwrap().push(msg));

        let points = ten_points();
        let fields = FieldTestFunctions::uniform(&points, [0.0, 1.0, 0.0]);
        let settings = InterpolantSettings::builder(2.0).build();

        let dfi = DfiInterpolator::builder(points, fields, settings)
            .progress_callback(sink)
            .build()
            .unwrap();

        drop(dfi);
        handle.join().unwrap();

        let messages = received.lock().unwrap();
        assert!(matches!(
            messages[0],
            ProgressMsg::SystemAssembled { num_points: 10, .. }
        ));
        assert!(matches!(messages[1], ProgressMsg::Factorised { .. }));
        assert!(matches!(messages[2], ProgressMsg::Message { .. }));
    }

    #[test]
    fn model_round_trips_through_json() {
        let dfi = abc_interpolator();
        let path = std::env::temp_dir().join(format!("dfi_rbf_model_{}.json", std::process::id()));

        dfi.save_model(&path).unwrap();
        let loaded = DfiInterpolator::load_model(&path, None).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.points(), dfi.points());
        assert_eq!(loaded.weights(), dfi.weights());
        assert_eq!(loaded.interpolant_settings(), dfi.interpolant_settings());

        let p = [0.45, 0.15, 0.95];
        assert_eq!(loaded.evaluate_point(p), dfi.evaluate_point(p));
    }

    #[test]
    fn loading_rejects_foreign_and_inconsistent_files() {
        let dir = std::env::temp_dir();
        let pid = std::process::id();

        let settings = r#""interpolant_settings": {"epsilon": 1.0, "nugget": 0.0},
            "params": {"test_unique": true, "duplicate_tolerance": 1e-10,
                       "pivot_tolerance": 1e-13, "parallel_assembly": true}"#;

        let wrong_format = dir.join(format!("dfi_rbf_wrong_format_{pid}.json"));
        std::fs::write(
            &wrong_format,
            format!(
                r#"{{"format": "other.json", "version": 1, {settings},
                    "points": [[0,0,0]], "fields": [[1,0,0]], "weights": [[0.25,0,0]]}}"#
            ),
        )
        .unwrap();

        let wrong_version = dir.join(format!("dfi_rbf_wrong_version_{pid}.json"));
        std::fs::write(
            &wrong_version,
            format!(
                r#"{{"format": "dfi_rbf.json", "version": 2, {settings},
                    "points": [[0,0,0]], "fields": [[1,0,0]], "weights": [[0.25,0,0]]}}"#
            ),
        )
        .unwrap();

        let short_weights = dir.join(format!("dfi_rbf_short_weights_{pid}.json"));
        std::fs::write(
            &short_weights,
            format!(
                r#"{{"format": "dfi_rbf.json", "version": 1, {settings},
                    "points": [[0,0,0], [1,0,0]], "fields": [[1,0,0], [0,1,0]],
                    "weights": [[0.25,0,0]]}}"#
            ),
        )
        .unwrap();

        let format_result = DfiInterpolator::load_model(&wrong_format, None);
        let version_result = DfiInterpolator::load_model(&wrong_version, None);
        let weights_result = DfiInterpolator::load_model(&short_weights, None);

        for path in [&wrong_format, &wrong_version, &short_weights] {
            std::fs::remove_file(path).ok();
        }

        assert!(matches!(format_result, Err(ModelIOError::FormatMismatch { .. })));
        assert!(matches!(
            version_result,
            Err(ModelIOError::VersionMismatch { found: 2, .. })
        ));
        assert!(matches!(weights_result, Err(ModelIOError::Inconsistent { .. })));

        assert!(matches!(
            DfiInterpolator::load_model(dir.join(format!("dfi_rbf_missing_{pid}.json")), None),
            Err(ModelIOError::Open { .. })
        ));
    }
}
