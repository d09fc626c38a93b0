/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the scalar Gaussian RBF and the matrix-valued divergence-free kernel built from it.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{utils::Block3, KernelFromParams, KernelParams, MatrixKernelFunction};

/// Gaussian RBF kernel with `psi(r) = exp(-epsilon r^2)`.
#[derive(Clone, Debug, Copy)]
pub struct GaussianRbfKernel {
    pub epsilon: f64,
}

impl GaussianRbfKernel {
    #[inline(always)]
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    #[inline(always)]
    pub fn eval_r2(&self, r2: f64) -> f64 {
        (-self.epsilon * r2).exp()
    }
}

impl KernelFromParams for GaussianRbfKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        GaussianRbfKernel::new(p.epsilon)
    }
}

/// Divergence-free matrix-valued kernel
/// `Phi = (grad grad^T - laplacian I) psi` for the Gaussian `psi`.
///
/// Written out for the displacement `d = (x, y, z)`:
///
/// ```text
/// Phi_00 = (f - g (y^2 + z^2)) psi     Phi_01 = g x y psi
/// Phi_11 = (f - g (x^2 + z^2)) psi     Phi_02 = g x z psi
/// Phi_22 = (f - g (x^2 + y^2)) psi     Phi_12 = g y z psi
/// ```
///
/// with `f = 4 epsilon` and `g = 4 epsilon^2`. Every column of `Phi` is
/// divergence free, and `Phi(d) == Phi(-d)` is symmetric, so the assembled
/// interpolation matrix is symmetric as well.
#[derive(Clone, Debug, Copy)]
pub struct DivFreeGaussianKernel {
    scalar: GaussianRbfKernel,

    // derived (computed once)
    f: f64, // 4 eps
    g: f64, // 4 eps^2
}

impl DivFreeGaussianKernel {
    #[inline(always)]
    pub fn new(epsilon: f64) -> Self {
        let f = 4.0 * epsilon;
        Self {
            scalar: GaussianRbfKernel::new(epsilon),
            f,
            g: f * epsilon,
        }
    }

    /// Shape parameter of the underlying scalar Gaussian.
    #[inline(always)]
    pub fn epsilon(&self) -> f64 {
        self.scalar.epsilon
    }

    /// Jacobian of `Phi(d) c` with respect to the target position,
    /// `J[i][k] = d (Phi c)_i / d x_k`.
    ///
    /// Using `Phi = [(f - g r^2) I + g d d^T] psi`:
    ///
    /// ```text
    /// J_ik = psi [ -2 (g + eps (f - g r^2)) d_k c_i
    ///              + g (delta_ik (d.c) + d_i c_k - 2 eps d_i d_k (d.c)) ]
    /// ```
    ///
    /// The trace of `J` vanishes identically.
    #[inline(always)]
    pub fn jacobian_times(&self, d: &[f64; 3], c: &[f64; 3]) -> Block3 {
        let eps = self.scalar.epsilon;
        let r2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
        let psi = self.scalar.eval_r2(r2);
        if psi == 0.0 {
            return [[0.0; 3]; 3];
        }
        let d_dot_c = d[0] * c[0] + d[1] * c[1] + d[2] * c[2];
        let radial = -2.0 * (self.g + eps * (self.f - self.g * r2));

        let mut jac = [[0.0; 3]; 3];
        for i in 0..3 {
            for k in 0..3 {
                let delta = if i == k { d_dot_c } else { 0.0 };
                jac[i][k] = psi
                    * (radial * d[k] * c[i]
                        + self.g * (delta + d[i] * c[k] - 2.0 * eps * d[i] * d[k] * d_dot_c));
            }
        }
        jac
    }
}

impl MatrixKernelFunction for DivFreeGaussianKernel {
    #[inline(always)]
    fn block(&self, d: &[f64; 3]) -> Block3 {
        let (x, y, z) = (d[0], d[1], d[2]);
        let (x2, y2, z2) = (x * x, y * y, z * z);
        let psi = self.scalar.eval_r2(x2 + y2 + z2);
        // Far field: r^2 may overflow, and inf * 0 would give NaN
        if psi == 0.0 {
            return [[0.0; 3]; 3];
        }

        let (f, g) = (self.f, self.g);
        let xy = g * x * y * psi;
        let xz = g * x * z * psi;
        let yz = g * y * z * psi;

        [
            [(f - g * (y2 + z2)) * psi, xy, xz],
            [xy, (f - g * (x2 + z2)) * psi, yz],
            [xz, yz, (f - g * (x2 + y2)) * psi],
        ]
    }
}

impl KernelFromParams for DivFreeGaussianKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        DivFreeGaussianKernel::new(p.epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat3_vec3_mul;
    use faer::mat;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_vec3(rng: &mut StdRng) -> [f64; 3] {
        [
            rng.random_range(-2.0..2.0),
            rng.random_range(-2.0..2.0),
            rng.random_range(-2.0..2.0),
        ]
    }

    fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    #[test]
    fn block_at_zero_displacement_is_scaled_identity() {
        let kernel = DivFreeGaussianKernel::new(0.75);
        let block = kernel.block(&[0.0, 0.0, 0.0]);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 3.0 } else { 0.0 };
                assert_eq!(block[i][j], expected);
            }
        }
    }

    #[test]
    fn block_matches_reference_values() {
        let kernel = DivFreeGaussianKernel::new(0.5);
        let block = kernel.block(&[1.0, -1.0, 2.0]);

        // f = 2, g = 1, r^2 = 6
        let psi = (-3.0f64).exp();
        let expected = [
            [(2.0 - 5.0) * psi, -psi, 2.0 * psi],
            [-psi, (2.0 - 5.0) * psi, -2.0 * psi],
            [2.0 * psi, -2.0 * psi, (2.0 - 2.0) * psi],
        ];

        for i in 0..3 {
            for j in 0..3 {
                assert!((block[i][j] - expected[i][j]).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn swapping_arguments_gives_the_same_block() {
        let mut rng = StdRng::seed_from_u64(7);
        let kernel = DivFreeGaussianKernel::new(1.3);

        for _ in 0..50 {
            let p = random_vec3(&mut rng);
            let q = random_vec3(&mut rng);
            let pq = kernel.block(&sub(&p, &q));
            let qp = kernel.block(&sub(&q, &p));
            for i in 0..3 {
                for j in 0..3 {
                    assert!((pq[i][j] - qp[i][j]).abs() <= 1e-15 * pq[i][j].abs().max(1.0));
                    assert_eq!(pq[i][j], pq[j][i]);
                }
            }
        }
    }

    #[test]
    fn row_evaluation_uses_target_minus_source() {
        let kernel = DivFreeGaussianKernel::new(2.0);
        let points = mat![[0.1, 0.2, 0.3], [-0.4, 0.5, 0.0f64]];

        let from_rows = kernel.evaluate(points.row(0), points.row(1));
        let from_disp = kernel.block(&[0.5, -0.3, 0.3]);

        for i in 0..3 {
            for j in 0..3 {
                assert!((from_rows[i][j] - from_disp[i][j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn block_matches_finite_difference_operator() {
        // Phi = (grad grad^T - laplacian I) psi, checked with central differences.
        let eps = 0.8;
        let kernel = DivFreeGaussianKernel::new(eps);
        let psi = |p: [f64; 3]| (-eps * (p[0] * p[0] + p[1] * p[1] + p[2] * p[2])).exp();
        let h = 1e-4;
        let d = [0.3, -0.6, 0.45];

        let second = |i: usize, j: usize| {
            let shifted = |si: f64, sj: f64| {
                let mut p = d;
                p[i] += si;
                p[j] += sj;
                psi(p)
            };
            (shifted(h, h) - shifted(h, -h) - shifted(-h, h) + shifted(-h, -h)) / (4.0 * h * h)
        };

        let laplacian = second(0, 0) + second(1, 1) + second(2, 2);
        let block = kernel.block(&d);

        for i in 0..3 {
            for j in 0..3 {
                let mut expected = second(i, j);
                if i == j {
                    expected -= laplacian;
                }
                assert!(
                    (block[i][j] - expected).abs() < 1e-6,
                    "entry ({i}, {j}): {} vs {}",
                    block[i][j],
                    expected
                );
            }
        }
    }

    #[test]
    fn jacobian_matches_finite_differences_and_is_trace_free() {
        let mut rng = StdRng::seed_from_u64(11);
        let kernel = DivFreeGaussianKernel::new(1.1);
        let h = 1e-6;

        for _ in 0..20 {
            let d = random_vec3(&mut rng);
            let c = random_vec3(&mut rng);
            let jac = kernel.jacobian_times(&d, &c);

            for k in 0..3 {
                let mut plus = d;
                let mut minus = d;
                plus[k] += h;
                minus[k] -= h;
                let sp = mat3_vec3_mul(&kernel.block(&plus), &c);
                let sm = mat3_vec3_mul(&kernel.block(&minus), &c);
                for i in 0..3 {
                    let fd = (sp[i] - sm[i]) / (2.0 * h);
                    assert!((jac[i][k] - fd).abs() < 1e-6);
                }
            }

            let trace = jac[0][0] + jac[1][1] + jac[2][2];
            assert!(trace.abs() < 1e-10);
        }
    }

    #[test]
    fn block_decays_with_distance() {
        let params = KernelParams::builder().epsilon(1.0).build();
        let kernel = DivFreeGaussianKernel::from_params(&params);
        let far = kernel.block(&[10.0, 0.0, 0.0]);
        assert!(far.iter().flatten().all(|v| v.abs() < 1e-40));
    }

    #[test]
    fn overflowing_displacement_gives_zero_block_and_jacobian() {
        let kernel = DivFreeGaussianKernel::new(1.0);
        let c = [1.0, -2.0, 0.5];

        for d in [[1e155, 0.0, 0.0], [1e155, 1e155, 0.0], [0.0, -3e200, 1e160]] {
            let block = kernel.block(&d);
            let jac = kernel.jacobian_times(&d, &c);
            assert!(block.iter().flatten().all(|v| *v == 0.0), "block at {d:?}: {block:?}");
            assert!(jac.iter().flatten().all(|v| *v == 0.0), "jacobian at {d:?}: {jac:?}");
        }
    }
}
