//! Module for online BFGS optimizer.

use alloc::vec::Vec;

use argmin_math::{ArgminDot, ArgminEye, ArgminMul};
use slog::Logger;

use crate::errors::{check_dimension, Result, RusgoError};
use crate::math;
use crate::optimizable::Optimizable;
use crate::optimizers::{check_inputs, Step, UpdateRule};
use crate::schedule::AnnealingSchedule;
use crate::vector::SparseVector;

/// Dimension above which a dense inverse Hessian is reported as a scalability risk.
const DENSE_WARN_DIMENSION: usize = 4096;

/// Online BFGS with a dense inverse-Hessian approximation.
///
/// Each step moves along `p = -B g` by `s = learning_rate / c * p`, then evaluates the model's
/// gradient at the new point to form `y = g(w + s) - g(w) + lambda * s` and applies the rank-2
/// update
///
/// ```text
/// B = (I - rho s y^T) B (I - rho y s^T) + c rho s s^T,  rho = 1 / (s^T y)
/// ```
///
/// `B` starts as `epsilon * I`. It needs `D^2` memory; use [`Lbfgs`](super::Lbfgs) for large
/// models.
#[derive(Clone, Debug)]
pub struct Bfgs {
    c: f64,
    lambda: f64,
    epsilon: f64,

    inverse_hessian: Vec<Vec<f64>>,
}

impl Bfgs {
    /// Creates a new BFGS rule with `c = 0.1`, `lambda = 0.0` and `epsilon = 1e-10`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            c: 0.1,
            lambda: 0.0,
            epsilon: 1e-10,
            inverse_hessian: Vec::new(),
        }
    }

    /// Sets the step scaling `c`.
    ///
    /// # Errors
    ///
    /// `c` must be in (0, 1].
    pub fn c(mut self, c: f64) -> Result<Self> {
        if !(c > 0.0 && c <= 1.0) {
            return Err(RusgoError::invalid_argument("c must be in (0, 1]"));
        }
        self.c = c;
        Ok(self)
    }

    /// Sets the curvature damping.
    ///
    /// # Errors
    ///
    /// `lambda` must be finite and at least 0.0.
    pub fn lambda(mut self, lambda: f64) -> Result<Self> {
        if !(lambda.is_finite() && lambda >= 0.0) {
            return Err(RusgoError::invalid_argument(
                "lambda must be finite and at least 0.0",
            ));
        }
        self.lambda = lambda;
        Ok(self)
    }

    /// Sets the initial diagonal of the inverse Hessian.
    ///
    /// # Errors
    ///
    /// `epsilon` must be finite and greater than 0.0.
    pub fn epsilon(mut self, epsilon: f64) -> Result<Self> {
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(RusgoError::invalid_argument(
                "epsilon must be finite and greater than 0.0",
            ));
        }
        self.epsilon = epsilon;
        Ok(self)
    }

    /// Current inverse-Hessian approximation, one row per dimension.
    #[inline(always)]
    #[must_use]
    pub fn inverse_hessian(&self) -> &[Vec<f64>] {
        &self.inverse_hessian
    }

    fn update_inverse_hessian(&mut self, s: &Vec<f64>, y: &Vec<f64>) -> bool {
        let sy: f64 = s.dot(y);
        if !math::is_finite_nonzero(sy) {
            return false;
        }
        let rho = 1.0 / sy;
        let hy: Vec<f64> = self.inverse_hessian.dot(y);
        let yhy: f64 = y.dot(&hy);
        let k = (rho * rho).mul_add(yhy, self.c * rho);
        for (row, (&si, &hyi)) in self.inverse_hessian.iter_mut().zip(s.iter().zip(&hy)) {
            for (h, (&sj, &hyj)) in row.iter_mut().zip(s.iter().zip(&hy)) {
                *h += (k * si).mul_add(sj, -rho * si.mul_add(hyj, hyi * sj));
            }
        }
        true
    }
}

impl Default for Bfgs {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateRule for Bfgs {
    fn name(&self) -> &'static str {
        "BFGS"
    }

    fn initialize(
        &mut self,
        dimension: usize,
        _schedule: &dyn AnnealingSchedule,
        logger: &Logger,
    ) -> Result<()> {
        if dimension > DENSE_WARN_DIMENSION {
            slog::warn!(
                logger,
                "dense inverse Hessian";
                "dimension" => dimension,
                "entries" => dimension.saturating_mul(dimension),
            );
        }
        let eye = <Vec<Vec<f64>> as ArgminEye>::eye(dimension);
        self.inverse_hessian = eye.mul(&self.epsilon);
        Ok(())
    }

    fn update_model<M>(
        &mut self,
        step: &Step<'_>,
        model: &mut M,
        gradient: &SparseVector,
        regularization: &SparseVector,
    ) -> Result<()>
    where
        M: Optimizable + ?Sized,
    {
        check_inputs(model.parameters(), gradient, regularization)?;
        check_dimension(
            "inverse Hessian",
            self.inverse_hessian.len(),
            gradient.dimension(),
        )?;

        let g = gradient.plus(regularization).to_dense();
        let direction: Vec<f64> = self.inverse_hessian.dot(&g);
        let s: Vec<f64> = direction
            .iter()
            .enumerate()
            .map(|(i, &p)| -step.learning_rate(i) / self.c * p)
            .collect();

        let mut parameters = model.parameters().clone();
        for (i, &si) in s.iter().enumerate() {
            if si != 0.0 {
                parameters.add_to(i, si);
            }
        }

        let trial_gradient = model.gradient_at(&parameters);
        check_dimension(
            "trial gradient",
            gradient.dimension(),
            trial_gradient.dimension(),
        )?;
        let mut y = trial_gradient.minus(gradient).to_dense();
        for (yi, &si) in y.iter_mut().zip(&s) {
            *yi = self.lambda.mul_add(si, *yi);
        }

        if !self.update_inverse_hessian(&s, &y) {
            slog::warn!(
                step.logger(),
                "skipped degenerate curvature update";
                "rule" => self.name(),
                "epoch" => step.epoch(),
            );
        }

        model.set_parameters(parameters);
        Ok(())
    }
}
