//! Module for online L-BFGS optimizer.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use argmin_math::{ArgminDot, ArgminMul, ArgminScaledAdd};
use slog::Logger;

use crate::errors::{check_dimension, Result, RusgoError};
use crate::math;
use crate::optimizable::Optimizable;
use crate::optimizers::{check_inputs, Step, UpdateRule};
use crate::schedule::AnnealingSchedule;
use crate::vector::SparseVector;

#[derive(Clone, Debug)]
struct CurvaturePair {
    s: Vec<f64>,
    y: Vec<f64>,
    sy: f64,
    yy: f64,
}

/// Online limited-memory BFGS.
///
/// Keeps the `bandwidth` most recent `(s, y)` curvature pairs in insertion order and computes the
/// search direction with the two-loop recursion. The initial scaling is the mean of
/// `(s^T y) / (y^T y)` over the history, or `epsilon` while the history is empty.
///
/// The step is `s = learning_rate * p` and `y = g(w + s) - g(w) + lambda * s`.
#[derive(Clone, Debug)]
pub struct Lbfgs {
    bandwidth: usize,
    lambda: f64,
    epsilon: f64,

    dimension: usize,
    history: VecDeque<CurvaturePair>,
}

impl Lbfgs {
    /// Creates a new L-BFGS rule with `bandwidth = 10`, `lambda = 0.0` and `epsilon = 1e-10`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bandwidth: 10,
            lambda: 0.0,
            epsilon: 1e-10,
            dimension: 0,
            history: VecDeque::new(),
        }
    }

    /// Sets the number of curvature pairs to keep.
    ///
    /// # Errors
    ///
    /// `bandwidth` must be at least 1.
    pub fn bandwidth(mut self, bandwidth: usize) -> Result<Self> {
        if bandwidth == 0 {
            return Err(RusgoError::invalid_argument("bandwidth must be at least 1"));
        }
        self.bandwidth = bandwidth;
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

    /// Sets the scaling used while no curvature pair is known.
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

    /// Number of curvature pairs currently kept.
    #[inline(always)]
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Adds a curvature pair, evicting the oldest one when the history is full.
    ///
    /// Returns `false` and keeps the history unchanged if `s^T y` or `y^T y` is zero or not
    /// finite.
    ///
    /// # Errors
    ///
    /// `s` and `y` must have the dimension of the optimizer.
    pub fn push_curvature_pair(&mut self, s: Vec<f64>, y: Vec<f64>) -> Result<bool> {
        check_dimension("s", self.dimension, s.len())?;
        check_dimension("y", self.dimension, y.len())?;
        let sy: f64 = s.dot(&y);
        let yy: f64 = y.dot(&y);
        if !(math::is_finite_nonzero(sy) && math::is_finite_nonzero(yy)) {
            return Ok(false);
        }
        if self.history.len() == self.bandwidth {
            self.history.pop_front();
        }
        self.history.push_back(CurvaturePair { s, y, sy, yy });
        Ok(true)
    }

    /// Search direction `p = -H g` for `gradient` by the two-loop recursion.
    ///
    /// # Errors
    ///
    /// `gradient` must have the dimension of the optimizer.
    pub fn search_direction(&self, gradient: &[f64]) -> Result<Vec<f64>> {
        check_dimension("gradient", self.dimension, gradient.len())?;
        let mut p: Vec<f64> = gradient.iter().map(|g| -g).collect();

        let mut alphas = Vec::with_capacity(self.history.len());
        for pair in self.history.iter().rev() {
            let sp: f64 = pair.s.dot(&p);
            let alpha = sp / pair.sy;
            p = p.scaled_add(&-alpha, &pair.y);
            alphas.push(alpha);
        }

        let scale = if self.history.is_empty() {
            self.epsilon
        } else {
            let total: f64 = self.history.iter().map(|pair| pair.sy / pair.yy).sum();
            total / self.history.len() as f64
        };
        p = p.mul(&scale);

        for (pair, alpha) in self.history.iter().zip(alphas.into_iter().rev()) {
            let yp: f64 = pair.y.dot(&p);
            let beta = yp / pair.sy;
            p = p.scaled_add(&(alpha - beta), &pair.s);
        }
        Ok(p)
    }
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateRule for Lbfgs {
    fn name(&self) -> &'static str {
        "L-BFGS"
    }

    fn initialize(
        &mut self,
        dimension: usize,
        _schedule: &dyn AnnealingSchedule,
        _logger: &Logger,
    ) -> Result<()> {
        self.dimension = dimension;
        self.history.clear();
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

        let g = gradient.plus(regularization).to_dense();
        let direction = self.search_direction(&g)?;
        let s: Vec<f64> = direction
            .iter()
            .enumerate()
            .map(|(i, &p)| step.learning_rate(i) * p)
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
        let y_raw = trial_gradient.minus(gradient).to_dense();
        let y: Vec<f64> = y_raw.scaled_add(&self.lambda, &s);

        if !self.push_curvature_pair(s, y)? {
            slog::warn!(
                step.logger(),
                "skipped degenerate curvature pair";
                "rule" => self.name(),
                "epoch" => step.epoch(),
            );
        }

        model.set_parameters(parameters);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::schedule::ConstantSchedule;
    use crate::test_utils::{discard_logger, ConstantGradientModel, QuadraticModel};

    fn initialized(lbfgs: Lbfgs, dimension: usize) -> Lbfgs {
        let mut lbfgs = lbfgs;
        let schedule = ConstantSchedule::new(1.0).unwrap();
        lbfgs
            .initialize(dimension, &schedule, &discard_logger())
            .unwrap();
        lbfgs
    }

    fn pairs() -> Vec<(Vec<f64>, Vec<f64>)> {
        vec![
            (vec![1.0, 0.0, 0.5], vec![2.0, 0.1, 1.0]),
            (vec![0.0, 1.0, -0.5], vec![0.3, 3.0, -1.0]),
            (vec![0.5, 0.5, 0.0], vec![1.5, 1.0, 0.2]),
            (vec![-1.0, 0.2, 1.0], vec![-2.0, 0.5, 4.0]),
        ]
    }

    #[test]
    fn test_invalid_hyperparameters() {
        assert!(Lbfgs::new().bandwidth(0).is_err());
        assert!(Lbfgs::new().bandwidth(1).is_ok());
        assert!(Lbfgs::new().lambda(-0.1).is_err());
        assert!(Lbfgs::new().epsilon(0.0).is_err());
    }

    #[test]
    fn test_empty_history_scales_by_epsilon() {
        let lbfgs = initialized(Lbfgs::new().epsilon(0.25).unwrap(), 2);
        assert_eq!(vec![-0.25, 0.5], lbfgs.search_direction(&[1.0, -2.0]).unwrap());
    }

    #[test]
    fn test_single_pair_satisfies_secant() {
        let mut lbfgs = initialized(Lbfgs::new(), 2);
        assert!(lbfgs
            .push_curvature_pair(vec![1.0, 2.0], vec![3.0, 1.0])
            .unwrap());
        // H y = s for the two-loop operator with one pair
        let p = lbfgs.search_direction(&[3.0, 1.0]).unwrap();
        assert!((p[0] + 1.0).abs() < 1e-12);
        assert!((p[1] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_eviction_matches_fresh_history() {
        let bandwidth = 3;
        let all = pairs();
        let gradient = [0.7, -1.3, 0.4];

        let mut evicted = initialized(Lbfgs::new().bandwidth(bandwidth).unwrap(), 3);
        for (s, y) in all.iter().cloned() {
            assert!(evicted.push_curvature_pair(s, y).unwrap());
        }
        assert_eq!(bandwidth, evicted.history_len());

        let mut fresh = initialized(Lbfgs::new().bandwidth(bandwidth).unwrap(), 3);
        for (s, y) in all.iter().skip(1).cloned() {
            fresh.push_curvature_pair(s, y).unwrap();
        }

        let mut full = initialized(Lbfgs::new().bandwidth(bandwidth + 1).unwrap(), 3);
        for (s, y) in all.iter().cloned() {
            full.push_curvature_pair(s, y).unwrap();
        }

        let p_evicted = evicted.search_direction(&gradient).unwrap();
        let p_fresh = fresh.search_direction(&gradient).unwrap();
        let p_full = full.search_direction(&gradient).unwrap();
        for i in 0..3 {
            assert!((p_evicted[i] - p_fresh[i]).abs() < 1e-12);
        }
        assert!((0..3).any(|i| (p_evicted[i] - p_full[i]).abs() > 1e-6));
    }

    #[test]
    fn test_degenerate_pair_is_rejected() {
        let mut lbfgs = initialized(Lbfgs::new(), 2);
        assert!(!lbfgs
            .push_curvature_pair(vec![1.0, 0.0], vec![0.0, 1.0])
            .unwrap());
        assert!(!lbfgs
            .push_curvature_pair(vec![1.0, 0.0], vec![0.0, 0.0])
            .unwrap());
        assert_eq!(0, lbfgs.history_len());
        assert!(lbfgs
            .push_curvature_pair(vec![1.0], vec![1.0])
            .is_err());
    }

    #[test]
    fn test_constant_gradient_keeps_history_empty() {
        let mut lbfgs = initialized(Lbfgs::new().epsilon(0.5).unwrap(), 2);
        let schedule = ConstantSchedule::new(1.0).unwrap();
        let logger = discard_logger();
        let mut model = ConstantGradientModel::new(&[1.0, 1.0], &[2.0, 0.0]);
        let step = Step::new(1, &schedule, &logger);
        let gradient = model.gradient();
        lbfgs
            .update_model(&step, &mut model, &gradient, &SparseVector::new(2))
            .unwrap();
        assert_eq!(0, lbfgs.history_len());
        assert_eq!(vec![0.0, 1.0], model.parameters().to_dense());
    }

    #[test]
    fn test_regularization_joins_gradient() {
        let mut lbfgs = initialized(Lbfgs::new().epsilon(0.5).unwrap(), 3);
        let schedule = ConstantSchedule::new(1.0).unwrap();
        let logger = discard_logger();
        let mut model = QuadraticModel::new(&[1.0, 1.0, 1.0], &[1.0, 2.0, 1.0]);
        let mut regularization = SparseVector::new(3);
        regularization.set(0, 1.0);
        regularization.set(1, -2.0);
        regularization.set(2, -1.0);

        let step = Step::new(1, &schedule, &logger);
        let gradient = model.gradient();
        lbfgs
            .update_model(&step, &mut model, &gradient, &regularization)
            .unwrap();

        // g + r = [2, 0, 0], so s = -epsilon * [2, 0, 0]
        let parameters = model.parameters().to_dense();
        assert!(parameters[0].abs() < 1e-12);
        assert_eq!(1.0, parameters[1]);
        assert_eq!(1.0, parameters[2]);

        // the stored pair is s = y = [-1, 0, 0]
        assert_eq!(1, lbfgs.history_len());
        let p = lbfgs.search_direction(&[-1.0, 0.0, 0.0]).unwrap();
        assert!((p[0] - 1.0).abs() < 1e-12);
        assert!(p[1].abs() < 1e-12);
        assert!(p[2].abs() < 1e-12);
    }

    #[test]
    fn test_converges_on_quadratic() {
        let mut lbfgs = initialized(Lbfgs::new().bandwidth(4).unwrap().epsilon(0.2).unwrap(), 2);
        let schedule = ConstantSchedule::new(1.0).unwrap();
        let logger = discard_logger();
        let mut model = QuadraticModel::new(&[1.0, 1.0], &[1.0, 4.0]);
        let initial_loss = model.loss();
        for epoch in 1..=12 {
            let step = Step::new(epoch, &schedule, &logger);
            let gradient = model.gradient();
            lbfgs
                .update_model(&step, &mut model, &gradient, &SparseVector::new(2))
                .unwrap();
        }
        assert!(model.loss() < initial_loss * 1e-8);
        assert_eq!(4, lbfgs.history_len());
    }
}
