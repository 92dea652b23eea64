//! Module for Adam optimizer.

use alloc::vec::Vec;

use slog::Logger;

use crate::errors::{check_dimension, Result, RusgoError};
use crate::optimizable::Optimizable;
use crate::optimizers::{check_inputs, Step, UpdateRule};
use crate::schedule::AnnealingSchedule;
use crate::vector::SparseVector;

/// ADAM with a decaying first-moment rate.
///
/// `b1` and `b2` are the weights given to the newest gradient. The first-moment weight of epoch
/// `t` is `b1t = 1 - (1 - b1) * lambda^(t - 1)`:
///
/// ```text
/// m = b1t * g + (1 - b1t) * m
/// v = b2 * g^2 + (1 - b2) * v
/// w -= alpha * m / (1 - (1 - b1)^t) / (sqrt(v / (1 - (1 - b2)^t)) + epsilon)
/// ```
///
/// The regularization vector is added to the gradient before the moments are updated.
#[derive(Clone, Debug)]
pub struct Adam {
    alpha: f64,
    b1: f64,
    b2: f64,
    lambda: f64,
    epsilon: f64,

    m: Vec<f64>,
    v: Vec<f64>,
    b1t_decay: f64,
}

impl Adam {
    /// Creates a new ADAM rule with `alpha = 0.001`, `b1 = 0.1`, `b2 = 0.001`,
    /// `lambda = 1 - 1e-8` and `epsilon = 1e-8`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alpha: 0.001,
            b1: 0.1,
            b2: 0.001,
            lambda: 1.0 - 1e-8,
            epsilon: 1e-8,
            m: vec![],
            v: vec![],
            b1t_decay: 0.9,
        }
    }

    /// Sets the step size.
    ///
    /// # Errors
    ///
    /// `alpha` must be finite and greater than 0.0.
    pub fn alpha(mut self, alpha: f64) -> Result<Self> {
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(RusgoError::invalid_argument(
                "alpha must be finite and greater than 0.0",
            ));
        }
        self.alpha = alpha;
        Ok(self)
    }

    /// Sets the first-moment weight.
    ///
    /// # Errors
    ///
    /// `b1` must be in (0, 1].
    pub fn b1(mut self, b1: f64) -> Result<Self> {
        if !(b1 > 0.0 && b1 <= 1.0) {
            return Err(RusgoError::invalid_argument("b1 must be in (0, 1]"));
        }
        self.b1 = b1;
        self.b1t_decay = 1.0 - b1;
        Ok(self)
    }

    /// Sets the second-moment weight.
    ///
    /// # Errors
    ///
    /// `b2` must be in (0, 1].
    pub fn b2(mut self, b2: f64) -> Result<Self> {
        if !(b2 > 0.0 && b2 <= 1.0) {
            return Err(RusgoError::invalid_argument("b2 must be in (0, 1]"));
        }
        self.b2 = b2;
        Ok(self)
    }

    /// Sets the decay of the first-moment weight.
    ///
    /// # Errors
    ///
    /// `lambda` must be in (0, 1).
    pub fn lambda(mut self, lambda: f64) -> Result<Self> {
        if !(lambda > 0.0 && lambda < 1.0) {
            return Err(RusgoError::invalid_argument("lambda must be in (0, 1)"));
        }
        self.lambda = lambda;
        Ok(self)
    }

    /// Sets the denominator offset.
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

    /// Bias-corrected first and second moments of `index` as of `epoch`.
    ///
    /// # Panics
    ///
    /// `epoch` must be at least 1 and `index` less than the dimension.
    #[must_use]
    pub fn corrected_moments(&self, index: usize, epoch: u64) -> (f64, f64) {
        assert!(epoch != 0);
        let t = epoch as f64;
        let m_hat = self.m[index] / (1.0 - (1.0 - self.b1).powf(t));
        let v_hat = self.v[index] / (1.0 - (1.0 - self.b2).powf(t));
        (m_hat, v_hat)
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateRule for Adam {
    fn name(&self) -> &'static str {
        "ADAM"
    }

    fn initialize(
        &mut self,
        dimension: usize,
        _schedule: &dyn AnnealingSchedule,
        _logger: &Logger,
    ) -> Result<()> {
        self.m = vec![0.0; dimension];
        self.v = vec![0.0; dimension];
        self.b1t_decay = 1.0 - self.b1;
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
        check_dimension("moment", self.m.len(), gradient.dimension())?;

        let g = gradient.plus(regularization);
        let b1t = 1.0 - self.b1t_decay;
        let t = step.epoch().max(1) as f64;
        let m_correction = 1.0 - (1.0 - self.b1).powf(t);
        let v_correction = 1.0 - (1.0 - self.b2).powf(t);

        let mut parameters = model.parameters().clone();
        for (i, (m, v)) in self.m.iter_mut().zip(&mut self.v).enumerate() {
            let gi = g.get(i);
            *m = b1t.mul_add(gi, (1.0 - b1t) * *m);
            *v = self.b2.mul_add(gi * gi, (1.0 - self.b2) * *v);
            if *m == 0.0 {
                continue;
            }
            let m_hat = *m / m_correction;
            let v_hat = *v / v_correction;
            let delta = -self.alpha * m_hat / (v_hat.sqrt() + self.epsilon);
            parameters.add_to(i, delta);
        }
        self.b1t_decay *= self.lambda;

        model.set_parameters(parameters);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::schedule::ConstantSchedule;
    use crate::test_utils::{discard_logger, ConstantGradientModel, ScriptedModel};

    fn run_constant_gradient(adam: &mut Adam, g: f64, n_steps: u64) -> ConstantGradientModel {
        let schedule = ConstantSchedule::new(1.0).unwrap();
        let logger = discard_logger();
        adam.initialize(2, &schedule, &logger).unwrap();
        let mut model = ConstantGradientModel::new(&[0.0, 0.0], &[g, 0.0]);
        for epoch in 1..=n_steps {
            let step = Step::new(epoch, &schedule, &logger);
            let gradient = model.gradient();
            adam.update_model(&step, &mut model, &gradient, &SparseVector::new(2))
                .unwrap();
        }
        model
    }

    #[test]
    fn test_invalid_hyperparameters() {
        assert!(Adam::new().alpha(0.0).is_err());
        assert!(Adam::new().b1(0.0).is_err());
        assert!(Adam::new().b1(1.5).is_err());
        assert!(Adam::new().b1(1.0).is_ok());
        assert!(Adam::new().b2(0.0).is_err());
        assert!(Adam::new().lambda(1.0).is_err());
        assert!(Adam::new().lambda(0.0).is_err());
        assert!(Adam::new().epsilon(0.0).is_err());
        assert!(Adam::new().epsilon(f64::NAN).is_err());
    }

    #[test]
    fn test_first_step() {
        let mut adam = Adam::new().alpha(0.1).unwrap().epsilon(1e-12).unwrap();
        let model = run_constant_gradient(&mut adam, 2.0, 1);
        // m_hat = g and v_hat = g^2 after the first step
        let (m_hat, v_hat) = adam.corrected_moments(0, 1);
        assert!((m_hat - 2.0).abs() < 1e-9);
        assert!((v_hat - 4.0).abs() < 1e-9);
        assert!((model.parameters().get(0) + 0.1).abs() < 1e-9);
        assert_eq!(0.0, model.parameters().get(1));
    }

    #[test]
    fn test_bias_correction_converges() {
        let mut adam = Adam::new()
            .b1(0.3)
            .unwrap()
            .b2(0.2)
            .unwrap()
            .lambda(0.999)
            .unwrap();
        run_constant_gradient(&mut adam, -0.5, 200);
        let (m_hat, v_hat) = adam.corrected_moments(0, 200);
        assert!((m_hat + 0.5).abs() < 1e-6);
        assert!((v_hat - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_first_moment_weight_decays() {
        let mut adam = Adam::new().b1(0.5).unwrap().lambda(0.5).unwrap();
        let schedule = ConstantSchedule::new(1.0).unwrap();
        let logger = discard_logger();
        adam.initialize(1, &schedule, &logger).unwrap();
        let mut model = ScriptedModel::new(&[0.0], &[&[2.0], &[-1.0], &[4.0]]);

        // b1t = 0.5, 0.75, 0.875
        // m = 1.0, -0.5, 3.4375
        let expected = [2.0, -0.5 / 0.75, 3.4375 / 0.875];
        for (epoch, m_hat) in (1..).zip(expected) {
            let step = Step::new(epoch, &schedule, &logger);
            let gradient = model.gradient();
            adam.update_model(&step, &mut model, &gradient, &SparseVector::new(1))
                .unwrap();
            assert!((adam.corrected_moments(0, epoch).0 - m_hat).abs() < 1e-12);
        }
    }

    #[test]
    fn test_regularization_joins_gradient() {
        let mut adam = Adam::new().alpha(0.1).unwrap().epsilon(1e-12).unwrap();
        let schedule = ConstantSchedule::new(1.0).unwrap();
        let logger = discard_logger();
        adam.initialize(3, &schedule, &logger).unwrap();
        let mut model = ConstantGradientModel::new(&[1.0, 1.0, 1.0], &[0.0, 0.0, 2.0]);
        let mut regularization = SparseVector::new(3);
        regularization.set(0, 0.5);
        regularization.set(2, -2.0);

        let step = Step::new(1, &schedule, &logger);
        let gradient = model.gradient();
        adam.update_model(&step, &mut model, &gradient, &regularization)
            .unwrap();

        assert!((adam.corrected_moments(0, 1).0 - 0.5).abs() < 1e-12);
        assert!((model.parameters().get(0) - 0.9).abs() < 1e-9);
        assert_eq!(1.0, model.parameters().get(1));
        // the regularization cancels the gradient
        assert_eq!(0.0, adam.corrected_moments(2, 1).0);
        assert_eq!(1.0, model.parameters().get(2));
    }

    #[test]
    fn test_moves_against_gradient() {
        let mut adam = Adam::new().alpha(0.01).unwrap();
        let model = run_constant_gradient(&mut adam, -3.0, 10);
        assert!(model.parameters().get(0) > 0.0);
    }
}
