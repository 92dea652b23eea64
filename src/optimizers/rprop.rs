//! Module for Rprop and iRprop- optimizers.

use alloc::vec::Vec;

use slog::Logger;

use crate::errors::{check_dimension, Result, RusgoError};
use crate::math;
use crate::optimizable::Optimizable;
use crate::optimizers::{check_inputs, Step, UpdateRule};
use crate::schedule::AnnealingSchedule;
use crate::vector::SparseVector;

/// Flavor of resilient backpropagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpropVariant {
    /// Classic Rprop without weight backtracking.
    Rprop,

    /// iRprop-: a sign change also suppresses this step's move of that weight.
    IRpropMinus,
}

/// Sign-based step-size adaptation.
///
/// Each weight keeps its own step. The step grows by `step_grow` while the gradient keeps its
/// sign, shrinks by `step_shrink` when it flips, and always stays in `[min_step, max_step]`.
/// Only the sign of the gradient is used to move the weight.
///
/// Initial steps are taken from the annealing schedule in epoch 1.
#[derive(Clone, Debug)]
pub struct Rprop {
    variant: RpropVariant,
    step_grow: f64,
    step_shrink: f64,
    min_step: f64,
    max_step: f64,

    steps: Vec<f64>,
    last_gradient: Vec<f64>,
}

impl Rprop {
    /// Creates a new Rprop rule with `step_grow = 1.2`, `step_shrink = 0.5`, `min_step = 1e-6`
    /// and `max_step = 50.0`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            variant: RpropVariant::Rprop,
            step_grow: 1.2,
            step_shrink: 0.5,
            min_step: 1e-6,
            max_step: 50.0,
            steps: vec![],
            last_gradient: vec![],
        }
    }

    /// Selects the variant.
    #[must_use]
    pub const fn variant(mut self, variant: RpropVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Sets the growth and shrink factors.
    ///
    /// # Errors
    ///
    /// The factors must satisfy `step_grow > 1 > step_shrink > 0`.
    pub fn factors(mut self, step_grow: f64, step_shrink: f64) -> Result<Self> {
        if !(step_grow.is_finite() && step_grow > 1.0) {
            return Err(RusgoError::invalid_argument(
                "step_grow must be finite and greater than 1.0",
            ));
        }
        if !(step_shrink > 0.0 && step_shrink < 1.0) {
            return Err(RusgoError::invalid_argument("step_shrink must be in (0, 1)"));
        }
        self.step_grow = step_grow;
        self.step_shrink = step_shrink;
        Ok(self)
    }

    /// Sets the step bounds.
    ///
    /// # Errors
    ///
    /// The bounds must satisfy `0 < min_step < max_step` and be finite.
    pub fn step_bounds(mut self, min_step: f64, max_step: f64) -> Result<Self> {
        if !(min_step > 0.0 && min_step < max_step && max_step.is_finite()) {
            return Err(RusgoError::invalid_argument(
                "step bounds must satisfy 0 < min_step < max_step",
            ));
        }
        self.min_step = min_step;
        self.max_step = max_step;
        Ok(self)
    }

    /// Current per-dimension step sizes.
    #[inline(always)]
    #[must_use]
    pub fn step_sizes(&self) -> &[f64] {
        &self.steps
    }
}

impl Default for Rprop {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateRule for Rprop {
    fn name(&self) -> &'static str {
        match self.variant {
            RpropVariant::Rprop => "Rprop",
            RpropVariant::IRpropMinus => "iRprop-",
        }
    }

    fn initialize(
        &mut self,
        dimension: usize,
        schedule: &dyn AnnealingSchedule,
        _logger: &Logger,
    ) -> Result<()> {
        self.steps = (0..dimension)
            .map(|i| {
                schedule
                    .learning_rate(1, i)
                    .clamp(self.min_step, self.max_step)
            })
            .collect();
        self.last_gradient = vec![0.0; dimension];
        Ok(())
    }

    fn update_model<M>(
        &mut self,
        _step: &Step<'_>,
        model: &mut M,
        gradient: &SparseVector,
        regularization: &SparseVector,
    ) -> Result<()>
    where
        M: Optimizable + ?Sized,
    {
        check_inputs(model.parameters(), gradient, regularization)?;
        check_dimension("step", self.steps.len(), gradient.dimension())?;

        let g = gradient.plus(regularization);
        let mut parameters = model.parameters().clone();
        for (i, (step, last)) in self.steps.iter_mut().zip(&mut self.last_gradient).enumerate() {
            let mut gi = g.get(i);
            let agreement = gi * *last;
            if agreement > 0.0 {
                *step = (*step * self.step_grow).min(self.max_step);
            } else if agreement < 0.0 {
                *step = (*step * self.step_shrink).max(self.min_step);
                if self.variant == RpropVariant::IRpropMinus {
                    gi = 0.0;
                }
            }
            if gi != 0.0 {
                parameters.add_to(i, -*step * math::sign(gi));
            }
            *last = gi;
        }
        model.set_parameters(parameters);
        Ok(())
    }
}
