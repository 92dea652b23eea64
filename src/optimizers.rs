//! Update rules plugged into the [`StochasticOptimizer`](crate::StochasticOptimizer) driver.

pub mod adam;
pub mod bfgs;
pub mod lbfgs;
pub mod rprop;
pub mod sgd;

use slog::Logger;

use crate::errors::{check_dimension, Result};
use crate::math;
use crate::optimizable::Optimizable;
use crate::schedule::AnnealingSchedule;
use crate::vector::SparseVector;

pub use adam::Adam;
pub use bfgs::Bfgs;
pub use lbfgs::Lbfgs;
pub use rprop::{Rprop, RpropVariant};
pub use sgd::Sgd;

/// Per-step context handed to an [`UpdateRule`].
pub struct Step<'a> {
    epoch: u64,
    schedule: &'a dyn AnnealingSchedule,
    logger: &'a Logger,
}

impl<'a> Step<'a> {
    /// Creates a new step context.
    #[inline(always)]
    pub fn new(epoch: u64, schedule: &'a dyn AnnealingSchedule, logger: &'a Logger) -> Self {
        Self {
            epoch,
            schedule,
            logger,
        }
    }

    /// Epoch of this step. The first update runs in epoch 1.
    #[inline(always)]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Learning rate of dimension `index` in this step.
    #[inline(always)]
    pub fn learning_rate(&self, index: usize) -> f64 {
        self.schedule.learning_rate(self.epoch, index)
    }

    /// Logger of the driving optimizer.
    #[inline(always)]
    pub const fn logger(&self) -> &Logger {
        self.logger
    }
}

/// The update math of a single optimization algorithm.
pub trait UpdateRule {
    /// Human-readable name of the algorithm.
    fn name(&self) -> &'static str;

    /// Allocates per-dimension state. Called once when the optimizer is built.
    ///
    /// # Errors
    ///
    /// Implementations may reject a dimension they cannot handle.
    fn initialize(
        &mut self,
        _dimension: usize,
        _schedule: &dyn AnnealingSchedule,
        _logger: &Logger,
    ) -> Result<()> {
        Ok(())
    }

    /// Applies one step given the model's `gradient` and the owed `regularization`.
    ///
    /// # Errors
    ///
    /// Returns an error without touching the model if a vector has the wrong dimension.
    fn update_model<M>(
        &mut self,
        step: &Step<'_>,
        model: &mut M,
        gradient: &SparseVector,
        regularization: &SparseVector,
    ) -> Result<()>
    where
        M: Optimizable + ?Sized;

    /// Applies only the owed `regularization`, as done when flushing at the end of training.
    ///
    /// Every populated entry is shrunk toward zero by `learning_rate * regularization` without
    /// crossing it.
    ///
    /// # Errors
    ///
    /// Returns an error without touching the model if a vector has the wrong dimension.
    fn update_model_with_regularization<M>(
        &mut self,
        step: &Step<'_>,
        model: &mut M,
        regularization: &SparseVector,
    ) -> Result<()>
    where
        M: Optimizable + ?Sized,
    {
        let dimension = model.parameters().dimension();
        check_dimension("regularization", dimension, regularization.dimension())?;
        if regularization.nnz() == 0 {
            return Ok(());
        }
        let mut parameters = model.parameters().clone();
        for (i, r) in regularization.iter() {
            let w = math::shrink_toward_zero(parameters.get(i), step.learning_rate(i) * r);
            parameters.set(i, w);
        }
        model.set_parameters(parameters);
        Ok(())
    }
}

/// Checks that the gradient and the regularization match the parameters.
#[inline(always)]
pub(crate) fn check_inputs(
    parameters: &SparseVector,
    gradient: &SparseVector,
    regularization: &SparseVector,
) -> Result<()> {
    check_dimension("gradient", parameters.dimension(), gradient.dimension())?;
    check_dimension(
        "regularization",
        parameters.dimension(),
        regularization.dimension(),
    )
}

/// Any of the built-in update rules, selected at run time.
pub enum Rule {
    /// Plain stochastic gradient descent.
    Sgd(Sgd),

    /// ADAM.
    Adam(Adam),

    /// Rprop or iRprop-.
    Rprop(Rprop),

    /// Online BFGS.
    Bfgs(Bfgs),

    /// Online limited-memory BFGS.
    Lbfgs(Lbfgs),
}

macro_rules! dispatch {
    ( $self:ident, $rule:ident => $e:expr ) => {
        match $self {
            Rule::Sgd($rule) => $e,
            Rule::Adam($rule) => $e,
            Rule::Rprop($rule) => $e,
            Rule::Bfgs($rule) => $e,
            Rule::Lbfgs($rule) => $e,
        }
    };
}

impl UpdateRule for Rule {
    fn name(&self) -> &'static str {
        dispatch!(self, r => r.name())
    }

    fn initialize(
        &mut self,
        dimension: usize,
        schedule: &dyn AnnealingSchedule,
        logger: &Logger,
    ) -> Result<()> {
        dispatch!(self, r => r.initialize(dimension, schedule, logger))
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
        dispatch!(self, r => r.update_model(step, model, gradient, regularization))
    }

    fn update_model_with_regularization<M>(
        &mut self,
        step: &Step<'_>,
        model: &mut M,
        regularization: &SparseVector,
    ) -> Result<()>
    where
        M: Optimizable + ?Sized,
    {
        dispatch!(self, r => r.update_model_with_regularization(step, model, regularization))
    }
}

impl From<Sgd> for Rule {
    fn from(r: Sgd) -> Self {
        Self::Sgd(r)
    }
}

impl From<Adam> for Rule {
    fn from(r: Adam) -> Self {
        Self::Adam(r)
    }
}

impl From<Rprop> for Rule {
    fn from(r: Rprop) -> Self {
        Self::Rprop(r)
    }
}

impl From<Bfgs> for Rule {
    fn from(r: Bfgs) -> Self {
        Self::Bfgs(r)
    }
}

impl From<Lbfgs> for Rule {
    fn from(r: Lbfgs) -> Self {
        Self::Lbfgs(r)
    }
}
