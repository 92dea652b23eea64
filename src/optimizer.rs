//! The driver shared by every update rule.

use alloc::boxed::Box;

use slog::Logger;

use crate::errors::{check_dimension, Result};
use crate::optimizable::Optimizable;
use crate::optimizers::{Rule, Step, UpdateRule};
use crate::regularization::Regularizer;
use crate::schedule::AnnealingSchedule;
use crate::truncation::GradientTruncation;
use crate::vector::SparseVector;

/// Which dimensions receive their owed regularization on an accepted update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegularizationPass {
    /// Only the dimensions populated in the gradient. Untouched dimensions catch up the next time
    /// they appear or at [`StochasticOptimizer::cleanup`].
    #[default]
    Lazy,

    /// Every dimension on every accepted update.
    Dense,
}

/// Result of a call to [`StochasticOptimizer::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The parameters were updated and the epoch advanced.
    Applied,

    /// The annealing schedule rejected the step's loss; only truncation ran.
    Skipped,
}

/// Stochastic gradient optimizer.
///
/// Drives an [`UpdateRule`] over an [`Optimizable`] model: it reads the loss and the gradient,
/// asks the annealing schedule whether to take the step, computes the owed regularization,
/// delegates the update and truncates the result. Call [`cleanup`](Self::cleanup) once after the
/// last update so dimensions the gradient never touched receive their regularization.
///
/// Built by [`OptimizerConfig`](crate::OptimizerConfig).
pub struct StochasticOptimizer<R = Rule> {
    dimension: usize,
    epoch: u64,
    schedule: Box<dyn AnnealingSchedule>,
    truncation: Box<dyn GradientTruncation>,
    regularizer: Regularizer,
    pass: RegularizationPass,
    rule: R,
    logger: Logger,
}

impl<R> StochasticOptimizer<R>
where
    R: UpdateRule,
{
    pub(crate) fn new(
        dimension: usize,
        schedule: Box<dyn AnnealingSchedule>,
        truncation: Box<dyn GradientTruncation>,
        regularizer: Regularizer,
        pass: RegularizationPass,
        mut rule: R,
        logger: Logger,
    ) -> Result<Self> {
        rule.initialize(dimension, schedule.as_ref(), &logger)?;
        slog::debug!(
            logger,
            "optimizer initialized";
            "rule" => rule.name(),
            "dimension" => dimension,
        );
        Ok(Self {
            dimension,
            epoch: 1,
            schedule,
            truncation,
            regularizer,
            pass,
            rule,
            logger,
        })
    }

    /// Performs one optimization step on `model`.
    ///
    /// # Errors
    ///
    /// Returns a [`DimensionMismatch`](crate::RusgoError::DimensionMismatch) error if the model's
    /// parameters or gradient do not have the optimizer's dimension. The model is not updated
    /// in that case.
    pub fn update<M>(&mut self, model: &mut M) -> Result<StepOutcome>
    where
        M: Optimizable + ?Sized,
    {
        check_dimension("parameters", self.dimension, model.parameters().dimension())?;
        let loss = model.loss();
        let gradient = model.gradient();
        check_dimension("gradient", self.dimension, gradient.dimension())?;

        let epoch = self.epoch;
        if !self.schedule.consider_loss(epoch, loss) {
            slog::debug!(self.logger, "update skipped"; "epoch" => epoch, "loss" => loss);
            self.truncation.truncate_parameters(model.parameters_mut());
            return Ok(StepOutcome::Skipped);
        }

        let regularization = if self.regularizer.is_active() {
            match self.pass {
                RegularizationPass::Lazy => self.regularizer.regularize_indices(
                    model.parameters(),
                    gradient.indices(),
                    epoch,
                ),
                RegularizationPass::Dense => {
                    self.regularizer
                        .regularize_indices(model.parameters(), 0..self.dimension, epoch)
                }
            }
        } else {
            SparseVector::new(self.dimension)
        };

        let step = Step::new(epoch, self.schedule.as_ref(), &self.logger);
        self.rule
            .update_model(&step, model, &gradient, &regularization)?;
        self.epoch += 1;
        self.truncation.truncate_parameters(model.parameters_mut());

        slog::trace!(
            self.logger,
            "update";
            "rule" => self.rule.name(),
            "epoch" => epoch,
            "loss" => loss,
        );
        Ok(StepOutcome::Applied)
    }

    /// Applies the regularization still owed by every dimension.
    ///
    /// Each dimension is regularized through the last completed epoch. The epoch does not
    /// advance, so a second call without an intervening update changes nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`DimensionMismatch`](crate::RusgoError::DimensionMismatch) error if the model's
    /// parameters do not have the optimizer's dimension.
    pub fn cleanup<M>(&mut self, model: &mut M) -> Result<()>
    where
        M: Optimizable + ?Sized,
    {
        check_dimension("parameters", self.dimension, model.parameters().dimension())?;
        let completed = self.epoch - 1;
        let regularization = if self.regularizer.is_active() {
            self.regularizer
                .regularize_indices(model.parameters(), 0..self.dimension, completed)
        } else {
            SparseVector::new(self.dimension)
        };

        let step = Step::new(completed, self.schedule.as_ref(), &self.logger);
        self.rule
            .update_model_with_regularization(&step, model, &regularization)?;
        self.truncation.truncate_parameters(model.parameters_mut());

        slog::info!(
            self.logger,
            "cleanup";
            "rule" => self.rule.name(),
            "epoch" => completed,
            "regularized" => regularization.nnz(),
        );
        Ok(())
    }

    /// Dimension of the parameter vector.
    #[inline(always)]
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Epoch the next accepted update runs in. Starts at 1.
    #[inline(always)]
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The lazy regularization state.
    #[inline(always)]
    #[must_use]
    pub const fn regularizer(&self) -> &Regularizer {
        &self.regularizer
    }

    /// The update rule.
    #[inline(always)]
    #[must_use]
    pub const fn rule(&self) -> &R {
        &self.rule
    }

    /// The annealing schedule.
    #[inline(always)]
    #[must_use]
    pub fn schedule(&self) -> &dyn AnnealingSchedule {
        self.schedule.as_ref()
    }

    /// The logger.
    #[inline(always)]
    #[must_use]
    pub const fn logger(&self) -> &Logger {
        &self.logger
    }
}
