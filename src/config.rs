use alloc::boxed::Box;

use hashbrown::HashMap;
use slog::Logger;

use crate::errors::{Result, RusgoError};
use crate::optimizer::{RegularizationPass, StochasticOptimizer};
use crate::optimizers::UpdateRule;
use crate::regularization::{Penalty, Regularizer};
use crate::schedule::{AnnealingSchedule, ConstantSchedule};
use crate::truncation::{GradientTruncation, NoTruncation};

/// Builder of a [`StochasticOptimizer`].
///
/// # Examples
///
/// ```
/// use rusgo::optimizers::Adam;
/// use rusgo::{ConstantSchedule, OptimizerConfig, Penalty};
///
/// let optimizer = OptimizerConfig::new(10)?
///     .bias(true)
///     .schedule(ConstantSchedule::new(0.05)?)
///     .penalty(Penalty::Gaussian, 1.0)?
///     .build(Adam::new().alpha(0.01)?)?;
/// assert_eq!(1, optimizer.epoch());
/// # Ok::<(), rusgo::RusgoError>(())
/// ```
pub struct OptimizerConfig {
    dimension: usize,
    bias: bool,
    schedule: Box<dyn AnnealingSchedule>,
    truncation: Box<dyn GradientTruncation>,
    penalties: HashMap<Penalty, f64>,
    regularize_intercept: bool,
    regularization_weight: f64,
    regularization_pass: RegularizationPass,
    logger: Logger,
}

impl OptimizerConfig {
    /// Creates a new configuration for `dimension` parameters.
    ///
    /// Defaults: no bias, a constant learning rate of 0.01, no truncation, no penalty, a global
    /// regularization weight of 1.0, lazy regularization and a discarding logger.
    ///
    /// # Errors
    ///
    /// `dimension` must not be 0.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RusgoError::invalid_argument("dimension must not be 0"));
        }
        Ok(Self {
            dimension,
            bias: false,
            schedule: Box::new(ConstantSchedule::new(0.01)?),
            truncation: Box::new(NoTruncation),
            penalties: HashMap::new(),
            regularize_intercept: false,
            regularization_weight: 1.0,
            regularization_pass: RegularizationPass::default(),
            logger: Logger::root(slog::Discard, slog::o!()),
        })
    }

    /// Declares the last dimension as the intercept.
    #[must_use]
    pub const fn bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Sets the annealing schedule.
    #[must_use]
    pub fn schedule<S>(mut self, schedule: S) -> Self
    where
        S: AnnealingSchedule + 'static,
    {
        self.schedule = Box::new(schedule);
        self
    }

    /// Sets the truncation applied after every step.
    #[must_use]
    pub fn truncation<T>(mut self, truncation: T) -> Self
    where
        T: GradientTruncation + 'static,
    {
        self.truncation = Box::new(truncation);
        self
    }

    /// Sets the weight of a penalty. A weight of 0.0 disables it.
    ///
    /// # Errors
    ///
    /// `weight` must be finite and greater than or equal to 0.0.
    pub fn penalty(mut self, penalty: Penalty, weight: f64) -> Result<Self> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(RusgoError::invalid_argument(
                "penalty weight must be finite and greater than or equal to 0.0",
            ));
        }
        self.penalties.insert(penalty, weight);
        Ok(self)
    }

    /// Also regularizes the intercept. Has no effect without [`bias`](Self::bias).
    #[must_use]
    pub const fn regularize_intercept(mut self, regularize_intercept: bool) -> Self {
        self.regularize_intercept = regularize_intercept;
        self
    }

    /// Sets the global regularization weight.
    ///
    /// # Errors
    ///
    /// `weight` must be finite and greater than or equal to 0.0.
    pub fn regularization_weight(mut self, weight: f64) -> Result<Self> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(RusgoError::invalid_argument(
                "regularization weight must be finite and greater than or equal to 0.0",
            ));
        }
        self.regularization_weight = weight;
        Ok(self)
    }

    /// Selects which dimensions are regularized on each accepted update.
    #[must_use]
    pub const fn regularization_pass(mut self, pass: RegularizationPass) -> Self {
        self.regularization_pass = pass;
        self
    }

    /// Sets the logger.
    #[must_use]
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Builds the optimizer driving `rule`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule cannot be initialized for the dimension.
    pub fn build<R>(self, rule: R) -> Result<StochasticOptimizer<R>>
    where
        R: UpdateRule,
    {
        let regularizer = Regularizer::new(
            self.dimension,
            self.bias,
            self.regularize_intercept,
            self.regularization_weight,
            self.penalties,
            1,
        )?;
        StochasticOptimizer::new(
            self.dimension,
            self.schedule,
            self.truncation,
            regularizer,
            self.regularization_pass,
            rule,
            self.logger,
        )
    }
}
