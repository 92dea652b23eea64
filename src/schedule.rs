//! Annealing schedules that supply learning rates to the optimizers.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::errors::{Result, RusgoError};

/// Supplies the learning rate of every step and may veto a step given its loss.
pub trait AnnealingSchedule {
    /// Returns the learning rate for `index` at `epoch`. Must be strictly positive.
    fn learning_rate(&self, epoch: u64, index: usize) -> f64;

    /// Returns `false` if the update observed with `loss` at `epoch` should be skipped.
    fn consider_loss(&mut self, _epoch: u64, _loss: f64) -> bool {
        true
    }
}

impl<S> AnnealingSchedule for Box<S>
where
    S: AnnealingSchedule + ?Sized,
{
    #[inline(always)]
    fn learning_rate(&self, epoch: u64, index: usize) -> f64 {
        (**self).learning_rate(epoch, index)
    }

    #[inline(always)]
    fn consider_loss(&mut self, epoch: u64, loss: f64) -> bool {
        (**self).consider_loss(epoch, loss)
    }
}

#[inline(always)]
fn check_eta(eta: f64) -> Result<f64> {
    if eta.is_finite() && eta > 0.0 {
        Ok(eta)
    } else {
        Err(RusgoError::invalid_argument(
            "learning rate must be finite and greater than 0.0",
        ))
    }
}

/// The same learning rate for every epoch and dimension.
#[derive(Clone, Copy, Debug)]
pub struct ConstantSchedule {
    eta: f64,
}

impl ConstantSchedule {
    /// Creates a new constant schedule.
    ///
    /// # Errors
    ///
    /// `eta` must be finite and greater than 0.0.
    pub fn new(eta: f64) -> Result<Self> {
        Ok(Self {
            eta: check_eta(eta)?,
        })
    }
}

impl AnnealingSchedule for ConstantSchedule {
    #[inline(always)]
    fn learning_rate(&self, _epoch: u64, _index: usize) -> f64 {
        self.eta
    }
}

/// `eta0 / (1 + decay * epoch)`.
#[derive(Clone, Copy, Debug)]
pub struct InverseDecay {
    eta0: f64,
    decay: f64,
}

impl InverseDecay {
    /// Creates a new inverse decay schedule.
    ///
    /// # Errors
    ///
    /// `eta0` must be finite and greater than 0.0, and `decay` must be finite and non-negative.
    pub fn new(eta0: f64, decay: f64) -> Result<Self> {
        if !decay.is_finite() || decay < 0.0 {
            return Err(RusgoError::invalid_argument(
                "decay must be finite and greater than or equal to 0.0",
            ));
        }
        Ok(Self {
            eta0: check_eta(eta0)?,
            decay,
        })
    }
}

impl AnnealingSchedule for InverseDecay {
    #[inline(always)]
    fn learning_rate(&self, epoch: u64, _index: usize) -> f64 {
        self.eta0 / self.decay.mul_add(epoch as f64, 1.0)
    }
}

/// `eta0 * base^epoch`.
#[derive(Clone, Copy, Debug)]
pub struct ExponentialDecay {
    eta0: f64,
    base: f64,
}

impl ExponentialDecay {
    /// Creates a new exponential decay schedule.
    ///
    /// # Errors
    ///
    /// `eta0` must be finite and greater than 0.0, and `base` must be in (0, 1].
    pub fn new(eta0: f64, base: f64) -> Result<Self> {
        if !(base > 0.0 && base <= 1.0) {
            return Err(RusgoError::invalid_argument("base must be in (0, 1]"));
        }
        Ok(Self {
            eta0: check_eta(eta0)?,
            base,
        })
    }
}

impl AnnealingSchedule for ExponentialDecay {
    #[inline(always)]
    fn learning_rate(&self, epoch: u64, _index: usize) -> f64 {
        self.eta0 * self.base.powf(epoch as f64)
    }
}

/// Scales an inner schedule by a fixed factor per dimension.
///
/// Dimensions without a factor use `1.0`.
pub struct PerCoordinateSchedule<S> {
    inner: S,
    scales: Vec<f64>,
}

impl<S> PerCoordinateSchedule<S>
where
    S: AnnealingSchedule,
{
    /// Creates a new per-coordinate schedule.
    ///
    /// # Errors
    ///
    /// Every scale must be finite and greater than 0.0.
    pub fn new(inner: S, scales: Vec<f64>) -> Result<Self> {
        if scales.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(RusgoError::invalid_argument(
                "scales must be finite and greater than 0.0",
            ));
        }
        Ok(Self { inner, scales })
    }
}

impl<S> AnnealingSchedule for PerCoordinateSchedule<S>
where
    S: AnnealingSchedule,
{
    #[inline(always)]
    fn learning_rate(&self, epoch: u64, index: usize) -> f64 {
        self.inner.learning_rate(epoch, index) * self.scales.get(index).copied().unwrap_or(1.0)
    }

    fn consider_loss(&mut self, epoch: u64, loss: f64) -> bool {
        self.inner.consider_loss(epoch, loss)
    }
}

/// Vetoes steps whose loss looks unstable.
///
/// A step is skipped when its loss is not finite or exceeds `factor` times the running mean of
/// the losses accepted so far. The first finite loss is always accepted.
pub struct LossGuard<S> {
    inner: S,
    factor: f64,
    mean: f64,
    n_accepted: u64,
}

impl<S> LossGuard<S>
where
    S: AnnealingSchedule,
{
    /// Wraps `inner` with a loss guard.
    ///
    /// # Errors
    ///
    /// `factor` must be finite and at least 1.0.
    pub fn new(inner: S, factor: f64) -> Result<Self> {
        if !(factor.is_finite() && factor >= 1.0) {
            return Err(RusgoError::invalid_argument(
                "factor must be finite and greater than or equal to 1.0",
            ));
        }
        Ok(Self {
            inner,
            factor,
            mean: 0.0,
            n_accepted: 0,
        })
    }

    /// Running mean of the accepted losses.
    #[inline(always)]
    pub const fn mean_loss(&self) -> f64 {
        self.mean
    }
}

impl<S> AnnealingSchedule for LossGuard<S>
where
    S: AnnealingSchedule,
{
    #[inline(always)]
    fn learning_rate(&self, epoch: u64, index: usize) -> f64 {
        self.inner.learning_rate(epoch, index)
    }

    fn consider_loss(&mut self, epoch: u64, loss: f64) -> bool {
        if !loss.is_finite() {
            return false;
        }
        if self.n_accepted != 0 && loss > self.factor * self.mean.abs() {
            return false;
        }
        if !self.inner.consider_loss(epoch, loss) {
            return false;
        }
        self.n_accepted += 1;
        self.mean += (loss - self.mean) / self.n_accepted as f64;
        true
    }
}
