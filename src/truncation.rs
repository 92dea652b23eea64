//! Sparsifying operations applied to the parameters after every step.

use crate::errors::{Result, RusgoError};
use crate::math;
use crate::vector::SparseVector;

/// Zeroes or shrinks parameters in place.
pub trait GradientTruncation {
    /// Truncates `parameters` in place.
    fn truncate_parameters(&mut self, parameters: &mut SparseVector);
}

impl<T> GradientTruncation for Box<T>
where
    T: GradientTruncation + ?Sized,
{
    #[inline(always)]
    fn truncate_parameters(&mut self, parameters: &mut SparseVector) {
        (**self).truncate_parameters(parameters);
    }
}

/// Leaves the parameters untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTruncation;

impl GradientTruncation for NoTruncation {
    #[inline(always)]
    fn truncate_parameters(&mut self, _parameters: &mut SparseVector) {}
}

/// Zeroes every parameter whose magnitude is below a threshold.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdTruncation {
    threshold: f64,
}

impl ThresholdTruncation {
    /// Creates a new threshold truncation.
    ///
    /// # Errors
    ///
    /// `threshold` must be finite and greater than or equal to 0.0.
    pub fn new(threshold: f64) -> Result<Self> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(RusgoError::invalid_argument(
                "threshold must be finite and greater than or equal to 0.0",
            ));
        }
        Ok(Self { threshold })
    }
}

impl GradientTruncation for ThresholdTruncation {
    fn truncate_parameters(&mut self, parameters: &mut SparseVector) {
        let threshold = self.threshold;
        parameters.retain(|_, w| w.abs() >= threshold);
    }
}

/// Truncated gradient in the manner of Langford, Li and Zhang.
///
/// Every `period` calls, parameters with `|w| <= threshold` are pulled toward zero by
/// `gravity * period`, never crossing it. Calls in between only advance the counter.
#[derive(Clone, Copy, Debug)]
pub struct TruncatedGradient {
    gravity: f64,
    threshold: f64,
    period: u64,
    n_calls: u64,
}

impl TruncatedGradient {
    /// Creates a new truncated-gradient operator.
    ///
    /// # Errors
    ///
    /// `gravity` and `threshold` must be finite and non-negative, and `period` must not be 0.
    pub fn new(gravity: f64, threshold: f64, period: u64) -> Result<Self> {
        if !(gravity.is_finite() && gravity >= 0.0) {
            return Err(RusgoError::invalid_argument(
                "gravity must be finite and greater than or equal to 0.0",
            ));
        }
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(RusgoError::invalid_argument(
                "threshold must be finite and greater than or equal to 0.0",
            ));
        }
        if period == 0 {
            return Err(RusgoError::invalid_argument("period must not be 0"));
        }
        Ok(Self {
            gravity,
            threshold,
            period,
            n_calls: 0,
        })
    }
}

impl GradientTruncation for TruncatedGradient {
    fn truncate_parameters(&mut self, parameters: &mut SparseVector) {
        self.n_calls += 1;
        if self.n_calls % self.period != 0 {
            return;
        }
        let amount = self.gravity * self.period as f64;
        let threshold = self.threshold;
        parameters.retain(|_, w| {
            if w.abs() <= threshold {
                *w = math::shrink_toward_zero(*w, math::sign(*w) * amount);
            }
            true
        });
    }
}
