//! Penalty terms and lazy regularization bookkeeping.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::errors::{Result, RusgoError};
use crate::math;
use crate::vector::SparseVector;

/// Kind of penalty applied to each parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Penalty {
    /// Gaussian prior whose variance is the weight (L2).
    Gaussian,

    /// Laplace prior whose scale is the weight (L1).
    Laplace,

    /// Cauchy prior whose scale is the weight.
    Cauchy,

    /// Squared penalty `weight * x^2 / 2`.
    Squared,
}

impl Penalty {
    /// Every penalty kind, in the order their contributions are summed.
    pub const ALL: [Self; 4] = [Self::Gaussian, Self::Laplace, Self::Cauchy, Self::Squared];

    /// Derivative of the penalty at `x`.
    #[inline(always)]
    #[must_use]
    pub fn gradient(self, x: f64, weight: f64) -> f64 {
        match self {
            Self::Gaussian => x / weight,
            Self::Laplace => math::sign(x) / weight,
            Self::Cauchy => 2.0 * x / weight.mul_add(weight, x * x),
            Self::Squared => weight * x,
        }
    }

    /// Value of the penalty at `x`, up to an additive constant.
    #[inline(always)]
    #[must_use]
    pub fn value(self, x: f64, weight: f64) -> f64 {
        match self {
            Self::Gaussian => x * x / (2.0 * weight),
            Self::Laplace => x.abs() / weight,
            Self::Cauchy => (x * x / (weight * weight)).ln_1p(),
            Self::Squared => weight * x * x / 2.0,
        }
    }
}

/// Computes per-dimension regularization lazily.
///
/// Each dimension remembers the epoch it was last regularized at. When it is touched again, it
/// receives the regularization of every epoch it missed at once, so untouched dimensions cost
/// nothing.
#[derive(Clone, Debug)]
pub struct Regularizer {
    penalties: HashMap<Penalty, f64>,
    weight: f64,
    dimension: usize,
    bias: bool,
    regularize_intercept: bool,
    last_accessed: Vec<u64>,
}

impl Regularizer {
    /// Creates a new regularizer for `dimension` parameters.
    ///
    /// `initial_epoch` is the epoch of the first update; every dimension starts as if it had been
    /// regularized in the epoch before.
    ///
    /// # Errors
    ///
    /// `weight` and every penalty weight must be finite and greater than or equal to 0.0.
    pub fn new(
        dimension: usize,
        bias: bool,
        regularize_intercept: bool,
        weight: f64,
        penalties: HashMap<Penalty, f64>,
        initial_epoch: u64,
    ) -> Result<Self> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(RusgoError::invalid_argument(
                "regularization weight must be finite and greater than or equal to 0.0",
            ));
        }
        if penalties.values().any(|&w| !(w.is_finite() && w >= 0.0)) {
            return Err(RusgoError::invalid_argument(
                "penalty weights must be finite and greater than or equal to 0.0",
            ));
        }
        Ok(Self {
            penalties,
            weight,
            dimension,
            bias,
            regularize_intercept,
            last_accessed: vec![initial_epoch.saturating_sub(1); dimension],
        })
    }

    /// Returns `true` if at least one penalty contributes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.weight > 0.0 && self.penalties.values().any(|&w| w > 0.0)
    }

    /// Returns `true` if `index` is the intercept and the intercept is not regularized.
    #[inline(always)]
    #[must_use]
    pub fn is_exempt(&self, index: usize) -> bool {
        self.bias && !self.regularize_intercept && index + 1 == self.dimension
    }

    /// Epoch at which `index` was last regularized.
    #[inline(always)]
    #[must_use]
    pub fn last_accessed(&self, index: usize) -> u64 {
        self.last_accessed[index]
    }

    /// Returns the regularization gradient owed by `index` through `epoch` and marks it paid.
    ///
    /// The contribution of every active penalty at the current parameter value is scaled by
    /// `weight * (epoch - last_accessed) / dimension`. A second call with the same epoch returns
    /// `0.0`.
    ///
    /// # Panics
    ///
    /// `index` must be less than the dimension.
    pub fn regularize(&mut self, parameters: &SparseVector, index: usize, epoch: u64) -> f64 {
        if self.weight <= 0.0 || self.is_exempt(index) {
            return 0.0;
        }
        let x = parameters.get(index);
        let mut g = 0.0;
        for penalty in Penalty::ALL {
            if let Some(&w) = self.penalties.get(&penalty) {
                if w > 0.0 {
                    g += penalty.gradient(x, w);
                }
            }
        }
        let elapsed = epoch.saturating_sub(self.last_accessed[index]);
        self.last_accessed[index] = self.last_accessed[index].max(epoch);
        g * self.weight * elapsed as f64 / self.dimension as f64
    }

    /// Builds the regularization vector for `indices` through `epoch`.
    pub fn regularize_indices<I>(
        &mut self,
        parameters: &SparseVector,
        indices: I,
        epoch: u64,
    ) -> SparseVector
    where
        I: IntoIterator<Item = usize>,
    {
        let mut v = SparseVector::new(self.dimension);
        for index in indices {
            let r = self.regularize(parameters, index, epoch);
            v.set(index, r);
        }
        v
    }

    /// Value of the regularization term of the objective at `parameters`.
    #[must_use]
    pub fn penalty(&self, parameters: &SparseVector) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let mut total = 0.0;
        for (index, x) in parameters.iter() {
            if self.is_exempt(index) {
                continue;
            }
            for penalty in Penalty::ALL {
                if let Some(&w) = self.penalties.get(&penalty) {
                    if w > 0.0 {
                        total += penalty.value(x, w);
                    }
                }
            }
        }
        total * self.weight / self.dimension as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::hashmap;

    #[test]
    fn test_penalty_gradients() {
        assert!((Penalty::Gaussian.gradient(2.0, 4.0) - 0.5).abs() < f64::EPSILON);
        assert!((Penalty::Laplace.gradient(-2.0, 0.5) + 2.0).abs() < f64::EPSILON);
        assert_eq!(0.0, Penalty::Laplace.gradient(0.0, 0.5));
        assert!((Penalty::Cauchy.gradient(1.0, 1.0) - 1.0).abs() < f64::EPSILON);
        assert!((Penalty::Squared.gradient(3.0, 2.0) - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_penalty_values() {
        assert!((Penalty::Gaussian.value(2.0, 4.0) - 0.5).abs() < f64::EPSILON);
        assert!((Penalty::Laplace.value(-2.0, 0.5) - 4.0).abs() < f64::EPSILON);
        assert!((Penalty::Cauchy.value(1.0, 1.0) - 2f64.ln()).abs() < f64::EPSILON);
        assert!((Penalty::Squared.value(3.0, 2.0) - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_weights() {
        assert!(Regularizer::new(3, false, false, -1.0, HashMap::new(), 1).is_err());
        assert!(Regularizer::new(3, false, false, f64::NAN, HashMap::new(), 1).is_err());
        let penalties = hashmap![Penalty::Laplace => -0.1];
        assert!(Regularizer::new(3, false, false, 1.0, penalties, 1).is_err());
    }

    #[test]
    fn test_first_touch_charges_one_epoch() {
        let penalties = hashmap![Penalty::Squared => 1.0];
        let mut r = Regularizer::new(3, false, false, 1.0, penalties, 1).unwrap();
        let params = SparseVector::from_dense(&[1.0, 1.0, 1.0]);
        assert_eq!(0, r.last_accessed(0));
        let g = r.regularize(&params, 0, 1);
        assert!((g - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(1, r.last_accessed(0));
    }

    #[test]
    fn test_second_call_same_epoch_is_zero() {
        let penalties = hashmap![Penalty::Gaussian => 1.0, Penalty::Laplace => 2.0];
        let mut r = Regularizer::new(2, false, false, 0.5, penalties, 1).unwrap();
        let params = SparseVector::from_dense(&[0.7, -1.2]);
        assert!(r.regularize(&params, 1, 4) != 0.0);
        assert_eq!(0.0, r.regularize(&params, 1, 4));
    }

    #[test]
    fn test_catch_up_scales_with_elapsed_epochs() {
        let penalties = hashmap![Penalty::Squared => 2.0];
        let mut r = Regularizer::new(4, false, false, 1.0, penalties, 1).unwrap();
        let params = SparseVector::from_dense(&[0.5, 0.5, 0.0, 0.0]);
        let one = r.regularize(&params, 0, 1);
        let six = r.regularize(&params, 1, 6);
        assert!((six - 6.0 * one).abs() < 1e-15);
    }

    #[test]
    fn test_lazy_equals_eager() {
        let penalties = hashmap![Penalty::Laplace => 0.5, Penalty::Squared => 0.1];
        let params = SparseVector::from_dense(&[0.8, -0.3, 2.0]);

        let mut lazy = Regularizer::new(3, false, false, 0.7, penalties.clone(), 1).unwrap();
        let mut eager = Regularizer::new(3, false, false, 0.7, penalties, 1).unwrap();

        let mut eager_total = 0.0;
        for epoch in 1..=9 {
            eager_total += eager.regularize(&params, 1, epoch);
        }
        let lazy_total = lazy.regularize(&params, 1, 9);

        assert!((lazy_total - eager_total).abs() < 1e-12);
    }

    #[test]
    fn test_intercept_exemption() {
        let penalties = hashmap![Penalty::Squared => 1.0];
        let params = SparseVector::from_dense(&[1.0, 1.0, 1.0]);

        let mut r = Regularizer::new(3, true, false, 1.0, penalties.clone(), 1).unwrap();
        assert!(r.is_exempt(2));
        assert!(!r.is_exempt(1));
        assert_eq!(0.0, r.regularize(&params, 2, 5));
        assert!(r.regularize(&params, 1, 5) > 0.0);

        let mut r = Regularizer::new(3, true, true, 1.0, penalties, 1).unwrap();
        assert!(!r.is_exempt(2));
        assert!(r.regularize(&params, 2, 5) > 0.0);
    }

    #[test]
    fn test_zero_weight_disables() {
        let penalties = hashmap![Penalty::Squared => 1.0];
        let mut r = Regularizer::new(2, false, false, 0.0, penalties, 1).unwrap();
        assert!(!r.is_active());
        let params = SparseVector::from_dense(&[1.0, 1.0]);
        assert_eq!(0.0, r.regularize(&params, 0, 10));
        assert_eq!(0.0, r.penalty(&params));
    }

    #[test]
    fn test_regularize_indices() {
        let penalties = hashmap![Penalty::Squared => 1.0];
        let mut r = Regularizer::new(3, false, false, 3.0, penalties, 1).unwrap();
        let params = SparseVector::from_dense(&[2.0, 0.0, -1.0]);
        let v = r.regularize_indices(&params, [0, 1, 2], 1);
        assert_eq!(vec![2.0, 0.0, -1.0], v.to_dense());
        assert_eq!(1, r.last_accessed(1));
    }

    #[test]
    fn test_penalty_total() {
        let penalties = hashmap![Penalty::Squared => 2.0];
        let r = Regularizer::new(2, true, false, 1.0, penalties, 1).unwrap();
        let params = SparseVector::from_dense(&[3.0, 5.0]);
        // the intercept is skipped: 2 * 9 / 2 / 2
        assert!((r.penalty(&params) - 4.5).abs() < f64::EPSILON);
    }
}
