//! Module for SGD optimizer.

use alloc::vec::Vec;

use crate::errors::Result;
use crate::math;
use crate::optimizable::Optimizable;
use crate::optimizers::{check_inputs, Step, UpdateRule};
use crate::vector::SparseVector;

/// Stochastic gradient descent.
///
/// Each touched weight moves by `-learning_rate * gradient`; the owed regularization is then
/// applied as a separate shrink that stops at zero instead of flipping the sign of the weight.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sgd;

impl Sgd {
    /// Creates a new SGD rule.
    #[inline(always)]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl UpdateRule for Sgd {
    fn name(&self) -> &'static str {
        "SGD"
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

        let mut indices: Vec<usize> = gradient
            .iter()
            .chain(regularization.iter())
            .map(|(i, _)| i)
            .collect();
        indices.sort_unstable();
        indices.dedup();

        let mut parameters = model.parameters().clone();
        for i in indices {
            let eta = step.learning_rate(i);
            let mut w = eta.mul_add(-gradient.get(i), parameters.get(i));
            let r = regularization.get(i);
            if r != 0.0 {
                w = math::shrink_toward_zero(w, eta * r);
            }
            parameters.set(i, w);
        }
        model.set_parameters(parameters);
        Ok(())
    }
}
