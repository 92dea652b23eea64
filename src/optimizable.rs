use crate::vector::SparseVector;

/// A model whose parameters can be trained by a [`StochasticOptimizer`](crate::StochasticOptimizer).
///
/// The loss and gradient computations are up to the model; the optimizer only reads them and
/// writes back new parameters.
pub trait Optimizable {
    /// Current parameter vector.
    fn parameters(&self) -> &SparseVector;

    /// Mutable access to the current parameter vector.
    fn parameters_mut(&mut self) -> &mut SparseVector;

    /// Replaces the parameter vector.
    fn set_parameters(&mut self, parameters: SparseVector);

    /// Loss at `parameters`.
    fn loss_at(&self, parameters: &SparseVector) -> f64;

    /// Gradient of the loss at `parameters`.
    fn gradient_at(&self, parameters: &SparseVector) -> SparseVector;

    /// Loss at the current parameters.
    fn loss(&self) -> f64 {
        self.loss_at(self.parameters())
    }

    /// Gradient at the current parameters.
    fn gradient(&self) -> SparseVector {
        self.gradient_at(self.parameters())
    }
}
