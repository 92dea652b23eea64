//! # rusgo
//!
//! Stochastic gradient optimizers with lazy regularization implemented in pure Rust.
//!
//! A model exposes its parameters, loss and gradient through [`Optimizable`]. A
//! [`StochasticOptimizer`] built by [`OptimizerConfig`] drives one of the update rules in
//! [`optimizers`] (SGD, ADAM, Rprop, iRprop-, BFGS or L-BFGS) and takes care of the annealing
//! schedule, the regularization owed by each dimension and the truncation after every step.
//!
//! ## Examples
//!
//! ```
//! use rusgo::optimizers::Sgd;
//! use rusgo::{ConstantSchedule, Optimizable, OptimizerConfig, Penalty, SparseVector};
//!
//! // f(w) = 0.5 * |w - target|^2
//! struct Model {
//!     weights: SparseVector,
//!     target: SparseVector,
//! }
//!
//! impl Optimizable for Model {
//!     fn parameters(&self) -> &SparseVector {
//!         &self.weights
//!     }
//!
//!     fn parameters_mut(&mut self) -> &mut SparseVector {
//!         &mut self.weights
//!     }
//!
//!     fn set_parameters(&mut self, parameters: SparseVector) {
//!         self.weights = parameters;
//!     }
//!
//!     fn loss_at(&self, parameters: &SparseVector) -> f64 {
//!         let d = parameters.minus(&self.target);
//!         0.5 * d.dot(&d)
//!     }
//!
//!     fn gradient_at(&self, parameters: &SparseVector) -> SparseVector {
//!         parameters.minus(&self.target)
//!     }
//! }
//!
//! let mut model = Model {
//!     weights: SparseVector::new(3),
//!     target: SparseVector::from_dense(&[1.0, 0.0, -2.0]),
//! };
//!
//! let mut optimizer = OptimizerConfig::new(3)?
//!     .schedule(ConstantSchedule::new(0.1)?)
//!     .penalty(Penalty::Squared, 0.01)?
//!     .build(Sgd::new())?;
//!
//! for _ in 0..200 {
//!     optimizer.update(&mut model)?;
//! }
//! optimizer.cleanup(&mut model)?;
//!
//! assert!((model.parameters().get(0) - 1.0).abs() < 1e-2);
//! assert!((model.parameters().get(2) + 2.0).abs() < 1e-2);
//! # Ok::<(), rusgo::RusgoError>(())
//! ```
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate alloc;

mod config;
mod math;
mod optimizable;
mod optimizer;
mod regularization;
mod schedule;
mod truncation;
mod vector;

pub mod errors;
pub mod optimizers;

#[cfg(feature = "executor")]
mod solver;

#[cfg(test)]
mod test_utils;

pub use config::OptimizerConfig;
pub use errors::{Result, RusgoError};
pub use optimizable::Optimizable;
pub use optimizer::{RegularizationPass, StepOutcome, StochasticOptimizer};
pub use regularization::{Penalty, Regularizer};
pub use schedule::{
    AnnealingSchedule, ConstantSchedule, ExponentialDecay, InverseDecay, LossGuard,
    PerCoordinateSchedule,
};
pub use truncation::{GradientTruncation, NoTruncation, ThresholdTruncation, TruncatedGradient};
pub use vector::SparseVector;

#[cfg(feature = "executor")]
#[cfg_attr(docsrs, doc(cfg(feature = "executor")))]
pub use argmin_observer_slog::SlogLogger;
#[cfg(feature = "executor")]
#[cfg_attr(docsrs, doc(cfg(feature = "executor")))]
pub use solver::SolverState;
