//! Running the optimizer under an [`argmin`] executor.
//!
//! [`StochasticOptimizer`] implements [`Solver`] for any problem providing [`CostFunction`] and
//! [`Gradient`] over `Vec<f64>`, so the executor's iteration limits, observers and evaluation
//! counts apply. The owed regularization is not flushed by the executor; call
//! [`StochasticOptimizer::cleanup_parameters`] on the final parameters.
//!
//! The cost and the gradient at the current parameters are evaluated before the step, so a
//! failing evaluation leaves the epoch and the regularization state untouched. BFGS and L-BFGS
//! also evaluate the gradient at the trial point; if that fails, the step has already been taken
//! when the error is returned.

use core::cell::{Cell, RefCell};

use alloc::string::ToString;
use alloc::vec::Vec;

use argmin::core::{ArgminError, CostFunction, Error, Gradient, IterState, Problem, Solver, KV};

use crate::errors::{check_dimension, Result};
use crate::optimizable::Optimizable;
use crate::optimizer::{StepOutcome, StochasticOptimizer};
use crate::optimizers::UpdateRule;
use crate::vector::SparseVector;

/// Iteration state used by [`StochasticOptimizer`] as an argmin solver.
pub type SolverState = IterState<Vec<f64>, Vec<f64>, (), (), (), f64>;

/// Presents an argmin problem as an [`Optimizable`] model.
///
/// The loss and the gradient at the starting parameters are evaluated up front and served from
/// `current` until the parameters change. Later evaluation errors are kept aside and reported
/// after the step, since the model contract is infallible.
struct ProblemModel<'a, O> {
    problem: &'a O,
    parameters: SparseVector,
    current: Option<(f64, SparseVector)>,
    cost_count: Cell<u64>,
    gradient_count: Cell<u64>,
    error: RefCell<Option<Error>>,
}

impl<'a, O> ProblemModel<'a, O>
where
    O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
    fn new(problem: &'a O, param: Vec<f64>) -> Result<Self, Error> {
        let cost = problem.cost(&param)?;
        let gradient = SparseVector::from(problem.gradient(&param)?);
        Ok(Self {
            problem,
            parameters: SparseVector::from(param),
            current: Some((cost, gradient)),
            cost_count: Cell::new(1),
            gradient_count: Cell::new(1),
            error: RefCell::new(None),
        })
    }

    fn cached(&self, parameters: &SparseVector) -> Option<&(f64, SparseVector)> {
        self.current
            .as_ref()
            .filter(|_| core::ptr::eq(parameters, &self.parameters))
    }

    fn keep_error(&self, e: Error) {
        let mut error = self.error.borrow_mut();
        if error.is_none() {
            *error = Some(e);
        }
    }
}

impl<O> Optimizable for ProblemModel<'_, O>
where
    O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
    fn parameters(&self) -> &SparseVector {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut SparseVector {
        self.current = None;
        &mut self.parameters
    }

    fn set_parameters(&mut self, parameters: SparseVector) {
        self.current = None;
        self.parameters = parameters;
    }

    fn loss_at(&self, parameters: &SparseVector) -> f64 {
        if let Some((cost, _)) = self.cached(parameters) {
            return *cost;
        }
        self.cost_count.set(self.cost_count.get() + 1);
        match self.problem.cost(&parameters.to_dense()) {
            Ok(cost) => cost,
            Err(e) => {
                self.keep_error(e);
                f64::NAN
            }
        }
    }

    fn gradient_at(&self, parameters: &SparseVector) -> SparseVector {
        if let Some((_, gradient)) = self.cached(parameters) {
            return gradient.clone();
        }
        self.gradient_count.set(self.gradient_count.get() + 1);
        match self.problem.gradient(&parameters.to_dense()) {
            Ok(gradient) => SparseVector::from(gradient),
            Err(e) => {
                self.keep_error(e);
                SparseVector::new(parameters.dimension())
            }
        }
    }
}

/// Parameters without an objective, for flushing regularization only.
struct FrozenParameters(SparseVector);

impl Optimizable for FrozenParameters {
    fn parameters(&self) -> &SparseVector {
        &self.0
    }

    fn parameters_mut(&mut self) -> &mut SparseVector {
        &mut self.0
    }

    fn set_parameters(&mut self, parameters: SparseVector) {
        self.0 = parameters;
    }

    fn loss_at(&self, _parameters: &SparseVector) -> f64 {
        0.0
    }

    fn gradient_at(&self, parameters: &SparseVector) -> SparseVector {
        SparseVector::new(parameters.dimension())
    }
}

impl<R> StochasticOptimizer<R>
where
    R: UpdateRule,
{
    /// Applies [`cleanup`](Self::cleanup) to a dense parameter vector, such as the one returned
    /// by an argmin executor.
    ///
    /// # Errors
    ///
    /// `parameters` must have the optimizer's dimension.
    #[cfg_attr(docsrs, doc(cfg(feature = "executor")))]
    pub fn cleanup_parameters(&mut self, parameters: &mut Vec<f64>) -> Result<()> {
        check_dimension("parameters", self.dimension(), parameters.len())?;
        let mut frozen = FrozenParameters(SparseVector::from_dense(parameters));
        self.cleanup(&mut frozen)?;
        *parameters = frozen.0.into();
        Ok(())
    }
}

fn take_param(state: &mut SolverState) -> Result<Vec<f64>, Error> {
    state.take_param().ok_or_else(|| {
        ArgminError::NotInitialized {
            text: "an initial parameter vector must be given to the executor".to_string(),
        }
        .into()
    })
}

impl<O, R> Solver<O, SolverState> for StochasticOptimizer<R>
where
    O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
    R: UpdateRule,
{
    const NAME: &'static str = "Stochastic Gradient Optimizer";

    fn init(
        &mut self,
        problem: &mut Problem<O>,
        mut state: SolverState,
    ) -> Result<(SolverState, Option<KV>), Error> {
        let param = take_param(&mut state)?;
        check_dimension("parameters", self.dimension(), param.len())?;
        let cost = problem.cost(&param)?;
        Ok((
            state.param(param).cost(cost),
            Some(argmin::kv!(
                "rule" => self.rule().name();
                "dimension" => self.dimension() as u64;
            )),
        ))
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<O>,
        mut state: SolverState,
    ) -> Result<(SolverState, Option<KV>), Error> {
        let param = take_param(&mut state)?;
        let objective = problem.problem.as_ref().ok_or_else(|| -> Error {
            ArgminError::PotentialBug {
                text: "problem is not available".to_string(),
            }
            .into()
        })?;

        check_dimension("parameters", self.dimension(), param.len())?;
        let mut model = ProblemModel::new(objective, param)?;
        let outcome = self.update(&mut model);
        let ProblemModel {
            parameters,
            cost_count,
            gradient_count,
            error,
            ..
        } = model;

        *problem.counts.entry("cost_count").or_insert(0) += cost_count.get();
        *problem.counts.entry("gradient_count").or_insert(0) += gradient_count.get();
        if let Some(e) = error.into_inner() {
            return Err(e);
        }
        let outcome = outcome?;

        let param: Vec<f64> = parameters.into();
        let cost = problem.cost(&param)?;
        Ok((
            state.param(param).cost(cost),
            Some(argmin::kv!(
                "epoch" => self.epoch();
                "skipped" => outcome == StepOutcome::Skipped;
            )),
        ))
    }
}
