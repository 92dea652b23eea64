use alloc::vec::Vec;

use slog::Logger;

use crate::optimizable::Optimizable;
use crate::vector::SparseVector;

macro_rules! hashmap {
    ( $($k:expr => $v:expr,)* ) => {
        {
            #[allow(unused_mut)]
            let mut h = HashMap::new();
            $(
                h.insert($k, $v);
            )*
            h
        }
    };
    ( $($k:expr => $v:expr),* ) => {
        hashmap![$( $k => $v, )*]
    };
}

pub(crate) use hashmap;

pub fn discard_logger() -> Logger {
    Logger::root(slog::Discard, slog::o!())
}

/// The same gradient everywhere. The loss is linear in the parameters.
pub struct ConstantGradientModel {
    parameters: SparseVector,
    gradient: SparseVector,
}

impl ConstantGradientModel {
    pub fn new(parameters: &[f64], gradient: &[f64]) -> Self {
        Self {
            parameters: SparseVector::from_dense(parameters),
            gradient: SparseVector::from_dense(gradient),
        }
    }
}

impl Optimizable for ConstantGradientModel {
    fn parameters(&self) -> &SparseVector {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut SparseVector {
        &mut self.parameters
    }

    fn set_parameters(&mut self, parameters: SparseVector) {
        self.parameters = parameters;
    }

    fn loss_at(&self, parameters: &SparseVector) -> f64 {
        self.gradient.dot(parameters)
    }

    fn gradient_at(&self, _parameters: &SparseVector) -> SparseVector {
        self.gradient.clone()
    }
}

/// Replays a fixed list of gradients, moving to the next one whenever the parameters are set.
pub struct ScriptedModel {
    parameters: SparseVector,
    gradients: Vec<SparseVector>,
    cursor: usize,
}

impl ScriptedModel {
    pub fn new(parameters: &[f64], gradients: &[&[f64]]) -> Self {
        Self {
            parameters: SparseVector::from_dense(parameters),
            gradients: gradients
                .iter()
                .map(|g| SparseVector::from_dense(g))
                .collect(),
            cursor: 0,
        }
    }
}

impl Optimizable for ScriptedModel {
    fn parameters(&self) -> &SparseVector {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut SparseVector {
        &mut self.parameters
    }

    fn set_parameters(&mut self, parameters: SparseVector) {
        self.parameters = parameters;
        self.cursor += 1;
    }

    fn loss_at(&self, parameters: &SparseVector) -> f64 {
        0.5 * parameters.dot(parameters)
    }

    fn gradient_at(&self, _parameters: &SparseVector) -> SparseVector {
        self.gradients[self.cursor % self.gradients.len()].clone()
    }
}

/// `0.5 * sum(curvature[i] * x[i]^2)`, minimized at the origin.
pub struct QuadraticModel {
    parameters: SparseVector,
    curvature: Vec<f64>,
}

impl QuadraticModel {
    pub fn new(parameters: &[f64], curvature: &[f64]) -> Self {
        Self {
            parameters: SparseVector::from_dense(parameters),
            curvature: curvature.to_vec(),
        }
    }
}

impl Optimizable for QuadraticModel {
    fn parameters(&self) -> &SparseVector {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut SparseVector {
        &mut self.parameters
    }

    fn set_parameters(&mut self, parameters: SparseVector) {
        self.parameters = parameters;
    }

    fn loss_at(&self, parameters: &SparseVector) -> f64 {
        parameters
            .iter()
            .map(|(i, x)| 0.5 * self.curvature[i] * x * x)
            .sum()
    }

    fn gradient_at(&self, parameters: &SparseVector) -> SparseVector {
        let mut gradient = SparseVector::new(parameters.dimension());
        for (i, x) in parameters.iter() {
            gradient.set(i, self.curvature[i] * x);
        }
        gradient
    }
}
