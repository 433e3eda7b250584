use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::Dense;
use crate::{Result, arch::activations::ActFn, specs::LayerSpec};

#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
}
use Layer::*;

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Dense(Dense::new(dim, act_fn))
    }

    pub fn from_spec(spec: LayerSpec) -> Self {
        match spec {
            LayerSpec::Dense { dim, act_fn } => Self::dense(dim, act_fn.map(ActFn::from_spec)),
        }
    }

    pub fn spec(&self) -> LayerSpec {
        match self {
            Dense(l) => l.spec(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Dense(l) => l.size(),
        }
    }

    /// The amount of inputs and outputs of the layer.
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Dense(l) => l.dim(),
        }
    }

    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        match self {
            Dense(l) => l.init_params(params, rng),
        }
    }

    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.predict(params, x),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.forward(params, x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.backward(params, grad, d),
        }
    }
}
