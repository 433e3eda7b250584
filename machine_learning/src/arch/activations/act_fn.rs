use super::{Relu, Sigmoid};
use crate::specs::ActFnSpec;

#[derive(Clone, Debug)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        Self::Relu(Relu)
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(x),
            Self::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(x),
            Self::Relu(a) => a.df(x),
        }
    }

    /// Returns the serializable description of this activation.
    pub fn spec(&self) -> ActFnSpec {
        match self {
            Self::Sigmoid(a) => ActFnSpec::Sigmoid { amp: a.amp() },
            Self::Relu(_) => ActFnSpec::Relu,
        }
    }

    /// Builds the activation described by `spec`.
    pub fn from_spec(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Sigmoid { amp } => Self::sigmoid(amp),
            ActFnSpec::Relu => Self::relu(),
        }
    }
}
