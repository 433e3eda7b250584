use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, layers::Layer, loss::LossFn};
use crate::{MlErr, Result, optimization::Optimizer, specs::ModelSpec};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model owns a single flat parameter buffer, each layer borrowing its own contiguous slice
/// of it in order.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
    params: Vec<f32>,
    grad: Vec<f32>,
    trainable: bool,
}

impl Sequential {
    /// Creates a new `Sequential` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();
        let size = layers.iter().map(Layer::size).sum();

        Self {
            layers,
            params: vec![0.; size],
            grad: vec![0.; size],
            trainable: true,
        }
    }

    /// Creates a new `Sequential` with the given parameters.
    ///
    /// # Returns
    /// An error if the amount of parameters doesn't match the layers.
    pub fn with_params<I>(layers: I, params: Vec<f32>) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let mut model = Self::new(layers);

        if params.len() != model.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: model.params.len(),
            });
        }

        model.params = params;
        Ok(model)
    }

    /// Builds an untrained `Sequential` following a spec.
    pub fn from_spec(spec: &ModelSpec) -> Self {
        match spec {
            ModelSpec::Sequential { layers } => {
                Self::new(layers.iter().map(|&spec| Layer::from_spec(spec)))
            }
        }
    }

    /// Returns the topology of this model.
    pub fn spec(&self) -> ModelSpec {
        ModelSpec::Sequential {
            layers: self.layers.iter().map(Layer::spec).collect(),
        }
    }

    /// Randomly initializes every layer's parameters.
    pub fn init<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let mut offset = 0;

        for layer in &self.layers {
            let size = layer.size();
            layer.init_params(&mut self.params[offset..offset + size], rng)?;
            offset += size;
        }

        Ok(())
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Returns the amount of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn input_size(&self) -> Option<usize> {
        self.layers.first().map(|layer| layer.dim().0)
    }

    pub fn output_size(&self) -> Option<usize> {
        self.layers.last().map(|layer| layer.dim().1)
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    /// Freezes (`false`) or unfreezes (`true`) the parameters of the model.
    pub fn set_trainable(&mut self, trainable: bool) {
        self.trainable = trainable;
    }

    /// Chains `other` after this model, keeping both parameter sets.
    ///
    /// # Returns
    /// An error if this model's output doesn't match `other`'s input.
    pub fn stack(mut self, other: Sequential) -> Result<Self> {
        if let (Some(out), Some(inp)) = (self.output_size(), other.input_size()) {
            if out != inp {
                return Err(MlErr::SizeMismatch {
                    what: "stacked model input",
                    got: inp,
                    expected: out,
                });
            }
        }

        self.layers.extend(other.layers);
        self.params.extend(other.params);
        self.grad = vec![0.; self.params.len()];
        self.trainable &= other.trainable;
        Ok(self)
    }

    /// Splits the model in two, the first one keeping the first `nlayers` layers.
    pub fn split_at(mut self, nlayers: usize) -> Result<(Self, Self)> {
        if nlayers > self.layers.len() {
            return Err(MlErr::SizeMismatch {
                what: "split point",
                got: nlayers,
                expected: self.layers.len(),
            });
        }

        let tail_layers = self.layers.split_off(nlayers);
        let head_size = self.layers.iter().map(Layer::size).sum();
        let tail_params = self.params.split_off(head_size);

        let trainable = self.trainable;
        let mut head = Self::with_params(self.layers, self.params)?;
        let mut tail = Self::with_params(tail_layers, tail_params)?;
        head.trainable = trainable;
        tail.trainable = trainable;

        Ok((head, tail))
    }

    /// Makes a forward pass through the network, keeping the metadata needed by `backprop`.
    fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in self.layers.iter_mut() {
            let size = layer.size();
            a = layer.forward(&self.params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.params.len()
    }

    fn predict(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if self.layers.is_empty() {
            return Err(MlErr::EmptyModel);
        }

        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in &self.layers {
            let size = layer.size();
            a = layer.predict(&self.params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    // NOTE: the epoch loss is approximated by averaging the loss of each batch, computed before
    // the batch's update is applied.
    fn backprop<'a, O, L, I>(&mut self, optimizer: &mut O, loss_fn: &L, batches: I) -> Result<f32>
    where
        O: Optimizer,
        L: LossFn,
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        if !self.trainable {
            return Err(MlErr::FrozenModel);
        }

        if self.layers.is_empty() {
            return Err(MlErr::EmptyModel);
        }

        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for (x, y) in batches {
            let y_pred = self.forward(x)?;

            if y_pred.dim() != y.dim() {
                return Err(MlErr::SizeMismatch {
                    what: "targets",
                    got: y.ncols(),
                    expected: y_pred.ncols(),
                });
            }

            total_loss += loss_fn.loss(y_pred.view(), y);
            num_batches += 1;

            let mut d = loss_fn.loss_prime(y_pred.view(), y);
            let Self {
                layers,
                params,
                grad,
                ..
            } = self;
            let mut end = params.len();

            for layer in layers.iter_mut().rev() {
                let start = end - layer.size();
                d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
                end = start;
            }

            optimizer.update_params(params, grad)?;
        }

        if num_batches == 0 {
            return Err(MlErr::EmptyDataset);
        }

        Ok(total_loss / num_batches as f32)
    }
}
