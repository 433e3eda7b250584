use ndarray::{linalg, prelude::*};
use rand::Rng;

use crate::{
    MlErr, Result, arch::activations::ActFn, initialization::RandWeightGen, specs::LayerSpec,
};

/// A fully connected layer.
///
/// Its parameters live outside the layer, laid out as the `(n, m)` row-major weight matrix
/// followed by the `m` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - An optional activation applied to the weighted sums.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn spec(&self) -> LayerSpec {
        LayerSpec::Dense {
            dim: self.dim,
            act_fn: self.act_fn.as_ref().map(ActFn::spec),
        }
    }

    /// Fills `params` with Xavier uniform weights and zeroed biases.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `rng` - A random number generator.
    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        self.check_len("dense parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let (weights, biases) = params.split_at_mut(w_size);
        let mut weight_gen = RandWeightGen::xavier_uniform(rng, w_size, self.dim.0, self.dim.1)?;

        for (w, sample) in weights.iter_mut().zip(weight_gen.sample(w_size)) {
            *w = sample;
        }

        biases.fill(0.);
        Ok(())
    }

    /// Computes the output of the layer without keeping any metadata for a later backward pass.
    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.weighted_sums(params, x)?;
        Ok(self.activate(z))
    }

    /// Computes the output of the layer, remembering its input and weighted sums.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.weighted_sums(params, x)?;

        self.x = x.to_owned();
        self.z = z.clone();

        Ok(self.activate(z))
    }

    /// Writes this layer's gradient into `grad` and propagates the delta to the previous layer.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `grad` - This layer's gradient slice.
    /// * `d` - The delta coming from the next layer.
    ///
    /// # Returns
    /// The delta for the previous layer.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense delta rows",
                got: d.nrows(),
                expected: self.z.nrows(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    fn weighted_sums(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
        z += &b;
        Ok(z)
    }

    fn activate(&self, mut z: Array2<f32>) -> Array2<f32> {
        if let Some(act_fn) = &self.act_fn {
            z.mapv_inplace(|z| act_fn.f(z));
        }

        z
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(|_| self.shape_err())?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).map_err(|_| self.shape_err())?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let (w_raw, b_raw) = params.split_at(w_size);
        let weights = ArrayView2::from_shape(self.dim, w_raw).map_err(|_| self.shape_err())?;
        let biases = ArrayView1::from_shape(self.dim.1, b_raw).map_err(|_| self.shape_err())?;
        Ok((weights, biases))
    }

    fn shape_err(&self) -> MlErr {
        MlErr::SizeMismatch {
            what: "dense shape",
            got: 0,
            expected: self.size,
        }
    }
}
