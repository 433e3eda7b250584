use ndarray::{Array2, ArrayView2};

use crate::{arch::loss::LossFn, error::Result, optimization::Optimizer};

pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Computes the model's output for `x` without touching any training metadata.
    fn predict(&self, x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model over
    /// the provided batches. **The parameters get updated** for each batch according to the
    /// optimization algorithm.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer that dictates how to update the weights on each gradient calculation.
    /// * `loss_fn` - The loss function.
    /// * `batches` - The batches of data.
    ///
    /// # Returns
    /// The epoch loss.
    fn backprop<'a, O, L, I>(&mut self, optimizer: &mut O, loss_fn: &L, batches: I) -> Result<f32>
    where
        O: Optimizer,
        L: LossFn,
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>;

    /// Measures the loss of the model over `x` against the expected `y`.
    fn evaluate<L>(&self, loss_fn: &L, x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32>
    where
        L: LossFn,
    {
        let y_pred = self.predict(x)?;
        Ok(loss_fn.loss(y_pred.view(), y))
    }
}
