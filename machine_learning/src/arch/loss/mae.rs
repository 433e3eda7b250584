use ndarray::{Array2, ArrayView2};

use super::LossFn;

/// Mean absolute error, mostly used to report a loss in the same unit as the labels.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mae;

impl LossFn for Mae {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        (&y_pred - &y).mapv(f32::abs).mean().unwrap_or_default()
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len().max(1) as f32;
        (&y_pred - &y).mapv(|x| if x == 0. { 0. } else { x.signum() / n })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn mae_of_known_values() {
        let y_pred = array![[1.0f32], [3.0]];
        let y = array![[0.0f32], [1.0]];

        assert_eq!(Mae.loss(y_pred.view(), y.view()), 1.5);
        assert_eq!(Mae.loss_prime(y_pred.view(), y.view()), array![[0.5f32], [0.5]]);
    }
}
