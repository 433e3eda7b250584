use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory supervised dataset, each row holding `x_size` inputs followed by `y_size`
/// expected outputs.
#[derive(Debug, Clone)]
pub struct Dataset {
    x_size: usize,
    data: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset` from a flat row-major buffer.
    ///
    /// # Arguments
    /// * `data` - The samples, one after the other.
    /// * `x_size` - The amount of inputs per sample.
    /// * `y_size` - The amount of outputs per sample.
    ///
    /// # Returns
    /// An error if the buffer doesn't hold a whole amount of samples.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row_size = x_size + y_size;

        if row_size == 0 || data.len() % row_size != 0 {
            return Err(MlErr::SizeMismatch {
                what: "dataset buffer",
                got: data.len(),
                expected: row_size,
            });
        }

        let len = data.len() / row_size;
        let data = Array2::from_shape_vec((len, row_size), data).map_err(|_| {
            MlErr::SizeMismatch {
                what: "dataset buffer",
                got: len,
                expected: row_size,
            }
        })?;

        Ok(Self { x_size, data })
    }

    /// Creates a new `Dataset` pairing every input row with its output row.
    pub fn from_rows<X, Y>(xs: &[X], ys: &[Y]) -> Result<Self>
    where
        X: AsRef<[f32]>,
        Y: AsRef<[f32]>,
    {
        if xs.len() != ys.len() {
            return Err(MlErr::SizeMismatch {
                what: "dataset outputs",
                got: ys.len(),
                expected: xs.len(),
            });
        }

        let x_size = xs.first().map_or(0, |x| x.as_ref().len());
        let y_size = ys.first().map_or(0, |y| y.as_ref().len());
        let mut data = Vec::with_capacity(xs.len() * (x_size + y_size));

        for (x, y) in xs.iter().zip(ys) {
            let (x, y) = (x.as_ref(), y.as_ref());

            if x.len() != x_size || y.len() != y_size {
                return Err(MlErr::SizeMismatch {
                    what: "dataset row",
                    got: x.len() + y.len(),
                    expected: x_size + y_size,
                });
            }

            data.extend_from_slice(x);
            data.extend_from_slice(y);
        }

        Self::new(data, x_size, y_size)
    }

    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.data.ncols() - self.x_size
    }

    /// Returns every input row.
    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., ..self.x_size])
    }

    /// Returns every expected output row.
    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., self.x_size..])
    }

    /// Shuffles the samples in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.data = self.data.select(Axis(0), &order);
    }

    /// Holds out the trailing `ratio` of the samples for validation.
    ///
    /// # Returns
    /// The training set and, if any sample was held out, the validation set.
    pub fn split(self, ratio: f32) -> (Self, Option<Self>) {
        let held_out = (self.len() as f32 * ratio.clamp(0., 1.)).floor() as usize;

        if held_out == 0 || held_out == self.len() {
            return (self, None);
        }

        let cut = self.len() - held_out;
        let train = Self {
            x_size: self.x_size,
            data: self.data.slice(s![..cut, ..]).to_owned(),
        };
        let validation = Self {
            x_size: self.x_size,
            data: self.data.slice(s![cut.., ..]).to_owned(),
        };

        (train, Some(validation))
    }

    /// Iterates the samples in batches of at most `batch_size` rows.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let x_size = self.x_size;

        self.data
            .axis_chunks_iter(Axis(0), batch_size.get())
            .map(move |batch| batch.split_at(Axis(1), x_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn dataset() -> Dataset {
        let data = (0..10).flat_map(|i| [i as f32, i as f32 + 100.]).collect();
        Dataset::new(data, 1, 1).unwrap()
    }

    #[test]
    fn batches_respect_batch_size() {
        let ds = dataset();
        let batches: Vec<_> = ds.batches(NonZeroUsize::new(4).unwrap()).collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].0.nrows(), 4);
        assert_eq!(batches[2].0.nrows(), 2);
        assert_eq!(batches[2].0[[1, 0]], 9.);
        assert_eq!(batches[2].1[[1, 0]], 109.);
    }

    #[test]
    fn shuffle_keeps_rows_together() {
        let mut ds = dataset();
        ds.shuffle(&mut StdRng::seed_from_u64(3));

        for (x, y) in ds.x().iter().zip(ds.y().iter()) {
            assert_eq!(*x + 100., *y);
        }
    }

    #[test]
    fn split_holds_out_the_tail() {
        let (train, validation) = dataset().split(0.2);
        let validation = validation.unwrap();

        assert_eq!(train.len(), 8);
        assert_eq!(validation.len(), 2);
        assert_eq!(validation.x()[[0, 0]], 8.);
    }

    #[test]
    fn split_of_tiny_dataset_holds_nothing_out() {
        let ds = Dataset::new(vec![1., 2.], 1, 1).unwrap();
        let (train, validation) = ds.split(0.2);

        assert_eq!(train.len(), 1);
        assert!(validation.is_none());
    }

    #[test]
    fn ragged_buffer_fails() {
        assert!(Dataset::new(vec![1., 2., 3.], 1, 1).is_err());
    }

    #[test]
    fn from_rows_pairs_inputs_and_outputs() {
        let ds = Dataset::from_rows(&[vec![1., 2.], vec![3., 4.]], &[[5.], [6.]]).unwrap();

        assert_eq!(ds.x_size(), 2);
        assert_eq!(ds.y_size(), 1);
        assert_eq!(ds.y()[[1, 0]], 6.);
    }
}
