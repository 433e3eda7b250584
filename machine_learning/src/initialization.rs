use rand::Rng;
use rand_distr::{Distribution, Uniform, uniform::Error as UniformError};

use crate::{MlErr, Result};

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::InvalidHyperparameter(value.to_string())
    }
}

/// A weight generator that follows a certain probabilistic distribution.
pub struct RandWeightGen<'r, R: Rng, D: Distribution<f32>> {
    rng: &'r mut R,
    distribution: D,
    remaining: usize,
}

impl<'r, R: Rng, D: Distribution<f32>> RandWeightGen<'r, R, D> {
    /// Creates a new `RandWeightGen` weight generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: &'r mut R, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }

    /// Samples up to `n` numbers, fewer if the limit is reached.
    pub fn sample(&mut self, n: usize) -> Vec<f32> {
        let n = n.min(self.remaining);
        self.remaining -= n;

        (0..n)
            .map(|_| self.distribution.sample(&mut *self.rng))
            .collect()
    }
}

impl<'r, R: Rng> RandWeightGen<'r, R, Uniform<f32>> {
    /// Creates a new `RandWeightGen` weight generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(rng: &'r mut R, limit: usize, low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(rng, Uniform::new(low, high)?, limit))
    }

    /// Creates a new `RandWeightGen` weight generator using Xavier uniform initialization.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated range is invalid.
    pub fn xavier_uniform(
        rng: &'r mut R,
        limit: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Self> {
        let range = (6. / (fan_in + fan_out).max(1) as f32).sqrt();
        Self::uniform(rng, limit, -range, range)
    }
}
