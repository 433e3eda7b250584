use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{FingerprintErr, Result};

/// The maximum amount of coordinates of a `Position`.
pub const MAX_DIMS: usize = 3;

/// A point in one to three dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Position {
    coords: [f64; MAX_DIMS],
    dims: usize,
}

impl Position {
    /// Creates a new `Position`.
    ///
    /// # Arguments
    /// * `coords` - Between one and three coordinates.
    ///
    /// # Returns
    /// An error if the amount of coordinates is out of range.
    pub fn new(coords: &[f64]) -> Result<Self> {
        if coords.is_empty() || coords.len() > MAX_DIMS {
            return Err(FingerprintErr::invalid(format!(
                "a position has 1 to {MAX_DIMS} coordinates, got {}",
                coords.len()
            )));
        }

        let mut position = Self::origin(coords.len());
        position.coords[..coords.len()].copy_from_slice(coords);
        Ok(position)
    }

    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            coords: [x, y, 0.],
            dims: 2,
        }
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            coords: [x, y, z],
            dims: 3,
        }
    }

    /// The origin of a space with `dims` dimensions, clamped to the supported range.
    pub fn origin(dims: usize) -> Self {
        Self {
            coords: [0.; MAX_DIMS],
            dims: dims.clamp(1, MAX_DIMS),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords[..self.dims]
    }

    pub fn x(&self) -> f64 {
        self.coords[0]
    }

    pub fn y(&self) -> f64 {
        self.coords[1]
    }

    /// The third coordinate, zero for positions with fewer dimensions.
    pub fn z(&self) -> f64 {
        self.coords[2]
    }

    /// Euclidean distance to `other`, missing coordinates count as zero.
    pub fn distance_to(&self, other: &Position) -> f64 {
        self.coords
            .iter()
            .zip(other.coords)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.coords.iter().all(|c| c.is_finite())
    }

    /// Adds `other` scaled by `weight` to this position, keeping the larger dimensionality.
    pub fn add_scaled(&mut self, other: &Position, weight: f64) {
        for (c, o) in self.coords.iter_mut().zip(other.coords) {
            *c += o * weight;
        }

        self.dims = self.dims.max(other.dims);
    }

    /// Divides every coordinate by `divisor`.
    pub fn scale_down(&mut self, divisor: f64) {
        for c in &mut self.coords {
            *c /= divisor;
        }
    }
}

impl TryFrom<Vec<f64>> for Position {
    type Error = FingerprintErr;

    fn try_from(value: Vec<f64>) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Position> for Vec<f64> {
    fn from(value: Position) -> Self {
        value.coords().to_vec()
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;

        for (i, c) in self.coords().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }

            write!(f, "{c}")?;
        }

        write!(f, ")")
    }
}
