//! Mapping signal strengths and auxiliary inputs into the ranges the networks work with.

use fingerprinting::{
    NOT_OBSERVED, Position,
    signal::{self, MAX_SIGNAL, MIN_SIGNAL},
};
use serde::{Deserialize, Serialize};

use crate::{AccuracyErr, Result};

/// The smallest normalized value of a genuine reading, keeping it apart from the not observed
/// marker, which maps to zero.
pub const FLOOR: f32 = 0.05;

/// Linearly maps valid signal strengths in `[min, max]` into `[FLOOR, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    min: f64,
    max: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            min: MIN_SIGNAL,
            max: MAX_SIGNAL,
        }
    }
}

impl Normalizer {
    /// Creates a new `Normalizer`.
    ///
    /// # Returns
    /// An error if the bounds aren't finite or `min > max`.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(AccuracyErr::InvalidArgument(format!(
                "invalid normalization bounds [{min}, {max}]"
            )));
        }

        Ok(Self { min, max })
    }

    /// Takes the bounds from the extremes of the genuine readings among `rows`, falling back to
    /// the whole signal domain if there's none.
    pub fn fit<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let (min, max) = rows
            .into_iter()
            .flatten()
            .copied()
            .filter(|&v| signal::is_observed(v))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        if min > max {
            return Self::default();
        }

        Self { min, max }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn normalize_value(&self, value: f64) -> f32 {
        if value == NOT_OBSERVED {
            return 0.;
        }

        if self.max == self.min {
            return 1.;
        }

        let floor = FLOOR as f64;
        let unit = (value.clamp(self.min, self.max) - self.min) / (self.max - self.min);
        (floor + (1. - floor) * unit) as f32
    }

    pub fn denormalize_value(&self, value: f32) -> f64 {
        if value < FLOOR / 2. {
            return NOT_OBSERVED;
        }

        let floor = FLOOR as f64;
        let unit = ((value as f64).clamp(floor, 1.) - floor) / (1. - floor);
        self.min + unit * (self.max - self.min)
    }

    /// Normalizes `features`, padding the row with zeros up to `width`.
    ///
    /// # Returns
    /// An error if there are more features than `width`.
    pub fn normalize(&self, features: &[f64], width: usize) -> Result<Vec<f32>> {
        if features.len() > width {
            return Err(AccuracyErr::InvalidArgument(format!(
                "{} features don't fit in an input of width {width}",
                features.len()
            )));
        }

        let mut row: Vec<f32> = features.iter().map(|&v| self.normalize_value(v)).collect();
        row.resize(width, 0.);
        Ok(row)
    }

    /// The inverse of `normalize`, dropping the padding after the first `len` values.
    pub fn denormalize(&self, row: &[f32], len: usize) -> Vec<f64> {
        row.iter()
            .take(len)
            .map(|&v| self.denormalize_value(v))
            .collect()
    }
}

/// Min/max scaling of a single value into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    pub fn fit<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let (min, max) = values
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        if min > max {
            return Self { min: 0., max: 0. };
        }

        Self { min, max }
    }

    pub fn scale(&self, value: f64) -> f32 {
        if self.max == self.min {
            return 0.;
        }

        ((value - self.min) / (self.max - self.min)) as f32
    }
}

/// The scaling of everything the networks take besides the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxScaling {
    pub x: MinMax,
    pub y: MinMax,
    pub z: MinMax,
    pub k: MinMax,
    /// Labels are divided by this before training, predictions multiplied by it.
    pub label_scale: f64,
}

impl AuxScaling {
    /// Fits the scaling to the estimates, k values and labels seen during training.
    pub fn fit<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (&'a Position, usize, f64)>,
    {
        let samples: Vec<_> = samples.into_iter().collect();
        let max_label = samples.iter().map(|&(_, _, label)| label).fold(0., f64::max);

        Self {
            x: MinMax::fit(samples.iter().map(|&(p, _, _)| p.x())),
            y: MinMax::fit(samples.iter().map(|&(p, _, _)| p.y())),
            z: MinMax::fit(samples.iter().map(|&(p, _, _)| p.z())),
            k: MinMax::fit(samples.iter().map(|&(_, k, _)| k as f64)),
            label_scale: if max_label > 0. { max_label } else { 1. },
        }
    }

    /// The scaled coordinates of `position`.
    pub fn position(&self, position: &Position) -> [f32; 3] {
        [
            self.x.scale(position.x()),
            self.y.scale(position.y()),
            self.z.scale(position.z()),
        ]
    }

    /// The scaled coordinates of `position` followed by the scaled `k`.
    pub fn estimate(&self, position: &Position, k: usize) -> [f32; 4] {
        let [x, y, z] = self.position(position);
        [x, y, z, self.k.scale(k as f64)]
    }

    /// Inverse of the scaled label, never negative.
    pub fn label(&self, scaled: f32) -> f64 {
        (scaled as f64 * self.label_scale).max(0.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_maps_to_zero() {
        let normalizer = Normalizer::new(-100., -30.).unwrap();

        assert_eq!(normalizer.normalize_value(NOT_OBSERVED), 0.);
        assert_eq!(normalizer.normalize_value(-100.), FLOOR);
        assert_eq!(normalizer.normalize_value(-30.), 1.);
        assert_eq!(normalizer.denormalize_value(0.), NOT_OBSERVED);
    }

    #[test]
    fn round_trip_within_observed_bounds() {
        let normalizer = Normalizer::new(-98., -21.).unwrap();

        for i in 0..=77 {
            let value = -98. + i as f64;
            let back = normalizer.denormalize_value(normalizer.normalize_value(value));
            assert!((back - value).abs() < 1e-3, "{value} came back as {back}");
        }
    }

    #[test]
    fn rows_are_padded() {
        let normalizer = Normalizer::new(-90., -10.).unwrap();
        let row = normalizer.normalize(&[-10., NOT_OBSERVED], 4).unwrap();

        assert_eq!(row, vec![1., 0., 0., 0.]);
        assert_eq!(normalizer.denormalize(&row, 2), vec![-10., NOT_OBSERVED]);
        assert!(normalizer.normalize(&[-10.; 5], 4).is_err());
    }

    #[test]
    fn fit_ignores_the_sentinel() {
        let rows = [vec![-80., NOT_OBSERVED], vec![-40., -60.]];
        let normalizer = Normalizer::fit(rows.iter().map(Vec::as_slice));

        assert_eq!((normalizer.min(), normalizer.max()), (-80., -40.));
    }

    #[test]
    fn swapped_bounds_are_rejected() {
        assert!(Normalizer::new(-10., -90.).is_err());
    }

    #[test]
    fn aux_scaling_spans_the_unit_range() {
        let positions = [Position::xy(0., 10.), Position::xy(4., 20.)];
        let samples = [(&positions[0], 1, 2.), (&positions[1], 5, 8.)];
        let aux = AuxScaling::fit(samples.iter().copied());

        assert_eq!(aux.estimate(&positions[1], 3), [1., 1., 0., 0.5]);
        assert_eq!(aux.label(0.5), 4.);
    }

    #[test]
    fn aux_scaling_fits_from_a_single_pass() {
        let positions = [Position::xy(2., 2.), Position::xy(6., 2.)];
        let mut remaining = vec![(&positions[1], 3, 1.5), (&positions[0], 1, 3.)];
        let aux = AuxScaling::fit(std::iter::from_fn(|| remaining.pop()));

        assert_eq!(aux.position(&positions[0]), [0., 0., 0.]);
        assert_eq!(aux.estimate(&positions[1], 2), [1., 0., 0., 0.5]);
        assert_eq!(aux.label_scale, 3.);
    }
}
