use serde::{Deserialize, Serialize};

/// The distance used to compare feature vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Euclidean,
    Manhattan,
}

impl Metric {
    /// Measures the distance between two vectors of the same length.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let diffs = a.iter().zip(b).map(|(a, b)| (a - b).abs());

        match self {
            Metric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            Metric::Manhattan => diffs.sum(),
        }
    }

    /// A lower bound of the distance between two vectors that differ by `diff` along a single
    /// axis.
    pub fn axis_bound(&self, diff: f64) -> f64 {
        diff.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_distances() {
        let (a, b) = ([0., 0.], [3., 4.]);

        assert_eq!(Metric::Euclidean.distance(&a, &b), 5.);
        assert_eq!(Metric::Manhattan.distance(&a, &b), 7.);
        assert_eq!(Metric::default(), Metric::Euclidean);
    }
}
