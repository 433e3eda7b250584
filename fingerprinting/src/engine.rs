use crate::{
    FingerprintErr, Result,
    position::Position,
    signal::SignalReading,
    store::{Fingerprint, FingerprintStore, Neighbour},
};

/// Distances below this are treated as this when weighting neighbours.
pub const EPSILON: f64 = 1e-9;

/// Locates live readings by comparing them against the stored fingerprints.
#[derive(Debug, Clone)]
pub struct Engine {
    store: FingerprintStore,
}

impl Engine {
    pub fn new(store: FingerprintStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    /// Estimates the position `reading` was taken at.
    ///
    /// # Arguments
    /// * `k` - The amount of neighbours the estimate is built from.
    /// * `reading` - The live reading, emitters it lacks count as not observed.
    /// * `weighted` - Whether closer neighbours weigh more, by their inverse squared distance.
    ///
    /// # Returns
    /// The centroid of the neighbours, or an error if `k` is zero, the store is empty or the
    /// centroid isn't finite.
    pub fn estimate(&self, k: usize, reading: &SignalReading, weighted: bool) -> Result<Position> {
        let features = self.store.emitters().vectorize(reading);
        self.estimate_features(k, &features, weighted)
    }

    /// Same as `estimate`, for a reading already laid out in the store's emitter order.
    pub fn estimate_features(
        &self,
        k: usize,
        features: &[f64],
        weighted: bool,
    ) -> Result<Position> {
        if k == 0 {
            return Err(FingerprintErr::invalid("k must be at least 1"));
        }

        if self.store.is_empty() {
            return Err(FingerprintErr::invalid("the fingerprint store is empty"));
        }

        let neighbours = self.store.nearest(features, k)?;
        let estimate = if weighted {
            weighted_centroid(&neighbours)
        } else {
            centroid(&neighbours)
        };

        if !estimate.is_finite() {
            return Err(FingerprintErr::NumericInstability(format!(
                "estimate {estimate} from {} neighbours isn't finite",
                neighbours.len()
            )));
        }

        Ok(estimate)
    }

    /// Measures how far the estimate of every fingerprint in `samples` lands from its true
    /// position.
    pub fn errors(&self, k: usize, samples: &[Fingerprint], weighted: bool) -> Result<Vec<f64>> {
        samples
            .iter()
            .map(|sample| {
                let estimate = self.estimate_features(k, &sample.features, weighted)?;
                Ok(estimate.distance_to(&sample.position))
            })
            .collect()
    }
}

fn dims(neighbours: &[Neighbour<'_>]) -> usize {
    neighbours
        .iter()
        .map(|n| n.fingerprint.position.dims())
        .max()
        .unwrap_or(1)
}

fn centroid(neighbours: &[Neighbour<'_>]) -> Position {
    let mut point = Position::origin(dims(neighbours));

    for neighbour in neighbours {
        point.add_scaled(&neighbour.fingerprint.position, 1.);
    }

    point.scale_down(neighbours.len() as f64);
    point
}

fn weighted_centroid(neighbours: &[Neighbour<'_>]) -> Position {
    let weights: Vec<f64> = neighbours
        .iter()
        .map(|n| 1. / n.distance.max(EPSILON).powi(2))
        .collect();
    let total: f64 = weights.iter().sum();
    let mut point = Position::origin(dims(neighbours));

    for (neighbour, weight) in neighbours.iter().zip(weights) {
        point.add_scaled(&neighbour.fingerprint.position, weight / total);
    }

    point
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Emitters, Metric};

    fn engine() -> Engine {
        let emitters = Emitters::new(["a", "b"]).unwrap();
        let store = FingerprintStore::with_fingerprints(
            emitters,
            Metric::Euclidean,
            vec![
                Fingerprint::new(vec![-40., -80.], Position::xy(0., 0.)),
                Fingerprint::new(vec![-80., -40.], Position::xy(4., 0.)),
            ],
        )
        .unwrap();

        Engine::new(store)
    }

    #[test]
    fn weighted_estimate_leans_towards_the_closest() {
        let engine = engine();
        let estimate = engine.estimate_features(2, &[-45., -75.], true).unwrap();

        assert!(estimate.x() < 1.);
        assert!(estimate.x() > 0.);
    }

    #[test]
    fn zero_k_is_rejected() {
        let result = engine().estimate(0, &SignalReading::new(), false);
        assert!(matches!(result, Err(FingerprintErr::InvalidArgument(_))));
    }

    #[test]
    fn empty_store_is_rejected() {
        let emitters = Emitters::new(["a"]).unwrap();
        let engine = Engine::new(FingerprintStore::new(emitters, Metric::Euclidean));

        assert!(matches!(
            engine.estimate(1, &SignalReading::new(), true),
            Err(FingerprintErr::InvalidArgument(_))
        ));
    }

    #[test]
    fn errors_measure_the_miss() {
        let engine = engine();
        let samples = [Fingerprint::new(vec![-40., -80.], Position::xy(3., 4.))];

        assert_eq!(engine.errors(1, &samples, false).unwrap(), vec![5.]);
    }
}
