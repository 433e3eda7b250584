use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    FingerprintErr, Result,
    kdtree::KdTree,
    metric::Metric,
    position::Position,
    signal::{self, Emitters, NOT_OBSERVED},
};

/// A reference measurement: the signal of every known emitter at a known position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub features: Vec<f64>,
    pub position: Position,
}

impl Fingerprint {
    pub fn new(features: Vec<f64>, position: Position) -> Self {
        Self { features, position }
    }
}

impl AsRef<[f64]> for Fingerprint {
    fn as_ref(&self) -> &[f64] {
        &self.features
    }
}

/// A stored fingerprint close to a query, along with its distance to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour<'a> {
    pub fingerprint: &'a Fingerprint,
    pub distance: f64,
}

/// The reference fingerprints, indexed for nearest neighbour queries.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    emitters: Emitters,
    fingerprints: Vec<Fingerprint>,
    tree: KdTree,
}

impl FingerprintStore {
    /// Creates a new empty `FingerprintStore`.
    ///
    /// # Arguments
    /// * `emitters` - The emitters every stored feature vector follows.
    /// * `metric` - The distance between feature vectors.
    pub fn new(emitters: Emitters, metric: Metric) -> Self {
        Self {
            emitters,
            fingerprints: Vec::new(),
            tree: KdTree::build::<Fingerprint>(&[], metric),
        }
    }

    /// Creates a store and loads `fingerprints` into it.
    pub fn with_fingerprints(
        emitters: Emitters,
        metric: Metric,
        fingerprints: Vec<Fingerprint>,
    ) -> Result<Self> {
        let mut store = Self::new(emitters, metric);
        store.load(fingerprints)?;
        Ok(store)
    }

    /// Replaces the stored fingerprints and rebuilds the index. The store is left untouched if
    /// the new fingerprints are rejected.
    ///
    /// # Returns
    /// An error if a feature vector doesn't have one valid signal per emitter, or if the
    /// positions don't share their dimensions.
    pub fn load(&mut self, fingerprints: Vec<Fingerprint>) -> Result<()> {
        if self.emitters.is_empty() {
            return Err(FingerprintErr::invalid("the store has no emitters"));
        }

        let dims = fingerprints.first().map(|f| f.position.dims());

        for (i, fingerprint) in fingerprints.iter().enumerate() {
            if fingerprint.features.len() != self.emitters.len() {
                return Err(FingerprintErr::invalid(format!(
                    "fingerprint {i} has {} features, expected {}",
                    fingerprint.features.len(),
                    self.emitters.len()
                )));
            }

            if Some(fingerprint.position.dims()) != dims {
                return Err(FingerprintErr::invalid(format!(
                    "fingerprint {i} is located in {} dimensions, expected {}",
                    fingerprint.position.dims(),
                    dims.unwrap_or_default()
                )));
            }

            for (emitter, &value) in self.emitters.ids().iter().zip(&fingerprint.features) {
                signal::check_signal(emitter, value)?;
            }
        }

        self.tree = KdTree::build(&fingerprints, self.tree.metric());
        self.fingerprints = fingerprints;

        debug!(
            fingerprints = self.fingerprints.len(), nodes = self.tree.node_count();
            "rebuilt fingerprint index"
        );

        Ok(())
    }

    /// Finds the `k` stored fingerprints closest to `query`.
    ///
    /// # Returns
    /// Every stored fingerprint if `k` exceeds their amount, sorted by ascending distance with
    /// ties in insertion order. An error if `query` doesn't have one value per emitter.
    pub fn nearest(&self, query: &[f64], k: usize) -> Result<Vec<Neighbour<'_>>> {
        if query.len() != self.emitters.len() {
            return Err(FingerprintErr::invalid(format!(
                "query has {} features, expected {}",
                query.len(),
                self.emitters.len()
            )));
        }

        let hits = self.tree.nearest(&self.fingerprints, query, k);
        let neighbours = hits
            .into_iter()
            .map(|hit| Neighbour {
                fingerprint: &self.fingerprints[hit.index],
                distance: hit.distance,
            })
            .collect();

        Ok(neighbours)
    }

    pub fn emitters(&self) -> &Emitters {
        &self.emitters
    }

    pub fn metric(&self) -> Metric {
        self.tree.metric()
    }

    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// Merges the fingerprints taken at the same position, in first seen order.
///
/// Each emitter's merged signal is the mean of the readings that observed it, or
/// `NOT_OBSERVED` if none did.
pub fn aggregate(fingerprints: Vec<Fingerprint>) -> Vec<Fingerprint> {
    let mut groups: Vec<(Position, Vec<f64>, Vec<usize>)> = Vec::new();
    let mut by_position: HashMap<Vec<u64>, usize> = HashMap::new();

    for fingerprint in fingerprints {
        let key = fingerprint.position.coords().iter().map(|c| c.to_bits()).collect();
        let group = *by_position.entry(key).or_insert_with(|| {
            let n = fingerprint.features.len();
            groups.push((fingerprint.position, vec![0.; n], vec![0; n]));
            groups.len() - 1
        });

        let (_, sums, counts) = &mut groups[group];

        for (i, &value) in fingerprint.features.iter().enumerate() {
            if value != NOT_OBSERVED && i < sums.len() {
                sums[i] += value;
                counts[i] += 1;
            }
        }
    }

    groups
        .into_iter()
        .map(|(position, sums, counts)| {
            let features = sums
                .into_iter()
                .zip(counts)
                .map(|(sum, n)| if n == 0 { NOT_OBSERVED } else { sum / n as f64 })
                .collect();
            Fingerprint::new(features, position)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FingerprintStore {
        let emitters = Emitters::new(["a", "b", "c"]).unwrap();
        FingerprintStore::with_fingerprints(
            emitters,
            Metric::Euclidean,
            vec![
                Fingerprint::new(vec![-50., -60., 100.], Position::xy(0., 0.)),
                Fingerprint::new(vec![-55., -65., 100.], Position::xy(10., 0.)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn nearest_sorts_by_distance() {
        let store = store();
        let neighbours = store.nearest(&[-56., -66., 100.], 2).unwrap();

        assert_eq!(neighbours[0].fingerprint.position, Position::xy(10., 0.));
        assert_eq!(neighbours[1].fingerprint.position, Position::xy(0., 0.));
        assert!(neighbours[0].distance < neighbours[1].distance);
    }

    #[test]
    fn rejected_load_keeps_the_previous_set() {
        let mut store = store();
        let result = store.load(vec![Fingerprint::new(vec![-50., -60.], Position::xy(0., 0.))]);

        assert!(matches!(result, Err(FingerprintErr::InvalidArgument(_))));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let mut store = store();
        let result = store.load(vec![
            Fingerprint::new(vec![-50., -60., 100.], Position::xy(0., 0.)),
            Fingerprint::new(vec![-50., -60., 100.], Position::xyz(0., 0., 1.)),
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn wrong_query_length_fails() {
        assert!(store().nearest(&[-50.], 1).is_err());
    }

    #[test]
    fn aggregate_averages_observed_signals() {
        let merged = aggregate(vec![
            Fingerprint::new(vec![-50., 100.], Position::xy(1., 1.)),
            Fingerprint::new(vec![-70., 100.], Position::xy(2., 2.)),
            Fingerprint::new(vec![-60., -80.], Position::xy(1., 1.)),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].features, vec![-55., -80.]);
        assert_eq!(merged[0].position, Position::xy(1., 1.));
        assert_eq!(merged[1].features, vec![-70., 100.]);
    }
}
