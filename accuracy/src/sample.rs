use fingerprinting::{Engine, Fingerprint, Position};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{AccuracyErr, Result};

/// What the accuracy model needs to judge a position estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyInput {
    /// The reading the estimate was made from, in the model's emitter order.
    pub features: Vec<f64>,
    pub estimate: Position,
    pub k: usize,
}

/// A training sample: an estimate along with how far off it actually was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySample {
    pub input: AccuracyInput,
    pub label: f64,
}

impl AccuracySample {
    /// Creates a new `AccuracySample`.
    ///
    /// # Returns
    /// An error if `k` is zero or the label isn't a finite, non negative distance.
    pub fn new(features: Vec<f64>, estimate: Position, k: usize, label: f64) -> Result<Self> {
        if k == 0 {
            return Err(AccuracyErr::InvalidArgument("k must be at least 1".to_string()));
        }

        if !(label.is_finite() && label >= 0.) {
            return Err(AccuracyErr::InvalidArgument(format!(
                "label {label} isn't a distance"
            )));
        }

        Ok(Self {
            input: AccuracyInput {
                features,
                estimate,
                k,
            },
            label,
        })
    }
}

/// Builds accuracy samples by locating every labelled fingerprint with each of the given `ks`
/// and measuring how far each estimate lands from the truth.
///
/// # Arguments
/// * `engine` - The engine whose estimates are judged.
/// * `labelled` - Fingerprints at known positions, laid out in the engine's emitter order.
/// * `ks` - The amounts of neighbours to try.
/// * `weighted` - Whether the engine weighs neighbours by distance.
pub fn synthesize(
    engine: &Engine,
    labelled: &[Fingerprint],
    ks: &[usize],
    weighted: bool,
) -> Result<Vec<AccuracySample>> {
    let mut samples = Vec::with_capacity(labelled.len() * ks.len());

    for &k in ks {
        for fingerprint in labelled {
            let estimate = engine.estimate_features(k, &fingerprint.features, weighted)?;
            let label = estimate.distance_to(&fingerprint.position);
            samples.push(AccuracySample::new(
                fingerprint.features.clone(),
                estimate,
                k,
                label,
            )?);
        }
    }

    debug!(samples = samples.len(), weighted = weighted; "synthesized accuracy samples");
    Ok(samples)
}
