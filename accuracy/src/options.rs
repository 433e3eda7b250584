use serde::{Deserialize, Serialize};

use crate::{
    ArchConfig,
    normalization::{AuxScaling, Normalizer},
};

/// Hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingOptions {
    /// Epochs per phase.
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub validation_split: f32,
    /// Amplitude of the uniform noise added to the autoencoder's extra inputs.
    pub noise: f32,
    /// Whether to train the signal strength predictor after the regression head.
    pub train_rssi: bool,
    pub seed: Option<u64>,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            learning_rate: 1e-3,
            validation_split: 0.2,
            noise: 0.2,
            train_rssi: true,
            seed: None,
        }
    }
}

/// Everything besides the weights needed to run a persisted model, stored as `options.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOptions {
    pub access_points: Vec<String>,
    #[serde(rename = "minRSSI")]
    pub min_rssi: f64,
    #[serde(rename = "maxRSSI")]
    pub max_rssi: f64,
    pub aux: AuxScaling,
    pub architecture: ArchConfig,
}

impl ModelOptions {
    pub fn new(
        access_points: Vec<String>,
        normalizer: &Normalizer,
        aux: AuxScaling,
        architecture: ArchConfig,
    ) -> Self {
        Self {
            access_points,
            min_rssi: normalizer.min(),
            max_rssi: normalizer.max(),
            aux,
            architecture,
        }
    }
}
