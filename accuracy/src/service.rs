use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use fingerprinting::{Position, SignalReading};
use log::warn;
use tokio::{sync::RwLock, task};
use tokio_util::sync::CancellationToken;

use crate::{
    AccuracyErr, AccuracyModel, ModelPhase, Result, TrainingOptions, TrainingReport,
    sample::{AccuracyInput, AccuracySample},
};

/// A shareable handle to an accuracy model.
///
/// Predictions only take a read lock and may run concurrently. Training, saving and loading
/// take the write lock, so they're serialized with everything else, and run on the blocking
/// thread pool.
#[derive(Debug, Clone)]
pub struct ModelService {
    model: Arc<RwLock<AccuracyModel>>,
}

impl ModelService {
    pub fn new(model: AccuracyModel) -> Self {
        Self {
            model: Arc::new(RwLock::new(model)),
        }
    }

    pub async fn phase(&self) -> ModelPhase {
        self.model.read().await.phase()
    }

    pub async fn predict(&self, input: &AccuracyInput) -> Result<f64> {
        self.model.read().await.predict(input)
    }

    /// Predicts the error of an estimate made from `reading`, laid out by the model's emitters.
    pub async fn predict_reading(
        &self,
        reading: &SignalReading,
        estimate: Position,
        k: usize,
    ) -> Result<f64> {
        let model = self.model.read().await;
        let input = AccuracyInput {
            features: model.emitters().vectorize(reading),
            estimate,
            k,
        };

        model.predict(&input)
    }

    pub async fn predict_rssi(&self, position: &Position) -> Result<SignalReading> {
        self.model.read().await.predict_rssi(position)
    }

    /// Trains the model on the blocking thread pool.
    pub async fn train(
        &self,
        samples: Vec<AccuracySample>,
        options: TrainingOptions,
        cancel: CancellationToken,
    ) -> Result<TrainingReport> {
        let mut model = Arc::clone(&self.model).write_owned().await;
        task::spawn_blocking(move || model.train(&samples, &options, &cancel)).await?
    }

    pub async fn save(&self, dir: impl Into<PathBuf>) -> Result<()> {
        let dir = dir.into();
        let mut model = Arc::clone(&self.model).write_owned().await;
        task::spawn_blocking(move || model.save(&dir)).await?
    }

    pub async fn load(&self, dir: impl Into<PathBuf>) -> Result<()> {
        let dir = dir.into();
        let mut model = Arc::clone(&self.model).write_owned().await;
        task::spawn_blocking(move || model.load(&dir)).await?
    }

    /// Loads the model saved in `dir` if there's one.
    ///
    /// # Returns
    /// Whether a model was loaded, an error only if the artifact is broken.
    pub async fn load_or_cold_start(&self, dir: &Path) -> Result<bool> {
        match self.load(dir).await {
            Ok(()) => Ok(true),
            Err(AccuracyErr::ArtifactMissing(dir)) => {
                warn!("no accuracy model in {}, starting untrained", dir.display());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
