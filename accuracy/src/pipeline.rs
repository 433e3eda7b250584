//! The positioning step of a processing pipeline.

use std::sync::Arc;

use fingerprinting::{Engine, Position, SignalReading};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{AccuracyErr, Result, registry::ModelRegistry};

/// The unit of data flowing through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub reading: SignalReading,
    pub position: Option<Position>,
    /// The error the accuracy model expects for `position`.
    pub predicted_error: Option<f64>,
}

impl Frame {
    pub fn new(reading: SignalReading) -> Self {
        Self {
            reading,
            ..Self::default()
        }
    }
}

/// A stage of the pipeline, transforming the frames pushed through it.
#[trait_variant::make(Step: Send)]
pub trait LocalStep {
    /// Processes a single frame.
    ///
    /// # Arguments
    /// * `frame` - The frame pushed into this step.
    ///
    /// # Returns
    /// The frame to push into the next step.
    async fn process(&self, frame: Frame) -> Result<Frame>;
}

/// Locates every frame's reading and attaches the predicted error of the estimate.
pub struct PositioningStep {
    engine: Arc<Engine>,
    registry: Arc<dyn ModelRegistry>,
    model_name: String,
    k: usize,
    weighted: bool,
}

impl PositioningStep {
    /// Creates a new `PositioningStep`.
    ///
    /// # Arguments
    /// * `engine` - The engine locating readings.
    /// * `registry` - Where the accuracy model is looked up, on every frame.
    /// * `model_name` - The name of the accuracy model.
    /// * `k` - The amount of neighbours per estimate.
    /// * `weighted` - Whether neighbours are weighted by distance.
    pub fn new(
        engine: Arc<Engine>,
        registry: Arc<dyn ModelRegistry>,
        model_name: impl Into<String>,
        k: usize,
        weighted: bool,
    ) -> Self {
        Self {
            engine,
            registry,
            model_name: model_name.into(),
            k,
            weighted,
        }
    }
}

impl Step for PositioningStep {
    async fn process(&self, mut frame: Frame) -> Result<Frame> {
        let position = self.engine.estimate(self.k, &frame.reading, self.weighted)?;
        frame.position = Some(position);

        let Some(model) = self.registry.resolve(&self.model_name).await else {
            debug!("no model named {}, skipping accuracy", self.model_name);
            return Ok(frame);
        };

        let predicted = model
            .predict_reading(&frame.reading, position, self.k)
            .await;

        frame.predicted_error = match predicted {
            Ok(error) => Some(error),
            Err(AccuracyErr::NotReady) => {
                debug!("model {} isn't ready, skipping accuracy", self.model_name);
                None
            }
            Err(e) => return Err(e),
        };

        Ok(frame)
    }
}
