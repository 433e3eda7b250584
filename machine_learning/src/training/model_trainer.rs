use std::num::NonZeroUsize;

use log::debug;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::Optimizer,
};

/// The losses measured during a single epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f32,
    pub val_loss: Option<f32>,
}

/// Trains a model it owns until it's asked to give it back.
pub trait Trainer: Send {
    type Model;

    /// Runs every configured epoch, checking `cancel` before starting each one of them.
    ///
    /// # Returns
    /// The stats of every epoch, or an error if training was cancelled or diverged.
    fn train(&mut self, cancel: &CancellationToken) -> Result<Vec<EpochStats>>;

    fn model(&self) -> &Self::Model;

    /// Consumes the trainer, returning the trained model.
    fn into_model(self: Box<Self>) -> Self::Model;
}

/// A model `Trainer`. Contains the relevant components needed for training a model,
/// including the model itself.
pub struct ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    model: M,
    optimizer: O,
    loss_fn: L,
    dataset: Dataset,
    validation: Option<Dataset>,

    epochs: usize,
    batch_size: NonZeroUsize,
    rng: R,
    name: String,
}

impl<M, O, L, R> ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer in charge of updating the model's parameters.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `dataset` - The dataset the model will be trained with.
    /// * `epochs` - The amount of passes over the dataset per `train` call.
    /// * `batch_size` - The amount of samples per parameter update.
    /// * `rng` - A random number generator, used to shuffle the dataset on every epoch.
    pub fn new(
        model: M,
        optimizer: O,
        loss_fn: L,
        dataset: Dataset,
        epochs: usize,
        batch_size: NonZeroUsize,
        rng: R,
    ) -> Self {
        Self {
            model,
            optimizer,
            loss_fn,
            dataset,
            validation: None,
            epochs,
            batch_size,
            rng,
            name: "model".to_string(),
        }
    }

    /// Sets the samples the validation loss is measured on after every epoch.
    pub fn with_validation(mut self, validation: Dataset) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Sets the name the trainer reports its progress with.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn validation(&self) -> Option<&Dataset> {
        self.validation.as_ref()
    }

    /// Performs `epochs` epochs of training its model, using its optimizer, dataset, loss
    /// function and batch size.
    ///
    /// # Arguments
    /// * `cancel` - Checked before every epoch, stops the training early when cancelled.
    ///
    /// # Returns
    /// The stats of each epoch.
    pub fn train(&mut self, cancel: &CancellationToken) -> Result<Vec<EpochStats>> {
        if self.dataset.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let mut history = Vec::with_capacity(self.epochs);

        for epoch in 0..self.epochs {
            if cancel.is_cancelled() {
                return Err(MlErr::Cancelled { epoch });
            }

            self.dataset.shuffle(&mut self.rng);
            let batches = self.dataset.batches(self.batch_size);
            let loss = self
                .model
                .backprop(&mut self.optimizer, &self.loss_fn, batches)?;

            if !loss.is_finite() {
                return Err(MlErr::NonFiniteLoss { epoch });
            }

            let val_loss = match &self.validation {
                Some(validation) => {
                    Some(self.model.evaluate(&self.loss_fn, validation.x(), validation.y())?)
                }
                None => None,
            };

            debug!(
                trainer = self.name.as_str(), epoch = epoch, loss = loss;
                "epoch finished, validation loss: {val_loss:?}"
            );

            history.push(EpochStats {
                epoch,
                loss,
                val_loss,
            });
        }

        Ok(history)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consumes the trainer, returning its model.
    pub fn into_model(self) -> M {
        self.model
    }
}

impl<M, O, L, R> Trainer for ModelTrainer<M, O, L, R>
where
    M: Model + Send,
    O: Optimizer + Send,
    L: LossFn + Send,
    R: Rng + Send,
{
    type Model = M;

    fn train(&mut self, cancel: &CancellationToken) -> Result<Vec<EpochStats>> {
        self.train(cancel)
    }

    fn model(&self) -> &M {
        self.model()
    }

    fn into_model(self: Box<Self>) -> M {
        (*self).into_model()
    }
}
