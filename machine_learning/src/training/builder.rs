use std::num::NonZeroUsize;

use rand::{SeedableRng, rngs::StdRng};

use super::{ModelTrainer, Trainer};
use crate::{
    MlErr, Result,
    arch::{
        Model,
        loss::{LossFn, Mae, Mse},
    },
    dataset::Dataset,
    optimization::{Adam, GradientDescent, Optimizer},
    specs::{LossFnSpec, OptimizerSpec, TrainerSpec},
};

/// Datasets smaller than this aren't split for validation.
pub const MIN_VALIDATION_SAMPLES: usize = 5;

/// Builds `Trainer`s given a specification.
#[derive(Default)]
pub struct TrainerBuilder {
    name: Option<String>,
}

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name the built trainers report their progress with.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds a new `Trainer` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the trainer.
    /// * `model` - The model to train.
    /// * `dataset` - The samples to train with, part of which may be held out for validation.
    ///
    /// # Returns
    /// An error if the spec holds an invalid hyperparameter.
    pub fn build<M>(
        &self,
        spec: &TrainerSpec,
        model: M,
        dataset: Dataset,
    ) -> Result<Box<dyn Trainer<Model = M>>>
    where
        M: Model + Send + 'static,
    {
        self.resolve_optimizer(spec, model, dataset)
    }

    fn resolve_optimizer<M>(
        &self,
        spec: &TrainerSpec,
        model: M,
        dataset: Dataset,
    ) -> Result<Box<dyn Trainer<Model = M>>>
    where
        M: Model + Send + 'static,
    {
        match spec.optimizer {
            OptimizerSpec::GradientDescent { learning_rate } => {
                check_learning_rate(learning_rate)?;
                let optimizer = GradientDescent::new(learning_rate);
                self.resolve_loss(spec, model, dataset, optimizer)
            }
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                check_learning_rate(learning_rate)?;
                let optimizer = Adam::with_hyperparameters(learning_rate, beta1, beta2, epsilon);
                self.resolve_loss(spec, model, dataset, optimizer)
            }
        }
    }

    fn resolve_loss<M, O>(
        &self,
        spec: &TrainerSpec,
        model: M,
        dataset: Dataset,
        optimizer: O,
    ) -> Result<Box<dyn Trainer<Model = M>>>
    where
        M: Model + Send + 'static,
        O: Optimizer + Send + 'static,
    {
        match spec.loss {
            LossFnSpec::Mse => self.terminate_build(spec, model, dataset, optimizer, Mse::new()),
            LossFnSpec::Mae => self.terminate_build(spec, model, dataset, optimizer, Mae),
        }
    }

    fn terminate_build<M, O, L>(
        &self,
        spec: &TrainerSpec,
        model: M,
        mut dataset: Dataset,
        optimizer: O,
        loss_fn: L,
    ) -> Result<Box<dyn Trainer<Model = M>>>
    where
        M: Model + Send + 'static,
        O: Optimizer + Send + 'static,
        L: LossFn + Send + 'static,
    {
        let batch_size = NonZeroUsize::new(spec.batch_size).ok_or_else(|| {
            MlErr::InvalidHyperparameter("batch size must be positive".to_string())
        })?;

        if spec.epochs == 0 {
            return Err(MlErr::InvalidHyperparameter(
                "epochs must be positive".to_string(),
            ));
        }

        if !(0. ..1.).contains(&spec.validation_split) {
            return Err(MlErr::InvalidHyperparameter(format!(
                "validation split {} is not in [0, 1)",
                spec.validation_split
            )));
        }

        let mut rng = self.generate_rng(spec.seed);
        let mut validation = None;

        if dataset.len() >= MIN_VALIDATION_SAMPLES {
            dataset.shuffle(&mut rng);
            (dataset, validation) = dataset.split(spec.validation_split);
        }

        let mut trainer = ModelTrainer::new(
            model,
            optimizer,
            loss_fn,
            dataset,
            spec.epochs,
            batch_size,
            rng,
        );

        if let Some(validation) = validation {
            trainer = trainer.with_validation(validation);
        }

        if let Some(name) = &self.name {
            trainer = trainer.with_name(name.as_str());
        }

        Ok(Box::new(trainer))
    }

    fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

fn check_learning_rate(learning_rate: f32) -> Result<()> {
    if !(learning_rate.is_finite() && learning_rate > 0.) {
        return Err(MlErr::InvalidHyperparameter(format!(
            "learning rate {learning_rate} must be positive"
        )));
    }

    Ok(())
}
