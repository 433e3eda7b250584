//! The accuracy model: a denoising autoencoder whose frozen encoder feeds a regression head
//! predicting the error of a position estimate, plus a predictor of the fingerprint expected
//! at a position.

use std::{
    fs, io, mem,
    path::{Path, PathBuf},
};

use fingerprinting::{Emitters, Position, SignalReading, signal};
use log::{info, warn};
use machine_learning::{
    arch::{Model, Sequential},
    dataset::Dataset,
    optimization::{DEFAULT_BETA1, DEFAULT_BETA2, DEFAULT_EPSILON},
    persist,
    specs::{LossFnSpec, OptimizerSpec, TrainerSpec},
    training::{EpochStats, TrainerBuilder},
};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Uniform};
use tokio_util::sync::CancellationToken;

use crate::{
    AccuracyErr, ArchConfig, ArchPolicy, Result,
    arch::{AUX_INPUTS, POSITION_INPUTS},
    normalization::{AuxScaling, Normalizer},
    options::{ModelOptions, TrainingOptions},
    sample::{AccuracyInput, AccuracySample},
};

pub const ENCODER_DIR: &str = "encoder";
pub const DECODER_DIR: &str = "decoder";
pub const HEAD_DIR: &str = "head";
pub const RSSI_DIR: &str = "rssiModel";
pub const OPTIONS_FILE: &str = "options.json";

/// Where a model is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPhase {
    Untrained,
    Trained,
    /// Trained and saved to a directory.
    Persisted,
    /// Read back from a directory.
    Loaded,
}

/// The losses of every training phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub autoencoder: Vec<EpochStats>,
    pub head: Vec<EpochStats>,
    pub rssi: Vec<EpochStats>,
}

#[derive(Debug, Clone)]
struct Networks {
    encoder: Sequential,
    decoder: Sequential,
    head: Sequential,
    rssi: Sequential,
    normalizer: Normalizer,
    aux: AuxScaling,
}

#[derive(Debug, Clone)]
enum State {
    Untrained,
    Trained(Box<Networks>),
    Persisted(Box<Networks>, PathBuf),
    Loaded(Box<Networks>, PathBuf),
}

/// Predicts how far off a position estimate is.
///
/// Only the operations valid in the current phase succeed: predictions and saves need a
/// trained or loaded model and fail with `AccuracyErr::NotReady` otherwise.
#[derive(Debug, Clone)]
pub struct AccuracyModel {
    emitters: Emitters,
    arch: ArchConfig,
    state: State,
}

impl AccuracyModel {
    /// Creates a new untrained `AccuracyModel`.
    ///
    /// # Arguments
    /// * `emitters` - The emitters fingerprints are laid out by.
    /// * `policy` - The table the architecture is picked from.
    ///
    /// # Returns
    /// An error if no architecture fits the amount of emitters.
    pub fn new(emitters: Emitters, policy: &ArchPolicy) -> Result<Self> {
        let arch = policy.resolve(emitters.len())?;

        Ok(Self {
            emitters,
            arch,
            state: State::Untrained,
        })
    }

    /// Reads a model saved in `dir`, taking its emitters and architecture from the artifact.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let (emitters, arch, networks) = read_artifacts(dir)?;
        info!("loaded accuracy model from {}", dir.display());

        Ok(Self {
            emitters,
            arch,
            state: State::Loaded(Box::new(networks), dir.to_path_buf()),
        })
    }

    pub fn phase(&self) -> ModelPhase {
        match self.state {
            State::Untrained => ModelPhase::Untrained,
            State::Trained(_) => ModelPhase::Trained,
            State::Persisted(..) => ModelPhase::Persisted,
            State::Loaded(..) => ModelPhase::Loaded,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase() != ModelPhase::Untrained
    }

    pub fn emitters(&self) -> &Emitters {
        &self.emitters
    }

    pub fn arch(&self) -> &ArchConfig {
        &self.arch
    }

    /// The directory the model was last saved to or loaded from.
    pub fn artifact_dir(&self) -> Option<&Path> {
        match &self.state {
            State::Persisted(_, dir) | State::Loaded(_, dir) => Some(dir),
            _ => None,
        }
    }

    /// The signal bounds fitted while training.
    pub fn normalizer(&self) -> Option<Normalizer> {
        self.networks().ok().map(|networks| networks.normalizer)
    }

    /// Trains every network from scratch.
    ///
    /// The autoencoder learns to rebuild the normalized fingerprints, from noisy copies too.
    /// Its encoder and decoder are then frozen and the regression head learns the scaled error
    /// from `[code | x, y, z, k]`. Lastly, the signal strength predictor learns the normalized
    /// fingerprint from the estimated position.
    ///
    /// # Arguments
    /// * `samples` - The labelled estimates.
    /// * `options` - The hyperparameters of every phase.
    /// * `cancel` - Checked before every epoch.
    ///
    /// # Returns
    /// The losses of each phase. The model is left as it was on any error, cancellation
    /// included.
    pub fn train(
        &mut self,
        samples: &[AccuracySample],
        options: &TrainingOptions,
        cancel: &CancellationToken,
    ) -> Result<TrainingReport> {
        self.check_samples(samples)?;

        if options.epochs == 0 {
            return Err(AccuracyErr::InvalidArgument(
                "training needs at least one epoch".to_string(),
            ));
        }

        let width = self.arch.input_width;
        let normalizer = Normalizer::fit(samples.iter().map(|s| s.input.features.as_slice()));
        let aux = AuxScaling::fit(
            samples
                .iter()
                .map(|s| (&s.input.estimate, s.input.k, s.label)),
        );
        let rows = samples
            .iter()
            .map(|s| normalizer.normalize(&s.input.features, width))
            .collect::<Result<Vec<_>>>()?;

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        info!(
            samples = samples.len(), emitters = self.emitters.len(), input_width = width;
            "training accuracy model"
        );

        // Autoencoder
        let mut encoder = self.arch.encoder();
        let mut decoder = self.arch.decoder();
        encoder.init(&mut rng)?;
        decoder.init(&mut rng)?;
        let encoder_layers = encoder.len();

        let mut inputs = rows.clone();
        let mut targets = rows.clone();
        if options.noise > 0. {
            let noise = Uniform::new(0., options.noise).map_err(machine_learning::MlErr::from)?;
            inputs.extend(rows.iter().map(|row| {
                row.iter()
                    .map(|v| v + noise.sample(&mut rng))
                    .collect::<Vec<f32>>()
            }));
            targets.extend(rows.iter().cloned());
        }

        let dataset = Dataset::from_rows(&inputs, &targets)?;
        let spec = trainer_spec(options, rng.random());
        let (autoencoder, ae_history) =
            fit("autoencoder", &spec, encoder.stack(decoder)?, dataset, cancel)?;
        let (mut encoder, mut decoder) = autoencoder.split_at(encoder_layers)?;
        encoder.set_trainable(false);
        decoder.set_trainable(false);

        // Regression head over the frozen encoder
        let codes = encoder.predict(stack_rows(&rows, width)?.view())?;
        let head_inputs: Vec<Vec<f32>> = samples
            .iter()
            .zip(codes.rows())
            .map(|(s, code)| {
                let mut row = code.to_vec();
                row.extend(aux.estimate(&s.input.estimate, s.input.k));
                row
            })
            .collect();
        let labels: Vec<[f32; 1]> = samples
            .iter()
            .map(|s| [(s.label / aux.label_scale) as f32])
            .collect();

        let mut head = self.arch.head();
        head.init(&mut rng)?;
        let dataset = Dataset::from_rows(&head_inputs, &labels)?;
        let spec = trainer_spec(options, rng.random());
        let (head, head_history) = fit("head", &spec, head, dataset, cancel)?;

        // Signal strength predictor
        let mut rssi = self.arch.rssi();
        rssi.init(&mut rng)?;
        let mut rssi_history = Vec::new();

        if options.train_rssi {
            let positions: Vec<[f32; POSITION_INPUTS]> = samples
                .iter()
                .map(|s| aux.position(&s.input.estimate))
                .collect();
            let dataset = Dataset::from_rows(&positions, &rows)?;
            let spec = trainer_spec(options, rng.random());
            (rssi, rssi_history) = fit("rssi", &spec, rssi, dataset, cancel)?;
        }

        self.state = State::Trained(Box::new(Networks {
            encoder,
            decoder,
            head,
            rssi,
            normalizer,
            aux,
        }));

        Ok(TrainingReport {
            autoencoder: ae_history,
            head: head_history,
            rssi: rssi_history,
        })
    }

    /// Predicts the error of a position estimate.
    ///
    /// # Returns
    /// The expected distance between the estimate and the true position, `NotReady` if the model
    /// hasn't been trained or loaded, or `NumericInstability` if the networks don't output a
    /// finite value.
    pub fn predict(&self, input: &AccuracyInput) -> Result<f64> {
        let networks = self.networks()?;
        self.check_features(&input.features)?;

        if input.k == 0 {
            return Err(AccuracyErr::InvalidArgument("k must be at least 1".to_string()));
        }

        let row = networks
            .normalizer
            .normalize(&input.features, self.arch.input_width)?;
        let code = networks.encoder.predict(single_row(row).view())?;

        let mut head_input = code.row(0).to_vec();
        head_input.extend(networks.aux.estimate(&input.estimate, input.k));
        let output = networks.head.predict(single_row(head_input).view())?;

        let scaled = output[[0, 0]];
        if !scaled.is_finite() {
            return Err(AccuracyErr::NumericInstability(format!(
                "the accuracy head output {scaled}"
            )));
        }

        Ok(networks.aux.label(scaled))
    }

    /// Predicts the reading expected at `position`.
    pub fn predict_rssi(&self, position: &Position) -> Result<SignalReading> {
        let networks = self.networks()?;
        let input = networks.aux.position(position).to_vec();
        let output = networks.rssi.predict(single_row(input).view())?;

        if output.iter().any(|v| !v.is_finite()) {
            return Err(AccuracyErr::NumericInstability(
                "the signal strength predictor output a non finite value".to_string(),
            ));
        }

        let row = output.row(0).to_vec();
        let features = networks.normalizer.denormalize(&row, self.emitters.len());
        Ok(self.emitters.reading(&features)?)
    }

    /// Saves the model into `dir`, replacing whatever it held.
    ///
    /// Everything is first written to a sibling temporary directory which is then renamed over
    /// `dir`, so a failed save never leaves a partial artifact behind.
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        let networks = self.networks()?;

        let parent = match dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".accuracy-model-")
            .tempdir_in(parent)?;

        persist::save(&networks.encoder, &staging.path().join(ENCODER_DIR))?;
        persist::save(&networks.decoder, &staging.path().join(DECODER_DIR))?;
        persist::save(&networks.head, &staging.path().join(HEAD_DIR))?;
        persist::save(&networks.rssi, &staging.path().join(RSSI_DIR))?;

        let options = ModelOptions::new(
            self.emitters.ids().to_vec(),
            &networks.normalizer,
            networks.aux,
            self.arch.clone(),
        );
        let options = serde_json::to_vec_pretty(&options)?;
        fs::write(staging.path().join(OPTIONS_FILE), options)?;

        replace_dir(staging.path(), dir)?;
        info!("saved accuracy model to {}", dir.display());

        self.state = match mem::replace(&mut self.state, State::Untrained) {
            State::Trained(networks)
            | State::Persisted(networks, _)
            | State::Loaded(networks, _) => State::Persisted(networks, dir.to_path_buf()),
            State::Untrained => State::Untrained,
        };

        Ok(())
    }

    /// Replaces this model with the one saved in `dir`.
    ///
    /// # Returns
    /// `ArtifactMissing` if there's no saved model in `dir`, which callers usually treat as a
    /// cold start. Any other error means the artifact is broken. The model is left as it was
    /// on any error.
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        let (emitters, arch, networks) = read_artifacts(dir)?;

        if emitters != self.emitters {
            warn!(
                "the model in {} was trained on {} emitters, replacing the {} configured ones",
                dir.display(),
                emitters.len(),
                self.emitters.len()
            );
        }

        self.emitters = emitters;
        self.arch = arch;
        self.state = State::Loaded(Box::new(networks), dir.to_path_buf());

        info!("loaded accuracy model from {}", dir.display());
        Ok(())
    }

    fn networks(&self) -> Result<&Networks> {
        match &self.state {
            State::Untrained => Err(AccuracyErr::NotReady),
            State::Trained(networks)
            | State::Persisted(networks, _)
            | State::Loaded(networks, _) => Ok(&**networks),
        }
    }

    fn check_features(&self, features: &[f64]) -> Result<()> {
        if features.len() != self.emitters.len() {
            return Err(AccuracyErr::InvalidArgument(format!(
                "expected {} features, got {}",
                self.emitters.len(),
                features.len()
            )));
        }

        for (emitter, &value) in self.emitters.ids().iter().zip(features) {
            signal::check_signal(emitter, value)?;
        }

        Ok(())
    }

    fn check_samples(&self, samples: &[AccuracySample]) -> Result<()> {
        if samples.is_empty() {
            return Err(AccuracyErr::InvalidArgument(
                "there are no samples to train with".to_string(),
            ));
        }

        for sample in samples {
            self.check_features(&sample.input.features)?;

            if sample.input.k == 0 || !(sample.label.is_finite() && sample.label >= 0.) {
                return Err(AccuracyErr::InvalidArgument(format!(
                    "sample with k {} and label {} is invalid",
                    sample.input.k, sample.label
                )));
            }
        }

        Ok(())
    }
}

fn trainer_spec(options: &TrainingOptions, seed: u64) -> TrainerSpec {
    TrainerSpec {
        optimizer: OptimizerSpec::Adam {
            learning_rate: options.learning_rate,
            beta1: DEFAULT_BETA1,
            beta2: DEFAULT_BETA2,
            epsilon: DEFAULT_EPSILON,
        },
        loss: LossFnSpec::Mse,
        epochs: options.epochs,
        batch_size: options.batch_size,
        validation_split: options.validation_split,
        seed: Some(seed),
    }
}

/// Trains `model` through a single phase.
fn fit(
    phase: &str,
    spec: &TrainerSpec,
    model: Sequential,
    dataset: Dataset,
    cancel: &CancellationToken,
) -> Result<(Sequential, Vec<EpochStats>)> {
    info!(phase = phase, samples = dataset.len(); "training phase started");

    let mut trainer = TrainerBuilder::new()
        .named(phase)
        .build(spec, model, dataset)?;
    let history = trainer.train(cancel)?;

    if let Some(last) = history.last() {
        info!(
            phase = phase, loss = last.loss;
            "training phase finished, validation loss: {:?}", last.val_loss
        );
    }

    Ok((trainer.into_model(), history))
}

fn single_row(row: Vec<f32>) -> Array2<f32> {
    Array1::from_vec(row).insert_axis(Axis(0))
}

fn stack_rows(rows: &[Vec<f32>], width: usize) -> Result<Array2<f32>> {
    Array2::from_shape_vec((rows.len(), width), rows.concat())
        .map_err(|e| AccuracyErr::InvalidArgument(format!("ragged fingerprint rows: {e}")))
}

/// Moves `staging` to `target`, swapping out whatever `target` held.
fn replace_dir(staging: &Path, target: &Path) -> io::Result<()> {
    if !target.exists() {
        return fs::rename(staging, target);
    }

    let backup = staging.with_extension("old");
    fs::rename(target, &backup)?;

    if let Err(e) = fs::rename(staging, target) {
        if let Err(restore) = fs::rename(&backup, target) {
            warn!(
                "couldn't restore {} from {}: {restore}",
                target.display(),
                backup.display()
            );
        }

        return Err(e);
    }

    fs::remove_dir_all(&backup)
}

fn read_artifacts(dir: &Path) -> Result<(Emitters, ArchConfig, Networks)> {
    if !dir.join(ENCODER_DIR).join(persist::TOPOLOGY_FILE).is_file() {
        return Err(AccuracyErr::ArtifactMissing(dir.to_path_buf()));
    }

    let options = fs::read(dir.join(OPTIONS_FILE))?;
    let options: ModelOptions = serde_json::from_slice(&options)
        .map_err(|e| AccuracyErr::Corrupt(format!("{OPTIONS_FILE}: {e}")))?;

    let corrupt = |e: AccuracyErr| AccuracyErr::Corrupt(format!("{OPTIONS_FILE}: {e}"));
    let emitters = Emitters::new(options.access_points).map_err(|e| corrupt(e.into()))?;
    let normalizer = Normalizer::new(options.min_rssi, options.max_rssi).map_err(corrupt)?;
    let arch = options.architecture;

    if emitters.is_empty() || emitters.len() > arch.input_width {
        return Err(AccuracyErr::Corrupt(format!(
            "{} emitters don't fit an input of width {}",
            emitters.len(),
            arch.input_width
        )));
    }

    let mut encoder = persist::load(&dir.join(ENCODER_DIR))?;
    let mut decoder = persist::load(&dir.join(DECODER_DIR))?;
    let head = persist::load(&dir.join(HEAD_DIR))?;
    let rssi = persist::load(&dir.join(RSSI_DIR))?;

    check_shape(ENCODER_DIR, &encoder, arch.input_width, arch.code_width)?;
    check_shape(DECODER_DIR, &decoder, arch.code_width, arch.input_width)?;
    check_shape(HEAD_DIR, &head, arch.code_width + AUX_INPUTS, 1)?;
    check_shape(RSSI_DIR, &rssi, POSITION_INPUTS, arch.input_width)?;

    encoder.set_trainable(false);
    decoder.set_trainable(false);

    let networks = Networks {
        encoder,
        decoder,
        head,
        rssi,
        normalizer,
        aux: options.aux,
    };

    Ok((emitters, arch, networks))
}

fn check_shape(name: &str, model: &Sequential, input: usize, output: usize) -> Result<()> {
    if model.input_size() != Some(input) || model.output_size() != Some(output) {
        return Err(AccuracyErr::Corrupt(format!(
            "{name} maps {:?} inputs to {:?} outputs, expected {input} to {output}",
            model.input_size(),
            model.output_size()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_swap_puts_the_previous_directory_back() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("accuracy");
        fs::create_dir(&target).unwrap();
        fs::write(target.join(OPTIONS_FILE), b"{}").unwrap();

        let missing_staging = dir.path().join("staging");
        assert!(replace_dir(&missing_staging, &target).is_err());

        assert!(target.join(OPTIONS_FILE).is_file());
        assert!(!missing_staging.with_extension("old").exists());
    }

    #[test]
    fn swap_replaces_the_previous_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("accuracy");
        let staging = dir.path().join("staging");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("stale"), b"").unwrap();
        fs::create_dir(&staging).unwrap();
        fs::write(staging.join(OPTIONS_FILE), b"{}").unwrap();

        replace_dir(&staging, &target).unwrap();

        assert!(target.join(OPTIONS_FILE).is_file());
        assert!(!target.join("stale").exists());
        assert!(!staging.exists());
    }
}
