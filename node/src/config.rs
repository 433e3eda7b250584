use std::{
    env, fs,
    path::{Path, PathBuf},
};

use accuracy::TrainingOptions;
use fingerprinting::{Metric, dataset::CsvLayout};
use serde::{Deserialize, Serialize};

use crate::error::NodeErr;

/// The environment variable holding the config path when none is given as an argument.
pub const CONFIG_VAR: &str = "NODE_CONFIG";

/// What the node does once the fingerprint store is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Reports the positioning error over the test survey for every k.
    #[default]
    Evaluate,
    /// Trains the accuracy model and saves it into the model directory.
    Train,
    /// Locates every test reading and prints it along with its predicted error.
    Predict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub mode: Mode,
    /// The survey the fingerprint store is built from.
    pub train_csv: PathBuf,
    pub test_csv: Option<PathBuf>,
    pub layout: CsvLayout,
    pub ks: Vec<usize>,
    pub weighted: bool,
    pub metric: Metric,
    pub model_dir: PathBuf,
    /// The name the accuracy model is registered under.
    pub model_name: String,
    pub training: TrainingOptions,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            train_csv: PathBuf::from("data/train.csv"),
            test_csv: None,
            layout: CsvLayout::default(),
            ks: vec![1, 3, 5],
            weighted: true,
            metric: Metric::default(),
            model_dir: PathBuf::from("models/accuracy"),
            model_name: "accuracy".to_string(),
            training: TrainingOptions::default(),
        }
    }
}

impl NodeConfig {
    /// Reads the config from the path in the first argument, or else from `NODE_CONFIG`.
    pub fn from_env() -> Result<Self, NodeErr> {
        match env::args_os().nth(1).or_else(|| env::var_os(CONFIG_VAR)) {
            Some(path) => Self::from_path(Path::new(&path)),
            None => Err(NodeErr::InvalidConfig(format!(
                "pass a config path or set {CONFIG_VAR}"
            ))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, NodeErr> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, NodeErr> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// The k the positioning step uses, the first one listed.
    pub fn primary_k(&self) -> usize {
        self.ks.first().copied().unwrap_or(1)
    }

    fn validate(&self) -> Result<(), NodeErr> {
        if self.ks.is_empty() {
            return Err(invalid("at least one k is needed"));
        }

        if self.ks.contains(&0) {
            return Err(invalid("k must be positive"));
        }

        if self.layout.emitter_prefixes.is_empty() {
            return Err(invalid("at least one emitter column prefix is needed"));
        }

        if matches!(self.mode, Mode::Evaluate | Mode::Predict) && self.test_csv.is_none() {
            return Err(invalid("evaluating and predicting need a test survey"));
        }

        let training = &self.training;
        if training.epochs == 0 || training.batch_size == 0 {
            return Err(invalid("epochs and batch size must be positive"));
        }

        if !(training.learning_rate.is_finite() && training.learning_rate > 0.) {
            return Err(invalid("learning rate must be positive"));
        }

        if !(0. ..1.).contains(&training.validation_split) {
            return Err(invalid("validation split must be in [0, 1)"));
        }

        if self.model_name.is_empty() {
            return Err(invalid("model name can't be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> NodeErr {
    NodeErr::InvalidConfig(msg.to_string())
}
