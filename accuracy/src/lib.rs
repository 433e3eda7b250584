pub mod arch;
pub mod error;
pub mod model;
pub mod normalization;
pub mod options;
pub mod pipeline;
pub mod registry;
pub mod sample;
pub mod service;

pub use arch::{ArchConfig, ArchPolicy};
pub use error::{AccuracyErr, Result};
pub use model::{AccuracyModel, ModelPhase, TrainingReport};
pub use options::{ModelOptions, TrainingOptions};
pub use sample::{AccuracyInput, AccuracySample};
pub use service::ModelService;
