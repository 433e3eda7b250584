mod builder;
mod model_trainer;

pub use builder::TrainerBuilder;
pub use model_trainer::{EpochStats, ModelTrainer, Trainer};
