pub mod dataset;
pub mod engine;
pub mod error;
pub mod kdtree;
pub mod metric;
pub mod position;
pub mod signal;
pub mod store;

pub use engine::Engine;
pub use error::{FingerprintErr, Result};
pub use metric::Metric;
pub use position::Position;
pub use signal::{Emitters, NOT_OBSERVED, SignalReading};
pub use store::{Fingerprint, FingerprintStore, Neighbour};
