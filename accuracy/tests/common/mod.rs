#![allow(dead_code)]

use accuracy::{AccuracySample, TrainingOptions, sample};
use fingerprinting::{
    Emitters, Engine, Fingerprint, FingerprintStore, Metric, NOT_OBSERVED, Position,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

pub const EMITTERS: usize = 6;

pub fn emitters() -> Emitters {
    Emitters::new((0..EMITTERS).map(|i| format!("WAP{i:03}"))).unwrap()
}

/// Fingerprints on a grid, each emitter fading with the distance to its corner of the room.
pub fn fingerprints(seed: u64, n: usize) -> Vec<Fingerprint> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..n)
        .map(|_| {
            let (x, y) = (rng.random_range(0.0..20.0), rng.random_range(0.0..20.0));
            let position = Position::xy(x, y);
            let features = (0..EMITTERS)
                .map(|i| {
                    let source = Position::xy((i % 3) as f64 * 10., (i / 3) as f64 * 20.);
                    let fading = 2.5 * source.distance_to(&position);
                    let rssi = -30. - fading + rng.random_range(-2.0..2.0);
                    if rssi < -95. { NOT_OBSERVED } else { rssi }
                })
                .collect();

            Fingerprint::new(features, position)
        })
        .collect()
}

pub fn engine() -> Engine {
    let store =
        FingerprintStore::with_fingerprints(emitters(), Metric::Euclidean, fingerprints(1, 80))
            .unwrap();
    Engine::new(store)
}

pub fn samples() -> Vec<AccuracySample> {
    sample::synthesize(&engine(), &fingerprints(2, 20), &[1, 3], true).unwrap()
}

pub fn quick_options() -> TrainingOptions {
    TrainingOptions {
        epochs: 3,
        batch_size: 8,
        seed: Some(42),
        ..TrainingOptions::default()
    }
}
