//! The table of network sizes, picked by the amount of emitters.

use machine_learning::arch::{Sequential, activations::ActFn, layers::Layer};
use serde::{Deserialize, Serialize};

use crate::{AccuracyErr, Result};

/// The inputs of the regression head besides the fingerprint code: x, y, z and k.
pub const AUX_INPUTS: usize = 4;

/// The inputs of the signal strength predictor: x, y and z.
pub const POSITION_INPUTS: usize = 3;

/// The sizes of every network of the accuracy model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchConfig {
    /// Fingerprints are zero padded up to this width.
    pub input_width: usize,
    pub hidden_width: usize,
    /// The width of the encoded fingerprint.
    pub code_width: usize,
    pub head_widths: Vec<usize>,
    pub rssi_widths: Vec<usize>,
}

impl ArchConfig {
    /// `input_width -> hidden_width -> code_width`.
    pub fn encoder(&self) -> Sequential {
        Sequential::new([
            Layer::dense((self.input_width, self.hidden_width), Some(ActFn::relu())),
            Layer::dense((self.hidden_width, self.code_width), Some(ActFn::sigmoid(1.))),
        ])
    }

    /// The mirror of the encoder, its output lands in the normalized signal range.
    pub fn decoder(&self) -> Sequential {
        Sequential::new([
            Layer::dense((self.code_width, self.hidden_width), Some(ActFn::relu())),
            Layer::dense((self.hidden_width, self.input_width), Some(ActFn::sigmoid(1.))),
        ])
    }

    /// Maps `[code | x, y, z, k]` to the scaled expected error.
    pub fn head(&self) -> Sequential {
        let widths = self.head_widths.iter().copied();
        Sequential::new(hidden_stack(self.code_width + AUX_INPUTS, widths, 1, None))
    }

    /// Maps a scaled position to a normalized fingerprint.
    pub fn rssi(&self) -> Sequential {
        let widths = self.rssi_widths.iter().copied();
        let output = Some(ActFn::sigmoid(1.));
        Sequential::new(hidden_stack(POSITION_INPUTS, widths, self.input_width, output))
    }
}

fn hidden_stack<I>(input: usize, widths: I, output: usize, out_act: Option<ActFn>) -> Vec<Layer>
where
    I: Iterator<Item = usize>,
{
    let mut layers = Vec::new();
    let mut prev = input;

    for width in widths {
        layers.push(Layer::dense((prev, width), Some(ActFn::relu())));
        prev = width;
    }

    layers.push(Layer::dense((prev, output), out_act));
    layers
}

/// Size buckets: the first bucket fitting the amount of emitters picks the architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchPolicy {
    buckets: Vec<(usize, ArchConfig)>,
}

impl Default for ArchPolicy {
    fn default() -> Self {
        let bucket = |input_width, hidden_width, code_width, head_widths: &[usize]| {
            let config = ArchConfig {
                input_width,
                hidden_width,
                code_width,
                head_widths: head_widths.to_vec(),
                rssi_widths: vec![32, 64],
            };
            (input_width, config)
        };

        Self {
            buckets: vec![
                bucket(256, 128, 32, &[64, 32]),
                bucket(1024, 256, 64, &[128, 64]),
                bucket(4096, 512, 128, &[256, 64]),
            ],
        }
    }
}

impl ArchPolicy {
    /// Creates a new `ArchPolicy`.
    ///
    /// # Arguments
    /// * `buckets` - Pairs of the largest amount of emitters served and the architecture.
    ///
    /// # Returns
    /// An error if the table is empty or a bucket's architecture can't hold its emitters.
    pub fn new(mut buckets: Vec<(usize, ArchConfig)>) -> Result<Self> {
        if buckets.is_empty() {
            return Err(AccuracyErr::InvalidArgument(
                "the architecture table is empty".to_string(),
            ));
        }

        if let Some((limit, config)) = buckets.iter().find(|(l, c)| *l > c.input_width) {
            return Err(AccuracyErr::InvalidArgument(format!(
                "a bucket of {limit} emitters has an input width of {}",
                config.input_width
            )));
        }

        buckets.sort_by_key(|(limit, _)| *limit);
        Ok(Self { buckets })
    }

    /// Picks the architecture for `emitters` emitters.
    ///
    /// # Returns
    /// An error if there are no emitters or more than the largest bucket serves.
    pub fn resolve(&self, emitters: usize) -> Result<ArchConfig> {
        if emitters == 0 {
            return Err(AccuracyErr::InvalidArgument("there are no emitters".to_string()));
        }

        self.buckets
            .iter()
            .find(|(limit, _)| emitters <= *limit)
            .map(|(_, config)| config.clone())
            .ok_or_else(|| {
                AccuracyErr::InvalidArgument(format!(
                    "{emitters} emitters exceed the largest architecture"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_picked_by_size() {
        let policy = ArchPolicy::default();

        assert_eq!(policy.resolve(1).unwrap().input_width, 256);
        assert_eq!(policy.resolve(256).unwrap().input_width, 256);
        assert_eq!(policy.resolve(257).unwrap().input_width, 1024);
        assert_eq!(policy.resolve(4096).unwrap().code_width, 128);
    }

    #[test]
    fn too_many_emitters_fail() {
        let policy = ArchPolicy::default();

        assert!(matches!(policy.resolve(4097), Err(AccuracyErr::InvalidArgument(_))));
        assert!(policy.resolve(0).is_err());
    }

    #[test]
    fn networks_chain_together() {
        let config = ArchPolicy::default().resolve(10).unwrap();

        assert_eq!(config.encoder().output_size(), config.decoder().input_size());
        assert_eq!(config.decoder().output_size(), Some(256));
        assert_eq!(config.head().input_size(), Some(36));
        assert_eq!(config.head().output_size(), Some(1));
        assert_eq!(config.rssi().output_size(), Some(256));
    }

    #[test]
    fn undersized_buckets_are_rejected() {
        let config = ArchPolicy::default().resolve(1).unwrap();
        assert!(ArchPolicy::new(vec![(300, config)]).is_err());
    }
}
