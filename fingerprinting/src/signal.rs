use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{FingerprintErr, Result};

/// The signal strength of an emitter that wasn't observed.
pub const NOT_OBSERVED: f64 = 100.0;

/// The weakest valid signal strength, in dBm.
pub const MIN_SIGNAL: f64 = -150.0;

/// The strongest valid signal strength, in dBm.
pub const MAX_SIGNAL: f64 = 0.0;

/// Whether `value` is a genuine reading.
pub fn is_observed(value: f64) -> bool {
    (MIN_SIGNAL..=MAX_SIGNAL).contains(&value)
}

/// Validates `value` against the signal domain, `[MIN_SIGNAL, MAX_SIGNAL]` plus `NOT_OBSERVED`.
pub fn check_signal(emitter: &str, value: f64) -> Result<f64> {
    if is_observed(value) || value == NOT_OBSERVED {
        return Ok(value);
    }

    Err(FingerprintErr::invalid(format!(
        "signal {value} of {emitter} is outside [{MIN_SIGNAL}, {MAX_SIGNAL}] and isn't the \
         not observed marker {NOT_OBSERVED}"
    )))
}

/// A live reading: the signal strength of every observed emitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    signals: BTreeMap<String, f64>,
}

impl SignalReading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the signal strength of `emitter`.
    ///
    /// # Returns
    /// An error if the value is outside the signal domain.
    pub fn insert(&mut self, emitter: impl Into<String>, value: f64) -> Result<()> {
        let emitter = emitter.into();
        check_signal(&emitter, value)?;
        self.signals.insert(emitter, value);
        Ok(())
    }

    /// Builds a reading from `(emitter, signal)` pairs, validating each one of them.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut reading = Self::new();

        for (emitter, value) in pairs {
            reading.insert(emitter, value)?;
        }

        Ok(reading)
    }

    /// The signal of `emitter`, `NOT_OBSERVED` if it's missing.
    pub fn get(&self, emitter: &str) -> f64 {
        self.signals.get(emitter).copied().unwrap_or(NOT_OBSERVED)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.signals.iter().map(|(e, &v)| (e.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// The ordered list of known emitters, shared by every feature vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Emitters {
    ids: Vec<String>,
    index: HashMap<String, usize>,
}

impl Emitters {
    /// Creates a new `Emitters` list.
    ///
    /// # Returns
    /// An error if an emitter shows up twice.
    pub fn new<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(ids.len());

        for (i, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(FingerprintErr::invalid(format!("duplicated emitter {id}")));
            }
        }

        Ok(Self { ids, index })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn position_of(&self, emitter: &str) -> Option<usize> {
        self.index.get(emitter).copied()
    }

    /// Lays `reading` out following this list's order, emitters it doesn't know are ignored.
    pub fn vectorize(&self, reading: &SignalReading) -> Vec<f64> {
        self.ids.iter().map(|id| reading.get(id)).collect()
    }

    /// The inverse of `vectorize`, emitters that weren't observed are left out.
    ///
    /// # Returns
    /// An error if `features` doesn't have one value per emitter or holds an invalid signal.
    pub fn reading(&self, features: &[f64]) -> Result<SignalReading> {
        if features.len() != self.len() {
            return Err(FingerprintErr::invalid(format!(
                "expected {} features, got {}",
                self.len(),
                features.len()
            )));
        }

        let observed = self
            .ids
            .iter()
            .zip(features)
            .filter(|&(_, &value)| value != NOT_OBSERVED);

        SignalReading::from_pairs(observed.map(|(id, &value)| (id.as_str(), value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_outside_the_domain_are_rejected() {
        let mut reading = SignalReading::new();

        assert!(reading.insert("WAP001", -200.).is_err());
        assert!(reading.insert("WAP001", 12.).is_err());
        assert!(reading.insert("WAP001", f64::NAN).is_err());
        assert!(reading.insert("WAP001", NOT_OBSERVED).is_ok());
        assert!(reading.insert("WAP001", -60.).is_ok());
    }

    #[test]
    fn missing_emitters_take_the_sentinel() {
        let emitters = Emitters::new(["a", "b", "c"]).unwrap();
        let reading = SignalReading::from_pairs([("c", -40.), ("z", -10.)]).unwrap();

        assert_eq!(emitters.vectorize(&reading), vec![NOT_OBSERVED, NOT_OBSERVED, -40.]);
    }

    #[test]
    fn reading_skips_unobserved_emitters() {
        let emitters = Emitters::new(["a", "b"]).unwrap();
        let reading = emitters.reading(&[-70., NOT_OBSERVED]).unwrap();

        assert_eq!(reading.len(), 1);
        assert_eq!(reading.get("a"), -70.);
        assert!(emitters.reading(&[-70.]).is_err());
    }

    #[test]
    fn duplicated_emitters_fail() {
        assert!(Emitters::new(["a", "a"]).is_err());
    }
}
