//! Loading labelled surveys from CSV files.

use std::{fs::File, io::Read, path::Path};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    FingerprintErr, Result,
    position::Position,
    signal::{self, Emitters, NOT_OBSERVED, SignalReading},
    store::Fingerprint,
};

/// How a survey CSV file is laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvLayout {
    /// Columns starting with any of these hold the signal of an emitter.
    pub emitter_prefixes: Vec<String>,
    pub x_column: String,
    pub y_column: String,
    /// Optional, positions are planar if the file lacks it.
    pub z_column: String,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            emitter_prefixes: vec!["WAP".to_string(), "BEACON".to_string()],
            x_column: "X".to_string(),
            y_column: "Y".to_string(),
            z_column: "Z".to_string(),
        }
    }
}

/// A reading taken at a known position.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledReading {
    pub reading: SignalReading,
    pub position: Position,
}

/// Every labelled reading of a survey, along with the emitters its file has columns for.
#[derive(Debug, Clone)]
pub struct Survey {
    pub emitters: Emitters,
    pub readings: Vec<LabelledReading>,
}

impl Survey {
    /// Lays every reading out following `emitters`, which may differ from the survey's own.
    pub fn fingerprints(&self, emitters: &Emitters) -> Vec<Fingerprint> {
        self.readings
            .iter()
            .map(|r| Fingerprint::new(emitters.vectorize(&r.reading), r.position))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Opens and reads a survey file.
pub fn load_csv(path: &Path, layout: &CsvLayout) -> Result<Survey> {
    let survey = read_csv(File::open(path)?, layout)?;

    info!(
        "loaded {} readings of {} emitters from {}",
        survey.len(),
        survey.emitters.len(),
        path.display()
    );

    Ok(survey)
}

/// Reads a survey from any CSV source with a header row.
///
/// Empty or `NaN` signal cells count as not observed.
///
/// # Returns
/// An error if a label column is missing or a cell holds something other than a valid signal.
pub fn read_csv<R: Read>(source: R, layout: &CsvLayout) -> Result<Survey> {
    let mut reader = csv::Reader::from_reader(source);
    let headers = reader.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let x = column(&layout.x_column).ok_or_else(|| missing_column(&layout.x_column))?;
    let y = column(&layout.y_column).ok_or_else(|| missing_column(&layout.y_column))?;
    let z = column(&layout.z_column);

    let emitter_columns: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (i, h.trim()))
        .filter(|(_, h)| layout.emitter_prefixes.iter().any(|p| h.starts_with(p.as_str())))
        .collect();
    let emitters = Emitters::new(emitter_columns.iter().map(|&(_, h)| h))?;

    let mut readings = Vec::new();

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let coord = |i: usize, name: &str| -> Result<f64> {
            let cell = record.get(i).unwrap_or_default().trim();
            cell.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    FingerprintErr::invalid(format!("row {row}: {name} {cell:?} isn't a number"))
                })
        };

        let mut coords = vec![coord(x, &layout.x_column)?, coord(y, &layout.y_column)?];
        if let Some(z) = z {
            coords.push(coord(z, &layout.z_column)?);
        }

        let mut reading = SignalReading::new();

        for &(i, emitter) in &emitter_columns {
            let value = parse_signal(record.get(i).unwrap_or_default())
                .ok_or_else(|| FingerprintErr::invalid(format!("row {row}: bad {emitter}")))?;
            let value = signal::check_signal(emitter, value)
                .map_err(|e| FingerprintErr::invalid(format!("row {row}: {e}")))?;

            if value != NOT_OBSERVED {
                reading.insert(emitter, value)?;
            }
        }

        readings.push(LabelledReading {
            reading,
            position: Position::new(&coords)?,
        });
    }

    Ok(Survey { emitters, readings })
}

fn parse_signal(cell: &str) -> Option<f64> {
    let cell = cell.trim();

    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Some(NOT_OBSERVED);
    }

    cell.parse::<f64>().ok()
}

fn missing_column(name: &str) -> FingerprintErr {
    FingerprintErr::invalid(format!("the file has no {name} column"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURVEY: &str = "\
WAP001,WAP002,BEACON_1,X,Y,FLOOR
-50,100,,1.5,2,0
-60,-70,NaN,3,4,1
";

    #[test]
    fn reads_emitters_and_planar_positions() {
        let survey = read_csv(SURVEY.as_bytes(), &CsvLayout::default()).unwrap();

        assert_eq!(survey.emitters.ids(), &["WAP001", "WAP002", "BEACON_1"]);
        assert_eq!(survey.len(), 2);
        assert_eq!(survey.readings[0].position, Position::xy(1.5, 2.));
        assert_eq!(survey.readings[0].reading.len(), 1);
        assert_eq!(survey.readings[1].reading.get("WAP002"), -70.);
        assert_eq!(survey.readings[1].reading.get("BEACON_1"), NOT_OBSERVED);
    }

    #[test]
    fn third_label_makes_positions_spatial() {
        let layout = CsvLayout {
            z_column: "FLOOR".to_string(),
            ..CsvLayout::default()
        };
        let survey = read_csv(SURVEY.as_bytes(), &layout).unwrap();

        assert_eq!(survey.readings[1].position, Position::xyz(3., 4., 1.));
    }

    #[test]
    fn out_of_domain_signals_are_rejected() {
        let csv = "WAP001,X,Y\n-200,0,0\n";
        let result = read_csv(csv.as_bytes(), &CsvLayout::default());

        assert!(matches!(result, Err(FingerprintErr::InvalidArgument(_))));
    }

    #[test]
    fn missing_label_column_fails() {
        let csv = "WAP001,X\n-20,0\n";
        assert!(read_csv(csv.as_bytes(), &CsvLayout::default()).is_err());
    }

    #[test]
    fn fingerprints_follow_the_given_emitters() {
        let survey = read_csv(SURVEY.as_bytes(), &CsvLayout::default()).unwrap();
        let emitters = Emitters::new(["WAP002", "WAP009"]).unwrap();
        let fingerprints = survey.fingerprints(&emitters);

        assert_eq!(fingerprints[1].features, vec![-70., NOT_OBSERVED]);
    }
}
