mod common;

use accuracy::{
    AccuracyErr, AccuracyInput, AccuracyModel, AccuracySample, ArchPolicy, ModelPhase,
    TrainingOptions, model::OPTIONS_FILE,
};
use fingerprinting::{NOT_OBSERVED, Position};
use tokio_util::sync::CancellationToken;

fn untrained() -> AccuracyModel {
    AccuracyModel::new(common::emitters(), &ArchPolicy::default()).unwrap()
}

fn trained() -> AccuracyModel {
    let mut model = untrained();
    model
        .train(&common::samples(), &common::quick_options(), &CancellationToken::new())
        .unwrap();
    model
}

fn input() -> AccuracyInput {
    AccuracyInput {
        features: vec![-45., -60., -72., NOT_OBSERVED, -80., -66.],
        estimate: Position::xy(4., 7.),
        k: 3,
    }
}

#[test]
fn untrained_model_is_not_ready() {
    let model = untrained();

    assert_eq!(model.phase(), ModelPhase::Untrained);
    assert!(matches!(model.predict(&input()), Err(AccuracyErr::NotReady)));
    assert!(matches!(
        model.predict_rssi(&Position::xy(0., 0.)),
        Err(AccuracyErr::NotReady)
    ));
}

#[test]
fn saving_an_untrained_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = untrained();

    assert!(matches!(
        model.save(&dir.path().join("model")),
        Err(AccuracyErr::NotReady)
    ));
    assert!(!dir.path().join("model").exists());
}

#[test]
fn loading_an_empty_directory_is_a_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = untrained();

    assert!(matches!(
        model.load(dir.path()),
        Err(AccuracyErr::ArtifactMissing(_))
    ));
    assert_eq!(model.phase(), ModelPhase::Untrained);
}

#[test]
fn training_enables_predictions() {
    let model = trained();

    assert_eq!(model.phase(), ModelPhase::Trained);

    let error = model.predict(&input()).unwrap();
    assert!(error.is_finite());
    assert!(error >= 0.);
    assert_eq!(model.predict(&input()).unwrap(), error);
}

#[test]
fn training_reports_every_phase() {
    let mut model = untrained();
    let report = model
        .train(&common::samples(), &common::quick_options(), &CancellationToken::new())
        .unwrap();

    assert_eq!(report.autoencoder.len(), 3);
    assert_eq!(report.head.len(), 3);
    assert_eq!(report.rssi.len(), 3);
    assert!(report.head.iter().all(|stats| stats.val_loss.is_some()));
}

#[test]
fn single_sample_regression_converges() {
    let features = vec![-45., -60., -72., NOT_OBSERVED, -80., -66.];
    let sample = AccuracySample::new(features, Position::xy(4., 7.), 3, 3.5).unwrap();
    let options = TrainingOptions {
        epochs: 300,
        batch_size: 1,
        learning_rate: 0.01,
        train_rssi: false,
        seed: Some(7),
        ..TrainingOptions::default()
    };

    let mut model = untrained();
    model
        .train(&[sample.clone()], &options, &CancellationToken::new())
        .unwrap();

    let predicted = model.predict(&sample.input).unwrap();
    assert!((predicted - 3.5).abs() < 0.35, "predicted {predicted}");
}

#[test]
fn cancelled_training_leaves_the_model_untouched() {
    let mut model = untrained();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = model.train(&common::samples(), &common::quick_options(), &cancel);

    assert!(matches!(result, Err(AccuracyErr::Cancelled)));
    assert_eq!(model.phase(), ModelPhase::Untrained);
}

#[test]
fn mismatched_features_are_rejected() {
    let model = trained();
    let mut input = input();
    input.features.pop();

    assert!(matches!(
        model.predict(&input),
        Err(AccuracyErr::InvalidArgument(_))
    ));
}

#[test]
fn save_then_load_preserves_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accuracy");
    let mut model = trained();

    model.save(&path).unwrap();
    assert_eq!(model.phase(), ModelPhase::Persisted);
    assert_eq!(model.artifact_dir(), Some(path.as_path()));

    for name in ["encoder", "decoder", "head", "rssiModel"] {
        assert!(path.join(name).join("model.json").is_file());
        assert!(path.join(name).join("weights.bin").is_file());
    }

    let options: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path.join(OPTIONS_FILE)).unwrap()).unwrap();
    assert_eq!(options["accessPoints"].as_array().unwrap().len(), common::EMITTERS);
    assert!(options["minRSSI"].as_f64().unwrap() <= options["maxRSSI"].as_f64().unwrap());

    let mut loaded = untrained();
    loaded.load(&path).unwrap();
    assert_eq!(loaded.phase(), ModelPhase::Loaded);
    assert_eq!(loaded.normalizer(), model.normalizer());

    let expected = model.predict(&input()).unwrap();
    let actual = loaded.predict(&input()).unwrap();
    assert!((expected - actual).abs() < 1e-5);

    let position = Position::xy(10., 10.);
    let expected = model.predict_rssi(&position).unwrap();
    let actual = loaded.predict_rssi(&position).unwrap();
    assert_eq!(actual.len(), expected.len());

    for (emitter, value) in expected.iter() {
        assert!((actual.get(emitter) - value).abs() < 1e-5);
    }
}

#[test]
fn saving_over_a_previous_model_replaces_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accuracy");

    let mut first = trained();
    first.save(&path).unwrap();

    let mut second = untrained();
    let options = TrainingOptions {
        seed: Some(1),
        ..common::quick_options()
    };
    second
        .train(&common::samples(), &options, &CancellationToken::new())
        .unwrap();
    second.save(&path).unwrap();

    let loaded = AccuracyModel::from_dir(&path).unwrap();
    let expected = second.predict(&input()).unwrap();
    assert!((loaded.predict(&input()).unwrap() - expected).abs() < 1e-5);

    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn broken_artifacts_fail_loudly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accuracy");
    trained().save(&path).unwrap();

    std::fs::remove_file(path.join("decoder").join("weights.bin")).unwrap();
    let mut model = untrained();
    assert!(matches!(model.load(&path), Err(AccuracyErr::Io(_))));
    assert_eq!(model.phase(), ModelPhase::Untrained);

    std::fs::write(path.join(OPTIONS_FILE), b"{ not json").unwrap();
    assert!(matches!(model.load(&path), Err(AccuracyErr::Corrupt(_))));
}

fn edit_head_topology(path: &std::path::Path, edit: impl FnOnce(&mut Vec<serde_json::Value>)) {
    let file = path.join("head").join("model.json");
    let mut topology: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&file).unwrap()).unwrap();
    let layers = topology["sequential"]["layers"].as_array_mut().unwrap();
    edit(layers);
    std::fs::write(&file, serde_json::to_vec(&topology).unwrap()).unwrap();
}

#[test]
fn head_layers_that_dont_chain_are_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accuracy");
    trained().save(&path).unwrap();

    // (n, m) -> (m - 1, n + 1) keeps the amount of parameters but breaks the chain.
    edit_head_topology(&path, |layers| {
        let dim = &mut layers[1]["dense"]["dim"];
        let (n, m) = (dim[0].as_u64().unwrap(), dim[1].as_u64().unwrap());
        *dim = serde_json::json!([m - 1, n + 1]);
    });

    let mut model = untrained();
    assert!(matches!(model.load(&path), Err(AccuracyErr::Corrupt(_))));
    assert_eq!(model.phase(), ModelPhase::Untrained);
}

#[test]
fn oversized_head_topology_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accuracy");
    trained().save(&path).unwrap();

    edit_head_topology(&path, |layers| {
        layers[0]["dense"]["dim"] = serde_json::json!([u64::MAX, 2]);
    });

    let mut model = untrained();
    assert!(matches!(model.load(&path), Err(AccuracyErr::Corrupt(_))));
}

#[test]
fn training_without_epochs_is_rejected() {
    let mut model = untrained();
    let options = TrainingOptions {
        epochs: 0,
        ..common::quick_options()
    };

    let result = model.train(&common::samples(), &options, &CancellationToken::new());

    assert!(matches!(result, Err(AccuracyErr::InvalidArgument(_))));
    assert_eq!(model.phase(), ModelPhase::Untrained);
}

#[test]
fn predicting_with_zero_neighbours_is_rejected() {
    let model = trained();
    let input = AccuracyInput { k: 0, ..input() };

    assert!(matches!(
        model.predict(&input),
        Err(AccuracyErr::InvalidArgument(_))
    ));
}

#[test]
fn predicted_readings_use_the_known_emitters() {
    let model = trained();
    let reading = model.predict_rssi(&Position::xy(3., 3.)).unwrap();

    for (emitter, value) in reading.iter() {
        assert!(model.emitters().position_of(emitter).is_some());
        assert!((-150. ..=0.).contains(&value));
    }
}
