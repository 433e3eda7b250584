mod common;

use std::sync::Arc;

use accuracy::{
    AccuracyErr, AccuracyInput, AccuracyModel, ArchPolicy, ModelPhase, ModelService,
    pipeline::{Frame, PositioningStep, Step},
    registry::{CompositeRegistry, InMemoryRegistry, ModelRegistry},
};
use fingerprinting::{Position, SignalReading};
use tokio_util::sync::CancellationToken;

const MODEL: &str = "accuracy";

fn service() -> ModelService {
    let model = AccuracyModel::new(common::emitters(), &ArchPolicy::default()).unwrap();
    ModelService::new(model)
}

async fn trained_service() -> ModelService {
    let service = service();
    service
        .train(common::samples(), common::quick_options(), CancellationToken::new())
        .await
        .unwrap();
    service
}

fn reading() -> SignalReading {
    SignalReading::from_pairs([("WAP000", -48.), ("WAP001", -61.), ("WAP003", -70.)]).unwrap()
}

#[tokio::test]
async fn predictions_run_concurrently_after_training() {
    let service = trained_service().await;
    assert_eq!(service.phase().await, ModelPhase::Trained);

    let input = AccuracyInput {
        features: common::emitters().vectorize(&reading()),
        estimate: Position::xy(3., 5.),
        k: 3,
    };

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            let input = input.clone();
            tokio::spawn(async move { service.predict(&input).await })
        })
        .collect();

    let expected = service.predict(&input).await.unwrap();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), expected);
    }
}

#[tokio::test]
async fn missing_artifact_is_a_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let service = service();

    assert!(!service.load_or_cold_start(dir.path()).await.unwrap());
    assert_eq!(service.phase().await, ModelPhase::Untrained);
}

#[tokio::test]
async fn broken_artifact_is_not_a_cold_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(MODEL);
    trained_service().await.save(&path).await.unwrap();
    std::fs::write(path.join("options.json"), "not json").unwrap();

    let result = service().load_or_cold_start(&path).await;

    assert!(matches!(result, Err(AccuracyErr::Corrupt(_))));
}

#[tokio::test]
async fn save_and_load_through_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(MODEL);

    let trained = trained_service().await;
    trained.save(&path).await.unwrap();
    assert_eq!(trained.phase().await, ModelPhase::Persisted);

    let loaded = service();
    assert!(loaded.load_or_cold_start(&path).await.unwrap());
    assert_eq!(loaded.phase().await, ModelPhase::Loaded);

    let estimate = Position::xy(6., 2.);
    let expected = trained
        .predict_reading(&reading(), estimate, 1)
        .await
        .unwrap();
    let actual = loaded.predict_reading(&reading(), estimate, 1).await.unwrap();
    assert!((actual - expected).abs() < 1e-5);
}

#[tokio::test]
async fn cancelled_training_keeps_the_service_untrained() {
    let service = service();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = service
        .train(common::samples(), common::quick_options(), cancel)
        .await;

    assert!(matches!(result, Err(AccuracyErr::Cancelled)));
    assert!(matches!(
        service.predict_rssi(&Position::xy(1., 1.)).await,
        Err(AccuracyErr::NotReady)
    ));
}

#[tokio::test]
async fn step_without_a_model_only_locates() {
    let registry = Arc::new(InMemoryRegistry::new());
    let step = PositioningStep::new(Arc::new(common::engine()), registry, MODEL, 3, true);

    let frame = step.process(Frame::new(reading())).await.unwrap();

    assert!(frame.position.is_some_and(|p| p.is_finite()));
    assert_eq!(frame.predicted_error, None);
}

#[tokio::test]
async fn step_skips_accuracy_while_the_model_is_untrained() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(MODEL, service());
    let step = PositioningStep::new(Arc::new(common::engine()), registry, MODEL, 3, true);

    let frame = step.process(Frame::new(reading())).await.unwrap();

    assert!(frame.position.is_some());
    assert_eq!(frame.predicted_error, None);
}

#[tokio::test]
async fn step_attaches_the_predicted_error() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(MODEL, trained_service().await);
    let step = PositioningStep::new(Arc::new(common::engine()), registry, MODEL, 3, false);

    let frame = step.process(Frame::new(reading())).await.unwrap();

    let error = frame.predicted_error.unwrap();
    assert!(error.is_finite());
    assert!(error >= 0.);
    assert_eq!(frame.reading, reading());
}

#[tokio::test]
async fn step_rejects_out_of_range_k() {
    let registry = Arc::new(InMemoryRegistry::new());
    let step = PositioningStep::new(Arc::new(common::engine()), registry, MODEL, 0, false);

    let result = step.process(Frame::new(reading())).await;

    assert!(matches!(result, Err(AccuracyErr::InvalidArgument(_))));
}

#[tokio::test]
async fn composite_registry_asks_providers_in_order() {
    let first = Arc::new(InMemoryRegistry::new());
    let second = Arc::new(InMemoryRegistry::new());
    second.register(MODEL, service());
    second.register("other", service());
    first.register("other", trained_service().await);

    let registry = CompositeRegistry::new()
        .with_provider(first.clone())
        .with_provider(second.clone());

    assert!(registry.resolve(MODEL).await.is_some());
    assert!(registry.resolve("missing").await.is_none());

    let other = registry.resolve("other").await.unwrap();
    assert_eq!(other.phase().await, ModelPhase::Trained);

    second.remove(MODEL);
    assert!(registry.resolve(MODEL).await.is_none());
    assert_eq!(first.names(), vec!["other".to_string()]);
}
