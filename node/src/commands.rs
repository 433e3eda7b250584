use std::{
    io::{self, Write},
    sync::Arc,
};

use accuracy::{
    AccuracyModel, ArchPolicy, ModelService,
    pipeline::{Frame, PositioningStep, Step},
    registry::InMemoryRegistry,
    sample,
};
use anyhow::{Context, Result};
use fingerprinting::{
    Engine, Fingerprint, FingerprintStore,
    dataset::{self, Survey},
    store,
};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::NodeConfig;

/// Builds the fingerprint store from the train survey, merging readings taken at the same spot.
pub fn build_engine(config: &NodeConfig) -> Result<Engine> {
    let survey = dataset::load_csv(&config.train_csv, &config.layout)
        .with_context(|| format!("loading {}", config.train_csv.display()))?;

    let fingerprints = store::aggregate(survey.fingerprints(&survey.emitters));
    info!(
        readings = survey.len(),
        fingerprints = fingerprints.len();
        "building fingerprint store"
    );

    let store = FingerprintStore::with_fingerprints(survey.emitters, config.metric, fingerprints)?;
    Ok(Engine::new(store))
}

/// Logs the mean and median positioning error over the test survey for every k.
pub fn evaluate(config: &NodeConfig, engine: &Engine) -> Result<()> {
    let labelled = test_fingerprints(config, engine)?;

    for &k in &config.ks {
        let mut errors = engine.errors(k, &labelled, config.weighted)?;
        let Some((mean, median)) = summarize(&mut errors) else {
            warn!("nothing to evaluate");
            return Ok(());
        };

        info!(k = k, mean = mean, median = median; "positioning error");
    }

    Ok(())
}

/// Trains the accuracy model on the estimates the engine makes and saves it.
///
/// The test survey is used as labelled data when there's one, the train survey otherwise.
pub async fn train(config: &NodeConfig, engine: &Engine, cancel: CancellationToken) -> Result<()> {
    let labelled = match config.test_csv {
        Some(_) => test_fingerprints(config, engine)?,
        None => engine.store().fingerprints().to_vec(),
    };

    let samples = sample::synthesize(engine, &labelled, &config.ks, config.weighted)?;
    let model = AccuracyModel::new(engine.store().emitters().clone(), &ArchPolicy::default())?;
    let service = ModelService::new(model);

    let report = service
        .train(samples, config.training.clone(), cancel)
        .await?;

    if let Some(last) = report.head.last() {
        info!(loss = last.loss, val_loss = last.val_loss; "accuracy model trained");
    }

    service.save(config.model_dir.clone()).await?;
    info!("accuracy model saved into {}", config.model_dir.display());
    Ok(())
}

/// Pushes every test reading through the positioning step, printing the frames as JSON lines.
pub async fn predict(config: &NodeConfig, engine: Engine) -> Result<()> {
    let model = AccuracyModel::new(engine.store().emitters().clone(), &ArchPolicy::default())?;
    let service = ModelService::new(model);
    service.load_or_cold_start(&config.model_dir).await?;

    let registry = Arc::new(InMemoryRegistry::new());
    registry.register(config.model_name.clone(), service);

    let survey = test_survey(config)?;
    let step = PositioningStep::new(
        Arc::new(engine),
        registry,
        config.model_name.clone(),
        config.primary_k(),
        config.weighted,
    );

    let mut stdout = io::stdout().lock();
    for labelled in survey.readings {
        let frame = step.process(Frame::new(labelled.reading)).await?;
        serde_json::to_writer(&mut stdout, &frame)?;
        writeln!(stdout)?;
    }

    Ok(())
}

fn test_survey(config: &NodeConfig) -> Result<Survey> {
    let path = config.test_csv.as_ref().context("no test survey configured")?;
    dataset::load_csv(path, &config.layout).with_context(|| format!("loading {}", path.display()))
}

fn test_fingerprints(config: &NodeConfig, engine: &Engine) -> Result<Vec<Fingerprint>> {
    let survey = test_survey(config)?;
    Ok(survey.fingerprints(engine.store().emitters()))
}

/// Returns the mean and the median of `errors`, sorting them.
fn summarize(errors: &mut [f64]) -> Option<(f64, f64)> {
    if errors.is_empty() {
        return None;
    }

    errors.sort_by(f64::total_cmp);
    let mean = errors.iter().sum::<f64>() / errors.len() as f64;
    let mid = errors.len() / 2;
    let median = if errors.len() % 2 == 0 {
        (errors[mid - 1] + errors[mid]) / 2.
    } else {
        errors[mid]
    };

    Some((mean, median))
}
