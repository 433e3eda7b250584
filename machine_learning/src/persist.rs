//! Storage of a `Sequential` as a topology file plus a raw weights file.

use std::{fs, mem, path::Path};

use crate::{
    MlErr, Result,
    arch::{Sequential, layers::Layer},
    specs::{LayerSpec, ModelSpec},
};

/// The name of the topology file inside a model directory.
pub const TOPOLOGY_FILE: &str = "model.json";

/// The name of the weights file inside a model directory.
pub const WEIGHTS_FILE: &str = "weights.bin";

/// Writes `model` into `dir`, creating it if needed.
///
/// # Arguments
/// * `model` - The model to store.
/// * `dir` - The directory that will hold the topology and weights files.
pub fn save(model: &Sequential, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    let topology = serde_json::to_vec_pretty(&model.spec())?;
    fs::write(dir.join(TOPOLOGY_FILE), topology)?;
    fs::write(dir.join(WEIGHTS_FILE), bytemuck::cast_slice(model.params()))?;
    Ok(())
}

/// Reads back a model written by `save`.
///
/// # Returns
/// An io error if a file is missing, or `MlErr::Corrupt` if the files don't describe a
/// consistent model.
pub fn load(dir: &Path) -> Result<Sequential> {
    let topology = fs::read(dir.join(TOPOLOGY_FILE))?;
    let spec: ModelSpec = serde_json::from_slice(&topology)?;
    let bytes = fs::read(dir.join(WEIGHTS_FILE))?;

    if bytes.len() % mem::size_of::<f32>() != 0 {
        return Err(MlErr::Corrupt(format!(
            "{} holds {} bytes, not a whole amount of parameters",
            dir.join(WEIGHTS_FILE).display(),
            bytes.len()
        )));
    }

    let params: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);

    if params.iter().any(|p| !p.is_finite()) {
        return Err(MlErr::Corrupt(format!(
            "{} holds non finite parameters",
            dir.join(WEIGHTS_FILE).display()
        )));
    }

    let ModelSpec::Sequential { layers } = spec;
    check_topology(&layers, params.len()).map_err(|detail| {
        MlErr::Corrupt(format!("{}: {detail}", dir.join(TOPOLOGY_FILE).display()))
    })?;

    let layers = layers.into_iter().map(Layer::from_spec);
    Sequential::with_params(layers, params).map_err(|e| MlErr::Corrupt(e.to_string()))
}

/// Checks that `layers` feed into one another and need exactly `params` parameters, before
/// anything gets allocated for them.
fn check_topology(layers: &[LayerSpec], params: usize) -> std::result::Result<(), String> {
    if layers.is_empty() {
        return Err("the topology has no layers".to_string());
    }

    let mut size = 0usize;
    let mut prev_out = None;

    for (i, layer) in layers.iter().enumerate() {
        let (n, m) = match *layer {
            LayerSpec::Dense { dim, .. } => dim,
        };

        if n == 0 || m == 0 {
            return Err(format!("layer {i} has an empty dimension"));
        }

        if let Some(prev) = prev_out {
            if prev != n {
                return Err(format!(
                    "layer {i} takes {n} inputs but the previous layer gives {prev}"
                ));
            }
        }

        size = n
            .checked_add(1)
            .and_then(|n| n.checked_mul(m))
            .and_then(|layer_size| size.checked_add(layer_size))
            .ok_or_else(|| format!("layer {i} is too large"))?;
        prev_out = Some(m);
    }

    if size != params {
        return Err(format!(
            "the topology needs {size} parameters but {params} were stored"
        ));
    }

    Ok(())
}
