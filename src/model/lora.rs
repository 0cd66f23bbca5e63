//! LoRA adapter composition.
//!
//! Adapters are folded into the base weights once at load time, so the
//! resulting model is a plain Llama with no per-request adapter cost.

use crate::{Error, Result};
use candle_core::{DType, Device, Tensor};
use serde::Deserialize;
use std::{collections::HashMap, path::Path};
use tracing::{debug, info};

const PEFT_PREFIX: &str = "base_model.model.";
const LORA_A_SUFFIX: &str = ".lora_A.weight";
const LORA_B_SUFFIX: &str = ".lora_B.weight";

/// The subset of `adapter_config.json` needed to merge LoRA weights.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub peft_type: String,
    pub r: usize,
    pub lora_alpha: f64,
    #[serde(default)]
    pub use_rslora: bool,
    #[serde(default)]
    pub use_dora: bool,
    #[serde(default)]
    pub fan_in_fan_out: bool,
    #[serde(default)]
    pub base_model_name_or_path: Option<String>,
}

impl AdapterConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)?;
        serde_json::from_slice(&raw).map_err(|e| {
            Error::adapter(format!(
                "Invalid adapter config {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn scale(&self) -> f64 {
        if self.use_rslora {
            self.lora_alpha / (self.r as f64).sqrt()
        } else {
            self.lora_alpha / self.r as f64
        }
    }

    fn ensure_supported(&self) -> Result<()> {
        if !self.peft_type.eq_ignore_ascii_case("LORA") {
            return Err(Error::adapter(format!(
                "Unsupported adapter type '{}', only LORA adapters can be merged",
                self.peft_type
            )));
        }
        if self.use_dora {
            return Err(Error::adapter(
                "DoRA adapters carry magnitude vectors and cannot be merged as plain LoRA",
            ));
        }
        if self.r == 0 {
            return Err(Error::adapter("Adapter rank must be positive"));
        }
        Ok(())
    }
}

/// Loads adapter tensors from a safetensors file onto `device`.
pub fn load_adapter_tensors(
    path: impl AsRef<Path>,
    device: &Device,
) -> Result<HashMap<String, Tensor>> {
    Ok(candle_core::safetensors::load(path, device)?)
}

/// Adds `scale * B·A` to every base weight targeted by the adapter.
///
/// Returns the number of merged projections.
pub fn merge_lora(
    weights: &mut HashMap<String, Tensor>,
    adapter: &HashMap<String, Tensor>,
    config: &AdapterConfig,
) -> Result<usize> {
    config.ensure_supported()?;
    let scale = config.scale();

    let mut unsupported: Vec<&str> = adapter
        .keys()
        .filter(|key| !key.ends_with(LORA_A_SUFFIX) && !key.ends_with(LORA_B_SUFFIX))
        .map(String::as_str)
        .collect();
    if !unsupported.is_empty() {
        unsupported.sort_unstable();
        return Err(Error::adapter(format!(
            "Adapter contains tensors that cannot be merged: {}",
            unsupported.join(", ")
        )));
    }

    let mut modules: Vec<&str> = adapter
        .keys()
        .filter_map(|key| key.strip_suffix(LORA_A_SUFFIX))
        .collect();
    modules.sort_unstable();

    for key in adapter.keys() {
        if let Some(module) = key.strip_suffix(LORA_B_SUFFIX) {
            if !modules.contains(&module) {
                return Err(Error::adapter(format!("Missing lora_A weight for {}", module)));
            }
        }
    }

    for &module in &modules {
        let a = &adapter[&format!("{module}{LORA_A_SUFFIX}")];
        let b = adapter
            .get(&format!("{module}{LORA_B_SUFFIX}"))
            .ok_or_else(|| Error::adapter(format!("Missing lora_B weight for {}", module)))?;

        let base_key = format!("{}.weight", module.strip_prefix(PEFT_PREFIX).unwrap_or(module));
        let base = weights.get(&base_key).ok_or_else(|| {
            Error::adapter(format!("Adapter targets unknown weight {}", base_key))
        })?;

        let mut delta = b
            .to_dtype(DType::F32)?
            .matmul(&a.to_dtype(DType::F32)?)?
            .affine(scale, 0.0)?;
        if config.fan_in_fan_out {
            delta = delta.t()?;
        }
        if delta.dims() != base.dims() {
            return Err(Error::adapter(format!(
                "Shape mismatch for {}: base {:?}, adapter delta {:?}",
                base_key,
                base.dims(),
                delta.dims()
            )));
        }

        let merged = (base.to_dtype(DType::F32)? + delta)?.to_dtype(base.dtype())?;
        debug!("Merged LoRA delta into {}", base_key);
        weights.insert(base_key, merged);
    }

    if modules.is_empty() {
        return Err(Error::adapter("Adapter contains no LoRA weights"));
    }

    info!(
        "Merged {} LoRA projections (r={}, scale={:.4})",
        modules.len(),
        config.r,
        scale
    );
    Ok(modules.len())
}
