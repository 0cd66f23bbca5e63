use super::{
    AdapterConfig, AdapterFiles, LogitsSource, ModelFiles, PromptTokenizer, SamplingParams,
    TextGenerator, lora, sample_tokens,
};
use crate::{
    Error, Result,
    config::{DeviceKind, ModelConfig, WeightDtype},
};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig, LlamaEosToks};
use std::{collections::HashMap, time::Instant};
use tracing::{debug, info, warn};

const ADAPTER_REVISION: &str = "main";

/// The process-wide loaded model: base weights with the adapter merged in,
/// its tokenizer, and the device it is bound to.
///
/// Nothing in the session is mutated after [`ModelSession::load`]; every
/// generation builds its own KV cache.
pub struct ModelSession {
    model: Llama,
    config: Config,
    tokenizer: PromptTokenizer,
    device: Device,
    dtype: DType,
    eos_token_ids: Vec<u32>,
}

impl ModelSession {
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let started = Instant::now();
        let device = select_device(config.device, config.device_ordinal)?;
        let dtype = select_dtype(config.dtype, &device);
        info!(
            "Loading model '{}' on {:?} with dtype {:?}",
            config.base_model, device, dtype
        );

        let files = ModelFiles::resolve(&config.base_model, &config.revision)?;
        let tokenizer = PromptTokenizer::from_file(&files.tokenizer)?;

        let llama_config: LlamaConfig = serde_json::from_slice(&std::fs::read(&files.config)?)
            .map_err(|e| Error::model(format!("Invalid model config: {}", e)))?;
        let llama_config = llama_config.into_config(false);

        let mut weights = HashMap::new();
        for path in &files.weights {
            debug!("Reading weights from {}", path.display());
            weights.extend(candle_core::safetensors::load(path, &device)?);
        }

        match &config.adapter {
            Some(adapter_id) => {
                let adapter_files = AdapterFiles::resolve(adapter_id, ADAPTER_REVISION)?;
                let adapter_config = AdapterConfig::from_file(&adapter_files.config)?;
                if let Some(trained_on) = &adapter_config.base_model_name_or_path {
                    if trained_on != &config.base_model {
                        warn!(
                            "Adapter was trained on '{}' but base model is '{}'",
                            trained_on, config.base_model
                        );
                    }
                }
                let adapter = lora::load_adapter_tensors(&adapter_files.weights, &device)?;
                lora::merge_lora(&mut weights, &adapter, &adapter_config)?;
            }
            None => warn!("No adapter configured, serving the base model as-is"),
        }

        let vb = VarBuilder::from_tensors(weights, dtype, &device);
        let model = Llama::load(vb, &llama_config)
            .map_err(|e| Error::model(format!("Failed to build model: {}", e)))?;

        let eos_token_ids =
            resolve_eos_tokens(llama_config.eos_token_id.as_ref(), tokenizer.eos_token_ids());

        info!(
            "Model ready in {:.1}s, eos_tokens={:?}",
            started.elapsed().as_secs_f32(),
            eos_token_ids
        );

        Ok(Self {
            model,
            config: llama_config,
            tokenizer,
            device,
            dtype,
            eos_token_ids,
        })
    }
}

impl TextGenerator for ModelSession {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
        let started = Instant::now();
        let prompt_tokens = self.tokenizer.encode(prompt, params.max_input_tokens)?;

        let mut step = LlamaStep {
            model: &self.model,
            cache: Cache::new(true, self.dtype, &self.config, &self.device)?,
            device: &self.device,
        };
        let tokens = sample_tokens(&mut step, &prompt_tokens, params, &self.eos_token_ids)?;

        let output = if params.echo_prompt {
            &tokens[..]
        } else {
            &tokens[prompt_tokens.len()..]
        };
        let text = self.tokenizer.decode(output)?;

        info!(
            prompt_tokens = prompt_tokens.len(),
            new_tokens = tokens.len() - prompt_tokens.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation finished"
        );
        Ok(text)
    }
}

/// One request's view of the model: shared weights plus a private KV cache.
struct LlamaStep<'a> {
    model: &'a Llama,
    cache: Cache,
    device: &'a Device,
}

impl LogitsSource for LlamaStep<'_> {
    fn forward(&mut self, tokens: &[u32], index_pos: usize) -> Result<Tensor> {
        let input = Tensor::new(tokens, self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input, index_pos, &mut self.cache)?;
        Ok(logits.squeeze(0)?)
    }
}

/// Stop ids declared by the model config; the tokenizer's end-of-text tokens
/// are only consulted when the config declares none.
pub fn resolve_eos_tokens(declared: Option<&LlamaEosToks>, vocabulary: &[u32]) -> Vec<u32> {
    let mut ids = match declared {
        Some(LlamaEosToks::Single(id)) => vec![*id],
        Some(LlamaEosToks::Multiple(ids)) if !ids.is_empty() => ids.clone(),
        _ => vocabulary.to_vec(),
    };
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Binds to the requested device; `Auto` prefers an accelerator.
pub fn select_device(kind: DeviceKind, ordinal: usize) -> Result<Device> {
    let device = match kind {
        DeviceKind::Cpu => Device::Cpu,
        DeviceKind::Cuda => Device::new_cuda(ordinal)
            .map_err(|e| Error::model(format!("CUDA device {} unavailable: {}", ordinal, e)))?,
        DeviceKind::Metal => Device::new_metal(ordinal)
            .map_err(|e| Error::model(format!("Metal device {} unavailable: {}", ordinal, e)))?,
        DeviceKind::Auto => {
            if candle_core::utils::cuda_is_available() {
                Device::new_cuda(ordinal)?
            } else if candle_core::utils::metal_is_available() {
                Device::new_metal(ordinal)?
            } else {
                Device::Cpu
            }
        }
    };
    Ok(device)
}

/// Reduced precision on accelerators, full precision on CPU unless overridden.
pub fn select_dtype(requested: Option<WeightDtype>, device: &Device) -> DType {
    match requested {
        Some(WeightDtype::F32) => DType::F32,
        Some(WeightDtype::F16) => DType::F16,
        Some(WeightDtype::Bf16) => DType::BF16,
        None if device.is_cuda() => DType::BF16,
        None if device.is_metal() => DType::F16,
        None => DType::F32,
    }
}
