use axum::Router;
use candle_core::{DType, Device, Tensor};
use soap_note_server::{
    Result,
    config::{
        Config, CorsConfig, DeviceKind, GenerationConfig, ModelConfig, ServerConfig, WeightDtype,
    },
    inference::InferenceService,
    model::TextGenerator,
    server::{self, cors::cors_layer, handlers::AppState},
};
use std::{collections::HashMap, path::Path, sync::Arc};
use tempfile::TempDir;
use tokio::fs;

pub const DIALOGUE: &str = "Doctor: How are you feeling? Patient: My throat hurts.";

/// Create a test configuration with sensible defaults
pub fn create_test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        },
        model: ModelConfig {
            base_model: "./models/llama".to_string(),
            revision: "main".to_string(),
            adapter: None,
            device: DeviceKind::Cpu,
            device_ordinal: 0,
            dtype: Some(WeightDtype::F32),
        },
        generation: GenerationConfig::default(),
    }
}

/// Build the `/chat` router around any generator
pub fn create_test_app(generator: Arc<dyn TextGenerator>) -> Router {
    create_test_app_with(generator, &GenerationConfig::default(), &CorsConfig::default())
}

pub fn create_test_app_with(
    generator: Arc<dyn TextGenerator>,
    generation: &GenerationConfig,
    cors: &CorsConfig,
) -> Router {
    let state = AppState {
        service: Arc::new(InferenceService::new(generator, generation)),
    };
    server::router(state, cors_layer(cors).unwrap())
}

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test config YAML file
pub async fn create_test_config_file(dir: &TempDir, content: &str) -> Result<String> {
    let config_path = dir.path().join("config.yaml");
    fs::write(&config_path, content).await?;
    Ok(config_path.to_string_lossy().to_string())
}

/// Sample configuration YAML for testing
pub const SAMPLE_CONFIG_YAML: &str = r#"
server:
  host: "127.0.0.1"
  port: 9000
  logs:
    level: "debug"
  cors:
    allowed_origins: ["http://localhost:3000"]
    allowed_methods: ["POST", "OPTIONS"]
    allowed_headers: ["content-type"]
    allow_credentials: false

model:
  base_model: "unsloth/Llama-3.2-3B"
  adapter: "./llama-3b-soap-lora"
  device: cuda
  dtype: bf16

generation:
  max_new_tokens: 128
  do_sample: false
  seed: 1234
  echo_prompt: false
  max_concurrent_generations: 2
"#;

/// Invalid configuration YAML for testing error cases
pub const INVALID_CONFIG_YAML: &str = r#"
server:
  port: "not-a-number"

model:
  device: "tpu"
"#;

/// Word-level tokenizer small enough to pair with the tiny checkpoint
pub const TINY_TOKENIZER_JSON: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [
        {"id": 1, "content": "<s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
        {"id": 2, "content": "</s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
    ],
    "normalizer": null,
    "pre_tokenizer": {"type": "Whitespace"},
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": {
            "<unk>": 0, "<s>": 1, "</s>": 2,
            "Doctor": 3, "Patient": 4, "throat": 5, "hurts": 6,
            "sore": 7, "note": 8, ":": 9, ".": 10
        },
        "unk_token": "<unk>"
    }
}"#;

pub const TINY_VOCAB: usize = 11;
const TINY_HIDDEN: usize = 8;
const TINY_INTERMEDIATE: usize = 16;

fn random(shape: (usize, usize)) -> Tensor {
    Tensor::randn(0f32, 0.5, shape, &Device::Cpu).unwrap()
}

/// Writes a one-layer Llama checkpoint with random weights into `dir`
pub fn write_tiny_llama(dir: &Path) {
    let config = serde_json::json!({
        "hidden_size": TINY_HIDDEN,
        "intermediate_size": TINY_INTERMEDIATE,
        "vocab_size": TINY_VOCAB,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "num_key_value_heads": 2,
        "rms_norm_eps": 1e-5,
        "rope_theta": 10000.0,
        "bos_token_id": 1,
        "eos_token_id": 2,
        "max_position_embeddings": 64,
        "tie_word_embeddings": false
    });
    std::fs::write(dir.join("config.json"), config.to_string()).unwrap();
    std::fs::write(dir.join("tokenizer.json"), TINY_TOKENIZER_JSON).unwrap();

    let mut tensors: HashMap<String, Tensor> = HashMap::new();
    tensors.insert(
        "model.embed_tokens.weight".to_string(),
        random((TINY_VOCAB, TINY_HIDDEN)),
    );
    tensors.insert("lm_head.weight".to_string(), random((TINY_VOCAB, TINY_HIDDEN)));
    tensors.insert(
        "model.norm.weight".to_string(),
        Tensor::ones(TINY_HIDDEN, DType::F32, &Device::Cpu).unwrap(),
    );

    let layer = "model.layers.0";
    for proj in ["q_proj", "k_proj", "v_proj", "o_proj"] {
        tensors.insert(
            format!("{layer}.self_attn.{proj}.weight"),
            random((TINY_HIDDEN, TINY_HIDDEN)),
        );
    }
    for proj in ["gate_proj", "up_proj"] {
        tensors.insert(
            format!("{layer}.mlp.{proj}.weight"),
            random((TINY_INTERMEDIATE, TINY_HIDDEN)),
        );
    }
    tensors.insert(
        format!("{layer}.mlp.down_proj.weight"),
        random((TINY_HIDDEN, TINY_INTERMEDIATE)),
    );
    for norm in ["input_layernorm", "post_attention_layernorm"] {
        tensors.insert(
            format!("{layer}.{norm}.weight"),
            Tensor::ones(TINY_HIDDEN, DType::F32, &Device::Cpu).unwrap(),
        );
    }

    candle_core::safetensors::save(&tensors, dir.join("model.safetensors")).unwrap();
}

/// Writes a rank-2 LoRA adapter on `q_proj`; `out_features` lets tests break the shape
pub fn write_tiny_adapter(dir: &Path, peft_type: &str, out_features: usize) {
    let config = serde_json::json!({
        "peft_type": peft_type,
        "task_type": "CAUSAL_LM",
        "r": 2,
        "lora_alpha": 4,
        "target_modules": ["q_proj"]
    });
    std::fs::write(dir.join("adapter_config.json"), config.to_string()).unwrap();

    let prefix = "base_model.model.model.layers.0.self_attn.q_proj";
    let mut tensors: HashMap<String, Tensor> = HashMap::new();
    tensors.insert(format!("{prefix}.lora_A.weight"), random((2, TINY_HIDDEN)));
    tensors.insert(format!("{prefix}.lora_B.weight"), random((out_features, 2)));
    candle_core::safetensors::save(&tensors, dir.join("adapter_model.safetensors")).unwrap();
}

/// Model config pointing at a local checkpoint directory
pub fn local_model_config(model_dir: &Path, adapter_dir: Option<&Path>) -> ModelConfig {
    ModelConfig {
        base_model: model_dir.to_string_lossy().to_string(),
        revision: "main".to_string(),
        adapter: adapter_dir.map(|dir| dir.to_string_lossy().to_string()),
        device: DeviceKind::Cpu,
        device_ordinal: 0,
        dtype: Some(WeightDtype::F32),
    }
}
