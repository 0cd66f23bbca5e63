use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// CORS policy for the HTTP surface. A single `"*"` entry means "any".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_wildcard")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_wildcard")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "default_wildcard")]
    pub allowed_headers: Vec<String>,
    #[serde(default = "default_allow_credentials")]
    pub allow_credentials: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Hub repository id or path to a local model directory.
    pub base_model: String,
    #[serde(default = "default_revision")]
    pub revision: String,
    /// Hub repository id or path to a local LoRA adapter directory.
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default)]
    pub device: DeviceKind,
    #[serde(default)]
    pub device_ordinal: usize,
    /// Weight precision; picked from the device when unset.
    #[serde(default)]
    pub dtype: Option<WeightDtype>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightDtype {
    F32,
    F16,
    Bf16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_instruction")]
    pub instruction: String,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    #[serde(default = "default_do_sample")]
    pub do_sample: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Return the prompt together with the continuation.
    #[serde(default = "default_echo_prompt")]
    pub echo_prompt: bool,
    #[serde(default = "default_max_concurrent_generations")]
    pub max_concurrent_generations: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logs: LogsConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_wildcard(),
            allowed_methods: default_wildcard(),
            allowed_headers: default_wildcard(),
            allow_credentials: default_allow_credentials(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            instruction: default_instruction(),
            max_input_tokens: default_max_input_tokens(),
            max_new_tokens: default_max_new_tokens(),
            do_sample: default_do_sample(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            seed: None,
            echo_prompt: default_echo_prompt(),
            max_concurrent_generations: default_max_concurrent_generations(),
        }
    }
}

pub const SOAP_INSTRUCTION: &str = "Summarize the following medical dialogue into a SOAP note:";

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_allow_credentials() -> bool {
    true
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_instruction() -> String {
    SOAP_INSTRUCTION.to_string()
}

fn default_max_input_tokens() -> usize {
    1024
}

fn default_max_new_tokens() -> usize {
    256
}

fn default_do_sample() -> bool {
    true
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

fn default_echo_prompt() -> bool {
    true
}

fn default_max_concurrent_generations() -> usize {
    1
}
