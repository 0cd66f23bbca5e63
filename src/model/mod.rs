mod files;
pub mod lora;
mod sampling;
mod session;
mod tokenizer;

pub use files::{AdapterFiles, ModelFiles};
pub use lora::{AdapterConfig, merge_lora};
pub use sampling::{LogitsSource, sample_tokens};
pub use session::{ModelSession, select_device, select_dtype};
pub use tokenizer::PromptTokenizer;

use crate::{Result, config::GenerationConfig};

/// Decoding knobs for a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub max_input_tokens: usize,
    pub max_new_tokens: usize,
    pub do_sample: bool,
    pub temperature: f64,
    pub top_p: f64,
    pub seed: Option<u64>,
    pub echo_prompt: bool,
}

impl From<&GenerationConfig> for SamplingParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_input_tokens: config.max_input_tokens,
            max_new_tokens: config.max_new_tokens,
            do_sample: config.do_sample,
            temperature: config.temperature,
            top_p: config.top_p,
            seed: config.seed,
            echo_prompt: config.echo_prompt,
        }
    }
}

/// A loaded model able to turn a full prompt into decoded text.
///
/// Implementations are shared read-only between requests and are called from
/// the blocking thread pool.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String>;
}
