use crate::{
    Error, Result,
    config::GenerationConfig,
    model::{SamplingParams, TextGenerator},
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Turns dialogue transcripts into SOAP-note completions.
///
/// Holds the shared generator plus an admission semaphore so no more than
/// `max_concurrent_generations` calls reach the device at once.
pub struct InferenceService {
    generator: Arc<dyn TextGenerator>,
    instruction: String,
    params: SamplingParams,
    permits: Arc<Semaphore>,
}

impl InferenceService {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            instruction: config.instruction.clone(),
            params: SamplingParams::from(config),
            permits: Arc::new(Semaphore::new(config.max_concurrent_generations)),
        }
    }

    /// Prefixes the instruction and runs generation on the blocking pool.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let full_prompt = build_prompt(&self.instruction, prompt);

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::internal(format!("Admission queue closed: {}", e)))?;
        debug!(
            "Generation admitted, {} permits left",
            self.permits.available_permits()
        );

        let generator = Arc::clone(&self.generator);
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            generator.generate(&full_prompt, &params)
        })
        .await
        .map_err(|e| Error::internal(format!("Generation task failed: {}", e)))?
    }

    pub fn params(&self) -> &SamplingParams {
        &self.params
    }
}

/// `"<instruction>\n<prompt>"`
pub fn build_prompt(instruction: &str, prompt: &str) -> String {
    format!("{}\n{}", instruction, prompt)
}
