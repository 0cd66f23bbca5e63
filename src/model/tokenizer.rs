use crate::{Error, Result};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

const EOS_CANDIDATES: [&str; 4] = ["<|end_of_text|>", "<|eot_id|>", "</s>", "<|endoftext|>"];

/// Tokenizer wrapper that applies prompt truncation and special-token stripping.
pub struct PromptTokenizer {
    inner: Tokenizer,
    eos_token_ids: Vec<u32>,
}

impl PromptTokenizer {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = Tokenizer::from_file(path).map_err(|e| {
            Error::tokenizer(format!(
                "Failed to load tokenizer from {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::new(inner))
    }

    pub fn new(inner: Tokenizer) -> Self {
        let eos_token_ids: Vec<u32> = EOS_CANDIDATES
            .iter()
            .filter_map(|token| inner.token_to_id(token))
            .collect();

        info!(
            "Tokenizer ready, vocab_size={}, eos_tokens={:?}",
            inner.get_vocab_size(true),
            eos_token_ids
        );

        Self {
            inner,
            eos_token_ids,
        }
    }

    /// Encodes `text` with special tokens, keeping at most `max_tokens` leading ids.
    pub fn encode(&self, text: &str, max_tokens: usize) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| Error::tokenizer(format!("Failed to encode prompt: {}", e)))?;

        let mut ids = encoding.get_ids().to_vec();
        if ids.len() > max_tokens {
            debug!("Truncating prompt from {} to {} tokens", ids.len(), max_tokens);
            ids.truncate(max_tokens);
        }
        Ok(ids)
    }

    /// Decodes ids back to text with special tokens removed.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| Error::tokenizer(format!("Failed to decode tokens: {}", e)))
    }

    /// Well-known end-of-text ids present in the vocabulary.
    pub fn eos_token_ids(&self) -> &[u32] {
        &self.eos_token_ids
    }
}
