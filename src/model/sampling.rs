use super::SamplingParams;
use crate::{Error, Result};
use candle_core::Tensor;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use tracing::debug;

/// Something that produces next-token logits for a token window.
pub trait LogitsSource {
    /// Returns a 1-D, vocabulary-sized logits tensor for `tokens` placed at
    /// position `index_pos` of the running sequence.
    fn forward(&mut self, tokens: &[u32], index_pos: usize) -> Result<Tensor>;
}

/// Runs autoregressive decoding and returns prompt plus generated tokens.
///
/// The first step feeds the whole prompt, later steps feed only the last
/// sampled token so the source can reuse its KV cache.
pub fn sample_tokens<S: LogitsSource>(
    source: &mut S,
    prompt: &[u32],
    params: &SamplingParams,
    eos_token_ids: &[u32],
) -> Result<Vec<u32>> {
    if prompt.is_empty() {
        return Err(Error::generation("Prompt encoded to zero tokens"));
    }

    let seed = params.seed.unwrap_or_else(rand::random);
    let sampling = if params.do_sample {
        Sampling::TopP {
            p: params.top_p,
            temperature: params.temperature,
        }
    } else {
        Sampling::ArgMax
    };
    let mut processor = LogitsProcessor::from_sampling(seed, sampling);

    let mut tokens = prompt.to_vec();
    let mut index_pos = 0;
    for step in 0..params.max_new_tokens {
        let context = if step == 0 {
            &tokens[..]
        } else {
            &tokens[tokens.len() - 1..]
        };
        let logits = source.forward(context, index_pos)?;
        index_pos += context.len();

        let next = processor.sample(&logits)?;
        tokens.push(next);
        if eos_token_ids.contains(&next) {
            debug!("EOS reached after {} new tokens", step + 1);
            break;
        }
    }

    Ok(tokens)
}
