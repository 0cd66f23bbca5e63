use soap_note_server::{
    Error, Result,
    model::{SamplingParams, TextGenerator},
};
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

pub const CONTINUATION: &str = "S: Sore throat.\nO: Not examined.\nA: Pharyngitis.\nP: Rest.";

/// Stub generator that echoes its prompt followed by a canned note.
#[derive(Debug, Default)]
pub struct StubGenerator {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub params: Mutex<Vec<SamplingParams>>,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn get_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TextGenerator for StubGenerator {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.params.lock().unwrap().push(params.clone());

        if params.echo_prompt {
            Ok(format!("{}\n{}", prompt, CONTINUATION))
        } else {
            Ok(CONTINUATION.to_string())
        }
    }
}

/// Generator that always fails, as if the device ran out of memory.
#[derive(Debug, Default)]
pub struct FailingGenerator {
    pub calls: AtomicUsize,
}

impl TextGenerator for FailingGenerator {
    fn generate(&self, _prompt: &str, _params: &SamplingParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::generation("CUDA out of memory"))
    }
}
