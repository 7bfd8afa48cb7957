//! Scripted generator for unit tests

use async_trait::async_trait;
use quarry_llm::{Generation, GenerationRequest, LlmResult, TextGenerator, TokenCount};
use std::sync::Mutex;

type Responder = dyn Fn(&GenerationRequest) -> LlmResult<String> + Send + Sync;

/// Answers each request with the output of a closure and keeps every request
pub(crate) struct ScriptedGenerator {
    respond: Box<Responder>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&GenerationRequest) -> LlmResult<String> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> LlmResult<Generation> {
        self.requests.lock().unwrap().push(request.clone());
        let text = (self.respond)(&request)?;
        Ok(Generation {
            usage: TokenCount::new(100, text.len() as u64),
            text,
            model: request.model,
        })
    }
}
