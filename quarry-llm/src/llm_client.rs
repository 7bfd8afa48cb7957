//! LLM client integration using siumai
//!
//! Pipeline components talk to models through the [`TextGenerator`] trait so
//! they can be exercised with scripted generators in tests. [`SiumaiGenerator`]
//! is the production implementation.

use crate::token_counter::estimate_tokens;
use crate::types::{Generation, GenerationRequest, LlmError, LlmResult, TokenCount};
use crate::usage::{UsageLedger, UsageRecord};
use async_trait::async_trait;
use quarry_core::LlmConfig;
use siumai::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Anything that can turn a system + user prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> LlmResult<Generation>;
}

/// Generate text and record the invocation in `ledger`
pub async fn generate_tracked(
    generator: &dyn TextGenerator,
    ledger: &UsageLedger,
    module: &str,
    operation: &str,
    request: GenerationRequest,
) -> LlmResult<String> {
    let generation = generator.generate(request).await?;
    ledger.track(UsageRecord::new(
        generation.model,
        generation.usage,
        module,
        operation,
    ));
    Ok(generation.text)
}

/// siumai-backed generator. One client is built lazily per model name.
pub struct SiumaiGenerator {
    config: LlmConfig,
    clients: RwLock<HashMap<String, Arc<dyn LlmClient>>>,
}

impl SiumaiGenerator {
    pub fn new(config: LlmConfig) -> Self {
        info!("Created LLM generator for provider: {}", config.provider);
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn client_for(&self, model: &str) -> LlmResult<Arc<dyn LlmClient>> {
        if let Some(client) = self.clients.read().await.get(model) {
            return Ok(Arc::clone(client));
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(model) {
            return Ok(Arc::clone(client));
        }

        let client: Arc<dyn LlmClient> = Arc::from(build_client(&self.config, model).await?);
        clients.insert(model.to_string(), Arc::clone(&client));
        debug!(
            "Built {} client for model {}",
            self.config.provider, model
        );
        Ok(client)
    }
}

#[async_trait]
impl TextGenerator for SiumaiGenerator {
    async fn generate(&self, request: GenerationRequest) -> LlmResult<Generation> {
        let client = self.client_for(&request.model).await?;
        let start_time = Instant::now();

        debug!(
            model = %request.model,
            system_chars = request.system.len(),
            user_chars = request.user.len(),
            "Generating response"
        );

        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(system!(request.system.as_str()));
        }
        messages.push(user!(request.user.as_str()));

        let response = client
            .chat(messages)
            .await
            .map_err(|e| LlmError::Request(format!("LLM generation failed: {}", e)))?;

        let text = response
            .content_text()
            .map(|content| content.to_string())
            .ok_or_else(|| LlmError::EmptyResponse(request.model.clone()))?;

        let usage = match &response.usage {
            Some(usage) => TokenCount::new(
                u64::from(usage.prompt_tokens),
                u64::from(usage.completion_tokens),
            ),
            None => {
                let prompt = format!("{}\n{}", request.system, request.user);
                TokenCount::new(
                    estimate_tokens(&prompt, &request.model),
                    estimate_tokens(&text, &request.model),
                )
            }
        };

        info!(
            model = %request.model,
            chars = text.len(),
            tokens = usage.total_tokens,
            "Generated response in {:?}",
            start_time.elapsed()
        );

        Ok(Generation {
            text,
            model: request.model,
            usage,
        })
    }
}

/// Build the appropriate siumai client for `model` based on configuration
async fn build_client(config: &LlmConfig, model: &str) -> LlmResult<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = api_key(config, "OPENAI_API_KEY", "OpenAI")?;

            let mut builder = LlmBuilder::new()
                .openai()
                .api_key(&api_key)
                .model(model)
                .temperature(config.temperature);

            if let Some(max_tokens) = config.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }

            if let Some(base_url) = &config.base_url {
                builder = builder.base_url(base_url);
            }

            let client = builder
                .build()
                .await
                .map_err(|e| LlmError::Config(format!("Failed to build OpenAI client: {}", e)))?;

            Ok(Box::new(client))
        }
        "anthropic" => {
            let api_key = api_key(config, "ANTHROPIC_API_KEY", "Anthropic")?;

            let mut builder = LlmBuilder::new()
                .anthropic()
                .api_key(&api_key)
                .model(model)
                .temperature(config.temperature);

            if let Some(max_tokens) = config.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }

            let client = builder.build().await.map_err(|e| {
                LlmError::Config(format!("Failed to build Anthropic client: {}", e))
            })?;

            Ok(Box::new(client))
        }
        "ollama" => {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string());

            let mut builder = LlmBuilder::new()
                .ollama()
                .model(model)
                .base_url(&base_url)
                .temperature(config.temperature);

            if let Some(max_tokens) = config.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }

            let client = builder
                .build()
                .await
                .map_err(|e| LlmError::Config(format!("Failed to build Ollama client: {}", e)))?;

            Ok(Box::new(client))
        }
        "groq" => {
            let api_key = api_key(config, "GROQ_API_KEY", "Groq")?;

            let mut builder = LlmBuilder::new()
                .groq()
                .api_key(&api_key)
                .model(model)
                .temperature(config.temperature);

            if let Some(max_tokens) = config.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }

            let client = builder
                .build()
                .await
                .map_err(|e| LlmError::Config(format!("Failed to build Groq client: {}", e)))?;

            Ok(Box::new(client))
        }
        provider => Err(LlmError::Config(format!(
            "Unsupported LLM provider: {}",
            provider
        ))),
    }
}

fn api_key(config: &LlmConfig, env_var: &str, provider: &str) -> LlmResult<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .ok_or_else(|| LlmError::Config(format!("{} API key not found", provider)))
}
