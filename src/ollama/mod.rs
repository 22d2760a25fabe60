
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::{EmbeddingTask, Embedder};
use crate::generation::{GenerationError, Generator};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking client for the Ollama HTTP API.
///
/// Serves both the embedding model and the generation model. Every request
/// carries the agent-wide timeout and is retried with exponential backoff on
/// server errors and transport failures.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    generation_model: String,
    document_prefix: String,
    query_prefix: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            document_prefix: config.document_prefix.clone(),
            query_prefix: config.query_prefix.clone(),
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
            retry_attempts: config.retry_attempts,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Test connection to Ollama server and verify both models are available
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;

        let models = self.list_models().context("Failed to list models")?;
        for model in [&self.embedding_model, &self.generation_model] {
            if !models.iter().any(|m| &m.name == model) {
                let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                warn!("Model {} not found. Available models: {:?}", model, available);
                return Err(anyhow::anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    model,
                    available
                ));
            }
        }

        info!(
            "Health check passed for Ollama server at {} (embedding: {}, generation: {})",
            self.base_url, self.embedding_model, self.generation_model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/version")
            .context("Failed to build ping URL")?;

        debug!("Pinging Ollama server at {}", url);

        self.send_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to ping Ollama server")?;

        debug!("Server ping successful");
        Ok(())
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .send_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Embed `text` for the given retrieval task, reporting every failure
    #[inline]
    pub fn try_embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(anyhow::anyhow!("Cannot embed empty text"));
        }

        let prefix = match task {
            EmbeddingTask::Document => &self.document_prefix,
            EmbeddingTask::Query => &self.query_prefix,
        };

        debug!(
            "Generating {:?} embedding for text (length: {})",
            task,
            text.len()
        );

        let request = EmbedRequest {
            model: &self.embedding_model,
            input: format!("{prefix}{text}"),
        };

        let url = self
            .base_url
            .join("/api/embed")
            .context("Failed to build embedding URL")?;

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let response_text = self
            .send_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate embedding")?;

        let embed_response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        let embedding = embed_response
            .embeddings
            .into_iter()
            .next()
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Ollama returned no embedding"))?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    fn send_with_retry<F>(&self, mut request_fn: F) -> Result<String, ureq::Error>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let attempts = self.retry_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("HTTP request attempt {}/{}", attempt, attempts);

            let error = match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => error,
            };

            let should_retry = match &error {
                ureq::Error::StatusCode(status) if *status >= 500 => {
                    warn!(
                        "Server error (status {}), attempt {}/{}",
                        status, attempt, attempts
                    );
                    true
                }
                ureq::Error::StatusCode(status) => {
                    warn!("Client error (status {}), not retrying", status);
                    false
                }
                ureq::Error::ConnectionFailed
                | ureq::Error::HostNotFound
                | ureq::Error::Timeout(_)
                | ureq::Error::Io(_) => {
                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        error, attempt, attempts
                    );
                    true
                }
                _ => {
                    warn!("Non-retryable error: {}", error);
                    false
                }
            };

            if !should_retry {
                return Err(error);
            }

            if attempt >= attempts {
                error!("All retry attempts failed for request to {}", self.base_url);
                return Err(error);
            }

            let delay = Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
            debug!("Waiting {:?} before retry", delay);
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn embed(&self, text: &str, task: EmbeddingTask) -> Vec<f32> {
        if text.trim().is_empty() {
            debug!("Skipping embedding request for empty text");
            return Vec::new();
        }

        match self.try_embed(text, task) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Embedding failed, returning empty vector: {:#}", e);
                Vec::new()
            }
        }
    }
}

impl Generator for OllamaClient {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        debug!(
            "Generating with model {} (prompt length: {})",
            self.generation_model,
            prompt.len()
        );

        let url = self
            .base_url
            .join("/api/generate")
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let request = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let response_text = self
            .send_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => GenerationError::Status(status),
                other => GenerationError::Request(other.to_string()),
            })?;

        let generate_response: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        if generate_response.response.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        debug!(
            "Generated {} characters of output",
            generate_response.response.len()
        );
        Ok(generate_response.response)
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}
