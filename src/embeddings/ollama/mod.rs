
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::Embedder;
use crate::config::Config;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Subset of the `/api/tags` listing needed to check the configured model
#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<InstalledModel>,
}

#[derive(Debug, Deserialize)]
struct InstalledModel {
    name: String,
}

/// How a failed HTTP call should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Transient,
    Fatal,
}

impl Failure {
    fn of(error: &ureq::Error) -> Self {
        match error {
            ureq::Error::StatusCode(status) if *status >= 500 => Self::Transient,
            ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_) => Self::Transient,
            _ => Self::Fatal,
        }
    }
}

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS << attempt.saturating_sub(1).min(16))
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.ollama.model.clone(),
            batch_size: config.ollama.batch_size.max(1),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Reach the server and confirm the configured model is installed
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        let installed = self
            .installed_models()
            .with_context(|| format!("Ollama at {} is not reachable", self.base_url))?;

        if !installed.contains(&self.model) {
            warn!("Model {} missing from Ollama, installed: {:?}", self.model, installed);
            anyhow::bail!(
                "Model '{}' is not installed on {} (installed: {})",
                self.model,
                self.base_url,
                installed.join(", ")
            );
        }

        info!("Ollama at {} serves model {}", self.base_url, self.model);
        Ok(())
    }

    fn installed_models(&self) -> Result<Vec<String>> {
        let url = self.base_url.join("/api/tags")?;
        let body = self.send_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let tags: TagsResponse =
            serde_json::from_str(&body).context("Unexpected /api/tags response")?;
        debug!("Ollama lists {} models", tags.models.len());
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }

    /// Embed `texts` with one `/api/embed` call per `batch_size` inputs
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (number, batch) in texts.chunks(self.batch_size as usize).enumerate() {
            debug!("Embedding batch {} ({} texts) with {}", number + 1, batch.len(), self.model);
            let embedded = self
                .embed_request(batch)
                .with_context(|| format!("Embedding batch {} failed", number + 1))?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    fn embed_request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.base_url.join("/api/embed")?;
        let payload = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input,
        })?;

        let body = self.send_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&payload)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;
        let EmbedResponse { embeddings } =
            serde_json::from_str(&body).context("Unexpected /api/embed response")?;

        anyhow::ensure!(
            embeddings.len() == input.len(),
            "Ollama returned {} embeddings for {} inputs",
            embeddings.len(),
            input.len()
        );
        Ok(embeddings)
    }

    /// Run `send` until it succeeds, a fatal error occurs, or the attempts run out
    fn send_with_retry<F>(&self, mut send: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut attempt = 1;
        loop {
            let error = match send() {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            if Failure::of(&error) == Failure::Fatal {
                warn!("Ollama request to {} failed: {}", self.base_url, error);
                anyhow::bail!("Ollama request failed: {}", error);
            }
            if attempt >= self.retry_attempts {
                warn!("Ollama request to {} failed {} times: {}", self.base_url, attempt, error);
                anyhow::bail!("Ollama request failed after {} attempts: {}", attempt, error);
            }

            let delay = backoff_delay(attempt);
            debug!("Attempt {} failed ({}), retrying in {:?}", attempt, error, delay);
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_request(&[text.to_string()])?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Ollama returned no embedding"))
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.generate_embeddings_batch(texts)
    }

    #[inline]
    fn model_id(&self) -> String {
        format!("ollama/{}", self.model)
    }
}
