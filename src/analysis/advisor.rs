use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::dto::AnalysisInput;
use crate::config::AdvisorConfig;

/// Produces optimization advice for a normalized feed sample.
///
/// The returned text is passed through to the client untouched.
#[async_trait]
pub trait FeedAdvisor: Send + Sync {
    async fn advise(&self, input: &AnalysisInput) -> Result<Option<String>>;
}

/// Used when no advisor endpoint is configured; the response then carries
/// only the normalization outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAdvisor;

#[async_trait]
impl FeedAdvisor for NoopAdvisor {
    async fn advise(&self, _input: &AnalysisInput) -> Result<Option<String>> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct AdviceResponse {
    advice: String,
}

/// POSTs the [`AnalysisInput`] as JSON and reads `{"advice": "..."}` back.
#[derive(Debug, Clone)]
pub struct HttpAdvisor {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpAdvisor {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl FeedAdvisor for HttpAdvisor {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn advise(&self, input: &AnalysisInput) -> Result<Option<String>> {
        let mut request = self.client.post(&self.url).json(input);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to advisor")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("advisor error: {} - {}", status, body);
        }

        let response: AdviceResponse = response
            .json()
            .await
            .context("Failed to parse advisor response")?;
        debug!(chars = response.advice.len(), "advice received");
        Ok(Some(response.advice))
    }
}

/// `HttpAdvisor` when `ADVISOR_URL` is set, otherwise `NoopAdvisor`.
pub fn from_config(config: &AdvisorConfig) -> Arc<dyn FeedAdvisor> {
    match &config.url {
        Some(url) => Arc::new(HttpAdvisor::new(url.clone(), config.api_key.clone())),
        None => Arc::new(NoopAdvisor),
    }
}
