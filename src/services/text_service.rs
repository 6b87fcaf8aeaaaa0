//! Text normalization and romanization clients
//!
//! Both operations are language-specific and run as external HTTP
//! services. Normalization canonicalizes one line of source-script text;
//! romanization turns normalized lines into the latin token sequences the
//! alignment model's vocabulary covers, one token string per line.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Text service client errors
#[derive(Debug, Error)]
pub enum TextServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Text service error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Romanizer returned {got} token lines for {expected} input lines")]
    LineCountMismatch { expected: usize, got: usize },
}

/// Language-specific line normalization.
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, line: &str, language: &str) -> Result<String, TextServiceError>;
}

/// Language-specific romanization, one token string per input line.
#[async_trait]
pub trait Romanizer: Send + Sync {
    async fn romanize(
        &self,
        lines: &[String],
        language: &str,
    ) -> Result<Vec<String>, TextServiceError>;
}

#[derive(Debug, Serialize)]
struct NormalizeRequest<'a> {
    text: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct NormalizeResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct RomanizeRequest<'a> {
    lines: &'a [String],
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct RomanizeResponse {
    tokens: Vec<String>,
}

/// HTTP client for the normalization service.
pub struct HttpNormalizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNormalizer {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, TextServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TextServiceError::Network(e.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Normalizer for HttpNormalizer {
    async fn normalize(&self, line: &str, language: &str) -> Result<String, TextServiceError> {
        let url = format!("{}/normalize", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&NormalizeRequest {
                text: line,
                language,
            })
            .send()
            .await
            .map_err(|e| TextServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TextServiceError::Api(status.as_u16(), body));
        }

        let parsed: NormalizeResponse = response
            .json()
            .await
            .map_err(|e| TextServiceError::Parse(e.to_string()))?;
        Ok(parsed.text)
    }
}

/// HTTP client for the romanization service.
pub struct HttpRomanizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRomanizer {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, TextServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TextServiceError::Network(e.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Romanizer for HttpRomanizer {
    async fn romanize(
        &self,
        lines: &[String],
        language: &str,
    ) -> Result<Vec<String>, TextServiceError> {
        let url = format!("{}/romanize", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RomanizeRequest { lines, language })
            .send()
            .await
            .map_err(|e| TextServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TextServiceError::Api(status.as_u16(), body));
        }

        let parsed: RomanizeResponse = response
            .json()
            .await
            .map_err(|e| TextServiceError::Parse(e.to_string()))?;

        if parsed.tokens.len() != lines.len() {
            return Err(TextServiceError::LineCountMismatch {
                expected: lines.len(),
                got: parsed.tokens.len(),
            });
        }
        Ok(parsed.tokens)
    }
}
