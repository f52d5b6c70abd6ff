//! Core [`Corrector`] trait and its backends.
//!
//! [`ApiCorrector`] calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint — Ollama (OpenAI mode), OpenAI, Groq, LM Studio, vLLM, etc.
//! All connection details come from [`CorrectionConfig`]; nothing is
//! hardcoded.  [`PassthroughCorrector`] is the backend used when correction
//! is disabled: it returns the raw text unchanged and never fails.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CorrectionConfig;
use crate::correct::prompt::PromptBuilder;

// ---------------------------------------------------------------------------
// CorrectError
// ---------------------------------------------------------------------------

/// Errors that can occur during a correction call.
///
/// The pipeline handles every variant identically — the affected segment
/// falls back to raw text — so the distinctions exist only for logging.
#[derive(Debug, Error)]
pub enum CorrectError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("correction request timed out")]
    Timeout,

    /// The service rejected the call with HTTP 429.
    #[error("correction service rate-limited the request")]
    RateLimited,

    /// The service answered with a 5xx status.
    #[error("correction service unavailable (HTTP {0})")]
    Service(u16),

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse correction response: {0}")]
    Parse(String),

    /// The service returned a response with no usable text content.
    #[error("correction service returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for CorrectError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CorrectError::Timeout
        } else {
            CorrectError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Corrector trait
// ---------------------------------------------------------------------------

/// Async trait for dictation text correction.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// behind an `Arc<dyn Corrector>`.
///
/// # Arguments
/// * `raw`          – Raw finalized transcript text to correct.
/// * `context_hint` – Optional question text being answered; purely advisory.
///
/// The service must not be assumed idempotent — the pipeline never retries a
/// failed call.
#[async_trait]
pub trait Corrector: Send + Sync {
    async fn correct(&self, raw: &str, context_hint: Option<&str>)
        -> Result<String, CorrectError>;
}

// ---------------------------------------------------------------------------
// ApiCorrector
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// # No hardcoded URLs
/// All connection details (`base_url`, `api_key`, `model`) come exclusively
/// from the [`CorrectionConfig`] passed to [`ApiCorrector::from_config`].
pub struct ApiCorrector {
    client: reqwest::Client,
    config: CorrectionConfig,
    prompt_builder: PromptBuilder,
}

impl ApiCorrector {
    /// Build an `ApiCorrector` from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; its expiry is reported as
    /// [`CorrectError::Timeout`] and treated like any other failure upstream.
    pub fn from_config(config: &CorrectionConfig, language: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            prompt_builder: PromptBuilder::new(language),
        }
    }
}

#[async_trait]
impl Corrector for ApiCorrector {
    /// Send `raw` to the configured endpoint for minimal-touch correction.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is a non-empty string — safe for Ollama and other
    /// local providers that require no authentication.
    async fn correct(
        &self,
        raw: &str,
        context_hint: Option<&str>,
    ) -> Result<String, CorrectError> {
        let (system_msg, user_msg) = self.prompt_builder.build_chat(raw, context_hint);

        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  256
        });

        let mut req = self.client.post(&url).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(CorrectError::RateLimited);
        }
        if status.is_server_error() {
            return Err(CorrectError::Service(status.as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CorrectError::Parse(e.to_string()))?;

        let corrected = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(CorrectError::EmptyResponse)?
            .trim()
            .to_string();

        if corrected.is_empty() {
            return Err(CorrectError::EmptyResponse);
        }

        Ok(corrected)
    }
}

// ---------------------------------------------------------------------------
// PassthroughCorrector
// ---------------------------------------------------------------------------

/// Backend used when correction is disabled — returns `raw` unchanged.
///
/// This implementation **never** returns `Err(_)`, so a disabled-correction
/// pipeline behaves exactly like one whose every call short-circuits.
pub struct PassthroughCorrector;

#[async_trait]
impl Corrector for PassthroughCorrector {
    async fn correct(
        &self,
        raw: &str,
        _context_hint: Option<&str>,
    ) -> Result<String, CorrectError> {
        Ok(raw.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(api_key: Option<&str>) -> CorrectionConfig {
        CorrectionConfig {
            enabled: true,
            base_url: "http://localhost:11434".into(),
            api_key: api_key.map(|s| s.to_string()),
            model: "qwen2.5:3b".into(),
            temperature: 0.3,
            timeout_secs: 10,
            min_chars: 3,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _corrector = ApiCorrector::from_config(&make_config(None), "ja");
    }

    #[test]
    fn from_config_accepts_empty_api_key() {
        let _corrector = ApiCorrector::from_config(&make_config(Some("")), "ja");
    }

    /// Verify that both backends are object-safe (usable as `dyn Corrector`).
    #[test]
    fn correctors_are_object_safe() {
        let api: Box<dyn Corrector> =
            Box::new(ApiCorrector::from_config(&make_config(None), "ja"));
        let pass: Box<dyn Corrector> = Box::new(PassthroughCorrector);
        drop(api);
        drop(pass);
    }

    #[tokio::test]
    async fn passthrough_returns_raw_unchanged() {
        let corrector = PassthroughCorrector;
        let result = corrector.correct("きょうわ いい てんき", None).await.unwrap();
        assert_eq!(result, "きょうわ いい てんき");
    }

    #[tokio::test]
    async fn passthrough_ignores_context_hint() {
        let corrector = PassthroughCorrector;
        let result = corrector
            .correct("hello", Some("What happened today?"))
            .await
            .unwrap();
        assert_eq!(result, "hello");
    }
}
