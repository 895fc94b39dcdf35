//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use crate::error::{QaError, Result};
use crate::llm::{
    GeminiClient, GeminiConfig, LlmClient, LlmProvider, MockLlmClient, OpenAiClient, OpenAiConfig,
};

/// Resolves the credential for `provider`.
///
/// A provided `api_key` takes precedence over the provider's environment
/// variable (`GOOGLE_API_KEY` or `OPENAI_API_KEY`). Providers that need no
/// key resolve to `None`.
pub fn resolve_api_key(provider: LlmProvider, api_key: Option<String>) -> Result<Option<String>> {
    resolve_api_key_with(provider, api_key, |var| std::env::var(var).ok())
}

/// Resolves the credential for `provider`, reading variables through `env`.
fn resolve_api_key_with(
    provider: LlmProvider,
    api_key: Option<String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Option<String>> {
    let Some(var) = provider.api_key_env() else {
        return Ok(None);
    };

    api_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| env(var).filter(|k| !k.trim().is_empty()))
        .map(Some)
        .ok_or_else(|| QaError::config(format!("{var} not found in environment variables")))
}

/// Creates an LLM client for the given provider.
///
/// The credential is resolved with [`resolve_api_key`] before anything else,
/// so a missing key fails without any network traffic.
pub fn create_client(
    provider: LlmProvider,
    model: &str,
    api_key: Option<String>,
    timeout_secs: u64,
) -> Result<Arc<dyn LlmClient>> {
    let key = resolve_api_key(provider, api_key)?;

    match (provider, key) {
        (LlmProvider::Gemini, Some(key)) => Ok(Arc::new(GeminiClient::new(
            GeminiConfig::new(key, model).with_timeout(timeout_secs),
        )?)),
        (LlmProvider::OpenAi, Some(key)) => Ok(Arc::new(OpenAiClient::new(
            OpenAiConfig::new(key, model).with_timeout(timeout_secs),
        )?)),
        (LlmProvider::Mock, _) => Ok(Arc::new(MockLlmClient::new())),
        (provider, None) => Err(QaError::internal(format!(
            "No credential resolved for {provider}"
        ))),
    }
}
