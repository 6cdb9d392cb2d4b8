//! Provider selection — builds the generation provider named in config.

use std::sync::Arc;
use memweave_core::error::ProviderError;
use memweave_core::provider::Provider;
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build a single provider by name from configuration.
///
/// `gemini` gets the native client; any other name is treated as an
/// OpenAI-compatible endpoint, using `[providers.<name>].api_url` when set.
pub fn build_provider(
    name: &str,
    config: &memweave_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key_for(name).unwrap_or_default();
    let api_url = config.providers.get(name).and_then(|p| p.api_url.clone());

    let provider: Arc<dyn Provider> = match name {
        "gemini" => match api_url {
            Some(url) => Arc::new(GeminiProvider::with_base_url(url, api_key)?),
            None => Arc::new(GeminiProvider::new(api_key)?),
        },
        other => {
            let base_url = api_url.unwrap_or_else(|| default_base_url(other));
            Arc::new(OpenAiCompatProvider::new(other, base_url, api_key)?)
        }
    };
    Ok(provider)
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
