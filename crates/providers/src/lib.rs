//! Completion providers for Acontext.
//!
//! All providers implement the `acontext_core::Provider` trait.
//! [`build_from_config`] creates the provider the CLI runs with.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use acontext_config::AppConfig;
use acontext_core::error::ProviderError;

/// Build the configured provider.
///
/// The provider name is guessed from the base URL so logs say which service
/// answered.
pub fn build_from_config(config: &AppConfig) -> Result<OpenAiCompatProvider, ProviderError> {
    let api_key = match &config.llm_api_key {
        Some(key) if config.has_api_key() => key.clone(),
        _ => {
            return Err(ProviderError::NotConfigured(
                "llm_api_key is not set (config file or LLM_API_KEY)".into(),
            ));
        }
    };

    OpenAiCompatProvider::new(
        provider_name(&config.llm_base_url),
        &config.llm_base_url,
        api_key,
        &config.llm_model,
        config.llm_temperature,
    )
}

fn provider_name(base_url: &str) -> &'static str {
    if base_url.contains("openrouter.ai") {
        "openrouter"
    } else if base_url.contains("api.openai.com") {
        "openai"
    } else if base_url.contains("localhost:11434") {
        "ollama"
    } else {
        "custom"
    }
}
