//! LLM provider implementations.
//!
//! Contains concrete implementations of the [`LlmProvider`] trait defined in
//! `delve-core`, and a factory ([`create_provider`]) that builds the boxed
//! provider from configuration.
//!
//! [`LlmProvider`]: delve_core::llm::provider::LlmProvider

pub mod anthropic;
pub mod unavailable;

use secrecy::SecretString;

use delve_core::llm::box_provider::BoxLlmProvider;
use delve_types::config::LlmConfig;
use delve_types::llm::LlmError;

use self::anthropic::AnthropicProvider;
use self::unavailable::UnavailableProvider;

/// Create a [`BoxLlmProvider`] for the configured model.
///
/// # Errors
///
/// Returns [`LlmError::AuthenticationFailed`] when no API key is provided.
pub fn create_provider(
    config: &LlmConfig,
    api_key: Option<SecretString>,
) -> Result<BoxLlmProvider, LlmError> {
    let key = api_key.ok_or(LlmError::AuthenticationFailed)?;
    let mut provider = AnthropicProvider::new(key, config.model.clone())?;
    if let Some(base_url) = config.base_url.as_deref() {
        provider = provider.with_base_url(base_url);
    }
    Ok(BoxLlmProvider::new(provider))
}

/// Like [`create_provider`], but a missing key yields a provider whose calls
/// fail with [`LlmError::AuthenticationFailed`] instead of an error here.
pub fn create_provider_or_unavailable(
    config: &LlmConfig,
    api_key: Option<SecretString>,
) -> Result<BoxLlmProvider, LlmError> {
    if api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY not set; research and chat requests will fail");
        return Ok(BoxLlmProvider::new(UnavailableProvider::missing_key()));
    }
    create_provider(config, api_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_anthropic() {
        let provider =
            create_provider(&LlmConfig::default(), Some(SecretString::from("sk-test"))).unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert!(provider.capabilities().tool_calling);
    }

    #[test]
    fn test_create_provider_missing_key() {
        let result = create_provider(&LlmConfig::default(), None);
        assert!(matches!(result, Err(LlmError::AuthenticationFailed)));
    }

    #[test]
    fn test_missing_key_falls_back_to_unavailable() {
        let provider = create_provider_or_unavailable(&LlmConfig::default(), None).unwrap();
        assert_eq!(provider.name(), "unavailable");
    }
}
