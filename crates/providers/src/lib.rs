//! Model-service provider implementations for TicketForge.
//!
//! All providers implement the `ticketforge_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use std::sync::Arc;
use ticketforge_config::AppConfig;
use ticketforge_core::error::ProviderError;
use ticketforge_core::provider::Provider;

/// Build the configured provider.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is available,
/// which callers treat as a model-service initialization failure.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "No API key configured (set ANTHROPIC_API_KEY or TICKETFORGE_API_KEY)".into(),
        )
    })?;

    let mut provider = AnthropicProvider::new(api_key)?;
    if let Some(url) = &config.base_url {
        provider = provider.with_base_url(url);
    }
    Ok(Arc::new(provider))
}
