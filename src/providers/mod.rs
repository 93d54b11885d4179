pub mod openai;
pub mod scrub;
pub mod traits;

pub use openai::OpenAiProvider;
pub use scrub::{api_error, sanitize_api_error, scrub_secret_patterns};
pub use traits::Provider;

use crate::config::Config;
use std::sync::Arc;

/// Build the configured provider.
pub fn create_provider(config: &Config) -> Arc<dyn Provider> {
    Arc::new(OpenAiProvider::new(
        &config.provider.base_url,
        config.api_key.as_deref(),
        config.provider.request_timeout_secs,
    ))
}
