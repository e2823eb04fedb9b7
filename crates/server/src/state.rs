//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::SupportConfig;
use crate::gemini::GeminiClient;
use crate::middleware::RateLimiter;
use crate::query::PgStore;

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SupportConfig,
    gemini: GeminiClient,
    store: PgStore,
    limiter: RateLimiter,
}

impl AppState {
    /// Build application state from loaded configuration.
    #[must_use]
    pub fn new(config: SupportConfig) -> Self {
        let gemini = GeminiClient::new(&config.gemini);
        let store = PgStore::new(config.database_url.clone(), config.store_timeout);
        let limiter = RateLimiter::new(config.rate_limit);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                gemini,
                store,
                limiter,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SupportConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn gemini(&self) -> &GeminiClient {
        &self.inner.gemini
    }

    #[must_use]
    pub fn store(&self) -> &PgStore {
        &self.inner.store
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }
}
