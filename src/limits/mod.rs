//! Effective context budget resolution.
//!
//! The effective limit for a model is the smaller of the user-configured ceiling
//! and the context length the backend reports for that model, clamped to
//! [`MIN_CONTEXT_UNITS`]. Detected values are cached per model until
//! [`ContextLimitResolver::clear_cache`] is called.
//!
//! ```ignore
//! let resolver = ContextLimitResolver::new(Arc::new(client));
//! let limit = resolver.resolve("llama3.2", 8192).await;
//! ```

mod cache;
mod detect;

pub use cache::ModelLimitCache;
pub use detect::{detect_context_length, parse_num_ctx};

use crate::backend::ModelMetadataSource;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Floor for any resolved limit, so a bad value never yields a degenerate budget.
pub const MIN_CONTEXT_UNITS: usize = 100;

pub struct ContextLimitResolver {
    metadata: Option<Arc<dyn ModelMetadataSource>>,
    cache: ModelLimitCache,
}

impl ContextLimitResolver {
    pub fn new(metadata: Arc<dyn ModelMetadataSource>) -> Self {
        Self {
            metadata: Some(metadata),
            cache: ModelLimitCache::new(),
        }
    }

    /// A resolver with no metadata source; every model resolves to the user limit.
    pub fn offline() -> Self {
        Self {
            metadata: None,
            cache: ModelLimitCache::new(),
        }
    }

    /// Effective limit for `model`. Never fails: query errors count as
    /// "nothing detected".
    pub async fn resolve(&self, model: &str, user_limit: usize) -> usize {
        let detected = self.detected_limit(model).await;
        let effective = match detected {
            Some(n) if n > 0 => user_limit.min(n),
            _ => user_limit,
        };
        effective.max(MIN_CONTEXT_UNITS)
    }

    /// Detected context length, querying the backend at most once per model
    /// between cache clears.
    pub async fn detected_limit(&self, model: &str) -> Option<usize> {
        if let Some(cached) = self.cache.get(model) {
            debug!(model, ?cached, "context limit cache hit");
            return cached;
        }

        let detected = self.query(model).await;
        self.cache.insert(model, detected);
        detected
    }

    async fn query(&self, model: &str) -> Option<usize> {
        let metadata = self.metadata.as_ref()?;
        match metadata.model_details(model).await {
            Ok(Some(details)) => {
                let detected = detect_context_length(&details);
                match detected {
                    Some(n) => info!(model, limit = n, "detected model context length"),
                    None => debug!(model, "model metadata has no context length"),
                }
                detected
            }
            Ok(None) => {
                debug!(model, "backend does not know model");
                None
            }
            Err(e) => {
                warn!(model, error = %e, "model metadata query failed, using configured limit");
                None
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &ModelLimitCache {
        &self.cache
    }
}
