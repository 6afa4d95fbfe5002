use std::sync::Arc;

use tasklane_application::CapabilityCache;
use tasklane_core::{AppError, AppResult};
use tasklane_infrastructure::{InMemoryCapabilityCache, RedisCapabilityCache};

use crate::api_config::{ApiConfig, CapabilityCacheBackend};

const CAPABILITY_CACHE_KEY_PREFIX: &str = "tasklane:capabilities";

pub(super) fn build_capability_cache(config: &ApiConfig) -> AppResult<Arc<dyn CapabilityCache>> {
    match config.capability_cache_backend {
        CapabilityCacheBackend::InMemory => Ok(Arc::new(InMemoryCapabilityCache::new())),
        CapabilityCacheBackend::Redis => {
            let redis_url = config.redis_url.as_deref().ok_or_else(|| {
                AppError::Validation(
                    "REDIS_URL is required when CAPABILITY_CACHE_BACKEND=redis".to_owned(),
                )
            })?;
            let client = redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

            Ok(Arc::new(RedisCapabilityCache::new(
                client,
                CAPABILITY_CACHE_KEY_PREFIX,
            )))
        }
    }
}
