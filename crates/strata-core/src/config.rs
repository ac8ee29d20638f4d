//! Centralized configuration for the catalog engine.
//!
//! Constant structs hold the compiled-in defaults; [`CatalogConfig`] is the
//! runtime configuration assembled from those defaults, the environment, or a
//! JSON file.

use crate::error::{Result, StrataError};
use crate::network::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application-level constants.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "StrataUI";
    pub const USER_AGENT: &'static str = "Strata-Catalog/1.0";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    /// Longest wait honored from a `Retry-After` header.
    pub const MAX_THROTTLE: Duration = Duration::from_secs(30);
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
}

/// Cache staleness and garbage-collection windows.
pub struct CacheConfig;

impl CacheConfig {
    /// Toolkit listings change most often.
    pub const TOOLKITS_STALE_AFTER: Duration = Duration::from_secs(3 * 60);
    /// Category/subcategory names behind the breadcrumb.
    pub const META_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
    pub const CATEGORIES_STALE_AFTER: Duration = Duration::from_secs(60 * 60);
    pub const SUBCATEGORY_OPTIONS_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
    /// Idle time after which an unused entry is dropped.
    pub const GC_AFTER: Duration = Duration::from_secs(10 * 60);
    /// Automatic retries after the first failed attempt.
    pub const RETRY_COUNT: u32 = 1;
    pub const MAX_ENTRIES: u64 = 256;
}

/// Search input behavior.
pub struct SearchConfig;

impl SearchConfig {
    pub const DEBOUNCE: Duration = Duration::from_millis(300);
    pub const MAX_TERM_LEN: usize = 80;
}

/// Backing store paths and environment variable names.
pub struct StoreConfig;

impl StoreConfig {
    pub const REST_PATH: &'static str = "/rest/v1";
    pub const STORAGE_PUBLIC_PATH: &'static str = "/storage/v1/object/public";
    pub const IMAGE_BUCKET: &'static str = "library-images";
    pub const IMAGE_FALLBACK: &'static str = "/images/placeholders/tool-placeholder.png";
    pub const URL_ENV: &'static str = "STRATA_STORE_URL";
    pub const KEY_ENV: &'static str = "STRATA_STORE_KEY";
    pub const BUCKET_ENV: &'static str = "STRATA_IMAGE_BUCKET";
}

/// Durations are written as integer milliseconds in config files.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Freshness, retention and retry policy for one cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CachePolicy {
    /// How long fetched data is served without triggering a refresh.
    #[serde(with = "millis")]
    pub stale_after: Duration,
    /// Idle time after which the entry is evicted.
    #[serde(with = "millis")]
    pub gc_after: Duration,
    /// Retries after the first failed attempt.
    pub retries: u32,
    #[serde(with = "millis")]
    pub retry_base_delay: Duration,
    #[serde(with = "millis")]
    pub retry_max_delay: Duration,
    pub max_entries: u64,
}

impl CachePolicy {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after,
            gc_after: CacheConfig::GC_AFTER,
            retries: CacheConfig::RETRY_COUNT,
            retry_base_delay: NetworkConfig::RETRY_BASE_DELAY,
            retry_max_delay: NetworkConfig::RETRY_MAX_DELAY,
            max_entries: CacheConfig::MAX_ENTRIES,
        }
    }

    pub fn with_gc_after(mut self, gc_after: Duration) -> Self {
        self.gc_after = gc_after;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, base: Duration) -> Self {
        self.retry_base_delay = base;
        self
    }

    /// Backoff schedule used by the cache when a fetch fails.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.retries + 1)
            .with_base_delay(self.retry_base_delay)
            .with_max_delay(self.retry_max_delay)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(CacheConfig::TOOLKITS_STALE_AFTER)
    }
}

/// Connection settings for the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StoreSettings {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub url: Option<String>,
    /// Anonymous (public) API key.
    pub anon_key: Option<String>,
    pub image_bucket: String,
    pub image_fallback: String,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            image_bucket: StoreConfig::IMAGE_BUCKET.to_string(),
            image_fallback: StoreConfig::IMAGE_FALLBACK.to_string(),
            request_timeout: NetworkConfig::REQUEST_TIMEOUT,
        }
    }
}

/// Search controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SearchSettings {
    #[serde(with = "millis")]
    pub debounce: Duration,
    pub max_term_len: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce: SearchConfig::DEBOUNCE,
            max_term_len: SearchConfig::MAX_TERM_LEN,
        }
    }
}

/// Runtime configuration for a [`Catalog`](crate::Catalog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CatalogConfig {
    pub store: StoreSettings,
    pub toolkits: CachePolicy,
    pub meta: CachePolicy,
    pub categories: CachePolicy,
    pub subcategory_options: CachePolicy,
    pub search: SearchSettings,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            toolkits: CachePolicy::new(CacheConfig::TOOLKITS_STALE_AFTER),
            meta: CachePolicy::new(CacheConfig::META_STALE_AFTER),
            categories: CachePolicy::new(CacheConfig::CATEGORIES_STALE_AFTER),
            subcategory_options: CachePolicy::new(CacheConfig::SUBCATEGORY_OPTIONS_STALE_AFTER),
            search: SearchSettings::default(),
        }
    }
}

impl CatalogConfig {
    /// Defaults overlaid with the `STRATA_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Load a JSON config file. Missing fields take their defaults; the
    /// environment still overrides store credentials.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| StrataError::Config {
            message: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        let mut config: Self = serde_json::from_str(&contents).map_err(|e| StrataError::Config {
            message: format!("Failed to parse config {}: {}", path.display(), e),
        })?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(StoreConfig::URL_ENV) {
            self.store.url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(key) = non_empty(StoreConfig::KEY_ENV) {
            self.store.anon_key = Some(key);
        }
        if let Some(bucket) = non_empty(StoreConfig::BUCKET_ENV) {
            self.store.image_bucket = bucket;
        }
    }
}
