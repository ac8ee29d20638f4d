//! Public URLs for toolkit images.

use crate::config::{StoreConfig, StoreSettings};
use serde::{Deserialize, Serialize};

/// Maps a stored image reference to something a browser can load.
///
/// - missing or blank: the placeholder
/// - `http://` / `https://`: unchanged
/// - anything else: a path in the public storage bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResolver {
    base_url: Option<String>,
    bucket: String,
    fallback: String,
}

impl ImageResolver {
    pub fn new(base_url: Option<&str>, bucket: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            base_url: base_url
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            bucket: bucket.into(),
            fallback: fallback.into(),
        }
    }

    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self::new(
            settings.url.as_deref(),
            settings.image_bucket.clone(),
            settings.image_fallback.clone(),
        )
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn resolve(&self, path: Option<&str>) -> String {
        let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
            return self.fallback.clone();
        };
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}{}/{}/{}",
                base,
                StoreConfig::STORAGE_PUBLIC_PATH,
                self.bucket,
                path.trim_start_matches('/')
            ),
            None => self.fallback.clone(),
        }
    }
}
