//! Fixture-backed [`CatalogStore`].
//!
//! Holds store-shaped (or canonical) toolkit rows in memory and answers every
//! query the way the PostgREST store would: scoped listings behave like an
//! inner join on the embedded subcategory and category. Latency and failures
//! can be injected, and every call is counted.

use super::CatalogStore;
use crate::error::{Result, StrataError};
use crate::models::{Category, CategoryMeta, QueryKey, SubcategoryOption, ToolkitRecord};
use crate::normalize::{normalize_row, normalize_rows};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// The store operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    Toolkits,
    CategoryMeta,
    Categories,
    SubcategoryOptions,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<Value>,
    latency: Duration,
    key_latency: HashMap<QueryKey, Duration>,
    failures: HashMap<StoreCall, (usize, StrataError)>,
    calls: HashMap<StoreCall, usize>,
    requested_keys: Vec<QueryKey>,
}

/// In-memory catalog store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rows,
                ..Inner::default()
            }),
        }
    }

    pub fn from_records(records: &[ToolkitRecord]) -> Self {
        Self::new(
            records
                .iter()
                .filter_map(|record| serde_json::to_value(record).ok())
                .collect(),
        )
    }

    /// Load rows from a JSON file holding an array of toolkit rows.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| StrataError::Config {
            message: format!("Failed to read fixture {}: {}", path.display(), e),
        })?;
        let rows: Vec<Value> = serde_json::from_str(&contents)?;
        debug!("Loaded {} fixture rows from {}", rows.len(), path.display());
        Ok(Self::new(rows))
    }

    /// Delay every call by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    pub fn set_rows(&self, rows: Vec<Value>) {
        self.lock().rows = rows;
    }

    pub fn set_records(&self, records: &[ToolkitRecord]) {
        self.set_rows(
            records
                .iter()
                .filter_map(|record| serde_json::to_value(record).ok())
                .collect(),
        );
    }

    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Delay toolkit and metadata calls for `key` by `latency` instead of the
    /// default.
    pub fn set_key_latency(&self, key: QueryKey, latency: Duration) {
        self.lock().key_latency.insert(key, latency);
    }

    /// Fail the next `times` calls of `call` with `error`.
    pub fn fail_next(&self, call: StoreCall, times: usize, error: StrataError) {
        self.lock().failures.insert(call, (times, error));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Number of calls made to `call` so far.
    pub fn calls(&self, call: StoreCall) -> usize {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }

    /// Keys passed to `fetch_toolkits`, in call order.
    pub fn requested_keys(&self) -> Vec<QueryKey> {
        self.lock().requested_keys.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and decide its latency and outcome before sleeping.
    async fn begin(&self, call: StoreCall, key: Option<&QueryKey>) -> Result<Vec<Value>> {
        let (latency, failure, rows) = {
            let mut inner = self.lock();
            *inner.calls.entry(call).or_insert(0) += 1;
            if let (StoreCall::Toolkits, Some(key)) = (call, key) {
                inner.requested_keys.push(key.clone());
            }

            let latency = key
                .and_then(|k| inner.key_latency.get(k).copied())
                .unwrap_or(inner.latency);

            let failure = match inner.failures.get_mut(&call) {
                Some((remaining, error)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(error.clone())
                }
                _ => None,
            };
            (latency, failure, inner.rows.clone())
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(rows),
        }
    }

    fn in_scope(record: &ToolkitRecord, key: &QueryKey) -> bool {
        key.category().is_none_or(|c| record.category_slug() == Some(c))
            && key
                .subcategory()
                .is_none_or(|s| record.subcategory_slug() == Some(s))
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_toolkits(&self, key: &QueryKey) -> Result<Vec<Value>> {
        let rows = self.begin(StoreCall::Toolkits, Some(key)).await?;
        Ok(rows
            .into_iter()
            .filter(|row| normalize_row(row).is_some_and(|record| Self::in_scope(&record, key)))
            .collect())
    }

    async fn fetch_category_meta(&self, key: &QueryKey) -> Result<CategoryMeta> {
        let Some(category) = key.category() else {
            return Ok(CategoryMeta::default());
        };
        let records = normalize_rows(&self.begin(StoreCall::CategoryMeta, Some(key)).await?);

        let mut meta = CategoryMeta::default();
        for record in records.iter().filter(|r| Self::in_scope(r, key)) {
            let Some(sub) = &record.subcategory else {
                continue;
            };
            if let Some(kind) = sub.kind.as_ref().filter(|k| k.slug.as_deref() == Some(category)) {
                meta.category_name = meta.category_name.or_else(|| kind.name.clone());
            }
            if key.subcategory().is_some() {
                meta.subcategory_name = meta.subcategory_name.or_else(|| sub.name.clone());
            }
        }
        Ok(meta)
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>> {
        let records = normalize_rows(&self.begin(StoreCall::Categories, None).await?);
        let mut by_slug: BTreeMap<String, String> = BTreeMap::new();
        for kind in records
            .iter()
            .filter_map(|r| r.subcategory.as_ref())
            .filter_map(|s| s.kind.as_ref())
        {
            if let Some(slug) = &kind.slug {
                by_slug
                    .entry(slug.clone())
                    .or_insert_with(|| kind.name.clone().unwrap_or_else(|| slug.clone()));
            }
        }
        let mut categories: Vec<Category> = by_slug
            .into_iter()
            .map(|(slug, name)| Category { name, slug })
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn fetch_subcategory_options(&self, category: &str) -> Result<Vec<SubcategoryOption>> {
        let records = normalize_rows(&self.begin(StoreCall::SubcategoryOptions, None).await?);
        let mut options: Vec<SubcategoryOption> = Vec::new();
        for record in &records {
            if record.category_slug() != Some(category) {
                continue;
            }
            let Some(sub) = &record.subcategory else {
                continue;
            };
            let Some(slug) = &sub.slug else {
                continue;
            };
            match options.iter_mut().find(|o| &o.slug == slug) {
                Some(option) => option.count += 1,
                None => options.push(SubcategoryOption {
                    name: sub.name.clone().unwrap_or_else(|| slug.clone()),
                    slug: slug.clone(),
                    count: 1,
                }),
            }
        }
        Ok(options)
    }
}
