//! Backing store access.
//!
//! [`CatalogStore`] is the seam between the engine and the hosted relational
//! store. Implementations return raw rows; reshaping them into
//! [`ToolkitRecord`](crate::ToolkitRecord)s is the normalizer's job.
//!
//! - [`PostgrestStore`] - PostgREST/Supabase REST surface over reqwest
//! - [`InMemoryStore`] - fixture-backed store for tests and offline demos

mod memory;
mod postgrest;

pub use memory::{InMemoryStore, StoreCall};
pub use postgrest::PostgrestStore;

use crate::error::Result;
use crate::models::{Category, CategoryMeta, QueryKey, SubcategoryOption};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Read-only access to the toolkit catalog.
///
/// A failed call returns an error and no data; implementations never report
/// partial success.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Raw toolkit rows for the scope of `key`. With a category or
    /// subcategory set, only toolkits filed under it are returned.
    async fn fetch_toolkits(&self, key: &QueryKey) -> Result<Vec<Value>>;

    /// Display names for the scope of `key`. An unscoped key yields empty
    /// metadata without contacting the store.
    async fn fetch_category_meta(&self, key: &QueryKey) -> Result<CategoryMeta>;

    /// All top-level categories, ordered by name.
    async fn fetch_categories(&self) -> Result<Vec<Category>>;

    /// Subcategories of `category` with their toolkit counts.
    async fn fetch_subcategory_options(&self, category: &str) -> Result<Vec<SubcategoryOption>>;
}

/// Shared handle to a store implementation.
pub type DynCatalogStore = Arc<dyn CatalogStore>;
