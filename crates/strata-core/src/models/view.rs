//! The state a catalog view exposes to the presentation layer.

use super::{ActiveFilter, CategoryMeta, QueryKey, ToolkitRecord};
use crate::error::StrataError;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;

fn error_message<S: Serializer>(
    error: &Option<StrataError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// A subcategory offered as a filter choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetOption {
    pub slug: String,
    pub name: String,
}

/// Values the in-memory filter dimensions can take, collected from the
/// unfiltered toolkit list of the current scope. Each list is sorted and
/// free of blanks and duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub subcategories: Vec<FacetOption>,
    pub tech: Vec<String>,
    pub languages: Vec<String>,
    pub pricing: Vec<String>,
}

/// Everything a renderer needs for one catalog page.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogView {
    pub query_key: QueryKey,
    /// Toolkits passing every active filter, in store order.
    pub data: Arc<Vec<ToolkitRecord>>,
    /// Toolkits cached for the current scope before in-memory filtering.
    pub total: usize,
    /// Filter choices offered for the cached scope, ignoring active filters.
    pub facets: Arc<Facets>,
    pub category_meta: CategoryMeta,
    /// Committed (debounced) search term the list was filtered with.
    pub search_term: String,
    pub active_filters: Vec<ActiveFilter>,
    /// A scoped fetch is running and there is nothing to show yet.
    pub is_loading: bool,
    /// Any fetch for the current scope is running, including background refreshes.
    pub is_fetching: bool,
    pub is_error: bool,
    /// When the toolkit list was last fetched.
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "error_message")]
    pub error: Option<StrataError>,
    #[serde(serialize_with = "error_message")]
    pub toolkits_error: Option<StrataError>,
    #[serde(serialize_with = "error_message")]
    pub meta_error: Option<StrataError>,
}

impl CatalogView {
    /// Filtering left nothing, without any error. Distinct from a failure.
    pub fn is_empty_result(&self) -> bool {
        !self.is_loading && !self.is_error && self.data.is_empty()
    }
}
