//! Cache key for the server-side scope of a catalog view.

use super::filters::clean_slug;
use super::FilterState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The `(category, subcategory)` pair a remote fetch is scoped to.
///
/// Only these two dimensions are sent to the store; everything else is
/// filtered in memory after a cache hit, so states that differ only in tech,
/// languages, pricing or search share one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    category: Option<String>,
    subcategory: Option<String>,
}

impl QueryKey {
    /// Blank slugs count as absent; a subcategory without a category is dropped.
    pub fn new(category: Option<&str>, subcategory: Option<&str>) -> Self {
        let category = clean_slug(category);
        let subcategory = category.as_ref().and(clean_slug(subcategory));
        Self {
            category,
            subcategory,
        }
    }

    /// The unscoped key (whole catalog).
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_filters(filters: &FilterState) -> Self {
        Self::new(filters.category(), filters.subcategory())
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn subcategory(&self) -> Option<&str> {
        self.subcategory.as_deref()
    }

    pub fn is_scoped(&self) -> bool {
        self.category.is_some()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.category, &self.subcategory) {
            (None, _) => f.write_str("*"),
            (Some(category), None) => f.write_str(category),
            (Some(category), Some(subcategory)) => write!(f, "{}/{}", category, subcategory),
        }
    }
}
