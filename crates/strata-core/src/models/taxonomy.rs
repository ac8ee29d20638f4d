//! Category metadata used for breadcrumbs and filter menus.

use serde::{Deserialize, Serialize};

/// Display names for the active category and subcategory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMeta {
    pub category_name: Option<String>,
    pub subcategory_name: Option<String>,
}

impl CategoryMeta {
    pub fn is_empty(&self) -> bool {
        self.category_name.is_none() && self.subcategory_name.is_none()
    }
}

/// A top-level category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub slug: String,
}

/// A subcategory offered in the filter menu, with its toolkit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryOption {
    pub name: String,
    pub slug: String,
    pub count: u64,
}
