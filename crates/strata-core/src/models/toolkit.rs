//! Canonical toolkit record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the backing store. Either an integer primary key or
/// an opaque string (UUID, slug).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolkitId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ToolkitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolkitId::Int(id) => write!(f, "{}", id),
            ToolkitId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ToolkitId {
    fn from(id: i64) -> Self {
        ToolkitId::Int(id)
    }
}

impl From<&str> for ToolkitId {
    fn from(id: &str) -> Self {
        ToolkitId::Text(id.to_string())
    }
}

/// Top-level category (a "type" in the store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub id: Option<ToolkitId>,
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// Subcategory a toolkit belongs to, with its parent category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryRef {
    pub id: Option<ToolkitId>,
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TypeRef>,
}

/// One catalog entry after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolkitRecord {
    pub id: ToolkitId,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub pricing: Option<String>,
    /// Absolute URL or storage-relative path, resolved by the presentation layer.
    pub image: Option<String>,
    pub subcategory: Option<SubcategoryRef>,
    pub tech: Vec<String>,
    pub tags: Vec<String>,
    pub languages: Vec<String>,
}

impl ToolkitRecord {
    pub fn new(id: impl Into<ToolkitId>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            description: None,
            pricing: None,
            image: None,
            subcategory: None,
            tech: Vec::new(),
            tags: Vec::new(),
            languages: Vec::new(),
        }
    }

    /// Slug of the category this toolkit is filed under.
    pub fn category_slug(&self) -> Option<&str> {
        self.subcategory
            .as_ref()
            .and_then(|sub| sub.kind.as_ref())
            .and_then(|kind| kind.slug.as_deref())
    }

    pub fn subcategory_slug(&self) -> Option<&str> {
        self.subcategory.as_ref().and_then(|sub| sub.slug.as_deref())
    }

    // Builder helpers, mostly for fixtures.

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_pricing(mut self, pricing: impl Into<String>) -> Self {
        self.pricing = Some(pricing.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// File the toolkit under `category/subcategory` (slugs double as names).
    pub fn in_subcategory(mut self, category: &str, subcategory: &str) -> Self {
        self.subcategory = Some(SubcategoryRef {
            id: None,
            name: Some(subcategory.to_string()),
            slug: Some(subcategory.to_string()),
            kind: Some(TypeRef {
                id: None,
                name: Some(category.to_string()),
                slug: Some(category.to_string()),
            }),
        });
        self
    }

    pub fn with_tech<I, S>(mut self, tech: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tech = tech.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }
}
