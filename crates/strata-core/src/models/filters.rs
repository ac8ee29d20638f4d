//! User-selected filter dimensions.

use super::QueryKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A filterable dimension of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDimension {
    Category,
    Subcategory,
    Tech,
    Language,
    Pricing,
    Search,
}

impl FilterDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterDimension::Category => "category",
            FilterDimension::Subcategory => "subcategory",
            FilterDimension::Tech => "tech",
            FilterDimension::Language => "language",
            FilterDimension::Pricing => "pricing",
            FilterDimension::Search => "search",
        }
    }
}

impl fmt::Display for FilterDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied filter, rendered as a removable pill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFilter {
    pub dimension: FilterDimension,
    pub value: String,
}

/// Trimmed, non-blank value or `None`.
pub(crate) fn clean_slug(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn clean_set<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|v| clean_slug(Some(v.as_ref())))
        .collect()
}

fn toggle(set: &mut BTreeSet<String>, value: &str) -> bool {
    let Some(value) = clean_slug(Some(value)) else {
        return false;
    };
    if !set.remove(&value) {
        set.insert(value);
    }
    true
}

/// The complete filter state of one catalog view.
///
/// Multi-select dimensions are OR'd internally and AND'd with every other
/// dimension. A subcategory is only kept while a category is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    category: Option<String>,
    subcategory: Option<String>,
    tech: BTreeSet<String>,
    languages: BTreeSet<String>,
    pricing: BTreeSet<String>,
    search_term: String,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A state scoped to `category` (and optionally `subcategory`).
    pub fn scoped(category: Option<&str>, subcategory: Option<&str>) -> Self {
        let mut state = Self::default();
        state.set_category(category);
        state.set_subcategory(subcategory);
        state
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn subcategory(&self) -> Option<&str> {
        self.subcategory.as_deref()
    }

    pub fn tech(&self) -> &BTreeSet<String> {
        &self.tech
    }

    pub fn languages(&self) -> &BTreeSet<String> {
        &self.languages
    }

    pub fn pricing(&self) -> &BTreeSet<String> {
        &self.pricing
    }

    /// Raw search input, not yet debounced.
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Key of the server-side scope of this state.
    pub fn query_key(&self) -> QueryKey {
        QueryKey::from_filters(self)
    }

    /// Select a category. Changing it drops the subcategory.
    ///
    /// Returns true if the state changed.
    pub fn set_category(&mut self, category: Option<&str>) -> bool {
        let category = clean_slug(category);
        if category == self.category {
            return false;
        }
        self.category = category;
        self.subcategory = None;
        true
    }

    /// Select a subcategory. Ignored while no category is selected.
    pub fn set_subcategory(&mut self, subcategory: Option<&str>) -> bool {
        let subcategory = if self.category.is_some() {
            clean_slug(subcategory)
        } else {
            None
        };
        if subcategory == self.subcategory {
            return false;
        }
        self.subcategory = subcategory;
        true
    }

    pub fn set_tech<I, S>(&mut self, tech: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tech = clean_set(tech);
        let changed = tech != self.tech;
        self.tech = tech;
        changed
    }

    pub fn toggle_tech(&mut self, tech: &str) -> bool {
        toggle(&mut self.tech, tech)
    }

    pub fn set_languages<I, S>(&mut self, languages: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let languages = clean_set(languages);
        let changed = languages != self.languages;
        self.languages = languages;
        changed
    }

    pub fn toggle_language(&mut self, language: &str) -> bool {
        toggle(&mut self.languages, language)
    }

    pub fn set_pricing<I, S>(&mut self, pricing: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pricing = clean_set(pricing);
        let changed = pricing != self.pricing;
        self.pricing = pricing;
        changed
    }

    pub fn toggle_pricing(&mut self, pricing: &str) -> bool {
        toggle(&mut self.pricing, pricing)
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) -> bool {
        let term = term.into();
        if term == self.search_term {
            return false;
        }
        self.search_term = term;
        true
    }

    /// True when no dimension narrows the catalog.
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.subcategory.is_none()
            && self.tech.is_empty()
            && self.languages.is_empty()
            && self.pricing.is_empty()
            && self.search_term.trim().is_empty()
    }

    /// Applied filters in display order.
    pub fn active_filters(&self) -> Vec<ActiveFilter> {
        let mut active = Vec::new();
        let mut push = |dimension, value: &str| {
            active.push(ActiveFilter {
                dimension,
                value: value.to_string(),
            })
        };

        if let Some(category) = &self.category {
            push(FilterDimension::Category, category);
        }
        if let Some(subcategory) = &self.subcategory {
            push(FilterDimension::Subcategory, subcategory);
        }
        for tech in &self.tech {
            push(FilterDimension::Tech, tech);
        }
        for language in &self.languages {
            push(FilterDimension::Language, language);
        }
        for pricing in &self.pricing {
            push(FilterDimension::Pricing, pricing);
        }
        if !self.search_term.trim().is_empty() {
            push(FilterDimension::Search, &self.search_term);
        }
        active
    }

    /// Remove a single applied filter if `value` is the one applied.
    /// Removing the category also removes the subcategory.
    pub fn remove(&mut self, dimension: FilterDimension, value: &str) -> bool {
        match dimension {
            FilterDimension::Category if self.category.as_deref() == Some(value) => {
                self.set_category(None)
            }
            FilterDimension::Subcategory if self.subcategory.as_deref() == Some(value) => {
                self.set_subcategory(None)
            }
            FilterDimension::Tech => self.tech.remove(value),
            FilterDimension::Language => self.languages.remove(value),
            FilterDimension::Pricing => self.pricing.remove(value),
            FilterDimension::Search
                if !value.trim().is_empty() && self.search_term.trim() == value.trim() =>
            {
                self.set_search_term("")
            }
            _ => false,
        }
    }

    /// Clear the in-memory refinements (tech, languages, pricing, search),
    /// keeping the category scope.
    pub fn clear_refinements(&mut self) -> bool {
        let changed = !(self.tech.is_empty()
            && self.languages.is_empty()
            && self.pricing.is_empty()
            && self.search_term.is_empty());
        self.tech.clear();
        self.languages.clear();
        self.pricing.clear();
        self.search_term.clear();
        changed
    }

    // Builder helpers.

    pub fn with_tech<I, S>(mut self, tech: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_tech(tech);
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_languages(languages);
        self
    }

    pub fn with_pricing<I, S>(mut self, pricing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_pricing(pricing);
        self
    }

    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.set_search_term(term);
        self
    }
}
