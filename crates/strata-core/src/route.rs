//! Catalog URLs.
//!
//! A catalog page lives at `/library/{category}/{subcategory}` with the
//! in-memory refinements in the query string:
//! `?tech=react,vue&languages=typescript&pricing=free&q=date+picker`.
//! `subcategory` and `type` are also accepted as query parameters when the
//! path does not carry them. Unknown parameters are ignored.

use crate::error::{Result, StrataError};
use crate::models::FilterState;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use url::Url;

/// First path segment of every catalog page.
pub const LIBRARY_SEGMENT: &str = "library";

/// Filter state carried by a catalog URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogRoute {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub tech: Vec<String>,
    pub languages: Vec<String>,
    pub pricing: Vec<String>,
    pub search: Option<String>,
}

fn push_values(target: &mut Vec<String>, value: &str) {
    for item in value.split(',').map(str::trim).filter(|v| !v.is_empty()) {
        if !target.iter().any(|existing| existing == item) {
            target.push(item.to_string());
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl CatalogRoute {
    /// Parse an absolute URL or a path with optional query string.
    pub fn parse(input: &str) -> Result<Self> {
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost/")?.join(input)?
            }
            Err(e) => return Err(e.into()),
        };

        let segments: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        urlencoding::decode(s)
                            .map(|decoded| decoded.into_owned())
                            .unwrap_or_else(|_| s.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut route = Self::default();
        match segments.split_first() {
            None => {}
            Some((first, rest)) if first == LIBRARY_SEGMENT => {
                // `/library/2` is a listing page, not a category.
                let mut rest = rest.iter().filter(|s| !s.chars().all(|c| c.is_ascii_digit()));
                route.category = rest.next().and_then(|s| non_blank(s));
                route.subcategory = rest.next().and_then(|s| non_blank(s));
            }
            Some(_) => {
                return Err(StrataError::Validation {
                    field: "route".into(),
                    message: format!("{} is not a catalog path", url.path()),
                })
            }
        }

        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "type" if route.category.is_none() => route.category = non_blank(&value),
                "subcategory" if route.subcategory.is_none() => {
                    route.subcategory = non_blank(&value)
                }
                "tech" => push_values(&mut route.tech, &value),
                "languages" | "language" => push_values(&mut route.languages, &value),
                "pricing" => push_values(&mut route.pricing, &value),
                "q" | "search" => route.search = non_blank(&value),
                _ => {}
            }
        }
        if route.category.is_none() {
            route.subcategory = None;
        }
        Ok(route)
    }

    /// The route for a filter state, with the committed search term.
    pub fn from_filters(filters: &FilterState, search: &str) -> Self {
        Self {
            category: filters.category().map(str::to_string),
            subcategory: filters.subcategory().map(str::to_string),
            tech: filters.tech().iter().cloned().collect(),
            languages: filters.languages().iter().cloned().collect(),
            pricing: filters.pricing().iter().cloned().collect(),
            search: non_blank(search),
        }
    }

    pub fn filters(&self) -> FilterState {
        FilterState::scoped(self.category.as_deref(), self.subcategory.as_deref())
            .with_tech(&self.tech)
            .with_languages(&self.languages)
            .with_pricing(&self.pricing)
            .with_search_term(self.search.clone().unwrap_or_default())
    }

    /// Path and query string, e.g. `/library/icons?tech=react`.
    pub fn to_path(&self) -> String {
        let mut path = format!("/{}", LIBRARY_SEGMENT);
        if let Some(category) = &self.category {
            path.push('/');
            path.push_str(&urlencoding::encode(category));
            if let Some(subcategory) = &self.subcategory {
                path.push('/');
                path.push_str(&urlencoding::encode(subcategory));
            }
        }

        let mut query = form_urlencoded::Serializer::new(String::new());
        for (name, values) in [
            ("tech", &self.tech),
            ("languages", &self.languages),
            ("pricing", &self.pricing),
        ] {
            if !values.is_empty() {
                query.append_pair(name, &values.join(","));
            }
        }
        if let Some(search) = &self.search {
            query.append_pair("q", search);
        }
        let query = query.finish();
        if !query.is_empty() {
            path.push('?');
            path.push_str(&query);
        }
        path
    }
}
