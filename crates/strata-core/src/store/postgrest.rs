//! PostgREST implementation of [`CatalogStore`].
//!
//! Requests go to `{base}/rest/v1/{table}?select=...` with the project's anon
//! key in both the `apikey` and `Authorization` headers. Scoped toolkit
//! listings embed the subcategory and category with `!inner` so the equality
//! filters on the embedded slugs drop non-matching toolkits server-side.

use super::CatalogStore;
use crate::config::{StoreConfig, StoreSettings};
use crate::error::{Result, StrataError};
use crate::models::{Category, CategoryMeta, QueryKey, SubcategoryOption};
use crate::network::HttpClient;
use crate::normalize::Relation;
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

const TOOLKITS_TABLE: &str = "libraries";
const SUBCATEGORIES_TABLE: &str = "subcategories";
const CATEGORIES_TABLE: &str = "types";

const TOOLKIT_COLUMNS: &str = "id,name,url,pricing,description,image";
const TOOLKIT_LINKS: &str = "library_tags(tag:tag_id(name)),\
                             library_tech(tech:tech_id(name)),\
                             library_languages(language:language_id(name))";

/// Projection for toolkit listings. Never `*`.
fn toolkit_select(scoped: bool) -> String {
    let inner = if scoped { "!inner" } else { "" };
    format!(
        "{TOOLKIT_COLUMNS},subcategories{inner}(id,name,slug,types{inner}(id,name,slug)),{TOOLKIT_LINKS}"
    )
}

#[derive(Debug, Deserialize)]
struct MetaRow {
    name: Option<String>,
    #[serde(default)]
    types: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct SubcategoryRow {
    name: String,
    slug: String,
    #[serde(default)]
    libraries: Vec<CountRow>,
}

impl From<SubcategoryRow> for SubcategoryOption {
    fn from(row: SubcategoryRow) -> Self {
        Self {
            count: row.libraries.first().map(|c| c.count).unwrap_or(0),
            name: row.name,
            slug: row.slug,
        }
    }
}

/// Catalog store backed by a PostgREST (Supabase) REST endpoint.
pub struct PostgrestStore {
    client: HttpClient,
    rest_url: Url,
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("rest_url", &self.rest_url.as_str())
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

impl PostgrestStore {
    /// Create a store from connection settings. The base URL is required.
    pub fn new(settings: &StoreSettings) -> Result<Self> {
        let base = settings
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| StrataError::Config {
                message: format!("Store URL is not set (set {})", StoreConfig::URL_ENV),
            })?;
        let rest_url = Url::parse(&format!(
            "{}{}/",
            base.trim_end_matches('/'),
            StoreConfig::REST_PATH
        ))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = settings.anon_key.as_deref().filter(|k| !k.is_empty()) {
            let invalid = |_| StrataError::Config {
                message: "Store key contains characters not allowed in a header".into(),
            };
            headers.insert("apikey", HeaderValue::from_str(key).map_err(invalid)?);
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(invalid)?,
            );
        }

        let client = HttpClient::with_options(settings.request_timeout, headers)?;
        info!("PostgREST store at {}", rest_url);
        Ok(Self { client, rest_url })
    }

    /// The REST root, e.g. `https://xyz.supabase.co/rest/v1/`.
    pub fn rest_url(&self) -> &Url {
        &self.rest_url
    }

    fn table_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = self.rest_url.join(table)?;
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// URL of the toolkit listing for `key`.
    pub fn toolkits_url(&self, key: &QueryKey) -> Result<Url> {
        let mut params = vec![("select", toolkit_select(key.is_scoped()))];
        if let Some(category) = key.category() {
            params.push(("subcategories.types.slug", format!("eq.{}", category)));
        }
        if let Some(subcategory) = key.subcategory() {
            params.push(("subcategories.slug", format!("eq.{}", subcategory)));
        }
        self.table_url(TOOLKITS_TABLE, &params)
    }

    fn category_meta_url(&self, key: &QueryKey) -> Result<Option<Url>> {
        let url = match (key.category(), key.subcategory()) {
            (None, _) => return Ok(None),
            (Some(category), Some(subcategory)) => self.table_url(
                SUBCATEGORIES_TABLE,
                &[
                    ("select", "name,slug,types!inner(name,slug)".to_string()),
                    ("slug", format!("eq.{}", subcategory)),
                    ("types.slug", format!("eq.{}", category)),
                    ("limit", "1".to_string()),
                ],
            )?,
            (Some(category), None) => self.table_url(
                CATEGORIES_TABLE,
                &[
                    ("select", "name,slug".to_string()),
                    ("slug", format!("eq.{}", category)),
                    ("limit", "1".to_string()),
                ],
            )?,
        };
        Ok(Some(url))
    }
}

#[async_trait]
impl CatalogStore for PostgrestStore {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    async fn fetch_toolkits(&self, key: &QueryKey) -> Result<Vec<Value>> {
        let url = self.toolkits_url(key)?;
        let rows: Vec<Value> = self.client.get_json(&url).await?;
        debug!("Fetched {} toolkit rows for {}", rows.len(), key);
        Ok(rows)
    }

    async fn fetch_category_meta(&self, key: &QueryKey) -> Result<CategoryMeta> {
        let Some(url) = self.category_meta_url(key)? else {
            return Ok(CategoryMeta::default());
        };
        let rows: Vec<MetaRow> = self.client.get_json(&url).await?;
        let Some(row) = rows.into_iter().next() else {
            debug!("No category metadata for {}", key);
            return Ok(CategoryMeta::default());
        };

        let meta = if key.subcategory().is_some() {
            CategoryMeta {
                category_name: Relation::of(row.types.as_ref())
                    .first()
                    .and_then(|t| t.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                subcategory_name: row.name,
            }
        } else {
            CategoryMeta {
                category_name: row.name,
                subcategory_name: None,
            }
        };
        Ok(meta)
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>> {
        let url = self.table_url(
            CATEGORIES_TABLE,
            &[
                ("select", "name,slug".to_string()),
                ("order", "name.asc".to_string()),
            ],
        )?;
        self.client.get_json(&url).await
    }

    async fn fetch_subcategory_options(&self, category: &str) -> Result<Vec<SubcategoryOption>> {
        let url = self.table_url(
            SUBCATEGORIES_TABLE,
            &[
                (
                    "select",
                    "name,slug,libraries:libraries(count),types!inner(slug)".to_string(),
                ),
                ("types.slug", format!("eq.{}", category)),
            ],
        )?;
        let rows: Vec<SubcategoryRow> = self.client.get_json(&url).await?;
        Ok(rows.into_iter().map(SubcategoryOption::from).collect())
    }
}
