//! Stateless catalog queries and cache maintenance.

use super::shared::{filters_from_params, get_str_param};
use crate::server::AppState;
use serde_json::{json, Value};
use strata_core::QueryKey;

pub(super) async fn list_toolkits(state: &AppState, params: &Value) -> strata_core::Result<Value> {
    let filters = filters_from_params(params)?;
    let view = state.catalog.query(&filters).await?;
    Ok(serde_json::to_value(view)?)
}

pub(super) async fn get_category_meta(
    state: &AppState,
    params: &Value,
) -> strata_core::Result<Value> {
    let key = QueryKey::new(
        get_str_param(params, "category", "category"),
        get_str_param(params, "subcategory", "subcategory"),
    );
    let meta = state.catalog.category_meta(&key).await?;
    Ok(json!({
        "query_key": key,
        "category_meta": *meta,
    }))
}

pub(super) async fn list_categories(state: &AppState) -> strata_core::Result<Value> {
    let categories = state.catalog.categories().await?;
    Ok(json!({ "categories": *categories }))
}

pub(super) async fn list_subcategory_options(
    state: &AppState,
    params: &Value,
) -> strata_core::Result<Value> {
    let category = get_str_param(params, "category", "category");
    let options = state.catalog.subcategory_options(category).await?;
    Ok(json!({ "subcategories": *options }))
}

pub(super) fn resolve_image(state: &AppState, params: &Value) -> strata_core::Result<Value> {
    let path = get_str_param(params, "path", "path");
    Ok(json!({ "url": state.catalog.images().resolve(path) }))
}

pub(super) fn cache_stats(state: &AppState) -> strata_core::Result<Value> {
    Ok(json!({ "caches": state.catalog.cache_stats() }))
}

pub(super) fn clear_cache(state: &AppState) -> strata_core::Result<Value> {
    state.catalog.clear_caches();
    Ok(json!({ "success": true }))
}
