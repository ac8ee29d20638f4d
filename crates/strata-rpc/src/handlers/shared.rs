//! Shared handler utilities used across RPC domains.

use serde_json::Value;
use strata_core::{FilterState, StrataError};

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> strata_core::Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| StrataError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })
}

/// Extract an optional bool parameter, supporting both snake_case and camelCase.
pub(crate) fn get_bool_param(params: &Value, snake: &str, camel: &str) -> Option<bool> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_bool())
}

/// Extract an optional u64 parameter, supporting both snake_case and camelCase.
pub(crate) fn get_u64_param(params: &Value, snake: &str, camel: &str) -> Option<u64> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_u64())
}

/// A list parameter given as an array of strings or a comma-separated string.
///
/// `None` when absent; an explicit `null` is an empty list.
pub(crate) fn get_list_param(params: &Value, name: &str) -> strata_core::Result<Option<Vec<String>>> {
    match params.get(name) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(Vec::new())),
        Some(Value::String(s)) => Ok(Some(
            s.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect(),
        )),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| StrataError::InvalidParams {
                    message: format!("{} must contain only strings", name),
                })
            })
            .collect::<strata_core::Result<Vec<_>>>()
            .map(Some),
        Some(_) => Err(StrataError::InvalidParams {
            message: format!("{} must be a string or an array of strings", name),
        }),
    }
}

/// A nullable scope parameter: absent is `None`, `null` clears.
pub(crate) fn get_scope_param(params: &Value, name: &str) -> strata_core::Result<Option<Option<String>>> {
    match params.get(name) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(_) => Err(StrataError::InvalidParams {
            message: format!("{} must be a string or null", name),
        }),
    }
}

/// Build a filter state from flat parameters.
pub(crate) fn filters_from_params(params: &Value) -> strata_core::Result<FilterState> {
    let category = get_str_param(params, "category", "category");
    let subcategory = get_str_param(params, "subcategory", "subcategory");
    let mut filters = FilterState::scoped(category, subcategory);
    if let Some(tech) = get_list_param(params, "tech")? {
        filters.set_tech(tech);
    }
    if let Some(languages) = get_list_param(params, "languages")? {
        filters.set_languages(languages);
    }
    if let Some(pricing) = get_list_param(params, "pricing")? {
        filters.set_pricing(pricing);
    }
    if let Some(search) = get_str_param(params, "search", "search") {
        filters.set_search_term(search);
    }
    Ok(filters)
}
