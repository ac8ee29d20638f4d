//! Catalog sessions: one per open view, addressed by id.
//!
//! A session keeps its scope's caches mounted and its search debounced, so
//! consecutive `update_session` calls behave like keystrokes in one view.

use super::shared::{
    filters_from_params, get_bool_param, get_list_param, get_scope_param, get_str_param,
    get_u64_param, require_str_param,
};
use crate::server::{AppState, SharedSession};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use strata_core::{
    CatalogRoute, CatalogSession, CatalogView, FilterDimension, StrataError,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Upper bound for `wait_for_change_ms`.
const MAX_CHANGE_WAIT: Duration = Duration::from_secs(30);

fn lookup(state: &AppState, params: &Value) -> strata_core::Result<(String, SharedSession)> {
    let session_id = require_str_param(params, "session_id", "sessionId")?;
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| StrataError::SessionNotFound {
            session_id: session_id.clone(),
        })?;
    Ok((session_id, session))
}

fn payload(session_id: &str, session: &CatalogSession, view: CatalogView) -> strata_core::Result<Value> {
    Ok(json!({
        "session_id": session_id,
        "route": session.route().to_path(),
        "pending_search": session.search().is_pending(),
        "view": serde_json::to_value(view)?,
    }))
}

/// The `wait` / `wait_for_change_ms` read options shared by session methods.
///
/// `wait_for_change_ms` long-polls for anything newer than the view this
/// session last returned.
async fn read_view(session: &mut CatalogSession, params: &Value) -> CatalogView {
    if let Some(ms) = get_u64_param(params, "wait_for_change_ms", "waitForChangeMs") {
        let limit = Duration::from_millis(ms).min(MAX_CHANGE_WAIT);
        if tokio::time::timeout(limit, session.changed()).await.is_err() {
            debug!("No session change within {:?}", limit);
        }
    }
    if get_bool_param(params, "wait", "wait").unwrap_or(false) {
        session.load().await;
    }
    session.mark_seen();
    session.view()
}

pub(super) async fn open_session(state: &AppState, params: &Value) -> strata_core::Result<Value> {
    let mut session = match get_str_param(params, "route", "route") {
        Some(route) => CatalogSession::from_route(&state.catalog, &CatalogRoute::parse(route)?),
        None => {
            let filters = match params.get("filters") {
                Some(filters) => filters_from_params(filters)?,
                None => filters_from_params(params)?,
            };
            state.catalog.session(filters)
        }
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    info!("Opened session {} on {}", session_id, session.query_key());

    let view = read_view(&mut session, params).await;
    let result = payload(&session_id, &session, view)?;
    state
        .sessions
        .insert(session_id, Arc::new(Mutex::new(session)));
    Ok(result)
}

/// Apply the fields present in `params`. Scope first, so a new category
/// drops the old subcategory before a new one is set.
fn apply_update(session: &mut CatalogSession, params: &Value) -> strata_core::Result<()> {
    if let Some(route) = get_str_param(params, "route", "route") {
        session.navigate(&CatalogRoute::parse(route)?);
    }
    if let Some(category) = get_scope_param(params, "category")? {
        session.set_category(category.as_deref());
    }
    if let Some(subcategory) = get_scope_param(params, "subcategory")? {
        session.set_subcategory(subcategory.as_deref());
    }
    if let Some(tech) = get_list_param(params, "tech")? {
        session.set_tech(tech);
    }
    if let Some(languages) = get_list_param(params, "languages")? {
        session.set_languages(languages);
    }
    if let Some(pricing) = get_list_param(params, "pricing")? {
        session.set_pricing(pricing);
    }
    if let Some(remove) = params.get("remove") {
        let dimension: FilterDimension = serde_json::from_value(
            remove.get("dimension").cloned().unwrap_or(Value::Null),
        )
        .map_err(|e| StrataError::InvalidParams {
            message: format!("remove.dimension: {}", e),
        })?;
        let value = remove.get("value").and_then(Value::as_str).unwrap_or_default();
        session.remove_filter(dimension, value);
    }
    if get_bool_param(params, "clear_refinements", "clearRefinements").unwrap_or(false) {
        session.clear_refinements();
    }
    if let Some(search) = get_str_param(params, "search", "search") {
        session.set_search(search);
    }
    if get_bool_param(params, "submit", "submit").unwrap_or(false) {
        session.flush_search();
    }
    Ok(())
}

pub(super) async fn update_session(state: &AppState, params: &Value) -> strata_core::Result<Value> {
    let (session_id, session) = lookup(state, params)?;
    let mut session = session.lock().await;
    apply_update(&mut session, params)?;
    let view = read_view(&mut session, params).await;
    payload(&session_id, &session, view)
}

pub(super) async fn session_view(state: &AppState, params: &Value) -> strata_core::Result<Value> {
    let (session_id, session) = lookup(state, params)?;
    let mut session = session.lock().await;
    let view = read_view(&mut session, params).await;
    payload(&session_id, &session, view)
}

/// Force both queries of the session's scope. `only` narrows it to
/// `"toolkits"` or `"meta"`.
pub(super) async fn refetch_session(state: &AppState, params: &Value) -> strata_core::Result<Value> {
    let (session_id, session) = lookup(state, params)?;
    let mut session = session.lock().await;
    match get_str_param(params, "only", "only") {
        None => session.refetch_all(),
        Some("toolkits") => session.refetch_toolkits(),
        Some("meta") => session.refetch_meta(),
        Some(other) => {
            return Err(StrataError::InvalidParams {
                message: format!("Unknown refetch target: {}", other),
            })
        }
    }
    let view = read_view(&mut session, params).await;
    payload(&session_id, &session, view)
}

pub(super) async fn close_session(state: &AppState, params: &Value) -> strata_core::Result<Value> {
    let session_id = require_str_param(params, "session_id", "sessionId")?;
    let removed = state.sessions.contains_key(&session_id);
    state.sessions.invalidate(&session_id);
    if removed {
        info!("Closed session {}", session_id);
    }
    Ok(json!({ "success": removed }))
}
