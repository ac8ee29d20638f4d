//! Integration tests for the strata-rpc JSON-RPC server.
//!
//! Each test starts a server on a random port over an in-memory store and
//! talks to it over HTTP.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use strata_core::{Catalog, CatalogConfig, InMemoryStore, StoreCall, ToolkitRecord};

fn fixtures() -> Vec<ToolkitRecord> {
    vec![
        ToolkitRecord::new(1, "shadcn/ui", "https://ui.shadcn.com")
            .with_description("Beautifully designed components")
            .with_pricing("free")
            .in_subcategory("design-systems", "components")
            .with_tech(["react", "tailwind"])
            .with_languages(["typescript"]),
        ToolkitRecord::new(2, "Vuetify", "https://vuetifyjs.com")
            .with_pricing("free")
            .in_subcategory("design-systems", "material")
            .with_tech(["vue"]),
        ToolkitRecord::new(3, "Lucide", "https://lucide.dev")
            .with_description("Consistent open-source icons")
            .with_pricing("free")
            .in_subcategory("icons", "outline")
            .with_tech(["react", "vue", "svelte"]),
        ToolkitRecord::new(4, "Tailwind UI", "https://tailwindui.com")
            .with_pricing("paid")
            .in_subcategory("templates", "marketing")
            .with_tech(["react"]),
    ]
}

/// Start a server and return its port with the store behind it.
async fn start() -> (u16, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::from_records(&fixtures()));
    let catalog = Catalog::new(store.clone(), CatalogConfig::default());
    let addr = strata_rpc::start_server(catalog, "127.0.0.1", 0)
        .await
        .expect("Failed to start server");
    (addr.port(), store)
}

/// Start a server whose sessions expire after `idle` without a request.
async fn start_with_session_idle(idle: Duration) -> u16 {
    let store = Arc::new(InMemoryStore::from_records(&fixtures()));
    let catalog = Catalog::new(store, CatalogConfig::default());
    let state = Arc::new(strata_rpc::AppState::with_session_idle(catalog, idle));
    let addr = strata_rpc::serve(state, "127.0.0.1", 0)
        .await
        .expect("Failed to start server");
    addr.port()
}

/// Make an RPC call and return the full JSON-RPC payload.
async fn rpc_call_raw(port: u16, method: &str, params: Value) -> Value {
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/rpc", port))
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .expect("RPC request failed")
        .json::<Value>()
        .await
        .expect("RPC response was not JSON")
}

/// Make an RPC call and return its result, panicking on an RPC error.
async fn rpc_call(port: u16, method: &str, params: Value) -> Value {
    let response = rpc_call_raw(port, method, params).await;
    assert!(response.get("error").is_none(), "{} failed: {}", method, response);
    response["result"].clone()
}

fn names(view: &Value) -> Vec<String> {
    view["data"]
        .as_array()
        .expect("view data")
        .iter()
        .filter_map(|r| r["name"].as_str().map(String::from))
        .collect()
}

#[tokio::test]
async fn test_health() {
    let (port, _) = start().await;

    let health: Value = reqwest::get(format!("http://127.0.0.1:{}/health", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let result = rpc_call(port, "health_check", json!({})).await;
    assert_eq!(result["status"], "ok");
}

#[tokio::test]
async fn test_unknown_method() {
    let (port, _) = start().await;
    let response = rpc_call_raw(port, "drop_tables", json!({})).await;
    assert_eq!(response["error"]["code"], -32601);
    assert_eq!(response["id"], 1);
}

#[tokio::test]
async fn test_list_toolkits() {
    let (port, _) = start().await;

    let view = rpc_call(port, "list_toolkits", json!({})).await;
    assert_eq!(view["total"], 4);

    let view = rpc_call(
        port,
        "list_toolkits",
        json!({"category": "design-systems", "tech": ["react"]}),
    )
    .await;
    assert_eq!(names(&view), vec!["shadcn/ui"]);
    assert_eq!(view["total"], 2);
    assert_eq!(view["facets"]["tech"], json!(["react", "tailwind", "vue"]));
    assert_eq!(view["category_meta"]["category_name"], "design-systems");

    let view = rpc_call(port, "list_toolkits", json!({"search": "ICONS"})).await;
    assert_eq!(names(&view), vec!["Lucide"]);
}

#[tokio::test]
async fn test_taxonomy_methods() {
    let (port, _) = start().await;

    let result = rpc_call(port, "list_categories", json!({})).await;
    let slugs: Vec<&str> = result["categories"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["slug"].as_str())
        .collect();
    assert_eq!(slugs, vec!["design-systems", "icons", "templates"]);

    let result = rpc_call(
        port,
        "list_subcategory_options",
        json!({"category": "design-systems"}),
    )
    .await;
    assert_eq!(result["subcategories"].as_array().unwrap().len(), 2);

    let result = rpc_call(port, "list_subcategory_options", json!({})).await;
    assert!(result["subcategories"].as_array().unwrap().is_empty());

    let result = rpc_call(
        port,
        "get_category_meta",
        json!({"category": "icons", "subcategory": "outline"}),
    )
    .await;
    assert_eq!(result["category_meta"]["category_name"], "icons");
    assert_eq!(result["category_meta"]["subcategory_name"], "outline");
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (port, store) = start().await;

    let opened = rpc_call(
        port,
        "open_session",
        json!({"route": "/library/design-systems?pricing=free", "wait": true}),
    )
    .await;
    let session_id = opened["session_id"].as_str().unwrap().to_string();
    assert_eq!(names(&opened["view"]), vec!["shadcn/ui", "Vuetify"]);
    assert_eq!(opened["route"], "/library/design-systems?pricing=free");

    // Refinements reuse the cached scope.
    let updated = rpc_call(
        port,
        "update_session",
        json!({"session_id": session_id, "tech": "vue"}),
    )
    .await;
    assert_eq!(names(&updated["view"]), vec!["Vuetify"]);
    assert_eq!(updated["view"]["facets"]["pricing"], json!(["free"]));
    assert_eq!(
        updated["view"]["facets"]["subcategories"],
        json!([
            {"slug": "components", "name": "components"},
            {"slug": "material", "name": "material"}
        ])
    );
    assert_eq!(store.calls(StoreCall::Toolkits), 1);

    // Search is debounced: nothing changes until the commit lands.
    let updated = rpc_call(
        port,
        "update_session",
        json!({"session_id": session_id, "tech": null, "search": "beautifully"}),
    )
    .await;
    assert_eq!(updated["pending_search"], true);
    assert_eq!(updated["view"]["search_term"], "");

    let viewed = rpc_call(
        port,
        "session_view",
        json!({"session_id": session_id, "wait_for_change_ms": 5000}),
    )
    .await;
    assert_eq!(viewed["view"]["search_term"], "beautifully");
    assert_eq!(names(&viewed["view"]), vec!["shadcn/ui"]);

    // Removing the search pill clears it at once.
    let updated = rpc_call(
        port,
        "update_session",
        json!({"session_id": session_id, "remove": {"dimension": "search", "value": "beautifully"}}),
    )
    .await;
    assert_eq!(updated["view"]["search_term"], "");

    let closed = rpc_call(port, "close_session", json!({"session_id": session_id})).await;
    assert_eq!(closed["success"], true);

    let response = rpc_call_raw(port, "session_view", json!({"session_id": session_id})).await;
    assert_eq!(response["error"]["code"], -32002);
}

#[tokio::test]
async fn test_idle_session_is_evicted() {
    let port = start_with_session_idle(Duration::from_millis(300)).await;

    let opened = rpc_call(port, "open_session", json!({"route": "/library/icons", "wait": true})).await;
    let session_id = opened["session_id"].as_str().unwrap().to_string();

    let viewed = rpc_call(port, "session_view", json!({"session_id": session_id})).await;
    assert_eq!(names(&viewed["view"]), vec!["Lucide"]);

    tokio::time::sleep(Duration::from_millis(900)).await;

    let response = rpc_call_raw(port, "session_view", json!({"session_id": session_id})).await;
    assert_eq!(response["error"]["code"], -32002);

    let closed = rpc_call(port, "close_session", json!({"session_id": session_id})).await;
    assert_eq!(closed["success"], false);
}

#[tokio::test]
async fn test_submit_commits_search_immediately() {
    let (port, _) = start().await;
    let opened = rpc_call(port, "open_session", json!({"filters": {}, "wait": true})).await;
    let session_id = opened["session_id"].as_str().unwrap();

    let updated = rpc_call(
        port,
        "update_session",
        json!({"sessionId": session_id, "search": "lucide", "submit": true}),
    )
    .await;
    assert_eq!(updated["pending_search"], false);
    assert_eq!(names(&updated["view"]), vec!["Lucide"]);
}

#[tokio::test]
async fn test_refetch_session() {
    let (port, store) = start().await;
    let opened = rpc_call(
        port,
        "open_session",
        json!({"category": "icons", "wait": true}),
    )
    .await;
    let session_id = opened["session_id"].as_str().unwrap();
    assert_eq!(store.calls(StoreCall::Toolkits), 1);
    assert_eq!(store.calls(StoreCall::CategoryMeta), 1);

    rpc_call(
        port,
        "refetch_session",
        json!({"session_id": session_id, "only": "toolkits", "wait": true}),
    )
    .await;
    assert_eq!(store.calls(StoreCall::Toolkits), 2);
    assert_eq!(store.calls(StoreCall::CategoryMeta), 1);

    rpc_call(
        port,
        "refetch_session",
        json!({"session_id": session_id, "wait": true}),
    )
    .await;
    assert_eq!(store.calls(StoreCall::Toolkits), 3);
    assert_eq!(store.calls(StoreCall::CategoryMeta), 2);

    let response = rpc_call_raw(
        port,
        "refetch_session",
        json!({"session_id": session_id, "only": "everything"}),
    )
    .await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_invalid_params() {
    let (port, _) = start().await;

    let response = rpc_call_raw(port, "update_session", json!({})).await;
    assert_eq!(response["error"]["code"], -32602);

    let response = rpc_call_raw(port, "open_session", json!({"route": "/blog/post"})).await;
    assert_eq!(response["error"]["code"], -32005);

    let response = rpc_call_raw(port, "list_toolkits", json!({"tech": 42})).await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_images_and_cache_maintenance() {
    let (port, store) = start().await;

    let result = rpc_call(port, "resolve_image", json!({"path": "https://cdn.example.com/a.png"})).await;
    assert_eq!(result["url"], "https://cdn.example.com/a.png");
    let result = rpc_call(port, "resolve_image", json!({})).await;
    assert_eq!(result["url"], "/images/placeholders/tool-placeholder.png");

    rpc_call(port, "list_toolkits", json!({})).await;
    let stats = rpc_call(port, "cache_stats", json!({})).await;
    let toolkits = stats["caches"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "toolkits")
        .cloned()
        .unwrap();
    assert_eq!(toolkits["entries"], 1);

    let cleared = rpc_call(port, "clear_cache", json!({})).await;
    assert_eq!(cleared["success"], true);

    rpc_call(port, "list_toolkits", json!({})).await;
    assert_eq!(store.calls(StoreCall::Toolkits), 2);
}
