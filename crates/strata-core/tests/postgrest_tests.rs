//! PostgREST store behavior against a mock HTTP server.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{
    Catalog, CatalogConfig, CatalogStore, PostgrestStore, QueryKey, StoreSettings, StrataError,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> StoreSettings {
    StoreSettings {
        url: Some(server.uri()),
        anon_key: Some("anon-key".into()),
        ..StoreSettings::default()
    }
}

fn library_row(id: u64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "url": format!("https://{}.dev", id),
        "pricing": "free",
        "subcategories": {
            "id": 1,
            "name": "Outline",
            "slug": "outline",
            "types": { "id": 1, "name": "Icons", "slug": "icons" }
        },
        "library_tech": [{ "tech": { "name": "react" } }]
    })
}

#[tokio::test]
async fn test_scoped_listing_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/libraries"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .and(query_param("subcategories.types.slug", "eq.icons"))
        .and(query_param("subcategories.slug", "eq.outline"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([library_row(1, "Lucide")])))
        .expect(1)
        .mount(&server)
        .await;

    let store = PostgrestStore::new(&settings(&server)).unwrap();
    let rows = store
        .fetch_toolkits(&QueryKey::new(Some("icons"), Some("outline")))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Lucide");

    let requests = server.received_requests().await.unwrap();
    let select = requests[0]
        .url
        .query_pairs()
        .find(|(name, _)| name == "select")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    assert!(select.contains("subcategories!inner("));
    assert!(select.contains("types!inner("));
    assert!(select.contains("library_languages(language:language_id(name))"));
}

#[tokio::test]
async fn test_error_body_becomes_store_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/libraries"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "42703",
            "message": "column libraries.pricing does not exist",
            "details": null,
            "hint": "Perhaps you meant to reference the column \"libraries.price\"."
        })))
        .mount(&server)
        .await;

    let store = PostgrestStore::new(&settings(&server)).unwrap();
    let err = store.fetch_toolkits(&QueryKey::all()).await.unwrap_err();
    match &err {
        StrataError::Store {
            status,
            message,
            code,
        } => {
            assert_eq!(*status, 400);
            assert!(message.starts_with("column libraries.pricing does not exist"));
            assert!(message.contains("Hint:"));
            assert_eq!(code.as_deref(), Some("42703"));
        }
        other => panic!("expected store error, got {:?}", other),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_category_meta_parsing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/subcategories"))
        .and(query_param("slug", "eq.outline"))
        .and(query_param("types.slug", "eq.icons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "name": "Outline",
            "slug": "outline",
            "types": { "name": "Icons", "slug": "icons" }
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/types"))
        .and(query_param("slug", "eq.missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = PostgrestStore::new(&settings(&server)).unwrap();

    let meta = store
        .fetch_category_meta(&QueryKey::new(Some("icons"), Some("outline")))
        .await
        .unwrap();
    assert_eq!(meta.category_name.as_deref(), Some("Icons"));
    assert_eq!(meta.subcategory_name.as_deref(), Some("Outline"));

    let meta = store
        .fetch_category_meta(&QueryKey::new(Some("missing"), None))
        .await
        .unwrap();
    assert!(meta.category_name.is_none());

    // Unscoped keys never reach the server.
    let meta = store.fetch_category_meta(&QueryKey::all()).await.unwrap();
    assert!(meta.category_name.is_none());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_taxonomy_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/types"))
        .and(query_param("order", "name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Component Libraries", "slug": "component-libraries" },
            { "name": "Icons", "slug": "icons" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/subcategories"))
        .and(query_param("types.slug", "eq.icons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Outline", "slug": "outline", "libraries": [{ "count": 12 }], "types": { "slug": "icons" } },
            { "name": "Solid", "slug": "solid", "libraries": [], "types": { "slug": "icons" } }
        ])))
        .mount(&server)
        .await;

    let store = PostgrestStore::new(&settings(&server)).unwrap();

    let categories = store.fetch_categories().await.unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[1].slug, "icons");

    let options = store.fetch_subcategory_options("icons").await.unwrap();
    assert_eq!(options[0].count, 12);
    assert_eq!(options[1].count, 0);
}

#[tokio::test]
async fn test_catalog_retries_server_errors_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/libraries"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/libraries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            library_row(1, "Lucide"),
            library_row(2, "Heroicons"),
            { "name": "no id" }
        ])))
        .mount(&server)
        .await;

    let mut config = CatalogConfig {
        store: settings(&server),
        ..CatalogConfig::default()
    };
    config.toolkits.retry_base_delay = Duration::from_millis(10);
    let store = Arc::new(PostgrestStore::new(&config.store).unwrap());
    let catalog = Catalog::new(store, config);

    let toolkits = catalog.list_toolkits(&QueryKey::all()).await.unwrap();
    // The id-less row is dropped during normalization.
    let names: Vec<_> = toolkits.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Lucide", "Heroicons"]);
    assert_eq!(toolkits[0].category_slug(), Some("icons"));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
