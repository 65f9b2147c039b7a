//! HTTP-level tests for the registry client and lookup facade, backed by a
//! local mock server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use mockito::{Matcher, Server, ServerGuard};
use tempfile::TempDir;

use icdlookup::catalog::store::NewEntry;
use icdlookup::catalog::{CatalogStore, ClassKind, OfflineIndex};
use icdlookup::client::{RegistryApi, RegistryClient, SearchQuery, TokenManager};
use icdlookup::error::{ApiError, Error};
use icdlookup::lookup::{LookupService, ResultSource};

const TOKEN_BODY: &str =
    r#"{"access_token": "tok-1", "expires_in": 3600, "token_type": "Bearer"}"#;

const SEARCH_BODY: &str = r#"{
    "destinationEntities": [
        {
            "id": "http://id.who.int/icd/entity/332",
            "title": "<em class='found'>Depresión</em> de episodio único",
            "theCode": "6A70",
            "chapter": "06",
            "score": 0.91
        },
        {"title": "entidad sin identificador"}
    ]
}"#;

fn registry_client(server: &ServerGuard) -> RegistryClient {
    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenManager::new(
        http.clone(),
        format!("{}/connect/token", server.url()),
        Some(("client-id".to_string(), "client-secret".to_string())),
        "icdapi_access".to_string(),
    ));
    RegistryClient::new(http, format!("{}/icd", server.url()), tokens)
}

fn dead_registry_client() -> RegistryClient {
    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenManager::new(
        http.clone(),
        "http://127.0.0.1:1/connect/token".to_string(),
        Some(("client-id".to_string(), "client-secret".to_string())),
        "icdapi_access".to_string(),
    ));
    RegistryClient::new(http, "http://127.0.0.1:1/icd".to_string(), tokens)
}

fn seeded_offline_index(rows: &[NewEntry]) -> (OfflineIndex, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut store = CatalogStore::open_at(&dir.path().join("catalog.db")).unwrap();
    store.insert_batch(rows).unwrap();
    (OfflineIndex::new(Arc::new(Mutex::new(store))), dir)
}

fn anxiety_row() -> NewEntry {
    NewEntry {
        code: "6B00".to_string(),
        title: "Trastorno de ansiedad generalizada".to_string(),
        uri: "http://id.who.int/icd/entity/314".to_string(),
        class_kind: ClassKind::Category,
        chapter_code: "06".to_string(),
    }
}

#[tokio::test]
async fn search_sends_credentials_and_strips_markup() {
    let mut server = Server::new_async().await;

    let token_mock = server
        .mock("POST", "/connect/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
            Matcher::UrlEncoded("client_id".into(), "client-id".into()),
            Matcher::UrlEncoded("client_secret".into(), "client-secret".into()),
            Matcher::UrlEncoded("scope".into(), "icdapi_access".into()),
        ]))
        .with_status(200)
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;

    let search_mock = server
        .mock("GET", "/icd/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "depresion".into()),
            Matcher::UrlEncoded("flatResults".into(), "true".into()),
            Matcher::UrlEncoded("offset".into(), "0".into()),
            Matcher::UrlEncoded("limit".into(), "30".into()),
        ]))
        .match_header("authorization", "Bearer tok-1")
        .match_header("api-version", "v2")
        .match_header("accept-language", "es")
        .with_status(200)
        .with_body(SEARCH_BODY)
        .expect(1)
        .create_async()
        .await;

    let client = registry_client(&server);
    let results = client
        .search(&SearchQuery::new("Depresion ", 0, 30, "es"))
        .await
        .unwrap();

    // The id-less entity is skipped, the markup stripped
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].external_id, "http://id.who.int/icd/entity/332");
    assert_eq!(results[0].code.as_deref(), Some("6A70"));
    assert_eq!(results[0].title, "Depresión de episodio único");
    assert_eq!(results[0].score, Some(0.91));

    token_mock.assert_async().await;
    search_mock.assert_async().await;
}

#[tokio::test]
async fn token_is_reused_across_searches() {
    let mut server = Server::new_async().await;

    let token_mock = server
        .mock("POST", "/connect/token")
        .with_status(200)
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;

    let search_mock = server
        .mock("GET", "/icd/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(SEARCH_BODY)
        .expect(2)
        .create_async()
        .await;

    let client = registry_client(&server);
    client
        .search(&SearchQuery::new("depresion", 0, 30, "es"))
        .await
        .unwrap();
    client
        .search(&SearchQuery::new("ansiedad", 0, 30, "es"))
        .await
        .unwrap();

    token_mock.assert_async().await;
    search_mock.assert_async().await;
}

#[tokio::test]
async fn concurrent_credential_requests_coalesce() {
    let mut server = Server::new_async().await;

    let token_mock = server
        .mock("POST", "/connect/token")
        .with_status(200)
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;

    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenManager::new(
        http,
        format!("{}/connect/token", server.url()),
        Some(("client-id".to_string(), "client-secret".to_string())),
        "icdapi_access".to_string(),
    ));

    let calls = (0..8).map(|_| {
        let tokens = tokens.clone();
        async move { tokens.bearer().await }
    });
    let outcomes = join_all(calls).await;

    for outcome in outcomes {
        assert_eq!(outcome.unwrap(), "tok-1");
    }
    token_mock.assert_async().await;
}

#[tokio::test]
async fn unauthorized_search_refreshes_and_retries_once() {
    let mut server = Server::new_async().await;

    // Token endpoint hands out tok-1 first, tok-2 on the forced refresh
    let token_calls = Arc::new(AtomicUsize::new(0));
    let counter = token_calls.clone();
    let token_mock = server
        .mock("POST", "/connect/token")
        .with_status(200)
        .with_body_from_request(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let token = if n == 0 { "tok-1" } else { "tok-2" };
            format!(r#"{{"access_token": "{token}", "expires_in": 3600, "token_type": "Bearer"}}"#)
                .into_bytes()
        })
        .expect(2)
        .create_async()
        .await;

    // The registry rejects the first credential and accepts the second
    let rejected_mock = server
        .mock("GET", "/icd/search")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer tok-1")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let accepted_mock = server
        .mock("GET", "/icd/search")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer tok-2")
        .with_status(200)
        .with_body(SEARCH_BODY)
        .expect(1)
        .create_async()
        .await;

    let client = registry_client(&server);
    let results = client
        .search(&SearchQuery::new("depresion", 0, 30, "es"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    token_mock.assert_async().await;
    rejected_mock.assert_async().await;
    accepted_mock.assert_async().await;
}

#[tokio::test]
async fn second_rejection_surfaces_auth_error_without_third_attempt() {
    let mut server = Server::new_async().await;

    let token_mock = server
        .mock("POST", "/connect/token")
        .with_status(200)
        .with_body(TOKEN_BODY)
        .expect(2)
        .create_async()
        .await;

    // Exactly two attempts: the original and the single retry
    let search_mock = server
        .mock("GET", "/icd/search")
        .match_query(Matcher::Any)
        .with_status(401)
        .expect(2)
        .create_async()
        .await;

    let client = registry_client(&server);
    let err = client
        .search(&SearchQuery::new("depresion", 0, 30, "es"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api(ApiError::Unauthorized)));
    token_mock.assert_async().await;
    search_mock.assert_async().await;
}

#[tokio::test]
async fn short_query_hits_neither_endpoint() {
    let mut server = Server::new_async().await;

    let token_mock = server
        .mock("POST", "/connect/token")
        .expect(0)
        .create_async()
        .await;
    let search_mock = server
        .mock("GET", "/icd/search")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = registry_client(&server);
    let results = client
        .search(&SearchQuery::new("  ab ", 0, 30, "es"))
        .await
        .unwrap();

    assert!(results.is_empty());
    token_mock.assert_async().await;
    search_mock.assert_async().await;
}

#[tokio::test]
async fn facade_serves_cache_after_first_registry_hit() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/connect/token")
        .with_status(200)
        .with_body(TOKEN_BODY)
        .create_async()
        .await;

    let search_mock = server
        .mock("GET", "/icd/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(SEARCH_BODY)
        .expect(1)
        .create_async()
        .await;

    let (offline, _dir) = seeded_offline_index(&[]);
    let lookup = LookupService::new(Arc::new(registry_client(&server)), offline);

    let first = lookup
        .search(SearchQuery::new("Depresion", 0, 30, "es"))
        .await
        .unwrap();
    assert_eq!(first.source, ResultSource::Registry);

    let second = lookup
        .search(SearchQuery::new("  depresion ", 0, 30, "es"))
        .await
        .unwrap();
    assert_eq!(second.source, ResultSource::Cache);
    assert_eq!(*second.results, *first.results);

    search_mock.assert_async().await;
}

#[tokio::test]
async fn facade_degrades_to_offline_catalog_when_registry_is_down() {
    let (offline, _dir) = seeded_offline_index(&[anxiety_row()]);
    let lookup = LookupService::new(Arc::new(dead_registry_client()), offline);

    let outcome = lookup
        .search(SearchQuery::new("ansiedad", 0, 30, "es"))
        .await
        .unwrap();

    assert!(outcome.is_degraded());
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].code.as_deref(), Some("6B00"));
    assert_eq!(
        outcome.results[0].title,
        "Trastorno de ansiedad generalizada"
    );
}

#[tokio::test]
async fn facade_surfaces_network_error_when_offline_catalog_is_empty() {
    let (offline, _dir) = seeded_offline_index(&[]);
    let lookup = LookupService::new(Arc::new(dead_registry_client()), offline);

    let err = lookup
        .search(SearchQuery::new("ansiedad", 0, 30, "es"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api(ApiError::Network(_))));
}

#[tokio::test]
async fn server_error_also_degrades_to_offline() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/connect/token")
        .with_status(200)
        .with_body(TOKEN_BODY)
        .create_async()
        .await;
    server
        .mock("GET", "/icd/search")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let (offline, _dir) = seeded_offline_index(&[anxiety_row()]);
    let lookup = LookupService::new(Arc::new(registry_client(&server)), offline);

    let outcome = lookup
        .search(SearchQuery::new("ansiedad", 0, 30, "es"))
        .await
        .unwrap();
    assert!(outcome.is_degraded());
}
