//! End-to-end pagination against a local mock backend.
//!
//! The first page is a canned snapshot whose intercepted search call points
//! at a `wiremock` server; every later page goes through `ReplayClient`
//! over real HTTP.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use tablescout_core::{ListingRecord, SiteProfile};
use tablescout_scraper::{
    CancelFlag, DriverConfig, HtmlPageSource, InterceptedResponse, ListingDriver, PageSnapshot,
    ReplayClient, RequestDescriptor, RequestExecutor, ScraperError, SnapshotSource, StopReason,
    Strategy,
};

const UA: &str = "tablescout-test/0.1";

fn test_client() -> ReplayClient {
    ReplayClient::new(5, Some(UA)).expect("failed to build test ReplayClient")
}

fn config(results_wanted: usize) -> DriverConfig {
    DriverConfig {
        results_wanted,
        default_page_size: 50,
        stall_threshold: 2,
        max_scrolls: 3,
        inter_request_delay: Duration::ZERO,
        content_ready_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
        dom_fallback: false,
    }
}

fn driver(results_wanted: usize) -> ListingDriver {
    ListingDriver::new(SiteProfile::default(), config(results_wanted), CancelFlag::new())
}

fn restaurants(range: std::ops::Range<usize>) -> Vec<Value> {
    range
        .map(|i| {
            json!({
                "restaurantId": 1000 + i,
                "restaurantName": format!("Trattoria {i}"),
                "rating": 4.4,
                "reviewCount": 100 + i
            })
        })
        .collect()
}

fn search_response(records: Vec<Value>, total: usize) -> Value {
    json!({"data": {"availability": {
        "totalRestaurantCount": total,
        "restaurants": records
    }}})
}

/// A first page carrying one intercepted search call against `server`:
/// the call asked for 50 results and received 20.
fn first_page(server: &MockServer, total: usize) -> SnapshotSource {
    let request_body = json!({
        "operationName": "RestaurantsAvailability",
        "variables": {
            "term": "chicago",
            "date": "2026-11-02",
            "partySize": 2,
            "offset": 0,
            "limit": 50
        }
    });
    SnapshotSource::new(vec![PageSnapshot {
        url: Some(format!("{}/s?term=chicago", server.uri())),
        responses: vec![InterceptedResponse {
            url: format!("{}/dapi/fe/gql?opname=RestaurantsAvailability", server.uri()),
            method: "POST".to_string(),
            request_body: Some(request_body.to_string()),
            content_type: Some("application/json".to_string()),
            status: 200,
            body: search_response(restaurants(0..20), total).to_string(),
        }],
        ..PageSnapshot::default()
    }])
}

/// Serves at most 20 records from `offset`, whatever limit was asked for.
struct CappedSearch {
    total: usize,
}

impl Respond for CappedSearch {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let offset = body["variables"]["offset"]
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        let end = (offset + 20).min(self.total);
        let start = offset.min(end);
        ResponseTemplate::new(200).set_body_json(search_response(restaurants(start..end), self.total))
    }
}

fn replayed_offsets(requests: &[Request]) -> Vec<u64> {
    requests
        .iter()
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["variables"]["offset"].as_u64().unwrap()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replay_walks_pages_by_observed_server_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dapi/fe/gql"))
        .respond_with(CappedSearch { total: 52 })
        .mount(&server)
        .await;

    let mut source = first_page(&server, 52);
    let client = test_client();
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(100).run(&mut source, &client, &mut sink).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(replayed_offsets(&requests), vec![20, 40]);
    for request in &requests {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["variables"]["limit"], 20);
        assert_eq!(body["variables"]["term"], "chicago");
        assert_eq!(body["operationName"], "RestaurantsAvailability");
    }
    assert_eq!(outcome.strategy, Strategy::Replay);
    assert_eq!(outcome.stop_reason, StopReason::ServerTotalReached);
    assert_eq!(sink.len(), 52);
    assert!(sink.iter().all(|r| r.url.is_some()));
}

#[tokio::test]
async fn replayed_requests_carry_browser_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dapi/fe/gql"))
        .and(header("user-agent", UA))
        .and(header("content-type", "application/json"))
        .and(header("origin", server.uri().as_str()))
        .respond_with(CappedSearch { total: 25 })
        .expect(1)
        .mount(&server)
        .await;

    let mut source = first_page(&server, 25);
    let client = test_client();
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(100).run(&mut source, &client, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::ServerTotalReached);
    assert_eq!(sink.len(), 25);
}

#[tokio::test]
async fn server_error_stops_pagination_without_losing_first_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dapi/fe/gql"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut source = first_page(&server, 300);
    let client = test_client();
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(100).run(&mut source, &client, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::Transport);
    assert_eq!(outcome.pages, 1);
    assert_eq!(sink.len(), 20);
}

#[tokio::test]
async fn slow_backend_is_a_transport_stop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dapi/fe/gql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_response(restaurants(20..40), 300))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut source = first_page(&server, 300);
    let client = ReplayClient::new(1, Some(UA)).unwrap();
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(100).run(&mut source, &client, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::Transport);
    assert_eq!(sink.len(), 20);
}

// ---------------------------------------------------------------------------
// ReplayClient
// ---------------------------------------------------------------------------

#[tokio::test]
async fn execute_maps_non_success_status_to_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let request = RequestDescriptor {
        method: "GET".to_string(),
        url: format!("{}/graphql?operationName=Search", server.uri()),
        body: None,
    };
    let result = test_client().execute(&request).await;

    match result {
        Err(ScraperError::UnexpectedStatus { status, .. }) => assert_eq!(status, 429),
        other => panic!("expected UnexpectedStatus, got: {other:?}"),
    }
}

#[tokio::test]
async fn execute_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = ReplayClient::new(1, Some(UA)).unwrap();
    let request = RequestDescriptor {
        method: "GET".to_string(),
        url: format!("{}/graphql", server.uri()),
        body: None,
    };

    assert!(matches!(
        client.execute(&request).await,
        Err(ScraperError::Timeout { timeout_secs: 1, .. })
    ));
}

// ---------------------------------------------------------------------------
// HtmlPageSource
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_rendered_page_yields_hydrated_listings() {
    let server = MockServer::start().await;
    let state = json!({"search": {"results": [
        {"rid": 7, "name": "Girl & the Goat", "starRating": 4.7, "profileLink": "/r/girl-and-the-goat"},
        {"rid": 8, "name": "Au Cheval", "starRating": 4.5}
    ]}});
    let html = format!(
        "<html><body><h1>Chicago</h1><script id=\"__INITIAL_STATE__\" type=\"application/json\">{state}</script></body></html>"
    );
    Mock::given(method("GET"))
        .and(path("/s"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let client = Arc::new(test_client());
    let profile = SiteProfile::default();
    let mut source = HtmlPageSource::new(
        Arc::clone(&client),
        format!("{}/s?term=chicago", server.uri()),
        profile.hydration_namespaces.clone(),
    );
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(100).run(&mut source, client.as_ref(), &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::NoMoreContent);
    assert_eq!(outcome.strategy, Strategy::Scroll);
    assert_eq!(sink.len(), 2);
    assert_eq!(
        sink[0].url.as_deref(),
        Some("https://www.opentable.com/r/girl-and-the-goat")
    );
}
