use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::*;
use crate::error::ScraperError;
use crate::source::SnapshotSource;
use crate::types::{InterceptedResponse, ReplayResponse, RequestDescriptor};

const GQL_URL: &str = "https://www.opentable.com/dapi/fe/gql?optype=query&opname=RestaurantsAvailability";

type Handler = dyn Fn(&RequestDescriptor) -> Result<ReplayResponse, ScraperError> + Send + Sync;

/// Executor answering from a closure and recording every request.
struct FakeExecutor {
    handler: Box<Handler>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl FakeExecutor {
    fn new(
        handler: impl Fn(&RequestDescriptor) -> Result<ReplayResponse, ScraperError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn offsets(&self) -> Vec<u64> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| request_variables(r)["offset"].as_u64().unwrap())
            .collect()
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl RequestExecutor for FakeExecutor {
    async fn execute(&self, request: &RequestDescriptor) -> Result<ReplayResponse, ScraperError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

fn request_variables(request: &RequestDescriptor) -> Value {
    let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    body["variables"].clone()
}

fn restaurants(range: std::ops::Range<usize>) -> Vec<Value> {
    range
        .map(|i| {
            json!({
                "restaurantId": i,
                "restaurantName": format!("Place {i}"),
                "rating": 4.5
            })
        })
        .collect()
}

fn response_body(records: Vec<Value>, total: Option<usize>) -> String {
    let mut availability = json!({ "restaurants": records });
    if let Some(total) = total {
        availability["totalRestaurantCount"] = json!(total);
    }
    json!({ "data": { "availability": availability } }).to_string()
}

fn ok(body: String) -> Result<ReplayResponse, ScraperError> {
    Ok(ReplayResponse { status: 200, body })
}

/// First page whose intercepted search call asked for 50 but got 20.
fn first_page(variables: Value, total: Option<usize>) -> SnapshotSource {
    let request_body = json!({
        "operationName": "RestaurantsAvailability",
        "variables": variables,
        "extensions": {"persistedQuery": {"sha256Hash": "abc"}}
    });
    let snapshot = PageSnapshot {
        url: Some("https://www.opentable.com/s?term=chicago".to_string()),
        responses: vec![InterceptedResponse {
            url: GQL_URL.to_string(),
            method: "POST".to_string(),
            request_body: Some(request_body.to_string()),
            content_type: Some("application/json".to_string()),
            status: 200,
            body: response_body(restaurants(0..20), total),
        }],
        ..PageSnapshot::default()
    };
    SnapshotSource::new(vec![snapshot])
}

fn paged_variables() -> Value {
    json!({"term": "chicago", "date": "2026-11-02", "partySize": 2, "offset": 0, "limit": 50})
}

fn config(results_wanted: usize) -> DriverConfig {
    DriverConfig {
        results_wanted,
        default_page_size: 50,
        stall_threshold: 2,
        max_scrolls: 5,
        inter_request_delay: Duration::ZERO,
        content_ready_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
        dom_fallback: false,
    }
}

fn driver(config: DriverConfig) -> ListingDriver {
    ListingDriver::new(SiteProfile::default(), config, CancelFlag::new())
}

/// Serves `offset..offset+20` of `total` records, ignoring the requested
/// limit.
fn capped_server(total: usize) -> FakeExecutor {
    FakeExecutor::new(move |request| {
        let offset = usize::try_from(request_variables(request)["offset"].as_u64().unwrap()).unwrap();
        let end = (offset + 20).min(total);
        ok(response_body(restaurants(offset.min(end)..end), Some(total)))
    })
}

#[tokio::test]
async fn replay_follows_server_page_size_not_requested_limit() {
    let mut source = first_page(paged_variables(), Some(45));
    let executor = capped_server(45);
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(100)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(executor.offsets(), vec![20, 40]);
    assert_eq!(outcome.strategy, Strategy::Replay);
    assert_eq!(outcome.stop_reason, StopReason::ServerTotalReached);
    assert_eq!(outcome.emitted, 45);
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.server_total, Some(45));
    assert_eq!(sink.len(), 45);
}

#[tokio::test]
async fn stops_after_repeated_pages_with_nothing_new() {
    let mut source = first_page(paged_variables(), None);
    let executor = FakeExecutor::new(|_| ok(response_body(restaurants(0..20), None)));
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(100)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::Stalled);
    assert_eq!(executor.calls(), 2);
    assert_eq!(outcome.emitted, 20);
    assert_eq!(sink.len(), 20);
}

#[tokio::test]
async fn short_page_ends_replay() {
    let mut source = first_page(paged_variables(), None);
    let executor = FakeExecutor::new(|request| {
        let offset = usize::try_from(request_variables(request)["offset"].as_u64().unwrap()).unwrap();
        let len = if offset >= 40 { 7 } else { 20 };
        ok(response_body(restaurants(offset..offset + len), None))
    });
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(100)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::ShortPage);
    assert_eq!(outcome.emitted, 47);
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn non_listing_element_does_not_shorten_a_full_page() {
    let mut source = first_page(paged_variables(), Some(100));
    let executor = FakeExecutor::new(|request| {
        let offset = usize::try_from(request_variables(request)["offset"].as_u64().unwrap()).unwrap();
        let end = (offset + 20).min(100);
        let mut page = restaurants(offset.min(end)..end);
        if offset == 20 {
            page.pop();
            page.push(json!({"type": "promo"}));
        }
        ok(response_body(page, Some(100)))
    });
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(200)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(executor.offsets(), vec![20, 40, 60, 80, 100]);
    assert_eq!(outcome.emitted, 99);
    assert_eq!(outcome.stop_reason, StopReason::ShortPage);
}

#[tokio::test]
async fn replay_stops_at_page_ceiling() {
    let mut source = first_page(paged_variables(), None);
    let executor = FakeExecutor::new(|_| ok(response_body(restaurants(0..20), None)));
    let mut sink: Vec<ListingRecord> = Vec::new();
    let config = DriverConfig {
        stall_threshold: 1000,
        ..config(30)
    };
    let ceiling = config.page_ceiling();

    let outcome = driver(config).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::PageCeiling);
    assert_eq!(ceiling, 61);
    assert_eq!(executor.calls(), 61);
    assert_eq!(outcome.pages, 62);
    assert_eq!(sink.len(), 20);
}

#[tokio::test]
async fn results_wanted_caps_emission_mid_page() {
    let mut source = first_page(paged_variables(), Some(45));
    let executor = capped_server(45);
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(25)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::ResultsReached);
    assert_eq!(sink.len(), 25);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn first_page_alone_can_satisfy_the_query() {
    let mut source = first_page(paged_variables(), Some(45));
    let executor = capped_server(45);
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(10)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::ResultsReached);
    assert_eq!(outcome.strategy, Strategy::FirstPageOnly);
    assert_eq!(outcome.pages, 1);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn template_without_position_field_keeps_first_page() {
    let mut source = first_page(json!({"term": "chicago", "date": "2026-11-02"}), Some(45));
    let executor = capped_server(45);
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(100)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::NoPaginationField);
    assert_eq!(executor.calls(), 0);
    assert_eq!(sink.len(), 20);
}

#[tokio::test]
async fn transport_failure_keeps_emitted_records() {
    let mut source = first_page(paged_variables(), Some(45));
    let executor = FakeExecutor::new(|_| {
        Ok(ReplayResponse {
            status: 503,
            body: String::new(),
        })
    });
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(100)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::Transport);
    assert_eq!(outcome.emitted, 20);
    assert_eq!(sink.len(), 20);
}

#[tokio::test]
async fn malformed_replay_body_is_a_transport_stop() {
    let mut source = first_page(paged_variables(), Some(45));
    let executor = FakeExecutor::new(|_| ok("<html>oops</html>".to_string()));
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(100)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::Transport);
    assert_eq!(sink.len(), 20);
}

#[tokio::test]
async fn cancellation_is_checked_between_pages() {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    let mut source = first_page(paged_variables(), Some(200));
    let executor = FakeExecutor::new(move |request| {
        flag.cancel();
        let offset = usize::try_from(request_variables(request)["offset"].as_u64().unwrap()).unwrap();
        ok(response_body(restaurants(offset..offset + 20), Some(200)))
    });
    let driver = ListingDriver::new(SiteProfile::default(), config(100), cancel);
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver.run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(executor.calls(), 1);
    assert_eq!(sink.len(), 40);
}

#[tokio::test]
async fn cancelled_before_start_emits_nothing() {
    let cancel = CancelFlag::new();
    cancel.cancel();
    let driver = ListingDriver::new(SiteProfile::default(), config(100), cancel);
    let mut source = first_page(paged_variables(), Some(45));
    let executor = capped_server(45);
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver.run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(outcome.pages, 0);
    assert!(sink.is_empty());
}

fn state_page(names: &[&str]) -> PageSnapshot {
    let results: Vec<Value> = names
        .iter()
        .map(|name| json!({"name": name, "rating": 4.2}))
        .collect();
    serde_json::from_value(json!({
        "state": {"__INITIAL_STATE__": {"search": {"results": results}}}
    }))
    .unwrap()
}

#[tokio::test]
async fn scrolls_when_no_template_was_captured() {
    let mut source = SnapshotSource::new(vec![
        state_page(&["Alinea", "Oriole"]),
        state_page(&["Alinea", "Oriole", "Smyth"]),
        state_page(&["Alinea", "Oriole", "Smyth"]),
    ]);
    let executor = capped_server(0);
    let mut sink: Vec<ListingRecord> = Vec::new();

    let outcome = driver(config(100)).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.strategy, Strategy::Scroll);
    assert_eq!(outcome.stop_reason, StopReason::NoMoreContent);
    assert_eq!(outcome.emitted, 3);
    assert_eq!(outcome.pages, 3);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn scroll_attempts_are_bounded() {
    let mut source = SnapshotSource::new(vec![
        state_page(&["Alinea"]),
        state_page(&["Alinea", "Oriole"]),
        state_page(&["Alinea", "Oriole", "Smyth"]),
    ]);
    let executor = capped_server(0);
    let mut sink: Vec<ListingRecord> = Vec::new();
    let config = DriverConfig {
        max_scrolls: 1,
        ..config(100)
    };

    let outcome = driver(config).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::ScrollLimit);
    assert_eq!(outcome.emitted, 2);
}

#[tokio::test]
async fn empty_page_without_template_or_scrolling_finishes_cleanly() {
    let mut source = SnapshotSource::new(vec![PageSnapshot::default()]);
    let executor = capped_server(0);
    let mut sink: Vec<ListingRecord> = Vec::new();
    let config = DriverConfig {
        max_scrolls: 0,
        ..config(100)
    };

    let outcome = driver(config).run(&mut source, &executor, &mut sink).await;

    assert_eq!(outcome.stop_reason, StopReason::NoMoreContent);
    assert_eq!(outcome.emitted, 0);
}

#[test]
fn page_ceiling_scales_with_results_wanted_and_is_capped() {
    assert_eq!(config(10).page_ceiling(), 21);
    assert_eq!(config(500).page_ceiling(), MAX_REPLAY_PAGES);
}

#[test]
fn config_from_app_config_clamps_zero_values() {
    let app = AppConfig {
        env: tablescout_core::Environment::Test,
        log_level: "info".to_string(),
        site_profile_path: None,
        request_timeout_secs: 30,
        content_ready_timeout_secs: 20,
        user_agent: None,
        inter_request_delay_ms: 250,
        default_page_size: 0,
        stall_threshold: 0,
        max_scrolls: 3,
        dom_fallback_enabled: false,
        max_concurrent_queries: 2,
    };
    let config = DriverConfig::from_app_config(&app, 0);
    assert_eq!(config.results_wanted, 1);
    assert_eq!(config.default_page_size, 1);
    assert_eq!(config.stall_threshold, 1);
    assert_eq!(config.inter_request_delay, Duration::from_millis(250));
}
