//! API template capture and scoring.
//!
//! A template is the structural description of one observed RPC-style
//! call: its base URL, query parameters and decoded body split into
//! `variables` / `operationName` / `extensions`. GET calls that carry the
//! variables as a JSON query parameter are supported too.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use serde_json::Value;

/// Named template-scoring weights.
pub mod weights {
    /// Per listing extracted from the captured response.
    pub const EXTRACTED_RECORD: i64 = 2;
    /// Per detail item found in the captured response.
    pub const DETAIL_ITEM: i64 = 1;
    pub const SEARCH_OPERATION: i64 = 60;
    pub const DECOY_OPERATION: i64 = -80;
    pub const POST_METHOD: i64 = 5;
    pub const LOCATION_VARIABLE: i64 = 10;
    pub const DATE_OR_PARTY_VARIABLE: i64 = 5;
}

/// Variable names that carry the search location.
const LOCATION_KEYS: &[&str] = &[
    "term",
    "location",
    "latitude",
    "longitude",
    "metroId",
    "regionId",
];

/// Variable names that carry the requested date or party size.
const DATE_OR_PARTY_KEYS: &[&str] = &["date", "dateTime", "time", "covers", "partySize"];

/// Query parameters that name the operation on GET-style RPC calls.
const OPERATION_NAME_PARAMS: &[&str] = &["operationName", "opname"];

static SEARCH_OPERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)search|availability|results").expect("valid search-operation regex")
});

static DECOY_OPERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)home|module|recommend").expect("valid decoy-operation regex")
});

/// Bound on how deep variable trees are searched.
const MAX_VARIABLE_DEPTH: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiTemplate {
    /// Scheme, host, port and path; no query string.
    pub base_url: String,
    pub method: String,
    pub query_params: BTreeMap<String, String>,
    pub variables: Option<Value>,
    pub extensions: Option<Value>,
    pub operation_name: Option<String>,
    /// Full decoded JSON body, if the call had one.
    pub body: Option<Value>,
    /// `true` when `variables` came from (and must be written back to) the
    /// `variables` query parameter.
    pub variables_in_query: bool,
}

impl ApiTemplate {
    /// Identifies the call shape; one template is captured per shape.
    #[must_use]
    pub fn shape_key(&self) -> String {
        format!(
            "{} {} {}",
            self.method,
            self.base_url,
            self.operation_name.as_deref().unwrap_or("")
        )
    }
}

/// Provenance tag for a backend call: its URL path plus operation name.
///
/// The query string is left out; it can carry the user's search term.
#[must_use]
pub fn call_source_tag(url: &str, request_body: Option<&str>) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.split(['?', '#']).next().unwrap_or(url).to_string();
    };
    let operation = request_body
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|body| {
            let op = match body {
                Value::Array(items) => items.into_iter().next()?,
                other => other,
            };
            op.get("operationName")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .or_else(|| {
            parsed
                .query_pairs()
                .find(|(k, _)| OPERATION_NAME_PARAMS.iter().any(|p| k == p))
                .map(|(_, v)| v.into_owned())
        });
    match operation {
        Some(op) => format!("{}#{op}", parsed.path()),
        None => parsed.path().to_string(),
    }
}

/// Parse an observed call into a template.
///
/// Returns `None` when the URL path matches none of `rpc_markers`, the URL
/// does not parse, or the request body is present but is not JSON.
#[must_use]
pub fn capture_template(
    url: &str,
    method: &str,
    request_body: Option<&str>,
    rpc_markers: &[String],
) -> Option<ApiTemplate> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path();
    if !rpc_markers.iter().any(|marker| path.contains(marker.as_str())) {
        return None;
    }

    let mut base = parsed.clone();
    base.set_query(None);
    base.set_fragment(None);

    let query_params: BTreeMap<String, String> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let body = match request_body.map(str::trim).filter(|b| !b.is_empty()) {
        Some(raw) => {
            let Ok(decoded) = serde_json::from_str::<Value>(raw) else {
                tracing::debug!(url, "rpc call body is not JSON; not capturing");
                return None;
            };
            Some(decoded)
        }
        None => None,
    };
    // Batched calls carry an array of operations; the first one is used.
    let operation = body.as_ref().and_then(|b| match b {
        Value::Array(items) => items.first().filter(|v| v.is_object()),
        Value::Object(_) => Some(b),
        _ => None,
    });

    let mut variables = operation.and_then(|op| op.get("variables")).cloned();
    let mut extensions = operation.and_then(|op| op.get("extensions")).cloned();
    let mut variables_in_query = false;
    if variables.is_none() {
        variables = query_params
            .get("variables")
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .filter(Value::is_object);
        variables_in_query = variables.is_some();
    }
    if extensions.is_none() {
        extensions = query_params
            .get("extensions")
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok());
    }

    let operation_name = operation
        .and_then(|op| op.get("operationName"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            OPERATION_NAME_PARAMS
                .iter()
                .find_map(|param| query_params.get(*param).cloned())
        });

    Some(ApiTemplate {
        base_url: base.to_string(),
        method: method.to_ascii_uppercase(),
        query_params,
        variables,
        extensions,
        operation_name,
        body,
        variables_in_query,
    })
}

/// How likely `template` is to be the listings endpoint.
#[must_use]
pub fn score_template(template: &ApiTemplate, extracted_count: usize, detail_count: usize) -> i64 {
    let as_points = |n: usize| i64::try_from(n).unwrap_or(i64::MAX / 4);

    let mut score = as_points(extracted_count) * weights::EXTRACTED_RECORD
        + as_points(detail_count) * weights::DETAIL_ITEM;

    if let Some(name) = template.operation_name.as_deref() {
        if SEARCH_OPERATION.is_match(name) {
            score += weights::SEARCH_OPERATION;
        }
        if DECOY_OPERATION.is_match(name) {
            score += weights::DECOY_OPERATION;
        }
    }
    if template.method == "POST" {
        score += weights::POST_METHOD;
    }
    if let Some(vars) = &template.variables {
        if has_any_key(vars, LOCATION_KEYS, 0) {
            score += weights::LOCATION_VARIABLE;
        }
        if has_any_key(vars, DATE_OR_PARTY_KEYS, 0) {
            score += weights::DATE_OR_PARTY_VARIABLE;
        }
    }
    score
}

fn has_any_key(value: &Value, keys: &[&str], depth: usize) -> bool {
    if depth > MAX_VARIABLE_DEPTH {
        return false;
    }
    match value {
        Value::Object(map) => map.iter().any(|(k, v)| {
            (keys.contains(&k.as_str()) && !v.is_null()) || has_any_key(v, keys, depth + 1)
        }),
        Value::Array(items) => items.iter().any(|v| has_any_key(v, keys, depth + 1)),
        _ => false,
    }
}

/// A template together with what its response yielded when captured.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedTemplate {
    pub template: ApiTemplate,
    pub score: i64,
    /// Listings extracted from the captured response.
    pub extracted_count: usize,
    /// Elements in the captured response's listing array, listings or not.
    /// This is the page length the server actually serves.
    pub returned_count: usize,
}

/// The best template seen during one query.
///
/// A capture replaces the current one only when its score is strictly
/// higher; nothing scoring zero or below is ever retained. Each call shape
/// is considered once.
#[derive(Debug, Default)]
pub struct TemplateSlot {
    best: Option<CapturedTemplate>,
    seen_shapes: HashSet<String>,
}

impl TemplateSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a capture. Returns `true` if it became the retained template.
    pub fn offer(&mut self, capture: CapturedTemplate) -> bool {
        if !self.seen_shapes.insert(capture.template.shape_key()) {
            return false;
        }
        let threshold = self.best.as_ref().map_or(0, |b| b.score);
        if capture.score <= threshold {
            tracing::debug!(
                shape = %capture.template.shape_key(),
                score = capture.score,
                threshold,
                "template not retained"
            );
            return false;
        }
        tracing::debug!(
            shape = %capture.template.shape_key(),
            score = capture.score,
            extracted = capture.extracted_count,
            returned = capture.returned_count,
            "template retained"
        );
        self.best = Some(capture);
        true
    }

    #[must_use]
    pub fn best(&self) -> Option<&CapturedTemplate> {
        self.best.as_ref()
    }
}
