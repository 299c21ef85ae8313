//! Data exchanged between the engine and its collaborators.
//!
//! ## Snapshot shape
//!
//! A [`PageSnapshot`] is what the rendering collaborator hands over once
//! the first page of content is ready:
//!
//! ```json
//! {
//!   "url": "https://www.opentable.com/s?term=chicago",
//!   "state": { "__INITIAL_STATE__": { "search": { "results": [] } } },
//!   "responses": [
//!     {
//!       "url": "https://www.opentable.com/dapi/fe/gql?opname=RestaurantsAvailability",
//!       "method": "POST",
//!       "request_body": "{\"operationName\":\"RestaurantsAvailability\",\"variables\":{}}",
//!       "content_type": "application/json",
//!       "body": "{\"data\":{}}"
//!     }
//!   ],
//!   "dom_cards": [ { "name": "Alinea", "url": "/r/alinea-chicago" } ],
//!   "page_text": "..."
//! }
//! ```
//!
//! Every field is optional; a timed-out or partially hydrated page simply
//! produces a sparser snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw data captured from one rendered page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub url: Option<String>,
    /// Hydration namespace name → captured tree.
    pub state: serde_json::Map<String, Value>,
    /// Backend responses intercepted while the page loaded.
    pub responses: Vec<InterceptedResponse>,
    /// Structurally scraped listing cards (name/url/rating/image).
    pub dom_cards: Vec<Value>,
    /// Visible page text, used for interstitial detection only.
    pub page_text: Option<String>,
}

/// One intercepted backend call and its response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptedResponse {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub request_body: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default = "default_status")]
    pub status: u16,
    pub body: String,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

impl InterceptedResponse {
    /// Parses the body as JSON when the call succeeded and the body looks
    /// like JSON. Returns `None` for HTML, scripts, images and errors.
    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        if !(200..300).contains(&self.status) {
            return None;
        }
        let declared_json = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        let trimmed = self.body.trim_start();
        if !declared_json && !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return None;
        }
        serde_json::from_str(trimmed).ok()
    }
}

/// One array of listing fragments found in one place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateCollection {
    pub records: Vec<Value>,
    /// The source's self-reported total; equals `records.len()` when the
    /// source reports nothing.
    pub total_count: usize,
    /// Elements in the source array, listings or not.
    pub raw_len: usize,
    /// Provenance, e.g. `__INITIAL_STATE__:search.results`.
    pub source_tag: String,
}

impl CandidateCollection {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A concrete HTTP request synthesized from a captured template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: String,
    pub body: Option<String>,
}

/// What the HTTP-execution collaborator returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResponse {
    pub status: u16,
    pub body: String,
}
