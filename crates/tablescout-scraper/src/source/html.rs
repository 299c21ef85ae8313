//! Rendering source that fetches the search page over plain HTTP and pulls
//! hydration state out of its inline scripts.
//!
//! No script runs, so only state serialized into the HTML is seen and no
//! backend responses are intercepted. Good enough for server-rendered
//! first pages; pagination then relies on scroll-free stop rules.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::client::ReplayClient;
use crate::error::ScraperError;
use crate::types::PageSnapshot;

use super::RenderingSource;

static NON_TEXT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>")
        .expect("valid block regex")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));

/// Cap on how much visible text is kept for interstitial checks.
const MAX_PAGE_TEXT_CHARS: usize = 20_000;

pub struct HtmlPageSource {
    client: Arc<ReplayClient>,
    url: String,
    namespaces: Vec<String>,
    html: Option<String>,
}

impl HtmlPageSource {
    #[must_use]
    pub fn new(client: Arc<ReplayClient>, url: impl Into<String>, namespaces: Vec<String>) -> Self {
        Self {
            client,
            url: url.into(),
            namespaces,
            html: None,
        }
    }
}

#[async_trait]
impl RenderingSource for HtmlPageSource {
    async fn wait_until_ready(&mut self) -> Result<(), ScraperError> {
        if self.html.is_none() {
            self.html = Some(self.client.fetch_html(&self.url).await?);
        }
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, ScraperError> {
        let Some(html) = self.html.as_deref() else {
            return Ok(PageSnapshot {
                url: Some(self.url.clone()),
                ..PageSnapshot::default()
            });
        };
        Ok(PageSnapshot {
            url: Some(self.url.clone()),
            state: extract_namespaces(html, &self.namespaces),
            responses: Vec::new(),
            dom_cards: Vec::new(),
            page_text: Some(visible_text(html)),
        })
    }
}

/// Find `window.NAME = {...}` / `NAME = [...]` assignments and
/// `<script id="NAME">` JSON blocks for every requested namespace.
pub(crate) fn extract_namespaces(html: &str, namespaces: &[String]) -> serde_json::Map<String, Value> {
    let mut found = serde_json::Map::new();

    for name in namespaces {
        let escaped = regex::escape(name);

        let Ok(script_re) = Regex::new(&format!(
            r#"(?is)<script\b[^>]*\bid\s*=\s*["']{escaped}["'][^>]*>(.*?)</script>"#
        )) else {
            continue;
        };
        if let Some(content) = script_re.captures(html).and_then(|c| c.get(1)) {
            if let Ok(value) = serde_json::from_str::<Value>(content.as_str().trim()) {
                found.insert(name.clone(), value);
                continue;
            }
        }

        let Ok(assign_re) = Regex::new(&format!(r"(?:window\.)?{escaped}\s*=\s*")) else {
            continue;
        };
        for m in assign_re.find_iter(html) {
            let rest = &html[m.end()..];
            let Some(raw) = extract_balanced_json(rest) else {
                continue;
            };
            match serde_json::from_str::<Value>(raw) {
                Ok(value) => {
                    found.insert(name.clone(), value);
                    break;
                }
                Err(e) => {
                    tracing::debug!(namespace = %name, error = %e, "hydration assignment is not JSON");
                }
            }
        }
    }

    found
}

/// Shortest prefix of `s` forming a complete JSON object or array.
///
/// Tracks bracket depth while respecting string literals and escapes.
/// Returns `None` when `s` does not start with `{` or `[`, when the value
/// is unterminated, or when closing brackets do not match their openers.
pub(crate) fn extract_balanced_json(s: &str) -> Option<&str> {
    if !(s.starts_with('{') || s.starts_with('[')) {
        return None;
    }
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Tag-stripped, whitespace-collapsed page text.
fn visible_text(html: &str) -> String {
    let without_blocks = NON_TEXT_BLOCK.replace_all(html, " ");
    let text = TAG.replace_all(&without_blocks, " ");
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_PAGE_TEXT_CHARS)
        .collect()
}
