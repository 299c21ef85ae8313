//! Anti-bot / interstitial page heuristics.
//!
//! Detection only logs. Extraction still runs; a blocked page simply
//! yields nothing.

use std::sync::LazyLock;

use regex::Regex;

static INTERSTITIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)captcha|are you a robot|verify (?:that )?you are (?:a )?human|access denied|unusual traffic|request unsuccessful|pardon our interruption|checking your browser",
    )
    .expect("valid interstitial regex")
});

/// The matched phrase if `text` looks like a challenge or block page.
#[must_use]
pub fn detect(text: &str) -> Option<&str> {
    INTERSTITIAL.find(text).map(|m| m.as_str())
}

/// Log a warning when the page text looks like an interstitial.
pub fn warn_if_blocked(url: Option<&str>, text: Option<&str>) -> bool {
    let Some(marker) = text.and_then(detect) else {
        return false;
    };
    tracing::warn!(
        url = url.unwrap_or("<unknown>"),
        marker,
        "page looks like an anti-bot interstitial; extraction will likely find nothing"
    );
    true
}
