use serde::{Deserialize, Serialize};

/// A normalized listing as emitted to the output sink.
///
/// Only `name` is required for a value to count as a listing. Every other
/// field is best-effort and may be `None` when no source exposed it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub name: Option<String>,
    /// Stable numeric or opaque site identifier.
    pub identity: Option<String>,
    pub slug: Option<String>,
    /// Absolute, canonicalized profile URL without a fragment.
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub category: Option<String>,
    pub price_tier: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    /// Booking slots, passed through uninterpreted.
    #[serde(default)]
    pub booking_slots: Vec<serde_json::Value>,
}

impl ListingRecord {
    /// `true` when the record carries the one field every listing must have.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    /// Normalized name key, see [`normalize_name_key`].
    #[must_use]
    pub fn name_key(&self) -> Option<String> {
        self.name.as_deref().and_then(normalize_name_key)
    }
}

/// Normalize a display name into a comparison key.
///
/// Lower-cases, spells `&` as `and`, collapses every run of
/// non-alphanumeric characters into one space and trims. Returns `None`
/// when nothing alphanumeric remains.
#[must_use]
pub fn normalize_name_key(name: &str) -> Option<String> {
    let lowered = name.to_lowercase().replace('&', " and ");
    let key = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}
