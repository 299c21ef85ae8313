//! Reconciliation index and field-level merge.
//!
//! The index is rebuilt every extraction pass from every fragment seen in
//! that pass. Each key maps to at most [`MAX_PER_KEY`] fragments; the
//! oldest is evicted first.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde_json::Value;
use tablescout_core::ListingRecord;

use crate::classify::Classifier;

pub const MAX_PER_KEY: usize = 8;

/// Shortest normalized name allowed to take part in substring matching.
const MIN_SUBSTRING_KEY_LEN: usize = 4;

/// Named complement weights: points for each field the complement supplies
/// that the primary lacks.
pub mod weights {
    pub const URL: u32 = 6;
    pub const IMAGE: u32 = 3;
    pub const RATING: u32 = 2;
    pub const REVIEW_COUNT: u32 = 2;
    pub const CITY: u32 = 1;
    pub const NEIGHBORHOOD: u32 = 1;
    pub const PRICE_TIER: u32 = 1;
    pub const CATEGORY: u32 = 1;
}

type KeyMap = BTreeMap<String, VecDeque<usize>>;

/// Multi-key lookup over one pass's fragments.
#[derive(Debug, Default)]
pub struct ReconciliationIndex {
    /// Normalized fragments, addressed by position.
    records: Vec<ListingRecord>,
    by_identity: KeyMap,
    by_slug: KeyMap,
    by_name: KeyMap,
    by_name_key: KeyMap,
}

impl ReconciliationIndex {
    /// Index every fragment under each key it resolves.
    pub fn build<'a, I>(classifier: &Classifier, fragments: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut index = Self::default();
        for fragment in fragments {
            let record = classifier.to_record(fragment);
            if !record.is_valid() {
                continue;
            }
            let slot = index.records.len();
            if let Some(identity) = &record.identity {
                push_capped(&mut index.by_identity, identity.clone(), slot);
            }
            if let Some(slug) = &record.slug {
                push_capped(&mut index.by_slug, slug.clone(), slot);
            }
            if let Some(name) = &record.name {
                push_capped(&mut index.by_name, name.trim().to_string(), slot);
            }
            if let Some(key) = record.name_key() {
                push_capped(&mut index.by_name_key, key, slot);
            }
            index.records.push(record);
        }
        index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The fragment that best completes `primary`, if any adds something.
    ///
    /// Candidates are the union of the identity, slug, exact-name and
    /// normalized-name hits. Only when that union is empty are
    /// normalized-name keys containing (or contained in) the primary's key
    /// considered. Fragments whose identity differs from the primary's are
    /// never used.
    #[must_use]
    pub fn find_complement(&self, primary: &ListingRecord) -> Option<&ListingRecord> {
        let mut slots: Vec<usize> = Vec::new();
        let mut seen = HashSet::new();

        if let Some(identity) = &primary.identity {
            add_hits(&mut slots, &mut seen, self.by_identity.get(identity));
        }
        if let Some(slug) = &primary.slug {
            add_hits(&mut slots, &mut seen, self.by_slug.get(slug));
        }
        if let Some(name) = &primary.name {
            add_hits(&mut slots, &mut seen, self.by_name.get(name.trim()));
        }
        let primary_key = primary.name_key();
        if let Some(key) = &primary_key {
            add_hits(&mut slots, &mut seen, self.by_name_key.get(key));
        }

        if slots.is_empty() {
            if let Some(key) = primary_key.filter(|k| k.len() >= MIN_SUBSTRING_KEY_LEN) {
                for (other, hits) in &self.by_name_key {
                    if other.len() >= MIN_SUBSTRING_KEY_LEN
                        && (other.contains(key.as_str()) || key.contains(other.as_str()))
                    {
                        add_hits(&mut slots, &mut seen, Some(hits));
                    }
                }
            }
        }

        let mut best: Option<(u32, &ListingRecord)> = None;
        for slot in slots {
            let candidate = &self.records[slot];
            if conflicting_identity(primary, candidate) {
                continue;
            }
            let score = complement_score(primary, candidate);
            if score > 0 && best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, record)| record)
    }
}

fn add_hits(slots: &mut Vec<usize>, seen: &mut HashSet<usize>, hits: Option<&VecDeque<usize>>) {
    for &slot in hits.into_iter().flatten() {
        if seen.insert(slot) {
            slots.push(slot);
        }
    }
}

fn push_capped(map: &mut KeyMap, key: String, slot: usize) {
    let entries = map.entry(key).or_default();
    if entries.len() == MAX_PER_KEY {
        entries.pop_front();
    }
    entries.push_back(slot);
}

fn conflicting_identity(primary: &ListingRecord, candidate: &ListingRecord) -> bool {
    matches!(
        (&primary.identity, &candidate.identity),
        (Some(a), Some(b)) if a != b
    )
}

/// Points for every field `complement` would fill in `primary`.
#[must_use]
pub fn complement_score(primary: &ListingRecord, complement: &ListingRecord) -> u32 {
    fn fills<T>(primary: Option<&T>, complement: Option<&T>, points: u32) -> u32 {
        if primary.is_none() && complement.is_some() {
            points
        } else {
            0
        }
    }

    let p = primary;
    let c = complement;
    fills(p.url.as_ref(), c.url.as_ref(), weights::URL)
        + fills(p.image_url.as_ref(), c.image_url.as_ref(), weights::IMAGE)
        + fills(p.rating.as_ref(), c.rating.as_ref(), weights::RATING)
        + fills(p.review_count.as_ref(), c.review_count.as_ref(), weights::REVIEW_COUNT)
        + fills(p.city.as_ref(), c.city.as_ref(), weights::CITY)
        + fills(p.neighborhood.as_ref(), c.neighborhood.as_ref(), weights::NEIGHBORHOOD)
        + fills(p.price_tier.as_ref(), c.price_tier.as_ref(), weights::PRICE_TIER)
        + fills(p.category.as_ref(), c.category.as_ref(), weights::CATEGORY)
}

/// Field-level merge; the primary's value always wins.
#[must_use]
pub fn merge(primary: ListingRecord, complement: &ListingRecord) -> ListingRecord {
    ListingRecord {
        name: primary.name.or_else(|| complement.name.clone()),
        identity: primary.identity.or_else(|| complement.identity.clone()),
        slug: primary.slug.or_else(|| complement.slug.clone()),
        url: primary.url.or_else(|| complement.url.clone()),
        image_url: primary.image_url.or_else(|| complement.image_url.clone()),
        rating: primary.rating.or(complement.rating),
        review_count: primary.review_count.or(complement.review_count),
        category: primary.category.or_else(|| complement.category.clone()),
        price_tier: primary.price_tier.or_else(|| complement.price_tier.clone()),
        neighborhood: primary
            .neighborhood
            .or_else(|| complement.neighborhood.clone()),
        city: primary.city.or_else(|| complement.city.clone()),
        booking_slots: if primary.booking_slots.is_empty() {
            complement.booking_slots.clone()
        } else {
            primary.booking_slots
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablescout_core::SiteProfile;

    fn classifier() -> Classifier {
        Classifier::new(&SiteProfile::default())
    }

    #[test]
    fn terse_api_record_is_completed_from_dom_fragment() {
        let c = classifier();
        let api = json!({"rid": 42, "name": "Alinea", "rating": 4.9});
        let dom = json!({
            "name": "Alinea",
            "url": "/r/alinea-chicago",
            "image": "https://cdn.example.test/alinea.png"
        });
        let fragments = [api.clone(), dom];
        let index = ReconciliationIndex::build(&c, &fragments);

        let primary = c.to_record(&api);
        let complement = index.find_complement(&primary).expect("complement found");
        let merged = merge(primary, complement);

        assert_eq!(merged.identity.as_deref(), Some("42"));
        assert_eq!(
            merged.url.as_deref(),
            Some("https://www.opentable.com/r/alinea-chicago")
        );
        assert_eq!(
            merged.image_url.as_deref(),
            Some("https://cdn.example.test/alinea.png")
        );
        assert_eq!(merged.rating, Some(4.9));
    }

    #[test]
    fn merge_never_nulls_primary_fields() {
        let primary = ListingRecord {
            name: Some("Alinea".to_string()),
            url: Some("https://example.test/a".to_string()),
            rating: Some(4.0),
            booking_slots: vec![json!({"time": "19:00"})],
            ..ListingRecord::default()
        };
        let merged = merge(primary.clone(), &ListingRecord::default());
        assert_eq!(merged, primary);

        let other = ListingRecord {
            name: Some("Other".to_string()),
            url: Some("https://example.test/b".to_string()),
            rating: Some(2.0),
            city: Some("Chicago".to_string()),
            ..ListingRecord::default()
        };
        let merged = merge(primary.clone(), &other);
        assert_eq!(merged.name, primary.name);
        assert_eq!(merged.url, primary.url);
        assert_eq!(merged.rating, primary.rating);
        assert_eq!(merged.booking_slots, primary.booking_slots);
        assert_eq!(merged.city.as_deref(), Some("Chicago"));
    }

    #[test]
    fn highest_scoring_complement_wins() {
        let c = classifier();
        let fragments = [
            json!({"name": "Kasama", "cuisine": "Filipino"}),
            json!({"name": "Kasama", "url": "/r/kasama", "rating": 4.8}),
        ];
        let index = ReconciliationIndex::build(&c, &fragments);
        let primary = ListingRecord {
            name: Some("Kasama".to_string()),
            ..ListingRecord::default()
        };
        let found = index.find_complement(&primary).unwrap();
        assert!(found.url.is_some());
    }

    #[test]
    fn conflicting_identity_is_ignored() {
        let c = classifier();
        let fragments = [json!({"rid": 7, "name": "Alinea", "url": "/r/other"})];
        let index = ReconciliationIndex::build(&c, &fragments);
        let primary = ListingRecord {
            name: Some("Alinea".to_string()),
            identity: Some("42".to_string()),
            ..ListingRecord::default()
        };
        assert!(index.find_complement(&primary).is_none());
    }

    #[test]
    fn substring_match_only_when_exact_tiers_miss() {
        let c = classifier();
        let fragments = [json!({"name": "Girl & the Goat Chicago", "url": "/r/gtg"})];
        let index = ReconciliationIndex::build(&c, &fragments);
        let primary = ListingRecord {
            name: Some("Girl and the Goat".to_string()),
            ..ListingRecord::default()
        };
        let found = index.find_complement(&primary).unwrap();
        assert_eq!(found.url.as_deref(), Some("https://www.opentable.com/r/gtg"));
    }

    #[test]
    fn normalized_name_tier_matches_punctuation_variants() {
        let c = classifier();
        let fragments = [json!({"name": "Girl & The Goat", "rating": 4.7})];
        let index = ReconciliationIndex::build(&c, &fragments);
        let primary = ListingRecord {
            name: Some("girl and the goat".to_string()),
            ..ListingRecord::default()
        };
        assert_eq!(index.find_complement(&primary).unwrap().rating, Some(4.7));
    }

    #[test]
    fn keys_are_capped_with_oldest_evicted() {
        let c = classifier();
        let mut fragments: Vec<Value> = (0..MAX_PER_KEY)
            .map(|i| json!({"name": "Dup", "rating": 4.0, "cuisine": format!("c{i}")}))
            .collect();
        // Ninth entry evicts the first; only it carries a url.
        fragments.push(json!({"name": "Dup", "url": "/r/dup"}));
        let index = ReconciliationIndex::build(&c, &fragments);
        assert_eq!(index.by_name["Dup"].len(), MAX_PER_KEY);
        assert_eq!(index.by_name["Dup"].front(), Some(&1));

        let primary = ListingRecord {
            name: Some("Dup".to_string()),
            ..ListingRecord::default()
        };
        assert!(index.find_complement(&primary).unwrap().url.is_some());
    }

    #[test]
    fn complement_score_counts_only_missing_fields() {
        let primary = ListingRecord {
            url: Some("u".to_string()),
            ..ListingRecord::default()
        };
        let complement = ListingRecord {
            url: Some("other".to_string()),
            image_url: Some("i".to_string()),
            city: Some("Chicago".to_string()),
            ..ListingRecord::default()
        };
        assert_eq!(
            complement_score(&primary, &complement),
            weights::IMAGE + weights::CITY
        );
    }
}
