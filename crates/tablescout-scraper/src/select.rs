//! Candidate scorer and selector.
//!
//! `score = completeness + length_bonus + source_bonus`. The winner is the
//! highest score; ties fall to record count, then reported total, then the
//! lexicographically smaller source tag, so input order never matters.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use crate::classify::Classifier;
use crate::types::CandidateCollection;

/// Named scoring weights.
pub mod weights {
    /// Per-record points for a resolvable canonical URL.
    pub const URL: f64 = 4.0;
    pub const RATING: f64 = 2.0;
    pub const REVIEW_COUNT: f64 = 2.0;
    pub const IMAGE: f64 = 1.0;
    pub const NAME: f64 = 1.0;
    /// Record count at which the length bonus saturates at 1.0.
    pub const LENGTH_SATURATION: usize = 50;
    /// Added when the source tag looks like search/availability results.
    pub const SEARCH_SOURCE_BONUS: f64 = 3.0;
    /// Subtracted when the source tag looks like a home/recommendation
    /// module. Larger than the maximum completeness so a decoy can never
    /// outscore a tagged search source.
    pub const DECOY_SOURCE_PENALTY: f64 = 12.0;
}

static SEARCH_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)search|availability|results").expect("valid search-source regex")
});

static DECOY_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)home|recommend|module|carousel|promo").expect("valid decoy-source regex")
});

/// Score one collection. Empty collections score zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_collection(classifier: &Classifier, collection: &CandidateCollection) -> f64 {
    let count = collection.records.len();
    if count == 0 {
        return 0.0;
    }

    let mut points = 0.0;
    for record in &collection.records {
        if classifier.url(record).is_some() {
            points += weights::URL;
        }
        if classifier.rating(record).is_some() {
            points += weights::RATING;
        }
        if classifier.review_count(record).is_some() {
            points += weights::REVIEW_COUNT;
        }
        if classifier.image_url(record).is_some() {
            points += weights::IMAGE;
        }
        if classifier.name(record).is_some() {
            points += weights::NAME;
        }
    }
    let completeness = points / count as f64;
    let length_bonus = count.min(weights::LENGTH_SATURATION) as f64
        / weights::LENGTH_SATURATION as f64;

    completeness + length_bonus + source_bonus(&collection.source_tag)
}

fn source_bonus(source_tag: &str) -> f64 {
    let mut bonus = 0.0;
    if SEARCH_SOURCE.is_match(source_tag) {
        bonus += weights::SEARCH_SOURCE_BONUS;
    }
    if DECOY_SOURCE.is_match(source_tag) {
        bonus -= weights::DECOY_SOURCE_PENALTY;
    }
    bonus
}

/// Pick the best non-empty collection, or [`CandidateCollection::empty`]
/// when there is none.
#[must_use]
pub fn select_best(
    classifier: &Classifier,
    collections: Vec<CandidateCollection>,
) -> CandidateCollection {
    let best = collections
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(|c| (score_collection(classifier, &c), c))
        .max_by(|(a_score, a), (b_score, b)| {
            a_score
                .total_cmp(b_score)
                .then_with(|| a.records.len().cmp(&b.records.len()))
                .then_with(|| a.total_count.cmp(&b.total_count))
                .then_with(|| tag_order(a, b))
        });

    match best {
        Some((score, winner)) => {
            tracing::debug!(
                source = %winner.source_tag,
                count = winner.records.len(),
                total = winner.total_count,
                score,
                "selected candidate collection"
            );
            winner
        }
        None => CandidateCollection::empty(),
    }
}

/// Smaller tag ranks higher.
fn tag_order(a: &CandidateCollection, b: &CandidateCollection) -> Ordering {
    b.source_tag.cmp(&a.source_tag)
}
