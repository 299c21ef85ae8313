//! One extraction pass: scan every source, pick the winning collection,
//! reconcile its records against everything seen in the pass.
//!
//! Strategy order is known paths, then the full-tree fallback, then DOM
//! cards (only when enabled). A pass that finds nothing is not an error.

use serde_json::Value;
use tablescout_core::{ListingRecord, SiteProfile};

use crate::classify::Classifier;
use crate::reconcile::{merge, ReconciliationIndex};
use crate::scan::{
    collect_detail_items, scan_fallback, scan_known_paths, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ITEMS,
};
use crate::select::select_best;
use crate::template::call_source_tag;
use crate::types::{CandidateCollection, PageSnapshot};

/// Tag used for DOM-card candidates.
pub const DOM_SOURCE_TAG: &str = "dom:cards";

#[derive(Debug, Clone, Default)]
pub struct PassResult {
    pub winner: CandidateCollection,
    /// Winner records after reconciliation, in winner order.
    pub records: Vec<ListingRecord>,
}

impl PassResult {
    /// The winner's self-reported total when it exceeds what this pass
    /// returned. A total equal to the page length is indistinguishable from
    /// "not reported".
    #[must_use]
    pub fn reported_total(&self) -> Option<usize> {
        (self.winner.total_count > self.winner.records.len()).then_some(self.winner.total_count)
    }

    /// Elements the winning source array held, listings or not.
    #[must_use]
    pub fn returned(&self) -> usize {
        self.winner.raw_len
    }
}

/// What a captured response yields, used to score and size its template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseYield {
    pub listings: usize,
    /// Elements in the winning array, listings or not.
    pub returned: usize,
    pub details: usize,
}

pub struct Extractor<'a> {
    classifier: &'a Classifier,
    profile: &'a SiteProfile,
    dom_fallback: bool,
}

impl<'a> Extractor<'a> {
    #[must_use]
    pub fn new(classifier: &'a Classifier, profile: &'a SiteProfile, dom_fallback: bool) -> Self {
        Self {
            classifier,
            profile,
            dom_fallback,
        }
    }

    /// Extract from a full page snapshot (hydration state + intercepted
    /// responses + optional DOM cards).
    #[must_use]
    pub fn extract_snapshot(&self, snapshot: &PageSnapshot) -> PassResult {
        let bodies: Vec<(String, Value)> = snapshot
            .responses
            .iter()
            .filter_map(|r| {
                r.json_body()
                    .map(|body| (call_source_tag(&r.url, r.request_body.as_deref()), body))
            })
            .collect();

        let mut trees: Vec<(&str, &Value)> = snapshot
            .state
            .iter()
            .map(|(ns, tree)| (ns.as_str(), tree))
            .collect();
        trees.extend(bodies.iter().map(|(tag, body)| (tag.as_str(), body)));

        let mut candidates = Vec::new();
        for (ns, tree) in &snapshot.state {
            candidates.extend(scan_known_paths(
                self.classifier,
                tree,
                ns,
                &self.profile.state_paths,
                &self.profile.total_count_fields,
            ));
        }
        for (tag, body) in &bodies {
            candidates.extend(scan_known_paths(
                self.classifier,
                body,
                tag,
                &self.profile.response_paths,
                &self.profile.total_count_fields,
            ));
        }

        if candidates.is_empty() {
            tracing::debug!(sources = trees.len(), "known paths found nothing; full scan");
            candidates = self.fallback_candidates(&trees);
        }

        let dom_cards: Vec<Value> = if self.dom_fallback {
            snapshot
                .dom_cards
                .iter()
                .filter_map(|card| self.classifier.unwrap_listing(card))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        if candidates.is_empty() && !dom_cards.is_empty() {
            tracing::debug!(count = dom_cards.len(), "using DOM cards");
            candidates.push(CandidateCollection {
                total_count: dom_cards.len(),
                raw_len: dom_cards.len(),
                records: dom_cards,
                source_tag: DOM_SOURCE_TAG.to_string(),
            });
        }

        let winner = select_best(self.classifier, candidates);
        if winner.is_empty() {
            tracing::warn!(
                url = snapshot.url.as_deref().unwrap_or("<unknown>"),
                "no listing collection found on page"
            );
            return PassResult::default();
        }

        let mut fragments: Vec<Value> = Vec::new();
        for (_, tree) in &trees {
            fragments.extend(collect_detail_items(
                self.classifier,
                tree,
                DEFAULT_MAX_DEPTH,
                DEFAULT_MAX_ITEMS,
            ));
        }
        if self.dom_fallback {
            fragments.extend(snapshot.dom_cards.iter().cloned());
        }
        self.reconcile(winner, fragments)
    }

    /// Extract from one replayed API response body.
    #[must_use]
    pub fn extract_response(&self, body: &Value, source: &str) -> PassResult {
        let mut candidates = scan_known_paths(
            self.classifier,
            body,
            source,
            &self.profile.response_paths,
            &self.profile.total_count_fields,
        );
        if candidates.is_empty() {
            candidates = self.fallback_candidates(&[(source, body)]);
        }

        let winner = select_best(self.classifier, candidates);
        if winner.is_empty() {
            tracing::debug!(source, "replayed response held no listings");
            return PassResult::default();
        }
        let fragments =
            collect_detail_items(self.classifier, body, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ITEMS);
        self.reconcile(winner, fragments)
    }

    /// Listings and detail items found in a captured response.
    #[must_use]
    pub fn response_yield(&self, body: &Value, source: &str) -> ResponseYield {
        let mut candidates = scan_known_paths(
            self.classifier,
            body,
            source,
            &self.profile.response_paths,
            &self.profile.total_count_fields,
        );
        if candidates.is_empty() {
            candidates = self.fallback_candidates(&[(source, body)]);
        }
        let winner = select_best(self.classifier, candidates);
        ResponseYield {
            listings: winner.records.len(),
            returned: winner.raw_len,
            details: collect_detail_items(self.classifier, body, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ITEMS)
                .len(),
        }
    }

    fn fallback_candidates(&self, trees: &[(&str, &Value)]) -> Vec<CandidateCollection> {
        trees
            .iter()
            .filter_map(|(source, tree)| {
                let hit =
                    scan_fallback(self.classifier, tree, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ITEMS);
                (!hit.records.is_empty()).then(|| CandidateCollection {
                    total_count: hit.records.len(),
                    raw_len: hit.raw_len,
                    records: hit.records,
                    source_tag: format!("{source}:*"),
                })
            })
            .collect()
    }

    fn reconcile(&self, winner: CandidateCollection, mut fragments: Vec<Value>) -> PassResult {
        fragments.extend(winner.records.iter().cloned());
        let index = ReconciliationIndex::build(self.classifier, &fragments);

        let records = winner
            .records
            .iter()
            .map(|fragment| {
                let primary = self.classifier.to_record(fragment);
                let mut record = match index.find_complement(&primary) {
                    Some(complement) => merge(primary, complement),
                    None => primary,
                };
                if record.url.is_none() {
                    record.url = record
                        .identity
                        .as_deref()
                        .and_then(|id| self.classifier.profile_url_for(id));
                }
                record
            })
            .collect();

        tracing::debug!(
            source = %winner.source_tag,
            count = winner.records.len(),
            indexed = index.len(),
            "pass reconciled"
        );
        PassResult { winner, records }
    }
}
