//! Tree scanner: finds listing-shaped arrays in arbitrary JSON trees.
//!
//! Known-path probing is cheap and tried first. The fallback walks the
//! whole tree (depth-bounded, visited-set guarded) and keeps the array with
//! the most classifier matches. Detail-item collection uses the same walk
//! with a lower acceptance bar to gather reconciliation fragments.

use std::collections::HashSet;

use serde_json::Value;

use crate::classify::rules::lookup;
use crate::classify::Classifier;
use crate::types::CandidateCollection;

pub const DEFAULT_MAX_DEPTH: usize = 6;
pub const DEFAULT_MAX_ITEMS: usize = 600;

/// Per-element richness points used to break ties between fallback arrays.
mod richness {
    pub(super) const NAME: u32 = 3;
    pub(super) const IDENTITY: u32 = 2;
    pub(super) const URL_OR_SLUG: u32 = 2;
    pub(super) const PRICE: u32 = 1;
    pub(super) const RATING: u32 = 1;
    pub(super) const CATEGORY: u32 = 1;
}

/// Look up `paths` (dot paths relative to `root`) for arrays of listings.
///
/// Each element is kept when it is a listing or wraps one a single level
/// down. The total comes from the first positive `total_fields` entry on the
/// array's parent object, defaulting to the number of kept elements.
#[must_use]
pub fn scan_known_paths(
    classifier: &Classifier,
    root: &Value,
    source: &str,
    paths: &[String],
    total_fields: &[String],
) -> Vec<CandidateCollection> {
    let mut collections = Vec::new();

    for path in paths {
        let Some(items) = lookup(root, path).and_then(Value::as_array) else {
            continue;
        };

        let records: Vec<Value> = items
            .iter()
            .filter_map(|element| classifier.unwrap_listing(element))
            .cloned()
            .collect();
        if records.is_empty() {
            tracing::debug!(source, path, raw = items.len(), "known path held no listings");
            continue;
        }

        let parent = match path.rsplit_once('.') {
            Some((parent_path, _)) => lookup(root, parent_path),
            None => Some(root),
        };
        let total_count = parent
            .and_then(|p| reported_total(p, total_fields))
            .unwrap_or(records.len());

        tracing::debug!(source, path, count = records.len(), total_count, "known path hit");
        collections.push(CandidateCollection {
            records,
            total_count,
            raw_len: items.len(),
            source_tag: format!("{source}:{path}"),
        });
    }

    collections
}

fn reported_total(parent: &Value, total_fields: &[String]) -> Option<usize> {
    total_fields.iter().find_map(|field| {
        parent
            .get(field.as_str())
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
    })
}

/// The array a fallback scan settled on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackArray {
    /// Its listing elements.
    pub records: Vec<Value>,
    /// Its full length, listings or not.
    pub raw_len: usize,
}

/// Walk the whole tree and return the listing elements of the array with
/// the most classifier matches (ties: higher richness score, then first
/// found). `max_items` bounds the number of array elements examined.
#[must_use]
pub fn scan_fallback(
    classifier: &Classifier,
    root: &Value,
    max_depth: usize,
    max_items: usize,
) -> FallbackArray {
    let mut best: Option<(usize, u32, usize, Vec<&Value>)> = None;
    let mut examined = 0usize;

    walk(root, max_depth, |node| {
        let Value::Array(items) = node else {
            return true;
        };
        if examined >= max_items {
            return false;
        }

        let budget = max_items - examined;
        let slice = &items[..items.len().min(budget)];
        examined += slice.len();

        let matches: Vec<&Value> = slice
            .iter()
            .filter_map(|element| classifier.unwrap_listing(element))
            .collect();
        if matches.is_empty() {
            return true;
        }
        let score: u32 = matches.iter().map(|m| richness_score(classifier, m)).sum();

        let better = best.as_ref().is_none_or(|(count, best_score, _, _)| {
            matches.len() > *count || (matches.len() == *count && score > *best_score)
        });
        if better {
            best = Some((matches.len(), score, items.len(), matches));
        }
        true
    });

    best.map(|(_, _, raw_len, matches)| FallbackArray {
        records: matches.into_iter().cloned().collect(),
        raw_len,
    })
    .unwrap_or_default()
}

/// Collect every object in the tree that passes the detail-item bar, in
/// traversal order, up to `max_items`.
#[must_use]
pub fn collect_detail_items(
    classifier: &Classifier,
    root: &Value,
    max_depth: usize,
    max_items: usize,
) -> Vec<Value> {
    let mut items = Vec::new();
    walk(root, max_depth, |node| {
        if items.len() >= max_items {
            return false;
        }
        if classifier.is_detail_item(node) {
            items.push(node.clone());
        }
        true
    });
    items
}

fn richness_score(classifier: &Classifier, obj: &Value) -> u32 {
    let mut score = 0;
    if classifier.name(obj).is_some() {
        score += richness::NAME;
    }
    if classifier.identity(obj).is_some() {
        score += richness::IDENTITY;
    }
    if classifier.url(obj).is_some() || classifier.slug(obj).is_some() {
        score += richness::URL_OR_SLUG;
    }
    if classifier.price_tier(obj).is_some() {
        score += richness::PRICE;
    }
    if classifier.rating(obj).is_some() {
        score += richness::RATING;
    }
    if classifier.category(obj).is_some() {
        score += richness::CATEGORY;
    }
    score
}

/// Pre-order walk over containers with an explicit stack.
///
/// `visit` is called for every container at depth `<= max_depth`; returning
/// `false` stops the walk. Containers already visited (by address) are
/// skipped.
fn walk<'a, F>(root: &'a Value, max_depth: usize, mut visit: F)
where
    F: FnMut(&'a Value) -> bool,
{
    let mut stack: Vec<(&'a Value, usize)> = vec![(root, 0)];
    let mut visited: HashSet<*const Value> = HashSet::new();

    while let Some((node, depth)) = stack.pop() {
        if !(node.is_object() || node.is_array()) || !visited.insert(std::ptr::from_ref(node)) {
            continue;
        }
        if !visit(node) {
            return;
        }
        if depth >= max_depth {
            continue;
        }

        let children: Vec<&'a Value> = match node {
            Value::Object(map) => map.values().collect(),
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        };
        // Reverse so the first child is visited first.
        stack.extend(
            children
                .into_iter()
                .rev()
                .filter(|child| child.is_object() || child.is_array())
                .map(|child| (child, depth + 1)),
        );
    }
}
