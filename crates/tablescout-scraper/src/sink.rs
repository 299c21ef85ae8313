//! Deduplicating sink adapter.

use std::collections::HashSet;

use tablescout_core::ListingRecord;

use crate::source::ListingSink;

/// Wraps a [`ListingSink`] and emits each logical listing at most once.
///
/// The seen-sets live for the whole query, across every page.
#[derive(Debug)]
pub struct DedupSink<S> {
    inner: S,
    identities: HashSet<String>,
    urls: HashSet<String>,
    name_keys: HashSet<String>,
    emitted: usize,
}

impl<S: ListingSink> DedupSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            identities: HashSet::new(),
            urls: HashSet::new(),
            name_keys: HashSet::new(),
            emitted: 0,
        }
    }

    /// `true` if a record with the same dedup key was already emitted.
    ///
    /// The key is the identity when present, else the url, else the
    /// normalized name.
    #[must_use]
    pub fn is_seen(&self, record: &ListingRecord) -> bool {
        if let Some(identity) = &record.identity {
            return self.identities.contains(identity);
        }
        if let Some(url) = &record.url {
            return self.urls.contains(url);
        }
        record
            .name_key()
            .is_some_and(|key| self.name_keys.contains(&key))
    }

    /// Persist `record` unless it is invalid or already seen. Every key the
    /// record resolves is remembered on emit.
    pub fn try_emit(&mut self, record: ListingRecord) -> bool {
        if !record.is_valid() || self.is_seen(&record) {
            return false;
        }
        if let Some(identity) = &record.identity {
            self.identities.insert(identity.clone());
        }
        if let Some(url) = &record.url {
            self.urls.insert(url.clone());
        }
        if let Some(key) = record.name_key() {
            self.name_keys.insert(key);
        }
        self.inner.persist(record);
        self.emitted += 1;
        true
    }

    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}
