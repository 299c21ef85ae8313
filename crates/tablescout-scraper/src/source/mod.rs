//! Collaborator contracts the engine depends on, plus the built-in
//! implementations.
//!
//! - [`RenderingSource`] supplies the first page's raw data and, optionally,
//!   more content on request (scroll continuation).
//! - [`RequestExecutor`] runs replayed API requests.
//! - [`ListingSink`] persists emitted records.

mod html;
mod snapshot;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tablescout_core::ListingRecord;

use crate::error::ScraperError;
use crate::types::{PageSnapshot, ReplayResponse, RequestDescriptor};

pub use html::HtmlPageSource;
pub use snapshot::SnapshotSource;

#[async_trait]
pub trait RenderingSource: Send {
    /// Resolves once the first page of content is ready. Callers bound this
    /// with a timeout and proceed with whatever is available.
    async fn wait_until_ready(&mut self) -> Result<(), ScraperError>;

    /// Current page data: hydration namespaces, intercepted responses and
    /// optional DOM cards.
    async fn snapshot(&mut self) -> Result<PageSnapshot, ScraperError>;

    /// Ask for more content (e.g. scroll to lazy-load). Returns `false`
    /// when the source cannot produce more.
    async fn load_more(&mut self) -> Result<bool, ScraperError> {
        Ok(false)
    }
}

/// Executes one replay request. No caching and no retries.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: &RequestDescriptor) -> Result<ReplayResponse, ScraperError>;
}

/// Append-only output. Order carries no meaning.
pub trait ListingSink: Send {
    fn persist(&mut self, record: ListingRecord);
}

impl ListingSink for Vec<ListingRecord> {
    fn persist(&mut self, record: ListingRecord) {
        self.push(record);
    }
}

impl<S: ListingSink + ?Sized> ListingSink for &mut S {
    fn persist(&mut self, record: ListingRecord) {
        (**self).persist(record);
    }
}

/// Shared cancellation signal, checked between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
