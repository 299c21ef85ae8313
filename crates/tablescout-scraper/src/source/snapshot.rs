//! Rendering source backed by captured browser snapshots.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ScraperError;
use crate::types::PageSnapshot;

use super::RenderingSource;

/// Replays one or more captured [`PageSnapshot`]s.
///
/// The first snapshot is the initial page. Each further snapshot is the
/// page state after one more "load more" step (scroll), so
/// [`RenderingSource::load_more`] advances through them.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    pages: Vec<PageSnapshot>,
    cursor: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Many(Vec<PageSnapshot>),
    One(PageSnapshot),
}

impl SnapshotSource {
    #[must_use]
    pub fn new(pages: Vec<PageSnapshot>) -> Self {
        Self { pages, cursor: 0 }
    }

    /// Parses either a single snapshot object or an array of them.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Deserialize`] if the JSON matches neither
    /// shape.
    pub fn from_json(raw: &str) -> Result<Self, ScraperError> {
        let file: SnapshotFile =
            serde_json::from_str(raw).map_err(|source| ScraperError::Deserialize {
                context: "page snapshot".to_string(),
                source,
            })?;
        Ok(match file {
            SnapshotFile::Many(pages) => Self::new(pages),
            SnapshotFile::One(page) => Self::new(vec![page]),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[async_trait]
impl RenderingSource for SnapshotSource {
    async fn wait_until_ready(&mut self) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, ScraperError> {
        Ok(self.pages.get(self.cursor).cloned().unwrap_or_default())
    }

    async fn load_more(&mut self) -> Result<bool, ScraperError> {
        if self.cursor + 1 < self.pages.len() {
            self.cursor += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
