//! Pagination driver: runs one query from the first page to a terminal
//! state.
//!
//! ```text
//! CollectFirstPage -> DecideStrategy -> ReplayPage(2..) -> Done
//!                                    \-> Scroll(1..)     -> Done
//! ```
//!
//! Every failure past the first page ends pagination with a [`StopReason`]
//! and a warning; records already emitted are never discarded.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tablescout_core::{AppConfig, ListingRecord, SiteProfile};

use crate::classify::Classifier;
use crate::extract::{Extractor, PassResult};
use crate::interstitial;
use crate::paging::{build_request_for_page, derive_page_size};
use crate::sink::DedupSink;
use crate::source::{CancelFlag, ListingSink, RenderingSource, RequestExecutor};
use crate::template::{
    call_source_tag, capture_template, score_template, CapturedTemplate, TemplateSlot,
};
use crate::types::PageSnapshot;

/// Hard cap on replayed pages regardless of the requested count.
pub const MAX_REPLAY_PAGES: u32 = 200;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub results_wanted: usize,
    pub default_page_size: usize,
    pub stall_threshold: u32,
    pub max_scrolls: u32,
    pub inter_request_delay: Duration,
    pub content_ready_timeout: Duration,
    pub request_timeout: Duration,
    pub dom_fallback: bool,
}

impl DriverConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig, results_wanted: usize) -> Self {
        Self {
            results_wanted: results_wanted.max(1),
            default_page_size: config.default_page_size.max(1),
            stall_threshold: config.stall_threshold.max(1),
            max_scrolls: config.max_scrolls,
            inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
            content_ready_timeout: Duration::from_secs(config.content_ready_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            dom_fallback: config.dom_fallback_enabled,
        }
    }

    /// Replay pages allowed for this query: `min(2 * results_wanted + 1,
    /// MAX_REPLAY_PAGES)`.
    #[must_use]
    pub fn page_ceiling(&self) -> u32 {
        let proportional = self.results_wanted.saturating_mul(2).saturating_add(1);
        u32::try_from(proportional)
            .unwrap_or(u32::MAX)
            .min(MAX_REPLAY_PAGES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ResultsReached,
    Stalled,
    ServerTotalReached,
    ShortPage,
    NoPaginationField,
    PageCeiling,
    Transport,
    Cancelled,
    NoMoreContent,
    ScrollLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ResultsReached => "results_reached",
            Self::Stalled => "stalled",
            Self::ServerTotalReached => "server_total_reached",
            Self::ShortPage => "short_page",
            Self::NoPaginationField => "no_pagination_field",
            Self::PageCeiling => "page_ceiling",
            Self::Transport => "transport",
            Self::Cancelled => "cancelled",
            Self::NoMoreContent => "no_more_content",
            Self::ScrollLimit => "scroll_limit",
        };
        f.write_str(s)
    }
}

/// How pages after the first were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    FirstPageOnly,
    Replay,
    Scroll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub emitted: usize,
    /// Pages processed, the first page included.
    pub pages: u32,
    pub strategy: Strategy,
    pub stop_reason: StopReason,
    pub server_total: Option<usize>,
}

enum State {
    CollectFirstPage,
    DecideStrategy,
    ReplayPage(u32),
    Scroll(u32),
    Done(StopReason),
}

/// Replay bookkeeping for the retained template.
struct Replay {
    captured: CapturedTemplate,
    page_size: usize,
    /// The server's real page length has been observed.
    confirmed: bool,
}

impl Replay {
    fn new(captured: CapturedTemplate, default_page_size: usize) -> Self {
        // The captured call's own response shows what the server actually
        // returns per page, whatever size the request asked for.
        let (page_size, confirmed) = if captured.returned_count > 0 {
            (captured.returned_count, true)
        } else {
            (derive_page_size(&captured.template, default_page_size), false)
        };
        Self {
            captured,
            page_size,
            confirmed,
        }
    }

    fn source_tag(&self) -> String {
        let t = &self.captured.template;
        let path = call_source_tag(&t.base_url, None);
        match &t.operation_name {
            Some(op) => format!("{path}#{op}"),
            None => path,
        }
    }
}

/// Emission and stop-rule state shared by every strategy.
struct Progress<S: ListingSink> {
    sink: DedupSink<S>,
    results_wanted: usize,
    stall_threshold: u32,
    stalls: u32,
    pages: u32,
    server_total: Option<usize>,
}

impl<S: ListingSink> Progress<S> {
    /// Emits until the results cap; returns how many were new.
    fn emit(&mut self, records: Vec<ListingRecord>) -> usize {
        let mut new = 0;
        for record in records {
            if self.sink.emitted() >= self.results_wanted {
                break;
            }
            if self.sink.try_emit(record) {
                new += 1;
            }
        }
        new
    }

    fn note_total(&mut self, pass: &PassResult) {
        if let Some(total) = pass.reported_total() {
            self.server_total = Some(self.server_total.map_or(total, |t| t.max(total)));
        }
    }

    fn limit_reached(&self) -> Option<StopReason> {
        let emitted = self.sink.emitted();
        if emitted >= self.results_wanted {
            return Some(StopReason::ResultsReached);
        }
        if self.server_total.is_some_and(|total| emitted >= total) {
            return Some(StopReason::ServerTotalReached);
        }
        None
    }

    /// Stop rules evaluated after every page past the first, in order:
    /// results wanted, stall, server total.
    fn after_page(&mut self, new: usize) -> Option<StopReason> {
        self.pages += 1;
        if self.sink.emitted() >= self.results_wanted {
            return Some(StopReason::ResultsReached);
        }
        if new == 0 {
            self.stalls += 1;
            if self.stalls >= self.stall_threshold {
                return Some(StopReason::Stalled);
            }
        } else {
            self.stalls = 0;
        }
        self.limit_reached()
    }
}

/// Drives one query. Holds no per-query state itself, so one driver can
/// run many queries; each run gets its own template slot, index and
/// dedup sets.
pub struct ListingDriver {
    profile: SiteProfile,
    classifier: Classifier,
    config: DriverConfig,
    cancel: CancelFlag,
}

impl ListingDriver {
    #[must_use]
    pub fn new(profile: SiteProfile, config: DriverConfig, cancel: CancelFlag) -> Self {
        let classifier = Classifier::new(&profile);
        Self {
            profile,
            classifier,
            config,
            cancel,
        }
    }

    /// Run the query to completion, emitting into `sink`.
    pub async fn run<R, E, S>(&self, source: &mut R, executor: &E, sink: S) -> QueryOutcome
    where
        R: RenderingSource + ?Sized,
        E: RequestExecutor + ?Sized,
        S: ListingSink,
    {
        let extractor = Extractor::new(&self.classifier, &self.profile, self.config.dom_fallback);
        let mut progress = Progress {
            sink: DedupSink::new(sink),
            results_wanted: self.config.results_wanted,
            stall_threshold: self.config.stall_threshold,
            stalls: 0,
            pages: 0,
            server_total: None,
        };
        let mut slot = TemplateSlot::new();
        let mut replay: Option<Replay> = None;
        let mut strategy = Strategy::FirstPageOnly;
        let mut state = State::CollectFirstPage;

        let stop_reason = loop {
            state = match state {
                State::CollectFirstPage => {
                    if self.cancel.is_cancelled() {
                        State::Done(StopReason::Cancelled)
                    } else {
                        self.collect_first_page(source, &extractor, &mut progress, &mut slot)
                            .await;
                        State::DecideStrategy
                    }
                }
                State::DecideStrategy => {
                    if let Some(reason) = progress.limit_reached() {
                        State::Done(reason)
                    } else if let Some(captured) = slot.best().cloned() {
                        tracing::debug!(
                            shape = %captured.template.shape_key(),
                            score = captured.score,
                            "replaying captured template"
                        );
                        strategy = Strategy::Replay;
                        replay = Some(Replay::new(captured, self.config.default_page_size));
                        State::ReplayPage(2)
                    } else if self.config.max_scrolls > 0 {
                        strategy = Strategy::Scroll;
                        State::Scroll(1)
                    } else {
                        State::Done(StopReason::NoMoreContent)
                    }
                }
                State::ReplayPage(page) => match replay.as_mut() {
                    Some(r) => {
                        match self
                            .replay_page(r, page, executor, &extractor, &mut progress)
                            .await
                        {
                            Some(reason) => State::Done(reason),
                            None => State::ReplayPage(page + 1),
                        }
                    }
                    None => State::Done(StopReason::NoPaginationField),
                },
                State::Scroll(attempt) => {
                    match self
                        .scroll(attempt, source, &extractor, &mut progress)
                        .await
                    {
                        Some(reason) => State::Done(reason),
                        None => State::Scroll(attempt + 1),
                    }
                }
                State::Done(reason) => break reason,
            };
        };

        let outcome = QueryOutcome {
            emitted: progress.sink.emitted(),
            pages: progress.pages,
            strategy,
            stop_reason,
            server_total: progress.server_total,
        };
        tracing::info!(
            emitted = outcome.emitted,
            pages = outcome.pages,
            strategy = ?outcome.strategy,
            stop_reason = %outcome.stop_reason,
            "query finished"
        );
        outcome
    }

    async fn collect_first_page<R, S>(
        &self,
        source: &mut R,
        extractor: &Extractor<'_>,
        progress: &mut Progress<S>,
        slot: &mut TemplateSlot,
    ) where
        R: RenderingSource + ?Sized,
        S: ListingSink,
    {
        match tokio::time::timeout(self.config.content_ready_timeout, source.wait_until_ready())
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "content-ready wait failed; using whatever is available");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.content_ready_timeout.as_secs(),
                    "content-ready wait timed out; using whatever is available"
                );
            }
        }

        let snapshot = self.take_snapshot(source).await;
        interstitial::warn_if_blocked(snapshot.url.as_deref(), snapshot.page_text.as_deref());

        let pass = extractor.extract_snapshot(&snapshot);
        progress.note_total(&pass);
        let new = progress.emit(pass.records);
        progress.pages = 1;
        self.capture_templates(&snapshot, extractor, slot);

        tracing::info!(
            url = snapshot.url.as_deref().unwrap_or("<unknown>"),
            new,
            server_total = ?progress.server_total,
            "first page collected"
        );
    }

    async fn take_snapshot<R>(&self, source: &mut R) -> PageSnapshot
    where
        R: RenderingSource + ?Sized,
    {
        match tokio::time::timeout(self.config.content_ready_timeout, source.snapshot()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "snapshot failed; treating page as empty");
                PageSnapshot::default()
            }
            Err(_) => {
                tracing::warn!("snapshot timed out; treating page as empty");
                PageSnapshot::default()
            }
        }
    }

    fn capture_templates(
        &self,
        snapshot: &PageSnapshot,
        extractor: &Extractor<'_>,
        slot: &mut TemplateSlot,
    ) {
        for response in &snapshot.responses {
            let Some(template) = capture_template(
                &response.url,
                &response.method,
                response.request_body.as_deref(),
                &self.profile.rpc_path_markers,
            ) else {
                continue;
            };
            let tag = call_source_tag(&response.url, response.request_body.as_deref());
            let found = response
                .json_body()
                .map(|body| extractor.response_yield(&body, &tag))
                .unwrap_or_default();
            let score = score_template(&template, found.listings, found.details);
            slot.offer(CapturedTemplate {
                template,
                score,
                extracted_count: found.listings,
                returned_count: found.returned,
            });
        }
    }

    async fn replay_page<E, S>(
        &self,
        replay: &mut Replay,
        page: u32,
        executor: &E,
        extractor: &Extractor<'_>,
        progress: &mut Progress<S>,
    ) -> Option<StopReason>
    where
        E: RequestExecutor + ?Sized,
        S: ListingSink,
    {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if page - 1 > self.config.page_ceiling() {
            tracing::warn!(page, ceiling = self.config.page_ceiling(), "page ceiling reached");
            return Some(StopReason::PageCeiling);
        }

        let request = match build_request_for_page(&replay.captured.template, page, replay.page_size)
        {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(page, error = %e, "cannot build next page request; stopping");
                return Some(StopReason::NoPaginationField);
            }
        };

        if !self.config.inter_request_delay.is_zero() {
            tokio::time::sleep(self.config.inter_request_delay).await;
        }

        let response =
            match tokio::time::timeout(self.config.request_timeout, executor.execute(&request))
                .await
            {
                Ok(Ok(response)) if (200..300).contains(&response.status) => response,
                Ok(Ok(response)) => {
                    tracing::warn!(page, status = response.status, "replay failed; stopping");
                    return Some(StopReason::Transport);
                }
                Ok(Err(e)) => {
                    tracing::warn!(page, error = %e, "replay failed; stopping");
                    return Some(StopReason::Transport);
                }
                Err(_) => {
                    tracing::warn!(
                        page,
                        timeout_secs = self.config.request_timeout.as_secs(),
                        "replay timed out; stopping"
                    );
                    return Some(StopReason::Transport);
                }
            };

        let body: Value = match serde_json::from_str(&response.body) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(page, error = %e, "replayed response is not JSON; stopping");
                return Some(StopReason::Transport);
            }
        };

        let pass = extractor.extract_response(&body, &replay.source_tag());
        let returned = pass.returned();
        progress.note_total(&pass);
        let new = progress.emit(pass.records);
        tracing::debug!(
            page,
            returned,
            new,
            page_size = replay.page_size,
            "replayed page"
        );

        if let Some(reason) = progress.after_page(new) {
            return Some(reason);
        }

        if !replay.confirmed {
            if returned > 0 {
                replay.page_size = returned;
                replay.confirmed = true;
            }
        } else if returned < replay.page_size {
            return Some(StopReason::ShortPage);
        } else if returned > replay.page_size {
            replay.page_size = returned;
        }
        None
    }

    async fn scroll<R, S>(
        &self,
        attempt: u32,
        source: &mut R,
        extractor: &Extractor<'_>,
        progress: &mut Progress<S>,
    ) -> Option<StopReason>
    where
        R: RenderingSource + ?Sized,
        S: ListingSink,
    {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if attempt > self.config.max_scrolls {
            return Some(StopReason::ScrollLimit);
        }

        match tokio::time::timeout(self.config.content_ready_timeout, source.load_more()).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => return Some(StopReason::NoMoreContent),
            Ok(Err(e)) => {
                tracing::warn!(attempt, error = %e, "load-more failed; stopping");
                return Some(StopReason::NoMoreContent);
            }
            Err(_) => {
                tracing::warn!(attempt, "load-more timed out; stopping");
                return Some(StopReason::NoMoreContent);
            }
        }

        let snapshot = self.take_snapshot(source).await;
        let pass = extractor.extract_snapshot(&snapshot);
        progress.note_total(&pass);
        let new = progress.emit(pass.records);
        tracing::debug!(attempt, new, "scrolled");
        progress.after_page(new)
    }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
