//! `tablescout search` handler.
//!
//! Each location becomes its own query with its own driver, so template
//! slots, reconciliation indexes and dedup sets are never shared. A failed
//! query is logged and skipped; the others still write their output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;

use tablescout_core::{AppConfig, ListingRecord, SearchQuery, SiteProfile};
use tablescout_scraper::{
    search_url, CancelFlag, DriverConfig, HtmlPageSource, ListingDriver, QueryOutcome,
    RenderingSource, ReplayClient, SnapshotSource,
};

use crate::SearchArgs;

enum QueryResult {
    Done {
        label: String,
        outcome: QueryOutcome,
        records: Vec<ListingRecord>,
    },
    Failed {
        label: String,
        error: anyhow::Error,
    },
}

/// The configured site profile, or the built-in one.
///
/// # Errors
///
/// Returns an error if the configured profile file cannot be loaded.
pub(crate) fn load_profile(config: &AppConfig) -> anyhow::Result<SiteProfile> {
    match &config.site_profile_path {
        Some(path) => Ok(tablescout_core::load_site_profile(path)?),
        None => Ok(SiteProfile::default()),
    }
}

/// One query per `--location`, or a single location-less query.
pub(crate) fn build_queries(args: &SearchArgs) -> anyhow::Result<Vec<SearchQuery>> {
    let locations: Vec<Option<String>> = if args.locations.is_empty() {
        vec![None]
    } else {
        args.locations.iter().cloned().map(Some).collect()
    };
    locations
        .into_iter()
        .map(|location| {
            SearchQuery::from_parts(
                args.start_url.clone(),
                location,
                args.date.as_deref(),
                args.time.as_deref(),
                args.covers,
                args.results_wanted,
            )
            .map_err(anyhow::Error::from)
        })
        .collect()
}

fn query_label(query: &SearchQuery) -> String {
    query
        .location
        .clone()
        .or_else(|| query.start_url.clone())
        .unwrap_or_else(|| "default".to_string())
}

/// Run every query and write their listings as JSON lines.
///
/// # Errors
///
/// Returns an error if the arguments or profile are invalid, the HTTP
/// client cannot be built, the output cannot be written, or every query
/// failed.
pub(crate) async fn run_search(
    config: &AppConfig,
    args: &SearchArgs,
    cancel: &CancelFlag,
) -> anyhow::Result<()> {
    let queries = build_queries(args)?;
    let profile = load_profile(config)?;
    let client = Arc::new(
        ReplayClient::from_config(config)
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?,
    );
    let snapshot = match &args.snapshot {
        Some(path) => Some(tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("failed to read snapshot {}: {e}", path.display())
        })?),
        None => None,
    };

    let query_count = queries.len();
    let max_concurrent = config.max_concurrent_queries.max(1);
    let results: Vec<QueryResult> = stream::iter(queries)
        .map(|query| {
            let label = query_label(&query);
            let fut = run_query(
                config,
                &profile,
                &client,
                snapshot.as_deref(),
                query,
                cancel,
            );
            async move {
                match fut.await {
                    Ok((outcome, records)) => QueryResult::Done {
                        label,
                        outcome,
                        records,
                    },
                    Err(error) => QueryResult::Failed { label, error },
                }
            }
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|e| {
            anyhow::anyhow!("failed to create output {}: {e}", path.display())
        })?)),
        None => Box::new(std::io::stdout().lock()),
    };

    let mut failed = 0usize;
    let mut total = 0usize;
    for result in results {
        match result {
            QueryResult::Done {
                label,
                outcome,
                records,
            } => {
                write_jsonl(&mut writer, &label, &records)?;
                total += records.len();
                tracing::info!(
                    query = %label,
                    emitted = outcome.emitted,
                    pages = outcome.pages,
                    stop_reason = %outcome.stop_reason,
                    "query complete"
                );
            }
            QueryResult::Failed { label, error } => {
                failed += 1;
                tracing::error!(query = %label, error = %format!("{error:#}"), "query failed");
            }
        }
    }
    writer.flush()?;

    if failed == query_count {
        anyhow::bail!("all {query_count} queries failed");
    }
    tracing::info!(queries = query_count, failed, listings = total, "search finished");
    Ok(())
}

async fn run_query(
    config: &AppConfig,
    profile: &SiteProfile,
    client: &Arc<ReplayClient>,
    snapshot: Option<&str>,
    query: SearchQuery,
    cancel: &CancelFlag,
) -> anyhow::Result<(QueryOutcome, Vec<ListingRecord>)> {
    let mut source: Box<dyn RenderingSource> = match snapshot {
        Some(raw) => Box::new(SnapshotSource::from_json(raw)?),
        None => {
            let url = search_url(profile, &query)?;
            tracing::info!(%url, "opening search page");
            Box::new(HtmlPageSource::new(
                Arc::clone(client),
                url,
                profile.hydration_namespaces.clone(),
            ))
        }
    };

    let driver = ListingDriver::new(
        profile.clone(),
        DriverConfig::from_app_config(config, query.results_wanted),
        cancel.clone(),
    );
    let mut records = Vec::new();
    let outcome = driver
        .run(source.as_mut(), client.as_ref(), &mut records)
        .await;
    Ok((outcome, records))
}

/// One JSON object per line, each tagged with the query it came from.
fn write_jsonl<W: Write + ?Sized>(
    writer: &mut W,
    label: &str,
    records: &[ListingRecord],
) -> anyhow::Result<()> {
    for record in records {
        let mut value = serde_json::to_value(record)?;
        if let Value::Object(map) = &mut value {
            map.insert("query".to_string(), Value::String(label.to_string()));
        }
        writeln!(writer, "{value}")?;
    }
    Ok(())
}
