// src/pipeline/select.rs

//! Mirror selection pipeline.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Config, MarkerToken, ProbeConfig, SelectionPolicy, SiteRecord};
use crate::pipeline::accumulate::Accumulator;
use crate::pipeline::channels::channels;
use crate::pipeline::dispatch::{DispatchSummary, Dispatcher};
use crate::services::{DirectoryTokenizer, Prober, assemble, filter};
use crate::utils::http;
use crate::utils::log as progress;

/// Outcome of one selection run.
#[derive(Debug)]
pub struct Selection {
    /// Scored candidates, best first
    pub ranked: Vec<SiteRecord>,
    pub summary: DispatchSummary,
}

impl Selection {
    /// Candidates that answered every required protocol.
    pub fn reachable(&self) -> usize {
        self.ranked.iter().filter(|s| s.is_reachable()).count()
    }
}

/// Run a full selection over a directory token stream.
///
/// The stream is assembled completely before any probe starts, so a
/// malformed directory fails the run without wasted network traffic.
pub async fn run_selection<T>(
    tokens: T,
    policy: SelectionPolicy,
    config: &ProbeConfig,
    prober: Arc<dyn Prober>,
) -> Result<Selection>
where
    T: IntoIterator<Item = MarkerToken>,
{
    policy.validate()?;

    let start_time = Utc::now();
    let sites = assemble(tokens)?;
    let assembled_time = Utc::now();
    log::info!(
        "Assembled {} sites in {} ms",
        sites.len(),
        (assembled_time - start_time).num_milliseconds()
    );

    let selection = select_sites(sites, policy, config, prober).await?;
    let end_time = Utc::now();

    progress::summary(
        "Selection",
        &[
            ("Sites", selection.summary.examined.to_string()),
            ("Candidates", selection.summary.dispatched.to_string()),
            ("Filtered out", selection.summary.filtered_out().to_string()),
            ("Reachable", selection.reachable().to_string()),
            (
                "Probe time",
                format!("{} ms", (end_time - assembled_time).num_milliseconds()),
            ),
        ],
    );

    Ok(selection)
}

/// Probe and rank already assembled sites.
pub async fn select_sites<I>(
    sites: I,
    policy: SelectionPolicy,
    config: &ProbeConfig,
    prober: Arc<dyn Prober>,
) -> Result<Selection>
where
    I: IntoIterator<Item = SiteRecord> + Send + 'static,
    I::IntoIter: Send,
{
    let (handles, inbox) = channels(config.score_buffer);
    let dispatcher = Dispatcher::new(Arc::new(policy), prober, config.max_concurrent);
    let deadline = config
        .run_deadline()
        .map(|limit| arm_deadline(limit, dispatcher.cancellation()));

    let dispatch = tokio::spawn(dispatcher.dispatch(sites, handles));
    let ranked = Accumulator::new().run(inbox).await;

    if let Some(timer) = deadline {
        timer.abort();
    }

    let summary = dispatch
        .await
        .map_err(|e| AppError::pipeline("dispatcher", e))??;
    let ranked = ranked?;

    Ok(Selection { ranked, summary })
}

/// Candidates for the policy, without probing, in directory order.
pub fn list_candidates<T>(tokens: T, policy: &SelectionPolicy) -> Result<Vec<SiteRecord>>
where
    T: IntoIterator<Item = MarkerToken>,
{
    policy.validate()?;
    let sites = assemble(tokens)?;
    Ok(filter::candidates(&sites, policy).cloned().collect())
}

/// Load the mirror directory from `infile`, or download it from
/// `source.directory_url`, and tokenize it.
///
/// Load and tokenize times are logged separately.
pub async fn load_tokens(infile: Option<&Path>, config: &Config) -> Result<Vec<MarkerToken>> {
    let start_time = Utc::now();
    let document = match infile {
        Some(path) => {
            log::info!("Reading mirror directory from {}", path.display());
            http::load_document(path).await?
        }
        None => {
            let url = config.source.url()?;
            log::info!("Fetching mirror directory from {}", url);
            let client = http::create_fetch_client(&config.probe)?;
            http::fetch_document(&client, url).await?
        }
    };
    let loaded_time = Utc::now();

    let tokens = DirectoryTokenizer::new()?.tokenize(&document)?;
    let parsed_time = Utc::now();

    log::info!(
        "Loaded mirror directory in {} ms",
        (loaded_time - start_time).num_milliseconds()
    );
    log::info!(
        "Tokenized {} nodes in {} ms",
        tokens.len(),
        (parsed_time - loaded_time).num_milliseconds()
    );
    Ok(tokens)
}

fn arm_deadline(limit: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(limit).await;
        log::warn!(
            "Run deadline of {}s reached; remaining probes score as unreachable",
            limit.as_secs()
        );
        cancel.cancel();
    })
}
