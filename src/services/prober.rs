// src/services/prober.rs

//! Mirror probing.
//!
//! A probe is one bounded latency measurement per required protocol.
//! Failures are data: they turn into [`WORST_SCORE`], never into errors.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use tokio::net::TcpStream;
use tokio::time::Instant;
use url::{Host, Url};

use crate::error::{ProbeFailure, Result};
use crate::models::{Aggregation, ProbeConfig, SiteRecord, WORST_SCORE};
use crate::utils::http::create_async_client;
use crate::utils::url::port_or_default;

/// Scores a site; lower is better.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Measure `site` over every protocol in `protocols`.
    ///
    /// Must return within a bounded time and never fail; unreachable sites
    /// get [`WORST_SCORE`].
    async fn probe(&self, site: &SiteRecord, protocols: &[String]) -> u64;
}

/// Round-trip latency prober.
///
/// HTTP(S) endpoints get a `HEAD` request, everything else a TCP connect.
/// Each endpoint is sampled several times and its fastest answer kept; the
/// per-protocol results are then folded with the configured [`Aggregation`].
pub struct LatencyProber {
    client: Client,
    timeout: Duration,
    samples: u32,
    aggregation: Aggregation,
}

impl LatencyProber {
    /// Create a prober from the probe configuration.
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        Ok(Self::with_settings(
            create_async_client(config)?,
            config.timeout(),
            config.samples,
            config.aggregation,
        ))
    }

    /// Create a prober with explicit settings.
    pub fn with_settings(
        client: Client,
        timeout: Duration,
        samples: u32,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            client,
            timeout,
            samples: samples.max(1),
            aggregation,
        }
    }

    /// Fastest of `samples` attempts against one endpoint.
    async fn measure_endpoint(
        &self,
        endpoint: &Url,
    ) -> std::result::Result<Duration, ProbeFailure> {
        let mut best: Option<Duration> = None;
        let mut last_failure = None;

        for _ in 0..self.samples {
            match self.attempt(endpoint).await {
                Ok(elapsed) => best = Some(best.map_or(elapsed, |b| b.min(elapsed))),
                Err(failure) => last_failure = Some(failure),
            }
        }

        best.ok_or_else(|| {
            last_failure.unwrap_or_else(|| ProbeFailure::Unreachable(endpoint.to_string()))
        })
    }

    /// One time-bounded attempt.
    async fn attempt(&self, endpoint: &Url) -> std::result::Result<Duration, ProbeFailure> {
        let start = Instant::now();
        match tokio::time::timeout(self.timeout, self.connect(endpoint)).await {
            Ok(Ok(())) => Ok(start.elapsed()),
            Ok(Err(failure)) => Err(failure),
            Err(_) => Err(ProbeFailure::Timeout(self.timeout)),
        }
    }

    async fn connect(&self, endpoint: &Url) -> std::result::Result<(), ProbeFailure> {
        match endpoint.scheme() {
            "http" | "https" => {
                let response = self
                    .client
                    .head(endpoint.clone())
                    .send()
                    .await
                    .map_err(|e| ProbeFailure::Unreachable(e.to_string()))?;
                let status = response.status();
                if status.is_server_error() {
                    Err(ProbeFailure::Status(status.as_u16()))
                } else {
                    Ok(())
                }
            }
            _ => {
                let host = match endpoint.host() {
                    Some(Host::Domain(domain)) => domain.to_string(),
                    Some(Host::Ipv4(ip)) => ip.to_string(),
                    Some(Host::Ipv6(ip)) => ip.to_string(),
                    None => return Err(ProbeFailure::Unreachable(endpoint.to_string())),
                };
                let port = port_or_default(endpoint).ok_or_else(|| {
                    ProbeFailure::Unreachable(format!("no known port for {endpoint}"))
                })?;
                TcpStream::connect((host.as_str(), port))
                    .await
                    .map(drop)
                    .map_err(|e| ProbeFailure::Unreachable(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Prober for LatencyProber {
    async fn probe(&self, site: &SiteRecord, protocols: &[String]) -> u64 {
        let measurements = join_all(protocols.iter().map(|protocol| async move {
            match site.endpoint(protocol) {
                Some(endpoint) => self.measure_endpoint(endpoint).await,
                None => Err(ProbeFailure::MissingEndpoint(protocol.clone())),
            }
        }))
        .await;

        let mut millis = Vec::with_capacity(measurements.len());
        for (protocol, measurement) in protocols.iter().zip(measurements) {
            match measurement {
                Ok(elapsed) => millis.push(duration_millis(elapsed)),
                Err(failure) => {
                    log::debug!(
                        "Probe of {} over {} failed: {}",
                        site.canonical_host(),
                        protocol,
                        failure
                    );
                    return WORST_SCORE;
                }
            }
        }

        self.aggregation
            .apply(&millis)
            .map_or(WORST_SCORE, |score| score.min(WORST_SCORE - 1))
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(WORST_SCORE - 1)
}
