// src/pipeline/dispatch.rs

//! Probe dispatcher.
//!
//! Walks the assembled sites, filters them against the policy and starts
//! one probe task per candidate. Every creation is acknowledged by the
//! accumulator before the task is spawned, so a score can never arrive
//! ahead of its creation count.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{SelectionPolicy, SiteRecord, WORST_SCORE};
use crate::pipeline::channels::DispatchHandles;
use crate::services::{Prober, filter};

/// Counts reported by a finished dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Sites read from the record stream
    pub examined: usize,
    /// Sites that matched the policy and got a probe task
    pub dispatched: usize,
}

impl DispatchSummary {
    pub fn filtered_out(&self) -> usize {
        self.examined - self.dispatched
    }
}

/// Starts bounded probe tasks for matching sites.
pub struct Dispatcher {
    policy: Arc<SelectionPolicy>,
    prober: Arc<dyn Prober>,
    limiter: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// `max_concurrent` caps probes in flight; zero is treated as one.
    pub fn new(
        policy: Arc<SelectionPolicy>,
        prober: Arc<dyn Prober>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            policy,
            prober,
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that, once cancelled, makes pending probes report the worst score.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Dispatch every matching site, then signal "no more work".
    ///
    /// Returns once the last task is created; probes keep running and
    /// report to the accumulator on their own.
    pub async fn dispatch<I>(self, sites: I, handles: DispatchHandles) -> Result<DispatchSummary>
    where
        I: IntoIterator<Item = SiteRecord>,
    {
        let DispatchHandles {
            created,
            finished,
            scores,
        } = handles;
        let mut summary = DispatchSummary::default();

        for site in sites {
            summary.examined += 1;
            if !filter::matches(&site, &self.policy) {
                log::trace!("Skipping {}: does not match policy", site.canonical_host());
                continue;
            }

            let (ack_tx, ack_rx) = oneshot::channel();
            created.send(ack_tx).await.map_err(|_| {
                AppError::pipeline("dispatcher", "accumulator closed before creation")
            })?;
            ack_rx.await.map_err(|_| {
                AppError::pipeline("dispatcher", "creation was not acknowledged")
            })?;

            log::debug!("Probing {} (#{})", site.canonical_host(), site.index);
            summary.dispatched += 1;
            tokio::spawn(score_site(
                site,
                Arc::clone(&self.prober),
                Arc::clone(&self.policy),
                Arc::clone(&self.limiter),
                self.cancel.clone(),
                scores.clone(),
            ));
        }

        finished.send(()).map_err(|_| {
            AppError::pipeline("dispatcher", "accumulator closed before completion")
        })?;

        log::debug!(
            "Dispatched {} of {} sites",
            summary.dispatched,
            summary.examined
        );
        Ok(summary)
    }
}

/// One probe task: wait for a slot, probe, hand the scored site over.
async fn score_site(
    mut site: SiteRecord,
    prober: Arc<dyn Prober>,
    policy: Arc<SelectionPolicy>,
    limiter: Arc<Semaphore>,
    cancel: CancellationToken,
    scores: mpsc::Sender<SiteRecord>,
) {
    let score = tokio::select! {
        biased;
        _ = cancel.cancelled() => WORST_SCORE,
        score = measure(&site, prober.as_ref(), &policy.protocols, &limiter) => score,
    };
    site.set_score(score);

    let index = site.index;
    if scores.send(site).await.is_err() {
        log::warn!("Accumulator closed; dropped score for site #{index}");
    }
}

async fn measure(
    site: &SiteRecord,
    prober: &dyn Prober,
    protocols: &[String],
    limiter: &Semaphore,
) -> u64 {
    match limiter.acquire().await {
        Ok(_permit) => prober.probe(site, protocols).await,
        Err(_) => WORST_SCORE,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::models::ArchitectureSet;
    use crate::pipeline::channels::channels;

    fn site(index: usize, arch: &str, protocols: &[&str]) -> SiteRecord {
        let host = format!("mirror{index}.example.org");
        let mut site = SiteRecord::new(index, Some("Testland".into()), vec![host.clone()]);
        site.architectures = ArchitectureSet::parse(arch);
        for protocol in protocols {
            let url = Url::parse(&format!("{protocol}://{host}/debian/")).unwrap();
            site.endpoints.insert(protocol.to_string(), url);
        }
        site
    }

    fn policy() -> Arc<SelectionPolicy> {
        Arc::new(SelectionPolicy::new("stable", "amd64", &["https"]))
    }

    /// Blocks every probe until the test adds permits to `gate`.
    struct GatedProber {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Prober for GatedProber {
        async fn probe(&self, site: &SiteRecord, _protocols: &[String]) -> u64 {
            let _permit = self.gate.acquire().await.unwrap();
            100 - site.index as u64
        }
    }

    /// Records the highest number of probes running at once.
    #[derive(Default)]
    struct CountingProber {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, site: &SiteRecord, _protocols: &[String]) -> u64 {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            site.index as u64
        }
    }

    struct SleepyProber;

    #[async_trait]
    impl Prober for SleepyProber {
        async fn probe(&self, _site: &SiteRecord, _protocols: &[String]) -> u64 {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            1
        }
    }

    #[tokio::test]
    async fn test_creations_acknowledged_before_any_score() {
        let gate = Arc::new(Semaphore::new(0));
        let prober = Arc::new(GatedProber { gate: Arc::clone(&gate) });
        let (handles, mut inbox) = channels(8);
        let dispatcher = Dispatcher::new(policy(), prober, 4);

        let sites = vec![
            site(0, "amd64", &["https"]),
            site(1, "amd64", &["https"]),
            site(2, "amd64", &["https"]),
        ];
        let dispatch = tokio::spawn(dispatcher.dispatch(sites, handles));

        for _ in 0..3 {
            let ack = inbox.created.recv().await.unwrap();
            ack.send(()).unwrap();
        }
        (&mut inbox.finished).await.unwrap();
        let summary = dispatch.await.unwrap().unwrap();
        assert_eq!(summary.dispatched, 3);

        // Probes are still gated, so nothing has been scored yet.
        assert!(inbox.scores.try_recv().is_err());

        gate.add_permits(3);
        let mut indices = Vec::new();
        for _ in 0..3 {
            let scored = inbox.scores.recv().await.unwrap();
            assert_eq!(scored.score(), Some(100 - scored.index as u64));
            indices.push(scored.index);
        }
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_non_matching_sites_are_not_probed() {
        let gate = Arc::new(Semaphore::new(10));
        let prober = Arc::new(GatedProber { gate });
        let (handles, mut inbox) = channels(8);
        let dispatcher = Dispatcher::new(policy(), prober, 4);

        let sites = vec![
            site(0, "amd64", &["https"]),
            site(1, "arm64", &["https"]),
            site(2, "amd64", &["rsync"]),
            {
                let mut unknown = site(3, "amd64", &["https"]);
                unknown.architectures = ArchitectureSet::Unknown;
                unknown
            },
            site(4, "any", &["https", "rsync"]),
        ];
        let dispatch = tokio::spawn(dispatcher.dispatch(sites, handles));

        let mut created = 0;
        while let Some(ack) = inbox.created.recv().await {
            ack.send(()).unwrap();
            created += 1;
        }
        let summary = dispatch.await.unwrap().unwrap();
        assert_eq!(created, 2);
        assert_eq!(
            summary,
            DispatchSummary {
                examined: 5,
                dispatched: 2
            }
        );
        assert_eq!(summary.filtered_out(), 3);

        let mut indices = vec![
            inbox.scores.recv().await.unwrap().index,
            inbox.scores.recv().await.unwrap().index,
        ];
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 4]);
    }

    #[tokio::test]
    async fn test_probes_respect_concurrency_limit() {
        let prober = Arc::new(CountingProber::default());
        let (handles, inbox) = channels(2);
        let dispatcher = Dispatcher::new(policy(), Arc::clone(&prober) as Arc<dyn Prober>, 2);

        let sites: Vec<_> = (0..8).map(|i| site(i, "amd64", &["https"])).collect();
        let dispatch = tokio::spawn(dispatcher.dispatch(sites, handles));
        let ranked = crate::pipeline::Accumulator::new().run(inbox).await.unwrap();
        dispatch.await.unwrap().unwrap();

        assert_eq!(ranked.len(), 8);
        assert!(prober.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancelled_probes_report_worst_score() {
        let (handles, inbox) = channels(4);
        let dispatcher = Dispatcher::new(policy(), Arc::new(SleepyProber), 4);
        let cancel = dispatcher.cancellation();

        let sites: Vec<_> = (0..3).map(|i| site(i, "amd64", &["https"])).collect();
        let dispatch = tokio::spawn(dispatcher.dispatch(sites, handles));
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let ranked = crate::pipeline::Accumulator::new().run(inbox).await.unwrap();
        dispatch.await.unwrap().unwrap();
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|s| s.score() == Some(WORST_SCORE)));
        assert_eq!(
            ranked.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_dispatch_fails_without_accumulator() {
        let (handles, inbox) = channels(4);
        drop(inbox);
        let dispatcher = Dispatcher::new(policy(), Arc::new(SleepyProber), 4);

        let err = dispatcher
            .dispatch(vec![site(0, "amd64", &["https"])], handles)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Pipeline { .. }));
    }
}
