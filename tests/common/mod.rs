#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mirror_selector::models::{MarkerToken, SiteRecord, WORST_SCORE};
use mirror_selector::services::{DirectoryTokenizer, Prober};
use mirror_selector::utils::http;
use tokio::sync::Semaphore;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub async fn fixture_tokens() -> Vec<MarkerToken> {
    let document = http::load_document(fixture_path("list-full.html"))
        .await
        .expect("fixture should load");
    DirectoryTokenizer::new()
        .unwrap()
        .tokenize(&document)
        .expect("fixture should tokenize")
}

/// Token stream for one site with an https endpoint and the given architectures.
pub fn https_site(host: &str, architectures: &str) -> Vec<MarkerToken> {
    vec![
        MarkerToken::site(host),
        MarkerToken::protocol_link("https", format!("https://{host}/debian/")),
        MarkerToken::Architectures(architectures.to_string()),
    ]
}

/// Scores sites from a fixed table and remembers what it was asked to probe.
/// Hosts missing from the table are unreachable.
pub struct TableProber {
    scores: HashMap<String, u64>,
    gate: Option<Arc<Semaphore>>,
    probed: Mutex<Vec<String>>,
}

impl TableProber {
    pub fn new(scores: &[(&str, u64)]) -> Self {
        Self {
            scores: scores
                .iter()
                .map(|(host, score)| (host.to_string(), *score))
                .collect(),
            gate: None,
            probed: Mutex::new(Vec::new()),
        }
    }

    /// Hold every probe until `gate` has a permit for it.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn probed(&self) -> Vec<String> {
        let mut hosts = self.probed.lock().unwrap().clone();
        hosts.sort();
        hosts
    }
}

#[async_trait]
impl Prober for TableProber {
    async fn probe(&self, site: &SiteRecord, _protocols: &[String]) -> u64 {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let host = site.canonical_host().to_string();
        self.probed.lock().unwrap().push(host.clone());
        self.scores.get(&host).copied().unwrap_or(WORST_SCORE)
    }
}
