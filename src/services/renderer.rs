// src/services/renderer.rs

//! sources.list rendering.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{OutputConfig, SelectionPolicy, SiteRecord, WORST_SCORE};

/// Schemes apt can fetch packages over, in fallback order.
const APT_SCHEMES: &[&str] = &["https", "http", "ftp"];

const FREE_COMPONENTS: &str = "main";
const NONFREE_COMPONENTS: &str = "main contrib non-free non-free-firmware";

/// Renders the ranked selection as an apt `sources.list`.
pub struct SourcesListRenderer<'a> {
    policy: &'a SelectionPolicy,
    output: &'a OutputConfig,
}

impl<'a> SourcesListRenderer<'a> {
    pub fn new(policy: &'a SelectionPolicy, output: &'a OutputConfig) -> Self {
        Self { policy, output }
    }

    /// Components written after the release name.
    pub fn components(&self) -> &'static str {
        if self.policy.include_nonfree {
            NONFREE_COMPONENTS
        } else {
            FREE_COMPONENTS
        }
    }

    /// The endpoint apt should use for a site.
    ///
    /// Prefers the policy protocols in order, then any apt-capable endpoint.
    pub fn apt_endpoint<'s>(&self, site: &'s SiteRecord) -> Option<&'s Url> {
        self.policy
            .protocols
            .iter()
            .map(String::as_str)
            .chain(APT_SCHEMES.iter().copied())
            .filter(|p| APT_SCHEMES.contains(p))
            .find_map(|p| site.endpoint(p))
    }

    /// Sites that make it into the file, best first.
    pub fn chosen<'s>(&self, ranked: &'s [SiteRecord]) -> Vec<(&'s SiteRecord, &'s Url)> {
        ranked
            .iter()
            .filter(|site| !self.output.skip_unreachable || site.is_reachable())
            .filter_map(|site| self.apt_endpoint(site).map(|url| (site, url)))
            .take(self.output.limit)
            .collect()
    }

    /// Render with the current time in the header.
    pub fn render(&self, ranked: &[SiteRecord]) -> Result<String> {
        self.render_at(ranked, Utc::now())
    }

    /// Render with a fixed generation time.
    pub fn render_at(&self, ranked: &[SiteRecord], generated: DateTime<Utc>) -> Result<String> {
        let chosen = self.chosen(ranked);
        if chosen.is_empty() {
            return Err(AppError::validation(format!(
                "none of the {} ranked mirrors can be written to sources.list",
                ranked.len()
            )));
        }

        let mut out = String::new();
        let _ = writeln!(
            out,
            "# Generated by mirror-selector on {}",
            generated.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(
            out,
            "# release: {}, architecture: {}, protocols: {}",
            self.policy.release,
            self.policy.architecture,
            self.policy.protocols.join(",")
        );

        for (site, url) in chosen {
            out.push('\n');
            let _ = writeln!(
                out,
                "# {} ({}, score {})",
                site.canonical_host(),
                site.country.as_deref().unwrap_or("unknown country"),
                describe_score(site.score())
            );
            let _ = writeln!(
                out,
                "deb {} {} {}",
                url,
                self.policy.release,
                self.components()
            );
            if self.policy.include_source_packages {
                let _ = writeln!(
                    out,
                    "deb-src {} {} {}",
                    url,
                    self.policy.release,
                    self.components()
                );
            }
        }
        Ok(out)
    }

    /// Render and write to `path`. Returns the number of mirrors written.
    pub async fn write(&self, ranked: &[SiteRecord], path: impl AsRef<Path>) -> Result<usize> {
        let content = self.render(ranked)?;
        let count = self.chosen(ranked).len();
        tokio::fs::write(path, content).await?;
        Ok(count)
    }
}

fn describe_score(score: Option<u64>) -> String {
    match score {
        Some(WORST_SCORE) => "unreachable".to_string(),
        Some(score) => score.to_string(),
        None => "unscored".to_string(),
    }
}
