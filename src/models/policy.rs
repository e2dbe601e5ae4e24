//! Selection policy: what the caller is looking for.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Criteria and output flags for a single run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// Release suite or code name written into `sources.list` (e.g. `stable`)
    pub release: String,

    /// Architecture the mirror must serve (e.g. `amd64`)
    pub architecture: String,

    /// Protocols the mirror must serve, lower-case, in preference order
    pub protocols: Vec<String>,

    /// Add the non-free components
    #[serde(default)]
    pub include_nonfree: bool,

    /// Add `deb-src` lines
    #[serde(default)]
    pub include_source_packages: bool,
}

impl SelectionPolicy {
    /// Build a policy, normalising the protocol list.
    pub fn new<S: AsRef<str>>(
        release: impl Into<String>,
        architecture: impl Into<String>,
        protocols: &[S],
    ) -> Self {
        Self {
            release: release.into(),
            architecture: architecture.into(),
            protocols: normalize_protocols(protocols.iter().map(AsRef::as_ref)),
            include_nonfree: false,
            include_source_packages: false,
        }
    }

    /// Enable or disable non-free components.
    pub fn with_nonfree(mut self, include: bool) -> Self {
        self.include_nonfree = include;
        self
    }

    /// Enable or disable `deb-src` lines.
    pub fn with_source_packages(mut self, include: bool) -> Self {
        self.include_source_packages = include;
        self
    }

    /// Validate policy values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.release.trim().is_empty() {
            return Err(AppError::validation("release is empty"));
        }
        if self.architecture.trim().is_empty() {
            return Err(AppError::validation("architecture is empty"));
        }
        if self.protocols.is_empty() {
            return Err(AppError::validation("at least one protocol is required"));
        }
        Ok(())
    }
}

/// Parse a comma separated protocol list such as `https,FTP`.
pub fn parse_protocols(list: &str) -> Vec<String> {
    normalize_protocols(list.split(','))
}

fn normalize_protocols<'a>(protocols: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in protocols {
        let p = p.trim().to_lowercase();
        if !p.is_empty() && !out.contains(&p) {
            out.push(p);
        }
    }
    out
}
