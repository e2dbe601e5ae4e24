//! Mirror site records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use url::Url;

/// Score given to a site that could not be reached. Lower is better.
pub const WORST_SCORE: u64 = u64::MAX;

/// Architectures a site declares it serves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "names", rename_all = "snake_case")]
pub enum ArchitectureSet {
    /// The directory never said; excluded whenever an architecture is required.
    #[default]
    Unknown,

    /// The directory explicitly says every architecture is served.
    All,

    /// An explicit list.
    Listed(BTreeSet<String>),
}

impl ArchitectureSet {
    /// Parse the text following `Includes architectures:`.
    ///
    /// An empty list or the single word `any` is read as [`ArchitectureSet::All`].
    pub fn parse(list: &str) -> Self {
        let names: BTreeSet<String> = list.split_whitespace().map(str::to_string).collect();
        if names.is_empty() || (names.len() == 1 && names.contains("any")) {
            ArchitectureSet::All
        } else {
            ArchitectureSet::Listed(names)
        }
    }

    /// Whether the given architecture is served.
    pub fn serves(&self, arch: &str) -> bool {
        match self {
            ArchitectureSet::Unknown => false,
            ArchitectureSet::All => true,
            ArchitectureSet::Listed(names) => names.contains(arch),
        }
    }
}

/// One mirror entry of the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// Zero-based position in the directory
    pub index: usize,

    /// Country heading the site was listed under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Host names; the first one is canonical
    pub hosts: Vec<String>,

    /// Declared site type (e.g. `leaf`, `Push-Primary`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_type: Option<String>,

    /// Declared architectures
    #[serde(default)]
    pub architectures: ArchitectureSet,

    /// Protocol name (lower-case) to package endpoint
    #[serde(default)]
    pub endpoints: BTreeMap<String, Url>,

    /// Probe score, set exactly once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<u64>,
}

impl SiteRecord {
    /// Open a new record for the given hosts.
    pub fn new(index: usize, country: Option<String>, hosts: Vec<String>) -> Self {
        Self {
            index,
            country,
            hosts,
            site_type: None,
            architectures: ArchitectureSet::Unknown,
            endpoints: BTreeMap::new(),
            score: None,
        }
    }

    /// The canonical host name.
    pub fn canonical_host(&self) -> &str {
        self.hosts.first().map(String::as_str).unwrap_or_default()
    }

    /// Endpoint for a protocol, if the site serves it.
    pub fn endpoint(&self, protocol: &str) -> Option<&Url> {
        self.endpoints.get(protocol)
    }

    /// Whether the site has an endpoint for every listed protocol.
    pub fn serves_protocols<S: AsRef<str>>(&self, protocols: &[S]) -> bool {
        protocols
            .iter()
            .all(|p| self.endpoints.contains_key(p.as_ref()))
    }

    /// The probe score, once assigned.
    pub fn score(&self) -> Option<u64> {
        self.score
    }

    /// Whether the site was scored and reachable.
    pub fn is_reachable(&self) -> bool {
        matches!(self.score, Some(s) if s != WORST_SCORE)
    }

    /// Record the probe score. Only the first write sticks.
    pub fn set_score(&mut self, score: u64) {
        debug_assert!(self.score.is_none(), "site {} scored twice", self.index);
        if self.score.is_none() {
            self.score = Some(score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_site() -> SiteRecord {
        let mut site = SiteRecord::new(
            0,
            Some("Austria".to_string()),
            vec!["ftp.at.debian.org".to_string(), "mirror.example.at".to_string()],
        );
        site.endpoints.insert(
            "https".to_string(),
            Url::parse("https://ftp.at.debian.org/debian/").unwrap(),
        );
        site
    }

    #[test]
    fn test_architecture_parse() {
        let set = ArchitectureSet::parse("amd64  arm64\ti386");
        assert!(set.serves("amd64"));
        assert!(set.serves("i386"));
        assert!(!set.serves("s390x"));

        assert_eq!(ArchitectureSet::parse("   "), ArchitectureSet::All);
        assert_eq!(ArchitectureSet::parse("any"), ArchitectureSet::All);
        assert!(!ArchitectureSet::Unknown.serves("amd64"));
    }

    #[test]
    fn test_canonical_host_is_first() {
        assert_eq!(sample_site().canonical_host(), "ftp.at.debian.org");
    }

    #[test]
    fn test_serves_protocols() {
        let site = sample_site();
        assert!(site.serves_protocols(&["https"]));
        assert!(site.serves_protocols::<&str>(&[]));
        assert!(!site.serves_protocols(&["https", "ftp"]));
    }

    #[test]
    fn test_score_is_unset_until_assigned() {
        let mut site = sample_site();
        assert_eq!(site.score(), None);
        assert!(!site.is_reachable());

        site.set_score(42);
        assert_eq!(site.score(), Some(42));
        assert!(site.is_reachable());
    }

    #[test]
    fn test_worst_score_is_unreachable() {
        let mut site = sample_site();
        site.set_score(WORST_SCORE);
        assert!(!site.is_reachable());
    }
}
