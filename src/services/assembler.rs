// src/services/assembler.rs

//! Record assembler.
//!
//! Rebuilds one [`SiteRecord`] per `Site:` marker from the flat token
//! stream. Every protocol, architecture and type marker belongs to the most
//! recently opened site; a new `Site:` closes the previous one and the end of
//! the stream closes the last.

use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ArchitectureSet, Companion, MarkerToken, SiteRecord};
use crate::utils::url::{absolute_url, from_host_path, with_scheme};

/// Streaming adapter from marker tokens to site records.
///
/// Yields records in directory order. After the first error it yields
/// nothing more.
pub struct RecordAssembler<I> {
    tokens: I,
    open: Option<SiteRecord>,
    country: Option<String>,
    next_index: usize,
    finished: bool,
}

impl<I> RecordAssembler<I>
where
    I: Iterator<Item = MarkerToken>,
{
    /// Wrap a token sequence.
    pub fn new<T>(tokens: T) -> Self
    where
        T: IntoIterator<Item = MarkerToken, IntoIter = I>,
    {
        Self {
            tokens: tokens.into_iter(),
            open: None,
            country: None,
            next_index: 0,
            finished: false,
        }
    }

    /// Apply one token; returns the record it closed, if any.
    fn apply(&mut self, token: MarkerToken) -> Result<Option<SiteRecord>> {
        match token {
            MarkerToken::Country(name) => {
                self.country = Some(name);
                Ok(None)
            }
            MarkerToken::SiteStart(companion) => {
                let hosts = parse_hosts(companion)?;
                let record = SiteRecord::new(self.next_index, self.country.clone(), hosts);
                self.next_index += 1;
                Ok(self.open.replace(record))
            }
            MarkerToken::ProtocolUrl {
                protocol,
                companion,
            } => {
                let protocol = protocol.trim().to_lowercase();
                let site = self.open_record("ProtocolURL")?;
                let endpoint = resolve_endpoint(&protocol, companion, site.canonical_host())?;
                site.endpoints.insert(protocol, endpoint);
                Ok(None)
            }
            MarkerToken::Architectures(list) => {
                self.open_record("Architectures")?.architectures = ArchitectureSet::parse(&list);
                Ok(None)
            }
            MarkerToken::Type(kind) => {
                self.open_record("Type")?.site_type = Some(kind.trim().to_string());
                Ok(None)
            }
            MarkerToken::Plain => Ok(None),
        }
    }

    fn open_record(&mut self, kind: &str) -> Result<&mut SiteRecord> {
        let index = self.next_index;
        self.open.as_mut().ok_or_else(|| {
            AppError::malformed(format!(
                "{kind} marker before any Site marker (site #{index})"
            ))
        })
    }
}

impl<I> Iterator for RecordAssembler<I>
where
    I: Iterator<Item = MarkerToken>,
{
    type Item = Result<SiteRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let Some(token) = self.tokens.next() else {
                self.finished = true;
                return self.open.take().map(Ok);
            };

            match self.apply(token) {
                Ok(Some(closed)) => return Some(Ok(closed)),
                Ok(None) => continue,
                Err(e) => {
                    self.finished = true;
                    self.open = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Assemble every record, failing on the first structural error.
pub fn assemble<T>(tokens: T) -> Result<Vec<SiteRecord>>
where
    T: IntoIterator<Item = MarkerToken>,
{
    RecordAssembler::new(tokens).collect()
}

fn parse_hosts(companion: Option<Companion>) -> Result<Vec<String>> {
    let text = match companion {
        Some(Companion::Teletype { text, .. }) => text,
        Some(Companion::Other(found)) => {
            return Err(AppError::malformed(format!(
                "Site marker followed by {found:?} instead of a <tt> host list"
            )));
        }
        None => return Err(AppError::malformed("Site marker without a host list")),
    };

    let hosts: Vec<String> = text
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect();

    if hosts.is_empty() {
        return Err(AppError::malformed("Site marker with an empty host list"));
    }
    Ok(hosts)
}

fn resolve_endpoint(protocol: &str, companion: Option<Companion>, host: &str) -> Result<Url> {
    let (text, href) = match companion {
        Some(Companion::Teletype { text, href }) => (text, href),
        Some(Companion::Other(found)) => {
            return Err(AppError::malformed(format!(
                "Packages over {protocol} followed by {found:?} instead of a <tt> URL"
            )));
        }
        None => {
            return Err(AppError::malformed(format!(
                "Packages over {protocol} without a URL"
            )));
        }
    };

    let explicit = href
        .as_deref()
        .and_then(absolute_url)
        .or_else(|| absolute_url(&text));

    let resolved = match explicit {
        Some(url) => with_scheme(url, protocol),
        None => from_host_path(protocol, host, &text),
    };
    resolved.map_err(|e| {
        AppError::malformed(format!(
            "cannot build {protocol} endpoint for {host} from {text:?}: {e}"
        ))
    })
}
