// src/utils/url.rs

//! URL manipulation utilities for mirror endpoints.

use url::{ParseError, Position, Url};

/// Well-known ports for schemes the `url` crate has no default for.
const EXTRA_DEFAULT_PORTS: &[(&str, u16)] = &[("rsync", 873)];

/// Parse `text` as an absolute URL with a host.
///
/// # Examples
/// ```
/// use mirror_selector::utils::url::absolute_url;
///
/// assert!(absolute_url("http://ftp.de.debian.org/debian/").is_some());
/// assert!(absolute_url("ftp.de.debian.org::debian/").is_none());
/// ```
pub fn absolute_url(text: &str) -> Option<Url> {
    let text = text.trim();
    if !text.contains("://") {
        return None;
    }
    Url::parse(text)
        .ok()
        .filter(|u| u.host_str().is_some_and(|h| !h.is_empty()))
}

/// Rewrite the scheme of `url`, keeping everything after it.
///
/// `Url::set_scheme` refuses to move between special and non-special
/// schemes (e.g. `http` to `rsync`), so fall back to re-parsing.
pub fn with_scheme(mut url: Url, scheme: &str) -> Result<Url, ParseError> {
    if url.scheme() == scheme || url.set_scheme(scheme).is_ok() {
        return Ok(url);
    }
    Url::parse(&format!("{}://{}", scheme, &url[Position::BeforeUsername..]))
}

/// Build `<scheme>://<host>/<path>` from a bare path as listed in the
/// directory. rsync `host::module/path` notation yields `module/path`.
///
/// # Examples
/// ```
/// use mirror_selector::utils::url::from_host_path;
///
/// let url = from_host_path("rsync", "ftp.at.debian.org", "ftp.at.debian.org::debian/").unwrap();
/// assert_eq!(url.as_str(), "rsync://ftp.at.debian.org/debian/");
/// ```
pub fn from_host_path(scheme: &str, host: &str, path: &str) -> Result<Url, ParseError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ParseError::EmptyHost);
    }
    let path = path.trim();
    let path = path.split_once("::").map_or(path, |(_, module)| module);
    Url::parse(&format!(
        "{}://{}/{}",
        scheme,
        host,
        path.trim_start_matches('/')
    ))
}

/// Port to connect to for an endpoint.
pub fn port_or_default(url: &Url) -> Option<u16> {
    url.port_or_known_default().or_else(|| {
        EXTRA_DEFAULT_PORTS
            .iter()
            .find(|(scheme, _)| *scheme == url.scheme())
            .map(|(_, port)| *port)
    })
}
