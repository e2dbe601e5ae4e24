// src/services/tokenizer.rs

//! Mirror directory tokenizer.
//!
//! Walks the direct children of `div#content` in the Debian `list-full`
//! page and classifies each node as a [`MarkerToken`]. Markers that take a
//! companion (`Site:` and `Packages over ...:`) swallow the next
//! non-blank node.

use std::iter::Peekable;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{AppError, Result};
use crate::models::{Companion, MarkerToken};

const CONTENT_SELECTOR: &str = "div#content";
const LINK_SELECTOR: &str = "a[href]";
const PROTOCOL_MARKER: &str = r"^Packages over\s+([A-Za-z][A-Za-z0-9+.\-]*)\s*:$";

const SITE_MARKER: &str = "Site:";
const ARCH_PREFIX: &str = "Includes architectures:";
const TYPE_PREFIX: &str = "Type:";

/// A document node stripped down to what classification needs.
#[derive(Debug)]
enum RawNode {
    Text(String),
    Element {
        name: String,
        text: String,
        href: Option<String>,
    },
    Other,
}

impl RawNode {
    fn is_blank(&self) -> bool {
        matches!(self, RawNode::Text(text) if text.trim().is_empty())
    }

    fn into_companion(self) -> Companion {
        match self {
            RawNode::Element { name, text, href } if name == "tt" => Companion::Teletype {
                text: text.trim().to_string(),
                href,
            },
            RawNode::Element { text, .. } | RawNode::Text(text) => Companion::Other(text),
            RawNode::Other => Companion::Other(String::new()),
        }
    }
}

/// Turns the HTML mirror directory into marker tokens.
pub struct DirectoryTokenizer {
    content: Selector,
    link: Selector,
    protocol_marker: Regex,
}

impl DirectoryTokenizer {
    /// Create a tokenizer for the Debian `list-full` layout.
    pub fn new() -> Result<Self> {
        Ok(Self {
            content: parse_selector(CONTENT_SELECTOR)?,
            link: parse_selector(LINK_SELECTOR)?,
            protocol_marker: Regex::new(PROTOCOL_MARKER)
                .map_err(|e| AppError::config(format!("protocol marker pattern: {e}")))?,
        })
    }

    /// Lazily tokenize a parsed directory document.
    ///
    /// Fails only when the document has no `div#content`.
    pub fn tokens<'a>(
        &'a self,
        document: &'a Html,
    ) -> Result<impl Iterator<Item = MarkerToken> + 'a> {
        let content = document
            .select(&self.content)
            .next()
            .ok_or_else(|| AppError::malformed("document has no div#content"))?;

        let mut nodes = content
            .children()
            .map(move |node| match node.value() {
                Node::Text(text) => RawNode::Text(text.to_string()),
                Node::Element(_) => ElementRef::wrap(node)
                    .map(|element| self.raw_element(element))
                    .unwrap_or(RawNode::Other),
                _ => RawNode::Other,
            })
            .peekable();

        Ok(std::iter::from_fn(move || {
            let node = nodes.next()?;
            Some(self.classify(node, &mut nodes))
        }))
    }

    /// Tokenize eagerly.
    pub fn tokenize(&self, document: &Html) -> Result<Vec<MarkerToken>> {
        Ok(self.tokens(document)?.collect())
    }

    fn raw_element(&self, element: ElementRef<'_>) -> RawNode {
        let name = element.value().name().to_string();
        let href = if name == "a" {
            element.value().attr("href")
        } else {
            element
                .select(&self.link)
                .next()
                .and_then(|a| a.value().attr("href"))
        };
        RawNode::Element {
            text: element.text().collect(),
            href: href.map(str::to_string),
            name,
        }
    }

    fn classify<I>(&self, node: RawNode, rest: &mut Peekable<I>) -> MarkerToken
    where
        I: Iterator<Item = RawNode>,
    {
        match node {
            RawNode::Element { name, text, .. } if name == "h3" => {
                MarkerToken::Country(text.trim().to_string())
            }
            RawNode::Text(text) => {
                let text = text.trim();
                if text == SITE_MARKER {
                    MarkerToken::SiteStart(take_companion(rest))
                } else if let Some(caps) = self.protocol_marker.captures(text) {
                    MarkerToken::ProtocolUrl {
                        protocol: caps[1].to_lowercase(),
                        companion: take_companion(rest),
                    }
                } else if let Some(list) = text.strip_prefix(ARCH_PREFIX) {
                    MarkerToken::Architectures(list.trim().to_string())
                } else if let Some(kind) = text.strip_prefix(TYPE_PREFIX) {
                    MarkerToken::Type(kind.trim().to_string())
                } else {
                    MarkerToken::Plain
                }
            }
            _ => MarkerToken::Plain,
        }
    }
}

fn take_companion<I>(rest: &mut Peekable<I>) -> Option<Companion>
where
    I: Iterator<Item = RawNode>,
{
    while rest.next_if(RawNode::is_blank).is_some() {}
    rest.next().map(RawNode::into_companion)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(body: &str) -> Result<Vec<MarkerToken>> {
        let html = format!("<html><body><div id=\"content\">{body}</div></body></html>");
        let document = Html::parse_document(&html);
        DirectoryTokenizer::new()?.tokenize(&document)
    }

    fn markers(body: &str) -> Vec<MarkerToken> {
        tokenize(body)
            .unwrap()
            .into_iter()
            .filter(|t| *t != MarkerToken::Plain)
            .collect()
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_missing_content_is_malformed() {
        let document = Html::parse_document("<html><body><p>nothing</p></body></html>");
        let err = DirectoryTokenizer::new()
            .unwrap()
            .tokenize(&document)
            .unwrap_err();
        assert!(err.is_malformed_directory());
    }

    #[test]
    fn test_country_and_site() {
        let tokens = markers(
            "<h3><a name=\"AT\">Austria</a></h3>\n\
             Site: <tt>ftp.at.debian.org, mirror.at.example</tt><br>\n",
        );
        assert_eq!(
            tokens,
            vec![
                MarkerToken::Country("Austria".to_string()),
                MarkerToken::site("ftp.at.debian.org, mirror.at.example"),
            ]
        );
    }

    #[test]
    fn test_protocol_with_link() {
        let tokens = markers(
            "Packages over HTTP: <tt><a rel=\"nofollow\" href=\"http://ftp.at.debian.org/debian/\">\
             http://ftp.at.debian.org/debian/</a></tt><br>",
        );
        assert_eq!(
            tokens,
            vec![MarkerToken::ProtocolUrl {
                protocol: "http".to_string(),
                companion: Some(Companion::link(
                    "http://ftp.at.debian.org/debian/",
                    "http://ftp.at.debian.org/debian/"
                )),
            }]
        );
    }

    #[test]
    fn test_protocol_rsync_text() {
        let tokens = markers("Packages over rsync: <tt>ftp.at.debian.org::debian/</tt><br>");
        assert_eq!(
            tokens,
            vec![MarkerToken::protocol_text("rsync", "ftp.at.debian.org::debian/")]
        );
    }

    #[test]
    fn test_architectures_and_type() {
        let tokens = markers(
            "Type: Push-Primary<br>\nIncludes architectures: amd64 arm64 i386<br>",
        );
        assert_eq!(
            tokens,
            vec![
                MarkerToken::Type("Push-Primary".to_string()),
                MarkerToken::Architectures("amd64 arm64 i386".to_string()),
            ]
        );
    }

    #[test]
    fn test_site_without_teletype_companion() {
        let tokens = markers("Site: <b>bold.example.org</b>");
        assert_eq!(
            tokens,
            vec![MarkerToken::SiteStart(Some(Companion::Other(
                "bold.example.org".to_string()
            )))]
        );
    }

    #[test]
    fn test_site_at_end_of_document() {
        let tokens = markers("Site:\n");
        assert_eq!(tokens, vec![MarkerToken::SiteStart(None)]);
    }

    #[test]
    fn test_other_text_is_plain() {
        let tokens = tokenize("Some introduction text<br><p>more</p>").unwrap();
        assert!(tokens.iter().all(|t| *t == MarkerToken::Plain));
    }
}
