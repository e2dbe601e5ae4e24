//! Classified units of the mirror directory document.

/// The document node that immediately follows a `Site:` or
/// `Packages over ...:` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Companion {
    /// A `<tt>` element: its inner text and the `href` of its first link.
    Teletype { text: String, href: Option<String> },

    /// Any other node, kept as text for error reporting.
    Other(String),
}

impl Companion {
    /// Build a teletype companion without a link.
    pub fn teletype(text: impl Into<String>) -> Self {
        Self::Teletype {
            text: text.into(),
            href: None,
        }
    }

    /// Build a teletype companion wrapping a link.
    pub fn link(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self::Teletype {
            text: text.into(),
            href: Some(href.into()),
        }
    }
}

/// A marker (or filler) token, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerToken {
    /// Country heading
    Country(String),

    /// `Site:` marker with its host-list companion
    SiteStart(Option<Companion>),

    /// `Packages over <protocol>:` marker with its endpoint companion
    ProtocolUrl {
        protocol: String,
        companion: Option<Companion>,
    },

    /// `Includes architectures:` marker, with the text after the prefix
    Architectures(String),

    /// `Type:` marker, with the text after the prefix
    Type(String),

    /// Anything else (line breaks, stray text)
    Plain,
}

impl MarkerToken {
    /// Short label used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MarkerToken::Country(_) => "Country",
            MarkerToken::SiteStart(_) => "SiteStart",
            MarkerToken::ProtocolUrl { .. } => "ProtocolURL",
            MarkerToken::Architectures(_) => "Architectures",
            MarkerToken::Type(_) => "Type",
            MarkerToken::Plain => "Plain",
        }
    }

    /// `SiteStart` with a teletype host list.
    pub fn site(hosts: impl Into<String>) -> Self {
        MarkerToken::SiteStart(Some(Companion::teletype(hosts)))
    }

    /// `ProtocolURL` with a linked URL.
    pub fn protocol_link(protocol: impl Into<String>, href: impl Into<String>) -> Self {
        let href = href.into();
        MarkerToken::ProtocolUrl {
            protocol: protocol.into(),
            companion: Some(Companion::link(href.clone(), href)),
        }
    }

    /// `ProtocolURL` with plain teletype text (rsync style).
    pub fn protocol_text(protocol: impl Into<String>, text: impl Into<String>) -> Self {
        MarkerToken::ProtocolUrl {
            protocol: protocol.into(),
            companion: Some(Companion::teletype(text)),
        }
    }
}
