// src/utils/http.rs

//! HTTP client and document loading utilities.

use std::path::Path;

use scraper::Html;
use url::Url;

use crate::error::Result;
use crate::models::ProbeConfig;

/// Create a configured asynchronous HTTP client.
///
/// Redirects are not followed so a probe measures the mirror itself.
pub fn create_async_client(config: &ProbeConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    Ok(client)
}

/// Create a client for downloading the directory page itself.
pub fn create_fetch_client(config: &ProbeConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .build()?;
    Ok(client)
}

/// Fetch the mirror directory and parse it as HTML.
pub async fn fetch_document(client: &reqwest::Client, url: Url) -> Result<Html> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(Html::parse_document(&text))
}

/// Read a locally saved copy of the mirror directory.
pub async fn load_document(path: impl AsRef<Path>) -> Result<Html> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(Html::parse_document(&text))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_create_async_client() {
        assert!(create_async_client(&ProbeConfig::default()).is_ok());
        assert!(create_fetch_client(&ProbeConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_load_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<html><body><div id=\"content\"><h3>Austria</h3></div></body></html>")
            .unwrap();

        let document = load_document(file.path()).await.unwrap();
        assert!(document.html().contains("Austria"));
    }

    #[tokio::test]
    async fn test_load_document_missing_file() {
        assert!(load_document("/nonexistent/list-full.html").await.is_err());
    }
}
