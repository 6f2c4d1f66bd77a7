//! Cover image retrieval
//!
//! Remote thumbnails referenced by NFO `<thumb>` elements are downloaded
//! best-effort: a timeout, transport error or non-success status only drops
//! that image. Every image (local or remote) is handed to the catalog as a
//! `data:image/jpeg;base64,...` URI whatever its actual format.

use crate::types::ImageFetcher;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::time::Duration;
use tracing::debug;

/// MIME prefix used for every encoded image
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Encode raw image bytes as a `data:` URI
pub fn encode_data_uri(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(bytes)))
}

/// HTTP image fetcher
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "Failed to download cover image");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "Cover image download refused");
            return None;
        }

        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                debug!(url = %url, error = %e, "Failed to read cover image body");
                None
            }
        }
    }
}

/// Fetcher that never downloads anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImageFetcher;

#[async_trait]
impl ImageFetcher for NoImageFetcher {
    async fn fetch(&self, _url: &str) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_data_uri() {
        assert_eq!(
            encode_data_uri(b"abc").as_deref(),
            Some("data:image/jpeg;base64,YWJj")
        );
        assert_eq!(encode_data_uri(&[]), None);
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_none() {
        let fetcher = HttpImageFetcher::new(Duration::from_millis(200)).unwrap();
        assert_eq!(fetcher.fetch("http://127.0.0.1:9/cover.jpg").await, None);
    }
}
