//! Where the talent tree dataset comes from
//!
//! The dataset is a JSON array with one object per specialization. The store
//! only needs "give me the current document"; tests substitute a stub.

use crate::core::error::{HashError, Result};
use reqwest::blocking::Client;
use std::time::Duration;

/// Supplier of the raw talent tree dataset
pub trait MetadataSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<serde_json::Value>>;
}

/// Blocking HTTP client for the published talents.json
pub struct HttpMetadataSource {
    client: Client,
    url: String,
}

impl HttpMetadataSource {
    /// Create a client for `url` with a bounded request time
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HashError::MetadataUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl MetadataSource for HttpMetadataSource {
    fn fetch(&self) -> Result<Vec<serde_json::Value>> {
        let response = self
            .client
            .get(&self.url)
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .send()
            .map_err(|e| HashError::MetadataUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HashError::MetadataUnavailable(format!(
                "GET {} returned {}",
                self.url,
                response.status()
            )));
        }

        response
            .json::<Vec<serde_json::Value>>()
            .map_err(|e| HashError::MetadataUnavailable(format!("invalid talents.json: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let source =
            HttpMetadataSource::new("https://example.com/talents.json", Duration::from_secs(5))
                .unwrap();
        assert_eq!(source.url(), "https://example.com/talents.json");
    }

    #[test]
    fn test_unreachable_host_is_metadata_error() {
        // Port 9 on loopback is the discard port; nothing listens there in CI
        let source = HttpMetadataSource::new("http://127.0.0.1:9/talents.json", Duration::from_secs(2))
            .unwrap();
        assert!(matches!(
            source.fetch(),
            Err(HashError::MetadataUnavailable(_))
        ));
    }
}
