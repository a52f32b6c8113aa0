use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::{core::config::ArchiveLoadingConfig, MapError, Result};

/// Shared async HTTP client used when no custom loading config is given.
/// Building the client once avoids the cost of TLS and connection pool setup
/// for every archive.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    build_client(&ArchiveLoadingConfig::default()).expect("failed to build reqwest async client")
});

fn build_client(config: &ArchiveLoadingConfig) -> Result<reqwest::Client> {
    let builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
    #[cfg(not(target_arch = "wasm32"))]
    let builder = builder.timeout(config.timeout());
    Ok(builder.build()?)
}

/// Anything that can turn an archive URL into the archive's bytes.
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches archives with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: ArchiveLoadingConfig,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
            config: ArchiveLoadingConfig::default(),
        }
    }

    pub fn with_config(config: ArchiveLoadingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(&config)?,
            config,
        })
    }

    pub fn config(&self) -> &ArchiveLoadingConfig {
        &self.config
    }

    fn check_len(&self, url: &str, len: u64) -> Result<()> {
        if self.config.accepts_len(len) {
            Ok(())
        } else {
            Err(MapError::Archive(format!(
                "archive at {} is {} bytes, over the {} byte limit",
                url,
                len,
                self.config.max_archive_bytes.unwrap_or_default()
            )))
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("fetching archive {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(len) = response.content_length() {
            self.check_len(url, len)?;
        }

        let bytes = response.bytes().await?;
        self.check_len(url, bytes.len() as u64)?;

        log::info!("downloaded archive {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_check() {
        let fetcher = HttpFetcher::with_config(ArchiveLoadingConfig {
            max_archive_bytes: Some(4),
            ..Default::default()
        })
        .unwrap();

        assert!(fetcher.check_len("http://example.test/a.mbtiles", 4).is_ok());
        let err = fetcher
            .check_len("http://example.test/a.mbtiles", 5)
            .unwrap_err();
        assert!(matches!(err, MapError::Archive(_)));
    }

    #[tokio::test]
    async fn test_relative_url_is_an_error() {
        let fetcher = HttpFetcher::new();
        let err = fetcher.fetch("asset/light_all.mbtiles").await.unwrap_err();
        assert!(matches!(err, MapError::Network(_)));
    }
}
