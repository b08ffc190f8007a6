use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetches raw bytes for a URL. The engine never talks to the network
/// directly; tests substitute an in-memory implementation.
pub trait Downloader: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("plugpack/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("failed to fetch {url}"))?;

        if !response.status().is_success() {
            bail!("HTTP {} from {url}", response.status());
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read response body from {url}"))?;
        Ok(bytes.to_vec())
    }
}
