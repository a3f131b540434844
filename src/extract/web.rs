//! Page fetchers for the web strategies.
//!
//! - [`StaticFetcher`]: plain HTTP GET, no JavaScript
//! - [`BrowserFetcher`]: headless Chromium run as a child process with
//!   `--dump-dom`, so client-rendered pages come back as their final DOM
//!
//! Fetchers only return HTML. Text extraction happens in
//! [`super::normalize`] for both.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::normalize::HtmlProfile;

/// Browser-like User-Agent for static fetches
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Fetches a page and returns its HTML
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Which elements the normalizer strips from this fetcher's output
    fn profile(&self) -> HtmlProfile;

    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP fetcher
pub struct StaticFetcher {
    client: reqwest::Client,
}

impl StaticFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    fn profile(&self) -> HtmlProfile {
        HtmlProfile::Static
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }
}

/// Headless-browser fetcher
///
/// Each fetch starts its own browser process and the process is killed when
/// the fetch future is dropped, so a timed-out or failed fetch never leaves
/// a browser behind.
pub struct BrowserFetcher {
    binary: String,
}

impl BrowserFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn profile(&self) -> HtmlProfile {
        HtmlProfile::Scripted
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url = %url, browser = %self.binary, "Rendering page in headless browser");

        let output = Command::new(&self.binary)
            .args([
                "--headless",
                "--disable-gpu",
                "--no-sandbox",
                "--user-agent",
                USER_AGENT,
                "--dump-dom",
                url,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to launch browser '{}'", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Browser exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
