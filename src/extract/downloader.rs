//! External downloader processes.
//!
//! Video and short-form downloads are delegated to helper scripts run as
//! child processes. The contract is:
//!
//! - argv: `<script> <locator> <workspace>`
//! - stdout: any number of diagnostic lines, then one JSON line
//! - stderr: discarded
//!
//! Only the last non-empty stdout line is parsed. The payload either
//! declares an `error`, carries a ready `transcript` (platform captions),
//! or points at downloaded media (`audio_path` / `video_path`).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Structured result line emitted by a downloader
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DownloaderPayload {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub audio_path: Option<PathBuf>,
    #[serde(default)]
    pub video_path: Option<PathBuf>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default, rename = "type")]
    pub post_type: Option<String>,
    #[serde(default)]
    pub has_video: Option<bool>,
}

impl DownloaderPayload {
    /// Parse the last non-empty line of downloader output
    pub fn from_output(stdout: &str) -> Result<Self> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .context("Downloader produced no output")?;

        serde_json::from_str(line)
            .with_context(|| format!("Downloader output is not valid JSON: {}", line))
    }

    /// Caption transcript, if the platform provided a non-empty one
    pub fn caption_transcript(&self) -> Option<&str> {
        self.transcript.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Something that downloads a source into a workspace
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `locator` into `workspace`, bounded by `limit`
    async fn download(
        &self,
        locator: &str,
        workspace: &Path,
        limit: Duration,
    ) -> Result<DownloaderPayload>;
}

/// Downloader backed by a helper script run through an interpreter
pub struct ScriptDownloader {
    /// Used in logs and error messages
    name: String,
    /// Interpreter binary (e.g. "python3")
    program: String,
    /// Script passed as the first argument
    script: PathBuf,
}

impl ScriptDownloader {
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        script: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            script: script.into(),
        }
    }
}

#[async_trait]
impl Downloader for ScriptDownloader {
    async fn download(
        &self,
        locator: &str,
        workspace: &Path,
        limit: Duration,
    ) -> Result<DownloaderPayload> {
        debug!(
            downloader = %self.name,
            script = %self.script.display(),
            workspace = %workspace.display(),
            "Spawning downloader"
        );

        let child = Command::new(&self.program)
            .arg(&self.script)
            .arg(locator)
            .arg(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {} downloader", self.name))?;

        // Dropping the wait future on timeout kills the child
        let output = timeout(limit, child.wait_with_output())
            .await
            .with_context(|| format!("{} downloader timed out after {:?}", self.name, limit))?
            .with_context(|| format!("Failed to wait for {} downloader", self.name))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        // A failing script still reports its error as the JSON line
        match DownloaderPayload::from_output(&stdout) {
            Ok(payload) => Ok(payload),
            Err(e) if !output.status.success() => Err(e.context(format!(
                "{} downloader exited with code {}",
                self.name,
                output.status.code().unwrap_or(-1)
            ))),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_line_wins() {
        let stdout =
            "[download] 10%\n[download] 100%\n{\"title\": \"Talk\", \"transcript\": \"hello\"}\n\n";
        let payload = DownloaderPayload::from_output(stdout).unwrap();
        assert_eq!(payload.title.as_deref(), Some("Talk"));
        assert_eq!(payload.caption_transcript(), Some("hello"));
        assert!(payload.audio_path.is_none());
    }

    #[test]
    fn test_nulls_and_post_fields() {
        let stdout =
            r#"{"caption": "hi", "type": "reel", "has_video": true, "video_path": null, "likes": 3}"#;
        let payload = DownloaderPayload::from_output(stdout).unwrap();
        assert_eq!(payload.post_type.as_deref(), Some("reel"));
        assert_eq!(payload.has_video, Some(true));
        assert!(payload.video_path.is_none());
    }

    #[test]
    fn test_error_payload() {
        let payload =
            DownloaderPayload::from_output(r#"{"error": "Failed to download YouTube audio: 404"}"#)
                .unwrap();
        assert_eq!(
            payload.error.as_deref(),
            Some("Failed to download YouTube audio: 404")
        );
    }

    #[test]
    fn test_empty_or_garbage_output() {
        assert!(DownloaderPayload::from_output("").is_err());
        assert!(DownloaderPayload::from_output("\n  \n").is_err());
        assert!(DownloaderPayload::from_output("{\"ok\": 1}\nnot json").is_err());
    }

    #[test]
    fn test_blank_transcript_is_not_a_caption() {
        let payload =
            DownloaderPayload::from_output(r#"{"transcript": "  ", "audio_path": "/tmp/a.mp3"}"#)
                .unwrap();
        assert!(payload.caption_transcript().is_none());
    }
}
