//! External-content extraction pipeline.
//!
//! Given a [`SourceReference`], the pipeline picks a strategy, runs it under
//! that strategy's wall-clock limit, optionally transcribes downloaded media,
//! and normalizes everything into `{title, text, url}`.
//!
//! | kind                   | strategy                  | secondary step           |
//! |------------------------|---------------------------|--------------------------|
//! | WebPage                | [`StaticFetcher`]         | none                     |
//! | WebPage (scripted)     | [`BrowserFetcher`]        | none                     |
//! | Video                  | video [`Downloader`]      | speech, unless captions  |
//! | ShortFormPost          | post [`Downloader`]       | speech, sentinel on fail |
//! | UploadedAudio          | none                      | speech (required)        |
//!
//! Download strategies run inside a [`Workspace`] that is released before
//! the call returns, whatever the outcome.

pub mod downloader;
pub mod normalize;
pub mod platform;
pub mod web;
pub mod workspace;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::adapters::SpeechEngine;
use crate::config::{ExtractionSettings, StrategyTimeouts};
use crate::domain::{
    ExtractionResult, Platform, PlatformResult, PostType, ShortFormPost, SourceKind,
    SourceReference, TranscriptOutcome, TranscriptSource, VideoTranscript,
};

pub use downloader::{Downloader, DownloaderPayload, ScriptDownloader};
pub use normalize::{normalize_html, HtmlProfile, NormalizedPage};
pub use platform::detect_platform;
pub use web::{BrowserFetcher, PageFetcher, StaticFetcher};
pub use workspace::Workspace;

/// Title used when the video downloader reports none
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Pipeline failures, mapped onto HTTP statuses by the server
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Locator does not match the claimed source kind
    #[error("{0}")]
    InvalidSource(String),

    #[error("Unsupported platform. Please provide a YouTube or Instagram URL.")]
    UnsupportedPlatform,

    /// Fetch, download, or transcription failed or timed out
    #[error("{0}")]
    Upstream(String),
}

fn upstream(what: &str, err: anyhow::Error) -> ExtractError {
    ExtractError::Upstream(format!("{}: {:#}", what, err))
}

/// The extraction pipeline
pub struct Pipeline {
    static_fetcher: Arc<dyn PageFetcher>,
    scripted_fetcher: Arc<dyn PageFetcher>,
    video_downloader: Arc<dyn Downloader>,
    post_downloader: Arc<dyn Downloader>,
    speech: Arc<dyn SpeechEngine>,
    uploads_dir: PathBuf,
    timeouts: StrategyTimeouts,
}

impl Pipeline {
    /// Build the production pipeline from settings
    pub fn from_config(
        settings: &ExtractionSettings,
        speech: Arc<dyn SpeechEngine>,
    ) -> anyhow::Result<Self> {
        let static_fetcher = StaticFetcher::new(settings.timeouts.static_fetch)?;

        Ok(Self {
            static_fetcher: Arc::new(static_fetcher),
            scripted_fetcher: Arc::new(BrowserFetcher::new(settings.browser_bin.clone())),
            video_downloader: Arc::new(ScriptDownloader::new(
                "youtube",
                settings.python_bin.clone(),
                settings.video_downloader_script(),
            )),
            post_downloader: Arc::new(ScriptDownloader::new(
                "instagram",
                settings.python_bin.clone(),
                settings.post_downloader_script(),
            )),
            speech,
            uploads_dir: settings.uploads_dir.clone(),
            timeouts: settings.timeouts,
        })
    }

    pub fn with_static_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.static_fetcher = fetcher;
        self
    }

    pub fn with_scripted_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.scripted_fetcher = fetcher;
        self
    }

    pub fn with_video_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.video_downloader = downloader;
        self
    }

    pub fn with_post_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.post_downloader = downloader;
        self
    }

    pub fn with_timeouts(mut self, timeouts: StrategyTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Run the strategy for `source` and normalize its output
    #[instrument(skip(self, source), fields(kind = %source.kind(), locator = %source.locator()))]
    pub async fn extract(
        &self,
        source: &SourceReference,
    ) -> Result<ExtractionResult, ExtractError> {
        let locator = source.locator();

        match source.kind() {
            SourceKind::WebPage => {
                self.scrape(locator, source.options().use_scripted_fetch)
                    .await
            }
            SourceKind::Video => {
                let video = self.transcribe_video(locator).await?;
                Ok(ExtractionResult {
                    has_secondary_media: video.transcript.source == TranscriptSource::SpeechEngine,
                    title: video.title,
                    text: video.transcript.text,
                    url: video.url,
                })
            }
            SourceKind::ShortFormPost => {
                let post = self.extract_short_form(locator).await?;
                Ok(ExtractionResult {
                    title: post.title(),
                    text: post.text(),
                    has_secondary_media: post.transcript.is_some(),
                    url: post.url,
                })
            }
            SourceKind::UploadedAudio => {
                let path = Path::new(locator);
                let text = self.transcribe_file(path).await?;
                Ok(ExtractionResult {
                    title: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| locator.to_string()),
                    text,
                    url: locator.to_string(),
                    has_secondary_media: false,
                })
            }
        }
    }

    /// Fetch a web page (static or scripted) and extract its readable text
    pub async fn scrape(
        &self,
        url: &str,
        scripted: bool,
    ) -> Result<ExtractionResult, ExtractError> {
        if !platform::is_web_url(url) {
            return Err(ExtractError::InvalidSource(format!("Invalid URL: {}", url)));
        }

        let (fetcher, limit) = if scripted {
            (&self.scripted_fetcher, self.timeouts.scripted_fetch)
        } else {
            (&self.static_fetcher, self.timeouts.static_fetch)
        };

        debug!(url = %url, scripted, "Scraping page");

        let html = timeout(limit, fetcher.fetch(url))
            .await
            .with_context(|| format!("timed out after {}s", limit.as_secs()))
            .and_then(|fetched| fetched)
            .map_err(|e| upstream("Failed to scrape webpage", e))?;

        let page = normalize_html(&html, fetcher.profile());
        info!(url = %url, title = %page.title, chars = page.text.len(), "Scraped page");

        Ok(ExtractionResult {
            title: page.title,
            text: page.text,
            url: url.to_string(),
            has_secondary_media: false,
        })
    }

    /// Transcript of a long-form video, from captions when the platform has them
    pub async fn transcribe_video(&self, url: &str) -> Result<VideoTranscript, ExtractError> {
        if !platform::is_youtube(url) {
            return Err(ExtractError::InvalidSource("Invalid YouTube URL".to_string()));
        }

        let workspace = self.workspace(Platform::YouTube.as_str()).await?;
        let outcome = self.run_video(url, workspace.path()).await;
        workspace.release().await;

        outcome.map_err(|e| upstream("Failed to transcribe YouTube video", e))
    }

    async fn run_video(&self, url: &str, workspace: &Path) -> anyhow::Result<VideoTranscript> {
        let payload = self
            .video_downloader
            .download(url, workspace, self.timeouts.video)
            .await?;

        if let Some(error) = payload.error.as_deref() {
            anyhow::bail!("{}", error);
        }

        let title = payload
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let transcript = if let Some(captions) = payload.caption_transcript() {
            info!(title = %title, "Using platform captions");
            TranscriptOutcome::captions(captions)
        } else if let Some(audio) = payload.audio_path.as_deref() {
            info!(title = %title, "No captions, transcribing downloaded audio");
            let text = self.speech_to_text(&workspace.join(audio)).await?;
            TranscriptOutcome::speech(text)
        } else {
            anyhow::bail!("No transcript or audio path returned from YouTube downloader");
        };

        Ok(VideoTranscript {
            title,
            url: url.to_string(),
            transcript,
        })
    }

    /// Caption and metadata of a short-form post, plus a transcript of its video
    ///
    /// A failed video transcription does not fail the extraction; the
    /// transcript becomes the failure sentinel instead.
    pub async fn extract_short_form(&self, url: &str) -> Result<ShortFormPost, ExtractError> {
        if !platform::is_instagram(url) {
            return Err(ExtractError::InvalidSource(
                "Invalid Instagram URL".to_string(),
            ));
        }

        let workspace = self.workspace(Platform::Instagram.as_str()).await?;
        let outcome = self.run_short_form(url, workspace.path()).await;
        workspace.release().await;

        outcome.map_err(|e| upstream("Failed to extract Instagram content", e))
    }

    async fn run_short_form(&self, url: &str, workspace: &Path) -> anyhow::Result<ShortFormPost> {
        let payload = self
            .post_downloader
            .download(url, workspace, self.timeouts.short_form)
            .await?;

        if let Some(error) = payload.error.as_deref() {
            anyhow::bail!("{}", error);
        }

        let has_video = payload.has_video.unwrap_or(false);
        let transcript = match (has_video, payload.video_path.as_deref()) {
            (true, Some(video)) => match self.speech_to_text(&workspace.join(video)).await {
                Ok(text) => Some(TranscriptOutcome::speech(text)),
                Err(e) => {
                    warn!("Video transcription failed, using placeholder: {:#}", e);
                    Some(TranscriptOutcome::failed())
                }
            },
            _ => None,
        };

        let post_type = payload
            .post_type
            .as_deref()
            .and_then(|t| t.parse::<PostType>().ok())
            .unwrap_or_default();

        Ok(ShortFormPost {
            caption: payload.caption.unwrap_or_default(),
            transcript,
            url: url.to_string(),
            post_type,
            has_video,
        })
    }

    /// Transcribe a local media file
    pub async fn transcribe_file(&self, path: &Path) -> Result<String, ExtractError> {
        let is_file = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ExtractError::InvalidSource(format!(
                "Audio file not found: {}",
                path.display()
            )));
        }

        self.speech_to_text(path)
            .await
            .map_err(|e| upstream("Failed to transcribe audio", e))
    }

    /// Store uploaded bytes in a fresh workspace, transcribe them, and clean up
    pub async fn transcribe_upload(
        &self,
        file_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, ExtractError> {
        let workspace = self.workspace("audio").await?;
        let path = workspace.path().join(upload_file_name(file_name));

        let outcome = match tokio::fs::write(&path, bytes).await {
            Ok(()) => self.transcribe_file(&path).await,
            Err(e) => Err(ExtractError::Upstream(format!(
                "Failed to store uploaded audio: {}",
                e
            ))),
        };
        workspace.release().await;

        outcome
    }

    /// Unified entry point: dispatch a URL to the platform it names
    pub async fn extract_platform(&self, url: &str) -> Result<PlatformResult, ExtractError> {
        match detect_platform(url) {
            Some(Platform::YouTube) => Ok(self.transcribe_video(url).await?.into()),
            Some(Platform::Instagram) => Ok(self.extract_short_form(url).await?.into()),
            None => Err(ExtractError::UnsupportedPlatform),
        }
    }

    async fn speech_to_text(&self, media: &Path) -> anyhow::Result<String> {
        let limit = self.timeouts.transcription;
        timeout(limit, self.speech.transcribe(media))
            .await
            .with_context(|| format!("Transcription timed out after {}s", limit.as_secs()))?
    }

    async fn workspace(&self, prefix: &str) -> Result<Workspace, ExtractError> {
        Workspace::create(&self.uploads_dir, prefix)
            .await
            .map_err(|e| ExtractError::Upstream(format!("Failed to create workspace: {}", e)))
    }
}

/// Name for an uploaded file inside its workspace; keeps only a safe extension
fn upload_file_name(original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match extension {
        Some(ext) => format!("upload.{}", ext),
        None => "upload".to_string(),
    }
}
