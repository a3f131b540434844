//! Values produced by the extraction pipeline.

use serde::{Deserialize, Serialize};

/// Text substituted for a secondary transcription that failed
pub const TRANSCRIPTION_FAILED: &str = "[Transcription failed]";

/// Title used when a short-form post has no caption
pub const UNTITLED_POST: &str = "Instagram Post";

/// Max characters of a post caption used as its title
const POST_TITLE_CHARS: usize = 100;

/// Normalized output of one strategy execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub title: String,
    pub text: String,
    pub url: String,

    /// A media file was pulled down alongside the primary document
    pub has_secondary_media: bool,
}

/// Where a transcript came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// Platform-provided captions, no speech engine call
    CaptionsReused,

    /// Speech-to-text engine output
    SpeechEngine,

    /// Secondary transcription failed; text is the sentinel
    Failed,
}

/// Transcript text tagged with its origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptOutcome {
    pub text: String,
    pub source: TranscriptSource,
}

impl TranscriptOutcome {
    pub fn captions(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: TranscriptSource::CaptionsReused,
        }
    }

    pub fn speech(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: TranscriptSource::SpeechEngine,
        }
    }

    /// The sentinel outcome for a swallowed transcription failure
    pub fn failed() -> Self {
        Self {
            text: TRANSCRIPTION_FAILED.to_string(),
            source: TranscriptSource::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.source == TranscriptSource::Failed
    }
}

/// Transcript of a long-form video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTranscript {
    pub title: String,
    pub url: String,
    pub transcript: TranscriptOutcome,
}

/// Kind of short-form post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    #[default]
    Post,
    Reel,
    Video,
}

impl std::str::FromStr for PostType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "post" => Ok(PostType::Post),
            "reel" => Ok(PostType::Reel),
            "video" => Ok(PostType::Video),
            _ => anyhow::bail!("Unknown post type: {}", s),
        }
    }
}

/// Extracted short-form post (caption plus optional video transcript)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortFormPost {
    pub caption: String,
    pub transcript: Option<TranscriptOutcome>,
    pub url: String,
    pub post_type: PostType,
    pub has_video: bool,
}

impl ShortFormPost {
    /// Caption, followed by the video transcript when there is a non-empty one
    pub fn text(&self) -> String {
        match (&self.transcript, self.has_video) {
            (Some(transcript), true) if !transcript.text.is_empty() => format!(
                "{}\n\n[Video Transcript]\n{}",
                self.caption, transcript.text
            ),
            _ => self.caption.clone(),
        }
    }

    /// Leading part of the caption, or a placeholder for empty captions
    pub fn title(&self) -> String {
        if self.caption.is_empty() {
            UNTITLED_POST.to_string()
        } else {
            self.caption.chars().take(POST_TITLE_CHARS).collect()
        }
    }
}

/// Platform recognised by the unified transcription entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    YouTube,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the unified entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformResult {
    pub platform: &'static str,
    pub title: String,
    pub text: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_video: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub post_type: Option<PostType>,
}

impl From<VideoTranscript> for PlatformResult {
    fn from(video: VideoTranscript) -> Self {
        Self {
            platform: Platform::YouTube.as_str(),
            title: video.title,
            text: video.transcript.text,
            url: video.url,
            has_video: None,
            post_type: None,
        }
    }
}

impl From<ShortFormPost> for PlatformResult {
    fn from(post: ShortFormPost) -> Self {
        Self {
            platform: Platform::Instagram.as_str(),
            title: post.title(),
            text: post.text(),
            has_video: Some(post.has_video),
            post_type: Some(post.post_type),
            url: post.url,
        }
    }
}
