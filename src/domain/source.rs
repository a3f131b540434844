//! Source references handed to the extraction pipeline.
//!
//! A reference names what to extract (`kind`), where it lives (`locator`)
//! and how to fetch it. It is built once per request and dropped when the
//! pipeline invocation returns.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// What kind of content a locator points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Regular web page (static or scripted fetch)
    WebPage,

    /// Long-form video on a video platform
    Video,

    /// Social-platform post that may carry a video
    ShortFormPost,

    /// Audio/video file already on local disk
    UploadedAudio,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::WebPage => write!(f, "web_page"),
            SourceKind::Video => write!(f, "video"),
            SourceKind::ShortFormPost => write!(f, "short_form_post"),
            SourceKind::UploadedAudio => write!(f, "uploaded_audio"),
        }
    }
}

/// Fetch options for a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Render the page in a headless browser instead of parsing raw HTML
    #[serde(default)]
    pub use_scripted_fetch: bool,
}

/// Reference to a piece of content to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    kind: SourceKind,
    locator: String,
    options: FetchOptions,
}

impl SourceReference {
    /// Create a reference with explicit options
    pub fn new(kind: SourceKind, locator: impl Into<String>, options: FetchOptions) -> Self {
        Self {
            kind,
            locator: locator.into(),
            options,
        }
    }

    /// A web page, optionally rendered in a headless browser
    pub fn web_page(url: impl Into<String>, use_scripted_fetch: bool) -> Self {
        Self::new(
            SourceKind::WebPage,
            url,
            FetchOptions { use_scripted_fetch },
        )
    }

    /// A long-form video URL
    pub fn video(url: impl Into<String>) -> Self {
        Self::new(SourceKind::Video, url, FetchOptions::default())
    }

    /// A short-form post URL
    pub fn short_form_post(url: impl Into<String>) -> Self {
        Self::new(SourceKind::ShortFormPost, url, FetchOptions::default())
    }

    /// A local media file
    pub fn uploaded_audio(path: &Path) -> Self {
        Self::new(
            SourceKind::UploadedAudio,
            path.to_string_lossy(),
            FetchOptions::default(),
        )
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn options(&self) -> FetchOptions {
        self.options
    }
}
