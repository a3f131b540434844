//! Chat and extraction endpoints under `/api`.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::chat::{ChatRequest, ContextSource, HistoryEntry};
use crate::domain::{PlatformResult, PostType, ShortFormPost};
use crate::server::error::{required, ApiError};
use crate::server::AppState;

/// Multipart field carrying the uploaded audio
const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub context_sources: Option<Vec<ContextSource>>,
    #[serde(default)]
    pub system_instruction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body shared by the URL-driven endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlBody {
    #[serde(default)]
    pub url: Option<String>,
    /// Only read by `/api/scrape`
    #[serde(default)]
    pub use_java_script: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TitledText {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub title: String,
    pub text: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub url: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub has_video: bool,
    pub text: String,
    pub title: String,
}

impl From<ShortFormPost> for PostResponse {
    fn from(post: ShortFormPost) -> Self {
        let text = post.text();
        let title = post.title();
        Self {
            caption: post.caption,
            transcript: post.transcript.map(|t| t.text),
            url: post.url,
            post_type: post.post_type,
            has_video: post.has_video,
            text,
            title,
        }
    }
}

/// `POST /api/chat/completions`
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = body?;
    let request = ChatRequest {
        message: required(body.message, "Message is required")?,
        history: body.history.unwrap_or_default(),
        context_sources: body.context_sources.unwrap_or_default(),
        system_instruction: body.system_instruction,
    };

    let response = state
        .chat
        .complete(&request.to_messages())
        .await
        .map_err(|e| {
            error!("Chat completion failed: {:#}", e);
            ApiError::internal("Failed to generate response")
        })?;

    Ok(Json(ChatResponse { response }))
}

/// `POST /api/transcribe`: YouTube or Instagram, picked from the URL
pub async fn transcribe(
    State(state): State<AppState>,
    body: Result<Json<UrlBody>, JsonRejection>,
) -> Result<Json<PlatformResult>, ApiError> {
    let Json(body) = body?;
    let url = required(body.url, "URL is required")?;

    let result = state.pipeline.extract_platform(&url).await?;
    info!(platform = result.platform, url = %url, "Transcribed");

    Ok(Json(result))
}

/// `POST /api/transcribe/youtube`
pub async fn transcribe_youtube(
    State(state): State<AppState>,
    body: Result<Json<UrlBody>, JsonRejection>,
) -> Result<Json<TitledText>, ApiError> {
    let Json(body) = body?;
    let url = required(body.url, "YouTube URL is required")?;

    let video = state.pipeline.transcribe_video(&url).await?;
    Ok(Json(TitledText {
        title: video.title,
        text: video.transcript.text,
    }))
}

/// `POST /api/transcribe/audio`, multipart with an `audio` file field
pub async fn transcribe_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TextResponse>, ApiError> {
    const MISSING: &str = "Audio file is required";
    let mut multipart = multipart.map_err(|_| ApiError::bad_request(MISSING))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(AUDIO_FIELD) {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            upload = Some((file_name, bytes));
            break;
        }
    }

    let (file_name, bytes) = upload
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| ApiError::bad_request(MISSING))?;

    let text = state
        .pipeline
        .transcribe_upload(file_name.as_deref(), &bytes)
        .await?;

    Ok(Json(TextResponse { text }))
}

/// `POST /api/extract/instagram`
pub async fn extract_instagram(
    State(state): State<AppState>,
    body: Result<Json<UrlBody>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    let Json(body) = body?;
    let url = required(body.url, "Instagram URL is required")?;

    let post = state.pipeline.extract_short_form(&url).await?;
    Ok(Json(post.into()))
}

/// `POST /api/scrape`
pub async fn scrape(
    State(state): State<AppState>,
    body: Result<Json<UrlBody>, JsonRejection>,
) -> Result<Json<PageResponse>, ApiError> {
    let Json(body) = body?;
    let url = required(body.url, "URL is required")?;
    let scripted = body.use_java_script.unwrap_or(false);

    let page = state.pipeline.scrape(&url, scripted).await?;
    Ok(Json(PageResponse {
        title: page.title,
        text: page.text,
        url: page.url,
    }))
}
