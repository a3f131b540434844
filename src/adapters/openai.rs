//! OpenAI-compatible API client.
//!
//! Implements [`ChatEngine`] via `POST /chat/completions` and
//! [`SpeechEngine`] via `POST /audio/transcriptions` (multipart upload).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatEngine, SpeechEngine};
use crate::chat::ChatMessage;
use crate::config::OpenAiSettings;

/// Sampling temperature for chat completions
pub const CHAT_TEMPERATURE: f32 = 0.7;

/// Output cap for chat completions
pub const CHAT_MAX_TOKENS: u32 = 2000;

/// Reply used when the engine returns no content
const EMPTY_REPLY: &str = "No response generated";

/// OpenAI API client
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    chat_model: String,
    speech_model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiClient {
    /// Create a client from settings
    pub fn new(settings: &OpenAiSettings, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            chat_model: settings.chat_model.clone(),
            speech_model: settings.speech_model.clone(),
            client,
        })
    }

    /// Build API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-success response into an error carrying the API's message
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        anyhow::bail!("OpenAI API error ({}): {}", status, message.trim())
    }
}

#[async_trait]
impl ChatEngine for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.chat_model,
            messages,
            temperature: CHAT_TEMPERATURE,
            max_tokens: CHAT_MAX_TOKENS,
        };

        debug!(model = %self.chat_model, messages = messages.len(), "Requesting chat completion");

        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let completion: ChatCompletionResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string()))
    }
}

#[async_trait]
impl SpeechEngine for OpenAiClient {
    async fn transcribe(&self, media_path: &Path) -> Result<String> {
        let file_name = media_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let file = tokio::fs::File::open(media_path)
            .await
            .with_context(|| format!("Failed to open media file: {}", media_path.display()))?;
        let size = file
            .metadata()
            .await
            .with_context(|| format!("Failed to stat media file: {}", media_path.display()))?
            .len();

        debug!(file = %file_name, bytes = size, "Streaming media for transcription");

        let part = Part::stream_with_length(Body::from(file), size).file_name(file_name);
        let form = Form::new()
            .text("model", self.speech_model.clone())
            .part("file", part);

        let response = self
            .client
            .post(self.api_url("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to send transcription request")?;

        let transcription: TranscriptionResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse transcription response")?;

        Ok(transcription.text)
    }
}
