//! Shared fakes and helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use nodeflow::adapters::{ChatEngine, InMemoryIdentity, InMemoryProjectStore, SpeechEngine};
use nodeflow::chat::ChatMessage;
use nodeflow::config::{ExtractionSettings, ServerSettings};
use nodeflow::extract::{Downloader, DownloaderPayload, HtmlProfile, PageFetcher, Pipeline};
use nodeflow::server::{router, serve, AppState};

// ─── Speech engine ──────────────────────────────────────────────────

/// Speech engine that records every call
pub struct FakeSpeech {
    reply: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    /// (path, file existed at call time)
    seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeSpeech {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Some("late".to_string()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(PathBuf, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechEngine for FakeSpeech {
    async fn transcribe(&self, media_path: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((media_path.to_path_buf(), media_path.is_file()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => anyhow::bail!("speech engine unavailable"),
        }
    }
}

// ─── Downloader ─────────────────────────────────────────────────────

/// Downloader that optionally drops a media file into the workspace
pub struct FakeDownloader {
    result: std::result::Result<DownloaderPayload, String>,
    media_file: Option<String>,
    workspaces: Mutex<Vec<PathBuf>>,
}

impl FakeDownloader {
    pub fn returning(payload: DownloaderPayload) -> Self {
        Self {
            result: Ok(payload),
            media_file: None,
            workspaces: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            media_file: None,
            workspaces: Mutex::new(Vec::new()),
        }
    }

    /// Write `name` into the workspace before returning
    pub fn with_media(mut self, name: &str) -> Self {
        self.media_file = Some(name.to_string());
        self
    }

    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.workspaces.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        _locator: &str,
        workspace: &Path,
        _limit: Duration,
    ) -> Result<DownloaderPayload> {
        assert!(workspace.is_dir(), "workspace must exist during download");
        self.workspaces.lock().unwrap().push(workspace.to_path_buf());

        if let Some(ref name) = self.media_file {
            tokio::fs::write(workspace.join(name), b"media bytes").await?;
        }

        match &self.result {
            Ok(payload) => Ok(payload.clone()),
            Err(message) => anyhow::bail!("{}", message),
        }
    }
}

// ─── Page fetcher ───────────────────────────────────────────────────

pub struct FakeFetcher {
    html: String,
    profile: HtmlProfile,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn serving(html: &str, profile: HtmlProfile) -> Arc<Self> {
        Arc::new(Self {
            html: html.to_string(),
            profile,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn hanging(profile: HtmlProfile) -> Arc<Self> {
        Arc::new(Self {
            html: String::new(),
            profile,
            delay: Some(Duration::from_secs(30)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    fn profile(&self) -> HtmlProfile {
        self.profile
    }

    async fn fetch(&self, _url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.html.clone())
    }
}

// ─── Chat engine ────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeChat {
    last: Mutex<Vec<ChatMessage>>,
}

impl FakeChat {
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatEngine for FakeChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        *self.last.lock().unwrap() = messages.to_vec();
        Ok(format!("echo: {}", messages.last().map(|m| m.content.as_str()).unwrap_or("")))
    }
}

// ─── Builders ───────────────────────────────────────────────────────

/// Production pipeline with every external collaborator replaced by a fake
pub fn pipeline(uploads: &Path, speech: Arc<dyn SpeechEngine>) -> Pipeline {
    let settings = ExtractionSettings {
        uploads_dir: uploads.to_path_buf(),
        ..Default::default()
    };

    Pipeline::from_config(&settings, speech)
        .unwrap()
        .with_static_fetcher(FakeFetcher::serving(
            "<html><head><title>Static</title></head><body><main>static body</main></body></html>",
            HtmlProfile::Static,
        ))
        .with_scripted_fetcher(FakeFetcher::serving(
            "<html><head><title>Scripted</title></head><body><main>rendered body</main></body></html>",
            HtmlProfile::Scripted,
        ))
        .with_video_downloader(Arc::new(FakeDownloader::failing("no video downloader")))
        .with_post_downloader(Arc::new(FakeDownloader::failing("no post downloader")))
}

/// Number of entries left under the uploads root
pub fn leftover_entries(uploads: &Path) -> usize {
    match std::fs::read_dir(uploads) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

// ─── Server ─────────────────────────────────────────────────────────

pub struct TestApp {
    pub base_url: String,
    pub chat: Arc<FakeChat>,
}

/// Serve the real router with in-memory adapters on an ephemeral port
pub async fn spawn_app(pipeline: Pipeline) -> TestApp {
    let chat = Arc::new(FakeChat::default());
    let state = AppState {
        identity: Arc::new(InMemoryIdentity::new()),
        projects: Arc::new(InMemoryProjectStore::new()),
        chat: chat.clone(),
        pipeline: Arc::new(pipeline),
    };

    let app = router(state, &ServerSettings::default()).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        serve(listener, app).await.unwrap();
    });
    wait_for_server(port).await;

    TestApp {
        base_url: format!("http://127.0.0.1:{}", port),
        chat,
    }
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("Server did not become ready within 5 seconds");
}
