//! Script Downloader Integration Tests
//!
//! Runs real child processes (`sh` scripts standing in for the Python
//! downloaders) to check the argv/stdout contract, exit handling, and
//! timeouts.

#![cfg(unix)]

mod common;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use common::{leftover_entries, FakeSpeech};
use nodeflow::config::{ExtractionSettings, StrategyTimeouts};
use nodeflow::domain::TranscriptSource;
use nodeflow::extract::{Downloader, Pipeline, ScriptDownloader};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    path
}

#[tokio::test]
async fn test_arguments_and_last_line() {
    let scripts = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let script = write_script(
        scripts.path(),
        "echo.sh",
        r#"echo "[download] starting"
echo "[download] 100%"
printf '{"title": "%s", "audio_path": "%s/audio.mp3"}\n' "$1" "$2""#,
    );

    let downloader = ScriptDownloader::new("youtube", "sh", script);
    let payload = downloader
        .download("https://youtu.be/abc123", workspace.path(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(payload.title.as_deref(), Some("https://youtu.be/abc123"));
    assert_eq!(
        payload.audio_path,
        Some(workspace.path().join("audio.mp3"))
    );
}

#[tokio::test]
async fn test_failing_script_still_reports_error_payload() {
    let scripts = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let script = write_script(
        scripts.path(),
        "fail.sh",
        r#"echo '{"error": "Private account"}'
exit 1"#,
    );

    let payload = ScriptDownloader::new("instagram", "sh", script)
        .download("https://instagram.com/p/x", workspace.path(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(payload.error.as_deref(), Some("Private account"));
}

#[tokio::test]
async fn test_silent_crash_reports_exit_code() {
    let scripts = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let script = write_script(scripts.path(), "crash.sh", "echo oops >&2\nexit 3");

    let err = ScriptDownloader::new("youtube", "sh", script)
        .download("https://youtu.be/x", workspace.path(), Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("exited with code 3"));
}

#[tokio::test]
async fn test_timeout_kills_the_process() {
    let scripts = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let script = write_script(scripts.path(), "hang.sh", "sleep 30\necho '{}'");

    let started = Instant::now();
    let err = ScriptDownloader::new("youtube", "sh", script)
        .download("https://youtu.be/x", workspace.path(), Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_missing_interpreter() {
    let workspace = TempDir::new().unwrap();
    let err = ScriptDownloader::new("youtube", "/nonexistent/python3", "script.py")
        .download("https://youtu.be/x", workspace.path(), Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Failed to spawn youtube downloader"));
}

#[tokio::test]
async fn test_pipeline_wires_scripts_from_settings() {
    let scripts = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();

    // Downloads an "audio file" and reports it without captions
    write_script(
        scripts.path(),
        "youtube_downloader.py",
        r#"echo "data" > "$2/audio.mp3"
printf '{"title": "Wired", "audio_path": "%s/audio.mp3"}\n' "$2""#,
    );

    let settings = ExtractionSettings {
        uploads_dir: uploads.path().to_path_buf(),
        scripts_dir: scripts.path().to_path_buf(),
        python_bin: "sh".to_string(),
        ..Default::default()
    };
    let speech = FakeSpeech::replying("spoken");
    let pipeline = Pipeline::from_config(&settings, speech.clone()).unwrap();

    let video = pipeline
        .transcribe_video("https://youtu.be/abc123")
        .await
        .unwrap();

    assert_eq!(video.title, "Wired");
    assert_eq!(video.transcript.source, TranscriptSource::SpeechEngine);
    assert!(speech.seen()[0].1);
    assert_eq!(leftover_entries(uploads.path()), 0);
}

#[tokio::test]
async fn test_post_download_timeout_removes_workspace() {
    let scripts = TempDir::new().unwrap();
    let uploads = TempDir::new().unwrap();

    // Leaves a partial file behind, then hangs
    write_script(
        scripts.path(),
        "instagram_downloader.py",
        r#"echo "partial" > "$2/clip.mp4.part"
sleep 30"#,
    );

    let settings = ExtractionSettings {
        uploads_dir: uploads.path().to_path_buf(),
        scripts_dir: scripts.path().to_path_buf(),
        python_bin: "sh".to_string(),
        ..Default::default()
    };
    let pipeline = Pipeline::from_config(&settings, FakeSpeech::replying("x"))
        .unwrap()
        .with_timeouts(StrategyTimeouts {
            short_form: Duration::from_millis(300),
            ..Default::default()
        });

    let started = Instant::now();
    let err = pipeline
        .extract_short_form("https://www.instagram.com/reel/abc")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(leftover_entries(uploads.path()), 0);
}

fn shipped_script(relative: &Path) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
fn test_shipped_scripts_exist_at_default_paths() {
    let settings = ExtractionSettings::default();
    assert!(shipped_script(&settings.video_downloader_script()).is_file());
    assert!(shipped_script(&settings.post_downloader_script()).is_file());
}

#[tokio::test]
async fn test_shipped_post_script_reports_errors_as_json() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }

    let workspace = TempDir::new().unwrap();
    let script = shipped_script(&ExtractionSettings::default().post_downloader_script());

    let payload = ScriptDownloader::new("instagram", "python3", script)
        .download(
            "https://instagram.com/stories/someone",
            workspace.path(),
            Duration::from_secs(30),
        )
        .await
        .unwrap();

    assert_eq!(
        payload.error.as_deref(),
        Some("Unsupported Instagram URL: https://instagram.com/stories/someone")
    );
}
