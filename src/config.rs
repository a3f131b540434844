//! Configuration for nodeflow.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (a `.env` file is loaded into the environment
//!    by `main` before anything reads it)
//! 2. Config file (.nodeflow/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .nodeflow/config.yaml
//! - Paths in config file are relative to the directory containing .nodeflow/
//!
//! Secrets (API keys) are only read from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    pub port: Option<u16>,
    pub environment: Option<String>,
    pub frontend_url: Option<String>,
    pub max_upload_mb: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiConfig {
    pub base_url: Option<String>,
    pub chat_model: Option<String>,
    pub speech_model: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionConfig {
    pub uploads_dir: Option<String>,
    pub scripts_dir: Option<String>,
    pub python_bin: Option<String>,
    pub browser_bin: Option<String>,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeoutsConfig {
    pub static_fetch_seconds: Option<u64>,
    pub scripted_fetch_seconds: Option<u64>,
    pub video_seconds: Option<u64>,
    pub short_form_seconds: Option<u64>,
    pub transcription_seconds: Option<u64>,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
    /// `development`, `production`, ...
    pub environment: String,
    /// Allowed CORS origin and OAuth callback base
    pub frontend_url: String,
    /// Request body cap for audio uploads
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 3001,
            environment: "development".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Supabase project settings
#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    pub url: String,
    pub anon_key: Option<String>,
    pub service_key: Option<String>,
    /// Applies to every GoTrue and PostgREST call, token checks included
    pub request_timeout_seconds: u64,
}

impl Default for SupabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: None,
            service_key: None,
            request_timeout_seconds: 15,
        }
    }
}

/// OpenAI-compatible API settings
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub speech_model: String,
    pub request_timeout_seconds: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            speech_model: "whisper-1".to_string(),
            request_timeout_seconds: 300,
        }
    }
}

/// Wall-clock limits per extraction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyTimeouts {
    pub static_fetch: Duration,
    pub scripted_fetch: Duration,
    pub video: Duration,
    pub short_form: Duration,
    pub transcription: Duration,
}

impl Default for StrategyTimeouts {
    fn default() -> Self {
        Self {
            static_fetch: Duration::from_secs(10),
            scripted_fetch: Duration::from_secs(30),
            video: Duration::from_secs(300),
            short_form: Duration::from_secs(120),
            transcription: Duration::from_secs(300),
        }
    }
}

/// Extraction pipeline settings
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    /// Root for per-invocation workspaces
    pub uploads_dir: PathBuf,
    /// Directory holding the downloader scripts
    pub scripts_dir: PathBuf,
    pub python_bin: String,
    /// Headless browser used for scripted fetches
    pub browser_bin: String,
    pub timeouts: StrategyTimeouts,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            scripts_dir: PathBuf::from("scripts"),
            python_bin: "python3".to_string(),
            browser_bin: "chromium".to_string(),
            timeouts: StrategyTimeouts::default(),
        }
    }
}

impl ExtractionSettings {
    pub fn video_downloader_script(&self) -> PathBuf {
        self.scripts_dir.join("youtube_downloader.py")
    }

    pub fn post_downloader_script(&self) -> PathBuf {
        self.scripts_dir.join("instagram_downloader.py")
    }
}

/// Resolved configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerSettings,
    pub supabase: SupabaseSettings,
    pub openai: OpenAiSettings,
    pub extraction: ExtractionSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".nodeflow").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Parse a numeric env value, naming the variable on failure
fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", name, v))
        })
        .transpose()
}

impl Config {
    /// Load configuration from the process environment and the discovered config file
    pub fn load() -> Result<Self> {
        let file = match find_config_file() {
            Some(path) => {
                let parsed = load_config_file(&path)?;
                Some((path, parsed))
            }
            None => None,
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merge an optional parsed config file with an environment lookup
    pub fn from_sources<F>(file: Option<(PathBuf, ConfigFile)>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let (config_file, file) = match file {
            Some((path, parsed)) => (Some(path), parsed),
            None => (None, ConfigFile::default()),
        };

        // Base directory is the parent of .nodeflow/ (i.e., grandparent of config.yaml)
        let base_dir = config_file
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::parent)
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let server_defaults = ServerSettings::default();
        let server = ServerSettings {
            port: parse_var("PORT", env("PORT"))?
                .or(file.server.port)
                .unwrap_or(server_defaults.port),
            environment: env("NODE_ENV")
                .or_else(|| env("APP_ENV"))
                .or(file.server.environment)
                .unwrap_or(server_defaults.environment),
            frontend_url: env("FRONTEND_URL")
                .or(file.server.frontend_url)
                .unwrap_or(server_defaults.frontend_url),
            max_upload_bytes: parse_var::<usize>("MAX_UPLOAD_MB", env("MAX_UPLOAD_MB"))?
                .or(file.server.max_upload_mb)
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(server_defaults.max_upload_bytes),
        };

        let supabase = SupabaseSettings {
            url: env("SUPABASE_URL").or(file.supabase.url).unwrap_or_default(),
            anon_key: env("SUPABASE_ANON_KEY"),
            service_key: env("SUPABASE_SERVICE_KEY"),
            request_timeout_seconds: file
                .supabase
                .request_timeout_seconds
                .unwrap_or(SupabaseSettings::default().request_timeout_seconds),
        };

        let openai_defaults = OpenAiSettings::default();
        let openai = OpenAiSettings {
            api_key: env("OPENAI_API_KEY"),
            base_url: env("OPENAI_BASE_URL")
                .or(file.openai.base_url)
                .unwrap_or(openai_defaults.base_url),
            chat_model: env("OPENAI_CHAT_MODEL")
                .or(file.openai.chat_model)
                .unwrap_or(openai_defaults.chat_model),
            speech_model: env("OPENAI_SPEECH_MODEL")
                .or(file.openai.speech_model)
                .unwrap_or(openai_defaults.speech_model),
            request_timeout_seconds: file
                .openai
                .request_timeout_seconds
                .unwrap_or(openai_defaults.request_timeout_seconds),
        };

        let extraction_defaults = ExtractionSettings::default();
        let resolve_dir = |env_key: &str, from_file: Option<String>, default: PathBuf| {
            if let Some(value) = env(env_key) {
                PathBuf::from(value)
            } else if let Some(value) = from_file {
                resolve_path(&base_dir, &value)
            } else {
                default
            }
        };

        let timeouts = file.extraction.timeouts;
        let timeout_defaults = StrategyTimeouts::default();
        let seconds =
            |v: Option<u64>, default: Duration| v.map(Duration::from_secs).unwrap_or(default);

        let extraction = ExtractionSettings {
            uploads_dir: resolve_dir(
                "UPLOADS_DIR",
                file.extraction.uploads_dir,
                extraction_defaults.uploads_dir,
            ),
            scripts_dir: resolve_dir(
                "SCRIPTS_DIR",
                file.extraction.scripts_dir,
                extraction_defaults.scripts_dir,
            ),
            python_bin: env("PYTHON_BIN")
                .or(file.extraction.python_bin)
                .unwrap_or(extraction_defaults.python_bin),
            browser_bin: env("BROWSER_BIN")
                .or(file.extraction.browser_bin)
                .unwrap_or(extraction_defaults.browser_bin),
            timeouts: StrategyTimeouts {
                static_fetch: seconds(timeouts.static_fetch_seconds, timeout_defaults.static_fetch),
                scripted_fetch: seconds(
                    timeouts.scripted_fetch_seconds,
                    timeout_defaults.scripted_fetch,
                ),
                video: seconds(timeouts.video_seconds, timeout_defaults.video),
                short_form: seconds(timeouts.short_form_seconds, timeout_defaults.short_form),
                transcription: seconds(
                    timeouts.transcription_seconds,
                    timeout_defaults.transcription,
                ),
            },
        };

        Ok(Config {
            server,
            supabase,
            openai,
            extraction,
            config_file,
        })
    }

    pub fn is_production(&self) -> bool {
        self.server.environment == "production"
    }

    /// OpenAI key, required to serve
    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai
            .api_key
            .as_deref()
            .context("OPENAI_API_KEY is not set")
    }

    /// Supabase URL plus anon and service keys, required to serve without `--in-memory`
    pub fn require_supabase(&self) -> Result<(&str, &str, &str)> {
        if self.supabase.url.is_empty() {
            anyhow::bail!("SUPABASE_URL is not set");
        }
        let anon = self
            .supabase
            .anon_key
            .as_deref()
            .context("SUPABASE_ANON_KEY is not set")?;
        let service = self
            .supabase
            .service_key
            .as_deref()
            .context("SUPABASE_SERVICE_KEY is not set")?;
        Ok((&self.supabase.url, anon, service))
    }

    /// Human-readable summary with secrets masked
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let t = &self.extraction.timeouts;
        vec![
            (
                "config_file",
                self.config_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(none)".to_string()),
            ),
            ("port", self.server.port.to_string()),
            ("environment", self.server.environment.clone()),
            ("frontend_url", self.server.frontend_url.clone()),
            ("max_upload_bytes", self.server.max_upload_bytes.to_string()),
            ("supabase.url", or_unset(&self.supabase.url)),
            ("supabase.anon_key", mask_secret(self.supabase.anon_key.as_deref())),
            ("supabase.service_key", mask_secret(self.supabase.service_key.as_deref())),
            (
                "supabase.timeout",
                format!("{}s", self.supabase.request_timeout_seconds),
            ),
            ("openai.api_key", mask_secret(self.openai.api_key.as_deref())),
            ("openai.base_url", self.openai.base_url.clone()),
            ("openai.chat_model", self.openai.chat_model.clone()),
            ("openai.speech_model", self.openai.speech_model.clone()),
            ("uploads_dir", self.extraction.uploads_dir.display().to_string()),
            ("scripts_dir", self.extraction.scripts_dir.display().to_string()),
            ("python_bin", self.extraction.python_bin.clone()),
            ("browser_bin", self.extraction.browser_bin.clone()),
            (
                "timeouts",
                format!(
                    "static={}s scripted={}s video={}s short_form={}s transcription={}s",
                    t.static_fetch.as_secs(),
                    t.scripted_fetch.as_secs(),
                    t.video.as_secs(),
                    t.short_form.as_secs(),
                    t.transcription.as_secs()
                ),
            ),
        ]
    }
}

fn or_unset(value: &str) -> String {
    if value.is_empty() {
        "(not set)".to_string()
    } else {
        value.to_string()
    }
}

/// Show only the last four characters of a secret
pub fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        None => "(not set)".to_string(),
        Some(s) => {
            let chars: Vec<char> = s.chars().collect();
            if chars.len() <= 8 {
                "****".to_string()
            } else {
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("****{}", tail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = Config::from_sources(None, env_of(&[])).unwrap();

        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.environment, "development");
        assert_eq!(config.server.frontend_url, "http://localhost:5173");
        assert_eq!(config.openai.chat_model, "gpt-4o-mini");
        assert_eq!(config.openai.speech_model, "whisper-1");
        assert_eq!(config.extraction.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(config.extraction.timeouts, StrategyTimeouts::default());
        assert_eq!(config.supabase.request_timeout_seconds, 15);
        assert!(config.config_file.is_none());
        assert!(config.require_openai_key().is_err());
        assert!(config.require_supabase().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_sources(
            None,
            env_of(&[
                ("PORT", "8080"),
                ("NODE_ENV", "production"),
                ("OPENAI_API_KEY", "sk-abcdefghijkl"),
                ("SUPABASE_URL", "https://x.supabase.co"),
                ("SUPABASE_ANON_KEY", "anon"),
                ("SUPABASE_SERVICE_KEY", "service"),
                ("UPLOADS_DIR", "/tmp/up"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.is_production());
        assert_eq!(config.require_openai_key().unwrap(), "sk-abcdefghijkl");
        assert_eq!(
            config.require_supabase().unwrap(),
            ("https://x.supabase.co", "anon", "service")
        );
        assert_eq!(config.extraction.uploads_dir, PathBuf::from("/tmp/up"));
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let err = Config::from_sources(None, env_of(&[("PORT", "not-a-port")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_config_file_parsing_and_precedence() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".nodeflow");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1"
server:
  port: 4000
  frontend_url: https://app.example.com
supabase:
  request_timeout_seconds: 5
openai:
  chat_model: gpt-4o
extraction:
  uploads_dir: ./var/uploads
  timeouts:
    video_seconds: 60
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        let config = Config::from_sources(
            Some((config_path.clone(), parsed)),
            env_of(&[("PORT", "5000")]),
        )
        .unwrap();

        // env beats file, file beats defaults
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.frontend_url, "https://app.example.com");
        assert_eq!(config.openai.chat_model, "gpt-4o");
        assert_eq!(config.supabase.request_timeout_seconds, 5);
        assert_eq!(
            config.extraction.uploads_dir,
            temp.path().join("./var/uploads")
        );
        assert_eq!(config.extraction.timeouts.video, Duration::from_secs(60));
        assert_eq!(
            config.extraction.timeouts.short_form,
            Duration::from_secs(120)
        );
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(None), "(not set)");
        assert_eq!(mask_secret(Some("short")), "****");
        assert_eq!(mask_secret(Some("sk-1234567890abcd")), "****abcd");
    }

    #[test]
    fn test_describe_never_leaks_keys() {
        let config = Config::from_sources(
            None,
            env_of(&[("OPENAI_API_KEY", "sk-supersecretvalue")]),
        )
        .unwrap();
        let described = config.describe();
        assert!(described.iter().all(|(_, v)| !v.contains("supersecret")));
    }

    #[test]
    fn test_downloader_script_paths() {
        let settings = ExtractionSettings::default();
        assert_eq!(
            settings.video_downloader_script(),
            PathBuf::from("scripts/youtube_downloader.py")
        );
        assert_eq!(
            settings.post_downloader_script(),
            PathBuf::from("scripts/instagram_downloader.py")
        );
    }
}
