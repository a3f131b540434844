//! nodeflow - backend for a node-based workflow app
//!
//! Authenticates users, stores graph-shaped project documents in Supabase,
//! and proxies content extraction (web pages, YouTube, Instagram, uploaded
//! audio) and chat completion to third-party services.
//!
//! # Modules
//!
//! - `extract`: The extraction pipeline (fetchers, downloaders, transcription, normalization)
//! - `adapters`: External services behind async traits (Supabase, OpenAI, in-memory)
//! - `server`: axum HTTP service
//! - `chat`: Prompt assembly for chat completions
//! - `domain`: Data structures (SourceReference, ExtractionResult, Project, AuthSession)
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the service
//! nodeflow serve --port 3001
//!
//! # Scrape a page
//! nodeflow scrape https://example.com
//!
//! # Transcribe a video
//! nodeflow transcribe https://youtu.be/abc123
//! ```

pub mod adapters;
pub mod chat;
pub mod cli;
pub mod config;
pub mod domain;
pub mod extract;
pub mod server;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use domain::{ExtractionResult, PlatformResult, SourceKind, SourceReference};
pub use extract::{ExtractError, Pipeline};
pub use server::AppState;
