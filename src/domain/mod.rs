//! Domain types for nodeflow.
//!
//! This module contains the core data structures:
//! - Source: What the extraction pipeline is asked to extract
//! - Extraction: Pipeline results and transcript outcomes
//! - Project: Graph documents stored per user
//! - Auth: Sessions and resolved caller identities

pub mod auth;
pub mod extraction;
pub mod project;
pub mod source;

// Re-export commonly used types
pub use auth::{AuthSession, AuthUser, OAuthRedirect, SessionUser};
pub use extraction::{
    ExtractionResult, Platform, PlatformResult, PostType, ShortFormPost, TranscriptOutcome,
    TranscriptSource, VideoTranscript, TRANSCRIPTION_FAILED,
};
pub use project::{NewProject, Project, ProjectPatch};
pub use source::{FetchOptions, SourceKind, SourceReference};
