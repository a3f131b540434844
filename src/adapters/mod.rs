//! Adapter interfaces for external systems.
//!
//! Every third-party service nodeflow talks to sits behind one of these
//! traits:
//!
//! - [`IdentityProvider`]: sign-up, sign-in, bearer-token lookup
//! - [`ProjectStore`]: owner-scoped project documents
//! - [`ChatEngine`]: chat completion
//! - [`SpeechEngine`]: speech-to-text
//!
//! Production implementations talk to Supabase ([`supabase`]) and an
//! OpenAI-compatible API ([`openai`]); [`memory`] holds in-process
//! implementations for local development.

pub mod memory;
pub mod openai;
pub mod supabase;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::chat::ChatMessage;
use crate::domain::{AuthSession, AuthUser, NewProject, OAuthRedirect, Project, ProjectPatch};

// Re-export the concrete adapters
pub use memory::{InMemoryIdentity, InMemoryProjectStore};
pub use openai::OpenAiClient;
pub use supabase::SupabaseClient;

/// Errors surfaced by identity and storage adapters
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Credentials or token rejected
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    /// The service itself failed or was unreachable
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// Identity and session provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthSession, AdapterError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AdapterError>;

    /// Build the redirect that starts an OAuth flow
    async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthRedirect, AdapterError>;

    /// Resolve the user behind an access token
    async fn user_for_token(&self, token: &str) -> Result<AuthUser, AdapterError>;
}

/// Project document store. Every call is scoped to `owner`.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// All of the owner's projects, most recently updated first
    async fn list(&self, owner: &str) -> Result<Vec<Project>, AdapterError>;

    async fn get(&self, id: &str, owner: &str) -> Result<Project, AdapterError>;

    async fn insert(&self, project: NewProject) -> Result<Project, AdapterError>;

    async fn update(
        &self,
        id: &str,
        owner: &str,
        patch: &ProjectPatch,
    ) -> Result<Project, AdapterError>;

    async fn delete(&self, id: &str, owner: &str) -> Result<(), AdapterError>;
}

/// Chat completion engine
#[async_trait]
pub trait ChatEngine: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Speech-to-text engine
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Transcribe a local audio/video file, returning the engine's text verbatim
    async fn transcribe(&self, media_path: &Path) -> Result<String>;
}
