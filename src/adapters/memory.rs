//! In-process identity and project store.
//!
//! Used by `nodeflow serve --in-memory` and by tests. Nothing survives a
//! restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AdapterError, IdentityProvider, ProjectStore};
use crate::domain::{
    AuthSession, AuthUser, NewProject, OAuthRedirect, Project, ProjectPatch, SessionUser,
};

const INVALID_CREDENTIALS: &str = "Invalid login credentials";
const PROJECT_NOT_FOUND: &str = "Project not found";

/// Access token lifetime, matching GoTrue's default
const TOKEN_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    user: SessionUser,
    password_hash: String,
}

#[derive(Debug, Default)]
struct IdentityState {
    /// Accounts keyed by email
    accounts: HashMap<String, Account>,
    /// Live access tokens; expired ones are pruned on every issue
    tokens: HashMap<String, IssuedToken>,
}

#[derive(Debug, Clone)]
struct IssuedToken {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Identity provider that keeps accounts and tokens in memory
#[derive(Debug)]
pub struct InMemoryIdentity {
    state: RwLock<IdentityState>,
    token_ttl: Duration,
}

impl Default for InMemoryIdentity {
    fn default() -> Self {
        Self::with_token_ttl(Duration::seconds(TOKEN_TTL_SECONDS))
    }
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_ttl(token_ttl: Duration) -> Self {
        Self {
            state: RwLock::new(IdentityState::default()),
            token_ttl,
        }
    }

    fn issue_session(&self, state: &mut IdentityState, user: SessionUser) -> AuthSession {
        let now = Utc::now();
        state.tokens.retain(|_, t| t.expires_at > now);

        let access_token = Uuid::new_v4().to_string();
        state.tokens.insert(
            access_token.clone(),
            IssuedToken {
                user_id: user.id.clone(),
                expires_at: now + self.token_ttl,
            },
        );
        AuthSession {
            user,
            access_token,
            refresh_token: Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthSession, AdapterError> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(email) {
            return Err(AdapterError::Auth("User already registered".to_string()));
        }

        let user = SessionUser {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: Some(name.to_string()),
            avatar: None,
        };
        state.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password_hash: hash_password(password),
            },
        );

        Ok(self.issue_session(&mut state, user))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AdapterError> {
        let mut state = self.state.write().await;
        let user = match state.accounts.get(email) {
            Some(account) if account.password_hash == hash_password(password) => {
                account.user.clone()
            }
            _ => return Err(AdapterError::Auth(INVALID_CREDENTIALS.to_string())),
        };

        Ok(self.issue_session(&mut state, user))
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthRedirect, AdapterError> {
        Err(AdapterError::Auth(format!(
            "OAuth provider '{}' is not available in local mode",
            provider
        )))
    }

    async fn user_for_token(&self, token: &str) -> Result<AuthUser, AdapterError> {
        let state = self.state.read().await;
        let user_id = state
            .tokens
            .get(token)
            .filter(|t| t.expires_at > Utc::now())
            .map(|t| &t.user_id)
            .ok_or_else(|| AdapterError::Auth("Invalid token".to_string()))?;

        let email = state
            .accounts
            .values()
            .find(|a| &a.user.id == user_id)
            .map(|a| a.user.email.clone());

        Ok(AuthUser {
            user_id: user_id.clone(),
            email,
        })
    }
}

/// Project store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<String, Project>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found() -> AdapterError {
        AdapterError::NotFound(PROJECT_NOT_FOUND.to_string())
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn list(&self, owner: &str) -> Result<Vec<Project>, AdapterError> {
        let projects = self.projects.read().await;
        let mut owned: Vec<Project> = projects
            .values()
            .filter(|p| p.user_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned)
    }

    async fn get(&self, id: &str, owner: &str) -> Result<Project, AdapterError> {
        let projects = self.projects.read().await;
        projects
            .get(id)
            .filter(|p| p.user_id == owner)
            .cloned()
            .ok_or_else(Self::not_found)
    }

    async fn insert(&self, project: NewProject) -> Result<Project, AdapterError> {
        let now = Utc::now();
        let row = Project {
            id: Uuid::new_v4().to_string(),
            user_id: project.user_id,
            name: project.name,
            nodes: project.nodes,
            edges: project.edges,
            created_at: Some(now),
            updated_at: Some(now),
        };

        self.projects
            .write()
            .await
            .insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        id: &str,
        owner: &str,
        patch: &ProjectPatch,
    ) -> Result<Project, AdapterError> {
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(id)
            .filter(|p| p.user_id == owner)
            .ok_or_else(Self::not_found)?;

        patch.apply_to(project);
        project.updated_at = Some(Utc::now());
        Ok(project.clone())
    }

    async fn delete(&self, id: &str, owner: &str) -> Result<(), AdapterError> {
        let mut projects = self.projects.write().await;
        // Deleting someone else's project or a missing one is a silent no-op
        if projects.get(id).is_some_and(|p| p.user_id == owner) {
            projects.remove(id);
        }
        Ok(())
    }
}
