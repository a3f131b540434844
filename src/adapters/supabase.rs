//! Supabase client: GoTrue for identity, PostgREST for project rows.
//!
//! Auth endpoints use the anon key; table access uses the service key and
//! scopes every query with `user_id=eq.<owner>` itself.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{AdapterError, IdentityProvider, ProjectStore};
use crate::config::SupabaseSettings;
use crate::domain::{
    AuthSession, AuthUser, NewProject, OAuthRedirect, Project, ProjectPatch, SessionUser,
};

const PROJECTS_TABLE: &str = "projects";
const PROJECT_NOT_FOUND: &str = "Project not found";

/// Supabase REST client
pub struct SupabaseClient {
    url: String,
    anon_key: String,
    service_key: String,
    /// Where OAuth providers send the browser back to
    oauth_redirect: String,
    client: reqwest::Client,
}

/// GoTrue user object
#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

/// GoTrue session (token grant or auto-confirmed sign-up)
#[derive(Debug, Deserialize)]
struct GoTrueSession {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<GoTrueUser>,
}

/// The various error shapes GoTrue and PostgREST return
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

impl GoTrueUser {
    fn into_session_user(self) -> SessionUser {
        SessionUser {
            id: self.id,
            email: self.email.unwrap_or_default(),
            name: self.user_metadata.name,
            avatar: self.user_metadata.avatar_url,
        }
    }
}

impl SupabaseClient {
    /// Create a client from settings
    pub fn new(
        settings: &SupabaseSettings,
        anon_key: String,
        service_key: String,
        frontend_url: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            url: settings.url.trim_end_matches('/').to_string(),
            anon_key,
            service_key,
            oauth_redirect: format!("{}/auth/callback", frontend_url.trim_end_matches('/')),
            client,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path)
    }

    fn table_request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.url, PROJECTS_TABLE))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Send a request and decode the body, classifying failures
    async fn send<T: DeserializeOwned>(
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, AdapterError> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach Supabase ({})", what))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response
                .json()
                .await
                .with_context(|| format!("Failed to parse Supabase response ({})", what))?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or(body);

        Err(match status {
            StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::UNPROCESSABLE_ENTITY => AdapterError::Auth(message),
            _ => AdapterError::Upstream(anyhow::anyhow!(
                "Supabase error ({}) during {}: {}",
                status,
                what,
                message
            )),
        })
    }

    /// Table calls never produce auth-classified errors; a 4xx there is a bad query
    fn table_error(err: AdapterError) -> AdapterError {
        match err {
            AdapterError::Auth(message) => AdapterError::Upstream(anyhow::anyhow!(message)),
            other => other,
        }
    }

    fn session_from(grant: GoTrueSession) -> Result<AuthSession, AdapterError> {
        match grant {
            GoTrueSession {
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
                user: Some(user),
            } => Ok(AuthSession {
                user: user.into_session_user(),
                access_token,
                refresh_token,
            }),
            _ => Err(AdapterError::Auth(
                "No session issued; confirm the email address and log in".to_string(),
            )),
        }
    }

    fn first_row(rows: Vec<Project>) -> Result<Project, AdapterError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| AdapterError::NotFound(PROJECT_NOT_FOUND.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthSession, AdapterError> {
        let request = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "name": name },
            }));

        // Without auto-confirm GoTrue answers with a bare user object
        let body: serde_json::Value = Self::send(request, "sign up").await?;
        if body.get("access_token").is_none() {
            return Self::session_from(GoTrueSession {
                access_token: None,
                refresh_token: None,
                user: None,
            });
        }

        let grant: GoTrueSession =
            serde_json::from_value(body).context("Failed to parse sign-up session")?;
        Self::session_from(grant)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AdapterError> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }));

        let grant: GoTrueSession = Self::send(request, "sign in").await?;
        Self::session_from(grant)
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthRedirect, AdapterError> {
        let url = url::Url::parse_with_params(
            &self.auth_url("authorize"),
            &[("provider", provider), ("redirect_to", &self.oauth_redirect)],
        )
        .context("Failed to build OAuth URL")?;

        Ok(OAuthRedirect {
            provider: provider.to_string(),
            url: url.to_string(),
        })
    }

    async fn user_for_token(&self, token: &str) -> Result<AuthUser, AdapterError> {
        let request = self
            .client
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(token);

        let user: GoTrueUser = Self::send(request, "token lookup").await?;
        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
        })
    }
}

#[async_trait]
impl ProjectStore for SupabaseClient {
    async fn list(&self, owner: &str) -> Result<Vec<Project>, AdapterError> {
        debug!(owner = %owner, "Listing projects");
        let request = self.table_request(Method::GET).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", owner)),
            ("order", "updated_at.desc".to_string()),
        ]);

        Self::send(request, "list projects")
            .await
            .map_err(Self::table_error)
    }

    async fn get(&self, id: &str, owner: &str) -> Result<Project, AdapterError> {
        let request = self.table_request(Method::GET).query(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{}", id)),
            ("user_id", format!("eq.{}", owner)),
        ]);

        let rows = Self::send(request, "get project")
            .await
            .map_err(Self::table_error)?;
        Self::first_row(rows)
    }

    async fn insert(&self, project: NewProject) -> Result<Project, AdapterError> {
        let request = self
            .table_request(Method::POST)
            .header("Prefer", "return=representation")
            .json(&project);

        let rows = Self::send(request, "create project")
            .await
            .map_err(Self::table_error)?;
        Self::first_row(rows).map_err(|_| {
            AdapterError::Upstream(anyhow::anyhow!("Supabase returned no row for new project"))
        })
    }

    async fn update(
        &self,
        id: &str,
        owner: &str,
        patch: &ProjectPatch,
    ) -> Result<Project, AdapterError> {
        let request = self
            .table_request(Method::PATCH)
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", format!("eq.{}", owner)),
            ])
            .header("Prefer", "return=representation")
            .json(patch);

        let rows = Self::send(request, "update project")
            .await
            .map_err(Self::table_error)?;
        Self::first_row(rows)
    }

    async fn delete(&self, id: &str, owner: &str) -> Result<(), AdapterError> {
        let request = self
            .table_request(Method::DELETE)
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", format!("eq.{}", owner)),
            ])
            .header("Prefer", "return=representation");

        let _deleted: Vec<Project> = Self::send(request, "delete project")
            .await
            .map_err(Self::table_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(url: &str, timeout_seconds: u64) -> SupabaseClient {
        let settings = SupabaseSettings {
            url: url.to_string(),
            request_timeout_seconds: timeout_seconds,
            ..Default::default()
        };
        SupabaseClient::new(
            &settings,
            "anon".to_string(),
            "service".to_string(),
            "http://localhost:5173/",
        )
        .unwrap()
    }

    fn client() -> SupabaseClient {
        client_for("https://abc.supabase.co/", 15)
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _accepting = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = client_for(&format!("http://{}", addr), 1);
        let started = std::time::Instant::now();
        let result = client.user_for_token("token").await;

        assert!(matches!(result, Err(AdapterError::Upstream(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_auth_url() {
        assert_eq!(
            client().auth_url("token"),
            "https://abc.supabase.co/auth/v1/token"
        );
    }

    #[tokio::test]
    async fn test_oauth_redirect_url() {
        let redirect = client().sign_in_with_oauth("google").await.unwrap();
        assert_eq!(redirect.provider, "google");
        assert!(redirect
            .url
            .starts_with("https://abc.supabase.co/auth/v1/authorize?provider=google"));
        assert!(redirect
            .url
            .contains("redirect_to=http%3A%2F%2Flocalhost%3A5173%2Fauth%2Fcallback"));
    }

    #[test]
    fn test_session_parsing() {
        let grant: GoTrueSession = serde_json::from_value(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "user": {
                "id": "u1",
                "email": "a@b.c",
                "user_metadata": {"name": "Ada", "avatar_url": "https://img"}
            }
        }))
        .unwrap();

        let session = SupabaseClient::session_from(grant).unwrap();
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.user.name.as_deref(), Some("Ada"));
        assert_eq!(session.user.avatar.as_deref(), Some("https://img"));
        assert_eq!(session.access_token, "at");
    }

    #[test]
    fn test_missing_session_is_auth_error() {
        let grant: GoTrueSession = serde_json::from_value(json!({"user": {"id": "u1"}})).unwrap();
        assert!(matches!(
            SupabaseClient::session_from(grant),
            Err(AdapterError::Auth(_))
        ));
    }

    #[test]
    fn test_error_body_precedence() {
        let body: ErrorBody = serde_json::from_value(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        }))
        .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid login credentials"));

        let body: ErrorBody =
            serde_json::from_value(json!({"code": 422, "msg": "Password too short"})).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Password too short"));
    }

    #[test]
    fn test_empty_rows_are_not_found() {
        assert!(matches!(
            SupabaseClient::first_row(Vec::new()),
            Err(AdapterError::NotFound(_))
        ));
    }
}
