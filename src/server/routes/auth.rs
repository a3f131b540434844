//! Sign-up, sign-in, and OAuth start.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::domain::{AuthSession, OAuthRedirect};
use crate::server::error::{required, ApiError};
use crate::server::AppState;

const OAUTH_PROVIDER: &str = "google";

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// `POST /auth/signup`
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthSession>), ApiError> {
    const MISSING: &str = "Email, password, and name are required";
    let Json(body) = body?;
    let email = required(body.email, MISSING)?;
    let password = required(body.password, MISSING)?;
    let name = required(body.name, MISSING)?;

    let session = state.identity.sign_up(&email, &password, &name).await?;
    info!(user_id = %session.user.id, "User signed up");

    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<AuthSession>, ApiError> {
    const MISSING: &str = "Email and password are required";
    let Json(body) = body?;
    let email = required(body.email, MISSING)?;
    let password = required(body.password, MISSING)?;

    let session = state
        .identity
        .sign_in_with_password(&email, &password)
        .await?;

    Ok(Json(session))
}

/// `POST /auth/google`
pub async fn google(State(state): State<AppState>) -> Result<Json<OAuthRedirect>, ApiError> {
    let redirect = state.identity.sign_in_with_oauth(OAUTH_PROVIDER).await?;
    Ok(Json(redirect))
}
