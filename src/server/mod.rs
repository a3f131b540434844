//! HTTP service.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/health` | no | Liveness probe |
//! | `POST` | `/auth/signup` | no | Create an account (201) |
//! | `POST` | `/auth/login` | no | Password sign-in |
//! | `POST` | `/auth/google` | no | OAuth redirect URL |
//! | `GET`/`POST` | `/projects` | bearer | List / create projects |
//! | `GET`/`PUT`/`DELETE` | `/projects/{id}` | bearer | Read / patch / delete |
//! | `POST` | `/api/chat/completions` | bearer | Chat over context sources |
//! | `POST` | `/api/transcribe` | bearer | YouTube or Instagram by URL |
//! | `POST` | `/api/transcribe/youtube` | bearer | Video transcript |
//! | `POST` | `/api/transcribe/audio` | bearer | Uploaded audio transcript |
//! | `POST` | `/api/extract/instagram` | bearer | Post caption + transcript |
//! | `POST` | `/api/scrape` | bearer | Web page text |
//!
//! Errors are `{"error": "<message>"}`; unknown routes get a 404 in the same shape.

pub mod auth;
pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::adapters::{ChatEngine, IdentityProvider, ProjectStore};
use crate::config::ServerSettings;
use crate::extract::Pipeline;

pub use error::ApiError;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub projects: Arc<dyn ProjectStore>,
    pub chat: Arc<dyn ChatEngine>,
    pub pipeline: Arc<Pipeline>,
}

/// Build the full router
pub fn router(state: AppState, settings: &ServerSettings) -> Result<Router> {
    let origin = HeaderValue::from_str(settings.frontend_url.trim_end_matches('/'))
        .with_context(|| format!("Invalid FRONTEND_URL: {}", settings.frontend_url))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let protected = Router::new()
        .route(
            "/projects",
            get(routes::projects::list).post(routes::projects::create),
        )
        .route(
            "/projects/{id}",
            get(routes::projects::get)
                .put(routes::projects::update)
                .delete(routes::projects::delete),
        )
        .route("/api/chat/completions", post(routes::api::chat))
        .route("/api/transcribe", post(routes::api::transcribe))
        .route(
            "/api/transcribe/youtube",
            post(routes::api::transcribe_youtube),
        )
        .route("/api/transcribe/audio", post(routes::api::transcribe_audio))
        .route(
            "/api/extract/instagram",
            post(routes::api::extract_instagram),
        )
        .route("/api/scrape", post(routes::api::scrape))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/google", post(routes::auth::google))
        .merge(protected)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(app)
}

async fn not_found() -> impl IntoResponse {
    ApiError::not_found("Route not found")
}

/// Bind and serve until the process is stopped
pub async fn run_server(state: AppState, settings: &ServerSettings) -> Result<()> {
    let app = router(state, settings)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        %addr,
        environment = %settings.environment,
        frontend = %settings.frontend_url,
        "Server listening"
    );

    serve(listener, app).await
}

/// Serve an already-bound listener
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(listener, app).await.context("Server error")
}
