//! Owner-scoped project CRUD.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;

use crate::domain::{AuthUser, NewProject, Project, ProjectPatch};
use crate::server::error::{required, ApiError};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProjectBody {
    #[serde(default)]
    pub name: Option<String>,
}

/// `GET /projects`
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.projects.list(&user.user_id).await?))
}

/// `GET /projects/{id}`
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.projects.get(&id, &user.user_id).await?))
}

/// `POST /projects`
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<CreateProjectBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let Json(body) = body?;
    let name = required(body.name, "Project name is required")?;

    let project = state
        .projects
        .insert(NewProject::empty(user.user_id, name))
        .await?;
    info!(project_id = %project.id, "Created project");

    Ok((StatusCode::CREATED, Json(project)))
}

/// `PUT /projects/{id}`
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Result<Json<ProjectPatch>, JsonRejection>,
) -> Result<Json<Project>, ApiError> {
    let Json(patch) = body?;

    // Nothing to write; answer with the stored row
    if patch.is_empty() {
        return Ok(Json(state.projects.get(&id, &user.user_id).await?));
    }

    Ok(Json(
        state.projects.update(&id, &user.user_id, &patch).await?,
    ))
}

/// `DELETE /projects/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.projects.delete(&id, &user.user_id).await?;
    info!(project_id = %id, "Deleted project");
    Ok(StatusCode::NO_CONTENT)
}
