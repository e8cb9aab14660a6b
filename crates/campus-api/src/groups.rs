use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use campus_db::GroupDirectory;
use campus_digest::Generator;
use campus_types::api::CreateGroupRequest;

use crate::AppState;
use crate::error::ApiError;

pub async fn list_groups<G: Generator + 'static>(
    State(state): State<AppState<G>>,
) -> Result<impl IntoResponse, ApiError> {
    let groups = state.store.list().await?;
    Ok(Json(groups))
}

pub async fn create_group<G: Generator + 'static>(
    State(state): State<AppState<G>>,
    req: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = req?;
    let group = state.store.create(req).await?;
    info!("Created class group '{}' ({})", group.subject_name, group.id);
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get_group<G: Generator + 'static>(
    State(state): State<AppState<G>>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let group = state.store.get(group_id).await?;
    Ok(Json(group))
}
