use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use uuid::Uuid;

use campus_digest::Generator;
use campus_types::api::SummaryQuery;

use crate::AppState;
use crate::error::ApiError;

/// One-shot digest of the last `window` messages. Refreshing is calling again.
pub async fn get_summary<G: Generator + 'static>(
    State(state): State<AppState<G>>,
    Path(group_id): Path<Uuid>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let digest = state.summarizer.summarize(group_id, query.window).await?;
    Ok(Json(digest))
}
