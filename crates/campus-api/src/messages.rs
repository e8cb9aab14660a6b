use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use campus_db::{GroupDirectory, MessageStore};
use campus_digest::Generator;
use campus_types::api::{MessageQuery, SendMessageRequest};
use campus_types::models::{NewMessage, SortOrder};

use crate::AppState;
use crate::error::ApiError;

/// Hard cap on one page of history.
pub const MAX_PAGE: u32 = 500;

/// Appending goes through the store, so every open channel on the group sees
/// the message through its live subscription.
pub async fn send_message<G: Generator + 'static>(
    State(state): State<AppState<G>>,
    Path(group_id): Path<Uuid>,
    req: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = req?;
    let msg = NewMessage::new(&req.author, &req.body)?;
    let stored = state.store.append(group_id, msg).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn get_messages<G: Generator + 'static>(
    State(state): State<AppState<G>>,
    Path(group_id): Path<Uuid>,
    query: Result<Query<MessageQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    // 404 for an unknown group rather than an empty page.
    state.store.get(group_id).await?;

    let messages = match query.limit {
        Some(limit) => {
            let mut recent = state
                .store
                .query(group_id, SortOrder::Desc, Some(limit.min(MAX_PAGE)))
                .await?;
            recent.reverse();
            recent
        }
        None => state.store.query(group_id, SortOrder::Asc, None).await?,
    };

    Ok(Json(messages))
}
