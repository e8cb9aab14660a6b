pub mod error;
pub mod groups;
pub mod messages;
pub mod summary;

use axum::{Router, routing::get};

use campus_digest::Generator;
use campus_gateway::GatewayServices;

/// Shared handler state: the same services the WebSocket gateway uses.
pub type AppState<G> = GatewayServices<G>;

/// REST routes. The WebSocket gateway is mounted by the server binary.
pub fn router<G: Generator + 'static>(state: AppState<G>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/groups", get(groups::list_groups::<G>).post(groups::create_group::<G>))
        .route("/groups/{group_id}", get(groups::get_group::<G>))
        .route(
            "/groups/{group_id}/messages",
            get(messages::get_messages::<G>).post(messages::send_message::<G>),
        )
        .route("/groups/{group_id}/summary", get(summary::get_summary::<G>))
        .with_state(state)
}
