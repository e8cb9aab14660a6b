mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use campus_db::{Database, SqliteStore};
use campus_digest::{GeminiClient, Summarizer};
use campus_gateway::{GatewayServices, Registry, handle_connection};

use crate::config::Config;

type Services = GatewayServices<GeminiClient>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus=debug,campus_gateway=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database; every append is published to live channels from here on
    let db = Arc::new(Database::open(&config.db_path)?);
    let registry = Registry::new();
    registry.attach(&db)?;
    let store = SqliteStore::new(db);

    let gemini = GeminiClient::new(config.gemini.clone())?;
    let services: Services = GatewayServices {
        store: store.clone(),
        registry,
        summarizer: Arc::new(Summarizer::new(store, gemini)),
    };

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(services.clone());

    let app = Router::new()
        .merge(campus_api::router(services))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Campus chat server listening on {}", config.addr);
    info!("Summaries use model {}", config.gemini.model);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(services): State<Services>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, services))
}
