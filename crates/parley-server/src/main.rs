use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_ai::ReplyGenerator;
use parley_gateway::connection;
use parley_gateway::dispatcher::Dispatcher;

mod responder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "messages.db".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let api_key = std::env::var("GEMINI_API_KEY").ok();
    let model = std::env::var("GEMINI_MODEL").ok();
    let assistant_id =
        std::env::var("PARLEY_ASSISTANT_CONVERSATION").unwrap_or_else(|_| "gemini".into());

    // Init database
    let db = Arc::new(parley_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new(db);

    // Assistant responder, enabled only when a credential is present
    let generator = ReplyGenerator::new(api_key, model);
    if generator.is_configured() {
        responder::spawn(dispatcher.clone(), generator, assistant_id);
    } else {
        info!("GEMINI_API_KEY not set, assistant responder disabled");
    }

    // Routes
    let app = Router::new()
        .route("/", get(ws_upgrade))
        .route("/api/health", get(health))
        .with_state(dispatcher)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Parley relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(dispatcher): State<Dispatcher>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
