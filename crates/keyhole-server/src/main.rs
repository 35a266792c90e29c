use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use keyhole_api::images::ImageHost;
use keyhole_api::state::{AppState, AppStateInner};
use keyhole_gateway::connection;
use keyhole_gateway::registry::Registry;

#[derive(Clone)]
struct GatewayState {
    registry: Registry,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyhole=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("KEYHOLE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("KEYHOLE_DB_PATH").unwrap_or_else(|_| "keyhole.db".into());
    let host = std::env::var("KEYHOLE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("KEYHOLE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let images = match std::env::var("KEYHOLE_IMAGE_HOST_URL") {
        Ok(url) => Some(ImageHost::new(url)?),
        Err(_) => {
            warn!("KEYHOLE_IMAGE_HOST_URL not set; image uploads are disabled");
            None
        }
    };

    // Init database
    let db = keyhole_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let registry = Registry::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        registry: registry.clone(),
        jwt_secret: jwt_secret.clone(),
        images,
    });

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(GatewayState {
            registry,
            jwt_secret,
        });

    let app = Router::new()
        .route("/", get(health))
        .merge(keyhole_api::router(state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Keyhole server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "message": "Server is running" }))
}

async fn ws_upgrade(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.registry, state.jwt_secret)
    })
}
