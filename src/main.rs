//! playdeck-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use playdeck_gateway::api;
use playdeck_gateway::app_state::AppState;
use playdeck_gateway::broadcast::SnapshotBroadcaster;
use playdeck_gateway::config::GatewayConfig;
use playdeck_gateway::dispatch::CommandDispatcher;
use playdeck_gateway::player::{OsascriptSurface, PlayerSurface};
use playdeck_gateway::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, app = %config.player_app,
        "starting playdeck-gateway");

    // Build the player boundary
    let surface: Arc<dyn PlayerSurface> = Arc::new(OsascriptSurface::new(&config.player_app));

    // Build application state
    let app_state = AppState {
        dispatcher: Arc::new(CommandDispatcher::new(Arc::clone(&surface))),
        broadcaster: SnapshotBroadcaster::new(
            surface,
            config.poll_interval,
            config.broadcast_capacity,
        ),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    #[cfg(feature = "swagger-ui")]
    let app = app.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", <api::ApiDoc as utoipa::OpenApi>::openapi()),
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
