use anyhow::Result;
use shared::Config;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting signal relay API server...");

    let config = Config::from_env()?;
    let state = AppState::new(&config)?;
    info!("Loaded {} subscriber(s)", state.registry.count().await);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("API server listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
