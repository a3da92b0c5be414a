//! meal-flow-server: REST server for hospital meal fulfillment.
//!
//! Configuration is read from the environment (and `.env`), see
//! [`meal_flow_server::config`].

use anyhow::Context;
use meal_flow_server::config::ServerConfig;
use meal_flow_server::middleware::jwt::JwtConfig;
use meal_flow_server::router::build_router;
use meal_flow_server::state::AppState;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,meal_flow_server=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config).await?;
    let jwt_config = JwtConfig::from_secret(config.jwt_secret.as_bytes());

    let app = build_router(state, jwt_config);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("meal_flow_server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
