mod config;
mod gate;
mod provider;
mod routes;
mod session;
mod state;

use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::GateConfig::from_env().expect("invalid configuration");

    let provider = provider::HostedAuthClient::new(
        &config.provider_url,
        config.provider_anon_key.clone(),
        config.provider_timeouts,
    )
    .expect("auth provider client init failed");

    let resolver = session::SessionResolver::new(Arc::new(provider), config.cookie_name.clone(), config.provider_retries)
        .with_retry_base(Duration::from_millis(config.provider_retry_base_ms));
    let public_paths: Vec<&str> = config.routes.public_paths().collect();
    tracing::info!(?public_paths, cookie = %config.cookie_name, "route gate configured");

    let state = state::AppState::new(resolver, config.routes.clone(), config.cookie_secure);
    let app = routes::app(state, routes::site(&config.site_dir));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, site_dir = %config.site_dir, "paygate listening");
    axum::serve(listener, app).await.expect("server failed");
}
