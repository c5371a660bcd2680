mod analyzer;
mod api;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use ytpulse_youtube::YoutubeClient;

use crate::{
    analyzer::Analyzer,
    api::{build_app, AppState},
    middleware::{AuthState, RateLimitState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ytpulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = ytpulse_db::PoolConfig::from_app_config(&config);
    let pool = ytpulse_db::connect_pool(&config.database_url, pool_config).await?;
    ytpulse_db::run_migrations(&pool).await?;

    let youtube = YoutubeClient::new(&config.youtube_api_key, config.youtube_request_timeout_secs)?;
    let analyzer = Arc::new(Analyzer::new(
        youtube,
        pool.clone(),
        config.youtube_max_retries,
        config.youtube_retry_backoff_base_ms,
    ));

    let auth = AuthState::from_env(matches!(
        config.env,
        ytpulse_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            analyzer,
            history_limit: config.history_limit,
        },
        auth,
        RateLimitState::from_app_config(&config),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
