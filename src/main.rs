use tokio::net::TcpListener;
use tracing::{info, warn};
use twitter_downloader::{AppError, AppState, Config, build_router, routes::public_dir_exists};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "twitter_downloader=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    if !public_dir_exists(&config.public_dir) {
        warn!(
            "No index.html in {:?}; only the API will be useful.",
            config.public_dir
        );
    }
    info!(
        "Metadata provider: {} (timeout {:?})",
        config.provider_base_url, config.provider_timeout
    );

    let state = AppState::from_config(&config)?;
    let app = build_router(state, &config)?;

    let listener = TcpListener::bind(&config.bind_addr).await.map_err(|error| {
        AppError::internal(format!("Could not bind {}: {error}", config.bind_addr))
    })?;

    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::internal(format!("HTTP server error: {error}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!("Could not listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutting down");
}
