use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod category;
mod config;
mod error;
mod labels;
mod model;
mod preprocess;
mod routes;
mod utils;

use config::Config;
use error::StartupError;
use labels::LabelSet;
use routes::AppState;
use utils::ensure_files_exist;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "startup failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    ensure_files_exist(&config).await?;

    if !config.static_dir.is_dir() {
        return Err(StartupError::MissingStaticDir(
            config.static_dir.display().to_string(),
        ));
    }

    let labels = LabelSet::from_file(&config.labels_path)?;
    tracing::info!(count = labels.len(), "labels loaded");

    let classifier = model::load(&config)?;

    let shared_state = Arc::new(AppState {
        classifier,
        labels,
        jpeg_quality: config.jpeg_quality,
    });

    let app = routes::router(shared_state, config.body_limit_bytes, &config.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| StartupError::Server(e.to_string()))?;

    Ok(())
}
