use std::path::Path;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{path} not found and {var} is not set")]
    MissingArtifact { path: String, var: &'static str },
    #[error("GITHUB_TOKEN is not a valid header value")]
    InvalidToken,
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to download {url}: {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

async fn download_file(url: &str, path: &Path, token: Option<&str>) -> Result<(), DownloadError> {
    tracing::info!(url, path = %path.display(), "downloading");

    let mut header_map = HeaderMap::new();
    if let Some(token) = token {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| DownloadError::InvalidToken)?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let request_err = |source| DownloadError::Request {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .headers(header_map)
        .send()
        .await
        .map_err(request_err)?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let bytes = response.bytes().await.map_err(request_err)?;

    let io_err = |source| DownloadError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(io_err)?;

    Ok(())
}

async fn ensure_file(
    path: &Path,
    url: Option<&str>,
    var: &'static str,
    token: Option<&str>,
) -> Result<(), DownloadError> {
    if path.exists() {
        return Ok(());
    }
    match url {
        Some(url) => download_file(url, path, token).await,
        None => Err(DownloadError::MissingArtifact {
            path: path.display().to_string(),
            var,
        }),
    }
}

/// Makes sure the model and label files are on disk, fetching them from
/// `MODEL_URL` / `LABELS_URL` when they are missing.
pub async fn ensure_files_exist(config: &Config) -> Result<(), DownloadError> {
    tracing::info!("checking model files");
    let token = config.github_token.as_deref();

    ensure_file(
        &config.model_path,
        config.model_url.as_deref(),
        "MODEL_URL",
        token,
    )
    .await?;
    ensure_file(
        &config.labels_path,
        config.labels_url.as_deref(),
        "LABELS_URL",
        token,
    )
    .await?;

    Ok(())
}
