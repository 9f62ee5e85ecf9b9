use std::{env, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    InvalidValue {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub static_dir: PathBuf,
    pub input_op: String,
    pub output_op: String,
    pub jpeg_quality: u8,
    pub model_url: Option<String>,
    pub labels_url: Option<String>,
    pub github_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let body_limit_mb = or("BODY_LIMIT_MB", "5");
        let body_limit_bytes = body_limit_mb
            .parse::<usize>()
            .ok()
            .and_then(|mb| mb.checked_mul(1024 * 1024))
            .ok_or_else(|| ConfigError::InvalidValue {
                var: "BODY_LIMIT_MB",
                expected: "a valid integer of megabytes",
                value: body_limit_mb.clone(),
            })?;

        let port = or("PORT", "5020");
        let port = port.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
            var: "PORT",
            expected: "a valid number between 0 and 65535",
            value: port.clone(),
        })?;

        let quality = or("JPEG_QUALITY", "75");
        let jpeg_quality = quality
            .parse::<u8>()
            .ok()
            .filter(|q| (1..=100).contains(q))
            .ok_or_else(|| ConfigError::InvalidValue {
                var: "JPEG_QUALITY",
                expected: "an integer between 1 and 100",
                value: quality.clone(),
            })?;

        Ok(Config {
            port,
            body_limit_bytes,
            model_path: or("MODEL_PATH", "./model/frozen_graph.pb").into(),
            labels_path: or("LABELS_PATH", "./model/labels.txt").into(),
            static_dir: or("STATIC_DIR", "./static").into(),
            input_op: or("MODEL_INPUT_OP", "x"),
            output_op: or("MODEL_OUTPUT_OP", "Identity"),
            jpeg_quality,
            model_url: lookup("MODEL_URL").filter(|s| !s.is_empty()),
            labels_url: lookup("LABELS_URL").filter(|s| !s.is_empty()),
            github_token: lookup("GITHUB_TOKEN").filter(|s| !s.is_empty()),
        })
    }
}
