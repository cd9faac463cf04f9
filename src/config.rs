use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Oncorisk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND: &str = "127.0.0.1:5000";
const DEFAULT_DB_PATH: &str = "oncorisk.db";
const DEFAULT_MODEL_PATH: &str = "model.json";
const DEFAULT_SCORING_TIMEOUT_SECS: u64 = 30;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "oncorisk=info"
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Which prediction flow the service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    /// Predict in-process on patient create/update.
    Local,
    /// Predict through the remote scorer, on demand.
    Remote,
}

impl PredictionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl FromStr for PredictionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(other.to_string()),
        }
    }
}

/// Remote scorer endpoint and credential.
#[derive(Clone, PartialEq)]
pub struct ScoringSettings {
    pub url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ScoringSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringSettings")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub mode: PredictionMode,
    /// JSON linear artifact, or an `.onnx` file with the `onnx-model` feature.
    pub model_path: PathBuf,
    /// Present exactly when `mode` is `Remote`.
    pub scoring: Option<ScoringSettings>,
}

impl Settings {
    /// Read settings from the process environment, after loading `.env`
    /// if one exists in the working directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    ///
    /// In remote mode a missing scorer URL or API key fails here, so the
    /// process never starts without its credential.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("ONCORISK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "ONCORISK_BIND",
            value: bind_raw.clone(),
        })?;

        let mode = match get("ONCORISK_MODE") {
            Some(raw) => raw.parse().map_err(|value| ConfigError::Invalid {
                key: "ONCORISK_MODE",
                value,
            })?,
            None => PredictionMode::Local,
        };

        let db_path = PathBuf::from(get("ONCORISK_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into()));
        let model_path =
            PathBuf::from(get("ONCORISK_MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.into()));

        let scoring = match mode {
            PredictionMode::Local => None,
            PredictionMode::Remote => {
                let url = get("ONCORISK_SCORING_URL").ok_or(ConfigError::Missing("ONCORISK_SCORING_URL"))?;
                let api_key = get("ONCORISK_API_KEY")
                    .or_else(|| get("API_KEY"))
                    .ok_or(ConfigError::Missing("ONCORISK_API_KEY"))?;
                let timeout_secs = match get("ONCORISK_SCORING_TIMEOUT_SECS") {
                    Some(raw) => raw
                        .parse::<u64>()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .ok_or(ConfigError::Invalid {
                            key: "ONCORISK_SCORING_TIMEOUT_SECS",
                            value: raw,
                        })?,
                    None => DEFAULT_SCORING_TIMEOUT_SECS,
                };
                Some(ScoringSettings {
                    url,
                    api_key,
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
        };

        Ok(Self {
            bind,
            db_path,
            mode,
            model_path,
            scoring,
        })
    }
}
