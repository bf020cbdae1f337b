//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// OpenAI API key.
    pub openai_api_key: String,
    /// Data root for uploads, processed artifacts, frames and subtitles.
    pub data_dir: PathBuf,
    /// Idle poll interval.
    pub poll_interval: Duration,
    /// Maximum claim attempts per job.
    pub max_attempts: i32,
    /// Idle backoff growth factor.
    pub backoff_multiplier: f64,
    /// Idle backoff cap.
    pub max_backoff: Duration,
    /// How long an in-flight job may keep running after a shutdown signal.
    pub shutdown_grace: Duration,
    /// Cap on frames persisted per video.
    pub max_frames_per_video: usize,
    /// Vision calls in flight at once.
    pub vision_max_concurrent: usize,
    pub enable_transcription: bool,
    pub enable_vision_analysis: bool,
    pub enable_embeddings: bool,
    /// Serve the read-only health HTTP view.
    pub dev_http: bool,
    pub http_port: u16,
}

impl WorkerConfig {
    /// Load configuration from environment variables, validating required
    /// values up front.
    pub fn from_env() -> WorkerResult<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| WorkerError::config("DATABASE_URL not set"))?;
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| WorkerError::config("OPENAI_API_KEY not set"))?;

        Ok(Self {
            database_url,
            openai_api_key,
            data_dir: PathBuf::from(
                std::env::var("DATA_DIR").unwrap_or_else(|_| "/app/data".to_string()),
            ),
            poll_interval: Duration::from_millis(env_parse("WORKER_POLL_MS", 1500)),
            max_attempts: env_parse("WORKER_MAX_ATTEMPTS", 3),
            backoff_multiplier: env_parse("WORKER_BACKOFF_MULTIPLIER", 1.5),
            max_backoff: Duration::from_millis(env_parse("WORKER_MAX_BACKOFF_MS", 12_000)),
            shutdown_grace: Duration::from_secs(env_parse("WORKER_SHUTDOWN_GRACE_SECS", 300)),
            max_frames_per_video: env_parse("MAX_FRAMES_PER_VIDEO", 50),
            vision_max_concurrent: env_parse("VISION_MAX_CONCURRENT", 5),
            enable_transcription: env_parse_bool("ENABLE_TRANSCRIPTION", true),
            enable_vision_analysis: env_parse_bool("ENABLE_VISION_ANALYSIS", true),
            enable_embeddings: env_parse_bool("ENABLE_EMBEDDINGS", true),
            dev_http: env_parse_bool("WORKER_DEV_HTTP", false),
            http_port: env_parse("WORKER_HTTP_PORT", 8000),
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_parse_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_bool(&value).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
