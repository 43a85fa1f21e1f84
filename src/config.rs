//! Service configuration, loaded from environment variables at startup.

use crate::handler::HandlerConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the media converter.
///
/// Every field has a default so the service runs without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:5000"`).
    pub bind_address: String,

    /// Largest accepted request body, in bytes (default: 50 MiB).
    pub max_upload_bytes: usize,

    /// Per-file conversion time limit.
    pub job_timeout: Duration,

    /// Files converted at once within one batch.
    pub max_concurrency: usize,

    /// ffmpeg executable, looked up on `PATH` when not absolute.
    pub ffmpeg_path: PathBuf,

    /// Root for per-job scratch directories.
    pub temp_dir: PathBuf,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_or("MEDIA_CONVERTER_BIND", &defaults.bind_address),
            max_upload_bytes: parse_env("MEDIA_CONVERTER_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            job_timeout: Duration::from_secs(parse_env(
                "MEDIA_CONVERTER_JOB_TIMEOUT_SECS",
                defaults.job_timeout.as_secs(),
            )),
            max_concurrency: parse_env("MEDIA_CONVERTER_CONCURRENCY", defaults.max_concurrency).max(1),
            ffmpeg_path: std::env::var_os("MEDIA_CONVERTER_FFMPEG")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            temp_dir: std::env::var_os("MEDIA_CONVERTER_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            log_level: env_or("MEDIA_CONVERTER_LOG", &defaults.log_level),
            log_json: std::env::var("MEDIA_CONVERTER_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.log_json),
        }
    }

    /// The subset of settings the conversion handler needs.
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            max_concurrency: self.max_concurrency,
            job_timeout: self.job_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            job_timeout: Duration::from_secs(120),
            max_concurrency: 4,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            temp_dir: std::env::temp_dir(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address, "127.0.0.1:5000");
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.job_timeout, Duration::from_secs(120));
        assert_eq!(config.max_concurrency, 4);
    }

    #[test]
    fn test_handler_config() {
        let config = Config {
            max_concurrency: 2,
            job_timeout: Duration::from_secs(7),
            ..Config::default()
        };
        let handler = config.handler_config();
        assert_eq!(handler.max_concurrency, 2);
        assert_eq!(handler.job_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_parse_env_falls_back_on_garbage() {
        std::env::set_var("MEDIA_CONVERTER_TEST_GARBAGE", "not-a-number");
        assert_eq!(parse_env("MEDIA_CONVERTER_TEST_GARBAGE", 9usize), 9);
        std::env::remove_var("MEDIA_CONVERTER_TEST_GARBAGE");
    }
}
