use std::path::PathBuf;
use std::time::Duration;

use motion_comfyui::executor::{ExecutorConfig, MAX_CONSECUTIVE_POLL_ERRORS};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development next to a
/// ComfyUI instance on the same host.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `9000`).
    pub port: u16,
    /// ComfyUI host name (default: `localhost`).
    pub comfyui_host: String,
    /// ComfyUI HTTP port (default: `9188`).
    pub comfyui_port: u16,
    /// Directory ComfyUI writes artifacts into, shared with this service.
    pub output_dir: PathBuf,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on one workflow execution in seconds (default: `36000`).
    pub engine_timeout_secs: u64,
    /// Delay between history polls in milliseconds (default: `2000`).
    pub engine_poll_interval_ms: u64,
    /// Timeout of a single HTTP call to ComfyUI in seconds (default: `300`).
    pub engine_http_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `API_PORT`                 | `9000`                  |
    /// | `COMFYUI_HOST`             | `localhost`             |
    /// | `COMFYUI_PORT`             | `9188`                  |
    /// | `OUTPUT_DIR`               | `./output`              |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `ENGINE_TIMEOUT_SECS`      | `36000`                 |
    /// | `ENGINE_POLL_INTERVAL_MS`  | `2000`                  |
    /// | `ENGINE_HTTP_TIMEOUT_SECS` | `300`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("API_PORT")
            .unwrap_or_else(|_| "9000".into())
            .parse()
            .expect("API_PORT must be a valid u16");

        let comfyui_host = std::env::var("COMFYUI_HOST").unwrap_or_else(|_| "localhost".into());

        let comfyui_port: u16 = std::env::var("COMFYUI_PORT")
            .unwrap_or_else(|_| "9188".into())
            .parse()
            .expect("COMFYUI_PORT must be a valid u16");

        let output_dir = PathBuf::from(
            std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".into()),
        );

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let engine_timeout_secs: u64 = std::env::var("ENGINE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "36000".into())
            .parse()
            .expect("ENGINE_TIMEOUT_SECS must be a valid u64");

        let engine_poll_interval_ms: u64 = std::env::var("ENGINE_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .expect("ENGINE_POLL_INTERVAL_MS must be a valid u64");

        let engine_http_timeout_secs: u64 = std::env::var("ENGINE_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("ENGINE_HTTP_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            comfyui_host,
            comfyui_port,
            output_dir,
            cors_origins,
            request_timeout_secs,
            engine_timeout_secs,
            engine_poll_interval_ms,
            engine_http_timeout_secs,
        }
    }

    /// Base URL of the ComfyUI HTTP API.
    pub fn comfyui_url(&self) -> String {
        format!("http://{}:{}", self.comfyui_host, self.comfyui_port)
    }

    /// Polling bounds for the workflow executor.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            poll_interval: Duration::from_millis(self.engine_poll_interval_ms),
            max_wait: Duration::from_secs(self.engine_timeout_secs),
            max_consecutive_errors: MAX_CONSECUTIVE_POLL_ERRORS,
        }
    }
}
