use std::path::PathBuf;
use std::time::Duration;

use servecmd_core::execution::runner::RunnerConfig;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Directory holding the command definition files.
    pub cmd_config_dir: PathBuf,
    /// Base directory for job directories of commands without their own `cwd`.
    pub default_workdir: PathBuf,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`).
    pub request_timeout_secs: u64,
    /// Subprocess deadline for commands without `timeout_secs` (default: none).
    pub command_timeout_secs: Option<u64>,
    /// Maximum accepted request body size, uploads included.
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CMD_CONFIG_DIR`       | `./commands`               |
    /// | `DEFAULT_WORKDIR`      | `<temp dir>/servecmd`      |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `300`                      |
    /// | `COMMAND_TIMEOUT_SECS` | unset                      |
    /// | `MAX_BODY_BYTES`       | `104857600` (100 MiB)      |
    /// | `LOG_FORMAT`           | `text` (`json` for JSON)   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cmd_config_dir = std::env::var("CMD_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./commands"));

        let default_workdir = std::env::var("DEFAULT_WORKDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| RunnerConfig::default().default_workdir);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let command_timeout_secs: Option<u64> = std::env::var("COMMAND_TIMEOUT_SECS")
            .ok()
            .map(|v| v.parse().expect("COMMAND_TIMEOUT_SECS must be a valid u64"));

        let max_body_bytes: usize = std::env::var("MAX_BODY_BYTES")
            .unwrap_or_else(|_| (100 * 1024 * 1024).to_string())
            .parse()
            .expect("MAX_BODY_BYTES must be a valid usize");

        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            host,
            port,
            cmd_config_dir,
            default_workdir,
            cors_origins,
            request_timeout_secs,
            command_timeout_secs,
            max_body_bytes,
            log_format,
        }
    }

    /// Engine defaults derived from this configuration.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            default_workdir: self.default_workdir.clone(),
            default_timeout: self.command_timeout_secs.map(Duration::from_secs),
        }
    }
}
