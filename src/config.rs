//! Demo server configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible
//! defaults for development. A `.env` file in the working directory is
//! loaded first if present.
//!
//! # Variables
//!
//! - `HOST` / `PORT`: listen address (default: `0.0.0.0:3000`)
//! - `RUST_LOG`: log filter (default: `info`)
//! - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
//! - `REQUEST_ID_HEADER`: header carrying request IDs (default: `x-request-id`)
//! - `LOG_PARAMS`: log request parameters at debug level (default: `false`)
//! - `LOG_PARAMS_VERBOSE`: include route and env in the parameter log (default: `false`)
//! - `MAX_REQUEST_BODY_SIZE`: body limit for extractor-based handlers (default: 10MB)
//! - `CORS_ALLOWED_ORIGINS`: comma-separated origins, `*` for any (default: `*`)

use std::env;
use std::str::FromStr;

use axum::http::HeaderName;

use crate::error::{AppError, AppResult};
use crate::middleware::REQUEST_ID_HEADER;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Maximum request body size in bytes for extractor-based handlers
    /// (default: 10MB)
    pub max_request_body_size: usize,

    /// Allowed CORS origins; `*` allows any origin
    pub cors_allowed_origins: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log filter (e.g., "info", "debug", "weblayer=trace")
    pub log_level: String,

    /// Log output format
    pub log_format: LogFormat,

    /// Header used to read and echo request IDs
    pub request_id_header: String,

    /// Log request parameters on entry
    pub log_params: bool,

    /// Include matched route and request env in the parameter log
    pub log_params_verbose: bool,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any value fails to parse or
    /// validate.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 10 * 1024 * 1024)?,
            cors_allowed_origins: Self::parse_cors_origins(),

            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::Pretty)?,
            request_id_header: env::var("REQUEST_ID_HEADER")
                .unwrap_or_else(|_| REQUEST_ID_HEADER.to_string()),
            log_params: Self::parse_env("LOG_PARAMS", false)?,
            log_params_verbose: Self::parse_env("LOG_PARAMS_VERBOSE", false)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    fn validate(&self) -> AppResult<()> {
        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        self.request_id_header_name()?;

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The request ID header as a [`HeaderName`].
    pub fn request_id_header_name(&self) -> AppResult<HeaderName> {
        HeaderName::from_str(&self.request_id_header).map_err(|e| {
            AppError::ConfigError(format!(
                "Invalid REQUEST_ID_HEADER '{}': {e}",
                self.request_id_header
            ))
        })
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse CORS allowed origins from environment variable.
    fn parse_cors_origins() -> Vec<String> {
        env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_request_body_size: 10 * 1024 * 1024,
            cors_allowed_origins: vec!["*".to_string()],
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            request_id_header: REQUEST_ID_HEADER.to_string(),
            log_params: false,
            log_params_verbose: false,
        }
    }
}
