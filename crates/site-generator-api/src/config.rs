//! Configuration management for Site Generator API
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use site_generator::WorkspaceTtls;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Directory containing installed templates
    pub templates_dir: PathBuf,

    /// Scratch directory holding per-request workspaces
    pub workspace_dir: PathBuf,

    /// Lifetime of a download workspace after packaging finished
    pub download_ttl_secs: u64,

    /// Lifetime of a preview workspace
    pub preview_ttl_secs: u64,

    /// How often expired workspaces are swept
    pub sweep_interval_secs: u64,

    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenv::dotenv().ok();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            api_port: parse_var("API_PORT", "5000")?,

            templates_dir: env::var("TEMPLATES_DIR")
                .unwrap_or_else(|_| "./templates".to_string())
                .into(),

            workspace_dir: env::var("WORKSPACE_DIR")
                .unwrap_or_else(|_| "./tmp".to_string())
                .into(),

            download_ttl_secs: parse_var("DOWNLOAD_TTL_SECS", "30")?,
            preview_ttl_secs: parse_var("PREVIEW_TTL_SECS", "600")?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", "5")?,
            max_body_bytes: parse_var("MAX_BODY_BYTES", "8388608")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }
        if self.download_ttl_secs == 0 || self.preview_ttl_secs == 0 {
            anyhow::bail!("Workspace TTLs must be greater than 0");
        }
        if self.sweep_interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be greater than 0");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn workspace_ttls(&self) -> WorkspaceTtls {
        WorkspaceTtls {
            download: Duration::from_secs(self.download_ttl_secs),
            preview: Duration::from_secs(self.preview_ttl_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Ensure the scratch directory exists
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.workspace_dir).with_context(|| {
            format!(
                "Failed to create workspace directory: {}",
                self.workspace_dir.display()
            )
        })?;

        // An empty catalog is allowed, just suspicious
        if !self.templates_dir.exists() {
            tracing::warn!(
                "Templates directory does not exist: {}",
                self.templates_dir.display()
            );
        }

        Ok(())
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            api_host: "127.0.0.1".to_string(),
            api_port: 9000,
            templates_dir: PathBuf::from("./templates"),
            workspace_dir: PathBuf::from("./tmp"),
            download_ttl_secs: 30,
            preview_ttl_secs: 600,
            sweep_interval_secs: 5,
            max_body_bytes: 1024,
        }
    }

    #[test]
    fn test_config_defaults() {
        // Clear any existing environment variables
        for var in [
            "API_HOST",
            "API_PORT",
            "TEMPLATES_DIR",
            "WORKSPACE_DIR",
            "DOWNLOAD_TTL_SECS",
            "PREVIEW_TTL_SECS",
            "SWEEP_INTERVAL_SECS",
            "MAX_BODY_BYTES",
        ] {
            env::remove_var(var);
        }

        let config = Config::from_env().expect("Failed to load config");

        assert_eq!(config.api_host, "0.0.0.0");
        assert_eq!(config.api_port, 5000);
        assert_eq!(config.templates_dir, PathBuf::from("./templates"));
        assert_eq!(config.workspace_dir, PathBuf::from("./tmp"));
        assert_eq!(config.workspace_ttls().download, Duration::from_secs(30));
        assert_eq!(config.workspace_ttls().preview, Duration::from_secs(600));
        assert_eq!(config.max_body_bytes, 8 * 1024 * 1024);
    }

    #[test]
    fn test_api_address() {
        assert_eq!(config().api_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            api_port: 0,
            ..config()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("API_PORT must be greater than 0"));
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = Config {
            preview_ttl_secs: 0,
            ..config()
        };

        assert!(config.validate().is_err());
    }
}
