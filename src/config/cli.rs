use crate::config::tracker_config::{LoggingConfig, TrackerConfig};
use crate::utils::error::Result;
use crate::utils::validation::{validate_required_field, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_APP_ID: &str = "o2mc-console";

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "o2mc-tracker")]
#[command(about = "Interactive console for the o2mc event tracker")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Collector endpoint (overrides the config file)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Application id (defaults to "o2mc-console" without a config file)
    #[arg(long)]
    pub app_id: Option<String>,

    /// Seconds between dispatches
    #[arg(long)]
    pub dispatch_interval: Option<u64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 合併設定檔與命令列參數，命令列優先
    pub fn resolve(&self) -> Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                let mut config = TrackerConfig::from_file(path)?;
                if let Some(endpoint) = &self.endpoint {
                    config.tracker.endpoint = endpoint.clone();
                }
                config
            }
            None => {
                let endpoint = validate_required_field("endpoint", &self.endpoint)?;
                TrackerConfig::new(DEFAULT_APP_ID, endpoint.clone())
            }
        };

        if let Some(app_id) = &self.app_id {
            config.tracker.app_id = app_id.clone();
        }
        if let Some(interval) = self.dispatch_interval {
            config.tracker.dispatch_interval_seconds = Some(interval);
        }
        if let Some(max_retries) = self.max_retries {
            config.tracker.max_retries = Some(max_retries);
        }
        if let Some(timeout) = self.timeout {
            config.tracker.timeout_seconds = Some(timeout);
        }

        let logging = config.logging.get_or_insert_with(LoggingConfig::default);
        if self.verbose {
            logging.verbose = Some(true);
        }
        if self.json_logs {
            logging.json = Some(true);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigProvider;
    use crate::utils::error::TrackerError;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_resolve_from_arguments() {
        let cli = CliConfig::parse_from([
            "o2mc-tracker",
            "--endpoint",
            "https://collector.example.com/events",
            "--dispatch-interval",
            "3",
            "--verbose",
        ]);

        let config = cli.resolve().unwrap();
        assert_eq!(config.app_id(), DEFAULT_APP_ID);
        assert_eq!(config.dispatch_interval(), Duration::from_secs(3));
        assert!(config.verbose());
        assert!(!config.json_logs());
    }

    #[test]
    fn test_resolve_requires_endpoint_without_file() {
        let cli = CliConfig::parse_from(["o2mc-tracker"]);
        let err = cli.resolve().unwrap_err();
        assert!(matches!(err, TrackerError::MissingConfigError { .. }));
    }

    #[test]
    fn test_arguments_override_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(
                br#"
[tracker]
app_id = "from-file"
endpoint = "https://file.example.com"
max_retries = 9
"#,
            )
            .unwrap();

        let path = temp_file.path().to_str().unwrap().to_string();
        let cli = CliConfig::parse_from([
            "o2mc-tracker",
            "--config",
            path.as_str(),
            "--endpoint",
            "https://cli.example.com",
            "--max-retries",
            "1",
        ]);

        let config = cli.resolve().unwrap();
        assert_eq!(config.app_id(), "from-file");
        assert_eq!(config.endpoint(), "https://cli.example.com");
        assert_eq!(config.max_retries(), 1);

        let cli = CliConfig::parse_from([
            "o2mc-tracker",
            "--config",
            path.as_str(),
            "--app-id",
            "from-cli",
        ]);

        let config = cli.resolve().unwrap();
        assert_eq!(config.app_id(), "from-cli");
        assert_eq!(config.endpoint(), "https://file.example.com");
        assert_eq!(config.max_retries(), 9);
    }

    #[test]
    fn test_resolve_rejects_invalid_values() {
        let cli = CliConfig::parse_from([
            "o2mc-tracker",
            "--endpoint",
            "https://collector.example.com",
            "--timeout",
            "0",
        ]);
        assert!(cli.resolve().is_err());
    }
}
