use crate::core::ConfigProvider;
use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::{validate_non_empty_string, validate_range, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DISPATCH_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub tracker: TrackerSection,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSection {
    pub app_id: String,
    pub endpoint: String,
    pub dispatch_interval_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub json: Option<bool>,
    pub verbose: Option<bool>,
}

impl TrackerConfig {
    pub fn new(app_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            tracker: TrackerSection {
                app_id: app_id.into(),
                endpoint: endpoint.into(),
                dispatch_interval_seconds: None,
                max_retries: None,
                timeout_seconds: None,
            },
            logging: None,
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TrackerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TrackerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${COLLECTOR_URL})，未定義的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| TrackerError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn dispatch_interval_seconds(&self) -> u64 {
        self.tracker
            .dispatch_interval_seconds
            .unwrap_or(DEFAULT_DISPATCH_INTERVAL_SECONDS)
    }

    pub fn max_retries(&self) -> u32 {
        self.tracker.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.tracker.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    pub fn verbose(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.verbose).unwrap_or(false)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("tracker.app_id", &self.tracker.app_id)?;
        validate_url("tracker.endpoint", &self.tracker.endpoint)?;
        validate_range(
            "tracker.dispatch_interval_seconds",
            self.dispatch_interval_seconds(),
            1,
            3600,
        )?;
        validate_range("tracker.max_retries", self.max_retries(), 0, 100)?;
        validate_range("tracker.timeout_seconds", self.timeout_seconds(), 1, 300)?;
        Ok(())
    }
}

impl ConfigProvider for TrackerConfig {
    fn app_id(&self) -> &str {
        &self.tracker.app_id
    }

    fn endpoint(&self) -> &str {
        &self.tracker.endpoint
    }

    fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_seconds())
    }

    fn max_retries(&self) -> u32 {
        TrackerConfig::max_retries(self)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds())
    }
}

impl Validate for TrackerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
