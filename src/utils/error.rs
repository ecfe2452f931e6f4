use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Dispatch rejected by backend (HTTP {status}): {message}")]
    DispatchError { status: u16, message: String },

    #[error("Invalid command: {message}")]
    CommandError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TrackerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackerError::ApiError(_) | TrackerError::DispatchError { .. } => {
                ErrorCategory::Network
            }
            TrackerError::ConfigError { .. }
            | TrackerError::ConfigValidationError { .. }
            | TrackerError::InvalidConfigValueError { .. }
            | TrackerError::MissingConfigError { .. } => ErrorCategory::Configuration,
            TrackerError::SerializationError(_) | TrackerError::CommandError { .. } => {
                ErrorCategory::Data
            }
            TrackerError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrackerError::CommandError { .. } => ErrorSeverity::Low,
            // 網路錯誤可在下一輪重試
            TrackerError::ApiError(_) | TrackerError::DispatchError { .. } => {
                ErrorSeverity::Medium
            }
            TrackerError::ConfigError { .. }
            | TrackerError::ConfigValidationError { .. }
            | TrackerError::InvalidConfigValueError { .. }
            | TrackerError::MissingConfigError { .. }
            | TrackerError::SerializationError(_) => ErrorSeverity::High,
            TrackerError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            TrackerError::ApiError(_) => {
                "Check network connectivity and that the collector endpoint is reachable".to_string()
            }
            TrackerError::DispatchError { status, .. } if *status >= 500 => {
                "The collector is failing; buffered events will be retried on the next dispatch"
                    .to_string()
            }
            TrackerError::DispatchError { .. } => {
                "The collector rejected the request; verify the endpoint and app id".to_string()
            }
            TrackerError::ConfigError { .. } | TrackerError::ConfigValidationError { .. } => {
                "Review the configuration file syntax and values".to_string()
            }
            TrackerError::InvalidConfigValueError { field, .. } => {
                format!("Provide a valid value for '{}'", field)
            }
            TrackerError::MissingConfigError { field } => {
                format!("Set '{}' in the configuration file or on the command line", field)
            }
            TrackerError::SerializationError(_) => {
                "Event data could not be encoded; check for unsupported characters".to_string()
            }
            TrackerError::IoError(_) => "Check file permissions and available disk space".to_string(),
            TrackerError::CommandError { .. } => "Type 'help' to list available commands".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the tracking backend: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Data => format!("Input problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
