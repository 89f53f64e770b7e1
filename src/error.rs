use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("invalid time value '{value}': {reason}")]
    InvalidTime { value: String, reason: String },

    #[error("data source failure: {0}")]
    DataSource(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(
            target: "app::validation",
            %message,
            details = %details,
            "validation error with details"
        );
        AppError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn invalid_time(value: impl Into<String>, reason: impl Into<String>) -> Self {
        let value = value.into();
        let reason = reason.into();
        warn!(target: "app::time", %value, %reason, "invalid time value");
        AppError::InvalidTime { value, reason }
    }

    pub fn data_source(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::source", %message, "data source error");
        AppError::DataSource(message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }

    pub fn details(&self) -> Option<&JsonValue> {
        match self {
            AppError::Validation { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}
