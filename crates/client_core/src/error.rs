use reqwest::StatusCode;
use shared::error::{ApiError, ErrorCode, ValidationError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Generation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("another change is still being saved")]
    Busy,
    #[error("{0} is not supported for this resource")]
    Unsupported(&'static str),
}

impl ClientError {
    /// Maps a non-2xx response to the error taxonomy, preferring the
    /// backend-provided message.
    pub fn from_status(status: StatusCode, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::Validation(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            _ => Self::Network(message),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network(_) => ErrorCode::Network,
            Self::Validation(_) => ErrorCode::Validation,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Generation(_) => ErrorCode::Generation,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::Busy => ErrorCode::Conflict,
            Self::Unsupported(_) => ErrorCode::Unsupported,
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError::new(self.code(), self.to_string())
    }
}

impl From<ValidationError> for ClientError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            return Self::Network(format!("malformed response: {value}"));
        }
        if let Some(status) = value.status() {
            return Self::from_status(status, None);
        }
        Self::Network(value.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(value: url::ParseError) -> Self {
        Self::Validation(format!("invalid url: {value}"))
    }
}
