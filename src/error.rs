//! Typed errors and HTTP mapping.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Raised synchronously while building an instance from options.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing secret: set {0} or pass `secret` in options")]
    MissingSecret(String),
    #[error("secret too short: expected at least {min} characters, got {len}")]
    SecretTooShort { min: usize, len: usize },
    #[error("invalid rate limit: {0}")]
    RateLimit(String),
    #[error("invalid base path: {0}")]
    BasePath(String),
    #[error("config load: {0}")]
    Load(String),
}

/// Errors raised by the adapter wrapper or a concrete store.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Model {0} not found")]
    ModelNotFound(String),
    #[error("Field {field} not found in model {model}")]
    FieldNotFound { model: String, field: String },
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
    #[error("store: {0}")]
    Store(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

/// An error that carries an HTTP status and a machine readable code.
#[derive(Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub headers: HeaderMap,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE_ENTITY", message)
    }

    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "TOO_MANY_REQUESTS",
            "Too many requests. Please try again later.",
        );
        if let Ok(v) = retry_after_secs.to_string().parse() {
            err.headers.insert("x-retry-after", v);
        }
        err
    }

    /// Redirect marker. Swallowed by the router's error hook and answered as a 302.
    pub fn found(location: &str) -> Self {
        let mut err = Self::new(StatusCode::FOUND, "FOUND", "redirect");
        if let Ok(v) = location.parse() {
            err.headers.insert(axum::http::header::LOCATION, v);
        }
        err
    }

    pub fn is_redirect(&self) -> bool {
        self.status == StatusCode::FOUND
    }

    fn error_body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                code: self.code.clone(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
        }
    }

    /// The JSON error body, shaped exactly as [`IntoResponse`] sends it.
    pub fn body(&self) -> serde_json::Value {
        serde_json::to_value(self.error_body()).unwrap_or(serde_json::Value::Null)
    }
}

/// Errors raised by the route-mirroring client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("missing path parameter {param} for {route}")]
    MissingParam { route: String, param: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: serde_json::Value },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Base library error.
#[derive(Error, Debug)]
pub enum MarketingError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Adapter(AdapterError),
    #[error("{0}")]
    Internal(String),
}

/// A value the store cannot encode is the caller's fault; everything else is a store failure.
impl From<AdapterError> for MarketingError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::InvalidValue { .. } => MarketingError::Api(ApiError::unprocessable(e.to_string())),
            other => MarketingError::Adapter(other),
        }
    }
}

impl From<sqlx::Error> for MarketingError {
    fn from(e: sqlx::Error) -> Self {
        MarketingError::Adapter(AdapterError::Db(e))
    }
}

impl From<serde_json::Error> for MarketingError {
    fn from(e: serde_json::Error) -> Self {
        MarketingError::Api(ApiError::bad_request(e.to_string()))
    }
}

impl MarketingError {
    pub fn internal(message: impl Into<String>) -> Self {
        MarketingError::Internal(message.into())
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            MarketingError::Api(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T, E = MarketingError> = std::result::Result<T, E>;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.error_body();
        (self.status, self.headers, Json(body)).into_response()
    }
}

impl IntoResponse for MarketingError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            MarketingError::Api(e) => return e.clone().into_response(),
            MarketingError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            MarketingError::Adapter(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            MarketingError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
